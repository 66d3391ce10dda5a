//! # Settlement Calculator
//!
//! Turns a cart into subtotal, insurance-covered and patient-due amounts.
//!
//! ## Per-Line Pipeline
//! ```text
//!   unit_price × quantity ──► line subtotal
//!                                 │  − discount (amount, or subtotal × bps)
//!                                 ▼
//!                             line net
//!                                 │
//!            insured && tier > 0? ├── yes ──► insurance = net × tier
//!                                 │           patient   = net − insurance
//!                                 └── no ───► insurance = 0
//!                                             patient   = net
//! ```
//!
//! The same pipeline runs over persisted [`SaleLineItem`]s so that totals can
//! be recomputed from source rows after the fact.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::{Cart, Discount, LinePricing};
use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{ReimbursementTier, SaleLineItem};

// =============================================================================
// Results
// =============================================================================

/// Amounts for a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub net: Money,
    pub insurance_portion: Money,
    pub patient_portion: Money,
}

/// Aggregated amounts for a cart or sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SettlementTotals {
    /// Pre-discount gross, for display.
    pub subtotal: Money,
    pub discount_total: Money,
    pub net_total: Money,
    pub insurance_covered: Money,
    pub patient_due: Money,
}

impl SettlementTotals {
    fn accumulate(&mut self, line: &LineTotals) {
        self.subtotal += line.subtotal;
        self.discount_total += line.discount;
        self.net_total += line.net;
        self.insurance_covered += line.insurance_portion;
        self.patient_due += line.patient_portion;
    }
}

// =============================================================================
// Calculation
// =============================================================================

/// Computes the amounts for one line.
pub fn line_totals(pricing: &LinePricing) -> CoreResult<LineTotals> {
    pricing.validate()?;
    let tier = ReimbursementTier::from_percent(pricing.reimbursement_rate)?;

    let subtotal = pricing.subtotal()?;
    let discount = pricing.discount.resolve(subtotal)?;
    let net = subtotal - discount;

    let insurance_portion = if pricing.insurance_flag && tier.is_covered() {
        net.percentage(tier.bps())
    } else {
        Money::zero()
    };

    Ok(LineTotals {
        subtotal,
        discount,
        net,
        insurance_portion,
        patient_portion: net - insurance_portion,
    })
}

/// Computes settlement totals for a cart.
///
/// The cart is re-validated first, so a deserialized cart with a zero
/// quantity or a negative price fails here with a `ValidationError`.
///
/// ## Example
/// ```rust
/// use medtill_core::cart::Cart;
/// use medtill_core::settlement::compute_totals;
///
/// let mut cart = Cart::new();
/// cart.add_freeform_item("Consultation", 1, 1000, true, 80).unwrap();
///
/// let totals = compute_totals(&cart).unwrap();
/// assert_eq!(totals.insurance_covered.cents(), 800);
/// assert_eq!(totals.patient_due.cents(), 200);
/// ```
pub fn compute_totals(cart: &Cart) -> CoreResult<SettlementTotals> {
    if cart.is_empty() {
        return Err(ValidationError::EmptyCart.into());
    }
    cart.validate()?;

    let mut totals = SettlementTotals::default();
    for line in &cart.lines {
        totals.accumulate(&line_totals(&line.pricing())?);
    }

    Ok(totals)
}

/// Rebuilds pricing inputs from a persisted line.
///
/// A percentage discount is restored as entered so that it resolves the
/// same way it did at commit time.
pub fn pricing_from_line_item(item: &SaleLineItem) -> CoreResult<LinePricing> {
    let discount = match item.discount_percent_bps {
        Some(bps) => Discount::Percent(u32::try_from(bps).map_err(|_| {
            ValidationError::OutOfRange {
                field: "discount_percent".to_string(),
                min: 0,
                max: crate::money::FULL_BPS as i64,
            }
        })?),
        None if item.discount_cents > 0 => Discount::Amount(item.discount_cents),
        None => Discount::None,
    };

    let reimbursement_rate =
        u32::try_from(item.reimbursement_rate).map_err(|_| ValidationError::NotAllowed {
            field: "reimbursement_rate".to_string(),
            allowed: ReimbursementTier::ALLOWED
                .iter()
                .map(|p| p.to_string())
                .collect(),
        })?;

    Ok(LinePricing {
        quantity: item.quantity,
        unit_price: Money::from_cents(item.unit_price_cents),
        discount,
        insurance_flag: item.insurance_flag,
        reimbursement_rate,
    })
}

/// Recomputes totals from persisted line items.
pub fn recompute_from_line_items(items: &[SaleLineItem]) -> CoreResult<SettlementTotals> {
    if items.is_empty() {
        return Err(ValidationError::EmptyCart.into());
    }

    let mut totals = SettlementTotals::default();
    for item in items {
        totals.accumulate(&line_totals(&pricing_from_line_item(item)?)?);
    }

    Ok(totals)
}

// =============================================================================
// Unit Tests
// =============================================================================
