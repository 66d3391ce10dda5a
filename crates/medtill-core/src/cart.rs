//! # Cart Builder
//!
//! Accumulates the lines of a sale before settlement.
//!
//! ## Line Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CartLine                                                               │
//! │  ├── Catalog  { catalog_ref, name, ... }   ← from CatalogItem          │
//! │  │     • insurance only when the item is insurance eligible            │
//! │  │     • adding the same item again bumps the quantity                 │
//! │  └── Freeform { description, ... }         ← typed at the counter      │
//! │        • price, insurance flag and tier entered by the professional    │
//! │                                                                         │
//! │  Both carry: quantity, unit price, discount, insurance flag, tier      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cart never talks to storage. It is handed to the settlement
//! calculator and then to the sale committer as a value.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{AppointmentCharge, CatalogItem, LineKind, ReimbursementTier};
use crate::validation::{
    validate_cart_size, validate_description, validate_discount_bps, validate_line_count,
    validate_non_negative_cents, validate_price_cents, validate_quantity,
};
use crate::MAX_ITEM_QUANTITY;

// =============================================================================
// Discount
// =============================================================================

/// A per-line discount, either a fixed amount or a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
#[ts(export)]
pub enum Discount {
    #[default]
    None,
    /// Fixed amount in cents.
    Amount(i64),
    /// Percentage in basis points (1000 = 10%).
    Percent(u32),
}

impl Discount {
    /// Resolves the discount against a line subtotal.
    ///
    /// A fixed amount larger than the subtotal is rejected rather than
    /// clamped, so the line net can never go negative.
    pub fn resolve(&self, line_subtotal: Money) -> Result<Money, ValidationError> {
        match *self {
            Discount::None => Ok(Money::zero()),
            Discount::Amount(cents) => {
                validate_non_negative_cents("discount_amount", cents)?;
                if cents > line_subtotal.cents() {
                    return Err(ValidationError::OutOfRange {
                        field: "discount_amount".to_string(),
                        min: 0,
                        max: line_subtotal.cents(),
                    });
                }
                Ok(Money::from_cents(cents))
            }
            Discount::Percent(bps) => {
                validate_discount_bps(bps)?;
                Ok(line_subtotal.percentage(bps))
            }
        }
    }

    /// The percentage as entered, if this is a percentage discount.
    pub fn percent_bps(&self) -> Option<u32> {
        match self {
            Discount::Percent(bps) => Some(*bps),
            _ => None,
        }
    }
}

// =============================================================================
// Line Pricing
// =============================================================================

/// The pricing inputs shared by every line shape.
///
/// Also rebuilt from persisted sale lines so that totals can be recomputed
/// from source rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePricing {
    pub quantity: i64,
    pub unit_price: Money,
    pub discount: Discount,
    pub insurance_flag: bool,
    /// Whole-number percentage, checked against the allowed tiers.
    pub reimbursement_rate: u32,
}

impl LinePricing {
    /// Checks quantity and unit price, whatever built this pricing.
    pub fn validate(&self) -> CoreResult<()> {
        validate_quantity(self.quantity)?;
        validate_price_cents(self.unit_price.cents())?;
        Ok(())
    }

    /// `unit_price × quantity`.
    pub fn subtotal(&self) -> CoreResult<Money> {
        self.unit_price
            .multiply_quantity(self.quantity)
            .ok_or_else(|| {
                ValidationError::OutOfRange {
                    field: "line subtotal".to_string(),
                    min: 0,
                    max: i64::MAX,
                }
                .into()
            })
    }
}

// =============================================================================
// Cart Lines
// =============================================================================

/// A line backed by a catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CatalogLine {
    pub line_id: String,
    pub catalog_ref: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub discount: Discount,
    pub insurance_flag: bool,
    #[ts(as = "u32")]
    pub reimbursement: ReimbursementTier,
}

/// A line typed in at the counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FreeformLine {
    pub line_id: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub discount: Discount,
    pub insurance_flag: bool,
    #[ts(as = "u32")]
    pub reimbursement: ReimbursementTier,
}

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum CartLine {
    Catalog(CatalogLine),
    Freeform(FreeformLine),
}

impl CartLine {
    pub fn line_id(&self) -> &str {
        match self {
            CartLine::Catalog(l) => &l.line_id,
            CartLine::Freeform(l) => &l.line_id,
        }
    }

    pub fn kind(&self) -> LineKind {
        match self {
            CartLine::Catalog(_) => LineKind::Catalog,
            CartLine::Freeform(_) => LineKind::Freeform,
        }
    }

    /// Catalog reference for catalog lines.
    pub fn catalog_ref(&self) -> Option<&str> {
        match self {
            CartLine::Catalog(l) => Some(&l.catalog_ref),
            CartLine::Freeform(_) => None,
        }
    }

    /// Text printed for the line: catalog name or free-text description.
    pub fn description(&self) -> &str {
        match self {
            CartLine::Catalog(l) => &l.name,
            CartLine::Freeform(l) => &l.description,
        }
    }

    pub fn quantity(&self) -> i64 {
        match self {
            CartLine::Catalog(l) => l.quantity,
            CartLine::Freeform(l) => l.quantity,
        }
    }

    pub fn pricing(&self) -> LinePricing {
        let (quantity, unit_price_cents, discount, insurance_flag, reimbursement) = match self {
            CartLine::Catalog(l) => (
                l.quantity,
                l.unit_price_cents,
                l.discount,
                l.insurance_flag,
                l.reimbursement,
            ),
            CartLine::Freeform(l) => (
                l.quantity,
                l.unit_price_cents,
                l.discount,
                l.insurance_flag,
                l.reimbursement,
            ),
        };

        LinePricing {
            quantity,
            unit_price: Money::from_cents(unit_price_cents),
            discount,
            insurance_flag,
            reimbursement_rate: reimbursement.percent(),
        }
    }

    fn set_quantity(&mut self, qty: i64) {
        match self {
            CartLine::Catalog(l) => l.quantity = qty,
            CartLine::Freeform(l) => l.quantity = qty,
        }
    }

    fn set_discount(&mut self, discount: Discount) {
        match self {
            CartLine::Catalog(l) => l.discount = discount,
            CartLine::Freeform(l) => l.discount = discount,
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A cart under construction.
///
/// ## User Workflow
/// ```text
/// add_catalog_item(consult, 1) ──┐
/// add_freeform_item("Bandage")  ─┼──► Cart ──► compute_totals ──► commit
/// adjust_quantity(line, 0)      ─┘     (removes the line)
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Cart {
    #[serde(default)]
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub customer_ref: Option<String>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, line_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.line_id() == line_id)
    }

    /// Adds a catalog item, or bumps the quantity of its existing line.
    ///
    /// Items that are not insurance eligible always produce uninsured lines.
    /// Returns the id of the affected line.
    pub fn add_catalog_item(&mut self, item: &CatalogItem, qty: i64) -> CoreResult<String> {
        validate_quantity(qty)?;

        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.catalog_ref() == Some(item.id.as_str()))
        {
            let combined = existing.quantity() + qty;
            if combined > MAX_ITEM_QUANTITY {
                return Err(ValidationError::OutOfRange {
                    field: "quantity".to_string(),
                    min: 1,
                    max: MAX_ITEM_QUANTITY,
                }
                .into());
            }
            existing.set_quantity(combined);
            return Ok(existing.line_id().to_string());
        }

        validate_cart_size(self.lines.len())?;
        validate_price_cents(item.price_cents)?;
        let tier = if item.insurance_eligible {
            ReimbursementTier::from_percent(item.reimbursement_rate)?
        } else {
            ReimbursementTier::None
        };

        let line_id = Uuid::new_v4().to_string();
        self.lines.push(CartLine::Catalog(CatalogLine {
            line_id: line_id.clone(),
            catalog_ref: item.id.clone(),
            name: item.name.clone(),
            quantity: qty,
            unit_price_cents: item.price_cents,
            discount: Discount::None,
            insurance_flag: item.insurance_eligible && tier.is_covered(),
            reimbursement: tier,
        }));

        Ok(line_id)
    }

    /// Adds a free-text line. Returns the new line id.
    pub fn add_freeform_item(
        &mut self,
        description: &str,
        qty: i64,
        unit_price_cents: i64,
        insurance_flag: bool,
        reimbursement_rate: u32,
    ) -> CoreResult<String> {
        validate_cart_size(self.lines.len())?;
        validate_description(description)?;
        validate_quantity(qty)?;
        validate_price_cents(unit_price_cents)?;
        let tier = ReimbursementTier::from_percent(reimbursement_rate)?;

        let line_id = Uuid::new_v4().to_string();
        self.lines.push(CartLine::Freeform(FreeformLine {
            line_id: line_id.clone(),
            description: description.trim().to_string(),
            quantity: qty,
            unit_price_cents,
            discount: Discount::None,
            insurance_flag,
            reimbursement: tier,
        }));

        Ok(line_id)
    }

    /// Removes a line and returns it.
    pub fn remove_item(&mut self, line_id: &str) -> CoreResult<CartLine> {
        let idx = self.position(line_id)?;
        Ok(self.lines.remove(idx))
    }

    /// Sets a line's quantity. Zero removes the line.
    ///
    /// Returns `None` when the line was removed.
    pub fn adjust_quantity(&mut self, line_id: &str, qty: i64) -> CoreResult<Option<&CartLine>> {
        let idx = self.position(line_id)?;

        if qty == 0 {
            self.lines.remove(idx);
            return Ok(None);
        }

        validate_quantity(qty)?;
        self.lines[idx].set_quantity(qty);
        Ok(Some(&self.lines[idx]))
    }

    /// Applies a discount to a line, checked against its current subtotal.
    pub fn apply_discount(&mut self, line_id: &str, discount: Discount) -> CoreResult<()> {
        let idx = self.position(line_id)?;
        discount.resolve(self.lines[idx].pricing().subtotal()?)?;
        self.lines[idx].set_discount(discount);
        Ok(())
    }

    /// Pre-seeds the cart with an appointment charge.
    ///
    /// The seeded line is an ordinary free-text line and can be edited or
    /// removed like any other. The patient becomes the customer unless one
    /// was already set.
    pub fn seed_from_appointment(&mut self, charge: &AppointmentCharge) -> CoreResult<String> {
        let line_id = self.add_freeform_item(
            &format!("Appointment {}", charge.appointment_id),
            1,
            charge.due_amount_cents,
            false,
            0,
        )?;

        if self.customer_ref.is_none() {
            self.customer_ref = Some(charge.patient_id.clone());
        }

        Ok(line_id)
    }

    pub fn set_customer_ref(&mut self, customer_ref: Option<String>) {
        self.customer_ref = customer_ref.filter(|c| !c.trim().is_empty());
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.customer_ref = None;
    }

    /// Re-checks every line against the same rules the builder methods
    /// enforce.
    ///
    /// A cart that arrives over the wire or out of the offline queue was
    /// never built through this type's methods, so settlement runs this
    /// before touching any amount.
    pub fn validate(&self) -> CoreResult<()> {
        validate_line_count(self.lines.len())?;

        for line in &self.lines {
            validate_description(line.description())?;
            line.pricing().validate()?;
        }

        Ok(())
    }

    fn position(&self, line_id: &str) -> CoreResult<usize> {
        self.lines
            .iter()
            .position(|l| l.line_id() == line_id)
            .ok_or_else(|| CoreError::LineNotFound(line_id.to_string()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn consult(eligible: bool, rate: u32) -> CatalogItem {
        CatalogItem {
            id: "cat-consult".to_string(),
            name: "Consultation".to_string(),
            price_cents: 1000,
            insurance_eligible: eligible,
            reimbursement_rate: rate,
        }
    }

    #[test]
    fn test_add_catalog_item_merges_quantity() {
        let mut cart = Cart::new();
        let first = cart.add_catalog_item(&consult(true, 80), 1).unwrap();
        let second = cart.add_catalog_item(&consult(true, 80), 2).unwrap();

        assert_eq!(first, second);
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.line(&first).unwrap().quantity(), 3);
    }

    #[test]
    fn test_ineligible_catalog_item_never_insured() {
        let mut cart = Cart::new();
        let id = cart.add_catalog_item(&consult(false, 80), 1).unwrap();

        let pricing = cart.line(&id).unwrap().pricing();
        assert!(!pricing.insurance_flag);
        assert_eq!(pricing.reimbursement_rate, 0);
    }

    #[test]
    fn test_catalog_item_with_bad_tier_rejected() {
        let mut cart = Cart::new();
        let err = cart.add_catalog_item(&consult(true, 75), 1).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::NotAllowed { .. })));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_freeform_validation() {
        let mut cart = Cart::new();
        assert!(cart.add_freeform_item("", 1, 100, false, 0).is_err());
        assert!(cart.add_freeform_item("Gauze", 0, 100, false, 0).is_err());
        assert!(cart.add_freeform_item("Gauze", 1, -1, false, 0).is_err());
        assert!(cart.add_freeform_item("Gauze", 1, 100, true, 50).is_err());
        assert!(cart.add_freeform_item("Gauze", 1, 100, true, 100).is_ok());
    }

    #[test]
    fn test_adjust_quantity_zero_removes() {
        let mut cart = Cart::new();
        let id = cart.add_freeform_item("Gauze", 2, 100, false, 0).unwrap();

        assert_eq!(cart.adjust_quantity(&id, 5).unwrap().unwrap().quantity(), 5);
        assert!(cart.adjust_quantity(&id, -1).is_err());
        assert!(cart.adjust_quantity(&id, 0).unwrap().is_none());
        assert!(cart.is_empty());
        assert!(matches!(
            cart.adjust_quantity(&id, 1),
            Err(CoreError::LineNotFound(_))
        ));
    }

    #[test]
    fn test_remove_item() {
        let mut cart = Cart::new();
        let a = cart.add_freeform_item("A", 1, 100, false, 0).unwrap();
        let b = cart.add_freeform_item("B", 1, 200, false, 0).unwrap();

        let removed = cart.remove_item(&a).unwrap();
        assert_eq!(removed.description(), "A");
        assert_eq!(cart.len(), 1);
        assert!(cart.line(&b).is_some());
        assert!(cart.remove_item(&a).is_err());
    }

    #[test]
    fn test_apply_discount_bounds() {
        let mut cart = Cart::new();
        let id = cart.add_freeform_item("Gauze", 2, 500, false, 0).unwrap();

        assert!(cart.apply_discount(&id, Discount::Amount(1001)).is_err());
        assert!(cart.apply_discount(&id, Discount::Percent(10_001)).is_err());
        cart.apply_discount(&id, Discount::Amount(1000)).unwrap();
        cart.apply_discount(&id, Discount::Percent(1000)).unwrap();
        assert_eq!(cart.line(&id).unwrap().pricing().discount, Discount::Percent(1000));
    }

    #[test]
    fn test_seed_from_appointment() {
        let mut cart = Cart::new();
        let charge = AppointmentCharge {
            appointment_id: "apt-9".to_string(),
            patient_id: "pat-3".to_string(),
            due_amount_cents: 4500,
        };

        let id = cart.seed_from_appointment(&charge).unwrap();
        let line = cart.line(&id).unwrap();
        assert_eq!(line.kind(), LineKind::Freeform);
        assert_eq!(line.pricing().unit_price.cents(), 4500);
        assert_eq!(cart.customer_ref.as_deref(), Some("pat-3"));

        // Seeding does not lock the cart
        cart.adjust_quantity(&id, 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_cart_size_limit() {
        let mut cart = Cart::new();
        for i in 0..crate::MAX_CART_ITEMS {
            cart.add_freeform_item(&format!("item {i}"), 1, 1, false, 0).unwrap();
        }
        assert!(cart.add_freeform_item("one too many", 1, 1, false, 0).is_err());
    }

    #[test]
    fn test_cart_line_wire_shape() {
        let mut cart = Cart::new();
        cart.add_freeform_item("Gauze", 1, 100, true, 80).unwrap();
        let json = serde_json::to_value(&cart).unwrap();

        assert_eq!(json["lines"][0]["kind"], "freeform");
        assert_eq!(json["lines"][0]["reimbursement"], 80);
        assert_eq!(json["lines"][0]["discount"]["type"], "none");
    }
}
