//! # Tender Rules
//!
//! Applies what the patient hands over to the amount they owe.
//!
//! ```text
//!   patient_due = 1200, card = 500, cash = 1000
//!       ├── cash + card = 1500 ≥ 1200          ✓ sufficient
//!       ├── card 500 ≤ patient_due             ✓ no change from card
//!       └── change = 1500 − 1200 = 300 ≤ cash  ✓ drawn from cash
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::settlement::SettlementTotals;
use crate::validation::validate_non_negative_cents;

/// Amounts tendered by the patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Tender {
    #[serde(default)]
    pub cash_cents: i64,
    #[serde(default)]
    pub card_cents: i64,
}

impl Tender {
    pub fn cash(cents: i64) -> Self {
        Self {
            cash_cents: cents,
            card_cents: 0,
        }
    }

    /// Cash plus card, saturating for unvalidated input.
    pub fn total(&self) -> Money {
        Money::from_cents(self.cash_cents.saturating_add(self.card_cents))
    }
}

/// The settled split of a tender against settlement totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenderOutcome {
    pub cash: Money,
    pub card: Money,
    pub insurance_covered: Money,
    pub change_given: Money,
}

impl TenderOutcome {
    /// Cash that stays in the drawer.
    pub fn cash_retained(&self) -> Money {
        self.cash - self.change_given
    }
}

/// Checks the tender against the totals and works out change.
///
/// Errors:
/// - negative cash or card, or either above `MAX_AMOUNT_CENTS`: `ValidationError`
/// - card above patient due: `ValidationError` (change only comes from cash)
/// - cash + card below patient due: `InsufficientPayment` with the shortfall
pub fn apply_tender(totals: &SettlementTotals, tender: &Tender) -> CoreResult<TenderOutcome> {
    validate_non_negative_cents("cash", tender.cash_cents)?;
    validate_non_negative_cents("card", tender.card_cents)?;

    let due = totals.patient_due;
    let cash = Money::from_cents(tender.cash_cents);
    let card = Money::from_cents(tender.card_cents);

    if card > due {
        return Err(ValidationError::OutOfRange {
            field: "card".to_string(),
            min: 0,
            max: due.cents(),
        }
        .into());
    }

    let tendered = cash.checked_add(card).ok_or_else(|| ValidationError::OutOfRange {
        field: "tender".to_string(),
        min: 0,
        max: i64::MAX,
    })?;
    if tendered < due {
        return Err(CoreError::InsufficientPayment {
            due_cents: due.cents(),
            tendered_cents: tendered.cents(),
            shortfall_cents: (due - tendered).cents(),
        });
    }

    Ok(TenderOutcome {
        cash,
        card,
        insurance_covered: totals.insurance_covered,
        change_given: tendered - due,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn due(patient: i64, insurance: i64) -> SettlementTotals {
        SettlementTotals {
            subtotal: Money::from_cents(patient + insurance),
            discount_total: Money::zero(),
            net_total: Money::from_cents(patient + insurance),
            insurance_covered: Money::from_cents(insurance),
            patient_due: Money::from_cents(patient),
        }
    }

    #[test]
    fn test_exact_cash() {
        let out = apply_tender(&due(1000, 0), &Tender::cash(1000)).unwrap();
        assert_eq!(out.change_given.cents(), 0);
        assert_eq!(out.cash_retained().cents(), 1000);
    }

    #[test]
    fn test_change_from_cash() {
        let totals = due(1200, 800);
        let out = apply_tender(
            &totals,
            &Tender {
                cash_cents: 1000,
                card_cents: 500,
            },
        )
        .unwrap();

        assert_eq!(out.change_given.cents(), 300);
        assert_eq!(out.cash_retained().cents(), 700);
        // cash + card + insurance − change == net
        assert_eq!(
            out.cash + out.card + out.insurance_covered - out.change_given,
            totals.net_total
        );
    }

    #[test]
    fn test_shortfall_reported() {
        let err = apply_tender(&due(1000, 0), &Tender::cash(900)).unwrap_err();
        match err {
            CoreError::InsufficientPayment {
                shortfall_cents, ..
            } => assert_eq!(shortfall_cents, 100),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_card_over_due_rejected() {
        let err = apply_tender(
            &due(1000, 0),
            &Tender {
                cash_cents: 0,
                card_cents: 1100,
            },
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_negative_tender_rejected() {
        assert!(apply_tender(&due(0, 1000), &Tender::cash(-1)).is_err());
    }

    #[test]
    fn test_oversized_tender_rejected_without_overflow() {
        let err = apply_tender(
            &due(1000, 0),
            &Tender {
                cash_cents: i64::MAX,
                card_cents: 1,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "cash"
        ));

        let max = crate::MAX_AMOUNT_CENTS;
        let out = apply_tender(
            &due(1000, 0),
            &Tender {
                cash_cents: max,
                card_cents: 1000,
            },
        )
        .unwrap();
        assert_eq!(out.change_given.cents(), max);
        assert_eq!(
            Tender {
                cash_cents: i64::MAX,
                card_cents: 1
            }
            .total()
            .cents(),
            i64::MAX
        );
    }

    #[test]
    fn test_fully_insured_needs_no_tender() {
        let out = apply_tender(&due(0, 1000), &Tender::default()).unwrap();
        assert_eq!(out.insurance_covered.cents(), 1000);
        assert_eq!(out.change_given.cents(), 0);
    }
}
