//! # Reconciliation
//!
//! Shift totals derived by re-scanning committed sales. Nothing here reads a
//! running total: every figure is summed from sale and payment rows.
//!
//! ```text
//!   expected_cash = opening_balance + Σ (cash_i − change_i)
//!   variance      = counted_cash − expected_cash
//!                    > 0 surplus, < 0 shortage
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{PaymentSplit, Sale, Session, SessionStatus};

/// Shift report for one session.
///
/// For an open session this is a mid-shift snapshot and `counted_cash_cents`
/// and `variance_cents` are absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReconciliationReport {
    pub session_id: String,
    pub status: SessionStatus,
    pub transactions: i64,
    pub opening_balance_cents: i64,
    /// Σ net total.
    pub total_sales_cents: i64,
    /// Σ (cash − change): cash kept in the drawer.
    pub total_cash_cents: i64,
    pub total_card_cents: i64,
    pub total_insurance_covered_cents: i64,
    pub total_change_given_cents: i64,
    pub total_patient_due_cents: i64,
    pub expected_cash_cents: i64,
    pub counted_cash_cents: Option<i64>,
    pub variance_cents: Option<i64>,
}

/// `opening + Σ(cash − change)`.
pub fn expected_cash<'a, I>(opening_balance: Money, payments: I) -> Money
where
    I: IntoIterator<Item = &'a PaymentSplit>,
{
    opening_balance
        + payments
            .into_iter()
            .map(PaymentSplit::cash_retained)
            .sum::<Money>()
}

/// Builds the report for `session` from its committed sales.
///
/// `sales` must hold every sale of the session paired with its payment split.
/// For a closed session, counted cash and variance are taken from the
/// session as persisted at close.
pub fn build_report(session: &Session, sales: &[(Sale, PaymentSplit)]) -> ReconciliationReport {
    let payments = sales.iter().map(|(_, p)| p);
    let expected = expected_cash(session.opening_balance(), payments);

    let sum = |f: fn(&(Sale, PaymentSplit)) -> i64| -> i64 { sales.iter().map(f).sum() };

    let (counted, variance) = match session.status {
        SessionStatus::Open => (None, None),
        SessionStatus::Closed => (
            session.counted_cash_cents,
            session
                .variance_cents
                .or_else(|| session.counted_cash_cents.map(|c| c - expected.cents())),
        ),
    };

    ReconciliationReport {
        session_id: session.id.clone(),
        status: session.status,
        transactions: sales.len() as i64,
        opening_balance_cents: session.opening_balance_cents,
        total_sales_cents: sum(|(s, _)| s.net_total_cents),
        total_cash_cents: sum(|(_, p)| p.cash_retained().cents()),
        total_card_cents: sum(|(_, p)| p.card_cents),
        total_insurance_covered_cents: sum(|(_, p)| p.insurance_covered_cents),
        total_change_given_cents: sum(|(_, p)| p.change_given_cents),
        total_patient_due_cents: sum(|(s, _)| s.patient_due_cents),
        expected_cash_cents: expected.cents(),
        counted_cash_cents: counted,
        variance_cents: variance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(status: SessionStatus, opening: i64) -> Session {
        Session {
            id: "sess-1".to_string(),
            drawer_id: "drw-1".to_string(),
            status,
            opening_balance_cents: opening,
            sale_count: 0,
            opened_at: Utc::now(),
            closed_at: None,
            counted_cash_cents: None,
            expected_cash_cents: None,
            variance_cents: None,
            notes: None,
        }
    }

    fn sale(n: i64, net: i64, insurance: i64, cash: i64, card: i64, change: i64) -> (Sale, PaymentSplit) {
        let id = format!("sale-{n}");
        (
            Sale {
                id: id.clone(),
                session_id: "sess-1".to_string(),
                sale_number: n,
                idempotency_key: None,
                customer_ref: None,
                subtotal_cents: net,
                discount_cents: 0,
                net_total_cents: net,
                insurance_covered_cents: insurance,
                patient_due_cents: net - insurance,
                created_at: Utc::now(),
            },
            PaymentSplit {
                sale_id: id,
                cash_cents: cash,
                card_cents: card,
                insurance_covered_cents: insurance,
                change_given_cents: change,
            },
        )
    }

    #[test]
    fn test_open_session_snapshot() {
        let sales = vec![sale(1, 1000, 0, 1000, 0, 0), sale(2, 1000, 800, 200, 0, 0)];
        let report = build_report(&session(SessionStatus::Open, 0), &sales);

        assert_eq!(report.transactions, 2);
        assert_eq!(report.total_sales_cents, 2000);
        assert_eq!(report.total_cash_cents, 1200);
        assert_eq!(report.total_insurance_covered_cents, 800);
        assert_eq!(report.expected_cash_cents, 1200);
        assert_eq!(report.counted_cash_cents, None);
        assert_eq!(report.variance_cents, None);
    }

    #[test]
    fn test_closed_session_uses_persisted_count() {
        let mut s = session(SessionStatus::Closed, 500);
        s.counted_cash_cents = Some(1600);
        s.variance_cents = Some(-50);

        let sales = vec![sale(1, 1200, 0, 2000, 0, 850)];
        let report = build_report(&s, &sales);

        assert_eq!(report.total_cash_cents, 1150);
        assert_eq!(report.total_change_given_cents, 850);
        assert_eq!(report.expected_cash_cents, 1650);
        assert_eq!(report.counted_cash_cents, Some(1600));
        assert_eq!(report.variance_cents, Some(-50));
    }

    #[test]
    fn test_empty_shift() {
        let report = build_report(&session(SessionStatus::Open, 2500), &[]);
        assert_eq!(report.transactions, 0);
        assert_eq!(report.expected_cash_cents, 2500);
    }
}
