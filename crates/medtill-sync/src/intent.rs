//! # Sale Intents
//!
//! A sale intent is everything needed to commit a sale, captured on the
//! device before the server has seen it. Its idempotency key is minted
//! here, once, and travels with every attempt.
//!
//! ## Two Outcomes
//! ```text
//! submit(intent) ──► Committed(CommittedSale)   server accepted (or replayed)
//!               └──► Queued(QueuedReceipt)     held locally, replayed later
//! ```
//! There is no third state: a deterministic failure is an `Err`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use medtill_core::settlement::compute_totals;
use medtill_core::tender::apply_tender;
use medtill_core::validation::validate_idempotency_key;
use medtill_core::{Cart, CommittedSale, CoreError, SettlementTotals, Tender};
use medtill_db::CommitRequest;

use crate::error::SyncResult;

// =============================================================================
// Sale Intent
// =============================================================================

/// A sale the cashier confirmed, not yet known to be committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleIntent {
    pub idempotency_key: String,
    pub drawer_id: String,
    pub session_id: String,
    pub cart: Cart,
    pub tender: Tender,
    #[serde(default)]
    pub customer_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SaleIntent {
    /// Creates an intent with a fresh idempotency key.
    pub fn new(
        drawer_id: impl Into<String>,
        session_id: impl Into<String>,
        cart: Cart,
        tender: Tender,
    ) -> Self {
        SaleIntent {
            idempotency_key: Uuid::new_v4().to_string(),
            drawer_id: drawer_id.into(),
            session_id: session_id.into(),
            cart,
            tender,
            customer_ref: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the customer reference.
    pub fn with_customer_ref(mut self, customer_ref: impl Into<String>) -> Self {
        self.customer_ref = Some(customer_ref.into());
        self
    }

    /// Runs the checks that do not need the server: key format, cart
    /// contents and tender coverage.
    ///
    /// An intent that fails here would fail identically on replay, so it
    /// must never reach the queue.
    pub fn preflight(&self) -> SyncResult<SettlementTotals> {
        validate_idempotency_key(&self.idempotency_key).map_err(CoreError::from)?;
        let totals = compute_totals(&self.cart)?;
        apply_tender(&totals, &self.tender)?;
        Ok(totals)
    }

    /// Builds the in-process commit request.
    pub fn to_commit_request(&self) -> CommitRequest {
        CommitRequest {
            session_id: self.session_id.clone(),
            cart: self.cart.clone(),
            tender: self.tender,
            customer_ref: self.customer_ref.clone(),
            idempotency_key: Some(self.idempotency_key.clone()),
        }
    }

    /// Body of `POST /sessions/{id}/sales`.
    pub fn request_body(&self) -> CommitSaleBody<'_> {
        CommitSaleBody {
            cart: &self.cart,
            tender: &self.tender,
            customer_ref: self.customer_ref.as_deref(),
            idempotency_key: &self.idempotency_key,
        }
    }
}

/// Wire shape of a commit-sale request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSaleBody<'a> {
    pub cart: &'a Cart,
    pub tender: &'a Tender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_ref: Option<&'a str>,
    pub idempotency_key: &'a str,
}

// =============================================================================
// Submission Outcomes
// =============================================================================

/// Why an intent went to the queue instead of being committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueReason {
    /// The probe reported the server unreachable.
    Offline,
    /// The server was tried and the outcome is unknown.
    Uncertain,
    /// Older sales of the same drawer are still waiting in the queue.
    Backlog,
}

/// Proof that an intent is durably queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedReceipt {
    pub idempotency_key: String,
    pub drawer_id: String,
    pub session_id: String,
    /// Queue position; later entries of a drawer have a higher seq.
    pub seq: i64,
    pub reason: QueueReason,
    pub queued_at: DateTime<Utc>,
}

/// Result of a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Committed(CommittedSale),
    Queued(QueuedReceipt),
}

impl Submission {
    /// The idempotency key the outcome belongs to.
    pub fn idempotency_key(&self) -> Option<&str> {
        match self {
            Submission::Committed(sale) => sale.sale.idempotency_key.as_deref(),
            Submission::Queued(receipt) => Some(&receipt.idempotency_key),
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Submission::Queued(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    fn cart() -> Cart {
        let mut cart = Cart::new();
        cart.add_freeform_item("Consultation", 1, 1000, false, 0).unwrap();
        cart
    }

    #[test]
    fn test_new_mints_unique_keys() {
        let a = SaleIntent::new("d1", "s1", cart(), Tender::cash(1000));
        let b = SaleIntent::new("d1", "s1", cart(), Tender::cash(1000));
        assert_ne!(a.idempotency_key, b.idempotency_key);
        assert!(a.preflight().is_ok());
    }

    #[test]
    fn test_preflight_rejects_short_tender() {
        let intent = SaleIntent::new("d1", "s1", cart(), Tender::cash(400));
        let err = intent.preflight().unwrap_err();
        assert!(matches!(
            err,
            SyncError::Domain(CoreError::InsufficientPayment {
                shortfall_cents: 600,
                ..
            })
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_preflight_rejects_empty_cart() {
        let intent = SaleIntent::new("d1", "s1", Cart::new(), Tender::cash(0));
        assert!(matches!(
            intent.preflight(),
            Err(SyncError::Domain(CoreError::Validation(_)))
        ));
    }

    #[test]
    fn test_preflight_rechecks_decoded_lines() {
        let mut value = serde_json::to_value(SaleIntent::new(
            "d1",
            "s1",
            cart(),
            Tender::cash(1000),
        ))
        .unwrap();
        value["cart"]["lines"][0]["quantity"] = serde_json::json!(0);

        let intent: SaleIntent = serde_json::from_value(value).unwrap();
        let err = intent.preflight().unwrap_err();
        assert!(matches!(err, SyncError::Domain(CoreError::Validation(_))));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_payload_survives_json() {
        let intent =
            SaleIntent::new("d1", "s1", cart(), Tender::cash(1000)).with_customer_ref("p-7");
        let json = serde_json::to_string(&intent).unwrap();
        let back: SaleIntent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, intent);
    }

    #[test]
    fn test_request_body_shape() {
        let intent = SaleIntent::new("d1", "s1", cart(), Tender::cash(1000));
        let value = serde_json::to_value(intent.request_body()).unwrap();
        assert_eq!(value["idempotencyKey"], intent.idempotency_key.as_str());
        assert_eq!(value["tender"]["cashCents"], 1000);
        assert!(value.get("customerRef").is_none());
    }
}
