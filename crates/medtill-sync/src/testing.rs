//! Scripted fakes for queue tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

use medtill_core::{Cart, CommittedSale, PaymentSplit, Sale, Tender};

use crate::error::{SyncError, SyncResult};
use crate::intent::SaleIntent;
use crate::submitter::SaleSubmitter;

/// One scripted answer of [`FakeSubmitter`].
#[derive(Debug, Clone, Copy)]
pub enum Script {
    Commit,
    Timeout,
    Unavailable,
    SessionClosed,
    /// The sale lands but the response is lost.
    CommitThenTimeout,
}

/// Submitter that answers from a script, then commits once it runs out.
/// Remembers keys so repeated commits replay, like the server.
#[derive(Default)]
pub struct FakeSubmitter {
    script: Mutex<VecDeque<Script>>,
    committed: Mutex<Vec<CommittedSale>>,
    attempts: Mutex<Vec<String>>,
}

impl FakeSubmitter {
    pub fn new(script: Vec<Script>) -> Self {
        FakeSubmitter {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    /// Keys in the order they were attempted, repeats included.
    pub fn attempted_keys(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    /// Keys in the order they were first committed.
    pub fn committed_keys(&self) -> Vec<String> {
        self.committed
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| s.sale.idempotency_key.clone())
            .collect()
    }

    fn known(&self, key: &str) -> Option<CommittedSale> {
        self.committed
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.sale.idempotency_key.as_deref() == Some(key))
            .cloned()
    }

    fn commit_or_replay(&self, intent: &SaleIntent) -> CommittedSale {
        if let Some(mut existing) = self.known(&intent.idempotency_key) {
            existing.replayed = true;
            return existing;
        }

        let totals = intent.preflight().unwrap();
        let mut committed = self.committed.lock().unwrap();
        let sale_id = Uuid::new_v4().to_string();
        let sale = CommittedSale {
            sale: Sale {
                id: sale_id.clone(),
                session_id: intent.session_id.clone(),
                sale_number: committed.len() as i64 + 1,
                idempotency_key: Some(intent.idempotency_key.clone()),
                customer_ref: intent.customer_ref.clone(),
                subtotal_cents: totals.subtotal.cents(),
                discount_cents: totals.discount_total.cents(),
                net_total_cents: totals.net_total.cents(),
                insurance_covered_cents: totals.insurance_covered.cents(),
                patient_due_cents: totals.patient_due.cents(),
                created_at: Utc::now(),
            },
            lines: Vec::new(),
            payment: PaymentSplit {
                sale_id,
                cash_cents: intent.tender.cash_cents,
                card_cents: intent.tender.card_cents,
                insurance_covered_cents: totals.insurance_covered.cents(),
                change_given_cents: intent.tender.total().cents() - totals.patient_due.cents(),
            },
            replayed: false,
        };
        committed.push(sale.clone());
        sale
    }
}

#[async_trait]
impl SaleSubmitter for FakeSubmitter {
    async fn commit(&self, intent: &SaleIntent) -> SyncResult<CommittedSale> {
        self.attempts
            .lock()
            .unwrap()
            .push(intent.idempotency_key.clone());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Commit);

        match step {
            Script::Commit => Ok(self.commit_or_replay(intent)),
            Script::Timeout => Err(SyncError::Timeout),
            Script::Unavailable => Err(SyncError::ServerUnavailable {
                status: 503,
                message: "database busy".into(),
            }),
            Script::SessionClosed => match self.known(&intent.idempotency_key) {
                Some(mut existing) => {
                    existing.replayed = true;
                    Ok(existing)
                }
                None => Err(SyncError::Rejected {
                    status: 409,
                    code: "CONFLICT".into(),
                    message: format!(
                        "Session closed: session {} no longer accepts changes",
                        intent.session_id
                    ),
                    shortfall_cents: None,
                }),
            },
            Script::CommitThenTimeout => {
                self.commit_or_replay(intent);
                Err(SyncError::Timeout)
            }
        }
    }

    async fn find_by_key(&self, idempotency_key: &str) -> SyncResult<Option<CommittedSale>> {
        Ok(self.known(idempotency_key).map(|mut s| {
            s.replayed = true;
            s
        }))
    }
}

/// A 10.00 consultation paid in cash.
pub fn sample_intent(drawer_id: &str) -> SaleIntent {
    let mut cart = Cart::new();
    cart.add_freeform_item("Consultation", 1, 1000, false, 0).unwrap();
    SaleIntent::new(
        drawer_id,
        format!("session-{}", drawer_id),
        cart,
        Tender::cash(1000),
    )
}
