//! # Sale Submitters
//!
//! The seam between the queue and whatever actually commits a sale.
//!
//! ```text
//! ┌──────────────┐      commit(intent)       ┌──────────────────────────┐
//! │ SaleGateway  │ ────────────────────────► │ HttpSaleSubmitter        │
//! │ QueueDrainer │                           │  POST /sessions/{id}/... │
//! └──────────────┘ ◄──── CommittedSale ───── │ LocalSubmitter           │
//!                      or SyncError          │  SaleRepository::commit  │
//!                                            └──────────────────────────┘
//! ```
//!
//! Every submitter sends the intent's idempotency key, so a repeated
//! commit of the same intent is answered with the original sale.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use medtill_core::CommittedSale;
use medtill_db::Database;

use crate::error::{SyncError, SyncResult};
use crate::intent::SaleIntent;

/// Header carrying the client-minted idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Commits sale intents.
#[async_trait]
pub trait SaleSubmitter: Send + Sync {
    /// Commits the intent, or returns the sale already committed under its
    /// idempotency key.
    async fn commit(&self, intent: &SaleIntent) -> SyncResult<CommittedSale>;

    /// Looks up the sale committed under `idempotency_key`, if any.
    async fn find_by_key(&self, idempotency_key: &str) -> SyncResult<Option<CommittedSale>>;
}

// =============================================================================
// Local Submitter
// =============================================================================

/// Commits directly against a database in the same process.
#[derive(Debug, Clone)]
pub struct LocalSubmitter {
    db: Database,
}

impl LocalSubmitter {
    pub fn new(db: Database) -> Self {
        LocalSubmitter { db }
    }
}

#[async_trait]
impl SaleSubmitter for LocalSubmitter {
    async fn commit(&self, intent: &SaleIntent) -> SyncResult<CommittedSale> {
        let sale = self.db.sales().commit(&intent.to_commit_request()).await?;
        Ok(sale)
    }

    async fn find_by_key(&self, idempotency_key: &str) -> SyncResult<Option<CommittedSale>> {
        Ok(self.db.sales().find_by_idempotency_key(idempotency_key).await?)
    }
}

// =============================================================================
// HTTP Submitter
// =============================================================================

/// Error body returned by the register server.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    code: String,
    message: String,
    #[serde(default)]
    shortfall_cents: Option<i64>,
}

/// Commits sales against a remote register server.
#[derive(Debug, Clone)]
pub struct HttpSaleSubmitter {
    client: Client,
    base_url: Url,
}

impl HttpSaleSubmitter {
    /// Creates a submitter for the server at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;
        Ok(HttpSaleSubmitter {
            client,
            base_url: normalize_base(base_url)?,
        })
    }

    fn endpoint(&self, path: &str) -> SyncResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Turns a non-success response into the matching error.
    ///
    /// Only gateway and throttling statuses, or a `TRANSIENT` body, are
    /// retryable. A 500 `INTERNAL` is deterministic and comes back as
    /// `Rejected` so the drainer dead-letters it at once.
    async fn error_from(response: reqwest::Response) -> SyncError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if is_retryable_status(status) {
            return SyncError::ServerUnavailable {
                status: status.as_u16(),
                message: body,
            };
        }

        match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(api) if api.code == "TRANSIENT" => SyncError::ServerUnavailable {
                status: status.as_u16(),
                message: api.message,
            },
            Ok(api) => SyncError::Rejected {
                status: status.as_u16(),
                code: api.code,
                message: api.message,
                shortfall_cents: api.shortfall_cents,
            },
            Err(_) => SyncError::Rejected {
                status: status.as_u16(),
                code: status.as_str().to_string(),
                message: body,
                shortfall_cents: None,
            },
        }
    }
}

#[async_trait]
impl SaleSubmitter for HttpSaleSubmitter {
    async fn commit(&self, intent: &SaleIntent) -> SyncResult<CommittedSale> {
        let url = self.endpoint(&format!("sessions/{}/sales", intent.session_id))?;
        debug!(
            idempotency_key = %intent.idempotency_key,
            session_id = %intent.session_id,
            "Submitting sale"
        );

        let response = self
            .client
            .post(url)
            .header(IDEMPOTENCY_KEY_HEADER, &intent.idempotency_key)
            .header(header::ACCEPT, "application/json")
            .json(&intent.request_body())
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Self::error_from(response).await;
            warn!(idempotency_key = %intent.idempotency_key, error = %err, "Sale submission failed");
            return Err(err);
        }

        Ok(response.json::<CommittedSale>().await?)
    }

    async fn find_by_key(&self, idempotency_key: &str) -> SyncResult<Option<CommittedSale>> {
        let url = self.endpoint(&format!("sales/by-key/{}", idempotency_key))?;
        let response = self.client.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(Some(response.json::<CommittedSale>().await?))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Parses a base URL, making sure relative joins append to its path.
pub(crate) fn normalize_base(raw: &str) -> SyncResult<Url> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_appends_slash() {
        let url = normalize_base("http://till.local:8080/api").unwrap();
        assert_eq!(url.join("sales/x").unwrap().as_str(), "http://till.local:8080/api/sales/x");

        let url = normalize_base("http://till.local:8080").unwrap();
        assert_eq!(url.join("health").unwrap().as_str(), "http://till.local:8080/health");
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_retryable_status(StatusCode::NOT_IMPLEMENTED));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpSaleSubmitter::new("no scheme", Duration::from_secs(1)),
            Err(SyncError::InvalidUrl(_))
        ));
    }
}
