//! # Domain Types
//!
//! Core domain types used throughout the register.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Drawer      │   │     Session     │   │      Sale       │       │
//! │  │  ─────────────  │ 1 │  ─────────────  │ 1 │  ─────────────  │       │
//! │  │  id (UUID)      │──►│  drawer_id (FK) │──►│  session_id(FK) │       │
//! │  │  code (per      │ * │  status         │ * │  sale_number    │       │
//! │  │   owner)        │   │  opening/closing│   │  idempotency key│       │
//! │  └─────────────────┘   └─────────────────┘   └───────┬─────────┘       │
//! │                                                      │ owns            │
//! │                                   ┌──────────────────┴───────┐         │
//! │                                   ▼                          ▼         │
//! │                         ┌─────────────────┐        ┌─────────────────┐ │
//! │                         │  SaleLineItem   │        │  PaymentSplit   │ │
//! │                         │  qty, price,    │        │  cash, card,    │ │
//! │                         │  discount, tier │        │  insurance,     │ │
//! │                         └─────────────────┘        │  change         │ │
//! │                                                    └─────────────────┘ │
//! │                                                                         │
//! │  SyncQueueEntry lives on the client device only, until drained.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! - `id`: UUID v4, immutable, used for relations
//! - Business ID: drawer `code`, per-session `sale_number`, idempotency key

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

/// Maximum length of a generated drawer code.
pub const MAX_DRAWER_CODE_LEN: usize = 16;

// =============================================================================
// Session Status
// =============================================================================

/// Lifecycle state of a till session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(SessionStatus::Open),
            "closed" => Ok(SessionStatus::Closed),
            _ => Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: vec!["open".to_string(), "closed".to_string()],
            }),
        }
    }
}

// =============================================================================
// Line Kind
// =============================================================================

/// Whether a persisted line came from the catalog or was typed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Catalog,
    Freeform,
}

// =============================================================================
// Queue State
// =============================================================================

/// State of a client-side queued sale intent.
///
/// ```text
///  pending ──► committed            (server accepted, or replay recognized)
///     │
///     └──────► dead_letter          (permanent failure or retries exhausted)
///                  │
///                  └── requeue ──► pending   (manual resolution)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    Pending,
    Committed,
    DeadLetter,
}

// =============================================================================
// Reimbursement Tier
// =============================================================================

/// Insurer reimbursement rate. Only the fixed tiers 0%, 80% and 100% exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ReimbursementTier {
    #[default]
    None,
    Partial,
    Full,
}

impl ReimbursementTier {
    /// Accepted percentages, in ascending order.
    pub const ALLOWED: [u32; 3] = [0, 80, 100];

    /// Parses a whole-number percentage.
    ///
    /// ## Example
    /// ```rust
    /// use medtill_core::types::ReimbursementTier;
    ///
    /// assert_eq!(ReimbursementTier::from_percent(80).unwrap(), ReimbursementTier::Partial);
    /// assert!(ReimbursementTier::from_percent(75).is_err());
    /// ```
    pub fn from_percent(percent: u32) -> Result<Self, ValidationError> {
        match percent {
            0 => Ok(ReimbursementTier::None),
            80 => Ok(ReimbursementTier::Partial),
            100 => Ok(ReimbursementTier::Full),
            _ => Err(ValidationError::NotAllowed {
                field: "reimbursement_rate".to_string(),
                allowed: Self::ALLOWED.iter().map(|p| p.to_string()).collect(),
            }),
        }
    }

    /// Returns the tier as a whole-number percentage.
    pub const fn percent(&self) -> u32 {
        match self {
            ReimbursementTier::None => 0,
            ReimbursementTier::Partial => 80,
            ReimbursementTier::Full => 100,
        }
    }

    /// Returns the tier in basis points (8000 = 80%).
    pub const fn bps(&self) -> u32 {
        self.percent() * 100
    }

    pub const fn is_covered(&self) -> bool {
        !matches!(self, ReimbursementTier::None)
    }
}

impl TryFrom<u32> for ReimbursementTier {
    type Error = ValidationError;

    fn try_from(percent: u32) -> Result<Self, Self::Error> {
        ReimbursementTier::from_percent(percent)
    }
}

impl From<ReimbursementTier> for u32 {
    fn from(tier: ReimbursementTier) -> Self {
        tier.percent()
    }
}

// =============================================================================
// Drawer
// =============================================================================

/// A physical till owned by one professional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Drawer {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    /// Unique per owner, derived from the name.
    pub code: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A drawer annotated with its open session, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DrawerSummary {
    #[serde(flatten)]
    pub drawer: Drawer,
    pub current_session: Option<Session>,
}

/// Derives a drawer code from a display name.
///
/// Words of ASCII letters and digits are upper-cased and joined with `-`,
/// truncated to [`MAX_DRAWER_CODE_LEN`] characters.
///
/// ## Example
/// ```rust
/// use medtill_core::types::drawer_code;
///
/// assert_eq!(drawer_code("Main").unwrap(), "MAIN");
/// assert_eq!(drawer_code("Front desk 2").unwrap(), "FRONT-DESK-2");
/// assert!(drawer_code("  ").is_err());
/// ```
pub fn drawer_code(name: &str) -> Result<String, ValidationError> {
    let words: Vec<String> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_uppercase())
        .collect();

    if words.is_empty() {
        return Err(ValidationError::InvalidFormat {
            field: "name".to_string(),
            reason: "must contain at least one letter or digit".to_string(),
        });
    }

    let mut code = words.join("-");
    code.truncate(MAX_DRAWER_CODE_LEN);
    Ok(code.trim_end_matches('-').to_string())
}

// =============================================================================
// Session
// =============================================================================

/// One shift on one drawer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Session {
    pub id: String,
    pub drawer_id: String,
    pub status: SessionStatus,
    pub opening_balance_cents: i64,
    /// Number of sales committed so far; also the last assigned sale number.
    pub sale_count: i64,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub counted_cash_cents: Option<i64>,
    pub expected_cash_cents: Option<i64>,
    pub variance_cents: Option<i64>,
    pub notes: Option<String>,
}

impl Session {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    #[inline]
    pub fn opening_balance(&self) -> Money {
        Money::from_cents(self.opening_balance_cents)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub session_id: String,
    /// Sequential within the session, starting at 1.
    pub sale_number: i64,
    pub idempotency_key: Option<String>,
    pub customer_ref: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub net_total_cents: i64,
    pub insurance_covered_cents: i64,
    pub patient_due_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale Line Item
// =============================================================================

/// A persisted sale line. Pricing inputs are frozen at commit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleLineItem {
    pub id: String,
    pub sale_id: String,
    pub position: i64,
    pub kind: LineKind,
    pub catalog_ref: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Resolved discount in cents.
    pub discount_cents: i64,
    /// Discount as entered, when it was a percentage (basis points).
    pub discount_percent_bps: Option<i64>,
    pub insurance_flag: bool,
    pub reimbursement_rate: i64,
    pub insurance_portion_cents: i64,
    pub patient_portion_cents: i64,
}

// =============================================================================
// Payment Split
// =============================================================================

/// How a sale's net total was covered.
///
/// `cash + card + insurance_covered − change_given == net_total`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentSplit {
    pub sale_id: String,
    pub cash_cents: i64,
    pub card_cents: i64,
    pub insurance_covered_cents: i64,
    pub change_given_cents: i64,
}

impl PaymentSplit {
    /// Cash that stays in the drawer: tendered cash minus change handed back.
    #[inline]
    pub fn cash_retained(&self) -> Money {
        Money::from_cents(self.cash_cents - self.change_given_cents)
    }
}

// =============================================================================
// Committed Sale
// =============================================================================

/// A sale with everything it owns, as returned by the committer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommittedSale {
    pub sale: Sale,
    pub lines: Vec<SaleLineItem>,
    pub payment: PaymentSplit,
    /// True when an earlier commit with the same idempotency key was returned.
    #[serde(default)]
    pub replayed: bool,
}

// =============================================================================
// External Collaborators
// =============================================================================

/// Catalog entry consumed from the catalog collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub insurance_eligible: bool,
    /// Whole-number percentage; must be one of 0, 80, 100.
    pub reimbursement_rate: u32,
}

impl CatalogItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// An appointment charge used to pre-seed a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AppointmentCharge {
    pub appointment_id: String,
    pub patient_id: String,
    pub due_amount_cents: i64,
}

// =============================================================================
// Sync Queue
// =============================================================================

/// A sale intent buffered on the client until the server confirms it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SyncQueueEntry {
    /// Local insertion order.
    pub seq: i64,
    pub idempotency_key: String,
    pub drawer_id: String,
    pub session_id: String,
    /// The sale intent as JSON.
    pub payload: String,
    pub state: QueueState,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub committed_sale_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub attempted_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================
