//! # medtill-core: Pure Register Logic for MedTill
//!
//! Everything the cash-drawer engine decides without touching storage or
//! the network lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MedTill Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              register-server (HTTP/JSON commands)               │   │
//! │  │  start-session, commit-sale, close-session, list-sessions       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ medtill-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌────────┐ ┌────────┐ ┌────────────┐ ┌────────┐ ┌────────┐   │   │
//! │  │   │ types  │ │ money  │ │    cart    │ │ tender │ │ recon- │   │   │
//! │  │   │ Drawer │ │ Money  │ │ settlement │ │ change │ │ cilia- │   │   │
//! │  │   │ Sale   │ │  bps   │ │  split     │ │        │ │  tion  │   │   │
//! │  │   └────────┘ └────────┘ └────────────┘ └────────┘ └────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        medtill-db (SQLite)      medtill-sync (offline queue)    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Drawer, Session, Sale, PaymentSplit, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`cart`] - Cart builder with catalog and free-text lines
//! - [`settlement`] - Subtotal / insurance / patient-due calculation
//! - [`tender`] - Tender sufficiency and change
//! - [`reconciliation`] - Shift report and expected cash
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use medtill_core::cart::Cart;
//! use medtill_core::settlement::compute_totals;
//! use medtill_core::tender::{apply_tender, Tender};
//!
//! let mut cart = Cart::new();
//! cart.add_freeform_item("Consultation", 1, 1000, true, 80).unwrap();
//!
//! let totals = compute_totals(&cart).unwrap();
//! let outcome = apply_tender(&totals, &Tender::cash(200)).unwrap();
//! assert_eq!(outcome.change_given.cents(), 0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod reconciliation;
pub mod settlement;
pub mod tender;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, Discount};
pub use error::{CoreError, CoreResult, ErrorCategory, ValidationError};
pub use money::Money;
pub use reconciliation::ReconciliationReport;
pub use settlement::SettlementTotals;
pub use tender::{Tender, TenderOutcome};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-entry (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest single amount accepted as input: a price, a tender or a cash count.
///
/// A full cart of maximal lines stays far inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000;
