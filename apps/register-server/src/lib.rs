//! # MedTill Register Server
//!
//! HTTP/JSON command surface for drawers, shifts and sales.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Register (medtill-sync) ──► HTTP/JSON ──► routes.rs (axum)            │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                                         commands/*  ◄── &AppState       │
//! │                                               │                         │
//! │                          ┌────────────────────┴──────────┐              │
//! │                          ▼                               ▼              │
//! │                   medtill-db (SQLite)          broadcast<CommittedSale> │
//! │                                                 (accounting, reports)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Environment configuration
//! - [`error`] - `ApiError` and the status-code mapping
//! - [`state`] - Shared state (database + sale channel)
//! - [`commands`] - Transport-agnostic operations
//! - [`routes`] - axum router

pub mod commands;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ErrorCode};
pub use routes::router;
pub use state::AppState;

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,medtill=debug,register_server=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .init();
}
