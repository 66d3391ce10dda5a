//! # Register Commands
//!
//! Transport-agnostic operations behind the HTTP routes.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs      ◄─── You are here (exports)
//! ├── drawer.rs   ◄─── Drawer creation and listing
//! ├── session.rs  ◄─── Start, close, list, report
//! └── sale.rs     ◄─── Commit and lookup
//! ```
//!
//! ## How Commands Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  routes.rs (axum)                                                       │
//! │  ──────────────────                                                     │
//! │  POST /sessions/{id}/sales                                              │
//! │    State(state), Path(id), HeaderMap, Json(body)                        │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  commands::sale::commit_sale(&state, &id, body, header_key)             │
//! │    -> Result<CommittedSale, ApiError>                                   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  medtill-db repositories (one transaction per mutation)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each command takes the [`AppState`](crate::state::AppState) and plain
//! request values, so tests drive them without a listener.

pub mod drawer;
pub mod sale;
pub mod session;
