//! # Repository Module
//!
//! Database repository implementations for MedTill.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Command                                                               │
//! │       │  db.sessions().close(&id, 1150, None)                          │
//! │       ▼                                                                 │
//! │  SessionRepository                                                     │
//! │  ├── start(&self, drawer_id, opening, notes)                           │
//! │  ├── close(&self, session_id, counted, notes)                          │
//! │  ├── get(&self, id) / current_for_drawer(&self, drawer_id)             │
//! │  └── list(&self, filter)                                               │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`drawer::DrawerRepository`] - Drawer registry
//! - [`session::SessionRepository`] - Shift lifecycle and close-out
//! - [`sale::SaleRepository`] - Atomic sale commit and lookups
//! - [`queue::SyncQueueRepository`] - Client-side offline queue

pub mod drawer;
pub mod queue;
pub mod sale;
pub mod session;
