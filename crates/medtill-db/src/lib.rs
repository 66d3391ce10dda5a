//! # medtill-db: Database Layer for MedTill
//!
//! SQLite storage for drawers, sessions and sales on the server, and for the
//! offline sync queue on the client.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MedTill Data Flow                                │
//! │                                                                         │
//! │  Command (commit_sale)                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     medtill-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ DrawerRepo    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SessionRepo   │    │ 001_init.sql │  │   │
//! │  │   │               │    │ SaleRepo      │    │              │  │   │
//! │  │   │               │    │ SyncQueueRepo │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medtill_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("medtill.db")).await?;
//! let drawer = db.drawers().create("owner-1", "Main").await?;
//! let session = db.sessions().start(&drawer.id, None, None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::drawer::DrawerRepository;
pub use repository::queue::{QueueCounts, SyncQueueRepository};
pub use repository::sale::{CommitRequest, SaleRepository};
pub use repository::session::{CloseOutcome, SessionFilter, SessionRepository};
