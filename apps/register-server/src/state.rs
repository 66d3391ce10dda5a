//! Shared server state.

use tokio::sync::broadcast;

use medtill_core::CommittedSale;
use medtill_db::Database;

/// State handed to every handler.
///
/// Cloning is cheap: the database is a pool handle and the sender is
/// reference counted.
#[derive(Clone)]
pub struct AppState {
    db: Database,
    sales_tx: broadcast::Sender<CommittedSale>,
}

impl AppState {
    /// Creates state over an open database.
    pub fn new(db: Database, sale_channel_capacity: usize) -> Self {
        let (sales_tx, _) = broadcast::channel(sale_channel_capacity);
        AppState { db, sales_tx }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Receives every newly committed sale. Replays are not re-announced.
    pub fn subscribe_sales(&self) -> broadcast::Receiver<CommittedSale> {
        self.sales_tx.subscribe()
    }

    /// Announces a committed sale to subscribers.
    pub(crate) fn announce(&self, sale: &CommittedSale) {
        // No subscribers is the normal case
        let _ = self.sales_tx.send(sale.clone());
    }
}
