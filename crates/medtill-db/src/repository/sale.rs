//! # Sale Repository
//!
//! The sale committer: turns a settled cart and tender into an immutable
//! sale with its line items and payment split.
//!
//! ## Commit Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Before the transaction (pure, no I/O beyond the key lookup):           │
//! │    idempotency key seen? ──► return the original (replayed = true)     │
//! │    compute_totals(cart), apply_tender(totals, tender)                  │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. UPDATE sessions SET sale_count = sale_count + 1             │   │
//! │  │       WHERE id = ? AND status = 'open' RETURNING sale_count    │   │
//! │  │     (no row → SessionClosed / SessionNotFound)                 │   │
//! │  │                                                                 │   │
//! │  │  2. INSERT INTO sales (sale_number = returned sale_count)       │   │
//! │  │  3. INSERT INTO sale_line_items (one per cart line)             │   │
//! │  │  4. INSERT INTO payment_splits                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← all rows or none                                             │
//! │                                                                         │
//! │  Idempotency key collision on step 2 (a concurrent replay won):        │
//! │    rollback, return the winner's sale (replayed = true)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::session::session_not_open;
use medtill_core::settlement::{compute_totals, line_totals, recompute_from_line_items};
use medtill_core::tender::apply_tender;
use medtill_core::validation::validate_idempotency_key;
use medtill_core::{
    Cart, CommittedSale, CoreError, PaymentSplit, Sale, SaleLineItem, SettlementTotals, Tender,
};

/// Everything needed to commit one sale.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub session_id: String,
    pub cart: Cart,
    pub tender: Tender,
    /// Overrides the cart's customer when set.
    pub customer_ref: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Commits a sale against an open session.
    ///
    /// ## Errors
    /// - `ValidationError` for an empty cart, bad key, bad tender
    /// - `InsufficientPayment` when cash + card is below patient due
    /// - `SessionClosed` / `SessionNotFound` from the guarded write
    ///
    /// A repeated idempotency key is not an error: the original sale is
    /// returned with `replayed = true`, even when its session has closed.
    pub async fn commit(&self, request: &CommitRequest) -> DbResult<CommittedSale> {
        if let Some(key) = request.idempotency_key.as_deref() {
            validate_idempotency_key(key).map_err(CoreError::from)?;

            if let Some(original) = self.find_by_idempotency_key(key).await? {
                info!(
                    idempotency_key = %key,
                    sale_id = %original.sale.id,
                    "Idempotent replay, returning original sale"
                );
                return Ok(original);
            }
        }

        let totals = compute_totals(&request.cart)?;
        let outcome = apply_tender(&totals, &request.tender)?;

        let sale_id = Uuid::new_v4().to_string();
        let customer_ref = request
            .customer_ref
            .clone()
            .or_else(|| request.cart.customer_ref.clone());

        let lines = build_line_items(&sale_id, &request.cart)?;
        let payment = PaymentSplit {
            sale_id: sale_id.clone(),
            cash_cents: outcome.cash.cents(),
            card_cents: outcome.card.cents(),
            insurance_covered_cents: outcome.insurance_covered.cents(),
            change_given_cents: outcome.change_given.cents(),
        };

        debug!(
            session_id = %request.session_id,
            lines = lines.len(),
            patient_due = totals.patient_due.cents(),
            "Committing sale"
        );

        let mut tx = self.pool.begin().await?;

        let sale_number: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE sessions SET sale_count = sale_count + 1
            WHERE id = ?1 AND status = 'open'
            RETURNING sale_count
            "#,
        )
        .bind(&request.session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(sale_number) = sale_number else {
            let err = session_not_open(&mut tx, &request.session_id).await?;
            tx.rollback().await?;
            warn!(session_id = %request.session_id, error = %err, "Sale rejected");
            return Err(err.into());
        };

        let sale = Sale {
            id: sale_id,
            session_id: request.session_id.clone(),
            sale_number,
            idempotency_key: request.idempotency_key.clone(),
            customer_ref,
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount_total.cents(),
            net_total_cents: totals.net_total.cents(),
            insurance_covered_cents: totals.insurance_covered.cents(),
            patient_due_cents: totals.patient_due.cents(),
            created_at: Utc::now(),
        };

        match insert_sale_rows(&mut tx, &sale, &lines, &payment).await {
            Ok(()) => {}
            Err(err) if err.is_unique_on("sales.idempotency_key") => {
                tx.rollback().await?;
                let key = sale.idempotency_key.as_deref().unwrap_or_default();
                return self
                    .find_by_idempotency_key(key)
                    .await?
                    .ok_or_else(|| DbError::not_found("Sale", key));
            }
            Err(err) => return Err(err),
        }

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            session_id = %sale.session_id,
            sale_number = sale.sale_number,
            net_total = sale.net_total_cents,
            change_given = payment.change_given_cents,
            "Sale committed"
        );

        Ok(CommittedSale {
            sale,
            lines,
            payment,
            replayed: false,
        })
    }

    /// Gets a sale by ID with its lines and payment split.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CommittedSale>> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match sale {
            Some(sale) => Ok(Some(self.load_children(sale, false).await?)),
            None => Ok(None),
        }
    }

    /// Gets a sale by ID, failing with `SaleNotFound` when missing.
    pub async fn get_sale(&self, id: &str) -> DbResult<CommittedSale> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(id.to_string()).into())
    }

    /// Looks up a sale by idempotency key.
    ///
    /// A hit is flagged `replayed`: the caller is looking at an earlier
    /// commit, not a new one. Clients use this to resolve a submission whose
    /// outcome they never saw.
    pub async fn find_by_idempotency_key(&self, key: &str) -> DbResult<Option<CommittedSale>> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE idempotency_key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match sale {
            Some(sale) => Ok(Some(self.load_children(sale, true).await?)),
            None => Ok(None),
        }
    }

    /// Lists a session's sales in sale-number order.
    pub async fn list_for_session(&self, session_id: &str) -> DbResult<Vec<CommittedSale>> {
        let mut conn = self.pool.acquire().await?;

        let sales = sqlx::query_as::<_, Sale>(
            "SELECT * FROM sales WHERE session_id = ?1 ORDER BY sale_number",
        )
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut lines_by_sale: HashMap<String, Vec<SaleLineItem>> = HashMap::new();
        for line in sqlx::query_as::<_, SaleLineItem>(
            r#"
            SELECT li.*
            FROM sale_line_items li
            JOIN sales s ON s.id = li.sale_id
            WHERE s.session_id = ?1
            ORDER BY li.sale_id, li.position
            "#,
        )
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?
        {
            lines_by_sale.entry(line.sale_id.clone()).or_default().push(line);
        }

        let mut payments = payments_for_session(&mut conn, session_id).await?;

        sales
            .into_iter()
            .map(|sale| -> DbResult<CommittedSale> {
                let payment = payments
                    .remove(&sale.id)
                    .ok_or_else(|| missing_payment(&sale.id))?;
                Ok(CommittedSale {
                    lines: lines_by_sale.remove(&sale.id).unwrap_or_default(),
                    payment,
                    sale,
                    replayed: false,
                })
            })
            .collect()
    }

    /// Recomputes settlement totals from a sale's persisted line items.
    pub async fn recompute_totals(&self, sale_id: &str) -> DbResult<SettlementTotals> {
        let lines = sqlx::query_as::<_, SaleLineItem>(
            "SELECT * FROM sale_line_items WHERE sale_id = ?1 ORDER BY position",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        if lines.is_empty() {
            return Err(CoreError::SaleNotFound(sale_id.to_string()).into());
        }

        Ok(recompute_from_line_items(&lines)?)
    }

    async fn load_children(&self, sale: Sale, replayed: bool) -> DbResult<CommittedSale> {
        let mut conn = self.pool.acquire().await?;

        let lines = sqlx::query_as::<_, SaleLineItem>(
            "SELECT * FROM sale_line_items WHERE sale_id = ?1 ORDER BY position",
        )
        .bind(&sale.id)
        .fetch_all(&mut *conn)
        .await?;

        let payment =
            sqlx::query_as::<_, PaymentSplit>("SELECT * FROM payment_splits WHERE sale_id = ?1")
                .bind(&sale.id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| missing_payment(&sale.id))?;

        Ok(CommittedSale {
            sale,
            lines,
            payment,
            replayed,
        })
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Freezes the cart into persisted line items.
fn build_line_items(sale_id: &str, cart: &Cart) -> DbResult<Vec<SaleLineItem>> {
    cart.lines
        .iter()
        .enumerate()
        .map(|(position, line)| -> DbResult<SaleLineItem> {
            let pricing = line.pricing();
            let totals = line_totals(&pricing)?;
            Ok(SaleLineItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.to_string(),
                position: position as i64,
                kind: line.kind(),
                catalog_ref: line.catalog_ref().map(str::to_string),
                description: line.description().to_string(),
                quantity: pricing.quantity,
                unit_price_cents: pricing.unit_price.cents(),
                discount_cents: totals.discount.cents(),
                discount_percent_bps: pricing.discount.percent_bps().map(i64::from),
                insurance_flag: pricing.insurance_flag,
                reimbursement_rate: i64::from(pricing.reimbursement_rate),
                insurance_portion_cents: totals.insurance_portion.cents(),
                patient_portion_cents: totals.patient_portion.cents(),
            })
        })
        .collect()
}

async fn insert_sale_rows(
    tx: &mut Transaction<'_, Sqlite>,
    sale: &Sale,
    lines: &[SaleLineItem],
    payment: &PaymentSplit,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, session_id, sale_number, idempotency_key, customer_ref,
            subtotal_cents, discount_cents, net_total_cents,
            insurance_covered_cents, patient_due_cents, created_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8,
            ?9, ?10, ?11
        )
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.session_id)
    .bind(sale.sale_number)
    .bind(&sale.idempotency_key)
    .bind(&sale.customer_ref)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.net_total_cents)
    .bind(sale.insurance_covered_cents)
    .bind(sale.patient_due_cents)
    .bind(sale.created_at)
    .execute(&mut **tx)
    .await?;

    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO sale_line_items (
                id, sale_id, position, kind, catalog_ref, description,
                quantity, unit_price_cents, discount_cents, discount_percent_bps,
                insurance_flag, reimbursement_rate,
                insurance_portion_cents, patient_portion_cents
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12,
                ?13, ?14
            )
            "#,
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(line.position)
        .bind(line.kind)
        .bind(&line.catalog_ref)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.discount_cents)
        .bind(line.discount_percent_bps)
        .bind(line.insurance_flag)
        .bind(line.reimbursement_rate)
        .bind(line.insurance_portion_cents)
        .bind(line.patient_portion_cents)
        .execute(&mut **tx)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO payment_splits (
            sale_id, cash_cents, card_cents, insurance_covered_cents, change_given_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&payment.sale_id)
    .bind(payment.cash_cents)
    .bind(payment.card_cents)
    .bind(payment.insurance_covered_cents)
    .bind(payment.change_given_cents)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn payments_for_session(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> DbResult<HashMap<String, PaymentSplit>> {
    let payments = sqlx::query_as::<_, PaymentSplit>(
        r#"
        SELECT p.*
        FROM payment_splits p
        JOIN sales s ON s.id = p.sale_id
        WHERE s.session_id = ?1
        "#,
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(payments
        .into_iter()
        .map(|p| (p.sale_id.clone(), p))
        .collect())
}

/// Loads every sale of a session with its payment split, in sale-number
/// order. Runs on the caller's connection so it can see the caller's
/// transaction.
pub(crate) async fn load_session_sales(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> DbResult<Vec<(Sale, PaymentSplit)>> {
    let sales = sqlx::query_as::<_, Sale>(
        "SELECT * FROM sales WHERE session_id = ?1 ORDER BY sale_number",
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut payments = payments_for_session(conn, session_id).await?;

    sales
        .into_iter()
        .map(|sale| -> DbResult<(Sale, PaymentSplit)> {
            let payment = payments
                .remove(&sale.id)
                .ok_or_else(|| missing_payment(&sale.id))?;
            Ok((sale, payment))
        })
        .collect()
}

fn missing_payment(sale_id: &str) -> DbError {
    DbError::Corrupt(format!("sale {sale_id} has no payment split"))
}

// =============================================================================
// Unit Tests
// =============================================================================
