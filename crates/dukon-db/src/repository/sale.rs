//! # Sale Repository
//!
//! Database operations for sales, their line items, the batch
//! provenance trail, and payment events.
//!
//! ## One Sale On Disk
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Settled Sale                                     │
//! │                                                                         │
//! │  sales            1 row   total_sold / total_paid                      │
//! │    └─ sale_items  n rows  one per requested product line               │
//! │         └─ sale_item_batches  m rows  which batch supplied how much    │
//! │    └─ sale_payments  1 row  exchange rate in effect                    │
//! │         └─ payments  k rows  one per {method, amount}                  │
//! │    └─ sale_debts  0..1 row  opened when underpaid                      │
//! │                                                                         │
//! │  All rows land in ONE transaction - a reader never observes a          │
//! │  partially settled sale.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use dukon_core::{Payment, Sale, SaleItem, SaleItemBatch, SalePayment};

// =============================================================================
// Row Operations (executor-generic)
// =============================================================================

const SALE_COLUMNS: &str = "id, merchant_id, debtor_id, total_sold, total_paid, created_at";

/// Gets a sale by ID.
pub async fn get_sale<'e, E>(ex: E, id: &str) -> DbResult<Option<Sale>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sale =
        sqlx::query_as::<_, Sale>(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
            .bind(id)
            .fetch_optional(ex)
            .await?;

    Ok(sale)
}

/// Inserts a sale.
pub async fn insert_sale<'e, E>(ex: E, sale: &Sale) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(id = %sale.id, total_sold = sale.total_sold, "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (id, merchant_id, debtor_id, total_sold, total_paid, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.merchant_id)
    .bind(&sale.debtor_id)
    .bind(sale.total_sold)
    .bind(sale.total_paid)
    .bind(sale.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

/// Inserts a sale line item.
pub async fn insert_sale_item<'e, E>(ex: E, item: &SaleItem) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO sale_items (id, sale_id, product_id, quantity, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(item.quantity)
    .bind(item.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

/// Inserts one provenance row (item ← batch draw).
pub async fn insert_sale_item_batch<'e, E>(ex: E, row: &SaleItemBatch) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO sale_item_batches (id, sale_item_id, product_batch_id, quantity_used, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&row.id)
    .bind(&row.sale_item_id)
    .bind(&row.product_batch_id)
    .bind(row.quantity_used)
    .bind(row.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

/// Inserts a payment event.
pub async fn insert_sale_payment<'e, E>(ex: E, event: &SalePayment) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO sale_payments (id, sale_id, debtor_id, exchange_rate, created_by, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&event.id)
    .bind(&event.sale_id)
    .bind(&event.debtor_id)
    .bind(event.exchange_rate)
    .bind(&event.created_by)
    .bind(event.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

/// Inserts one {method, amount} payment row.
pub async fn insert_payment<'e, E>(ex: E, payment: &Payment) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO payments (id, sale_payment_id, method, amount, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.sale_payment_id)
    .bind(payment.method)
    .bind(payment.amount)
    .bind(payment.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

/// Sets a sale's final paid total during settlement.
///
/// Guarded: the total may never exceed `total_sold`.
pub async fn set_sale_total_paid<'e, E>(ex: E, sale_id: &str, total_paid: i64) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE sales SET total_paid = ?2 WHERE id = ?1 AND ?2 <= total_sold",
    )
    .bind(sale_id)
    .bind(total_paid)
    .execute(ex)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict(format!(
            "sale {sale_id}: paid total would exceed sold total"
        )));
    }

    Ok(())
}

/// Applies a later debt payment to the sale's paid total.
///
/// Guarded read-modify-write: concurrent payments against the same
/// sale serialize on the row, and the invariant
/// `total_paid ≤ total_sold` holds even if a second payment slipped
/// in between resolve and apply.
pub async fn apply_payment_to_sale<'e, E>(ex: E, sale_id: &str, paid: i64) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE sales
        SET total_paid = total_paid + ?2
        WHERE id = ?1 AND total_paid + ?2 <= total_sold
        "#,
    )
    .bind(sale_id)
    .bind(paid)
    .execute(ex)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict(format!(
            "sale {sale_id}: concurrent payment exceeded sold total"
        )));
    }

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Ledger-wide totals across sales: what was sold, what has been paid,
/// and the debt still outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct SalesTotals {
    pub sold: i64,
    pub paid: i64,
}

impl SalesTotals {
    /// The remaining customer debt across all sales.
    pub fn debt(&self) -> i64 {
        self.sold - self.paid
    }
}

/// Repository for sale reads outside settlements.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID, failing if absent.
    pub async fn get(&self, id: &str) -> DbResult<Sale> {
        get_sale(&self.pool, id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))
    }

    /// Gets all line items for a sale, in submission order.
    pub async fn items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT id, sale_id, product_id, quantity, created_at \
             FROM sale_items WHERE sale_id = ?1 ORDER BY created_at, id",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets the provenance trail for one line item.
    pub async fn item_batches(&self, sale_item_id: &str) -> DbResult<Vec<SaleItemBatch>> {
        let rows = sqlx::query_as::<_, SaleItemBatch>(
            "SELECT id, sale_item_id, product_batch_id, quantity_used, created_at \
             FROM sale_item_batches WHERE sale_item_id = ?1 ORDER BY created_at, id",
        )
        .bind(sale_item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Gets all payment rows recorded under a payment event.
    pub async fn payments(&self, sale_payment_id: &str) -> DbResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, Payment>(
            "SELECT id, sale_payment_id, method, amount, created_at \
             FROM payments WHERE sale_payment_id = ?1 ORDER BY created_at, id",
        )
        .bind(sale_payment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Lists the most recent sales.
    pub async fn list_recent(&self, limit: i64) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Lists a merchant's sales, newest first.
    pub async fn list_by_merchant(&self, merchant_id: &str, limit: i64) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE merchant_id = ?1 ORDER BY created_at DESC LIMIT ?2"
        ))
        .bind(merchant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Ledger-wide sold/paid totals (the dashboard "overview" numbers).
    pub async fn totals(&self) -> DbResult<SalesTotals> {
        let totals = sqlx::query_as::<_, SalesTotals>(
            "SELECT COALESCE(SUM(total_sold), 0) AS sold, \
                    COALESCE(SUM(total_paid), 0) AS paid \
             FROM sales",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }
}

/// Generates a new sale ID.
pub fn generate_sale_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new sale item ID.
pub fn generate_sale_item_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new payment ID.
pub fn generate_payment_id() -> String {
    Uuid::new_v4().to_string()
}
