//! # Product Repository
//!
//! Database operations for products and their batches.
//!
//! ## Batch Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Batch Lifecycle                                   │
//! │                                                                         │
//! │  1. PURCHASE                                                           │
//! │     └── SettlementEngine::create_batch() → quantity = N                │
//! │         (optionally opens a MerchantDebt for the unpaid part)          │
//! │                                                                         │
//! │  2. CONSUMPTION (sales)                                                │
//! │     └── consume_batch_quantity() decrements, oldest batch first        │
//! │         Guarded UPDATE: a row is only touched while it still has       │
//! │         the units - two racing sales cannot both claim them            │
//! │                                                                         │
//! │  3. DRAINED                                                            │
//! │     └── quantity = 0, stays forever as the cost-basis record           │
//! │                                                                         │
//! │  4. (OPTIONAL) CORRECTION / VOID                                       │
//! │     └── adjust_batch() / void_batch() with an audit event              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::audit;
use dukon_core::{DomainEvent, Product, ProductBatch, ProductPayment};

// =============================================================================
// Row Operations (executor-generic)
// =============================================================================

const PRODUCT_COLUMNS: &str =
    "id, sku, name, description, unit_type, category_id, supplier_id, deleted, \
     created_at, updated_at";

const BATCH_COLUMNS: &str =
    "id, product_id, quantity, buy_price, sell_price, deleted, created_at";

/// Gets a product by ID.
pub async fn get_product<'e, E>(ex: E, id: &str) -> DbResult<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;

    Ok(product)
}

/// Gets a product by its business identifier (SKU).
pub async fn get_product_by_sku<'e, E>(ex: E, sku: &str) -> DbResult<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"
    ))
    .bind(sku)
    .fetch_optional(ex)
    .await?;

    Ok(product)
}

/// Inserts a product.
pub async fn insert_product<'e, E>(ex: E, product: &Product) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(id = %product.id, sku = %product.sku, "Inserting product");

    sqlx::query(
        r#"
        INSERT INTO products (
            id, sku, name, description, unit_type,
            category_id, supplier_id, deleted, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&product.id)
    .bind(&product.sku)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.unit_type)
    .bind(&product.category_id)
    .bind(&product.supplier_id)
    .bind(product.deleted)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(ex)
    .await?;

    Ok(())
}

/// Gets a batch by ID.
pub async fn get_batch<'e, E>(ex: E, id: &str) -> DbResult<Option<ProductBatch>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let batch = sqlx::query_as::<_, ProductBatch>(&format!(
        "SELECT {BATCH_COLUMNS} FROM product_batches WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;

    Ok(batch)
}

/// Lists a product's open batches oldest-first.
///
/// This is THE allocation order: FIFO by creation timestamp, id as a
/// deterministic tie-break. Drained and voided batches are excluded.
pub async fn open_batches_fifo<'e, E>(ex: E, product_id: &str) -> DbResult<Vec<ProductBatch>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let batches = sqlx::query_as::<_, ProductBatch>(&format!(
        "SELECT {BATCH_COLUMNS} FROM product_batches \
         WHERE product_id = ?1 AND quantity > 0 AND deleted = 0 \
         ORDER BY created_at, id"
    ))
    .bind(product_id)
    .fetch_all(ex)
    .await?;

    Ok(batches)
}

/// Inserts a batch.
pub async fn insert_batch<'e, E>(ex: E, batch: &ProductBatch) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(id = %batch.id, product_id = %batch.product_id, quantity = batch.quantity, "Inserting batch");

    sqlx::query(
        r#"
        INSERT INTO product_batches (
            id, product_id, quantity, buy_price, sell_price, deleted, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&batch.id)
    .bind(&batch.product_id)
    .bind(batch.quantity)
    .bind(batch.buy_price)
    .bind(batch.sell_price)
    .bind(batch.deleted)
    .bind(batch.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

/// Decrements a batch's remaining quantity for a sale draw.
///
/// ## Concurrency Guard
/// The `quantity >= ?2` predicate makes the decrement a compare-and-
/// swap: if a concurrent sale drained the batch between planning and
/// applying, zero rows match and the whole settlement aborts with a
/// retryable conflict instead of going negative.
pub async fn consume_batch_quantity<'e, E>(ex: E, batch_id: &str, used: i64) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE product_batches
        SET quantity = quantity - ?2
        WHERE id = ?1 AND deleted = 0 AND quantity >= ?2
        "#,
    )
    .bind(batch_id)
    .bind(used)
    .execute(ex)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Conflict(format!(
            "batch {batch_id} was drained concurrently"
        )));
    }

    Ok(())
}

/// Inserts one payment row against a batch purchase.
pub async fn insert_product_payment<'e, E>(ex: E, payment: &ProductPayment) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO product_payments (
            id, product_batch_id, method, amount, exchange_rate, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.product_batch_id)
    .bind(payment.method)
    .bind(payment.amount)
    .bind(payment.exchange_rate)
    .bind(&payment.created_by)
    .bind(payment.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product and batch operations outside settlements.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product in the catalogue.
    pub async fn create(&self, product: &Product) -> DbResult<()> {
        insert_product(&self.pool, product).await
    }

    /// Gets a product by ID, failing if absent.
    pub async fn get(&self, id: &str) -> DbResult<Product> {
        get_product(&self.pool, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Gets a product by SKU, failing if absent.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Product> {
        get_product_by_sku(&self.pool, sku)
            .await?
            .ok_or_else(|| DbError::not_found("Product", sku))
    }

    /// Lists a supplier's products.
    pub async fn list_by_supplier(&self, supplier_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE supplier_id = ?1 AND deleted = 0 \
             ORDER BY created_at DESC"
        ))
        .bind(supplier_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists a product's open batches in allocation order.
    pub async fn open_batches(&self, product_id: &str) -> DbResult<Vec<ProductBatch>> {
        open_batches_fifo(&self.pool, product_id).await
    }

    /// Soft-deletes a product.
    ///
    /// Refused while the product still has stock on hand or an open
    /// supplier debt - deleting it would orphan live ledger state.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let open_debts: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM merchant_debts md
            JOIN product_batches pb ON pb.id = md.product_batch_id
            WHERE pb.product_id = ?1 AND md.status = 'open'
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if open_debts > 0 {
            return Err(DbError::Conflict(format!(
                "product {id} still has open supplier debt"
            )));
        }

        let stock: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM product_batches \
             WHERE product_id = ?1 AND deleted = 0",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if stock > 0 {
            return Err(DbError::Conflict(format!(
                "product {id} still has {stock} units in stock"
            )));
        }

        let result = sqlx::query(
            "UPDATE products SET deleted = 1, updated_at = ?2 WHERE id = ?1 AND deleted = 0",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Manual stock correction on a batch, recorded in the audit log.
    pub async fn adjust_batch(
        &self,
        batch_id: &str,
        new_quantity: i64,
        actor: &str,
    ) -> DbResult<ProductBatch> {
        if new_quantity < 0 {
            return Err(DbError::Domain(
                dukon_core::ValidationError::MustBeNonNegative {
                    field: "quantity".to_string(),
                }
                .into(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let batch = get_batch(&mut *tx, batch_id)
            .await?
            .ok_or_else(|| DbError::not_found("ProductBatch", batch_id))?;

        sqlx::query("UPDATE product_batches SET quantity = ?2 WHERE id = ?1")
            .bind(batch_id)
            .bind(new_quantity)
            .execute(&mut *tx)
            .await?;

        audit::record(
            &mut *tx,
            &DomainEvent::BatchAdjusted {
                batch_id: batch.id.clone(),
                product_id: batch.product_id.clone(),
                old_quantity: batch.quantity,
                new_quantity,
            },
            actor,
        )
        .await?;

        tx.commit().await?;

        Ok(ProductBatch {
            quantity: new_quantity,
            ..batch
        })
    }

    /// Voids a batch (soft delete), recorded in the audit log.
    ///
    /// Refused while the batch's supplier debt is open.
    pub async fn void_batch(&self, batch_id: &str, actor: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let batch = get_batch(&mut *tx, batch_id)
            .await?
            .ok_or_else(|| DbError::not_found("ProductBatch", batch_id))?;

        let open_debt: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM merchant_debts \
             WHERE product_batch_id = ?1 AND status = 'open'",
        )
        .bind(batch_id)
        .fetch_one(&mut *tx)
        .await?;
        if open_debt > 0 {
            return Err(DbError::Conflict(format!(
                "batch {batch_id} still has open supplier debt"
            )));
        }

        let result =
            sqlx::query("UPDATE product_batches SET deleted = 1 WHERE id = ?1 AND deleted = 0")
                .bind(batch_id)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ProductBatch", batch_id));
        }

        audit::record(
            &mut *tx,
            &DomainEvent::BatchDeleted {
                batch_id: batch.id,
                product_id: batch.product_id,
            },
            actor,
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Generates a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new batch ID.
pub fn generate_batch_id() -> String {
    Uuid::new_v4().to_string()
}
