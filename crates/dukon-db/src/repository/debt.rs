//! # Debt Repository
//!
//! Database operations for the two-sided debt ledger: debtors with
//! their [`SaleDebt`] rows (customers owe the business) and
//! [`MerchantDebt`] rows (the business owes suppliers).
//!
//! ## Lifecycle Guards
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │          Debt Row State Machine (enforced in SQL)                   │
//! │                                                                     │
//! │   SaleDebt:      amount = initial ──pay──▶ amount − paid            │
//! │                  amount hits 0  ⇒  status flips to 'closed'         │
//! │                  guard: amount >= paid  (never negative)            │
//! │                                                                     │
//! │   MerchantDebt:  paid_amount = 0 ──pay──▶ paid_amount + paid        │
//! │                  paid hits initial ⇒ status flips to 'closed'       │
//! │                  guard: paid_amount + paid <= initial_amount        │
//! │                                                                     │
//! │   Both guards live in the UPDATE's WHERE clause, so two merchants   │
//! │   racing on the same debt cannot overshoot - the loser's UPDATE     │
//! │   matches zero rows and surfaces as a retryable Conflict.           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::audit;
use dukon_core::validation::{validate_full_name, validate_phone_number};
use dukon_core::{CreateDebtorRequest, DebtStatus, Debtor, DomainEvent, MerchantDebt, SaleDebt};

// =============================================================================
// Debtor Row Operations
// =============================================================================

const DEBTOR_COLUMNS: &str = "id, full_name, phone_number, created_at";

/// Gets a debtor by ID.
pub async fn get_debtor<'e, E>(ex: E, id: &str) -> DbResult<Option<Debtor>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let debtor =
        sqlx::query_as::<_, Debtor>(&format!("SELECT {DEBTOR_COLUMNS} FROM debtors WHERE id = ?1"))
            .bind(id)
            .fetch_optional(ex)
            .await?;

    Ok(debtor)
}

/// Inserts a debtor.
pub async fn insert_debtor<'e, E>(ex: E, debtor: &Debtor) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO debtors (id, full_name, phone_number, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(&debtor.id)
    .bind(&debtor.full_name)
    .bind(&debtor.phone_number)
    .bind(debtor.created_at)
    .execute(ex)
    .await?;

    Ok(())
}

/// Whether a debtor currently carries any open debt.
///
/// Derived at read time from the debt rows themselves. A stored flag
/// on the debtor row would have to be kept in sync by every payment
/// path; an EXISTS probe cannot drift.
pub async fn debtor_has_open_debt<'e, E>(ex: E, debtor_id: &str) -> DbResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT EXISTS(SELECT 1 FROM sale_debts WHERE debtor_id = ?1 AND status = 'open')",
    )
    .bind(debtor_id)
    .fetch_one(ex)
    .await?;

    Ok(exists != 0)
}

// =============================================================================
// Sale Debt Row Operations
// =============================================================================

const SALE_DEBT_COLUMNS: &str =
    "id, debtor_id, sale_id, amount, initial_amount, status, created_at, updated_at";

/// Inserts a sale debt.
pub async fn insert_sale_debt<'e, E>(ex: E, debt: &SaleDebt) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(id = %debt.id, debtor = %debt.debtor_id, amount = debt.amount, "Opening sale debt");

    sqlx::query(
        r#"
        INSERT INTO sale_debts
            (id, debtor_id, sale_id, amount, initial_amount, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&debt.id)
    .bind(&debt.debtor_id)
    .bind(&debt.sale_id)
    .bind(debt.amount)
    .bind(debt.initial_amount)
    .bind(debt.status)
    .bind(debt.created_at)
    .bind(debt.updated_at)
    .execute(ex)
    .await?;

    Ok(())
}

/// Gets an open debt by ID.
pub async fn get_open_debt<'e, E>(ex: E, debt_id: &str) -> DbResult<Option<SaleDebt>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let debt = sqlx::query_as::<_, SaleDebt>(&format!(
        "SELECT {SALE_DEBT_COLUMNS} FROM sale_debts WHERE id = ?1 AND status = 'open'"
    ))
    .bind(debt_id)
    .fetch_optional(ex)
    .await?;

    Ok(debt)
}

/// Finds the open debt attached to a sale, if any.
///
/// At most one open debt exists per sale (one is opened at settlement
/// and only ever closed, never reopened).
pub async fn find_open_debt_for_sale<'e, E>(ex: E, sale_id: &str) -> DbResult<Option<SaleDebt>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let debt = sqlx::query_as::<_, SaleDebt>(&format!(
        "SELECT {SALE_DEBT_COLUMNS} FROM sale_debts WHERE sale_id = ?1 AND status = 'open'"
    ))
    .bind(sale_id)
    .fetch_optional(ex)
    .await?;

    Ok(debt)
}

/// Reduces an open sale debt by `paid` so'm, closing it on zero.
///
/// Guarded: the WHERE clause requires the debt to still be open and to
/// still hold at least `paid`. Returns the new outstanding amount.
pub async fn reduce_sale_debt<'e, E>(ex: E, debt_id: &str, paid: i64) -> DbResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let remaining = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE sale_debts
        SET amount = amount - ?2,
            status = CASE WHEN amount - ?2 = 0 THEN 'closed' ELSE status END,
            updated_at = ?3
        WHERE id = ?1 AND status = 'open' AND amount >= ?2
        RETURNING amount
        "#,
    )
    .bind(debt_id)
    .bind(paid)
    .bind(Utc::now())
    .fetch_optional(ex)
    .await?
    .ok_or_else(|| {
        DbError::Conflict(format!("debt {debt_id}: closed or reduced concurrently"))
    })?;

    Ok(remaining)
}

// =============================================================================
// Merchant Debt Row Operations
// =============================================================================

const MERCHANT_DEBT_COLUMNS: &str =
    "id, merchant_id, product_batch_id, initial_amount, paid_amount, status, created_at, \
     updated_at";

/// Inserts a merchant debt.
pub async fn insert_merchant_debt<'e, E>(ex: E, debt: &MerchantDebt) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(
        id = %debt.id,
        batch = %debt.product_batch_id,
        initial = debt.initial_amount,
        "Opening merchant debt"
    );

    sqlx::query(
        r#"
        INSERT INTO merchant_debts
            (id, merchant_id, product_batch_id, initial_amount, paid_amount, status,
             created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&debt.id)
    .bind(&debt.merchant_id)
    .bind(&debt.product_batch_id)
    .bind(debt.initial_amount)
    .bind(debt.paid_amount)
    .bind(debt.status)
    .bind(debt.created_at)
    .bind(debt.updated_at)
    .execute(ex)
    .await?;

    Ok(())
}

/// Finds the open merchant debt for a batch, if any.
///
/// `product_batch_id` is UNIQUE in the schema, so a batch carries at
/// most one merchant debt over its whole life.
pub async fn merchant_debt_for_batch<'e, E>(
    ex: E,
    product_batch_id: &str,
) -> DbResult<Option<MerchantDebt>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let debt = sqlx::query_as::<_, MerchantDebt>(&format!(
        "SELECT {MERCHANT_DEBT_COLUMNS} FROM merchant_debts \
         WHERE product_batch_id = ?1 AND status = 'open'"
    ))
    .bind(product_batch_id)
    .fetch_optional(ex)
    .await?;

    Ok(debt)
}

/// Applies a payment toward a merchant debt, closing it when fully
/// paid.
///
/// Guarded: the payment may never push `paid_amount` past
/// `initial_amount`. Returns the remaining outstanding amount.
pub async fn apply_merchant_debt_payment<'e, E>(ex: E, debt_id: &str, paid: i64) -> DbResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE merchant_debts
        SET paid_amount = paid_amount + ?2,
            status = CASE WHEN paid_amount + ?2 = initial_amount THEN 'closed' ELSE status END,
            updated_at = ?3
        WHERE id = ?1 AND status = 'open' AND paid_amount + ?2 <= initial_amount
        RETURNING initial_amount - paid_amount
        "#,
    )
    .bind(debt_id)
    .bind(paid)
    .bind(Utc::now())
    .fetch_optional(ex)
    .await?
    .ok_or_else(|| {
        DbError::Conflict(format!(
            "merchant debt {debt_id}: closed or paid concurrently"
        ))
    })?;

    Ok(row)
}

// =============================================================================
// Repository
// =============================================================================

/// Per-supplier outstanding merchant debt, aggregated across batches.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SupplierDebtSummary {
    pub supplier_id: String,
    pub batches: i64,
    pub outstanding: i64,
}

/// Repository for debtor management and debt-ledger reads.
#[derive(Debug, Clone)]
pub struct DebtRepository {
    pool: SqlitePool,
}

impl DebtRepository {
    /// Creates a new DebtRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DebtRepository { pool }
    }

    /// Registers a debtor, optionally opening a manual debt in the same
    /// transaction.
    ///
    /// A manual debt has no sale reference; it covers goods handed over
    /// before the ledger existed, or informal lending. Zero-amount
    /// manual debts are rejected rather than silently dropped because
    /// the caller explicitly asked for a debt row.
    pub async fn create_debtor(
        &self,
        request: &CreateDebtorRequest,
        created_by: &str,
    ) -> DbResult<Debtor> {
        validate_full_name(&request.full_name).map_err(dukon_core::CoreError::from)?;
        validate_phone_number(&request.phone_number).map_err(dukon_core::CoreError::from)?;

        if let Some(debt) = &request.debt {
            if debt.amount <= 0 {
                return Err(dukon_core::CoreError::Validation(
                    dukon_core::ValidationError::MustBePositive {
                        field: "debt.amount".to_string(),
                    },
                )
                .into());
            }
        }

        let debtor = Debtor {
            id: Uuid::new_v4().to_string(),
            full_name: request.full_name.trim().to_string(),
            phone_number: request.phone_number.trim().to_string(),
            created_at: Utc::now(),
        };

        let mut tx = self.pool.begin().await?;

        insert_debtor(&mut *tx, &debtor).await?;

        if let Some(manual) = &request.debt {
            let now = Utc::now();
            let debt = SaleDebt {
                id: Uuid::new_v4().to_string(),
                debtor_id: debtor.id.clone(),
                sale_id: manual.sale_id.clone(),
                amount: manual.amount,
                initial_amount: manual.amount,
                status: DebtStatus::Open,
                created_at: now,
                updated_at: now,
            };
            insert_sale_debt(&mut *tx, &debt).await?;
            audit::record(
                &mut *tx,
                &DomainEvent::SaleDebtOpened {
                    debt_id: debt.id.clone(),
                    debtor_id: debtor.id.clone(),
                    sale_id: manual.sale_id.clone(),
                    amount: manual.amount,
                },
                created_by,
            )
            .await?;
        }

        tx.commit().await?;

        info!(id = %debtor.id, name = %debtor.full_name, "Debtor registered");
        Ok(debtor)
    }

    /// Gets a debtor by ID, failing if absent.
    pub async fn get_debtor(&self, id: &str) -> DbResult<Debtor> {
        get_debtor(&self.pool, id)
            .await?
            .ok_or_else(|| DbError::not_found("Debtor", id))
    }

    /// Whether the debtor carries any open debt. Computed, never stored.
    pub async fn has_debt(&self, debtor_id: &str) -> DbResult<bool> {
        debtor_has_open_debt(&self.pool, debtor_id).await
    }

    /// Lists debtors, newest first.
    pub async fn list_debtors(&self) -> DbResult<Vec<Debtor>> {
        let debtors = sqlx::query_as::<_, Debtor>(&format!(
            "SELECT {DEBTOR_COLUMNS} FROM debtors ORDER BY created_at DESC, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(debtors)
    }

    /// Deletes a debtor. Refused while any debt remains open.
    ///
    /// Settled debt rows cascade away with the debtor; sales and
    /// payment rows survive with their debtor reference cleared.
    pub async fn delete_debtor(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        if get_debtor(&mut *tx, id).await?.is_none() {
            return Err(DbError::not_found("Debtor", id));
        }
        if debtor_has_open_debt(&mut *tx, id).await? {
            return Err(DbError::Conflict(format!(
                "debtor {id}: open debt remains, settle before deleting"
            )));
        }

        sqlx::query("DELETE FROM debtors WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Lists a debtor's debts, optionally filtered by status, newest
    /// first.
    pub async fn debts_for_debtor(
        &self,
        debtor_id: &str,
        status: Option<DebtStatus>,
    ) -> DbResult<Vec<SaleDebt>> {
        let debts = match status {
            Some(status) => {
                sqlx::query_as::<_, SaleDebt>(&format!(
                    "SELECT {SALE_DEBT_COLUMNS} FROM sale_debts \
                     WHERE debtor_id = ?1 AND status = ?2 \
                     ORDER BY created_at DESC, id"
                ))
                .bind(debtor_id)
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SaleDebt>(&format!(
                    "SELECT {SALE_DEBT_COLUMNS} FROM sale_debts \
                     WHERE debtor_id = ?1 ORDER BY created_at DESC, id"
                ))
                .bind(debtor_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(debts)
    }

    /// Total outstanding customer debt across the whole ledger.
    pub async fn total_outstanding(&self) -> DbResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0) FROM sale_debts WHERE status = 'open'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Gets the open merchant debt for a batch, if any.
    pub async fn merchant_debt_for_batch(
        &self,
        product_batch_id: &str,
    ) -> DbResult<Option<MerchantDebt>> {
        merchant_debt_for_batch(&self.pool, product_batch_id).await
    }

    /// Outstanding merchant debt grouped by supplier.
    pub async fn supplier_outstanding(&self) -> DbResult<Vec<SupplierDebtSummary>> {
        let summaries = sqlx::query_as::<_, SupplierDebtSummary>(
            r#"
            SELECT p.supplier_id,
                   COUNT(*) AS batches,
                   SUM(m.initial_amount - m.paid_amount) AS outstanding
            FROM merchant_debts m
            JOIN product_batches b ON b.id = m.product_batch_id
            JOIN products p ON p.id = b.product_id
            WHERE m.status = 'open'
            GROUP BY p.supplier_id
            ORDER BY outstanding DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(summaries)
    }
}
