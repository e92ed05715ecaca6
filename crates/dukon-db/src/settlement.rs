//! # Settlement Engine
//!
//! The transactional heart of the ledger. Each operation here takes a
//! validated request, runs the pure planning functions from
//! `dukon-core`, and persists the outcome as ONE SQLite transaction.
//!
//! ## Sale Settlement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      create_sale                                        │
//! │                                                                         │
//! │  validate ──▶ allocate_payments ──▶ reconcile vs total_sold             │
//! │                                        │                                │
//! │                 paid > sold ───────────┼──▶ Overpayment (reject)        │
//! │                 paid < sold, no debtor ┼──▶ DebtorRequired (reject)     │
//! │                                        ▼                                │
//! │  BEGIN ─ insert sale ─ per item: plan_fifo + consume batches            │
//! │        ─ open SaleDebt on shortfall ─ payment rows ─ audit ─ COMMIT     │
//! │                                                                         │
//! │  Any error before COMMIT rolls back everything: no sale row, no         │
//! │  consumed stock, no debt, no payment rows.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock consumption uses guarded UPDATEs, so two sales racing on the
//! same batch cannot oversell; the loser gets a retryable
//! [`DbError::Conflict`].

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::notify::{NoopNotifier, Notifier};
use crate::repository::{audit, debt, product, sale};
use dukon_core::validation::{
    validate_batch_request, validate_pay_debt_request, validate_sale_request,
};
use dukon_core::{
    allocate_payments, plan_fifo, AllocatedPayments, CoreError, CreateBatchRequest,
    CreateSaleRequest, DebtReceipt, DebtStatus, DomainEvent, ExchangeRate, MerchantDebt,
    PayDebtRequest, Payment, PaymentRequest, ProductBatch, ProductPayment, Sale, SaleDebt,
    SaleItem, SaleItemBatch, SalePayment,
};

// =============================================================================
// Engine
// =============================================================================

/// Runs multi-table settlement operations atomically.
///
/// Cheap to clone; construct once per database and share.
#[derive(Clone)]
pub struct SettlementEngine {
    pool: SqlitePool,
    notifier: Arc<dyn Notifier>,
}

impl SettlementEngine {
    /// Creates an engine with the default (no-op) notifier.
    pub fn new(pool: SqlitePool) -> Self {
        SettlementEngine {
            pool,
            notifier: Arc::new(NoopNotifier),
        }
    }

    /// Creates an engine that sends customer notifications through
    /// `notifier` after commits.
    pub fn with_notifier(pool: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        SettlementEngine { pool, notifier }
    }

    // =========================================================================
    // Sale Settlement
    // =========================================================================

    /// Settles a sale: allocates stock FIFO across batches, reconciles
    /// payments against the declared total, and opens a customer debt
    /// for any shortfall.
    #[instrument(skip(self, request), fields(merchant = %request.merchant_id))]
    pub async fn create_sale(&self, request: &CreateSaleRequest) -> DbResult<Sale> {
        validate_sale_request(request).map_err(CoreError::from)?;

        let rate = parse_rate(request.exchange_rate)?;
        let allocated = allocate_payments(&request.payments, rate)?;

        let paid = allocated.total.sum();
        let sold = request.total_sold;
        if paid > sold {
            return Err(CoreError::Overpayment { paid, due: sold }.into());
        }

        let shortfall = sold - paid;
        let mut tx = self.pool.begin().await?;

        // An underpaid sale must name the customer who carries the
        // remainder, and that customer must already be registered.
        let debtor = if shortfall > 0 {
            let debtor_id = request
                .debtor_id
                .as_deref()
                .ok_or(CoreError::DebtorRequired { paid, sold })?;
            let debtor = debt::get_debtor(&mut *tx, debtor_id)
                .await?
                .ok_or_else(|| CoreError::DebtorNotFound(debtor_id.to_string()))?;
            Some(debtor)
        } else {
            None
        };

        let now = Utc::now();
        let sale_row = Sale {
            id: sale::generate_sale_id(),
            merchant_id: request.merchant_id.clone(),
            debtor_id: debtor.as_ref().map(|d| d.id.clone()),
            total_sold: sold,
            total_paid: 0,
            created_at: now,
        };
        sale::insert_sale(&mut *tx, &sale_row).await?;

        for item_request in &request.items {
            let product = product::get_product(&mut *tx, &item_request.product_id)
                .await?
                .filter(|p| !p.deleted)
                .ok_or_else(|| CoreError::ProductNotFound(item_request.product_id.clone()))?;

            let item = SaleItem {
                id: sale::generate_sale_item_id(),
                sale_id: sale_row.id.clone(),
                product_id: product.id.clone(),
                quantity: item_request.quantity,
                created_at: now,
            };
            sale::insert_sale_item(&mut *tx, &item).await?;

            let batches = product::open_batches_fifo(&mut *tx, &product.id).await?;
            let draws = plan_fifo(&product.name, &batches, item_request.quantity)?;

            for draw in draws {
                product::consume_batch_quantity(&mut *tx, &draw.batch_id, draw.quantity_used)
                    .await?;
                sale::insert_sale_item_batch(
                    &mut *tx,
                    &SaleItemBatch {
                        id: Uuid::new_v4().to_string(),
                        sale_item_id: item.id.clone(),
                        product_batch_id: draw.batch_id,
                        quantity_used: draw.quantity_used,
                        created_at: now,
                    },
                )
                .await?;
            }
        }

        if let Some(debtor) = &debtor {
            let sale_debt = SaleDebt {
                id: Uuid::new_v4().to_string(),
                debtor_id: debtor.id.clone(),
                sale_id: Some(sale_row.id.clone()),
                amount: shortfall,
                initial_amount: shortfall,
                status: DebtStatus::Open,
                created_at: now,
                updated_at: now,
            };
            debt::insert_sale_debt(&mut *tx, &sale_debt).await?;
            audit::record(
                &mut *tx,
                &DomainEvent::SaleDebtOpened {
                    debt_id: sale_debt.id.clone(),
                    debtor_id: debtor.id.clone(),
                    sale_id: Some(sale_row.id.clone()),
                    amount: shortfall,
                },
                &request.merchant_id,
            )
            .await?;
        }

        if !allocated.entries.is_empty() {
            self.persist_payment_event(
                &mut tx,
                Some(sale_row.id.as_str()),
                debtor.as_ref().map(|d| d.id.as_str()),
                request.exchange_rate,
                &request.merchant_id,
                &allocated,
            )
            .await?;
        }

        sale::set_sale_total_paid(&mut *tx, &sale_row.id, paid).await?;

        audit::record(
            &mut *tx,
            &DomainEvent::SaleCompleted {
                sale_id: sale_row.id.clone(),
                merchant_id: request.merchant_id.clone(),
                total_sold: sold,
                total_paid: paid,
            },
            &request.merchant_id,
        )
        .await?;

        tx.commit().await?;

        info!(sale = %sale_row.id, sold, paid, "Sale settled");

        if let Some(debtor) = &debtor {
            self.notifier.send(
                &debtor.phone_number,
                &format!("Debt of {shortfall} so'm recorded for your purchase."),
            );
        }

        Ok(Sale {
            total_paid: paid,
            ..sale_row
        })
    }

    // =========================================================================
    // Customer Debt Payment
    // =========================================================================

    /// Applies a payment to a customer debt, resolved by sale or by
    /// debt id. Closes the debt when it reaches zero and reflects the
    /// payment on the originating sale's paid total.
    #[instrument(skip(self, request), fields(debtor = %request.debtor_id))]
    pub async fn pay_debt(&self, request: &PayDebtRequest) -> DbResult<DebtReceipt> {
        validate_pay_debt_request(request).map_err(CoreError::from)?;

        let rate = parse_rate(request.exchange_rate)?;
        let allocated = allocate_payments(&request.payments, rate)?;
        let paid = allocated.total.sum();
        if paid <= 0 {
            return Err(CoreError::Validation(
                dukon_core::ValidationError::MustBePositive {
                    field: "payments".to_string(),
                },
            )
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let debtor = debt::get_debtor(&mut *tx, &request.debtor_id)
            .await?
            .ok_or_else(|| CoreError::DebtorNotFound(request.debtor_id.clone()))?;

        let open_debt = match (&request.sale_id, &request.debt_id) {
            (Some(sale_id), _) => debt::find_open_debt_for_sale(&mut *tx, sale_id).await?,
            (None, Some(debt_id)) => debt::get_open_debt(&mut *tx, debt_id).await?,
            (None, None) => None,
        }
        .filter(|d| d.debtor_id == debtor.id)
        .ok_or_else(|| {
            CoreError::DebtNotFound(
                request
                    .sale_id
                    .clone()
                    .or_else(|| request.debt_id.clone())
                    .unwrap_or_default(),
            )
        })?;

        if paid > open_debt.amount {
            return Err(CoreError::Overpayment {
                paid,
                due: open_debt.amount,
            }
            .into());
        }

        let remaining = debt::reduce_sale_debt(&mut *tx, &open_debt.id, paid).await?;

        if let Some(sale_id) = &open_debt.sale_id {
            sale::apply_payment_to_sale(&mut *tx, sale_id, paid).await?;
        }

        let event_id = self
            .persist_payment_event(
                &mut tx,
                open_debt.sale_id.as_deref(),
                Some(debtor.id.as_str()),
                request.exchange_rate,
                &request.merchant_id,
                &allocated,
            )
            .await?;

        let closed = remaining == 0;
        let event = if closed {
            DomainEvent::SaleDebtSettled {
                debt_id: open_debt.id.clone(),
                debtor_id: debtor.id.clone(),
            }
        } else {
            DomainEvent::SaleDebtPaid {
                debt_id: open_debt.id.clone(),
                debtor_id: debtor.id.clone(),
                paid,
                remaining,
            }
        };
        audit::record(&mut *tx, &event, &request.merchant_id).await?;

        tx.commit().await?;

        info!(debt = %open_debt.id, paid, remaining, "Customer debt payment applied");

        let message = if closed {
            "Your debt is fully paid off. Thank you!".to_string()
        } else {
            format!("Payment of {paid} so'm received; {remaining} so'm remains.")
        };
        self.notifier.send(&debtor.phone_number, &message);

        Ok(DebtReceipt {
            payment_event_id: Some(event_id),
            paid,
            remaining,
            closed,
        })
    }

    // =========================================================================
    // Merchant Debt Payment
    // =========================================================================

    /// Pays down what the business owes a supplier for one batch.
    ///
    /// Payment rows land in `product_payments`; there is no payment
    /// event on this side of the ledger, so the receipt carries no
    /// event id.
    #[instrument(skip(self, request))]
    pub async fn pay_merchant_debt(
        &self,
        merchant_id: &str,
        product_batch_id: &str,
        request: &PaymentRequest,
    ) -> DbResult<DebtReceipt> {
        let rate = parse_rate(request.exchange_rate)?;
        let allocated = allocate_payments(&request.payments, rate)?;
        let paid = allocated.total.sum();
        if paid <= 0 {
            return Err(CoreError::Validation(
                dukon_core::ValidationError::MustBePositive {
                    field: "payments".to_string(),
                },
            )
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let open_debt = debt::merchant_debt_for_batch(&mut *tx, product_batch_id)
            .await?
            .ok_or_else(|| CoreError::DebtNotFound(product_batch_id.to_string()))?;

        let due = open_debt.initial_amount - open_debt.paid_amount;
        if paid > due {
            return Err(CoreError::Overpayment { paid, due }.into());
        }

        self.persist_product_payments(
            &mut tx,
            product_batch_id,
            request.exchange_rate,
            merchant_id,
            &allocated,
        )
        .await?;

        let remaining = debt::apply_merchant_debt_payment(&mut *tx, &open_debt.id, paid).await?;

        let closed = remaining == 0;
        let event = if closed {
            DomainEvent::MerchantDebtSettled {
                debt_id: open_debt.id.clone(),
                product_batch_id: product_batch_id.to_string(),
            }
        } else {
            DomainEvent::MerchantDebtPaid {
                debt_id: open_debt.id.clone(),
                product_batch_id: product_batch_id.to_string(),
                paid,
                remaining,
            }
        };
        audit::record(&mut *tx, &event, merchant_id).await?;

        tx.commit().await?;

        info!(debt = %open_debt.id, paid, remaining, "Merchant debt payment applied");

        Ok(DebtReceipt {
            payment_event_id: None,
            paid,
            remaining,
            closed,
        })
    }

    // =========================================================================
    // Batch Intake
    // =========================================================================

    /// Registers a purchased batch. Any attached payment settles part
    /// of the purchase cost; the unpaid remainder opens a merchant
    /// debt toward the supplier.
    #[instrument(skip(self, request), fields(product = %request.product_id))]
    pub async fn create_batch(&self, request: &CreateBatchRequest) -> DbResult<ProductBatch> {
        validate_batch_request(request).map_err(CoreError::from)?;

        let allocated = match &request.payment {
            Some(payment) => {
                let rate = parse_rate(payment.exchange_rate)?;
                Some(allocate_payments(&payment.payments, rate)?)
            }
            None => None,
        };

        let initial = request.buy_price * request.quantity;
        let paid = allocated.as_ref().map(|a| a.total.sum()).unwrap_or(0);
        if paid > initial {
            return Err(CoreError::Overpayment { paid, due: initial }.into());
        }

        let mut tx = self.pool.begin().await?;

        product::get_product(&mut *tx, &request.product_id)
            .await?
            .filter(|p| !p.deleted)
            .ok_or_else(|| CoreError::ProductNotFound(request.product_id.clone()))?;

        let batch = ProductBatch {
            id: product::generate_batch_id(),
            product_id: request.product_id.clone(),
            quantity: request.quantity,
            buy_price: request.buy_price,
            sell_price: request.sell_price,
            deleted: false,
            created_at: Utc::now(),
        };
        product::insert_batch(&mut *tx, &batch).await?;

        audit::record(
            &mut *tx,
            &DomainEvent::BatchCreated {
                batch_id: batch.id.clone(),
                product_id: batch.product_id.clone(),
                quantity: batch.quantity,
                buy_price: batch.buy_price,
                sell_price: batch.sell_price,
            },
            &request.merchant_id,
        )
        .await?;

        if let (Some(allocated), Some(payment)) = (&allocated, &request.payment) {
            self.persist_product_payments(
                &mut tx,
                &batch.id,
                payment.exchange_rate,
                &request.merchant_id,
                allocated,
            )
            .await?;
        }

        if paid < initial {
            let now = Utc::now();
            let merchant_debt = MerchantDebt {
                id: Uuid::new_v4().to_string(),
                merchant_id: request.merchant_id.clone(),
                product_batch_id: batch.id.clone(),
                initial_amount: initial,
                paid_amount: paid,
                status: DebtStatus::Open,
                created_at: now,
                updated_at: now,
            };
            debt::insert_merchant_debt(&mut *tx, &merchant_debt).await?;
            audit::record(
                &mut *tx,
                &DomainEvent::MerchantDebtOpened {
                    debt_id: merchant_debt.id.clone(),
                    product_batch_id: batch.id.clone(),
                    initial_amount: initial,
                    paid_amount: paid,
                },
                &request.merchant_id,
            )
            .await?;
            warn!(
                batch = %batch.id,
                owed = initial - paid,
                "Batch intake underpaid, merchant debt opened"
            );
        }

        tx.commit().await?;

        info!(batch = %batch.id, quantity = batch.quantity, "Batch registered");
        Ok(batch)
    }

    // =========================================================================
    // Shared Persistence Helpers
    // =========================================================================

    /// Writes one payment event plus its per-method rows. Returns the
    /// event id.
    async fn persist_payment_event(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        sale_id: Option<&str>,
        debtor_id: Option<&str>,
        exchange_rate: Option<i64>,
        created_by: &str,
        allocated: &AllocatedPayments,
    ) -> DbResult<String> {
        let event = SalePayment {
            id: sale::generate_payment_id(),
            sale_id: sale_id.map(str::to_string),
            debtor_id: debtor_id.map(str::to_string),
            exchange_rate,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        };
        sale::insert_sale_payment(&mut **tx, &event).await?;

        for entry in &allocated.entries {
            sale::insert_payment(
                &mut **tx,
                &Payment {
                    id: sale::generate_payment_id(),
                    sale_payment_id: event.id.clone(),
                    method: entry.method,
                    amount: entry.amount,
                    created_at: Utc::now(),
                },
            )
            .await?;
        }

        Ok(event.id)
    }

    /// Writes per-method payment rows against a batch purchase.
    async fn persist_product_payments(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        product_batch_id: &str,
        exchange_rate: Option<i64>,
        created_by: &str,
        allocated: &AllocatedPayments,
    ) -> DbResult<()> {
        for entry in &allocated.entries {
            product::insert_product_payment(
                &mut **tx,
                &ProductPayment {
                    id: Uuid::new_v4().to_string(),
                    product_batch_id: product_batch_id.to_string(),
                    method: entry.method,
                    amount: entry.amount,
                    exchange_rate,
                    created_by: created_by.to_string(),
                    created_at: Utc::now(),
                },
            )
            .await?;
        }

        Ok(())
    }
}

/// Parses an optional raw exchange rate into the validated newtype.
fn parse_rate(rate: Option<i64>) -> Result<Option<ExchangeRate>, DbError> {
    match rate {
        Some(raw) => {
            let rate = ExchangeRate::new(raw).map_err(CoreError::from)?;
            Ok(Some(rate))
        }
        None => Ok(None),
    }
}

// =============================================================================
// Integration-Style Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use dukon_core::{
        CreateDebtorRequest, Debtor, PaymentEntry, PaymentMethod, Product, SaleItemRequest,
        UnitType,
    };

    async fn test_db() -> Database {
        // RUST_LOG=debug makes failing settlement tests show the SQL path.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        Database::new(DbConfig::in_memory())
            .await
            .expect("in-memory database")
    }

    async fn seed_product(db: &Database, id: &str) -> Product {
        seed_supplied_product(db, id, "supplier-1").await
    }

    async fn seed_supplied_product(db: &Database, id: &str, supplier_id: &str) -> Product {
        let product = Product {
            id: id.to_string(),
            sku: format!("SKU-{id}"),
            name: format!("Product {id}"),
            description: None,
            unit_type: UnitType::Piece,
            category_id: None,
            supplier_id: supplier_id.to_string(),
            deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        db.products().create(&product).await.unwrap();
        product
    }

    /// Seeds a batch aged `age_secs` into the past so FIFO order between
    /// batches is deterministic.
    async fn seed_batch(
        db: &Database,
        product_id: &str,
        quantity: i64,
        sell_price: i64,
        age_secs: i64,
    ) -> String {
        let batch = ProductBatch {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            quantity,
            buy_price: sell_price / 2,
            sell_price,
            deleted: false,
            created_at: Utc::now() - chrono::Duration::seconds(age_secs),
        };
        product::insert_batch(db.pool(), &batch).await.unwrap();
        batch.id
    }

    async fn seed_debtor(db: &Database, id: &str) -> Debtor {
        let debtor = Debtor {
            id: id.to_string(),
            full_name: "Test Debtor".to_string(),
            phone_number: "+998901234567".to_string(),
            created_at: Utc::now(),
        };
        debt::insert_debtor(db.pool(), &debtor).await.unwrap();
        debtor
    }

    fn cash(amount: i64) -> Vec<PaymentEntry> {
        vec![PaymentEntry::new(PaymentMethod::Uzs, amount)]
    }

    fn sale_request(
        product_id: &str,
        quantity: i64,
        total_sold: i64,
        payments: Vec<PaymentEntry>,
    ) -> CreateSaleRequest {
        CreateSaleRequest {
            merchant_id: "merchant-1".to_string(),
            debtor_id: None,
            total_sold,
            exchange_rate: None,
            items: vec![SaleItemRequest {
                product_id: product_id.to_string(),
                quantity,
            }],
            payments,
        }
    }

    // -------------------------------------------------------------------------
    // Sale settlement
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn fully_paid_sale_consumes_stock_fifo() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;
        let b1 = seed_batch(&db, &product.id, 5, 1_000, 120).await;
        let b2 = seed_batch(&db, &product.id, 10, 1_000, 60).await;

        let sale = db
            .settlement()
            .create_sale(&sale_request(&product.id, 8, 8_000, cash(8_000)))
            .await
            .unwrap();

        assert_eq!(sale.total_sold, 8_000);
        assert_eq!(sale.total_paid, 8_000);
        assert!(sale.debtor_id.is_none());

        let first = product::get_batch(db.pool(), &b1).await.unwrap().unwrap();
        let second = product::get_batch(db.pool(), &b2).await.unwrap().unwrap();
        assert_eq!(first.quantity, 0);
        assert_eq!(second.quantity, 7);

        let items = db.sales().items(&sale.id).await.unwrap();
        assert_eq!(items.len(), 1);
        let draws = db.sales().item_batches(&items[0].id).await.unwrap();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws.iter().map(|d| d.quantity_used).sum::<i64>(), 8);
    }

    #[tokio::test]
    async fn insufficient_stock_rolls_back_everything() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;
        let batch = seed_batch(&db, &product.id, 3, 1_000, 60).await;

        let err = db
            .settlement()
            .create_sale(&sale_request(&product.id, 5, 5_000, cash(5_000)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock {
                available: 3,
                requested: 5,
                ..
            })
        ));

        // Nothing consumed, nothing written.
        let untouched = product::get_batch(db.pool(), &batch).await.unwrap().unwrap();
        assert_eq!(untouched.quantity, 3);
        assert_eq!(db.sales().list_recent(10).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn underpaid_sale_without_debtor_is_rejected() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;
        seed_batch(&db, &product.id, 10, 1_000, 60).await;

        let err = db
            .settlement()
            .create_sale(&sale_request(&product.id, 5, 5_000, cash(3_000)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::DebtorRequired {
                paid: 3_000,
                sold: 5_000
            })
        ));
    }

    #[tokio::test]
    async fn underpaid_sale_opens_customer_debt() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;
        seed_batch(&db, &product.id, 10, 1_000, 60).await;
        let debtor = seed_debtor(&db, "d1").await;

        let mut request = sale_request(&product.id, 5, 5_000, cash(3_000));
        request.debtor_id = Some(debtor.id.clone());

        let sale = db.settlement().create_sale(&request).await.unwrap();
        assert_eq!(sale.total_paid, 3_000);

        let debts = db
            .debts()
            .debts_for_debtor(&debtor.id, Some(DebtStatus::Open))
            .await
            .unwrap();
        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].amount, 2_000);
        assert_eq!(debts[0].initial_amount, 2_000);
        assert_eq!(debts[0].sale_id.as_deref(), Some(sale.id.as_str()));

        assert!(db.debts().has_debt(&debtor.id).await.unwrap());
    }

    #[tokio::test]
    async fn overpaid_sale_is_rejected() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;
        seed_batch(&db, &product.id, 10, 1_000, 60).await;

        let err = db
            .settlement()
            .create_sale(&sale_request(&product.id, 5, 5_000, cash(6_000)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::Overpayment {
                paid: 6_000,
                due: 5_000
            })
        ));
    }

    #[tokio::test]
    async fn usd_payment_requires_exchange_rate() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;
        seed_batch(&db, &product.id, 10, 1_000, 60).await;

        let request = sale_request(
            &product.id,
            1,
            1_000,
            vec![PaymentEntry::new(PaymentMethod::Usd, 1)],
        );

        let err = db.settlement().create_sale(&request).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::MissingExchangeRate)
        ));
    }

    #[tokio::test]
    async fn mixed_currency_payment_converts_usd() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;
        seed_batch(&db, &product.id, 100, 10_000, 60).await;

        // 500 000 so'm cash + 50 USD at 8 600 so'm/USD = 930 000 so'm.
        let mut request = sale_request(
            &product.id,
            93,
            930_000,
            vec![
                PaymentEntry::new(PaymentMethod::Uzs, 500_000),
                PaymentEntry::new(PaymentMethod::Usd, 50),
            ],
        );
        request.exchange_rate = Some(8_600);

        let sale = db.settlement().create_sale(&request).await.unwrap();
        assert_eq!(sale.total_paid, 930_000);
    }

    #[tokio::test]
    async fn zero_amount_payment_entries_are_dropped() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;
        seed_batch(&db, &product.id, 10, 1_000, 60).await;

        let request = sale_request(
            &product.id,
            2,
            2_000,
            vec![
                PaymentEntry::new(PaymentMethod::Uzs, 2_000),
                PaymentEntry::new(PaymentMethod::Card, 0),
            ],
        );

        let sale = db.settlement().create_sale(&request).await.unwrap();

        let events = sqlx::query_scalar::<_, String>(
            "SELECT id FROM sale_payments WHERE sale_id = ?1",
        )
        .bind(&sale.id)
        .fetch_all(db.pool())
        .await
        .unwrap();
        assert_eq!(events.len(), 1);

        let rows = db.sales().payments(&events[0]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].method, PaymentMethod::Uzs);
    }

    #[tokio::test]
    async fn deleted_product_cannot_be_sold() {
        let db = test_db().await;
        let mut product = seed_product(&db, "p1").await;
        seed_batch(&db, &product.id, 10, 1_000, 60).await;

        sqlx::query("UPDATE products SET deleted = 1 WHERE id = ?1")
            .bind(&product.id)
            .execute(db.pool())
            .await
            .unwrap();
        product.deleted = true;

        let err = db
            .settlement()
            .create_sale(&sale_request(&product.id, 1, 1_000, cash(1_000)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn sale_settlement_writes_audit_trail() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;
        seed_batch(&db, &product.id, 10, 1_000, 60).await;

        let sale = db
            .settlement()
            .create_sale(&sale_request(&product.id, 2, 2_000, cash(2_000)))
            .await
            .unwrap();

        let trail = db.audit().for_entity("sale", &sale.id, 10).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, "completed");
        assert_eq!(trail[0].created_by, "merchant-1");
    }

    // -------------------------------------------------------------------------
    // Customer debt payments
    // -------------------------------------------------------------------------

    async fn settle_debt_sale(db: &Database) -> (Sale, Debtor) {
        let product = seed_product(db, "p1").await;
        seed_batch(db, &product.id, 10, 1_000, 60).await;
        let debtor = seed_debtor(db, "d1").await;

        let mut request = sale_request(&product.id, 5, 5_000, cash(2_000));
        request.debtor_id = Some(debtor.id.clone());
        let sale = db.settlement().create_sale(&request).await.unwrap();
        (sale, debtor)
    }

    #[tokio::test]
    async fn partial_debt_payment_keeps_debt_open() {
        let db = test_db().await;
        let (sale, debtor) = settle_debt_sale(&db).await;

        let receipt = db
            .settlement()
            .pay_debt(&PayDebtRequest {
                merchant_id: "merchant-1".to_string(),
                debtor_id: debtor.id.clone(),
                sale_id: Some(sale.id.clone()),
                debt_id: None,
                exchange_rate: None,
                payments: cash(1_000),
            })
            .await
            .unwrap();

        assert_eq!(receipt.paid, 1_000);
        assert_eq!(receipt.remaining, 2_000);
        assert!(!receipt.closed);
        assert!(receipt.payment_event_id.is_some());

        // The originating sale reflects the payment.
        let updated = db.sales().get(&sale.id).await.unwrap();
        assert_eq!(updated.total_paid, 3_000);
        assert!(db.debts().has_debt(&debtor.id).await.unwrap());
    }

    #[tokio::test]
    async fn full_debt_payment_closes_debt() {
        let db = test_db().await;
        let (sale, debtor) = settle_debt_sale(&db).await;

        let receipt = db
            .settlement()
            .pay_debt(&PayDebtRequest {
                merchant_id: "merchant-1".to_string(),
                debtor_id: debtor.id.clone(),
                sale_id: Some(sale.id.clone()),
                debt_id: None,
                exchange_rate: None,
                payments: cash(3_000),
            })
            .await
            .unwrap();

        assert_eq!(receipt.remaining, 0);
        assert!(receipt.closed);

        let updated = db.sales().get(&sale.id).await.unwrap();
        assert_eq!(updated.total_paid, 5_000);
        assert!(!db.debts().has_debt(&debtor.id).await.unwrap());

        let closed = db
            .debts()
            .debts_for_debtor(&debtor.id, Some(DebtStatus::Closed))
            .await
            .unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].amount, 0);
        assert_eq!(closed[0].initial_amount, 3_000);
    }

    #[tokio::test]
    async fn debt_overpayment_is_rejected() {
        let db = test_db().await;
        let (sale, debtor) = settle_debt_sale(&db).await;

        let err = db
            .settlement()
            .pay_debt(&PayDebtRequest {
                merchant_id: "merchant-1".to_string(),
                debtor_id: debtor.id,
                sale_id: Some(sale.id),
                debt_id: None,
                exchange_rate: None,
                payments: cash(4_000),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::Overpayment {
                paid: 4_000,
                due: 3_000
            })
        ));
    }

    #[tokio::test]
    async fn paying_a_nonexistent_debt_fails() {
        let db = test_db().await;
        let debtor = seed_debtor(&db, "d1").await;

        let err = db
            .settlement()
            .pay_debt(&PayDebtRequest {
                merchant_id: "merchant-1".to_string(),
                debtor_id: debtor.id,
                sale_id: None,
                debt_id: Some("missing".to_string()),
                exchange_rate: None,
                payments: cash(100),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::DebtNotFound(_))));
    }

    #[tokio::test]
    async fn manual_debt_can_be_paid_by_debt_id() {
        let db = test_db().await;

        let debtor = db
            .debts()
            .create_debtor(
                &CreateDebtorRequest {
                    full_name: "Karim Rahimov".to_string(),
                    phone_number: "+998901112233".to_string(),
                    debt: Some(dukon_core::ManualDebtRequest {
                        amount: 10_000,
                        sale_id: None,
                    }),
                },
                "merchant-1",
            )
            .await
            .unwrap();

        let debts = db
            .debts()
            .debts_for_debtor(&debtor.id, Some(DebtStatus::Open))
            .await
            .unwrap();
        assert_eq!(debts.len(), 1);

        let receipt = db
            .settlement()
            .pay_debt(&PayDebtRequest {
                merchant_id: "merchant-1".to_string(),
                debtor_id: debtor.id.clone(),
                sale_id: None,
                debt_id: Some(debts[0].id.clone()),
                exchange_rate: None,
                payments: cash(10_000),
            })
            .await
            .unwrap();

        assert!(receipt.closed);
        assert!(!db.debts().has_debt(&debtor.id).await.unwrap());
    }

    // -------------------------------------------------------------------------
    // Batch intake and merchant debt
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn unpaid_batch_opens_full_merchant_debt() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;

        let batch = db
            .settlement()
            .create_batch(&CreateBatchRequest {
                merchant_id: "merchant-1".to_string(),
                product_id: product.id.clone(),
                quantity: 10,
                buy_price: 500,
                sell_price: 800,
                payment: None,
            })
            .await
            .unwrap();

        let debt = db
            .debts()
            .merchant_debt_for_batch(&batch.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(debt.initial_amount, 5_000);
        assert_eq!(debt.paid_amount, 0);
        assert_eq!(debt.status, DebtStatus::Open);
    }

    #[tokio::test]
    async fn partially_paid_batch_opens_remainder_debt() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;

        let batch = db
            .settlement()
            .create_batch(&CreateBatchRequest {
                merchant_id: "merchant-1".to_string(),
                product_id: product.id.clone(),
                quantity: 10,
                buy_price: 500,
                sell_price: 800,
                payment: Some(PaymentRequest {
                    exchange_rate: None,
                    payments: cash(3_000),
                }),
            })
            .await
            .unwrap();

        let debt = db
            .debts()
            .merchant_debt_for_batch(&batch.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(debt.initial_amount, 5_000);
        assert_eq!(debt.paid_amount, 3_000);
    }

    #[tokio::test]
    async fn fully_paid_batch_opens_no_debt() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;

        let batch = db
            .settlement()
            .create_batch(&CreateBatchRequest {
                merchant_id: "merchant-1".to_string(),
                product_id: product.id.clone(),
                quantity: 10,
                buy_price: 500,
                sell_price: 800,
                payment: Some(PaymentRequest {
                    exchange_rate: None,
                    payments: cash(5_000),
                }),
            })
            .await
            .unwrap();

        assert!(db
            .debts()
            .merchant_debt_for_batch(&batch.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn merchant_debt_payment_closes_on_full_payoff() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;

        let batch = db
            .settlement()
            .create_batch(&CreateBatchRequest {
                merchant_id: "merchant-1".to_string(),
                product_id: product.id.clone(),
                quantity: 10,
                buy_price: 500,
                sell_price: 800,
                payment: None,
            })
            .await
            .unwrap();

        let first = db
            .settlement()
            .pay_merchant_debt(
                "merchant-1",
                &batch.id,
                &PaymentRequest {
                    exchange_rate: None,
                    payments: cash(2_000),
                },
            )
            .await
            .unwrap();
        assert_eq!(first.remaining, 3_000);
        assert!(!first.closed);
        assert!(first.payment_event_id.is_none());

        let second = db
            .settlement()
            .pay_merchant_debt(
                "merchant-1",
                &batch.id,
                &PaymentRequest {
                    exchange_rate: None,
                    payments: cash(3_000),
                },
            )
            .await
            .unwrap();
        assert_eq!(second.remaining, 0);
        assert!(second.closed);

        // Once closed, further payments find no open debt.
        let err = db
            .settlement()
            .pay_merchant_debt(
                "merchant-1",
                &batch.id,
                &PaymentRequest {
                    exchange_rate: None,
                    payments: cash(100),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::DebtNotFound(_))));
    }

    #[tokio::test]
    async fn merchant_debt_overpayment_is_rejected() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;

        let batch = db
            .settlement()
            .create_batch(&CreateBatchRequest {
                merchant_id: "merchant-1".to_string(),
                product_id: product.id.clone(),
                quantity: 10,
                buy_price: 500,
                sell_price: 800,
                payment: None,
            })
            .await
            .unwrap();

        let err = db
            .settlement()
            .pay_merchant_debt(
                "merchant-1",
                &batch.id,
                &PaymentRequest {
                    exchange_rate: None,
                    payments: cash(6_000),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::Overpayment {
                paid: 6_000,
                due: 5_000
            })
        ));
    }

    // -------------------------------------------------------------------------
    // Repository reads and guards
    // -------------------------------------------------------------------------

    /// Takes in a 10 × 500 batch (cost 5 000), optionally paying part
    /// of it in cash.
    async fn intake_batch(db: &Database, product_id: &str, paid: Option<i64>) -> ProductBatch {
        db.settlement()
            .create_batch(&CreateBatchRequest {
                merchant_id: "merchant-1".to_string(),
                product_id: product_id.to_string(),
                quantity: 10,
                buy_price: 500,
                sell_price: 800,
                payment: paid.map(|amount| PaymentRequest {
                    exchange_rate: None,
                    payments: cash(amount),
                }),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn supplier_outstanding_groups_open_merchant_debt() {
        let db = test_db().await;
        let p1 = seed_supplied_product(&db, "p1", "supplier-1").await;
        let p2 = seed_supplied_product(&db, "p2", "supplier-2").await;

        intake_batch(&db, &p1.id, None).await;
        intake_batch(&db, &p1.id, None).await;
        let b3 = intake_batch(&db, &p2.id, Some(1_000)).await;

        let summaries = db.debts().supplier_outstanding().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].supplier_id, "supplier-1");
        assert_eq!(summaries[0].batches, 2);
        assert_eq!(summaries[0].outstanding, 10_000);
        assert_eq!(summaries[1].supplier_id, "supplier-2");
        assert_eq!(summaries[1].batches, 1);
        assert_eq!(summaries[1].outstanding, 4_000);

        // A settled debt drops its supplier from the summary.
        db.settlement()
            .pay_merchant_debt(
                "merchant-1",
                &b3.id,
                &PaymentRequest {
                    exchange_rate: None,
                    payments: cash(4_000),
                },
            )
            .await
            .unwrap();
        let summaries = db.debts().supplier_outstanding().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].supplier_id, "supplier-1");
    }

    #[tokio::test]
    async fn drained_batch_draw_is_a_retryable_conflict() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;
        let batch = seed_batch(&db, &product.id, 3, 1_000, 60).await;

        let err = product::consume_batch_quantity(db.pool(), &batch, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert!(err.is_retryable());

        // The guarded UPDATE matched no row, so nothing was consumed.
        let untouched = product::get_batch(db.pool(), &batch).await.unwrap().unwrap();
        assert_eq!(untouched.quantity, 3);
    }

    #[tokio::test]
    async fn products_found_by_sku_and_supplier() {
        let db = test_db().await;
        let product = seed_supplied_product(&db, "p1", "supplier-1").await;
        seed_supplied_product(&db, "p2", "supplier-2").await;

        let found = db.products().get_by_sku("SKU-p1").await.unwrap();
        assert_eq!(found.id, product.id);
        assert!(matches!(
            db.products().get_by_sku("SKU-missing").await.unwrap_err(),
            DbError::NotFound { .. }
        ));

        let listed = db.products().list_by_supplier("supplier-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "p1");
    }

    #[tokio::test]
    async fn adjust_batch_rewrites_quantity_and_audits() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;
        let batch = seed_batch(&db, &product.id, 10, 1_000, 60).await;

        let adjusted = db
            .products()
            .adjust_batch(&batch, 4, "merchant-1")
            .await
            .unwrap();
        assert_eq!(adjusted.quantity, 4);
        let stored = product::get_batch(db.pool(), &batch).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 4);

        let err = db
            .products()
            .adjust_batch(&batch, -1, "merchant-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(_))
        ));

        let trail = db.audit().for_entity("batch", &batch, 10).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, "adjusted");
        assert_eq!(trail[0].created_by, "merchant-1");
    }

    #[tokio::test]
    async fn product_delete_guarded_by_debt_and_stock() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;
        let batch = intake_batch(&db, &product.id, None).await;

        // Open supplier debt blocks both the batch and the product.
        assert!(matches!(
            db.products()
                .void_batch(&batch.id, "merchant-1")
                .await
                .unwrap_err(),
            DbError::Conflict(_)
        ));
        assert!(matches!(
            db.products().delete(&product.id).await.unwrap_err(),
            DbError::Conflict(_)
        ));

        db.settlement()
            .pay_merchant_debt(
                "merchant-1",
                &batch.id,
                &PaymentRequest {
                    exchange_rate: None,
                    payments: cash(5_000),
                },
            )
            .await
            .unwrap();

        // Debt settled, but stock on hand still blocks the product.
        assert!(matches!(
            db.products().delete(&product.id).await.unwrap_err(),
            DbError::Conflict(_)
        ));

        db.products()
            .adjust_batch(&batch.id, 0, "merchant-1")
            .await
            .unwrap();
        db.products().void_batch(&batch.id, "merchant-1").await.unwrap();
        assert!(db.products().open_batches(&product.id).await.unwrap().is_empty());

        db.products().delete(&product.id).await.unwrap();
        let gone = product::get_product(db.pool(), &product.id)
            .await
            .unwrap()
            .unwrap();
        assert!(gone.deleted);
    }

    #[tokio::test]
    async fn sales_totals_track_sold_and_paid() {
        let db = test_db().await;
        let product = seed_product(&db, "p1").await;
        seed_batch(&db, &product.id, 20, 1_000, 60).await;
        let debtor = seed_debtor(&db, "d1").await;

        db.settlement()
            .create_sale(&sale_request(&product.id, 5, 5_000, cash(5_000)))
            .await
            .unwrap();
        let mut request = sale_request(&product.id, 4, 4_000, cash(1_000));
        request.debtor_id = Some(debtor.id.clone());
        db.settlement().create_sale(&request).await.unwrap();

        let totals = db.sales().totals().await.unwrap();
        assert_eq!(totals.sold, 9_000);
        assert_eq!(totals.paid, 6_000);
        assert_eq!(totals.debt(), 3_000);

        assert_eq!(
            db.sales()
                .list_by_merchant("merchant-1", 10)
                .await
                .unwrap()
                .len(),
            2
        );
        assert!(db
            .sales()
            .list_by_merchant("someone-else", 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn debtor_deletion_waits_for_settlement() {
        let db = test_db().await;
        let (sale, debtor) = settle_debt_sale(&db).await;

        assert_eq!(db.debts().total_outstanding().await.unwrap(), 3_000);
        assert!(matches!(
            db.debts().delete_debtor(&debtor.id).await.unwrap_err(),
            DbError::Conflict(_)
        ));

        db.settlement()
            .pay_debt(&PayDebtRequest {
                merchant_id: "merchant-1".to_string(),
                debtor_id: debtor.id.clone(),
                sale_id: Some(sale.id.clone()),
                debt_id: None,
                exchange_rate: None,
                payments: cash(3_000),
            })
            .await
            .unwrap();

        assert_eq!(db.debts().total_outstanding().await.unwrap(), 0);
        db.debts().delete_debtor(&debtor.id).await.unwrap();
        assert!(matches!(
            db.debts().get_debtor(&debtor.id).await.unwrap_err(),
            DbError::NotFound { .. }
        ));
    }
}
