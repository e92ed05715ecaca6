//! # Domain Types
//!
//! Core domain types for the Dukon ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  ProductBatch   │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │◄──│  product_id     │   │  total_sold     │       │
//! │  │  unit_type      │   │  quantity       │   │  total_paid     │       │
//! │  │  supplier_id    │   │  buy/sell price │   │  debtor_id?     │       │
//! │  └─────────────────┘   └────────┬────────┘   └────────┬────────┘       │
//! │                                 │ 1:1                  │ 0..n           │
//! │  ┌─────────────────┐   ┌────────▼────────┐   ┌────────▼────────┐       │
//! │  │     Debtor      │   │  MerchantDebt   │   │    SaleDebt     │       │
//! │  │  ─────────────  │   │  (we owe the    │   │  (debtor owes   │       │
//! │  │  full_name      │   │   supplier)     │   │   the shop)     │       │
//! │  │  phone_number   │   │  paid_amount ↑  │   │  amount ↓       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists (product `sku`, debtor `phone_number`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::money::Money;
use crate::payment::PaymentEntry;

// =============================================================================
// Unit Type
// =============================================================================

/// How a product is measured at the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum UnitType {
    /// Weight-based goods (flour, sugar).
    Kg,
    /// Count-based goods.
    Piece,
}

// =============================================================================
// Payment Method
// =============================================================================

/// Closed set of payment methods.
///
/// ## Why a Closed Enum?
/// Method used to be a free string compared against "card"/"uzs"/"usd"
/// literals at every call site. A tagged enum gives one parse point and
/// one conversion function ([`crate::payment::allocate_payments`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Card terminal payment, already in so'm.
    Card,
    /// Local cash (so'm).
    Uzs,
    /// Foreign cash (US dollars), converted via the exchange rate.
    Usd,
}

impl PaymentMethod {
    /// Parses a method string, case-insensitively.
    ///
    /// Unknown strings fail with [`CoreError::InvalidPaymentMethod`].
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        match raw.to_ascii_lowercase().as_str() {
            "card" => Ok(PaymentMethod::Card),
            "uzs" => Ok(PaymentMethod::Uzs),
            "usd" => Ok(PaymentMethod::Usd),
            _ => Err(CoreError::InvalidPaymentMethod(raw.to_string())),
        }
    }

    /// The wire/storage representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Uzs => "uzs",
            PaymentMethod::Usd => "usd",
        }
    }

    /// Whether amounts in this method need exchange-rate conversion.
    #[inline]
    pub const fn is_foreign(&self) -> bool {
        matches!(self, PaymentMethod::Usd)
    }
}

// =============================================================================
// Debt Status
// =============================================================================

/// Lifecycle of a debt record.
///
/// ## Why Not a `deleted` Flag?
/// The ledger distinguishes "this debt was paid off" (Closed) from
/// "this record was voided" - overloading one boolean for both made
/// historical queries ambiguous. Products and batches keep a separate
/// soft-delete flag; debts only ever move Open → Closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum DebtStatus {
    /// Outstanding amount remains.
    Open,
    /// Fully paid; kept as a historical record.
    Closed,
}

// =============================================================================
// Product & Batch
// =============================================================================

/// A sellable good. Owns zero or more batches.
///
/// Immutable once batches or debts reference it, except for soft fields
/// (name, description).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Optional longer description.
    pub description: Option<String>,

    /// Weight-based or count-based.
    pub unit_type: UnitType,

    /// Category reference (directory collaborator).
    pub category_id: Option<String>,

    /// Supplier reference (directory collaborator).
    pub supplier_id: String,

    /// Soft-delete flag. Deleted products cannot be sold.
    pub deleted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One purchased lot of a product.
///
/// Batches are consumed oldest-first (FIFO by `created_at`); a batch
/// reaching zero quantity remains a historical record, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductBatch {
    pub id: String,
    pub product_id: String,

    /// Remaining units. Invariant: never negative.
    pub quantity: i64,

    /// Cost per unit, in so'm.
    pub buy_price: i64,

    /// Price per unit, in so'm.
    pub sell_price: i64,

    /// Soft-delete flag (a voided batch is excluded from allocation).
    pub deleted: bool,

    pub created_at: DateTime<Utc>,
}

impl ProductBatch {
    /// Returns the buy price as Money.
    #[inline]
    pub fn buy_price(&self) -> Money {
        Money::from_sum(self.buy_price)
    }

    /// Returns the sell price as Money.
    #[inline]
    pub fn sell_price(&self) -> Money {
        Money::from_sum(self.sell_price)
    }

    /// Total purchase cost of the lot (`buy_price × quantity` at creation).
    #[inline]
    pub fn purchase_cost(&self) -> Money {
        self.buy_price().multiply_quantity(self.quantity)
    }
}

/// One payment row against a batch purchase (merchant-debt side).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductPayment {
    pub id: String,
    pub product_batch_id: String,
    pub method: PaymentMethod,
    pub amount: i64,
    pub exchange_rate: Option<i64>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// One completed sale transaction.
///
/// Invariant: `total_paid ≤ total_sold` at all times. `total_paid` may
/// later increase via debt payments until it equals `total_sold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,

    /// Staff member who executed the sale (trusted identity input).
    pub merchant_id: String,

    /// Customer carrying the debt, when the sale was underpaid.
    pub debtor_id: Option<String>,

    /// Declared total of the sale, in so'm.
    pub total_sold: i64,

    /// Sum of all payments converted to so'm.
    pub total_paid: i64,

    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total_sold(&self) -> Money {
        Money::from_sum(self.total_sold)
    }

    #[inline]
    pub fn total_paid(&self) -> Money {
        Money::from_sum(self.total_paid)
    }

    /// Outstanding remainder of this sale.
    #[inline]
    pub fn outstanding(&self) -> Money {
        self.total_sold().saturating_sub(self.total_paid())
    }
}

/// One product line within a sale. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

/// Audit junction: how many units a sale item drew from one batch.
///
/// Multiple rows may exist per item (split across batches). Never
/// deleted - it is the provenance trail for profit calculations
/// (`(sell_price − buy_price) × quantity_used`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItemBatch {
    pub id: String,
    pub sale_item_id: String,
    pub product_batch_id: String,
    pub quantity_used: i64,
    pub created_at: DateTime<Utc>,
}

/// One payment event: carries the exchange rate in effect and owns one
/// or more [`Payment`] rows. Tied to a sale, or only to a debtor for
/// stand-alone debt payoffs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalePayment {
    pub id: String,
    pub sale_id: Option<String>,
    pub debtor_id: Option<String>,
    pub exchange_rate: Option<i64>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// One {method, amount} entry under a payment event.
///
/// `amount` is in the method's native unit; USD rows must be multiplied
/// by the owning event's exchange rate to get so'm. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub sale_payment_id: String,
    pub method: PaymentMethod,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Debt Ledger
// =============================================================================

/// A customer with an open or historical debt relationship.
///
/// Note there is no stored `has_debt` flag: whether a debtor currently
/// owes money is derived with an existence query over open sale debts,
/// so it can never drift out of sync with the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Debtor {
    pub id: String,
    pub full_name: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
}

/// Outstanding amount a debtor owes for a sale (or a manually opened
/// debt with no sale reference).
///
/// Invariant: `0 ≤ amount ≤ initial_amount`;
/// `amount == 0 ⇔ status == Closed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleDebt {
    pub id: String,
    pub debtor_id: String,
    pub sale_id: Option<String>,

    /// Current outstanding, decremented by payments.
    pub amount: i64,

    /// Snapshot at creation. Immutable.
    pub initial_amount: i64,

    pub status: DebtStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SaleDebt {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_sum(self.amount)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == DebtStatus::Open
    }
}

/// Outstanding amount the business owes a supplier for one batch's
/// purchase. One-to-one with the batch.
///
/// Invariant: `0 ≤ paid_amount ≤ initial_amount`; closure occurs
/// exactly when `paid_amount == initial_amount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MerchantDebt {
    pub id: String,
    pub merchant_id: String,
    pub product_batch_id: String,

    /// `buy_price × quantity` at batch creation. Immutable.
    pub initial_amount: i64,

    /// Incremented by payments.
    pub paid_amount: i64,

    pub status: DebtStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MerchantDebt {
    /// What the business still owes on this batch.
    #[inline]
    pub fn outstanding(&self) -> Money {
        Money::from_sum(self.initial_amount - self.paid_amount)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == DebtStatus::Open
    }
}

// =============================================================================
// Request & Receipt Types
// =============================================================================

/// One line item of a sale request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// Inbound sale request.
///
/// `total_sold` is caller-declared: the engine reconciles payments
/// against it but does not recompute it from line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSaleRequest {
    pub merchant_id: String,
    pub debtor_id: Option<String>,
    pub total_sold: i64,
    pub exchange_rate: Option<i64>,
    pub items: Vec<SaleItemRequest>,
    pub payments: Vec<PaymentEntry>,
}

/// Inbound debt-payment request. Exactly one of `sale_id` / `debt_id`
/// identifies the target debt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayDebtRequest {
    pub merchant_id: String,
    pub debtor_id: String,
    pub sale_id: Option<String>,
    pub debt_id: Option<String>,
    pub exchange_rate: Option<i64>,
    pub payments: Vec<PaymentEntry>,
}

/// Payment payload for batch purchases and merchant-debt payments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub exchange_rate: Option<i64>,
    pub payments: Vec<PaymentEntry>,
}

/// Inbound batch-creation request. An attached payment payload settles
/// (part of) the purchase; any shortfall opens a merchant debt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBatchRequest {
    pub merchant_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub buy_price: i64,
    pub sell_price: i64,
    pub payment: Option<PaymentRequest>,
}

/// Opening debt attached to a new debtor (manual debt, no sale).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualDebtRequest {
    pub amount: i64,
    pub sale_id: Option<String>,
}

/// Inbound debtor-creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDebtorRequest {
    pub full_name: String,
    pub phone_number: String,
    pub debt: Option<ManualDebtRequest>,
}

/// Receipt returned by debt-payment operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtReceipt {
    /// Payment event recording this transaction. Merchant-debt payments
    /// persist per-batch payment rows instead of an event and carry no id.
    pub payment_event_id: Option<String>,

    /// Amount applied, in so'm.
    pub paid: i64,

    /// Outstanding after this payment, in so'm.
    pub remaining: i64,

    /// Whether the payment closed the debt.
    pub closed: bool,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_parse() {
        assert_eq!(PaymentMethod::parse("card").unwrap(), PaymentMethod::Card);
        assert_eq!(PaymentMethod::parse("UZS").unwrap(), PaymentMethod::Uzs);
        assert_eq!(PaymentMethod::parse("Usd").unwrap(), PaymentMethod::Usd);
        assert!(matches!(
            PaymentMethod::parse("btc"),
            Err(CoreError::InvalidPaymentMethod(_))
        ));
    }

    #[test]
    fn test_payment_method_wire_names() {
        assert_eq!(PaymentMethod::Card.as_str(), "card");
        assert_eq!(PaymentMethod::Uzs.as_str(), "uzs");
        assert_eq!(PaymentMethod::Usd.as_str(), "usd");
        assert!(PaymentMethod::Usd.is_foreign());
        assert!(!PaymentMethod::Card.is_foreign());
    }

    #[test]
    fn test_payment_method_serde() {
        let m: PaymentMethod = serde_json::from_str("\"usd\"").unwrap();
        assert_eq!(m, PaymentMethod::Usd);
        assert!(serde_json::from_str::<PaymentMethod>("\"btc\"").is_err());
    }

    #[test]
    fn test_merchant_debt_outstanding() {
        let debt = MerchantDebt {
            id: "d1".into(),
            merchant_id: "m1".into(),
            product_batch_id: "b1".into(),
            initial_amount: 600_000,
            paid_amount: 250_000,
            status: DebtStatus::Open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(debt.outstanding().sum(), 350_000);
        assert!(debt.is_open());
    }

    #[test]
    fn test_sale_outstanding() {
        let sale = Sale {
            id: "s1".into(),
            merchant_id: "m1".into(),
            debtor_id: None,
            total_sold: 1_000,
            total_paid: 700,
            created_at: Utc::now(),
        };
        assert_eq!(sale.outstanding().sum(), 300);
    }
}
