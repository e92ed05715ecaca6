//! # Validation Module
//!
//! Input validation for settlement requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Deserialization (serde)                                      │
//! │  ├── Type/shape checks, closed PaymentMethod enum                      │
//! │  └── Unknown methods never reach business logic                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - field and request validation                   │
//! │  ├── Non-negative amounts, positive rates, bounded quantities          │
//! │  └── Runs before any row is touched                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL, UNIQUE, FOREIGN KEY constraints                         │
//! │  └── CHECK (quantity >= 0) as the last line of defence                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{CreateBatchRequest, CreateSaleRequest, PayDebtRequest};
use crate::{MAX_ITEM_QUANTITY, MAX_SALE_ITEMS, MAX_UNIT_PRICE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a non-empty identifier field.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a debtor's full name.
///
/// ## Rules
/// - Must not be empty
/// - At most 130 characters
pub fn validate_full_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "full_name".to_string(),
        });
    }
    if name.len() > 130 {
        return Err(ValidationError::TooLong {
            field: "full_name".to_string(),
            max: 130,
        });
    }
    Ok(())
}

/// Validates a phone number.
///
/// ## Rules
/// - Must not be empty, at most 40 characters
/// - Digits with optional leading `+`, spaces allowed
pub fn validate_phone_number(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "phone_number".to_string(),
        });
    }
    if phone.len() > 40 {
        return Err(ValidationError::TooLong {
            field: "phone_number".to_string(),
            max: 40,
        });
    }
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if !digits.chars().all(|c| c.is_ascii_digit() || c == ' ') {
        return Err(ValidationError::InvalidFormat {
            field: "phone_number".to_string(),
            reason: "must contain only digits, spaces, and a leading +".to_string(),
        });
    }
    Ok(())
}

/// Validates a monetary amount field (zero is allowed).
pub fn validate_amount(field: &str, amount: i64) -> ValidationResult<()> {
    if amount < 0 {
        return Err(ValidationError::MustBeNonNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a unit price field.
///
/// Bounded so that `price * quantity` stays well inside `i64` for any
/// quantity that passes [`validate_quantity`].
pub fn validate_price(field: &str, price: i64) -> ValidationResult<()> {
    if price < 0 || price > MAX_UNIT_PRICE {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_UNIT_PRICE,
        });
    }
    Ok(())
}

/// Validates a line-item quantity.
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity < 0 || quantity > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a sale request before any row is touched.
pub fn validate_sale_request(request: &CreateSaleRequest) -> ValidationResult<()> {
    validate_required("merchant_id", &request.merchant_id)?;
    validate_amount("total_sold", request.total_sold)?;

    if request.items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }
    if request.items.len() > MAX_SALE_ITEMS {
        return Err(ValidationError::TooMany {
            field: "items".to_string(),
            max: MAX_SALE_ITEMS,
        });
    }
    for item in &request.items {
        validate_required("product_id", &item.product_id)?;
        validate_quantity(item.quantity)?;
    }
    Ok(())
}

/// Validates a debt-payment request.
///
/// The target debt is named either by sale or by debt id; with neither,
/// there is nothing to resolve.
pub fn validate_pay_debt_request(request: &PayDebtRequest) -> ValidationResult<()> {
    validate_required("merchant_id", &request.merchant_id)?;
    validate_required("debtor_id", &request.debtor_id)?;
    if request.sale_id.is_none() && request.debt_id.is_none() {
        return Err(ValidationError::Required {
            field: "sale_id or debt_id".to_string(),
        });
    }
    Ok(())
}

/// Validates a batch-creation request.
pub fn validate_batch_request(request: &CreateBatchRequest) -> ValidationResult<()> {
    validate_required("merchant_id", &request.merchant_id)?;
    validate_required("product_id", &request.product_id)?;
    if request.quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    validate_quantity(request.quantity)?;
    validate_price("buy_price", request.buy_price)?;
    validate_price("sell_price", request.sell_price)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
