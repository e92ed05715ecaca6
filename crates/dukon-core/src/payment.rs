//! # Payment Allocation
//!
//! Turns a heterogeneous list of {method, amount} entries plus an
//! optional exchange rate into a single so'm total.
//!
//! ## Conversion Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Payment Allocation                                   │
//! │                                                                         │
//! │  [{card, 100000}, {uzs, 500000}, {usd, 50}]   exchange_rate = 8600     │
//! │        │              │              │                                  │
//! │        ▼              ▼              ▼                                  │
//! │     +100000       +500000       +50 × 8600                             │
//! │        └──────────────┴──────────────┘                                  │
//! │                       ▼                                                 │
//! │              total = 1030000 so'm                                       │
//! │                                                                         │
//! │  usd without exchange_rate  → MissingExchangeRate                       │
//! │  negative amount            → ValidationError                           │
//! │  zero amount                → dropped (contributes nothing,             │
//! │                               not persisted)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This is the single conversion point in the system. Sale settlement,
//! sale-debt payments, merchant-debt payments, and batch purchases all
//! go through [`allocate_payments`]; no call site branches on the
//! method itself.

use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};
use crate::money::{ExchangeRate, Money};
use crate::types::PaymentMethod;
use crate::CoreError;

// =============================================================================
// Payment Entry
// =============================================================================

/// One {method, amount} pair as submitted by the caller.
///
/// `amount` is in the method's native unit: so'm for card/uzs, whole
/// dollars for usd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub method: PaymentMethod,
    pub amount: i64,
}

impl PaymentEntry {
    pub fn new(method: PaymentMethod, amount: i64) -> Self {
        PaymentEntry { method, amount }
    }
}

// =============================================================================
// Allocation Result
// =============================================================================

/// Result of allocating a payment list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedPayments {
    /// Grand total in so'm, after exchange conversion.
    pub total: Money,

    /// The entries to persist: the input list with zero-amount entries
    /// dropped. One policy for every call site.
    pub entries: Vec<PaymentEntry>,
}

// =============================================================================
// Allocator
// =============================================================================

/// Computes the so'm total of a payment list.
///
/// Pure function - the stateful side (persisting `entries` as payment
/// rows) belongs to the caller's transaction.
///
/// ## Errors
/// - [`CoreError::MissingExchangeRate`] for a USD entry without a rate
/// - [`CoreError::Validation`] for a negative amount
///
/// ## Example
/// ```rust
/// use dukon_core::money::ExchangeRate;
/// use dukon_core::payment::{allocate_payments, PaymentEntry};
/// use dukon_core::types::PaymentMethod;
///
/// let payments = [
///     PaymentEntry::new(PaymentMethod::Uzs, 500_000),
///     PaymentEntry::new(PaymentMethod::Usd, 50),
/// ];
/// let rate = ExchangeRate::new(8_600).unwrap();
/// let allocated = allocate_payments(&payments, Some(rate)).unwrap();
/// assert_eq!(allocated.total.sum(), 930_000);
/// ```
pub fn allocate_payments(
    payments: &[PaymentEntry],
    exchange_rate: Option<ExchangeRate>,
) -> CoreResult<AllocatedPayments> {
    let mut total = Money::zero();
    let mut entries = Vec::with_capacity(payments.len());

    for entry in payments {
        if entry.amount < 0 {
            return Err(ValidationError::MustBeNonNegative {
                field: "amount".to_string(),
            }
            .into());
        }
        if entry.amount == 0 {
            // Contributes nothing; not worth a payment row.
            continue;
        }

        let amount = Money::from_sum(entry.amount);
        total += if entry.method.is_foreign() {
            let rate = exchange_rate.ok_or(CoreError::MissingExchangeRate)?;
            rate.convert(amount)
        } else {
            amount
        };
        entries.push(*entry);
    }

    Ok(AllocatedPayments { total, entries })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(r: i64) -> Option<ExchangeRate> {
        Some(ExchangeRate::new(r).unwrap())
    }

    #[test]
    fn test_base_methods_add_directly() {
        let payments = [
            PaymentEntry::new(PaymentMethod::Card, 100_000),
            PaymentEntry::new(PaymentMethod::Uzs, 250_000),
        ];
        let allocated = allocate_payments(&payments, None).unwrap();
        assert_eq!(allocated.total.sum(), 350_000);
        assert_eq!(allocated.entries.len(), 2);
    }

    #[test]
    fn test_usd_converts_via_exchange_rate() {
        // 500000 + 50 × 8600 = 930000
        let payments = [
            PaymentEntry::new(PaymentMethod::Uzs, 500_000),
            PaymentEntry::new(PaymentMethod::Usd, 50),
        ];
        let allocated = allocate_payments(&payments, rate(8_600)).unwrap();
        assert_eq!(allocated.total.sum(), 930_000);
    }

    #[test]
    fn test_usd_without_rate_fails() {
        let payments = [PaymentEntry::new(PaymentMethod::Usd, 50)];
        let err = allocate_payments(&payments, None).unwrap_err();
        assert!(matches!(err, CoreError::MissingExchangeRate));
    }

    #[test]
    fn test_zero_amounts_are_dropped() {
        let payments = [
            PaymentEntry::new(PaymentMethod::Uzs, 0),
            PaymentEntry::new(PaymentMethod::Card, 700),
            PaymentEntry::new(PaymentMethod::Usd, 0),
        ];
        // Zero usd entries don't require a rate either - they never convert.
        let allocated = allocate_payments(&payments, None).unwrap();
        assert_eq!(allocated.total.sum(), 700);
        assert_eq!(
            allocated.entries,
            vec![PaymentEntry::new(PaymentMethod::Card, 700)]
        );
    }

    #[test]
    fn test_negative_amount_rejected() {
        let payments = [PaymentEntry::new(PaymentMethod::Uzs, -5)];
        let err = allocate_payments(&payments, None).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_empty_list_is_zero() {
        let allocated = allocate_payments(&[], None).unwrap();
        assert_eq!(allocated.total, Money::zero());
        assert!(allocated.entries.is_empty());
    }

    #[test]
    fn test_entry_json_shape() {
        let entry: PaymentEntry =
            serde_json::from_str(r#"{"method":"usd","amount":50}"#).unwrap();
        assert_eq!(entry, PaymentEntry::new(PaymentMethod::Usd, 50));
    }
}
