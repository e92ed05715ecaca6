//! # Money Module
//!
//! Provides the `Money` and `ExchangeRate` types for handling monetary
//! values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer UZS                                              │
//! │    The business currency (Uzbek so'm) has no fractional unit in         │
//! │    practice, so every amount in the system is a whole i64 number        │
//! │    of so'm. Foreign currency (USD) is converted on entry with an        │
//! │    integer exchange rate and never stored as a float.                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use dukon_core::money::{ExchangeRate, Money};
//!
//! let cash = Money::from_sum(500_000);
//! let rate = ExchangeRate::new(8_600).unwrap();
//!
//! // 50 USD at 8600 so'm/dollar
//! let dollars = rate.convert(Money::from_sum(50));
//! assert_eq!((cash + dollars).sum(), 930_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in whole so'm (the business currency).
///
/// ## Design Decisions
/// - **i64 (signed)**: room for aggregate math; requests reject negatives
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
///
/// EVERY monetary value in the system flows through this type: batch buy
/// and sell prices, sale totals, debt amounts, payment amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from a whole so'm amount.
    ///
    /// ## Example
    /// ```rust
    /// use dukon_core::money::Money;
    ///
    /// let price = Money::from_sum(25_000);
    /// assert_eq!(price.sum(), 25_000);
    /// ```
    #[inline]
    pub const fn from_sum(amount: i64) -> Self {
        Money(amount)
    }

    /// Returns the value as a whole so'm amount.
    #[inline]
    pub const fn sum(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use dukon_core::money::Money;
    ///
    /// let buy_price = Money::from_sum(12_000);
    /// let batch_cost = buy_price.multiply_quantity(50);
    /// assert_eq!(batch_cost.sum(), 600_000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Saturating subtraction that never goes below zero.
    ///
    /// Used for "remaining debt" style displays where a negative value
    /// has no business meaning.
    #[inline]
    pub const fn saturating_sub(&self, other: Self) -> Self {
        let diff = self.0 - other.0;
        if diff < 0 {
            Money(0)
        } else {
            Money(diff)
        }
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// Integer exchange rate: whole so'm per one US dollar.
///
/// ## Why a Newtype?
/// The rate is a bare positive integer in requests ("8600"), but
/// multiplying arbitrary i64s together is exactly how conversion bugs
/// happen. Constructing an `ExchangeRate` validates positivity once;
/// conversion then has a single implementation here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRate(i64);

impl ExchangeRate {
    /// Creates an exchange rate, rejecting non-positive values.
    pub fn new(rate: i64) -> Result<Self, ValidationError> {
        if rate <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "exchange_rate".to_string(),
            });
        }
        Ok(ExchangeRate(rate))
    }

    /// Returns the rate as whole so'm per dollar.
    #[inline]
    pub const fn per_dollar(&self) -> i64 {
        self.0
    }

    /// Converts a USD amount into so'm.
    ///
    /// ## Example
    /// ```rust
    /// use dukon_core::money::{ExchangeRate, Money};
    ///
    /// let rate = ExchangeRate::new(8_600).unwrap();
    /// assert_eq!(rate.convert(Money::from_sum(50)).sum(), 430_000);
    /// ```
    #[inline]
    pub fn convert(&self, usd: Money) -> Money {
        // i128 intermediate: a large USD amount times a rate must not wrap
        let sum = (usd.sum() as i128) * (self.0 as i128);
        Money::from_sum(sum as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for logs and debugging. API layers format for locale.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} so'm", self.0)
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Addition of two Money values.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by i64 (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
