//! # dukon-core: Pure Business Logic for the Dukon Settlement Engine
//!
//! This crate is the **heart** of the Dukon ledger. It contains all business
//! logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Dukon Ledger Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  API layer (out of scope)                       │   │
//! │  │    create_sale, pay_debt, pay_merchant_debt, create_batch      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ dukon-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  payment  │  │allocation │  │   │
//! │  │   │  Product  │  │   Money   │  │ converts  │  │FIFO batch │  │   │
//! │  │   │   Sale    │  │ ExchRate  │  │ to UZS    │  │ planning  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    dukon-db (Database Layer)                    │   │
//! │  │       SQLite queries, migrations, transactional settlement      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, ProductBatch, Sale, debts, requests)
//! - [`money`] - Money and exchange-rate types with integer arithmetic
//! - [`payment`] - Multi-method payment allocation into business currency
//! - [`allocation`] - FIFO batch consumption planning
//! - [`events`] - Domain events emitted by settlement operations
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are integer UZS (i64), never floats
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod error;
pub mod events;
pub mod money;
pub mod payment;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use dukon_core::Money` instead of
// `use dukon_core::money::Money`

pub use allocation::{plan_fifo, BatchDraw};
pub use error::{CoreError, CoreResult, ValidationError};
pub use events::DomainEvent;
pub use money::{ExchangeRate, Money};
pub use payment::{allocate_payments, AllocatedPayments, PaymentEntry};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed in a single sale request.
///
/// ## Business Reason
/// Prevents runaway requests and keeps one settlement transaction bounded.
pub const MAX_SALE_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 100000 instead of 100).
pub const MAX_ITEM_QUANTITY: i64 = 1_000_000;

/// Maximum unit price in so'm for a single batch.
///
/// ## Business Reason
/// Catches fat-finger prices before they hit the ledger, and keeps
/// `price * quantity` comfortably inside `i64` (10^9 × 10^6 = 10^15).
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000;
