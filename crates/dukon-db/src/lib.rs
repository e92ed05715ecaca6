//! # dukon-db: Storage and Settlement Layer
//!
//! SQLite persistence for the dukon ledger, plus the settlement engine
//! that turns validated requests into atomic multi-table transactions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dukon Data Flow                                  │
//! │                                                                         │
//! │  Caller (API handler, CLI)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     dukon-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌────────────────┐   ┌────────────────┐  │   │
//! │  │   │   Database   │   │  Repositories  │   │   Settlement   │  │   │
//! │  │   │  (pool.rs)   │   │ product / sale │   │     Engine     │  │   │
//! │  │   │              │   │ debt / audit   │   │                │  │   │
//! │  │   │ SqlitePool   │◄──│ row ops +      │◄──│ one op = one   │  │   │
//! │  │   │ WAL, FKs on  │   │ pool structs   │   │ transaction    │  │   │
//! │  │   └──────────────┘   └────────────────┘   └────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   Pure planning (FIFO, payment totaling) lives in dukon-core;  │   │
//! │  │   this crate only persists what the planners decide.           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │                     SQLite Database (dukon.db)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types, conflict classification
//! - [`repository`] - Row operations and read repositories
//! - [`settlement`] - Atomic sale/debt/batch operations
//! - [`notify`] - Post-commit customer notification hook
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dukon_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/dukon.db")).await?;
//!
//! let sale = db.settlement().create_sale(&request).await?;
//! let owed = db.debts().has_debt(&debtor_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod notify;
pub mod pool;
pub mod repository;
pub mod settlement;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use notify::{NoopNotifier, Notifier};
pub use pool::{Database, DbConfig};
pub use settlement::SettlementEngine;

// Repository re-exports for convenience
pub use repository::audit::{AuditEntry, AuditRepository};
pub use repository::debt::{DebtRepository, SupplierDebtSummary};
pub use repository::product::ProductRepository;
pub use repository::sale::{SaleRepository, SalesTotals};
