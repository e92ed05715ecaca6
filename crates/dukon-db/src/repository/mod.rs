//! # Repository Module
//!
//! Database repository implementations for the Dukon ledger.
//!
//! ## Repository Pattern, Two Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Repository Layout Explained                           │
//! │                                                                         │
//! │  Each module exposes two things:                                        │
//! │                                                                         │
//! │  1. Executor-generic row operations (free async fns)                    │
//! │     get_product(ex, id), consume_batch_quantity(ex, id, used), ...      │
//! │     These accept either the pool OR a live transaction, so the          │
//! │     settlement engine can run them inside its single transaction.       │
//! │                                                                         │
//! │  2. A pool-holding repository struct for standalone reads/CRUD          │
//! │     ProductRepository, SaleRepository, DebtRepository, Audit...         │
//! │     db.products().get("...").await?                                     │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • SQL is isolated in one place per entity                              │
//! │  • The engine reuses the exact same row operations under its            │
//! │    transaction - no second copy of the SQL                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Product/batch directory and stock corrections
//! - [`sale::SaleRepository`] - Sale reads and ledger totals
//! - [`debt::DebtRepository`] - Debtor lifecycle and debt queries
//! - [`audit::AuditRepository`] - Audit-log reads

pub mod audit;
pub mod debt;
pub mod product;
pub mod sale;
