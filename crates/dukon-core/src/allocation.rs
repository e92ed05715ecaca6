//! # Batch Allocation
//!
//! FIFO planning of inventory consumption across a product's batches.
//!
//! ## Consumption Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   FIFO Batch Consumption                                │
//! │                                                                         │
//! │  Request: 8 units of "Shakar"                                           │
//! │                                                                         │
//! │  Batches (oldest first):                                                │
//! │    B1 (created t1)  qty 5   ──► take 5, B1 → 0                         │
//! │    B2 (created t2)  qty 10  ──► take 3, B2 → 7                         │
//! │                                                                         │
//! │  Plan: [{B1, used 5}, {B2, used 3}]                                     │
//! │                                                                         │
//! │  Why oldest first? The buy price lives on the batch, so FIFO            │
//! │  consumption gives a FIFO cost basis for profit reporting.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module only *plans*. Applying the decrements (and holding the
//! row locks that make two concurrent sales safe) is the storage
//! layer's job, inside the enclosing settlement transaction.

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::ProductBatch;

// =============================================================================
// Batch Draw
// =============================================================================

/// One planned draw: how many units to take from which batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDraw {
    pub batch_id: String,
    pub quantity_used: i64,
}

// =============================================================================
// Planner
// =============================================================================

/// Plans FIFO consumption of `requested` units across `batches`.
///
/// `batches` must already be the product's open batches (quantity > 0,
/// not soft-deleted) ordered oldest-first; the storage layer's query
/// guarantees that ordering.
///
/// ## Behavior
/// - Greedily takes `min(batch.quantity, still_needed)` from each batch
///   in order until the request is filled.
/// - `requested == 0` is a no-op returning an empty plan, not an error.
/// - Batches exhausted with units still needed fails with
///   [`CoreError::InsufficientStock`] naming the product; the caller
///   must roll back the whole sale.
pub fn plan_fifo(
    product_name: &str,
    batches: &[ProductBatch],
    requested: i64,
) -> CoreResult<Vec<BatchDraw>> {
    if requested < 0 {
        return Err(ValidationError::MustBeNonNegative {
            field: "quantity".to_string(),
        }
        .into());
    }
    if requested == 0 {
        return Ok(Vec::new());
    }

    let mut remaining = requested;
    let mut draws = Vec::new();

    for batch in batches {
        if remaining == 0 {
            break;
        }
        let used = batch.quantity.min(remaining);
        if used == 0 {
            continue;
        }
        remaining -= used;
        draws.push(BatchDraw {
            batch_id: batch.id.clone(),
            quantity_used: used,
        });
    }

    if remaining > 0 {
        let available: i64 = batches.iter().map(|b| b.quantity).sum();
        return Err(CoreError::InsufficientStock {
            product: product_name.to_string(),
            available,
            requested,
        });
    }

    Ok(draws)
}

// =============================================================================
// Unit Tests
// =============================================================================
