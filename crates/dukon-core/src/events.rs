//! # Domain Events
//!
//! Explicit events emitted by settlement operations, consumed by the
//! audit-log writer in dukon-db.
//!
//! ## Why Events Instead of Logging Mixins?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Audit Trail via Domain Events                           │
//! │                                                                         │
//! │  SettlementEngine                                                       │
//! │       │  emits DomainEvent values while it works                        │
//! │       ▼                                                                 │
//! │  audit::record(&mut *tx, event)   ← same transaction as the            │
//! │       │                             settlement itself                   │
//! │       ▼                                                                 │
//! │  audit_log table (entity, action, note, JSON payload)                  │
//! │                                                                         │
//! │  The engine never formats log notes or touches the audit table         │
//! │  directly - it only states what happened.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

// =============================================================================
// Domain Event
// =============================================================================

/// Something that happened to the ledger.
///
/// Serialized as tagged JSON into the audit log payload column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A new batch was purchased into inventory.
    BatchCreated {
        batch_id: String,
        product_id: String,
        quantity: i64,
        buy_price: i64,
        sell_price: i64,
    },

    /// A batch's remaining quantity changed outside a sale
    /// (manual stock correction).
    BatchAdjusted {
        batch_id: String,
        product_id: String,
        old_quantity: i64,
        new_quantity: i64,
    },

    /// A batch was voided (soft-deleted).
    BatchDeleted { batch_id: String, product_id: String },

    /// A sale settled: inventory allocated, payments reconciled.
    SaleCompleted {
        sale_id: String,
        merchant_id: String,
        total_sold: i64,
        total_paid: i64,
    },

    /// An underpaid sale (or manual entry) opened a customer debt.
    SaleDebtOpened {
        debt_id: String,
        debtor_id: String,
        sale_id: Option<String>,
        amount: i64,
    },

    /// A payment was applied to a customer debt.
    SaleDebtPaid {
        debt_id: String,
        debtor_id: String,
        paid: i64,
        remaining: i64,
    },

    /// A customer debt reached zero and closed.
    SaleDebtSettled { debt_id: String, debtor_id: String },

    /// A batch purchase was not fully paid; the business owes the
    /// supplier.
    MerchantDebtOpened {
        debt_id: String,
        product_batch_id: String,
        initial_amount: i64,
        paid_amount: i64,
    },

    /// A payment was applied towards a supplier debt.
    MerchantDebtPaid {
        debt_id: String,
        product_batch_id: String,
        paid: i64,
        remaining: i64,
    },

    /// A supplier debt was fully paid and closed.
    MerchantDebtSettled { debt_id: String, product_batch_id: String },
}

impl DomainEvent {
    /// The entity kind this event is about, for audit indexing.
    pub const fn entity_type(&self) -> &'static str {
        match self {
            DomainEvent::BatchCreated { .. }
            | DomainEvent::BatchAdjusted { .. }
            | DomainEvent::BatchDeleted { .. } => "batch",
            DomainEvent::SaleCompleted { .. } => "sale",
            DomainEvent::SaleDebtOpened { .. }
            | DomainEvent::SaleDebtPaid { .. }
            | DomainEvent::SaleDebtSettled { .. } => "sale_debt",
            DomainEvent::MerchantDebtOpened { .. }
            | DomainEvent::MerchantDebtPaid { .. }
            | DomainEvent::MerchantDebtSettled { .. } => "merchant_debt",
        }
    }

    /// The id of the entity this event is about.
    pub fn entity_id(&self) -> &str {
        match self {
            DomainEvent::BatchCreated { batch_id, .. }
            | DomainEvent::BatchAdjusted { batch_id, .. }
            | DomainEvent::BatchDeleted { batch_id, .. } => batch_id,
            DomainEvent::SaleCompleted { sale_id, .. } => sale_id,
            DomainEvent::SaleDebtOpened { debt_id, .. }
            | DomainEvent::SaleDebtPaid { debt_id, .. }
            | DomainEvent::SaleDebtSettled { debt_id, .. } => debt_id,
            DomainEvent::MerchantDebtOpened { debt_id, .. }
            | DomainEvent::MerchantDebtPaid { debt_id, .. }
            | DomainEvent::MerchantDebtSettled { debt_id, .. } => debt_id,
        }
    }

    /// Short action label, for audit filtering.
    pub const fn action(&self) -> &'static str {
        match self {
            DomainEvent::BatchCreated { .. } => "created",
            DomainEvent::BatchAdjusted { .. } => "adjusted",
            DomainEvent::BatchDeleted { .. } => "deleted",
            DomainEvent::SaleCompleted { .. } => "completed",
            DomainEvent::SaleDebtOpened { .. } | DomainEvent::MerchantDebtOpened { .. } => {
                "opened"
            }
            DomainEvent::SaleDebtPaid { .. } | DomainEvent::MerchantDebtPaid { .. } => "paid",
            DomainEvent::SaleDebtSettled { .. } | DomainEvent::MerchantDebtSettled { .. } => {
                "settled"
            }
        }
    }

    /// Human-readable note for the audit row.
    pub fn note(&self) -> String {
        match self {
            DomainEvent::BatchCreated {
                quantity,
                buy_price,
                ..
            } => format!("batch of {quantity} units received at {buy_price} so'm each"),
            DomainEvent::BatchAdjusted {
                old_quantity,
                new_quantity,
                ..
            } => format!("quantity adjusted {old_quantity} → {new_quantity}"),
            DomainEvent::BatchDeleted { .. } => "batch voided".to_string(),
            DomainEvent::SaleCompleted {
                total_sold,
                total_paid,
                ..
            } => format!("sale settled: sold {total_sold}, paid {total_paid}"),
            DomainEvent::SaleDebtOpened { amount, .. } => {
                format!("customer debt opened for {amount} so'm")
            }
            DomainEvent::SaleDebtPaid {
                paid, remaining, ..
            } => format!("customer paid {paid} so'm, {remaining} so'm outstanding"),
            DomainEvent::SaleDebtSettled { .. } => "customer debt fully paid".to_string(),
            DomainEvent::MerchantDebtOpened {
                initial_amount,
                paid_amount,
                ..
            } => format!(
                "supplier debt opened: {initial_amount} so'm due, {paid_amount} so'm paid upfront"
            ),
            DomainEvent::MerchantDebtPaid {
                paid, remaining, ..
            } => format!("supplier paid {paid} so'm, {remaining} so'm outstanding"),
            DomainEvent::MerchantDebtSettled { .. } => "supplier debt fully paid".to_string(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_classification() {
        let event = DomainEvent::SaleDebtOpened {
            debt_id: "d1".into(),
            debtor_id: "c1".into(),
            sale_id: Some("s1".into()),
            amount: 300,
        };
        assert_eq!(event.entity_type(), "sale_debt");
        assert_eq!(event.entity_id(), "d1");
        assert_eq!(event.action(), "opened");
    }

    #[test]
    fn test_note_mentions_amounts() {
        let event = DomainEvent::MerchantDebtOpened {
            debt_id: "d1".into(),
            product_batch_id: "b1".into(),
            initial_amount: 600_000,
            paid_amount: 200_000,
        };
        let note = event.note();
        assert!(note.contains("600000"));
        assert!(note.contains("200000"));
    }

    #[test]
    fn test_tagged_json() {
        let event = DomainEvent::BatchDeleted {
            batch_id: "b1".into(),
            product_id: "p1".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"batch_deleted\""));
    }
}
