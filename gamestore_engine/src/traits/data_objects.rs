use serde::{Deserialize, Serialize};

use crate::db_types::Order;

/// Extra details recorded on an order when it is confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationDetails {
    /// The gateway's authoritative payment reference (e.g. a payment intent id). If absent, the session id is kept.
    pub payment_ref: Option<String>,
    pub invoice_url: Option<String>,
}

impl ConfirmationDetails {
    pub fn new(payment_ref: Option<String>, invoice_url: Option<String>) -> Self {
        Self { payment_ref, invoice_url }
    }
}

/// The result of a guarded status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// This call moved the order out of `pending`. The updated order is returned.
    Transitioned(Order),
    /// The order was no longer `pending`, so nothing was changed. The current state of the order is returned.
    Unchanged(Order),
}
