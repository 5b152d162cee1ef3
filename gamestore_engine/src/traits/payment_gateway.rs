//! The contract between the fulfillment engine and a hosted-checkout payment processor.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Cents, OrderId};

pub const METADATA_ORDER_ID: &str = "order_id";
pub const METADATA_BUYER_ID: &str = "buyer_id";
pub const METADATA_GAME_ID: &str = "game_id";

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment gateway could not be reached: {0}")]
    Unavailable(String),
    #[error("The payment gateway rejected the request: {0}")]
    Rejected(String),
    #[error("The payment gateway sent a response we could not understand: {0}")]
    InvalidResponse(String),
}

/// Data that is attached to a checkout session and echoed back by the gateway, linking a payment event to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    pub order_id: OrderId,
    pub buyer_id: i64,
    pub game_id: i64,
}

impl Correlation {
    pub fn new(order_id: OrderId, buyer_id: i64, game_id: i64) -> Self {
        Self { order_id, buyer_id, game_id }
    }

    pub fn to_metadata(&self) -> Vec<(String, String)> {
        vec![
            (METADATA_ORDER_ID.to_string(), self.order_id.to_string()),
            (METADATA_BUYER_ID.to_string(), self.buyer_id.to_string()),
            (METADATA_GAME_ID.to_string(), self.game_id.to_string()),
        ]
    }

    /// Reads the correlation back out of session metadata. All three keys must be present and well-formed.
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Result<Self, String> {
        let order_id = metadata.get(METADATA_ORDER_ID).ok_or_else(|| format!("missing {METADATA_ORDER_ID}"))?;
        if order_id.trim().is_empty() {
            return Err(format!("empty {METADATA_ORDER_ID}"));
        }
        let buyer_id = parse_id(metadata, METADATA_BUYER_ID)?;
        let game_id = parse_id(metadata, METADATA_GAME_ID)?;
        Ok(Self { order_id: OrderId::from(order_id.as_str()), buyer_id, game_id })
    }
}

fn parse_id(metadata: &HashMap<String, String>, key: &str) -> Result<i64, String> {
    metadata
        .get(key)
        .ok_or_else(|| format!("missing {key}"))?
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid {key}: {e}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub amount: Cents,
    pub currency: String,
    pub product_name: String,
    pub product_description: Option<String>,
    /// Absolute URL of a product image. Gateways cannot fetch relative paths.
    pub product_image: Option<String>,
    pub customer_email: Option<String>,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    /// Where to send the buyer to complete payment (hosted checkout)
    pub redirect_url: Option<String>,
    /// Handle for embedded checkout flows
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Open,
    Complete,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl PaymentStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::NoPaymentRequired)
    }
}

/// A definitive result reported by the gateway for a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

/// The gateway's current view of a checkout session, as returned by a synchronous lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub session_id: String,
    pub state: SessionState,
    pub payment_status: PaymentStatus,
    pub correlation: Option<Correlation>,
    pub amount_total: Option<Cents>,
    pub payment_ref: Option<String>,
    pub invoice_id: Option<String>,
}

impl SessionStatus {
    /// Maps the session state to an outcome. `None` means the buyer has not finished paying yet.
    pub fn outcome(&self) -> Option<PaymentOutcome> {
        if self.payment_status.is_settled() {
            Some(PaymentOutcome::Succeeded)
        } else if self.state == SessionState::Expired {
            Some(PaymentOutcome::Failed)
        } else {
            None
        }
    }
}

/// An authenticated, parsed notification from the gateway. Construction of this type is the responsibility of the
/// boundary that verifies the gateway's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayNotification {
    pub event_id: String,
    pub session_id: String,
    pub outcome: PaymentOutcome,
    pub correlation: Correlation,
    pub amount: Option<Cents>,
    pub payment_ref: Option<String>,
    pub invoice_id: Option<String>,
}

/// A hosted-checkout payment processor.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Creates a checkout session for the given amount, carrying the correlation as session metadata.
    async fn create_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, GatewayError>;

    /// Closes an open checkout session so that it can no longer be paid. Returns the session's state afterwards.
    async fn expire_session(&self, session_id: &str) -> Result<SessionStatus, GatewayError>;

    /// Fetches the hosted URL for an invoice, if the gateway has one.
    async fn invoice_url(&self, invoice_id: &str) -> Result<Option<String>, GatewayError>;
}
