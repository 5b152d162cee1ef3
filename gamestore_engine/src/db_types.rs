//! Data types that are persisted by the storefront backends.
//!
//! Buyers and games are owned by the catalog and account subsystems and are read-only from the point of view of the
//! fulfillment engine. Orders, entitlements and the order status log are owned by the engine.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use gamestore_common::Cents;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

//--------------------------------------     BuyerStatus       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BuyerStatus {
    /// The buyer has registered, but has not completed activation.
    Pending,
    /// The buyer may make purchases.
    Active,
    /// The buyer has been locked out by an administrator.
    Suspended,
}

impl Display for BuyerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuyerStatus::Pending => write!(f, "pending"),
            BuyerStatus::Active => write!(f, "active"),
            BuyerStatus::Suspended => write!(f, "suspended"),
        }
    }
}

impl FromStr for BuyerStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            s => Err(ConversionError(format!("Invalid buyer status: {s}"))),
        }
    }
}

//--------------------------------------        Buyer          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Buyer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub status: BuyerStatus,
    pub created_at: DateTime<Utc>,
}

impl Buyer {
    pub fn is_active(&self) -> bool {
        self.status == BuyerStatus::Active
    }
}

#[derive(Debug, Clone)]
pub struct NewBuyer {
    pub name: String,
    pub email: String,
    pub status: BuyerStatus,
}

impl NewBuyer {
    pub fn new<S: Into<String>>(name: S, email: S) -> Self {
        Self { name: name.into(), email: email.into(), status: BuyerStatus::Active }
    }

    pub fn with_status(mut self, status: BuyerStatus) -> Self {
        self.status = status;
        self
    }
}

//--------------------------------------         Game          ---------------------------------------------------------
/// A catalog item. The `price` is in the minor unit of the store currency.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub author: String,
    pub thumbnail: Option<String>,
    pub price: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewGame {
    pub sku: String,
    pub name: String,
    pub author: String,
    pub thumbnail: Option<String>,
    pub price: Cents,
}

impl NewGame {
    pub fn new<S: Into<String>>(sku: S, name: S, author: S, price: Cents) -> Self {
        Self { sku: sku.into(), name: name.into(), author: author.into(), thumbnail: None, price }
    }

    pub fn with_thumbnail<S: Into<String>>(mut self, thumbnail: S) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// A checkout session exists at the gateway and the outcome is not known yet.
    Pending,
    /// The gateway reported a successful payment. Terminal.
    Confirmed,
    /// The payment failed, the checkout session expired, or the order timed out. Terminal.
    Cancelled,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Confirmed => write!(f, "confirmed"),
            OrderStatusType::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The public, opaque identifier of an order. It is generated before the checkout session is created so that it can
/// travel to the gateway in the session metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: i64,
    pub game_id: i64,
    /// The price of the game at the time the order was created
    pub amount: Cents,
    pub currency: String,
    /// The gateway's checkout session id
    pub session_id: String,
    /// The session id until the order is confirmed, then the gateway's payment reference
    pub payment_ref: String,
    pub status: OrderStatusType,
    pub invoice_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub buyer_id: i64,
    pub game_id: i64,
    pub amount: Cents,
    pub currency: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, buyer_id: i64, game_id: i64, amount: Cents, session_id: String) -> Self {
        Self {
            order_id,
            buyer_id,
            game_id,
            amount,
            currency: gamestore_common::DEFAULT_CURRENCY_CODE.to_string(),
            session_id,
            created_at: Utc::now(),
        }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn is_equivalent(&self, order: &Order) -> bool {
        self.order_id == order.order_id &&
            self.buyer_id == order.buyer_id &&
            self.game_id == order.game_id &&
            self.amount == order.amount &&
            self.currency == order.currency &&
            self.session_id == order.session_id
    }
}

//--------------------------------------      Entitlement      ---------------------------------------------------------
/// Ownership of a game by a buyer. There is at most one entitlement per (buyer, game) pair.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Entitlement {
    pub buyer_id: i64,
    pub game_id: i64,
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   OrderStatusChange   ---------------------------------------------------------
/// One row of the order status audit log.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderStatusChange {
    pub id: i64,
    pub order_id: OrderId,
    pub old_status: Option<OrderStatusType>,
    pub new_status: OrderStatusType,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------         Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}
