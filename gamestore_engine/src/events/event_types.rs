use serde::{Deserialize, Serialize};

use crate::db_types::{Buyer, Game, Order, OrderStatusType};

/// Emitted once, after the transaction that moved an order to `confirmed` and granted the entitlement has committed.
///
/// The buyer and game are looked up after the commit for the benefit of notification hooks. They are `None` if that
/// lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmedEvent {
    pub order: Order,
    pub buyer: Option<Buyer>,
    pub game: Option<Game>,
}

impl OrderConfirmedEvent {
    pub fn new(order: Order) -> Self {
        Self { order, buyer: None, game: None }
    }

    pub fn with_buyer(mut self, buyer: Option<Buyer>) -> Self {
        self.buyer = buyer;
        self
    }

    pub fn with_game(mut self, game: Option<Game>) -> Self {
        self.game = game;
        self
    }
}

/// Emitted once when a pending order is cancelled, whether by the gateway or by the expiry sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
    pub reason: String,
}

impl OrderAnnulledEvent {
    pub fn new<S: Into<String>>(order: Order, reason: S) -> Self {
        let status = order.status;
        Self { order, status, reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderConfirmed(OrderConfirmedEvent),
    OrderAnnulled(OrderAnnulledEvent),
}
