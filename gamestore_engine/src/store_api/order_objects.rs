use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Cents, OrderId, OrderStatusType},
    traits::AccountApiError,
};

/// What the buyer's client needs to continue a purchase at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseHandle {
    pub order_id: OrderId,
    pub session_id: String,
    pub redirect_url: Option<String>,
    pub client_secret: Option<String>,
    pub amount: Cents,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub buyer_id: Option<i64>,
    pub game_id: Option<i64>,
    pub session_id: Option<String>,
    pub currency: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
}

impl OrderQueryFilter {
    pub fn since<T>(mut self, since: T) -> Result<Self, AccountApiError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = since.try_into().map_err(|e| AccountApiError::QueryError(e.to_string()))?;
        self.since = Some(dt);
        Ok(self)
    }

    pub fn until<T>(mut self, until: T) -> Result<Self, AccountApiError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = until.try_into().map_err(|e| AccountApiError::QueryError(e.to_string()))?;
        self.until = Some(dt);
        Ok(self)
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_buyer_id(mut self, buyer_id: i64) -> Self {
        self.buyer_id = Some(buyer_id);
        self
    }

    pub fn with_game_id(mut self, game_id: i64) -> Self {
        self.game_id = Some(game_id);
        self
    }

    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_currency(mut self, currency: String) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() &&
            self.buyer_id.is_none() &&
            self.game_id.is_none() &&
            self.session_id.is_none() &&
            self.currency.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(order_id) = &self.order_id {
            write!(f, "order_id: {order_id}. ")?;
        }
        if let Some(buyer_id) = &self.buyer_id {
            write!(f, "buyer_id: {buyer_id}. ")?;
        }
        if let Some(game_id) = &self.game_id {
            write!(f, "game_id: {game_id}. ")?;
        }
        if let Some(session_id) = &self.session_id {
            write!(f, "session_id: {session_id}. ")?;
        }
        if let Some(currency) = &self.currency {
            write!(f, "currency: {currency}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since: {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until: {until}. ")?;
        }
        if let Some(status) = &self.status {
            let statuses = status.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        Ok(())
    }
}
