use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use gamestore_engine::{
    db_types::{OrderId, OrderStatusType},
    order_objects::OrderQueryFilter,
};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurchaseRequest {
    pub game_id: i64,
}

/// Query string for the admin order search. `status` is a comma-separated list, e.g. `status=pending,cancelled`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderSearchParams {
    pub order_id: Option<String>,
    pub buyer_id: Option<i64>,
    pub game_id: Option<i64>,
    pub session_id: Option<String>,
    pub currency: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

impl TryFrom<OrderSearchParams> for OrderQueryFilter {
    type Error = ServerError;

    fn try_from(params: OrderSearchParams) -> Result<Self, Self::Error> {
        let mut filter = OrderQueryFilter {
            order_id: params.order_id.map(OrderId::from),
            buyer_id: params.buyer_id,
            game_id: params.game_id,
            session_id: params.session_id,
            currency: params.currency.map(|c| c.to_ascii_lowercase()),
            since: params.since,
            until: params.until,
            status: None,
        };
        if let Some(statuses) = params.status {
            for s in statuses.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let status = OrderStatusType::from_str(s)
                    .map_err(|e| ServerError::InvalidRequestBody(format!("Unknown order status '{s}'. {e}")))?;
                filter = filter.with_status(status);
            }
        }
        Ok(filter)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn search_params_to_filter() {
        let params = OrderSearchParams {
            buyer_id: Some(4),
            currency: Some("USD".into()),
            status: Some("pending, Cancelled".into()),
            ..Default::default()
        };
        let filter = OrderQueryFilter::try_from(params).unwrap();
        assert_eq!(filter.buyer_id, Some(4));
        assert_eq!(filter.currency.as_deref(), Some("usd"));
        assert_eq!(filter.status, Some(vec![OrderStatusType::Pending, OrderStatusType::Cancelled]));

        let bad = OrderSearchParams { status: Some("paid".into()), ..Default::default() };
        assert!(matches!(OrderQueryFilter::try_from(bad), Err(ServerError::InvalidRequestBody(_))));
    }
}
