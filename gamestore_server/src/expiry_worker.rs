use chrono::Duration;
use gamestore_engine::{db_types::Order, FulfillmentApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

use crate::integrations::stripe::StripeGateway;

const EXPIRY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_expiry_worker(
    api: FulfillmentApi<SqliteDatabase, StripeGateway>,
    unpaid_expiry: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(EXPIRY_INTERVAL);
        info!("🕰️ Unpaid order expiry worker started. Orders expire after {} hrs.", unpaid_expiry.num_hours());
        loop {
            timer.tick().await;
            trace!("🕰️ Running unpaid order expiry job");
            match api.expire_pending_orders(unpaid_expiry).await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No orders expired"),
                Ok(expired) => {
                    info!("🕰️ {} orders expired", expired.len());
                    debug!("🕰️ Expired orders: {}", order_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running unpaid order expiry job: {e}");
                },
            }
        }
    })
}

pub(crate) fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] order_id: {} buyer_id: {} game_id: {}", o.id, o.order_id, o.buyer_id, o.game_id))
        .collect::<Vec<String>>()
        .join(", ")
}
