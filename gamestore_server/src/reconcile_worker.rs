use chrono::Duration;
use gamestore_engine::{FulfillmentApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

use crate::{expiry_worker::order_list, integrations::stripe::StripeGateway};

/// Starts the entitlement reconciliation worker. It repairs confirmed orders whose entitlement is missing. Do not
/// await the returned JoinHandle, as it will run indefinitely.
pub fn start_reconcile_worker(api: FulfillmentApi<SqliteDatabase, StripeGateway>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = interval.to_std().unwrap_or(std::time::Duration::from_secs(900));
        let mut timer = tokio::time::interval(period);
        info!("🧾️ Entitlement reconciliation worker started. Running every {} minutes.", interval.num_minutes());
        loop {
            timer.tick().await;
            trace!("🧾️ Running entitlement reconciliation job");
            match api.reconcile_entitlements().await {
                Ok(repaired) if repaired.is_empty() => trace!("🧾️ All confirmed orders have their entitlements"),
                Ok(repaired) => warn!("🧾️ Repaired {} missing entitlements: {}", repaired.len(), order_list(&repaired)),
                Err(e) => error!("🧾️ Error running entitlement reconciliation job: {e}"),
            }
        }
    })
}
