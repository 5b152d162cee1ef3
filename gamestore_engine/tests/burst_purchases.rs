use std::time::Duration;

use futures_util::future::join_all;
use gamestore_engine::{
    db_types::{Cents, NewBuyer, NewGame, OrderStatusType},
    events::EventProducers,
    order_objects::OrderQueryFilter,
    test_utils::{notification_for, prepare_test_env, random_db_path, FakeGateway},
    traits::{AccountManagement, PaymentOutcome},
    FulfillmentApi,
    SqliteDatabase,
};
use log::*;
use tokio::runtime::Runtime;

const NUM_BUYERS: i64 = 5;
const NUM_GAMES: i64 = 4;
const REDELIVERIES: usize = 3;
const RATE: u64 = 100; // purchases per second

#[test]
fn burst_purchases_with_redelivered_notifications() {
    info!("🚀️ Starting purchase burst test");
    let sys = Runtime::new().unwrap();
    let delay = Duration::from_millis(1000 / RATE);

    sys.block_on(async move {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let gateway = FakeGateway::new();
        let api = FulfillmentApi::new(db.clone(), gateway.clone(), EventProducers::default());

        let mut buyers = Vec::new();
        for i in 0..NUM_BUYERS {
            let buyer = db.create_buyer(NewBuyer::new(format!("Burst {i}"), format!("burst{i}@example.com"))).await.unwrap();
            buyers.push(buyer);
        }
        let mut games = Vec::new();
        for i in 0..NUM_GAMES {
            let price = Cents::from(100 * (i + 1));
            let game = NewGame::new(format!("BURST-{i}"), format!("Burst game {i}"), "Burst Studio".to_string(), price);
            games.push(db.create_game(game).await.unwrap());
        }

        let mut timer = tokio::time::interval(delay);
        let mut orders = Vec::new();
        for buyer in &buyers {
            for game in &games {
                timer.tick().await;
                let handle = api.initiate(buyer.id, game.id).await.unwrap();
                let order = db.fetch_order_by_order_id(&handle.order_id).await.unwrap().unwrap();
                orders.push(order);
            }
        }
        info!("🚀️ {} orders created. Delivering notifications", orders.len());

        let deliveries = orders
            .iter()
            .flat_map(|o| (0..REDELIVERIES).map(move |_| notification_for(o, PaymentOutcome::Succeeded)))
            .map(|n| api.confirm(n));
        let results = join_all(deliveries).await;
        assert!(results.iter().all(|r| r.as_ref().map(|o| o.status == OrderStatusType::Confirmed).unwrap_or(false)));

        let confirmed =
            db.search_orders(OrderQueryFilter::default().with_status(OrderStatusType::Confirmed)).await.unwrap();
        assert_eq!(confirmed.len(), orders.len());
        for buyer in &buyers {
            let owned = db.fetch_entitlements_for_buyer(buyer.id).await.unwrap();
            assert_eq!(owned.len(), NUM_GAMES as usize);
        }
        for order in &orders {
            let history = db.fetch_order_history(&order.order_id).await.unwrap();
            assert_eq!(history.len(), 2, "order {} should have exactly one transition", order.order_id);
        }
    });
    info!("🚀️ test complete");
}
