use std::fmt::Debug;

use chrono::{Duration, Utc};
use gamestore_common::DEFAULT_CURRENCY_CODE;
use log::*;

use crate::{
    db_types::{Cents, NewOrder, Order, OrderId, OrderStatusType},
    events::{EventProducers, OrderAnnulledEvent, OrderConfirmedEvent},
    helpers::new_order_id,
    order_objects::PurchaseHandle,
    store_api::errors::FulfillmentError,
    traits::{
        CheckoutRequest,
        ConfirmationDetails,
        Correlation,
        FulfillmentDatabase,
        GatewayNotification,
        PaymentGateway,
        PaymentOutcome,
        SessionStatus,
        TransitionResult,
    },
};

const REASON_GATEWAY_FAILURE: &str = "payment failed or checkout session expired";
const REASON_TIMED_OUT: &str = "unpaid order timed out";

/// `FulfillmentApi` drives an order from the buyer's purchase request to a terminal state.
///
/// ```text
///   initiate ──► pending ──(success)──► confirmed   (entitlement granted)
///                   │
///                   └────(failure)────► cancelled
/// ```
///
/// Outcomes arrive from two directions: signed gateway notifications ([`Self::confirm`]) and client-driven lookups
/// against the gateway ([`Self::verify`]). Both paths end in the same guarded transition, so they may race and be
/// repeated freely.
///
/// | Current \ Outcome | Succeeded              | Failed                 |
/// |-------------------|------------------------|------------------------|
/// | pending           | confirmed + grant      | cancelled              |
/// | confirmed         | unchanged (idempotent) | `InvalidTransition`    |
/// | cancelled         | `InvalidTransition`    | unchanged (idempotent) |
pub struct FulfillmentApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    currency: String,
}

impl<B, G> Debug for FulfillmentApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FulfillmentApi ({})", self.currency)
    }
}

impl<B, G> FulfillmentApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers, currency: DEFAULT_CURRENCY_CODE.to_string() }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into().to_ascii_lowercase();
        self
    }

    pub fn currency(&self) -> &str {
        self.currency.as_str()
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G> FulfillmentApi<B, G>
where
    B: FulfillmentDatabase,
    G: PaymentGateway,
{
    /// Starts a purchase of `game_id` by `buyer_id`.
    ///
    /// The checkout session is created at the gateway first. The order is only stored once the gateway has accepted
    /// the session, so a gateway failure leaves no trace in the order ledger. The order amount is the game's price at
    /// the time of this call.
    pub async fn initiate(&self, buyer_id: i64, game_id: i64) -> Result<PurchaseHandle, FulfillmentError> {
        let buyer = self.db.fetch_buyer(buyer_id).await?.ok_or(FulfillmentError::BuyerNotFound(buyer_id))?;
        if !buyer.is_active() {
            debug!("🛒️ Buyer #{buyer_id} tried to purchase game #{game_id} but their account is {}", buyer.status);
            return Err(FulfillmentError::BuyerNotActive(buyer_id));
        }
        let game = self.db.fetch_game(game_id).await?.ok_or(FulfillmentError::GameNotFound(game_id))?;
        if self.db.owns_game(buyer_id, game_id).await? {
            debug!("🛒️ Buyer #{buyer_id} already owns game #{game_id}");
            return Err(FulfillmentError::AlreadyOwned { buyer_id, game_id });
        }
        let order_id = new_order_id();
        let correlation = Correlation::new(order_id.clone(), buyer_id, game_id);
        let request = CheckoutRequest {
            amount: game.price,
            currency: self.currency.clone(),
            product_name: game.name.clone(),
            product_description: Some(format!("Game by {}", game.author)),
            product_image: game.thumbnail.clone().filter(|t| t.starts_with("https://") || t.starts_with("http://")),
            customer_email: Some(buyer.email.clone()),
            correlation,
        };
        let session = self.gateway.create_session(request).await.map_err(|e| {
            warn!("🛒️ Could not create a checkout session for order {order_id}: {e}");
            FulfillmentError::GatewayUnavailable(e.to_string())
        })?;
        trace!("🛒️ Gateway created checkout session {} for order {order_id}", session.session_id);
        let new_order = NewOrder::new(order_id, buyer_id, game_id, game.price, session.session_id.clone())
            .with_currency(self.currency.clone());
        let order = self.db.insert_order(new_order).await?;
        info!(
            "🛒️ Order {} created for buyer #{buyer_id}, game #{game_id}, amount {} {}",
            order.order_id, order.amount, order.currency
        );
        Ok(PurchaseHandle {
            order_id: order.order_id,
            session_id: session.session_id,
            redirect_url: session.redirect_url,
            client_secret: session.client_secret,
            amount: order.amount,
            currency: order.currency,
        })
    }

    /// Applies an authenticated gateway notification to the order it refers to.
    ///
    /// The notification must agree with the stored order on buyer, game and session, and on amount when the gateway
    /// reports one. A mismatch is rejected with [`FulfillmentError::InvalidNotification`] and changes nothing.
    pub async fn confirm(&self, notification: GatewayNotification) -> Result<Order, FulfillmentError> {
        let order_id = &notification.correlation.order_id;
        trace!("🔔️ Notification {} received for order {order_id}", notification.event_id);
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))?;
        check_consistency(
            &order,
            &notification.session_id,
            Some(&notification.correlation),
            notification.amount,
        )?;
        match notification.outcome {
            PaymentOutcome::Succeeded => {
                let invoice_url = self.invoice_url_for(&order, notification.invoice_id.as_deref()).await;
                let details = ConfirmationDetails::new(notification.payment_ref.clone(), invoice_url);
                self.apply_success(order, details).await
            },
            PaymentOutcome::Failed => self.apply_failure(order, REASON_GATEWAY_FAILURE).await,
        }
    }

    /// Asks the gateway for the current state of the buyer's checkout session and applies it.
    ///
    /// If the buyer has not finished paying yet, the order is returned unchanged.
    pub async fn verify(&self, session_id: &str, buyer_id: i64) -> Result<Order, FulfillmentError> {
        let order = self
            .db
            .fetch_order_by_session_id(session_id)
            .await?
            .filter(|o| o.buyer_id == buyer_id)
            .ok_or_else(|| FulfillmentError::OrderNotFound(session_id.to_string()))?;
        self.verify_order(order).await
    }

    /// Client-driven confirmation of an order by its id. The gateway is always consulted; the buyer's say-so is never
    /// enough to confirm an order.
    pub async fn confirm_for_buyer(&self, order_id: &OrderId, buyer_id: i64) -> Result<Order, FulfillmentError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .filter(|o| o.buyer_id == buyer_id)
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))?;
        self.verify_order(order).await
    }

    /// Settles every pending order older than `older_than` against the gateway. Returns the orders that this sweep
    /// cancelled.
    ///
    /// A stale order is only cancelled once its checkout session can no longer be paid. Sessions that are still open
    /// are expired at the gateway first. Sessions that were paid in the meantime confirm the order instead. Orders
    /// whose session cannot be checked right now stay pending until the next sweep.
    pub async fn expire_pending_orders(&self, older_than: Duration) -> Result<Vec<Order>, FulfillmentError> {
        let cutoff = Utc::now() - older_than;
        let stale = self.db.fetch_pending_orders_created_before(cutoff).await?;
        trace!("⏰️ {} pending orders were created before {cutoff}", stale.len());
        let mut expired = Vec::with_capacity(stale.len());
        for order in stale {
            let order_id = order.order_id.clone();
            match self.expire_order(order).await {
                Ok(order) if order.status == OrderStatusType::Cancelled => {
                    info!("⏰️ Order {} has been cancelled after going unpaid since {}", order.order_id, order.created_at);
                    expired.push(order);
                },
                Ok(order) => {
                    debug!("⏰️ Order {} is {} and was not expired", order.order_id, order.status);
                },
                Err(e) => {
                    warn!("⏰️ Could not expire order {order_id}. It will be retried on the next sweep. {e}");
                },
            }
        }
        Ok(expired)
    }

    async fn expire_order(&self, order: Order) -> Result<Order, FulfillmentError> {
        let status = self.retrieve_session(&order).await?;
        if status.outcome().is_some() {
            debug!("⏰️ Checkout session for stale order {} has already been settled", order.order_id);
            return self.apply_session_status(order, status, REASON_GATEWAY_FAILURE).await;
        }
        let status = self.gateway.expire_session(&order.session_id).await.map_err(|e| {
            warn!("⏰️ Could not expire checkout session {} for order {}: {e}", order.session_id, order.order_id);
            FulfillmentError::GatewayUnavailable(e.to_string())
        })?;
        self.apply_session_status(order, status, REASON_TIMED_OUT).await
    }

    /// Grants any entitlements that are missing for confirmed orders. Returns the orders that were repaired.
    pub async fn reconcile_entitlements(&self) -> Result<Vec<Order>, FulfillmentError> {
        let orphans = self.db.fetch_confirmed_orders_without_entitlement().await?;
        let mut repaired = Vec::with_capacity(orphans.len());
        for order in orphans {
            if self.db.grant_entitlement(&order).await? {
                warn!(
                    "🧾️ Order {} was confirmed without an entitlement. Buyer #{} has now been granted game #{}",
                    order.order_id, order.buyer_id, order.game_id
                );
                repaired.push(order);
            }
        }
        Ok(repaired)
    }

    async fn verify_order(&self, order: Order) -> Result<Order, FulfillmentError> {
        let status = self.retrieve_session(&order).await?;
        self.apply_session_status(order, status, REASON_GATEWAY_FAILURE).await
    }

    async fn retrieve_session(&self, order: &Order) -> Result<SessionStatus, FulfillmentError> {
        self.gateway.retrieve_session(&order.session_id).await.map_err(|e| {
            warn!("🔎️ Could not retrieve checkout session {} for order {}: {e}", order.session_id, order.order_id);
            FulfillmentError::GatewayUnavailable(e.to_string())
        })
    }

    /// Applies the gateway's view of the order's checkout session. An open session leaves the order unchanged.
    async fn apply_session_status(
        &self,
        order: Order,
        status: SessionStatus,
        failure_reason: &str,
    ) -> Result<Order, FulfillmentError> {
        check_consistency(&order, &status.session_id, status.correlation.as_ref(), status.amount_total)?;
        match status.outcome() {
            Some(PaymentOutcome::Succeeded) => {
                let invoice_url = self.invoice_url_for(&order, status.invoice_id.as_deref()).await;
                let details = ConfirmationDetails::new(status.payment_ref.clone(), invoice_url);
                self.apply_success(order, details).await
            },
            Some(PaymentOutcome::Failed) => self.apply_failure(order, failure_reason).await,
            None => {
                debug!("🔎️ Checkout session for order {} is still open", order.order_id);
                Ok(order)
            },
        }
    }

    async fn apply_success(&self, order: Order, details: ConfirmationDetails) -> Result<Order, FulfillmentError> {
        match order.status {
            OrderStatusType::Confirmed => {
                debug!("✅️ Order {} is already confirmed. Nothing to do.", order.order_id);
                Ok(order)
            },
            OrderStatusType::Cancelled => Err(invalid_transition(&order, PaymentOutcome::Succeeded)),
            OrderStatusType::Pending => match self.db.confirm_order(&order.order_id, details).await? {
                TransitionResult::Transitioned(order) => {
                    info!("✅️ Order {} confirmed. Buyer #{} now owns game #{}", order.order_id, order.buyer_id, order.game_id);
                    self.publish_confirmed(&order).await;
                    Ok(order)
                },
                TransitionResult::Unchanged(current) => {
                    debug!("✅️ Order {} was transitioned concurrently to {}", current.order_id, current.status);
                    match current.status {
                        OrderStatusType::Confirmed => Ok(current),
                        _ => Err(invalid_transition(&current, PaymentOutcome::Succeeded)),
                    }
                },
            },
        }
    }

    async fn apply_failure(&self, order: Order, reason: &str) -> Result<Order, FulfillmentError> {
        match order.status {
            OrderStatusType::Cancelled => {
                debug!("❌️ Order {} is already cancelled. Nothing to do.", order.order_id);
                Ok(order)
            },
            OrderStatusType::Confirmed => Err(invalid_transition(&order, PaymentOutcome::Failed)),
            OrderStatusType::Pending => match self.db.cancel_order(&order.order_id, reason).await? {
                TransitionResult::Transitioned(order) => {
                    info!("❌️ Order {} cancelled: {reason}", order.order_id);
                    self.publish_annulled(&order, reason).await;
                    Ok(order)
                },
                TransitionResult::Unchanged(current) => {
                    debug!("❌️ Order {} was transitioned concurrently to {}", current.order_id, current.status);
                    match current.status {
                        OrderStatusType::Cancelled => Ok(current),
                        _ => Err(invalid_transition(&current, PaymentOutcome::Failed)),
                    }
                },
            },
        }
    }

    /// Best-effort invoice lookup. Only pending orders need one, and a failure never blocks the confirmation.
    async fn invoice_url_for(&self, order: &Order, invoice_id: Option<&str>) -> Option<String> {
        let invoice_id = invoice_id?;
        if order.status != OrderStatusType::Pending {
            return None;
        }
        match self.gateway.invoice_url(invoice_id).await {
            Ok(url) => url,
            Err(e) => {
                warn!("🧾️ Could not fetch invoice {invoice_id} for order {}: {e}", order.order_id);
                None
            },
        }
    }

    async fn publish_confirmed(&self, order: &Order) {
        let buyer = self.db.fetch_buyer(order.buyer_id).await.unwrap_or_else(|e| {
            warn!("📬️ Could not load buyer #{} for the confirmation event: {e}", order.buyer_id);
            None
        });
        let game = self.db.fetch_game(order.game_id).await.unwrap_or_else(|e| {
            warn!("📬️ Could not load game #{} for the confirmation event: {e}", order.game_id);
            None
        });
        let event = OrderConfirmedEvent::new(order.clone()).with_buyer(buyer).with_game(game);
        debug!("📬️ Notifying order confirmed hook subscribers");
        self.producers.publish_order_confirmed(event).await;
    }

    async fn publish_annulled(&self, order: &Order, reason: &str) {
        debug!("📬️ Notifying order annulled hook subscribers");
        self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.clone(), reason)).await;
    }
}

fn invalid_transition(order: &Order, outcome: PaymentOutcome) -> FulfillmentError {
    warn!("🚫️ Order {} is {} and cannot accept a {outcome:?} outcome", order.order_id, order.status);
    FulfillmentError::InvalidTransition { order_id: order.order_id.clone(), status: order.status, outcome }
}

/// Checks that what the gateway reports agrees with what was recorded when the order was created.
fn check_consistency(
    order: &Order,
    session_id: &str,
    correlation: Option<&Correlation>,
    amount: Option<Cents>,
) -> Result<(), FulfillmentError> {
    if session_id != order.session_id {
        return Err(mismatch(order, format!("session {session_id} does not belong to order {}", order.order_id)));
    }
    if let Some(c) = correlation {
        if c.order_id != order.order_id || c.buyer_id != order.buyer_id || c.game_id != order.game_id {
            return Err(mismatch(
                order,
                format!(
                    "correlation (order {}, buyer #{}, game #{}) does not match order {} (buyer #{}, game #{})",
                    c.order_id, c.buyer_id, c.game_id, order.order_id, order.buyer_id, order.game_id
                ),
            ));
        }
    }
    if let Some(amount) = amount {
        if amount != order.amount {
            return Err(mismatch(order, format!("amount {amount} does not match order amount {}", order.amount)));
        }
    }
    Ok(())
}

fn mismatch(order: &Order, msg: String) -> FulfillmentError {
    warn!("🚫️ Rejecting gateway data for order {}: {msg}", order.order_id);
    FulfillmentError::InvalidNotification(msg)
}
