//! Bridges the Stripe client in `stripe_tools` to the engine's [`PaymentGateway`] contract.
use gamestore_engine::{
    db_types::Cents,
    traits::{
        CheckoutRequest,
        CheckoutSession,
        Correlation,
        GatewayError,
        GatewayNotification,
        PaymentGateway,
        PaymentOutcome,
        PaymentStatus,
        SessionState,
        SessionStatus,
    },
};
use log::*;
use stripe_tools::{
    CheckoutPaymentStatus,
    CheckoutSession as StripeSession,
    CheckoutSessionStatus,
    NewCheckoutSession,
    StripeApi,
    StripeApiError,
    StripeEvent,
};

#[derive(Clone)]
pub struct StripeGateway {
    api: StripeApi,
}

impl StripeGateway {
    pub fn new(api: StripeApi) -> Self {
        Self { api }
    }
}

impl PaymentGateway for StripeGateway {
    async fn create_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        let config = self.api.config();
        let params = NewCheckoutSession {
            unit_amount: request.amount.value(),
            currency: request.currency,
            product_name: request.product_name,
            product_description: request.product_description,
            product_image: request.product_image,
            customer_email: request.customer_email,
            success_url: config.success_url(),
            cancel_url: config.cancel_url(request.correlation.game_id),
            metadata: request.correlation.to_metadata(),
        };
        let session = self.api.create_checkout_session(&params).await.map_err(gateway_error)?;
        Ok(CheckoutSession { session_id: session.id, redirect_url: session.url, client_secret: session.client_secret })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        let session = self.api.retrieve_checkout_session(session_id).await.map_err(gateway_error)?;
        Ok(session_status(session))
    }

    async fn expire_session(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        let session = self.api.expire_checkout_session(session_id).await.map_err(gateway_error)?;
        Ok(session_status(session))
    }

    async fn invoice_url(&self, invoice_id: &str) -> Result<Option<String>, GatewayError> {
        let invoice = self.api.retrieve_invoice(invoice_id).await.map_err(gateway_error)?;
        Ok(invoice.hosted_invoice_url)
    }
}

fn gateway_error(e: StripeApiError) -> GatewayError {
    match e {
        e if e.is_transient() => GatewayError::Unavailable(e.to_string()),
        StripeApiError::JsonError(_) => GatewayError::InvalidResponse(e.to_string()),
        e => GatewayError::Rejected(e.to_string()),
    }
}

fn session_state(status: Option<CheckoutSessionStatus>) -> SessionState {
    match status {
        Some(CheckoutSessionStatus::Complete) => SessionState::Complete,
        Some(CheckoutSessionStatus::Expired) => SessionState::Expired,
        Some(CheckoutSessionStatus::Open) | None => SessionState::Open,
    }
}

fn payment_status(status: CheckoutPaymentStatus) -> PaymentStatus {
    match status {
        CheckoutPaymentStatus::Paid => PaymentStatus::Paid,
        CheckoutPaymentStatus::Unpaid => PaymentStatus::Unpaid,
        CheckoutPaymentStatus::NoPaymentRequired => PaymentStatus::NoPaymentRequired,
    }
}

pub fn session_status(session: StripeSession) -> SessionStatus {
    let correlation = Correlation::from_metadata(&session.metadata)
        .map_err(|e| warn!("💳️ Checkout session {} has unusable metadata: {e}", session.id))
        .ok();
    SessionStatus {
        state: session_state(session.status),
        payment_status: payment_status(session.payment_status),
        correlation,
        amount_total: session.amount_total.map(Cents::from),
        payment_ref: session.payment_intent_id(),
        invoice_id: session.invoice_id(),
        session_id: session.id,
    }
}

/// Turns a webhook event into an engine notification.
///
/// Returns `Ok(None)` for events that do not report a payment outcome. The session's metadata must carry the order
/// correlation; a payment event without it cannot be matched to an order and is rejected.
pub fn notification_from_event(event: &StripeEvent) -> Result<Option<GatewayNotification>, StripeApiError> {
    let (outcome, session) = match event.checkout_outcome()? {
        stripe_tools::CheckoutOutcome::Paid(session) => (PaymentOutcome::Succeeded, session),
        stripe_tools::CheckoutOutcome::Failed(session) => (PaymentOutcome::Failed, session),
        stripe_tools::CheckoutOutcome::Ignored => return Ok(None),
    };
    let correlation = Correlation::from_metadata(&session.metadata).map_err(|e| {
        StripeApiError::InvalidEvent(format!("Session {} cannot be matched to an order: {e}", session.id))
    })?;
    Ok(Some(GatewayNotification {
        event_id: event.id.clone(),
        outcome,
        correlation,
        amount: session.amount_total.map(Cents::from),
        payment_ref: session.payment_intent_id(),
        invoice_id: session.invoice_id(),
        session_id: session.id,
    }))
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use gamestore_engine::db_types::OrderId;
    use serde_json::{json, Value};

    use super::*;

    fn stripe_session(status: &str, payment_status: &str, metadata: HashMap<String, String>) -> StripeSession {
        serde_json::from_value(json!({
            "id": "cs_test_b2",
            "object": "checkout.session",
            "url": null,
            "client_secret": null,
            "status": status,
            "payment_status": payment_status,
            "amount_total": 2500,
            "currency": "usd",
            "customer_email": "ada@example.com",
            "metadata": metadata,
            "payment_intent": {"id": "pi_77", "object": "payment_intent"},
            "invoice": "in_88"
        }))
        .unwrap()
    }

    fn metadata() -> HashMap<String, String> {
        Correlation::new(OrderId::from("gs_test"), 7, 3).to_metadata().into_iter().collect()
    }

    #[test]
    fn map_session_status() {
        let status = session_status(stripe_session("complete", "paid", metadata()));
        assert_eq!(status.session_id, "cs_test_b2");
        assert_eq!(status.state, SessionState::Complete);
        assert_eq!(status.payment_status, PaymentStatus::Paid);
        assert_eq!(status.outcome(), Some(PaymentOutcome::Succeeded));
        assert_eq!(status.amount_total, Some(Cents::from(2500)));
        assert_eq!(status.payment_ref.as_deref(), Some("pi_77"));
        assert_eq!(status.invoice_id.as_deref(), Some("in_88"));
        assert_eq!(status.correlation.unwrap().order_id, OrderId::from("gs_test"));

        let status = session_status(stripe_session("expired", "unpaid", HashMap::new()));
        assert_eq!(status.outcome(), Some(PaymentOutcome::Failed));
        assert!(status.correlation.is_none());
    }

    fn event(event_type: &str, session: StripeSession) -> StripeEvent {
        let mut object = serde_json::to_value(session).unwrap();
        object["object"] = Value::String("checkout.session".into());
        serde_json::from_value(json!({
            "id": "evt_42",
            "object": "event",
            "type": event_type,
            "created": 1729339260,
            "livemode": false,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn notifications_from_events() {
        let paid = event("checkout.session.completed", stripe_session("complete", "paid", metadata()));
        let n = notification_from_event(&paid).unwrap().unwrap();
        assert_eq!(n.event_id, "evt_42");
        assert_eq!(n.outcome, PaymentOutcome::Succeeded);
        assert_eq!(n.correlation, Correlation::new(OrderId::from("gs_test"), 7, 3));
        assert_eq!(n.amount, Some(Cents::from(2500)));

        let expired = event("checkout.session.expired", stripe_session("expired", "unpaid", metadata()));
        assert_eq!(notification_from_event(&expired).unwrap().unwrap().outcome, PaymentOutcome::Failed);

        let unpaid = event("checkout.session.completed", stripe_session("complete", "unpaid", metadata()));
        assert!(notification_from_event(&unpaid).unwrap().is_none());

        let orphan = event("checkout.session.completed", stripe_session("complete", "paid", HashMap::new()));
        assert!(matches!(notification_from_event(&orphan), Err(StripeApiError::InvalidEvent(_))));
    }

    #[test]
    fn errors_are_classified() {
        let e = gateway_error(StripeApiError::QueryError { status: 502, message: "bad gateway".into() });
        assert!(matches!(e, GatewayError::Unavailable(_)));
        let e = gateway_error(StripeApiError::QueryError { status: 404, message: "no such session".into() });
        assert!(matches!(e, GatewayError::Rejected(_)));
        let e = gateway_error(StripeApiError::JsonError("eof".into()));
        assert!(matches!(e, GatewayError::InvalidResponse(_)));
    }
}
