use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{helpers::expandable_id, StripeApiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutSessionStatus {
    Open,
    Complete,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl CheckoutPaymentStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Paid | Self::NoPaymentRequired)
    }
}

/// The subset of a Stripe Checkout Session object that the storefront reads.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub client_secret: Option<String>,
    pub status: Option<CheckoutSessionStatus>,
    pub payment_status: CheckoutPaymentStatus,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub customer_email: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub payment_intent: Value,
    #[serde(default)]
    pub invoice: Value,
}

impl CheckoutSession {
    pub fn payment_intent_id(&self) -> Option<String> {
        expandable_id(&self.payment_intent)
    }

    pub fn invoice_id(&self) -> Option<String> {
        expandable_id(&self.invoice)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Invoice {
    pub id: String,
    pub status: Option<String>,
    pub hosted_invoice_url: Option<String>,
    pub invoice_pdf: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created: i64,
    #[serde(default)]
    pub livemode: bool,
    pub data: EventData,
}

impl StripeEvent {
    /// Interprets the event's data object as a Checkout Session.
    pub fn checkout_session(&self) -> Result<CheckoutSession, StripeApiError> {
        match self.data.object.get("object").and_then(|o| o.as_str()) {
            Some("checkout.session") => {},
            Some(other) => {
                return Err(StripeApiError::InvalidEvent(format!(
                    "Event {} carries a '{other}' object, not a checkout session",
                    self.id
                )))
            },
            None => return Err(StripeApiError::InvalidEvent(format!("Event {} has no object type", self.id))),
        }
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| StripeApiError::InvalidEvent(format!("Event {} has a malformed checkout session. {e}", self.id)))
    }
}

/// Parameters for a single-item, one-off payment Checkout Session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCheckoutSession {
    /// In the currency's minor unit
    pub unit_amount: i64,
    pub currency: String,
    pub product_name: String,
    pub product_description: Option<String>,
    pub product_image: Option<String>,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: Vec<(String, String)>,
}

impl NewCheckoutSession {
    /// Encodes the session as the form fields the Stripe API expects.
    pub fn to_form_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[]".to_string(), "card".to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("line_items[0][price_data][currency]".to_string(), self.currency.to_lowercase()),
            ("line_items[0][price_data][unit_amount]".to_string(), self.unit_amount.to_string()),
            ("line_items[0][price_data][product_data][name]".to_string(), self.product_name.clone()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("invoice_creation[enabled]".to_string(), "true".to_string()),
        ];
        if let Some(description) = self.product_description.as_ref().filter(|d| !d.is_empty()) {
            params.push(("line_items[0][price_data][product_data][description]".to_string(), description.clone()));
        }
        if let Some(image) = &self.product_image {
            params.push(("line_items[0][price_data][product_data][images][0]".to_string(), image.clone()));
        }
        if let Some(email) = &self.customer_email {
            params.push(("customer_email".to_string(), email.clone()));
        }
        for (k, v) in &self.metadata {
            params.push((format!("metadata[{k}]"), v.clone()));
        }
        params
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deserialize_checkout_session() {
        let json = include_str!("./test_assets/checkout_session.json");
        let session: CheckoutSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.id, "cs_test_a1Qw3rTy");
        assert_eq!(session.status, Some(CheckoutSessionStatus::Complete));
        assert_eq!(session.payment_status, CheckoutPaymentStatus::Paid);
        assert!(session.payment_status.is_settled());
        assert_eq!(session.amount_total, Some(1999));
        assert_eq!(session.metadata.get("order_id").map(String::as_str), Some("gs_8Xk2mPq7Rt4Vw9Yz1Bc3"));
        assert_eq!(session.payment_intent_id().as_deref(), Some("pi_3PqZ9vLkdIwHu7ix0dGm1Xq2"));
        assert_eq!(session.invoice_id().as_deref(), Some("in_1PqZ9xLkdIwHu7ixkT5cVn0B"));
    }

    #[test]
    fn deserialize_open_session() {
        let json = r#"{"id":"cs_test_open","object":"checkout.session","url":"https://checkout.stripe.com/c/pay/cs_test_open",
            "client_secret":null,"status":"open","payment_status":"unpaid","amount_total":500,"currency":"usd",
            "customer_email":null,"metadata":{},"payment_intent":null,"invoice":null}"#;
        let session: CheckoutSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.status, Some(CheckoutSessionStatus::Open));
        assert!(!session.payment_status.is_settled());
        assert!(session.payment_intent_id().is_none());
        assert!(session.invoice_id().is_none());
        assert_eq!(session.url.as_deref(), Some("https://checkout.stripe.com/c/pay/cs_test_open"));
    }

    #[test]
    fn deserialize_invoice() {
        let json = include_str!("./test_assets/invoice.json");
        let invoice: Invoice = serde_json::from_str(json).unwrap();
        assert_eq!(invoice.id, "in_1PqZ9xLkdIwHu7ixkT5cVn0B");
        assert_eq!(invoice.status.as_deref(), Some("paid"));
        assert!(invoice.hosted_invoice_url.unwrap().starts_with("https://invoice.stripe.com/"));
    }

    #[test]
    fn event_checkout_session() {
        let json = include_str!("./test_assets/event_session_completed.json");
        let event: StripeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");
        let session = event.checkout_session().unwrap();
        assert_eq!(session.id, "cs_test_a1Qw3rTy");

        let mut not_a_session = event.clone();
        not_a_session.data.object["object"] = Value::String("charge".into());
        assert!(matches!(not_a_session.checkout_session(), Err(StripeApiError::InvalidEvent(_))));
    }

    #[test]
    fn form_params() {
        let session = NewCheckoutSession {
            unit_amount: 1999,
            currency: "USD".into(),
            product_name: "Hollow Stars".into(),
            product_description: Some("Game by Ada".into()),
            product_image: Some("https://cdn.example.com/hollow.png".into()),
            customer_email: Some("ada@example.com".into()),
            success_url: "https://shop/payment-success?session_id={CHECKOUT_SESSION_ID}".into(),
            cancel_url: "https://shop/games/3".into(),
            metadata: vec![("order_id".into(), "gs_abc".into()), ("buyer_id".into(), "7".into())],
        };
        let params = session.to_form_params().into_iter().collect::<HashMap<_, _>>();
        assert_eq!(params["mode"], "payment");
        assert_eq!(params["line_items[0][price_data][currency]"], "usd");
        assert_eq!(params["line_items[0][price_data][unit_amount]"], "1999");
        assert_eq!(params["line_items[0][price_data][product_data][name]"], "Hollow Stars");
        assert_eq!(params["line_items[0][price_data][product_data][description]"], "Game by Ada");
        assert_eq!(params["line_items[0][price_data][product_data][images][0]"], "https://cdn.example.com/hollow.png");
        assert_eq!(params["customer_email"], "ada@example.com");
        assert_eq!(params["metadata[order_id]"], "gs_abc");
        assert_eq!(params["metadata[buyer_id]"], "7");
        assert_eq!(params["invoice_creation[enabled]"], "true");

        let bare = NewCheckoutSession { product_description: Some(String::new()), ..Default::default() };
        let params = bare.to_form_params().into_iter().collect::<HashMap<_, _>>();
        assert!(!params.contains_key("customer_email"));
        assert!(!params.contains_key("line_items[0][price_data][product_data][description]"));
        assert!(!params.contains_key("line_items[0][price_data][product_data][images][0]"));
    }
}
