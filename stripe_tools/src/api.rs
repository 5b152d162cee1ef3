use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    config::StripeConfig,
    data_objects::{CheckoutSession, Invoice, NewCheckoutSession},
    helpers::is_valid_object_id,
    StripeApiError,
};

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let mut val = HeaderValue::from_str(format!("Bearer {}", config.secret_key.reveal()).as_str())
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.config.api_url.trim_end_matches('/'))
    }

    /// Sends a request to the Stripe API. Request bodies are form-encoded, which is what Stripe expects.
    pub async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        form: Option<&[(String, String)]>,
    ) -> Result<T, StripeApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(form) = form {
            req = req.form(form);
        }
        let response = req.send().await.map_err(|e| StripeApiError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
            Err(StripeApiError::QueryError { status, message: error_message(&body) })
        }
    }

    pub async fn create_checkout_session(
        &self,
        session: &NewCheckoutSession,
    ) -> Result<CheckoutSession, StripeApiError> {
        let form = session.to_form_params();
        debug!("Creating checkout session for {} ({} {})", session.product_name, session.unit_amount, session.currency);
        let result =
            self.rest_query::<CheckoutSession>(Method::POST, "/checkout/sessions", &[], Some(form.as_slice())).await?;
        info!("Created checkout session {}", result.id);
        Ok(result)
    }

    pub async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, StripeApiError> {
        if !is_valid_object_id(session_id) {
            return Err(StripeApiError::InvalidObjectId(session_id.to_string()));
        }
        let path = format!("/checkout/sessions/{session_id}");
        debug!("Fetching checkout session {session_id}");
        let result = self.rest_query::<CheckoutSession>(Method::GET, &path, &[], None).await?;
        trace!("Checkout session {session_id} is {:?} / {:?}", result.status, result.payment_status);
        Ok(result)
    }

    /// Expires an open checkout session. Stripe refuses to expire sessions that are already complete or expired.
    pub async fn expire_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, StripeApiError> {
        if !is_valid_object_id(session_id) {
            return Err(StripeApiError::InvalidObjectId(session_id.to_string()));
        }
        let path = format!("/checkout/sessions/{session_id}/expire");
        debug!("Expiring checkout session {session_id}");
        let result = self.rest_query::<CheckoutSession>(Method::POST, &path, &[], None).await?;
        info!("Checkout session {session_id} is now {:?}", result.status);
        Ok(result)
    }

    pub async fn retrieve_invoice(&self, invoice_id: &str) -> Result<Invoice, StripeApiError> {
        if !is_valid_object_id(invoice_id) {
            return Err(StripeApiError::InvalidObjectId(invoice_id.to_string()));
        }
        let path = format!("/invoices/{invoice_id}");
        debug!("Fetching invoice {invoice_id}");
        self.rest_query::<Invoice>(Method::GET, &path, &[], None).await
    }
}

/// Stripe error bodies look like `{"error": {"type": "...", "message": "..."}}`. Falls back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}
