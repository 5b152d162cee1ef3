//! Verification and classification of Stripe webhook deliveries.
//!
//! Stripe signs every delivery with the endpoint's signing secret. The `Stripe-Signature` header carries a unix
//! timestamp and one or more `v1` signatures, each the hex-encoded HMAC-SHA256 of `"{timestamp}.{raw body}"`.
//! The signature must be checked against the raw bytes, before the body is parsed.
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

use crate::{CheckoutSession, StripeApiError, StripeEvent};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

pub const EVENT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";
pub const EVENT_ASYNC_PAYMENT_FAILED: &str = "checkout.session.async_payment_failed";
pub const EVENT_SESSION_EXPIRED: &str = "checkout.session.expired";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, StripeApiError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for item in header.split(',') {
            let Some((key, value)) = item.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    let t = value
                        .parse::<i64>()
                        .map_err(|e| StripeApiError::InvalidSignature(format!("Invalid timestamp '{value}'. {e}")))?;
                    timestamp = Some(t);
                },
                // Undecodable entries cannot match, so they are skipped rather than failing the whole header
                "v1" => match hex::decode(value) {
                    Ok(sig) => signatures.push(sig),
                    Err(e) => trace!("🔏️ Ignoring undecodable v1 signature. {e}"),
                },
                _ => {},
            }
        }
        let timestamp =
            timestamp.ok_or_else(|| StripeApiError::InvalidSignature("No timestamp in signature header".into()))?;
        if signatures.is_empty() {
            return Err(StripeApiError::InvalidSignature("No v1 signatures in signature header".into()));
        }
        Ok(Self { timestamp, signatures })
    }
}

fn signing_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, StripeApiError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| StripeApiError::InvalidSignature(format!("Unusable signing secret. {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Computes the hex-encoded `v1` signature for a payload.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, StripeApiError> {
    let mac = signing_mac(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Produces a complete `Stripe-Signature` header value for a payload, as Stripe would send it.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, StripeApiError> {
    let sig = compute_signature(secret, timestamp, payload)?;
    Ok(format!("t={timestamp},v1={sig}"))
}

/// Checks the signature header against the raw payload. Any matching `v1` signature is accepted, as long as the
/// timestamp is within `tolerance_secs` of `now`.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> Result<(), StripeApiError> {
    let header = SignatureHeader::parse(header)?;
    let age = now.timestamp() - header.timestamp;
    if age.abs() > tolerance_secs {
        return Err(StripeApiError::InvalidSignature(format!(
            "Timestamp is outside the tolerance window ({age}s old, {tolerance_secs}s allowed)"
        )));
    }
    let mac = signing_mac(secret, header.timestamp, payload)?;
    let matched = header.signatures.iter().any(|sig| mac.clone().verify_slice(sig).is_ok());
    if matched {
        Ok(())
    } else {
        Err(StripeApiError::InvalidSignature("No signature matches the payload".into()))
    }
}

/// Verifies the signature and only then deserializes the payload.
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
) -> Result<StripeEvent, StripeApiError> {
    verify_signature(payload, header, secret, tolerance_secs, Utc::now())?;
    serde_json::from_slice(payload).map_err(|e| StripeApiError::InvalidEvent(format!("Malformed event payload. {e}")))
}

/// What a webhook event means for the order behind a checkout session.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    Paid(CheckoutSession),
    Failed(CheckoutSession),
    /// Not a payment outcome. Acknowledge and move on.
    Ignored,
}

impl StripeEvent {
    pub fn checkout_outcome(&self) -> Result<CheckoutOutcome, StripeApiError> {
        match self.event_type.as_str() {
            EVENT_SESSION_COMPLETED | EVENT_ASYNC_PAYMENT_SUCCEEDED => {
                let session = self.checkout_session()?;
                if session.payment_status.is_settled() {
                    Ok(CheckoutOutcome::Paid(session))
                } else {
                    debug!("🔏️ Session {} completed but is {:?}. Waiting for payment.", session.id, session.payment_status);
                    Ok(CheckoutOutcome::Ignored)
                }
            },
            EVENT_SESSION_EXPIRED | EVENT_ASYNC_PAYMENT_FAILED => Ok(CheckoutOutcome::Failed(self.checkout_session()?)),
            other => {
                trace!("🔏️ Ignoring webhook event {} of type {other}", self.id);
                Ok(CheckoutOutcome::Ignored)
            },
        }
    }
}
