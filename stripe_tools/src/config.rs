use gamestore_common::Secret;
use log::*;

pub const DEFAULT_STRIPE_API_URL: &str = "https://api.stripe.com";
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Base URL of the Stripe REST API, without the version segment.
    pub api_url: String,
    pub secret_key: Secret<String>,
    /// The `whsec_...` signing secret for the webhook endpoint.
    pub webhook_secret: Secret<String>,
    /// Where buyers land after leaving the hosted checkout page.
    pub frontend_url: String,
    /// Maximum age (in seconds) of a webhook signature timestamp.
    pub webhook_tolerance_secs: i64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_STRIPE_API_URL.to_string(),
            secret_key: Secret::default(),
            webhook_secret: Secret::default(),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        }
    }
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("GS_STRIPE_API_URL").unwrap_or_else(|_| DEFAULT_STRIPE_API_URL.to_string());
        let secret_key = Secret::new(std::env::var("GS_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("GS_STRIPE_SECRET_KEY not set, using (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        if !secret_key.reveal().starts_with("sk_") {
            warn!("🪛️ GS_STRIPE_SECRET_KEY does not look like a Stripe secret key. It should start with 'sk_'.");
        }
        let webhook_secret = Secret::new(std::env::var("GS_STRIPE_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("GS_STRIPE_WEBHOOK_SECRET not set, using (probably useless) default");
            "whsec_00000000000000".to_string()
        }));
        let frontend_url = std::env::var("GS_FRONTEND_URL").unwrap_or_else(|_| {
            warn!("GS_FRONTEND_URL not set, using {DEFAULT_FRONTEND_URL} as default");
            DEFAULT_FRONTEND_URL.to_string()
        });
        let webhook_tolerance_secs = std::env::var("GS_STRIPE_WEBHOOK_TOLERANCE")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| warn!("🪛️ Invalid value for GS_STRIPE_WEBHOOK_TOLERANCE ({s}). {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_WEBHOOK_TOLERANCE_SECS);
        Self { api_url, secret_key, webhook_secret, frontend_url, webhook_tolerance_secs }
    }

    /// The page the buyer is returned to after paying. Stripe substitutes the session id.
    pub fn success_url(&self) -> String {
        format!("{}/payment-success?session_id={{CHECKOUT_SESSION_ID}}", self.frontend_url.trim_end_matches('/'))
    }

    pub fn cancel_url(&self, game_id: i64) -> String {
        format!("{}/games/{game_id}", self.frontend_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn redirect_urls() {
        let config = StripeConfig { frontend_url: "https://games.example.com/".into(), ..Default::default() };
        assert_eq!(config.success_url(), "https://games.example.com/payment-success?session_id={CHECKOUT_SESSION_ID}");
        assert_eq!(config.cancel_url(12), "https://games.example.com/games/12");
    }
}
