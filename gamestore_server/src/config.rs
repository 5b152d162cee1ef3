use std::env;

use chrono::Duration;
use gamestore_common::{parse_boolean_flag, Secret, DEFAULT_CURRENCY_CODE};
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use stripe_tools::StripeConfig;

use crate::errors::ServerError;

const DEFAULT_GS_HOST: &str = "127.0.0.1";
const DEFAULT_GS_PORT: u16 = 5000;
const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::minutes(15);
const DEFAULT_MAIL_FROM: &str = "orders@gamestore.local";
const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// The currency that all orders are priced in.
    pub currency: String,
    /// Stripe API and webhook configuration
    pub stripe: StripeConfig,
    pub mail: MailConfig,
    /// Pending orders older than this are cancelled. When `None`, pending orders wait indefinitely for the gateway.
    pub unpaid_order_timeout: Option<Duration>,
    /// How often to look for confirmed orders that are missing their entitlement. `None` disables the sweep.
    pub reconcile_interval: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_GS_HOST.to_string(),
            port: DEFAULT_GS_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            stripe: StripeConfig::default(),
            mail: MailConfig::default(),
            unpaid_order_timeout: None,
            reconcile_interval: Some(DEFAULT_RECONCILE_INTERVAL),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("GS_HOST").ok().unwrap_or_else(|| DEFAULT_GS_HOST.into());
        let port = env::var("GS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for GS_PORT. {e} Using the default, {DEFAULT_GS_PORT}, instead.");
                    DEFAULT_GS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_GS_PORT);
        let database_url = env::var("GS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ GS_DATABASE_URL is not set. Please set it to the URL for the storefront database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let currency = env::var("GS_CURRENCY")
            .map(|s| s.trim().to_ascii_lowercase())
            .ok()
            .filter(|s| s.len() == 3)
            .unwrap_or_else(|| {
                info!("🪛️ GS_CURRENCY is not set or invalid. Using {DEFAULT_CURRENCY_CODE}.");
                DEFAULT_CURRENCY_CODE.to_string()
            });
        let stripe = StripeConfig::new_from_env_or_default();
        let mail = MailConfig::from_env_or_default();
        let unpaid_order_timeout = configure_order_timeout();
        let reconcile_interval = configure_reconcile_interval();
        Self { host, port, database_url, auth, currency, stripe, mail, unpaid_order_timeout, reconcile_interval }
    }
}

fn configure_order_timeout() -> Option<Duration> {
    match env::var("GS_UNPAID_ORDER_TIMEOUT") {
        Err(_) => {
            info!("🪛️ GS_UNPAID_ORDER_TIMEOUT is not set. Unpaid orders will not be expired.");
            None
        },
        Ok(s) => match s.parse::<i64>() {
            Ok(hrs) if hrs > 0 => {
                info!("🪛️ Unpaid orders will be cancelled after {hrs} hrs.");
                Some(Duration::hours(hrs))
            },
            Ok(_) => {
                info!("🪛️ GS_UNPAID_ORDER_TIMEOUT is zero or negative. Unpaid orders will not be expired.");
                None
            },
            Err(e) => {
                warn!("🪛️ Invalid configuration value for GS_UNPAID_ORDER_TIMEOUT. {e}. Unpaid orders will not be expired.");
                None
            },
        },
    }
}

fn configure_reconcile_interval() -> Option<Duration> {
    env::var("GS_RECONCILE_INTERVAL")
        .map_err(|_| {
            debug!(
                "🪛️ GS_RECONCILE_INTERVAL is not set. Using the default value of {} minutes.",
                DEFAULT_RECONCILE_INTERVAL.num_minutes()
            )
        })
        .and_then(|s| {
            s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid configuration value for GS_RECONCILE_INTERVAL. {e}"))
        })
        .map(|mins| (mins > 0).then(|| Duration::minutes(mins)))
        .unwrap_or(Some(DEFAULT_RECONCILE_INTERVAL))
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The shared HS256 secret used to verify access tokens. Tokens are issued by the account service.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. No access token \
             issued elsewhere will be accepted. DO NOT operate on production like this. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self { jwt_secret: Secret::new(secret.into()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("GS_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [GS_JWT_SECRET]")))?;
        if secret.trim().is_empty() {
            return Err(ServerError::ConfigurationError("GS_JWT_SECRET is empty".to_string()));
        }
        if secret.len() < MIN_JWT_SECRET_LENGTH {
            warn!("🪛️ GS_JWT_SECRET is shorter than {MIN_JWT_SECRET_LENGTH} characters. Consider using a longer secret.");
        }
        Ok(Self::new(secret))
    }
}

//-------------------------------------------------  MailConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct MailConfig {
    /// The HTTP mail relay that receipts are posted to. When `None`, receipts are only logged.
    pub relay_url: Option<String>,
    pub from: String,
    pub enabled: bool,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self { relay_url: None, from: DEFAULT_MAIL_FROM.to_string(), enabled: true }
    }
}

impl MailConfig {
    pub fn from_env_or_default() -> Self {
        let relay_url = env::var("GS_MAIL_RELAY_URL").ok().filter(|s| !s.trim().is_empty());
        if relay_url.is_none() {
            info!("🪛️ GS_MAIL_RELAY_URL is not set. Order receipts will be logged, not sent.");
        }
        let from = env::var("GS_MAIL_FROM").unwrap_or_else(|_| DEFAULT_MAIL_FROM.to_string());
        let enabled = parse_boolean_flag(env::var("GS_SEND_RECEIPTS").ok(), true);
        Self { relay_url, from, enabled }
    }
}
