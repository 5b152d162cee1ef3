//! Order receipt e-mails.
//!
//! Receipts are rendered here and posted as JSON (`{from, to, subject, html}`) to an HTTP mail relay. Delivery is
//! best-effort: failures are logged and never affect the order.
use std::{future::Future, pin::Pin, sync::Arc};

use gamestore_engine::{
    db_types::Order,
    events::{EventHooks, OrderConfirmedEvent},
};
use log::*;
use reqwest::Client;
use serde::Serialize;

use crate::config::MailConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    OrderConfirmation,
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub buyer_name: Option<String>,
    pub game_name: Option<String>,
    pub order_id: String,
    pub amount: String,
    pub currency: String,
    pub invoice_url: Option<String>,
}

impl TemplateContext {
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.order_id.to_string(),
            amount: order.amount.to_string(),
            currency: order.currency.to_uppercase(),
            invoice_url: order.invoice_url.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

pub fn render(template: TemplateKind, context: &TemplateContext) -> (String, String) {
    match template {
        TemplateKind::OrderConfirmation => {
            let greeting = context.buyer_name.as_deref().map(|n| format!("<p>Hi {},</p>", escape(n))).unwrap_or_default();
            let game = context
                .game_name
                .as_deref()
                .map(|g| format!("<p>You can now access the full content of <b>{}</b>.</p>", escape(g)))
                .unwrap_or_else(|| "<p>You can now access the full game content.</p>".to_string());
            let invoice = context
                .invoice_url
                .as_deref()
                .map(|u| format!("<p><a href=\"{}\">View your invoice</a></p>", escape(u)))
                .unwrap_or_default();
            let html = format!(
                "{greeting}<h1>Thank you for your purchase!</h1><p>Your order has been confirmed.</p>{game}<p>Order ID: \
                 {}</p><p>Amount: {} {}</p>{invoice}",
                escape(&context.order_id),
                context.amount,
                context.currency
            );
            ("Order Confirmation".to_string(), html)
        },
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

#[derive(Clone)]
pub struct MailRelay {
    config: MailConfig,
    client: Client,
}

impl MailRelay {
    pub fn new(config: MailConfig) -> Self {
        Self { config, client: Client::new() }
    }

    pub fn message(&self, recipient: &str, template: TemplateKind, context: &TemplateContext) -> MailMessage {
        let (subject, html) = render(template, context);
        MailMessage { from: self.config.from.clone(), to: recipient.to_string(), subject, html }
    }

    /// Sends a templated message. Never fails; problems are logged.
    pub async fn send(&self, recipient: &str, template: TemplateKind, context: &TemplateContext) {
        if !self.config.enabled {
            trace!("📧️ Mail is disabled. Not sending {template:?} to {recipient}");
            return;
        }
        let message = self.message(recipient, template, context);
        let Some(url) = self.config.relay_url.as_deref() else {
            info!("📧️ No mail relay configured. {template:?} for {recipient}: {}", message.subject);
            debug!("📧️ {}", message.html);
            return;
        };
        match self.client.post(url).json(&message).send().await {
            Ok(res) if res.status().is_success() => info!("📧️ {template:?} sent to {recipient}"),
            Ok(res) => warn!("📧️ Mail relay refused {template:?} for {recipient}. Status {}", res.status()),
            Err(e) => warn!("📧️ Could not reach the mail relay to send {template:?} to {recipient}. {e}"),
        }
    }

    pub async fn send_order_confirmation(&self, event: OrderConfirmedEvent) {
        let Some(buyer) = event.buyer else {
            warn!("📧️ Order {} was confirmed but the buyer could not be loaded. No receipt sent.", event.order.order_id);
            return;
        };
        let mut context = TemplateContext::for_order(&event.order);
        context.buyer_name = Some(buyer.name);
        context.game_name = event.game.map(|g| g.name);
        self.send(&buyer.email, TemplateKind::OrderConfirmation, &context).await;
    }
}

/// Registers the receipt sender on the order-confirmed hook.
pub fn register_receipt_hook(hooks: &mut EventHooks, relay: MailRelay) {
    let relay = Arc::new(relay);
    hooks.on_order_confirmed(move |ev| {
        let relay = Arc::clone(&relay);
        Box::pin(async move {
            relay.send_order_confirmation(ev).await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
}
