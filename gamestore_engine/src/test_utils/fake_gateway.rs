use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{
    db_types::Order,
    traits::{
        CheckoutRequest,
        CheckoutSession,
        GatewayError,
        GatewayNotification,
        PaymentGateway,
        PaymentOutcome,
        PaymentStatus,
        SessionState,
        SessionStatus,
    },
};

#[derive(Default)]
struct GatewayState {
    unavailable: bool,
    next_session: u64,
    sessions: HashMap<String, SessionStatus>,
    invoices: HashMap<String, String>,
    requests: Vec<CheckoutRequest>,
    retrievals: usize,
    expirations: usize,
}

/// An in-memory payment gateway. Sessions start out open and unpaid; tests move them along explicitly.
#[derive(Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut GatewayState) -> T) -> T {
        let mut state = self.state.lock().expect("FakeGateway lock poisoned");
        f(&mut state)
    }

    /// While unavailable, every call fails with [`GatewayError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.with_state(|s| s.unavailable = unavailable);
    }

    pub fn pay_session(&self, session_id: &str) {
        self.update_session(session_id, SessionState::Complete, PaymentStatus::Paid);
    }

    /// Simulates the gateway expiring a session on its own schedule.
    pub fn time_out_session(&self, session_id: &str) {
        self.update_session(session_id, SessionState::Expired, PaymentStatus::Unpaid);
    }

    pub fn attach_invoice(&self, session_id: &str, invoice_id: &str, url: &str) {
        self.with_state(|s| {
            if let Some(session) = s.sessions.get_mut(session_id) {
                session.invoice_id = Some(invoice_id.to_string());
            }
            s.invoices.insert(invoice_id.to_string(), url.to_string());
        });
    }

    fn update_session(&self, session_id: &str, state: SessionState, payment_status: PaymentStatus) {
        self.with_state(|s| {
            let session = s.sessions.get_mut(session_id).expect("Unknown session");
            session.state = state;
            session.payment_status = payment_status;
            if payment_status == PaymentStatus::Paid {
                session.payment_ref = Some(format!("pi_{}", session_id.trim_start_matches("cs_")));
            }
        });
    }

    pub fn session(&self, session_id: &str) -> Option<SessionStatus> {
        self.with_state(|s| s.sessions.get(session_id).cloned())
    }

    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.with_state(|s| s.requests.clone())
    }

    pub fn retrievals(&self) -> usize {
        self.with_state(|s| s.retrievals)
    }

    /// The number of sessions closed through [`PaymentGateway::expire_session`].
    pub fn expirations(&self) -> usize {
        self.with_state(|s| s.expirations)
    }
}

impl PaymentGateway for FakeGateway {
    async fn create_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        self.with_state(|s| {
            if s.unavailable {
                return Err(GatewayError::Unavailable("connection refused".into()));
            }
            s.next_session += 1;
            let session_id = format!("cs_test_{:04}", s.next_session);
            let status = SessionStatus {
                session_id: session_id.clone(),
                state: SessionState::Open,
                payment_status: PaymentStatus::Unpaid,
                correlation: Some(request.correlation.clone()),
                amount_total: Some(request.amount),
                payment_ref: None,
                invoice_id: None,
            };
            s.sessions.insert(session_id.clone(), status);
            s.requests.push(request);
            Ok(CheckoutSession {
                redirect_url: Some(format!("https://checkout.test/pay/{session_id}")),
                client_secret: Some(format!("{session_id}_secret")),
                session_id,
            })
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        self.with_state(|s| {
            if s.unavailable {
                return Err(GatewayError::Unavailable("connection refused".into()));
            }
            s.retrievals += 1;
            s.sessions.get(session_id).cloned().ok_or_else(|| GatewayError::Rejected(format!("No such session: {session_id}")))
        })
    }

    async fn expire_session(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        self.with_state(|s| {
            if s.unavailable {
                return Err(GatewayError::Unavailable("connection refused".into()));
            }
            let session = s
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| GatewayError::Rejected(format!("No such session: {session_id}")))?;
            if session.state != SessionState::Open {
                return Err(GatewayError::Rejected(format!("Session {session_id} is not open")));
            }
            session.state = SessionState::Expired;
            s.expirations += 1;
            Ok(session.clone())
        })
    }

    async fn invoice_url(&self, invoice_id: &str) -> Result<Option<String>, GatewayError> {
        self.with_state(|s| {
            if s.unavailable {
                return Err(GatewayError::Unavailable("connection refused".into()));
            }
            Ok(s.invoices.get(invoice_id).cloned())
        })
    }
}

/// Builds the notification the gateway would send for `order` with the given outcome.
pub fn notification_for(order: &Order, outcome: PaymentOutcome) -> GatewayNotification {
    GatewayNotification {
        event_id: format!("evt_{}", rand::random::<u32>()),
        session_id: order.session_id.clone(),
        outcome,
        correlation: crate::traits::Correlation::new(order.order_id.clone(), order.buyer_id, order.game_id),
        amount: Some(order.amount),
        payment_ref: match outcome {
            PaymentOutcome::Succeeded => Some(format!("pi_{}", order.order_id)),
            PaymentOutcome::Failed => None,
        },
        invoice_id: None,
    }
}
