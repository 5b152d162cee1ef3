use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, OrderAnnulledEvent, OrderConfirmedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_confirmed_producer: Vec<EventProducer<OrderConfirmedEvent>>,
    pub order_annulled_producer: Vec<EventProducer<OrderAnnulledEvent>>,
}

impl EventProducers {
    pub async fn publish_order_confirmed(&self, event: OrderConfirmedEvent) {
        for emitter in &self.order_confirmed_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_annulled(&self, event: OrderAnnulledEvent) {
        for emitter in &self.order_annulled_producer {
            emitter.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_confirmed: Option<EventHandler<OrderConfirmedEvent>>,
    pub on_order_annulled: Option<EventHandler<OrderAnnulledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_confirmed = hooks.on_order_confirmed.map(|f| EventHandler::new(buffer_size, f));
        let on_order_annulled = hooks.on_order_annulled.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_confirmed, on_order_annulled }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_confirmed {
            result.order_confirmed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_annulled {
            result.order_annulled_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_confirmed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_order_annulled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_confirmed: Option<Handler<OrderConfirmedEvent>>,
    pub on_order_annulled: Option<Handler<OrderAnnulledEvent>>,
}

impl EventHooks {
    pub fn on_order_confirmed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderConfirmedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_confirmed = Some(Arc::new(f));
        self
    }

    pub fn on_order_annulled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderAnnulledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_annulled = Some(Arc::new(f));
        self
    }
}
