//! Message bus: routes committed product events to handlers, then publishes
//! them on an [`EventBus`] for anyone else listening.
//!
//! Handlers run synchronously, in registration order. A failing handler is
//! logged and does not stop the others.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use allocation_core::Sku;
use allocation_events::{Event, EventBus, EventEnvelope};
use allocation_inventory::{OutOfStock, ProductEvent, event_types};

use crate::config::AllocationConfig;
use crate::notifications::{NotificationError, Notifications};

/// Aggregate type recorded on product envelopes.
pub const PRODUCT_AGGREGATE: &str = "allocation.product";

#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl From<NotificationError> for HandlerError {
    fn from(value: NotificationError) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Error)]
pub enum MessageBusError {
    #[error("{failed} handler(s) failed for {event_type}")]
    Handler {
        event_type: &'static str,
        failed: usize,
    },

    #[error("event publication failed: {0}")]
    Publish(String),
}

pub type Handler =
    Box<dyn Fn(&EventEnvelope<ProductEvent>) -> Result<(), HandlerError> + Send + Sync>;

pub struct MessageBus<B> {
    handlers: HashMap<&'static str, Vec<Handler>>,
    publisher: B,
}

impl<B> core::fmt::Debug for MessageBus<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut registered: Vec<&&'static str> = self.handlers.keys().collect();
        registered.sort();
        f.debug_struct("MessageBus")
            .field("handlers", &registered)
            .finish_non_exhaustive()
    }
}

impl<B> MessageBus<B> {
    pub fn new(publisher: B) -> Self {
        Self {
            handlers: HashMap::new(),
            publisher,
        }
    }

    pub fn register<H>(&mut self, event_type: &'static str, handler: H)
    where
        H: Fn(&EventEnvelope<ProductEvent>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers
            .entry(event_type)
            .or_default()
            .push(Box::new(handler));
    }

    pub fn handler_count(&self, event_type: &str) -> usize {
        self.handlers.get(event_type).map(Vec::len).unwrap_or(0)
    }

    pub fn publisher(&self) -> &B {
        &self.publisher
    }
}

impl<B> MessageBus<B>
where
    B: EventBus<EventEnvelope<ProductEvent>>,
{
    /// Run every handler registered for the envelope's event type, then
    /// publish it.
    pub fn handle(&self, envelope: EventEnvelope<ProductEvent>) -> Result<(), MessageBusError> {
        let event_type = envelope.payload().event_type();
        let mut failed = 0;

        for handler in self.handlers.get(event_type).into_iter().flatten() {
            if let Err(err) = handler(&envelope) {
                failed += 1;
                tracing::error!(
                    event_type,
                    event_id = %envelope.event_id(),
                    error = %err,
                    "event handler failed"
                );
            }
        }

        self.publisher
            .publish(envelope)
            .map_err(|e| MessageBusError::Publish(format!("{e:?}")))?;

        if failed > 0 {
            return Err(MessageBusError::Handler { event_type, failed });
        }
        Ok(())
    }

    /// Handle every envelope; returns the errors that occurred, if any.
    pub fn handle_all(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<ProductEvent>>,
    ) -> Vec<MessageBusError> {
        envelopes
            .into_iter()
            .filter_map(|env| self.handle(env).err())
            .collect()
    }
}

/// Wrap the events from one product operation in envelopes.
///
/// `start_version` is the product version before the operation. Each
/// state-changing event advances the sequence number by one, mirroring how
/// the aggregate bumps its version; other events carry the current one.
pub fn envelopes_for(
    sku: &Sku,
    start_version: u64,
    events: &[ProductEvent],
) -> Vec<EventEnvelope<ProductEvent>> {
    let mut version = start_version;
    events
        .iter()
        .map(|event| {
            if event.changes_state() {
                version += 1;
            }
            EventEnvelope::wrap(sku.as_str(), PRODUCT_AGGREGATE, version, event.clone())
        })
        .collect()
}

pub fn send_out_of_stock_notification(
    notifications: &dyn Notifications,
    destination: &str,
    event: &OutOfStock,
) -> Result<(), NotificationError> {
    tracing::info!(
        sku = %event.sku,
        order_id = %event.order_id,
        "sending out-of-stock notification"
    );
    notifications.send(destination, &format!("Out of stock for {}", event.sku))
}

/// A message bus with the standard handlers wired in.
pub fn bootstrap<B>(
    publisher: B,
    notifications: Arc<dyn Notifications>,
    config: &AllocationConfig,
) -> MessageBus<B> {
    let mut bus = MessageBus::new(publisher);
    let destination = config.stock_notification_address.clone();

    bus.register(event_types::OUT_OF_STOCK, move |envelope| {
        match envelope.payload() {
            ProductEvent::OutOfStock(event) => {
                send_out_of_stock_notification(notifications.as_ref(), &destination, event)?;
            }
            other => tracing::debug!(event_type = other.event_type(), "ignoring misrouted event"),
        }
        Ok(())
    });

    bus
}
