use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are facts: immutable, versioned, and returned explicitly from the
/// operation that produced them. The caller decides when to dispatch them.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "allocation.product.allocated").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
