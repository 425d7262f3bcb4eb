//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes already-committed events to whoever listens
//! (notification workers, read models, external brokers). Delivery is
//! at-least-once and consumers must tolerate duplicates. The bus is not a
//! store: state is committed before anything is published.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};

/// A subscription to an event stream.
///
/// Each subscription receives a copy of every message published after it was
/// created. Meant to be drained by a single consumer thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drain every message currently queued, without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic pub/sub bus with broadcast semantics.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
