//! Allocation use cases.
//!
//! Every operation follows the same pipeline:
//!
//! ```text
//! begin unit of work
//!   -> load product (SKU or batch reference)
//!   -> execute command on the aggregate (pure)
//!   -> commit if any event changed state, otherwise roll back
//!   -> dispatch events through the message bus
//! ```
//!
//! Events are dispatched only after the commit succeeded, so handlers never
//! observe changes that were not persisted. Dispatch failures are logged and
//! do not undo the commit.

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use allocation_core::{AggregateRoot, BatchReference, DomainError, OrderId, Sku};
use allocation_events::{EventBus, EventEnvelope, execute};
use allocation_inventory::{
    AddBatch, ChangeBatchQuantity, Deallocate, OrderLine, Product, ProductCommand,
    ProductEvent, Quantity,
};

use crate::message_bus::{MessageBus, envelopes_for};
use crate::repository::{ProductRepository, RepositoryError};
use crate::unit_of_work::{UnitOfWork, UnitOfWorkFactory};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// No product with this SKU has ever been received.
    #[error("Invalid sku {0}")]
    InvalidSku(Sku),

    #[error("Out of stock for sku {0}")]
    OutOfStock(Sku),

    #[error("unknown batch {0}")]
    UnknownBatch(BatchReference),

    #[error(transparent)]
    Domain(DomainError),

    /// Another transaction committed the same product first. Safe to retry.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::OutOfStock { sku } => ServiceError::OutOfStock(sku),
            other => ServiceError::Domain(other),
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Concurrency(msg) => ServiceError::Concurrency(msg),
            RepositoryError::DuplicateBatch(reference) => ServiceError::Domain(
                DomainError::conflict(format!("batch {reference} already exists")),
            ),
            other => ServiceError::Repository(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Outcome of a product command, captured before the unit of work is
/// committed (the product borrow ends there).
struct Executed {
    sku: Sku,
    start_version: u64,
    events: Vec<ProductEvent>,
}

impl Executed {
    fn changes_state(&self) -> bool {
        self.events.iter().any(ProductEvent::changes_state)
    }
}

/// Application service for stock allocation.
///
/// `F` opens units of work (the in-memory store handle in tests), `B` is
/// where dispatched envelopes are published.
pub struct AllocationService<F, B> {
    uow_factory: F,
    bus: MessageBus<B>,
}

impl<F, B> core::fmt::Debug for AllocationService<F, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AllocationService")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl<F, B> AllocationService<F, B>
where
    F: UnitOfWorkFactory,
    B: EventBus<EventEnvelope<ProductEvent>>,
{
    pub fn new(uow_factory: F, bus: MessageBus<B>) -> Self {
        Self { uow_factory, bus }
    }

    pub fn bus(&self) -> &MessageBus<B> {
        &self.bus
    }

    /// Receive a new batch of stock. Creates the product on first sight of
    /// its SKU.
    pub fn add_batch(
        &self,
        reference: impl Into<BatchReference>,
        sku: impl Into<Sku>,
        quantity: Quantity,
        eta: Option<NaiveDate>,
    ) -> ServiceResult<()> {
        let reference = reference.into();
        let sku = sku.into();
        let mut uow = self.uow_factory.begin();

        let executed = {
            let products = uow.products();
            if let Some(owner) = products.get_by_batch_ref(&reference)? {
                return Err(DomainError::conflict(format!(
                    "batch {reference} already exists for {}",
                    owner.sku()
                ))
                .into());
            }
            if products.get(&sku)?.is_none() {
                products.add(Product::new(sku.clone()));
            }
            let product = products
                .get(&sku)?
                .ok_or_else(|| ServiceError::InvalidSku(sku.clone()))?;

            let cmd = ProductCommand::AddBatch(AddBatch {
                reference: reference.clone(),
                sku: sku.clone(),
                quantity,
                eta,
                occurred_at: Utc::now(),
            });
            run(product, &cmd)?
        };

        self.finish(&mut uow, executed)?;
        tracing::info!(%sku, batch_ref = %reference, quantity, "batch added");
        Ok(())
    }

    /// Allocate an order line and return the reference of the batch it went
    /// to. A line that is already allocated returns its current batch.
    pub fn allocate(
        &self,
        order_id: impl Into<OrderId>,
        sku: impl Into<Sku>,
        quantity: Quantity,
    ) -> ServiceResult<BatchReference> {
        let line = OrderLine::new(order_id, sku, quantity)?;
        let sku = line.sku().clone();
        let mut uow = self.uow_factory.begin();

        let (executed, outcome) = {
            let product = uow
                .products()
                .get(&sku)?
                .ok_or_else(|| ServiceError::InvalidSku(sku.clone()))?;

            let start_version = product.version();
            let (events, outcome) = product.allocate(&line, Utc::now());
            let executed = Executed {
                sku: sku.clone(),
                start_version,
                events,
            };
            (executed, outcome)
        };

        let version = executed.start_version;
        self.finish(&mut uow, executed)?;

        match outcome {
            Ok(batch_ref) => {
                tracing::info!(
                    %sku,
                    order_id = %line.order_id(),
                    batch_ref = %batch_ref,
                    quantity,
                    "order line allocated"
                );
                Ok(batch_ref)
            }
            Err(err) => {
                tracing::warn!(
                    %sku,
                    order_id = %line.order_id(),
                    quantity,
                    version,
                    "out of stock"
                );
                Err(err.into())
            }
        }
    }

    /// Release an order line from whichever batch holds it.
    pub fn deallocate(
        &self,
        order_id: impl Into<OrderId>,
        sku: impl Into<Sku>,
        quantity: Quantity,
    ) -> ServiceResult<()> {
        let line = OrderLine::new(order_id, sku, quantity)?;
        let sku = line.sku().clone();
        let mut uow = self.uow_factory.begin();

        let executed = {
            let product = uow
                .products()
                .get(&sku)?
                .ok_or_else(|| ServiceError::InvalidSku(sku.clone()))?;

            let cmd = ProductCommand::Deallocate(Deallocate {
                line: line.clone(),
                occurred_at: Utc::now(),
            });
            run(product, &cmd)?
        };

        self.finish(&mut uow, executed)?;
        tracing::info!(%sku, order_id = %line.order_id(), quantity, "order line deallocated");
        Ok(())
    }

    /// Correct a batch's purchased quantity. Lines that no longer fit are
    /// moved to other batches; lines that fit nowhere raise out-of-stock
    /// notifications but do not fail the call.
    pub fn change_batch_quantity(
        &self,
        reference: impl Into<BatchReference>,
        quantity: Quantity,
    ) -> ServiceResult<()> {
        let reference = reference.into();
        let mut uow = self.uow_factory.begin();

        let executed = {
            let product = uow
                .products()
                .get_by_batch_ref(&reference)?
                .ok_or_else(|| ServiceError::UnknownBatch(reference.clone()))?;

            let cmd = ProductCommand::ChangeBatchQuantity(ChangeBatchQuantity {
                reference: reference.clone(),
                quantity,
                occurred_at: Utc::now(),
            });
            run(product, &cmd)?
        };

        let sku = executed.sku.clone();
        let moved = executed
            .events
            .iter()
            .filter(|e| matches!(e, ProductEvent::Deallocated(_)))
            .count();
        self.finish(&mut uow, executed)?;

        tracing::info!(%sku, batch_ref = %reference, quantity, moved, "batch quantity changed");
        Ok(())
    }

    /// Commit (or roll back) and dispatch.
    fn finish(&self, uow: &mut F::Uow, executed: Executed) -> ServiceResult<()> {
        if executed.changes_state() {
            uow.commit()?;
        } else {
            uow.rollback();
        }

        let envelopes = envelopes_for(&executed.sku, executed.start_version, &executed.events);
        for err in self.bus.handle_all(envelopes) {
            tracing::warn!(sku = %executed.sku, error = %err, "event dispatch failed");
        }
        Ok(())
    }
}

fn run(product: &mut Product, cmd: &ProductCommand) -> Result<Executed, DomainError> {
    let start_version = product.version();
    let events = execute(product, cmd)?;
    Ok(Executed {
        sku: product.sku().clone(),
        start_version,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_out_of_stock_maps_to_service_out_of_stock() {
        let err: ServiceError = DomainError::out_of_stock(Sku::new("FORK")).into();
        assert!(matches!(err, ServiceError::OutOfStock(ref sku) if sku.as_str() == "FORK"));
        assert_eq!(err.to_string(), "Out of stock for sku FORK");
    }

    #[test]
    fn repository_conflicts_surface_as_concurrency_errors() {
        let err: ServiceError = RepositoryError::Concurrency("stale".to_string()).into();
        assert!(matches!(err, ServiceError::Concurrency(_)));

        let err: ServiceError =
            RepositoryError::DuplicateBatch(BatchReference::new("b1")).into();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));

        let err: ServiceError = RepositoryError::Poisoned.into();
        assert!(matches!(err, ServiceError::Repository(RepositoryError::Poisoned)));
    }

    #[test]
    fn invalid_sku_message() {
        let err = ServiceError::InvalidSku(Sku::new("NONEXISTENT"));
        assert_eq!(err.to_string(), "Invalid sku NONEXISTENT");
    }

    #[test]
    fn other_domain_errors_pass_through() {
        let err: ServiceError = DomainError::validation("bad").into();
        assert_eq!(err.to_string(), "validation failed: bad");
    }
}
