use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use allocation_core::{
    Aggregate, AggregateRoot, BatchReference, DomainError, DomainResult, OrderId, Sku,
};
use allocation_events::Event;

use crate::allocator;
use crate::batch::Batch;
use crate::line::{OrderLine, Quantity};

/// Stable event type names, used to route events to handlers.
pub mod event_types {
    pub const BATCH_CREATED: &str = "allocation.batch.created";
    pub const ALLOCATED: &str = "allocation.line.allocated";
    pub const DEALLOCATED: &str = "allocation.line.deallocated";
    pub const BATCH_QUANTITY_CHANGED: &str = "allocation.batch.quantity_changed";
    pub const OUT_OF_STOCK: &str = "allocation.product.out_of_stock";
}

/// Aggregate root: Product.
///
/// All batches of one SKU plus a version number. Every change to those
/// batches goes through `handle`/`apply`, and every applied state change
/// bumps the version so storage can detect concurrent writers.
#[derive(Debug, Clone)]
pub struct Product {
    sku: Sku,
    batches: Vec<Batch>,
    version: u64,
}

impl Product {
    /// A product with no batches yet, at version 0.
    pub fn new(sku: impl Into<Sku>) -> Self {
        Self {
            sku: sku.into(),
            batches: Vec::new(),
            version: 0,
        }
    }

    /// Rebuild a product from stored state.
    pub fn restore(
        sku: impl Into<Sku>,
        batches: Vec<Batch>,
        version: u64,
    ) -> Result<Self, DomainError> {
        let sku = sku.into();
        if let Some(stray) = batches.iter().find(|b| *b.sku() != sku) {
            return Err(DomainError::invariant(format!(
                "batch {} has sku {}, expected {}",
                stray.reference(),
                stray.sku(),
                sku
            )));
        }
        Ok(Self { sku, batches, version })
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn batch(&self, reference: &BatchReference) -> Option<&Batch> {
        self.batches.iter().find(|b| b.reference() == reference)
    }

    pub fn has_batch(&self, reference: &BatchReference) -> bool {
        self.batch(reference).is_some()
    }

    /// Reference of the batch currently holding `line`, if any.
    pub fn allocation_of(&self, line: &OrderLine) -> Option<&BatchReference> {
        self.batches
            .iter()
            .find(|b| b.is_allocated(line))
            .map(Batch::reference)
    }

    /// Total available quantity across batches.
    pub fn available_quantity(&self) -> i64 {
        self.batches.iter().map(Batch::available_quantity).sum()
    }

    /// Allocate `line` and report the batch it went to.
    ///
    /// The events come back either way: on a shortage they carry the
    /// `OutOfStock` event next to the error, so callers can still dispatch it.
    pub fn allocate(
        &mut self,
        line: &OrderLine,
        occurred_at: DateTime<Utc>,
    ) -> (Vec<ProductEvent>, DomainResult<BatchReference>) {
        let events = self.handle_allocate(&Allocate {
            line: line.clone(),
            occurred_at,
        });
        for event in &events {
            self.apply(event);
        }

        let outcome = self
            .allocation_of(line)
            .cloned()
            .ok_or_else(|| DomainError::out_of_stock(line.sku().clone()));
        (events, outcome)
    }

    fn batch_mut(&mut self, reference: &BatchReference) -> Option<&mut Batch> {
        self.batches.iter_mut().find(|b| b.reference() == reference)
    }
}

impl AggregateRoot for Product {
    type Id = Sku;

    fn id(&self) -> &Self::Id {
        &self.sku
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AddBatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddBatch {
    pub reference: BatchReference,
    pub sku: Sku,
    pub quantity: Quantity,
    pub eta: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Allocate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocate {
    pub line: OrderLine,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Deallocate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deallocate {
    pub line: OrderLine,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeBatchQuantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatchQuantity {
    pub reference: BatchReference,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    AddBatch(AddBatch),
    Allocate(Allocate),
    Deallocate(Deallocate),
    ChangeBatchQuantity(ChangeBatchQuantity),
}

/// Event: BatchCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCreated {
    pub sku: Sku,
    pub reference: BatchReference,
    pub quantity: Quantity,
    pub eta: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocated {
    pub order_id: OrderId,
    pub sku: Sku,
    pub quantity: Quantity,
    pub batch_ref: BatchReference,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Deallocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deallocated {
    pub order_id: OrderId,
    pub sku: Sku,
    pub quantity: Quantity,
    pub batch_ref: BatchReference,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BatchQuantityChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchQuantityChanged {
    pub sku: Sku,
    pub reference: BatchReference,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OutOfStock.
///
/// No batch could take the line. Does not change state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfStock {
    pub sku: Sku,
    pub order_id: OrderId,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    BatchCreated(BatchCreated),
    Allocated(Allocated),
    Deallocated(Deallocated),
    BatchQuantityChanged(BatchQuantityChanged),
    OutOfStock(OutOfStock),
}

impl ProductEvent {
    pub fn sku(&self) -> &Sku {
        match self {
            ProductEvent::BatchCreated(e) => &e.sku,
            ProductEvent::Allocated(e) => &e.sku,
            ProductEvent::Deallocated(e) => &e.sku,
            ProductEvent::BatchQuantityChanged(e) => &e.sku,
            ProductEvent::OutOfStock(e) => &e.sku,
        }
    }

    /// Whether applying this event modifies the aggregate (and its version).
    pub fn changes_state(&self) -> bool {
        !matches!(self, ProductEvent::OutOfStock(_))
    }
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::BatchCreated(_) => event_types::BATCH_CREATED,
            ProductEvent::Allocated(_) => event_types::ALLOCATED,
            ProductEvent::Deallocated(_) => event_types::DEALLOCATED,
            ProductEvent::BatchQuantityChanged(_) => event_types::BATCH_QUANTITY_CHANGED,
            ProductEvent::OutOfStock(_) => event_types::OUT_OF_STOCK,
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::BatchCreated(e) => e.occurred_at,
            ProductEvent::Allocated(e) => e.occurred_at,
            ProductEvent::Deallocated(e) => e.occurred_at,
            ProductEvent::BatchQuantityChanged(e) => e.occurred_at,
            ProductEvent::OutOfStock(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::BatchCreated(e) => {
                self.batches
                    .push(Batch::new(e.reference.clone(), e.sku.clone(), e.quantity, e.eta));
            }
            ProductEvent::Allocated(e) => {
                let line = line_of(&e.order_id, &e.sku, e.quantity);
                if let Some(batch) = self.batch_mut(&e.batch_ref) {
                    batch.allocate_at(&line, e.occurred_at);
                }
            }
            ProductEvent::Deallocated(e) => {
                let line = line_of(&e.order_id, &e.sku, e.quantity);
                if let Some(batch) = self.batch_mut(&e.batch_ref) {
                    batch.deallocate(&line);
                }
            }
            ProductEvent::BatchQuantityChanged(e) => {
                if let Some(batch) = self.batch_mut(&e.reference) {
                    batch.change_purchased_quantity(e.quantity);
                }
            }
            ProductEvent::OutOfStock(_) => return,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::AddBatch(cmd) => self.handle_add_batch(cmd),
            ProductCommand::Allocate(cmd) => Ok(self.handle_allocate(cmd)),
            ProductCommand::Deallocate(cmd) => self.handle_deallocate(cmd),
            ProductCommand::ChangeBatchQuantity(cmd) => self.handle_change_quantity(cmd),
        }
    }
}

fn line_of(order_id: &OrderId, sku: &Sku, quantity: Quantity) -> OrderLine {
    OrderLine::from_parts(order_id.clone(), sku.clone(), quantity)
}

impl Product {
    fn ensure_sku(&self, sku: &Sku) -> Result<(), DomainError> {
        if *sku != self.sku {
            return Err(DomainError::validation(format!(
                "sku {sku} does not belong to product {}",
                self.sku
            )));
        }
        Ok(())
    }

    fn handle_add_batch(&self, cmd: &AddBatch) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_sku(&cmd.sku)?;
        if self.has_batch(&cmd.reference) {
            return Err(DomainError::conflict(format!(
                "batch {} already exists",
                cmd.reference
            )));
        }

        Ok(vec![ProductEvent::BatchCreated(BatchCreated {
            sku: cmd.sku.clone(),
            reference: cmd.reference.clone(),
            quantity: cmd.quantity,
            eta: cmd.eta,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Allocation never fails at this level: a shortage is reported as an
    /// `OutOfStock` event. A line already held by a batch yields no events.
    fn handle_allocate(&self, cmd: &Allocate) -> Vec<ProductEvent> {
        let line = &cmd.line;
        match allocator::select(line, &self.batches) {
            Some(idx) if self.batches[idx].is_allocated(line) => vec![],
            Some(idx) => vec![allocated(line, self.batches[idx].reference(), cmd.occurred_at)],
            None => vec![out_of_stock(line, cmd.occurred_at)],
        }
    }

    fn handle_deallocate(&self, cmd: &Deallocate) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_sku(cmd.line.sku())?;
        let batch_ref = self.allocation_of(&cmd.line).ok_or_else(|| {
            DomainError::not_found(format!(
                "order {} has no allocation of {}",
                cmd.line.order_id(),
                cmd.line.sku()
            ))
        })?;

        Ok(vec![deallocated(&cmd.line, batch_ref, cmd.occurred_at)])
    }

    /// Shrinking a batch below what it has allocated gives up its most
    /// recent lines one at a time and re-submits each to the allocator.
    ///
    /// Decisions are made on a draft copy so each deallocate/reallocate pair
    /// is evaluated against the state left by the previous one.
    fn handle_change_quantity(
        &self,
        cmd: &ChangeBatchQuantity,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.has_batch(&cmd.reference) {
            return Err(DomainError::not_found(format!("batch {}", cmd.reference)));
        }

        let mut draft = self.clone();
        let mut events = Vec::new();

        let changed = ProductEvent::BatchQuantityChanged(BatchQuantityChanged {
            sku: self.sku.clone(),
            reference: cmd.reference.clone(),
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        });
        draft.apply(&changed);
        events.push(changed);

        loop {
            let Some(batch) = draft.batch(&cmd.reference) else {
                break;
            };
            if batch.available_quantity() >= 0 {
                break;
            }
            let Some(line) = batch.most_recent_allocation().cloned() else {
                break;
            };

            let released = deallocated(&line, &cmd.reference, cmd.occurred_at);
            draft.apply(&released);
            events.push(released);

            let outcome = match allocator::select(&line, &draft.batches) {
                Some(idx) => allocated(&line, draft.batches[idx].reference(), cmd.occurred_at),
                None => out_of_stock(&line, cmd.occurred_at),
            };
            draft.apply(&outcome);
            events.push(outcome);
        }

        Ok(events)
    }
}

fn allocated(line: &OrderLine, batch_ref: &BatchReference, at: DateTime<Utc>) -> ProductEvent {
    ProductEvent::Allocated(Allocated {
        order_id: line.order_id().clone(),
        sku: line.sku().clone(),
        quantity: line.quantity(),
        batch_ref: batch_ref.clone(),
        occurred_at: at,
    })
}

fn deallocated(line: &OrderLine, batch_ref: &BatchReference, at: DateTime<Utc>) -> ProductEvent {
    ProductEvent::Deallocated(Deallocated {
        order_id: line.order_id().clone(),
        sku: line.sku().clone(),
        quantity: line.quantity(),
        batch_ref: batch_ref.clone(),
        occurred_at: at,
    })
}

fn out_of_stock(line: &OrderLine, at: DateTime<Utc>) -> ProductEvent {
    ProductEvent::OutOfStock(OutOfStock {
        sku: line.sku().clone(),
        order_id: line.order_id().clone(),
        quantity: line.quantity(),
        occurred_at: at,
    })
}
