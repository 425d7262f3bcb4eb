use core::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use allocation_core::{BatchReference, Entity, Sku};

use crate::line::{OrderLine, Quantity};

/// One order line held by a batch, with the time it was allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub line: OrderLine,
    pub allocated_at: DateTime<Utc>,
}

/// Entity: a quantity of one SKU received together.
///
/// Identity is the `reference` alone (see [`Entity`]); `Batch` deliberately
/// has no `PartialEq`. Allocated and available quantities are derived from
/// the allocation records on every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    reference: BatchReference,
    sku: Sku,
    purchased_quantity: Quantity,
    /// `None` means the stock is already in the warehouse.
    eta: Option<NaiveDate>,
    allocations: Vec<AllocationRecord>,
}

impl Batch {
    pub fn new(
        reference: impl Into<BatchReference>,
        sku: impl Into<Sku>,
        purchased_quantity: Quantity,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            purchased_quantity,
            eta,
            allocations: Vec::new(),
        }
    }

    pub fn reference(&self) -> &BatchReference {
        &self.reference
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    pub fn purchased_quantity(&self) -> Quantity {
        self.purchased_quantity
    }

    pub fn allocated_quantity(&self) -> i64 {
        self.allocations
            .iter()
            .map(|r| i64::from(r.line.quantity()))
            .sum()
    }

    /// Purchased minus allocated. Negative after a downward quantity
    /// correction until lines are moved elsewhere.
    pub fn available_quantity(&self) -> i64 {
        i64::from(self.purchased_quantity) - self.allocated_quantity()
    }

    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        self.sku == *line.sku() && self.available_quantity() >= i64::from(line.quantity())
    }

    pub fn is_allocated(&self, line: &OrderLine) -> bool {
        self.allocations.iter().any(|r| r.line == *line)
    }

    pub fn allocations(&self) -> impl Iterator<Item = &OrderLine> {
        self.allocations.iter().map(|r| &r.line)
    }

    pub fn allocation_records(&self) -> &[AllocationRecord] {
        &self.allocations
    }

    /// Allocate `line` now. See [`Batch::allocate_at`].
    pub fn allocate(&mut self, line: &OrderLine) {
        self.allocate_at(line, Utc::now());
    }

    /// Record `line` against this batch if it fits.
    ///
    /// A line that does not fit, or is already held, leaves the batch
    /// unchanged.
    pub fn allocate_at(&mut self, line: &OrderLine, allocated_at: DateTime<Utc>) {
        if self.can_allocate(line) && !self.is_allocated(line) {
            self.allocations.push(AllocationRecord {
                line: line.clone(),
                allocated_at,
            });
        }
    }

    /// Remove `line` if held. Returns whether anything was removed.
    pub fn deallocate(&mut self, line: &OrderLine) -> bool {
        let before = self.allocations.len();
        self.allocations.retain(|r| r.line != *line);
        self.allocations.len() != before
    }

    /// Out-of-band correction (damaged goods, miscount).
    pub fn change_purchased_quantity(&mut self, quantity: Quantity) {
        self.purchased_quantity = quantity;
    }

    /// The line that would be given up first when the batch shrinks: the
    /// most recently allocated, larger quantity first on equal timestamps.
    pub fn most_recent_allocation(&self) -> Option<&OrderLine> {
        self.most_recent_index()
            .and_then(|idx| self.allocations.get(idx))
            .map(|r| &r.line)
    }

    /// Remove and return the line chosen by [`Batch::most_recent_allocation`].
    pub fn deallocate_one(&mut self) -> Option<OrderLine> {
        let idx = self.most_recent_index()?;
        Some(self.allocations.remove(idx).line)
    }

    fn most_recent_index(&self) -> Option<usize> {
        // Later insertion wins remaining ties.
        self.allocations
            .iter()
            .enumerate()
            .max_by_key(|(idx, r)| (r.allocated_at, r.line.quantity(), *idx))
            .map(|(idx, _)| idx)
    }
}

impl Entity for Batch {
    type Id = BatchReference;

    fn id(&self) -> &Self::Id {
        &self.reference
    }
}

/// Allocation priority: batches without an ETA (in stock) first, then by
/// ETA ascending. Batches with equal ETAs compare equal, so a stable sort
/// keeps their input order.
pub fn allocation_priority(a: &Batch, b: &Batch) -> Ordering {
    match (a.eta, b.eta) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    }
}
