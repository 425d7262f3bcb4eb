//! Allocation domain service.
//!
//! Greedy, single pass: candidates are ranked by [`allocation_priority`] and
//! the first batch that can hold the whole line wins. A line is never split
//! across batches and an earlier choice is never revisited.

use chrono::{DateTime, Utc};

use allocation_core::{BatchReference, DomainError, DomainResult};

use crate::batch::{Batch, allocation_priority};
use crate::line::OrderLine;

/// Indices of `batches` in allocation priority order (stable).
pub fn allocation_order(batches: &[Batch]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..batches.len()).collect();
    order.sort_by(|&a, &b| allocation_priority(&batches[a], &batches[b]));
    order
}

/// Pick the batch `line` should go to, without mutating anything.
///
/// A batch already holding the line is returned as-is, so re-submitting an
/// allocated line never moves it or double-counts it.
pub fn select(line: &OrderLine, batches: &[Batch]) -> Option<usize> {
    if let Some(holder) = batches.iter().position(|b| b.is_allocated(line)) {
        return Some(holder);
    }
    allocation_order(batches)
        .into_iter()
        .find(|&idx| batches[idx].can_allocate(line))
}

/// Allocate `line` to the best batch now. See [`allocate_at`].
pub fn allocate(line: &OrderLine, batches: &mut [Batch]) -> DomainResult<BatchReference> {
    allocate_at(line, batches, Utc::now())
}

/// Allocate `line` to the best batch and return that batch's reference.
///
/// Batches of other SKUs may be passed in; they are never selected. When no
/// batch qualifies, fails with [`DomainError::OutOfStock`] and leaves every
/// batch untouched.
pub fn allocate_at(
    line: &OrderLine,
    batches: &mut [Batch],
    allocated_at: DateTime<Utc>,
) -> DomainResult<BatchReference> {
    let idx = select(line, batches).ok_or_else(|| DomainError::out_of_stock(line.sku().clone()))?;
    let batch = &mut batches[idx];
    batch.allocate_at(line, allocated_at);
    Ok(batch.reference().clone())
}
