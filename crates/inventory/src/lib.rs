//! Inventory allocation domain.
//!
//! Order lines are matched to batches of stock: in-stock batches first, then
//! shipments by earliest arrival. Pure, deterministic domain logic (no IO,
//! no storage).

pub mod allocator;
pub mod batch;
pub mod line;
pub mod product;

pub use allocator::{allocate, allocate_at, allocation_order, select};
pub use batch::{AllocationRecord, Batch, allocation_priority};
pub use line::{OrderLine, Quantity};
pub use product::{
    AddBatch, Allocate, Allocated, BatchCreated, BatchQuantityChanged, ChangeBatchQuantity,
    Deallocate, Deallocated, OutOfStock, Product, ProductCommand, ProductEvent, event_types,
};
