//! `allocation-core`: domain foundation building blocks.
//!
//! Identifiers, the domain error model and the entity / value object /
//! aggregate traits shared by the allocation crates. No infrastructure here.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::{Entity, same_entity};
pub use error::{DomainError, DomainResult};
pub use id::{BatchReference, OrderId, Sku};
pub use value_object::ValueObject;
