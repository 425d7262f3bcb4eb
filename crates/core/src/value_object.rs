//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by all of their attributes: two
/// order lines for the same order, SKU and quantity are the same line.
/// "Changing" a value object means building a new one.
pub trait ValueObject: Clone + PartialEq + Eq + core::hash::Hash + core::fmt::Debug {}
