//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Entities are compared by identifier only. Rather than overloading `==`
/// on the entity type, callers compare identities explicitly with
/// [`same_entity`] and key collections by [`Entity::id`].
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Two entities are the same iff their identifiers are equal, whatever the
/// rest of their state.
pub fn same_entity<E: Entity>(a: &E, b: &E) -> bool {
    a.id() == b.id()
}
