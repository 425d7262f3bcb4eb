//! Domain error model.

use thiserror::Error;

use crate::id::Sku;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only. Storage and transport failures are
/// modelled by the infrastructure crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. a non-positive quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. empty).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested entity was not found (domain-level).
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (duplicate identity, stale version).
    #[error("conflict: {0}")]
    Conflict(String),

    /// No batch can satisfy the requested order line.
    ///
    /// An expected business outcome: safe to retry once more stock arrives.
    #[error("Out of stock for sku {sku}")]
    OutOfStock { sku: Sku },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn out_of_stock(sku: Sku) -> Self {
        Self::OutOfStock { sku }
    }

    /// True for the shortage outcome callers are expected to branch on.
    pub fn is_out_of_stock(&self) -> bool {
        matches!(self, Self::OutOfStock { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_stock_message_names_the_sku() {
        let err = DomainError::out_of_stock(Sku::new("SMALL-FORK"));
        assert_eq!(err.to_string(), "Out of stock for sku SMALL-FORK");
        assert!(err.is_out_of_stock());
        assert!(!DomainError::validation("x").is_out_of_stock());
    }
}
