use serde::{Deserialize, Serialize};

use allocation_core::{DomainError, DomainResult, OrderId, Sku, ValueObject};

/// Units of stock.
pub type Quantity = u32;

/// A request to allocate `quantity` units of `sku` to an order.
///
/// Value object: two lines are the same line iff order, SKU and quantity all
/// match, which is what makes re-allocating an identical line a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderLine {
    order_id: OrderId,
    sku: Sku,
    quantity: Quantity,
}

impl OrderLine {
    pub fn new(
        order_id: impl Into<OrderId>,
        sku: impl Into<Sku>,
        quantity: Quantity,
    ) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::validation("order line quantity must be positive"));
        }
        Ok(Self {
            order_id: order_id.into(),
            sku: sku.into(),
            quantity,
        })
    }

    /// Rebuild a line recorded in an already-accepted event.
    pub(crate) fn from_parts(order_id: OrderId, sku: Sku, quantity: Quantity) -> Self {
        Self {
            order_id,
            sku,
            quantity,
        }
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }
}

impl ValueObject for OrderLine {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_quantity_is_rejected() {
        let err = OrderLine::new("o1", "LAMP", 0).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn lines_compare_by_value() {
        let a = OrderLine::new("o1", "LAMP", 2).unwrap();
        let b = OrderLine::new("o1", "LAMP", 2).unwrap();
        let c = OrderLine::new("o1", "LAMP", 3).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
