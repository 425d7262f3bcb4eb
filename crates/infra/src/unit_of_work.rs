//! Unit of work: one transaction around a use case.
//!
//! `begin()` acquires a handle; the handle is released exactly once, either
//! by `commit()` / `rollback()` or by `Drop`, which rolls back anything not
//! committed. Early returns through `?` and panics therefore leave the store
//! untouched.

use std::sync::Arc;

use crate::repository::{
    InMemoryProductStore, InMemoryRepository, ProductRepository, RepositoryError,
};

/// Transaction boundary for product changes.
pub trait UnitOfWork {
    type Products: ProductRepository;

    fn products(&mut self) -> &mut Self::Products;

    /// Persist every product touched in this transaction, or none of them.
    /// Fails with [`RepositoryError::Closed`] once the handle was released.
    fn commit(&mut self) -> Result<(), RepositoryError>;

    /// Discard every change made in this transaction. No-op once released.
    fn rollback(&mut self);
}

/// Something that can open units of work (usually a store handle).
pub trait UnitOfWorkFactory {
    type Uow: UnitOfWork;

    fn begin(&self) -> Self::Uow;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UowState {
    Open,
    Committed,
    RolledBack,
}

/// Unit of work over an [`InMemoryProductStore`].
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    products: InMemoryRepository,
    state: UowState,
}

impl InMemoryUnitOfWork {
    pub fn begin(store: Arc<InMemoryProductStore>) -> Self {
        tracing::trace!("unit of work opened");
        Self {
            products: InMemoryRepository::new(store),
            state: UowState::Open,
        }
    }

    pub fn state(&self) -> UowState {
        self.state
    }
}

impl UnitOfWork for InMemoryUnitOfWork {
    type Products = InMemoryRepository;

    fn products(&mut self) -> &mut Self::Products {
        &mut self.products
    }

    fn commit(&mut self) -> Result<(), RepositoryError> {
        if self.state != UowState::Open {
            self.products.discard();
            return Err(RepositoryError::Closed);
        }

        let changes = self.products.take_changes();
        let touched = changes.len();

        match self.products.store().save_all(changes) {
            Ok(()) => {
                self.state = UowState::Committed;
                tracing::debug!(products = touched, "unit of work committed");
                Ok(())
            }
            Err(err) => {
                self.state = UowState::RolledBack;
                tracing::warn!(error = %err, "unit of work commit rejected");
                Err(err)
            }
        }
    }

    fn rollback(&mut self) {
        if self.state != UowState::Open {
            return;
        }
        if self.products.has_changes() {
            tracing::debug!("unit of work rolled back with pending changes");
        }
        self.products.discard();
        self.state = UowState::RolledBack;
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        if self.state == UowState::Open {
            self.rollback();
        }
    }
}

impl UnitOfWorkFactory for Arc<InMemoryProductStore> {
    type Uow = InMemoryUnitOfWork;

    fn begin(&self) -> Self::Uow {
        InMemoryUnitOfWork::begin(self.clone())
    }
}
