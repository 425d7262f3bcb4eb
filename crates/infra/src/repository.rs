//! Product repository boundary and its in-memory implementation.
//!
//! The repository hands out `Product` aggregates keyed by SKU. Products are
//! loaded into a per-transaction staging area and only written back to the
//! shared store when the owning unit of work commits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;

use allocation_core::{AggregateRoot, BatchReference, ExpectedVersion, Sku};
use allocation_inventory::Product;

/// Repository operation error.
///
/// Infrastructure failures only; business outcomes are `DomainError`s.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("repository lock poisoned")]
    Poisoned,

    /// Another product already owns this batch reference.
    #[error("batch {0} already exists")]
    DuplicateBatch(BatchReference),

    /// The unit of work was already committed or rolled back.
    #[error("unit of work already closed")]
    Closed,
}

/// Collection-like access to `Product` aggregates.
pub trait ProductRepository {
    /// Track a new product. It is persisted on commit.
    fn add(&mut self, product: Product);

    /// The product for `sku`, or `None` if no batch of it was ever received.
    fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>, RepositoryError>;

    /// The product owning the batch `reference`.
    fn get_by_batch_ref(
        &mut self,
        reference: &BatchReference,
    ) -> Result<Option<&mut Product>, RepositoryError>;
}

/// Shared in-memory product storage.
///
/// Intended for tests/dev. Writes are all-or-nothing per commit and guarded
/// by a version check per product.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    products: RwLock<HashMap<Sku, Product>>,
    commits: AtomicU64,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// A copy of the stored product.
    pub fn load(&self, sku: &Sku) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(products.get(sku).cloned())
    }

    pub fn find_sku_by_batch(
        &self,
        reference: &BatchReference,
    ) -> Result<Option<Sku>, RepositoryError> {
        let products = self.products.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(products
            .values()
            .find(|p| p.has_batch(reference))
            .map(|p| p.sku().clone()))
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Write `changes` if every product is still at the version it was
    /// loaded at, and no batch reference would end up owned by two products.
    /// A missing product counts as version 0.
    pub(crate) fn save_all(
        &self,
        changes: Vec<(ExpectedVersion, Product)>,
    ) -> Result<(), RepositoryError> {
        let mut products = self.products.write().map_err(|_| RepositoryError::Poisoned)?;

        for (expected, product) in &changes {
            let current = products.get(product.sku()).map(Product::version).unwrap_or(0);
            if !expected.matches(current) {
                return Err(RepositoryError::Concurrency(format!(
                    "product {}: expected {expected:?}, found {current}",
                    product.sku()
                )));
            }
        }

        for (idx, (_, product)) in changes.iter().enumerate() {
            for batch in product.batches() {
                let reference = batch.reference();
                let stored_elsewhere = products
                    .values()
                    .any(|p| p.sku() != product.sku() && p.has_batch(reference));
                let staged_elsewhere = changes
                    .iter()
                    .enumerate()
                    .any(|(other, (_, p))| other != idx && p.has_batch(reference));
                if stored_elsewhere || staged_elsewhere {
                    return Err(RepositoryError::DuplicateBatch(reference.clone()));
                }
            }
        }

        for (_, product) in changes {
            products.insert(product.sku().clone(), product);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }
}

#[derive(Debug)]
struct Staged {
    expected: ExpectedVersion,
    product: Product,
}

/// Transaction-scoped view over an [`InMemoryProductStore`].
///
/// Products are copied out of the store on first access and remembered
/// together with the version they were read at.
#[derive(Debug)]
pub struct InMemoryRepository {
    store: Arc<InMemoryProductStore>,
    staged: HashMap<Sku, Staged>,
}

impl InMemoryRepository {
    pub fn new(store: Arc<InMemoryProductStore>) -> Self {
        Self {
            store,
            staged: HashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<InMemoryProductStore> {
        &self.store
    }

    pub fn has_changes(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Hand staged products to the store for writing.
    pub(crate) fn take_changes(&mut self) -> Vec<(ExpectedVersion, Product)> {
        self.staged
            .drain()
            .map(|(_, s)| (s.expected, s.product))
            .collect()
    }

    /// Forget everything staged in this transaction.
    pub(crate) fn discard(&mut self) {
        self.staged.clear();
    }
}

impl ProductRepository for InMemoryRepository {
    fn add(&mut self, product: Product) {
        self.staged.insert(
            product.sku().clone(),
            Staged {
                expected: ExpectedVersion::Exact(0),
                product,
            },
        );
    }

    fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>, RepositoryError> {
        if !self.staged.contains_key(sku) {
            let Some(product) = self.store.load(sku)? else {
                return Ok(None);
            };
            self.staged.insert(
                sku.clone(),
                Staged {
                    expected: ExpectedVersion::Exact(product.version()),
                    product,
                },
            );
        }
        Ok(self.staged.get_mut(sku).map(|s| &mut s.product))
    }

    fn get_by_batch_ref(
        &mut self,
        reference: &BatchReference,
    ) -> Result<Option<&mut Product>, RepositoryError> {
        let staged_sku = self
            .staged
            .values()
            .find(|s| s.product.has_batch(reference))
            .map(|s| s.product.sku().clone());

        let sku = match staged_sku {
            Some(sku) => Some(sku),
            None => self.store.find_sku_by_batch(reference)?,
        };

        match sku {
            Some(sku) => self.get(&sku),
            None => Ok(None),
        }
    }
}
