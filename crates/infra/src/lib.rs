//! Infrastructure layer: persistence boundary, transactions, use cases and
//! event dispatch for stock allocation.

pub mod config;
pub mod message_bus;
pub mod notifications;
pub mod repository;
pub mod services;
pub mod unit_of_work;

mod integration_tests;

pub use config::AllocationConfig;
pub use message_bus::{
    Handler, HandlerError, MessageBus, MessageBusError, PRODUCT_AGGREGATE, bootstrap,
    envelopes_for,
};
pub use notifications::{InMemoryNotifications, NotificationError, Notifications, SentNotification};
pub use repository::{InMemoryProductStore, InMemoryRepository, ProductRepository, RepositoryError};
pub use services::{AllocationService, ServiceError, ServiceResult};
pub use unit_of_work::{InMemoryUnitOfWork, UnitOfWork, UnitOfWorkFactory, UowState};
