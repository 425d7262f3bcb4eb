//! Integration tests for the full allocation pipeline.
//!
//! Tests: Service -> UnitOfWork -> Product -> store commit -> MessageBus -> EventBus
//!
//! Verifies:
//! - Allocation policy holds end to end
//! - Nothing is persisted unless the unit of work commits
//! - Out-of-stock outcomes reach the notification port exactly once
//! - Published envelopes carry the product version as sequence number

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use proptest::prelude::*;

    use allocation_core::{AggregateRoot, Sku};
    use allocation_events::{Event, EventBus, EventEnvelope, InMemoryEventBus, Subscription};
    use allocation_inventory::{ProductEvent, event_types};

    use crate::config::AllocationConfig;
    use crate::message_bus::{PRODUCT_AGGREGATE, bootstrap};
    use crate::notifications::InMemoryNotifications;
    use crate::repository::InMemoryProductStore;
    use crate::services::{AllocationService, ServiceError};

    type Bus = Arc<InMemoryEventBus<EventEnvelope<ProductEvent>>>;
    type Service = AllocationService<Arc<InMemoryProductStore>, Bus>;

    struct Harness {
        service: Service,
        store: Arc<InMemoryProductStore>,
        notifications: Arc<InMemoryNotifications>,
        published: Subscription<EventEnvelope<ProductEvent>>,
    }

    fn setup() -> Harness {
        allocation_observability::init_for_tests();

        let store = InMemoryProductStore::shared();
        let notifications = Arc::new(InMemoryNotifications::new());
        let publisher: Bus = Arc::new(InMemoryEventBus::new());
        let published = publisher.subscribe();

        let bus = bootstrap(publisher, notifications.clone(), &AllocationConfig::default());
        let service = AllocationService::new(store.clone(), bus);

        Harness {
            service,
            store,
            notifications,
            published,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn available(store: &InMemoryProductStore, sku: &str, reference: &str) -> i64 {
        let product = store.load(&Sku::new(sku)).unwrap().unwrap();
        product
            .batch(&reference.into())
            .map(|b| b.available_quantity())
            .unwrap()
    }

    fn event_types_of(envelopes: &[EventEnvelope<ProductEvent>]) -> Vec<&'static str> {
        envelopes.iter().map(|e| e.payload().event_type()).collect()
    }

    #[test]
    fn prefers_in_stock_batches_over_shipments() {
        let h = setup();
        h.service.add_batch("in-stock", "WIDGET", 100, None).unwrap();
        h.service
            .add_batch("ship", "WIDGET", 100, date(2024, 2, 1))
            .unwrap();

        let batch_ref = h.service.allocate("o1", "WIDGET", 10).unwrap();

        assert_eq!(batch_ref.as_str(), "in-stock");
        assert_eq!(available(&h.store, "WIDGET", "in-stock"), 90);
        assert_eq!(available(&h.store, "WIDGET", "ship"), 100);
    }

    #[test]
    fn prefers_the_earliest_shipment() {
        let h = setup();
        h.service
            .add_batch("slow", "SPOON", 100, date(2024, 1, 15))
            .unwrap();
        h.service
            .add_batch("speedy", "SPOON", 100, date(2024, 1, 1))
            .unwrap();

        let batch_ref = h.service.allocate("o1", "SPOON", 10).unwrap();

        assert_eq!(batch_ref.as_str(), "speedy");
    }

    #[test]
    fn exhausted_stock_fails_and_notifies_once() {
        let h = setup();
        h.service
            .add_batch("b1", "FORK", 10, date(2024, 1, 1))
            .unwrap();
        h.service.allocate("o1", "FORK", 10).unwrap();
        let commits_before = h.store.commit_count();

        let err = h.service.allocate("o2", "FORK", 1).unwrap_err();

        assert!(matches!(err, ServiceError::OutOfStock(ref sku) if sku.as_str() == "FORK"));
        assert_eq!(err.to_string(), "Out of stock for sku FORK");
        assert_eq!(h.store.commit_count(), commits_before);

        let sent = h.notifications.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, "stock@example.com");
        assert_eq!(sent[0].message, "Out of stock for FORK");
    }

    #[test]
    fn unknown_sku_is_rejected() {
        let h = setup();
        h.service.add_batch("b1", "AREALSKU", 100, None).unwrap();

        let err = h.service.allocate("o1", "NONEXISTENTSKU", 10).unwrap_err();

        assert!(matches!(err, ServiceError::InvalidSku(_)));
        assert_eq!(err.to_string(), "Invalid sku NONEXISTENTSKU");
        assert!(h.store.load(&Sku::new("NONEXISTENTSKU")).unwrap().is_none());
    }

    #[test]
    fn successful_operations_commit() {
        let h = setup();
        h.service.add_batch("b1", "LAMP", 100, None).unwrap();
        assert_eq!(h.store.commit_count(), 1);

        h.service.allocate("o1", "LAMP", 10).unwrap();
        assert_eq!(h.store.commit_count(), 2);

        let product = h.store.load(&Sku::new("LAMP")).unwrap().unwrap();
        assert_eq!(product.version(), 2);
    }

    #[test]
    fn reallocating_the_same_line_is_idempotent() {
        let h = setup();
        h.service.add_batch("b1", "LAMP", 20, None).unwrap();

        let first = h.service.allocate("o1", "LAMP", 10).unwrap();
        let second = h.service.allocate("o1", "LAMP", 10).unwrap();

        assert_eq!(first, second);
        assert_eq!(available(&h.store, "LAMP", "b1"), 10);
        assert_eq!(h.store.commit_count(), 2);
    }

    #[test]
    fn deallocate_restores_available_quantity() {
        let h = setup();
        h.service.add_batch("b1", "LAMP", 20, None).unwrap();
        h.service.allocate("o1", "LAMP", 5).unwrap();

        h.service.deallocate("o1", "LAMP", 5).unwrap();

        assert_eq!(available(&h.store, "LAMP", "b1"), 20);
    }

    #[test]
    fn deallocating_an_unallocated_line_is_not_found() {
        let h = setup();
        h.service.add_batch("b1", "LAMP", 20, None).unwrap();
        let commits_before = h.store.commit_count();

        let err = h.service.deallocate("o9", "LAMP", 5).unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Domain(allocation_core::DomainError::NotFound(_))
        ));
        assert_eq!(h.store.commit_count(), commits_before);
    }

    #[test]
    fn zero_quantity_lines_are_rejected_before_touching_the_store() {
        let h = setup();
        h.service.add_batch("b1", "LAMP", 20, None).unwrap();

        let err = h.service.allocate("o1", "LAMP", 0).unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Domain(allocation_core::DomainError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_batch_reference_conflicts_across_skus() {
        let h = setup();
        h.service.add_batch("b1", "LAMP", 20, None).unwrap();

        let err = h.service.add_batch("b1", "DESK", 5, None).unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Domain(allocation_core::DomainError::Conflict(_))
        ));
        assert!(h.store.load(&Sku::new("DESK")).unwrap().is_none());
    }

    #[test]
    fn change_batch_quantity_moves_lines_to_other_batches() {
        let h = setup();
        h.service.add_batch("in-stock", "TABLE", 50, None).unwrap();
        h.service
            .add_batch("ship", "TABLE", 50, date(2024, 3, 1))
            .unwrap();
        h.service.allocate("o1", "TABLE", 20).unwrap();
        h.service.allocate("o2", "TABLE", 20).unwrap();

        h.service.change_batch_quantity("in-stock", 25).unwrap();

        assert_eq!(available(&h.store, "TABLE", "in-stock"), 5);
        assert_eq!(available(&h.store, "TABLE", "ship"), 30);
        assert!(h.notifications.sent().is_empty());
    }

    #[test]
    fn change_batch_quantity_reports_lines_that_fit_nowhere() {
        let h = setup();
        h.service.add_batch("only", "TABLE", 30, None).unwrap();
        h.service.allocate("o1", "TABLE", 10).unwrap();
        h.service.allocate("o2", "TABLE", 10).unwrap();

        h.service.change_batch_quantity("only", 15).unwrap();

        assert_eq!(available(&h.store, "TABLE", "only"), 5);
        let sent = h.notifications.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message, "Out of stock for TABLE");
    }

    #[test]
    fn change_batch_quantity_for_unknown_batch() {
        let h = setup();

        let err = h.service.change_batch_quantity("ghost", 5).unwrap_err();

        assert!(matches!(err, ServiceError::UnknownBatch(ref r) if r.as_str() == "ghost"));
    }

    #[test]
    fn committed_events_are_published_in_version_order() {
        let h = setup();
        h.service.add_batch("b1", "LAMP", 10, None).unwrap();
        h.service.allocate("o1", "LAMP", 10).unwrap();
        let _ = h.service.allocate("o2", "LAMP", 1);

        let envelopes = h.published.drain();

        assert_eq!(
            event_types_of(&envelopes),
            vec![
                event_types::BATCH_CREATED,
                event_types::ALLOCATED,
                event_types::OUT_OF_STOCK
            ]
        );
        let sequence: Vec<u64> = envelopes.iter().map(|e| e.sequence_number()).collect();
        assert_eq!(sequence, vec![1, 2, 2]);
        assert!(envelopes.iter().all(|e| e.stream_id() == "LAMP"));
        assert!(envelopes.iter().all(|e| e.aggregate_type() == PRODUCT_AGGREGATE));
    }

    #[test]
    fn custom_notification_address_is_used() {
        let store = InMemoryProductStore::shared();
        let notifications = Arc::new(InMemoryNotifications::new());
        let config = AllocationConfig::from_lookup(|key| {
            (key == "STOCK_NOTIFICATION_ADDRESS").then(|| "buyers@example.com".to_string())
        });
        let publisher: Bus = Arc::new(InMemoryEventBus::new());
        let service =
            AllocationService::new(store, bootstrap(publisher, notifications.clone(), &config));

        service.add_batch("b1", "RUG", 1, None).unwrap();
        let _ = service.allocate("o1", "RUG", 2);

        assert_eq!(notifications.sent()[0].destination, "buyers@example.com");
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        #[test]
        fn allocations_never_exceed_purchased_stock(
            batches in prop::collection::vec(1u32..50, 1..5),
            orders in prop::collection::vec(1u32..30, 1..20),
        ) {
            let h = setup();
            for (i, qty) in batches.iter().enumerate() {
                h.service.add_batch(format!("b{i}"), "PROP", *qty, None).unwrap();
            }

            let mut allocated: u64 = 0;
            let mut failures = 0usize;
            for (i, qty) in orders.iter().enumerate() {
                match h.service.allocate(format!("o{i}"), "PROP", *qty) {
                    Ok(_) => allocated += u64::from(*qty),
                    Err(ServiceError::OutOfStock(_)) => failures += 1,
                    Err(other) => prop_assert!(false, "unexpected error: {other}"),
                }
            }

            let purchased: u64 = batches.iter().map(|q| u64::from(*q)).sum();
            prop_assert!(allocated <= purchased);
            prop_assert_eq!(h.notifications.sent().len(), failures);

            let product = h.store.load(&Sku::new("PROP")).unwrap().unwrap();
            prop_assert_eq!(product.available_quantity(), (purchased - allocated) as i64);
        }
    }
}
