use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use strive_booking::{
    BookingEngine, BookingOutcome, EngineConfig, EngineError, InMemoryLockManager,
};
use strive_catalog::{CapacityStore, ClassSession};
use strive_core::{Clock, LogNotifier, ManualClock, MockPaymentGateway};
use strive_ledger::CreditLedger;
use strive_waitlist::WaitlistQueue;
use uuid::Uuid;

struct Harness {
    engine: Arc<BookingEngine>,
    clock: Arc<ManualClock>,
    ledger: Arc<CreditLedger>,
    capacity: Arc<CapacityStore>,
    locks: Arc<InMemoryLockManager>,
}

fn harness() -> Harness {
    harness_with_gateway(MockPaymentGateway::new())
}

fn harness_with_gateway(gateway: MockPaymentGateway) -> Harness {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let capacity = Arc::new(CapacityStore::new());
    let ledger = Arc::new(CreditLedger::new());
    let waitlist = Arc::new(WaitlistQueue::new(50));
    let locks = Arc::new(InMemoryLockManager::new());

    let engine = Arc::new(BookingEngine::new(
        capacity.clone(),
        ledger.clone(),
        waitlist.clone(),
        locks.clone(),
        Arc::new(gateway),
        Arc::new(LogNotifier),
        clock.clone(),
        EngineConfig::default(),
    ));

    Harness {
        engine,
        clock,
        ledger,
        capacity,
        locks,
    }
}

impl Harness {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn fund(&self, user_id: Uuid, credits: i32) {
        self.ledger.grant(
            user_id,
            "SG".to_string(),
            credits,
            self.now() + Duration::days(30),
            self.now(),
        );
    }

    /// Class starting comfortably outside the cancellation grace window.
    fn add_class(&self, required_credits: i32, total_slots: i32) -> Uuid {
        self.add_class_starting_in(required_credits, total_slots, Duration::hours(24))
    }

    fn add_class_starting_in(
        &self,
        required_credits: i32,
        total_slots: i32,
        starts_in: Duration,
    ) -> Uuid {
        let start = self.now() + starts_in;
        let session = ClassSession::new(
            "Spin 45".to_string(),
            "SG".to_string(),
            required_credits,
            total_slots,
            start,
            start + Duration::hours(1),
        );
        let id = session.id;
        self.engine.add_class(session);
        id
    }
}

fn confirmed(outcome: BookingOutcome) -> strive_booking::Booking {
    match outcome {
        BookingOutcome::Confirmed { booking } => booking,
        BookingOutcome::Waitlisted { position } => {
            panic!("expected confirmation, got waitlisted at {}", position)
        }
    }
}

#[tokio::test]
async fn test_book_deducts_credits_and_fills_slot() {
    let h = harness();
    let user = Uuid::new_v4();
    h.fund(user, 10);
    let class_id = h.add_class(4, 5);

    let booking = confirmed(h.engine.book(user, class_id).await.unwrap());

    assert!(booking.is_active);
    assert!(booking.is_confirmed);
    assert_eq!(booking.credits_used, 4);
    assert_eq!(h.engine.remaining_credits(&user), 6);
    assert_eq!(h.capacity.get(&class_id).unwrap().booked_slots, 1);
}

#[tokio::test]
async fn test_unknown_class_is_rejected() {
    let h = harness();
    let err = h.engine.book(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::ClassNotFound(_)));
}

#[tokio::test]
async fn test_insufficient_credits_leaves_no_mutation() {
    let h = harness();
    let user = Uuid::new_v4();
    h.fund(user, 3);
    let class_id = h.add_class(5, 5);

    let err = h.engine.book(user, class_id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientCredits {
            required: 5,
            available: 3
        }
    ));
    assert_eq!(h.engine.remaining_credits(&user), 3);
    assert_eq!(h.capacity.get(&class_id).unwrap().booked_slots, 0);
}

#[tokio::test]
async fn test_full_class_waitlists_then_promotes_on_cancel() {
    let h = harness();
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    h.fund(user_a, 10);
    h.fund(user_b, 10);
    let class_id = h.add_class(5, 1);

    let booking_a = confirmed(h.engine.book(user_a, class_id).await.unwrap());
    assert_eq!(h.capacity.get(&class_id).unwrap().booked_slots, 1);

    match h.engine.book(user_b, class_id).await.unwrap() {
        BookingOutcome::Waitlisted { position } => assert_eq!(position, 1),
        BookingOutcome::Confirmed { .. } => panic!("class was full"),
    }
    assert_eq!(h.engine.waitlist_position(&user_b, &class_id), Some(1));

    // Cancellation well before start refunds A and promotes B in the same
    // lock span
    let outcome = h.engine.cancel(booking_a.id).await.unwrap();
    assert!(outcome.refunded);
    let promoted = outcome.promoted.expect("waitlist head should be promoted");
    assert_eq!(promoted.user_id, user_b);

    assert_eq!(h.engine.remaining_credits(&user_a), 10);
    assert_eq!(h.engine.remaining_credits(&user_b), 5);
    assert_eq!(h.engine.waitlist_position(&user_b, &class_id), None);
    assert_eq!(h.engine.waitlist_size(&class_id), 0);
    assert_eq!(h.capacity.get(&class_id).unwrap().booked_slots, 1);
    assert!(!h.engine.booking(&booking_a.id).unwrap().is_active);
}

#[tokio::test]
async fn test_refund_boundary_around_grace_window() {
    let h = harness();
    let user = Uuid::new_v4();
    h.fund(user, 20);

    // Just outside the 4h window: refunded
    let early = h.add_class_starting_in(5, 3, Duration::hours(4) + Duration::minutes(1));
    let booking = confirmed(h.engine.book(user, early).await.unwrap());
    assert_eq!(h.engine.remaining_credits(&user), 15);
    let outcome = h.engine.cancel(booking.id).await.unwrap();
    assert!(outcome.refunded);
    assert_eq!(h.engine.remaining_credits(&user), 20);

    // Just inside the window: forfeited
    let late = h.add_class_starting_in(5, 3, Duration::hours(4) - Duration::minutes(1));
    let booking = confirmed(h.engine.book(user, late).await.unwrap());
    let outcome = h.engine.cancel(booking.id).await.unwrap();
    assert!(!outcome.refunded);
    assert_eq!(h.engine.remaining_credits(&user), 15);

    // Exactly at the boundary counts as inside
    let exact = h.add_class_starting_in(5, 3, Duration::hours(4));
    let booking = confirmed(h.engine.book(user, exact).await.unwrap());
    let outcome = h.engine.cancel(booking.id).await.unwrap();
    assert!(!outcome.refunded);
    assert_eq!(h.engine.remaining_credits(&user), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_booking_respects_capacity() {
    let h = harness();
    let class_id = h.add_class(5, 3);

    let users: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
    for user in &users {
        h.fund(*user, 10);
    }

    let mut handles = Vec::new();
    for user in users.clone() {
        let engine = h.engine.clone();
        handles.push(tokio::spawn(async move {
            // LockUnavailable is retryable by contract
            loop {
                match engine.book(user, class_id).await {
                    Err(EngineError::LockUnavailable) => tokio::task::yield_now().await,
                    other => return other,
                }
            }
        }));
    }

    let mut confirmed_count = 0;
    let mut waitlisted_count = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            BookingOutcome::Confirmed { .. } => confirmed_count += 1,
            BookingOutcome::Waitlisted { .. } => waitlisted_count += 1,
        }
    }

    assert_eq!(confirmed_count, 3);
    assert_eq!(waitlisted_count, 5);

    let class = h.capacity.get(&class_id).unwrap();
    assert_eq!(class.booked_slots, 3);
    assert_eq!(class.total_slots, 3);
    assert_eq!(h.engine.waitlist_size(&class_id), 5);

    let active: usize = users
        .iter()
        .map(|u| {
            h.engine
                .bookings_for_user(u)
                .iter()
                .filter(|b| b.is_active)
                .count()
        })
        .sum();
    assert_eq!(active, 3);
}

#[tokio::test]
async fn test_promotion_skips_users_without_credits() {
    let h = harness();
    let user_a = Uuid::new_v4();
    let broke = Uuid::new_v4();
    let user_c = Uuid::new_v4();
    h.fund(user_a, 10);
    h.fund(user_c, 10);
    let class_id = h.add_class(5, 1);

    let booking_a = confirmed(h.engine.book(user_a, class_id).await.unwrap());

    // Joining the waitlist costs nothing, so the broke user queues first
    assert!(matches!(
        h.engine.book(broke, class_id).await.unwrap(),
        BookingOutcome::Waitlisted { position: 1 }
    ));
    assert!(matches!(
        h.engine.book(user_c, class_id).await.unwrap(),
        BookingOutcome::Waitlisted { position: 2 }
    ));

    let outcome = h.engine.cancel(booking_a.id).await.unwrap();
    let promoted = outcome.promoted.expect("solvent user should be promoted");
    assert_eq!(promoted.user_id, user_c);

    assert_eq!(h.engine.remaining_credits(&user_c), 5);
    assert_eq!(h.engine.remaining_credits(&broke), 0);
    assert_eq!(h.engine.waitlist_size(&class_id), 0);
    assert_eq!(h.capacity.get(&class_id).unwrap().booked_slots, 1);
}

#[tokio::test]
async fn test_end_of_class_compensates_remaining_waitlist() {
    let h = harness();
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    let user_c = Uuid::new_v4();
    h.fund(user_a, 10);
    h.fund(user_b, 10);
    h.fund(user_c, 10);
    let class_id = h.add_class(5, 1);

    confirmed(h.engine.book(user_a, class_id).await.unwrap());
    h.engine.book(user_b, class_id).await.unwrap();
    h.engine.book(user_c, class_id).await.unwrap();

    let refunded = h.engine.end_of_class(class_id).unwrap();
    assert_eq!(refunded, 2);

    // Waitlisted users are compensated with the class price
    assert_eq!(h.engine.remaining_credits(&user_b), 15);
    assert_eq!(h.engine.remaining_credits(&user_c), 15);
    assert_eq!(h.engine.waitlist_size(&class_id), 0);

    // The active booking and slot counters are untouched
    assert_eq!(h.capacity.get(&class_id).unwrap().booked_slots, 1);
}

#[tokio::test]
async fn test_check_in_requires_class_started() {
    let h = harness();
    let user = Uuid::new_v4();
    h.fund(user, 10);
    let class_id = h.add_class_starting_in(5, 3, Duration::hours(1));
    confirmed(h.engine.book(user, class_id).await.unwrap());

    let err = h.engine.check_in(user, class_id).unwrap_err();
    assert!(matches!(err, EngineError::ClassNotStarted));
    assert!(h.engine.check_ins_for_user(&user).is_empty());

    h.clock.advance(Duration::hours(2));
    let check_in = h.engine.check_in(user, class_id).unwrap();
    assert_eq!(check_in.class_id, class_id);
    assert_eq!(h.engine.check_ins_for_user(&user).len(), 1);
}

#[tokio::test]
async fn test_purchase_package_via_gateway() {
    let h = harness_with_gateway(MockPaymentGateway::declining_above(50));
    let user = Uuid::new_v4();

    let err = h
        .engine
        .purchase_package(user, "SG".to_string(), 100, h.now() + Duration::days(30))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PaymentDeclined { credits: 100 }));
    assert_eq!(h.engine.remaining_credits(&user), 0);

    let grant = h
        .engine
        .purchase_package(user, "SG".to_string(), 25, h.now() + Duration::days(30))
        .await
        .unwrap();
    assert_eq!(grant.credits, 25);
    assert_eq!(h.engine.remaining_credits(&user), 25);
}

#[tokio::test]
async fn test_overlap_query_ignores_cancelled_bookings() {
    let h = harness();
    let user = Uuid::new_v4();
    h.fund(user, 10);
    let class_id = h.add_class_starting_in(5, 3, Duration::hours(10));
    let booking = confirmed(h.engine.book(user, class_id).await.unwrap());

    let start = h.now() + Duration::hours(10) + Duration::minutes(30);
    assert!(h.engine.has_overlap(&user, start, start + Duration::hours(1)));

    // Back-to-back windows do not overlap
    let adjacent = h.now() + Duration::hours(11);
    assert!(!h
        .engine
        .has_overlap(&user, adjacent, adjacent + Duration::hours(1)));

    h.engine.cancel(booking.id).await.unwrap();
    assert!(!h.engine.has_overlap(&user, start, start + Duration::hours(1)));
}

#[tokio::test]
async fn test_waitlist_expiry_sweep_notifies_and_removes() {
    let h = harness();
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    h.fund(user_a, 10);
    let class_id = h.add_class(5, 1);

    confirmed(h.engine.book(user_a, class_id).await.unwrap());
    h.engine.book(user_b, class_id).await.unwrap();

    // Entries enqueued before the cutoff are dropped
    h.clock.advance(Duration::days(3));
    let expired = h.engine.expire_waitlist_entries(h.now() - Duration::days(2));
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].user_id, user_b);
    assert_eq!(h.engine.waitlist_position(&user_b, &class_id), None);
}

#[tokio::test]
async fn test_sweep_ended_classes_compensates_waitlists() {
    let h = harness();
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    h.fund(user_a, 10);
    h.fund(user_b, 10);
    let class_id = h.add_class_starting_in(5, 1, Duration::hours(1));

    confirmed(h.engine.book(user_a, class_id).await.unwrap());
    h.engine.book(user_b, class_id).await.unwrap();

    // Nothing has ended yet
    assert_eq!(h.engine.sweep_ended_classes(), 0);

    h.clock.advance(Duration::hours(3));
    assert_eq!(h.engine.sweep_ended_classes(), 1);
    assert_eq!(h.engine.remaining_credits(&user_b), 15);
    assert_eq!(h.engine.waitlist_size(&class_id), 0);
}

#[tokio::test]
async fn test_package_expiry_sweep() {
    let h = harness();
    let user = Uuid::new_v4();
    h.ledger.grant(
        user,
        "SG".to_string(),
        10,
        h.now() + Duration::days(1),
        h.now(),
    );

    assert_eq!(h.engine.expire_packages(), 0);
    h.clock.advance(Duration::days(2));
    assert_eq!(h.engine.expire_packages(), 1);
    assert_eq!(h.engine.expire_packages(), 0);
    assert_eq!(h.engine.remaining_credits(&user), 0);
}

#[tokio::test]
async fn test_lock_unavailable_is_surfaced_as_retryable() {
    let h = harness();
    let user = Uuid::new_v4();
    h.fund(user, 10);
    let class_id = h.add_class(5, 3);

    // Simulate another process holding the class lock
    use strive_core::LockManager;
    let key = format!("class-lock-{}", class_id);
    assert!(h
        .locks
        .acquire(&key, std::time::Duration::from_secs(30))
        .await
        .unwrap());

    let err = h.engine.book(user, class_id).await.unwrap_err();
    assert!(matches!(err, EngineError::LockUnavailable));
    assert!(err.is_retryable());
    assert_eq!(h.engine.remaining_credits(&user), 10);

    h.locks.release(&key).await.unwrap();
    confirmed(h.engine.book(user, class_id).await.unwrap());
}

#[tokio::test]
async fn test_cancel_guards() {
    let h = harness();
    let user = Uuid::new_v4();
    h.fund(user, 10);
    let class_id = h.add_class(5, 1);

    let err = h.engine.cancel(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::BookingNotFound(_)));

    let booking = confirmed(h.engine.book(user, class_id).await.unwrap());
    h.engine.cancel(booking.id).await.unwrap();

    let err = h.engine.cancel(booking.id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_capacity_change_through_engine() {
    let h = harness();
    let user = Uuid::new_v4();
    h.fund(user, 10);
    let class_id = h.add_class(5, 1);
    confirmed(h.engine.book(user, class_id).await.unwrap());

    let err = h.engine.increase_capacity(class_id, -1).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
    assert_eq!(h.capacity.get(&class_id).unwrap().total_slots, 1);

    assert_eq!(h.engine.increase_capacity(class_id, 2).await.unwrap(), 3);
    assert!(h.capacity.has_available_slots(&class_id));
}

#[tokio::test]
async fn test_manual_promotion_after_capacity_increase() {
    let h = harness();
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    h.fund(user_a, 10);
    h.fund(user_b, 10);
    let class_id = h.add_class(5, 1);

    confirmed(h.engine.book(user_a, class_id).await.unwrap());
    h.engine.book(user_b, class_id).await.unwrap();

    // No free slot yet, so nothing to promote
    assert!(h.engine.promote(class_id).await.unwrap().is_none());
    assert_eq!(h.engine.waitlist_size(&class_id), 1);

    h.engine.increase_capacity(class_id, 1).await.unwrap();
    let promoted = h.engine.promote(class_id).await.unwrap().unwrap();
    assert_eq!(promoted.user_id, user_b);
    assert_eq!(h.engine.waitlist_size(&class_id), 0);
    assert_eq!(h.capacity.get(&class_id).unwrap().booked_slots, 2);
}

#[tokio::test]
async fn test_join_waitlist_directly() {
    let h = harness();
    let user = Uuid::new_v4();
    let class_id = h.add_class(5, 3);

    let err = h.engine.join_waitlist(user, Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, EngineError::ClassNotFound(_)));

    assert_eq!(h.engine.join_waitlist(user, class_id).unwrap(), 1);
    assert_eq!(h.engine.waitlist_position(&user, &class_id), Some(1));
}

#[tokio::test]
async fn test_manual_refund_requires_eligible_grant() {
    let h = harness();
    let user = Uuid::new_v4();

    let err = h.engine.refund_credits(user, 5).unwrap_err();
    assert!(matches!(err, EngineError::NoEligibleGrant(_)));

    let err = h.engine.refund_credits(user, 0).unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));

    h.fund(user, 10);
    h.engine.refund_credits(user, 5).unwrap();
    assert_eq!(h.engine.remaining_credits(&user), 15);
}

#[tokio::test]
async fn test_leave_waitlist() {
    let h = harness();
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    h.fund(user_a, 10);
    let class_id = h.add_class(5, 1);

    confirmed(h.engine.book(user_a, class_id).await.unwrap());
    h.engine.book(user_b, class_id).await.unwrap();

    assert!(h.engine.leave_waitlist(&user_b, &class_id));
    assert!(!h.engine.leave_waitlist(&user_b, &class_id));
    assert_eq!(h.engine.waitlist_size(&class_id), 0);
}
