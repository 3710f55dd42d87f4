use crate::models::{Booking, BookingOutcome, CancelOutcome, CheckIn};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;
use strive_catalog::{CapacityError, CapacityStore, ClassSession};
use strive_core::{Clock, LockError, LockManager, Notifier, PaymentGateway};
use strive_ledger::{CreditGrant, CreditLedger, LedgerError};
use strive_waitlist::{WaitlistEntry, WaitlistError, WaitlistQueue};
use tracing::{error, info, warn};
use uuid::Uuid;

const LOCK_KEY_PREFIX: &str = "class-lock-";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cancellations this far (or further) ahead of class start refund the
    /// credit snapshot; later cancellations forfeit it.
    pub cancellation_grace: chrono::Duration,
    /// Lease on the per-class lock; the safety net when a holder dies.
    pub lock_lease: StdDuration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cancellation_grace: chrono::Duration::hours(4),
            lock_lease: StdDuration::from_secs(10),
        }
    }
}

/// Orchestrates booking, cancellation, promotion, check-in and the sweep
/// operations. All capacity and ledger mutation for a class happens while
/// holding that class's lock; this is the only serialization point the
/// system provides.
pub struct BookingEngine {
    capacity: Arc<CapacityStore>,
    ledger: Arc<CreditLedger>,
    waitlist: Arc<WaitlistQueue>,
    locks: Arc<dyn LockManager>,
    payments: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    bookings: Mutex<HashMap<Uuid, Booking>>,
    check_ins: Mutex<Vec<CheckIn>>,
    config: EngineConfig,
}

impl BookingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        capacity: Arc<CapacityStore>,
        ledger: Arc<CreditLedger>,
        waitlist: Arc<WaitlistQueue>,
        locks: Arc<dyn LockManager>,
        payments: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            capacity,
            ledger,
            waitlist,
            locks,
            payments,
            notifier,
            clock,
            bookings: Mutex::new(HashMap::new()),
            check_ins: Mutex::new(Vec::new()),
            config,
        }
    }

    fn lock_key(class_id: &Uuid) -> String {
        format!("{}{}", LOCK_KEY_PREFIX, class_id)
    }

    async fn release_lock(&self, key: &str) {
        if let Err(e) = self.locks.release(key).await {
            error!("Failed to release lock {}: {}", key, e);
        }
    }

    /// Books one slot for the user, or parks them on the waitlist when the
    /// class is full. Fails with a retryable `LockUnavailable` when the
    /// class lock is held elsewhere.
    pub async fn book(&self, user_id: Uuid, class_id: Uuid) -> Result<BookingOutcome, EngineError> {
        let key = Self::lock_key(&class_id);
        if !self.locks.acquire(&key, self.config.lock_lease).await? {
            return Err(EngineError::LockUnavailable);
        }

        let result = self.book_slot(user_id, class_id);
        self.release_lock(&key).await;
        result
    }

    fn book_slot(&self, user_id: Uuid, class_id: Uuid) -> Result<BookingOutcome, EngineError> {
        let now = self.clock.now();
        let class = self
            .capacity
            .get(&class_id)
            .ok_or_else(|| EngineError::ClassNotFound(class_id.to_string()))?;

        if class.is_full() {
            self.waitlist.enqueue(user_id, class_id, now)?;
            let position = self.waitlist.size_for(&class_id);
            self.notifier.send_reminder(user_id, "Added to waitlist.");
            return Ok(BookingOutcome::Waitlisted { position });
        }

        self.ledger.deduct(&user_id, class.required_credits, now)?;

        if let Err(err) = self.capacity.increment_booked(&class_id) {
            // Compensate the deduction; nothing else has been touched
            let _ = self.ledger.refund(&user_id, class.required_credits, now);
            return Err(err.into());
        }

        let booking = Booking::new(
            user_id,
            class_id,
            now,
            class.required_credits,
            class.start_time,
            class.end_time,
        );
        self.bookings
            .lock()
            .unwrap()
            .insert(booking.id, booking.clone());

        info!(
            "Booking {} confirmed: user {} in class {}",
            booking.id, user_id, class_id
        );
        Ok(BookingOutcome::Confirmed { booking })
    }

    /// Cancels a booking. Refund, capacity release and waitlist promotion
    /// run inside a single lock span, so no competing request can slip in
    /// between the freed slot and the promoted head.
    pub async fn cancel(&self, booking_id: Uuid) -> Result<CancelOutcome, EngineError> {
        let class_id = {
            let bookings = self.bookings.lock().unwrap();
            bookings
                .get(&booking_id)
                .map(|b| b.class_id)
                .ok_or_else(|| EngineError::BookingNotFound(booking_id.to_string()))?
        };

        let key = Self::lock_key(&class_id);
        if !self.locks.acquire(&key, self.config.lock_lease).await? {
            return Err(EngineError::LockUnavailable);
        }

        let result = self.cancel_slot(booking_id, class_id);
        self.release_lock(&key).await;
        result
    }

    fn cancel_slot(&self, booking_id: Uuid, class_id: Uuid) -> Result<CancelOutcome, EngineError> {
        let now = self.clock.now();
        let booking = {
            let bookings = self.bookings.lock().unwrap();
            bookings
                .get(&booking_id)
                .cloned()
                .ok_or_else(|| EngineError::BookingNotFound(booking_id.to_string()))?
        };
        if !booking.is_active {
            return Err(EngineError::InvalidArgument(
                "booking is already cancelled".to_string(),
            ));
        }

        let class = self
            .capacity
            .get(&class_id)
            .ok_or_else(|| EngineError::ClassNotFound(class_id.to_string()))?;

        // Refund first: a refund failure aborts the whole cancellation
        // before anything is mutated.
        let refunded = class.start_time > now + self.config.cancellation_grace;
        if refunded {
            self.ledger
                .refund(&booking.user_id, booking.credits_used, now)?;
        } else {
            info!(
                "Booking {} cancelled inside the grace window; credits forfeited",
                booking_id
            );
        }

        {
            let mut bookings = self.bookings.lock().unwrap();
            if let Some(b) = bookings.get_mut(&booking_id) {
                b.is_active = false;
            }
        }
        self.capacity.decrement_booked(&class_id)?;
        info!(
            "Booking {} cancelled: user {} freed a slot in class {}",
            booking_id, booking.user_id, class_id
        );

        let promoted = self.promote_next(&class, now)?;
        Ok(CancelOutcome {
            booking_id,
            refunded,
            promoted,
        })
    }

    /// Promotes the oldest waitlisted user into the freed slot, skipping
    /// entries whose balance no longer covers the class. Must be called
    /// while holding the class lock.
    fn promote_next(
        &self,
        class: &ClassSession,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>, EngineError> {
        if self.capacity.is_full(&class.id) {
            return Ok(None);
        }

        while let Some(entry) = self.waitlist.dequeue_oldest(&class.id) {
            match self.ledger.deduct(&entry.user_id, class.required_credits, now) {
                Ok(()) => {
                    if let Err(err) = self.capacity.increment_booked(&class.id) {
                        let _ = self.ledger.refund(&entry.user_id, class.required_credits, now);
                        return Err(err.into());
                    }

                    let booking = Booking::new(
                        entry.user_id,
                        class.id,
                        now,
                        class.required_credits,
                        class.start_time,
                        class.end_time,
                    );
                    self.bookings
                        .lock()
                        .unwrap()
                        .insert(booking.id, booking.clone());
                    self.notifier
                        .send_reminder(entry.user_id, "Promoted from waitlist!");
                    info!(
                        "Promoted user {} from waitlist into class {} (booking {})",
                        entry.user_id, class.id, booking.id
                    );
                    return Ok(Some(booking));
                }
                Err(LedgerError::InsufficientCredits { .. }) => {
                    warn!(
                        "Skipping waitlisted user {} for class {}: insufficient credits",
                        entry.user_id, class.id
                    );
                    self.notifier.send_reminder(
                        entry.user_id,
                        "Your waitlist spot came up but your balance no longer covers the class.",
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Compensates every user still waitlisted when the class ends, then
    /// clears the queue. Touches no slot counters, so it runs without the
    /// class lock. Returns the number of refunds issued.
    pub fn end_of_class(&self, class_id: Uuid) -> Result<usize, EngineError> {
        let now = self.clock.now();
        let class = self
            .capacity
            .get(&class_id)
            .ok_or_else(|| EngineError::ClassNotFound(class_id.to_string()))?;

        let entries = self.waitlist.clear_class(&class_id);
        let mut refunded = 0;
        for entry in &entries {
            match self
                .ledger
                .refund(&entry.user_id, class.required_credits, now)
            {
                Ok(()) => refunded += 1,
                Err(e) => warn!(
                    "End-of-class refund failed for user {}: {}",
                    entry.user_id, e
                ),
            }
            self.notifier.send_reminder(
                entry.user_id,
                "The class has ended before your waitlist spot was reached.",
            );
        }

        if !entries.is_empty() {
            info!(
                "Class {} ended: compensated {}/{} waitlisted users",
                class_id,
                refunded,
                entries.len()
            );
        }
        Ok(refunded)
    }

    /// Records attendance. Only valid once the class has started.
    pub fn check_in(&self, user_id: Uuid, class_id: Uuid) -> Result<CheckIn, EngineError> {
        let now = self.clock.now();
        let class = self
            .capacity
            .get(&class_id)
            .ok_or_else(|| EngineError::ClassNotFound(class_id.to_string()))?;

        if !class.has_started(now) {
            return Err(EngineError::ClassNotStarted);
        }

        let check_in = CheckIn {
            id: Uuid::new_v4(),
            user_id,
            class_id,
            checked_in_at: now,
        };
        self.check_ins.lock().unwrap().push(check_in.clone());
        info!("User {} checked in to class {}", user_id, class_id);
        Ok(check_in)
    }

    /// Charges the gateway, then records the purchased grant.
    pub async fn purchase_package(
        &self,
        user_id: Uuid,
        country_code: String,
        credits: i32,
        valid_until: DateTime<Utc>,
    ) -> Result<CreditGrant, EngineError> {
        if credits <= 0 {
            return Err(EngineError::InvalidArgument(
                "package credits must be positive".to_string(),
            ));
        }

        let charged = self
            .payments
            .charge(user_id, credits)
            .await
            .map_err(|e| EngineError::Gateway(e.to_string()))?;
        if !charged {
            return Err(EngineError::PaymentDeclined { credits });
        }

        let now = self.clock.now();
        Ok(self.ledger.grant(user_id, country_code, credits, valid_until, now))
    }

    /// Grows (or shrinks) a class's capacity under its lock.
    pub async fn increase_capacity(
        &self,
        class_id: Uuid,
        extra_slots: i32,
    ) -> Result<i32, EngineError> {
        let key = Self::lock_key(&class_id);
        if !self.locks.acquire(&key, self.config.lock_lease).await? {
            return Err(EngineError::LockUnavailable);
        }

        let result = self
            .capacity
            .increase_capacity(&class_id, extra_slots)
            .map_err(EngineError::from);
        self.release_lock(&key).await;
        result
    }

    /// Joins the waitlist directly, without a booking attempt.
    pub fn join_waitlist(&self, user_id: Uuid, class_id: Uuid) -> Result<usize, EngineError> {
        if self.capacity.get(&class_id).is_none() {
            return Err(EngineError::ClassNotFound(class_id.to_string()));
        }
        let now = self.clock.now();
        self.waitlist.enqueue(user_id, class_id, now)?;
        self.notifier.send_reminder(user_id, "Added to waitlist.");
        Ok(self.waitlist.size_for(&class_id))
    }

    /// Promotes the waitlist head into a free slot, if any. Used after
    /// capacity grows; cancellation promotes on its own.
    pub async fn promote(&self, class_id: Uuid) -> Result<Option<Booking>, EngineError> {
        let key = Self::lock_key(&class_id);
        if !self.locks.acquire(&key, self.config.lock_lease).await? {
            return Err(EngineError::LockUnavailable);
        }

        let result = match self.capacity.get(&class_id) {
            Some(class) => self.promote_next(&class, self.clock.now()),
            None => Err(EngineError::ClassNotFound(class_id.to_string())),
        };
        self.release_lock(&key).await;
        result
    }

    /// Manual credit adjustment; lands on the user's first eligible grant.
    pub fn refund_credits(&self, user_id: Uuid, credits: i32) -> Result<(), EngineError> {
        if credits <= 0 {
            return Err(EngineError::InvalidArgument(
                "refund credits must be positive".to_string(),
            ));
        }
        self.ledger.refund(&user_id, credits, self.clock.now())?;
        Ok(())
    }

    // --- sweeps, invoked by external schedulers ---

    /// Flags grants past their deadline. Idempotent.
    pub fn expire_packages(&self) -> usize {
        self.ledger.expire_grants(self.clock.now())
    }

    /// Drops waitlist entries older than `cutoff` and notifies their
    /// owners. Returns the removed entries.
    pub fn expire_waitlist_entries(&self, cutoff: DateTime<Utc>) -> Vec<WaitlistEntry> {
        let expired = self.waitlist.expire_older_than(cutoff);
        for entry in &expired {
            self.notifier
                .send_reminder(entry.user_id, "Your waitlist entry has expired.");
        }
        expired
    }

    /// Runs end-of-class compensation for every session whose end time has
    /// passed. Returns the number of classes swept.
    pub fn sweep_ended_classes(&self) -> usize {
        let now = self.clock.now();
        let ended = self.capacity.ended_before(now);
        let mut swept = 0;
        for class_id in ended {
            match self.end_of_class(class_id) {
                Ok(_) => swept += 1,
                Err(e) => warn!("End-of-class sweep failed for {}: {}", class_id, e),
            }
        }
        swept
    }

    // --- queries ---

    pub fn add_class(&self, session: ClassSession) {
        self.capacity.insert(session);
    }

    pub fn class(&self, class_id: &Uuid) -> Option<ClassSession> {
        self.capacity.get(class_id)
    }

    pub fn list_classes(&self) -> Vec<ClassSession> {
        self.capacity.list()
    }

    pub fn booking(&self, booking_id: &Uuid) -> Option<Booking> {
        self.bookings.lock().unwrap().get(booking_id).cloned()
    }

    pub fn bookings_for_user(&self, user_id: &Uuid) -> Vec<Booking> {
        let bookings = self.bookings.lock().unwrap();
        let mut result: Vec<Booking> = bookings
            .values()
            .filter(|b| b.user_id == *user_id)
            .cloned()
            .collect();
        result.sort_by_key(|b| b.booked_at);
        result
    }

    /// True when any of the user's active bookings overlaps the window.
    pub fn has_overlap(&self, user_id: &Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let bookings = self.bookings.lock().unwrap();
        bookings
            .values()
            .filter(|b| b.user_id == *user_id && b.is_active)
            .any(|b| b.overlaps(start, end))
    }

    pub fn waitlist_position(&self, user_id: &Uuid, class_id: &Uuid) -> Option<usize> {
        self.waitlist.position(user_id, class_id)
    }

    pub fn waitlist_size(&self, class_id: &Uuid) -> usize {
        self.waitlist.size_for(class_id)
    }

    /// User-initiated abandonment of a waitlist spot.
    pub fn leave_waitlist(&self, user_id: &Uuid, class_id: &Uuid) -> bool {
        self.waitlist.remove(user_id, class_id)
    }

    pub fn remaining_credits(&self, user_id: &Uuid) -> i32 {
        self.ledger.remaining_credits(user_id, self.clock.now())
    }

    pub fn grants_for(&self, user_id: &Uuid) -> Vec<CreditGrant> {
        self.ledger.grants_for(user_id)
    }

    pub fn check_ins_for_user(&self, user_id: &Uuid) -> Vec<CheckIn> {
        let check_ins = self.check_ins.lock().unwrap();
        check_ins
            .iter()
            .filter(|c| c.user_id == *user_id)
            .cloned()
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    #[error("Insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: i32, available: i32 },

    #[error("Could not acquire the class lock; retry shortly")]
    LockUnavailable,

    #[error("Payment declined for {credits} credits")]
    PaymentDeclined { credits: i32 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Waitlist is full (max {max})")]
    WaitlistFull { max: usize },

    #[error("User {0} has no eligible grant")]
    NoEligibleGrant(Uuid),

    #[error("Class has not started yet")]
    ClassNotStarted,

    #[error("Lock backend error: {0}")]
    Lock(#[from] LockError),

    #[error("Payment gateway error: {0}")]
    Gateway(String),
}

impl EngineError {
    /// Callers may retry these with backoff; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::LockUnavailable)
    }
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits {
                required,
                available,
            } => EngineError::InsufficientCredits {
                required,
                available,
            },
            LedgerError::NoEligibleGrant(user_id) => EngineError::NoEligibleGrant(user_id),
        }
    }
}

impl From<WaitlistError> for EngineError {
    fn from(err: WaitlistError) -> Self {
        match err {
            WaitlistError::WaitlistFull { max } => EngineError::WaitlistFull { max },
        }
    }
}

impl From<CapacityError> for EngineError {
    fn from(err: CapacityError) -> Self {
        match err {
            CapacityError::NotFound(id) => EngineError::ClassNotFound(id),
            CapacityError::CapacityExceeded { booked, total } => EngineError::InvalidArgument(
                format!("class is at capacity: booked {}, total {}", booked, total),
            ),
            CapacityError::InvalidCapacity { requested, booked } => {
                EngineError::InvalidArgument(format!(
                    "capacity of {} would under-cut {} current bookings",
                    requested, booked
                ))
            }
        }
    }
}
