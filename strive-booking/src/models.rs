use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A confirmed reservation of one slot in a class. Bookings are never
/// deleted; cancellation clears `is_active` and the record stays as history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub class_id: Uuid,
    pub booked_at: DateTime<Utc>,
    pub is_active: bool,
    /// Price snapshot taken at booking time; immutable afterwards.
    pub credits_used: i32,
    pub is_confirmed: bool,
    pub class_start_time: DateTime<Utc>,
    pub class_end_time: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        user_id: Uuid,
        class_id: Uuid,
        booked_at: DateTime<Utc>,
        credits_used: i32,
        class_start_time: DateTime<Utc>,
        class_end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            class_id,
            booked_at,
            is_active: true,
            credits_used,
            is_confirmed: true,
            class_start_time,
            class_end_time,
        }
    }

    /// True when this booking's class window intersects the given window.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.class_end_time && end > self.class_start_time
    }
}

/// Append-only attendance record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: Uuid,
    pub user_id: Uuid,
    pub class_id: Uuid,
    pub checked_in_at: DateTime<Utc>,
}

/// Result of a booking attempt. A full class is not an error: the caller is
/// parked on the waitlist instead.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingOutcome {
    Confirmed { booking: Booking },
    Waitlisted { position: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub booking_id: Uuid,
    pub refunded: bool,
    /// Booking created for the promoted waitlist head, when there was one.
    pub promoted: Option<Booking>,
}
