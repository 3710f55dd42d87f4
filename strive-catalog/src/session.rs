use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scheduled, capacity-limited bookable session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSession {
    pub id: Uuid,
    pub name: String,
    pub country_code: String,
    pub required_credits: i32,
    pub total_slots: i32,
    pub booked_slots: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl ClassSession {
    pub fn new(
        name: String,
        country_code: String,
        required_credits: i32,
        total_slots: i32,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            country_code,
            required_credits,
            total_slots,
            booked_slots: 0,
            start_time,
            end_time,
        }
    }

    pub fn is_full(&self) -> bool {
        self.booked_slots >= self.total_slots
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_time < now
    }
}
