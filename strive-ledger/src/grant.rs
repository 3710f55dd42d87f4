use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A time-bounded allotment of spendable credits owned by a user
/// (a purchased package).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditGrant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub country_code: String,
    pub credits: i32,
    pub valid_until: DateTime<Utc>,
    pub expired: bool,
    pub purchased_at: DateTime<Utc>,
}

impl CreditGrant {
    pub fn new(
        user_id: Uuid,
        country_code: String,
        credits: i32,
        valid_until: DateTime<Utc>,
        purchased_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            country_code,
            credits,
            valid_until,
            expired: false,
            purchased_at,
        }
    }

    /// A grant is spendable while its deadline has not passed, whether or
    /// not the expiry sweep has flagged it yet.
    pub fn is_spendable(&self, now: DateTime<Utc>) -> bool {
        self.valid_until > now
    }
}
