use crate::models::{Booking, CheckIn};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository trait for durable booking history. The engine is
/// authoritative in memory; implementations mirror committed records.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn save_booking(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get_booking(
        &self,
        id: Uuid,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_bookings_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>>;

    async fn save_check_in(
        &self,
        check_in: &CheckIn,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
