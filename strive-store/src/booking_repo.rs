use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use strive_booking::{Booking, BookingRepository, CheckIn};
use uuid::Uuid;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    class_id: Uuid,
    booked_at: DateTime<Utc>,
    is_active: bool,
    credits_used: i32,
    is_confirmed: bool,
    class_start_time: DateTime<Utc>,
    class_end_time: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            user_id: row.user_id,
            class_id: row.class_id,
            booked_at: row.booked_at,
            is_active: row.is_active,
            credits_used: row.credits_used,
            is_confirmed: row.is_confirmed,
            class_start_time: row.class_start_time,
            class_end_time: row.class_end_time,
        }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn save_booking(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            r#"
            INSERT INTO bookings
                (id, user_id, class_id, booked_at, is_active, credits_used,
                 is_confirmed, class_start_time, class_end_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE
                SET is_active = EXCLUDED.is_active,
                    is_confirmed = EXCLUDED.is_confirmed
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.class_id)
        .bind(booking.booked_at)
        .bind(booking.is_active)
        .bind(booking.credits_used)
        .bind(booking.is_confirmed)
        .bind(booking.class_start_time)
        .bind(booking.class_end_time)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_booking(
        &self,
        id: Uuid,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<BookingRow> = sqlx::query_as(
            "SELECT id, user_id, class_id, booked_at, is_active, credits_used, \
             is_confirmed, class_start_time, class_end_time FROM bookings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Booking::from))
    }

    async fn list_bookings_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            "SELECT id, user_id, class_id, booked_at, is_active, credits_used, \
             is_confirmed, class_start_time, class_end_time FROM bookings \
             WHERE user_id = $1 ORDER BY booked_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn save_check_in(
        &self,
        check_in: &CheckIn,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            "INSERT INTO check_ins (id, user_id, class_id, checked_in_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO NOTHING",
        )
        .bind(check_in.id)
        .bind(check_in.user_id)
        .bind(check_in.class_id)
        .bind(check_in.checked_in_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
