use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    /// Builds the pool without touching the network; connections are opened
    /// on first use.
    pub fn connect_lazy(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_lazy(connection_string)?;

        Ok(Self { pool })
    }

    /// Creates the durable mirror tables when they are missing. Safe to run
    /// on every startup.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        info!("Ensuring database schema...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS classes (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                country_code TEXT NOT NULL,
                required_credits INT NOT NULL,
                total_slots INT NOT NULL,
                booked_slots INT NOT NULL DEFAULT 0,
                start_time TIMESTAMPTZ NOT NULL,
                end_time TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL,
                class_id UUID NOT NULL,
                booked_at TIMESTAMPTZ NOT NULL,
                is_active BOOLEAN NOT NULL,
                credits_used INT NOT NULL,
                is_confirmed BOOLEAN NOT NULL,
                class_start_time TIMESTAMPTZ NOT NULL,
                class_end_time TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS check_ins (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL,
                class_id UUID NOT NULL,
                checked_in_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_bookings_user ON bookings (user_id)")
            .execute(&self.pool)
            .await?;

        info!("Schema ready.");
        Ok(())
    }
}
