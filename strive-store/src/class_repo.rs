use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use strive_catalog::{ClassRepository, ClassSession};
use uuid::Uuid;

pub struct PgClassRepository {
    pool: PgPool,
}

impl PgClassRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ClassRow {
    id: Uuid,
    name: String,
    country_code: String,
    required_credits: i32,
    total_slots: i32,
    booked_slots: i32,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl From<ClassRow> for ClassSession {
    fn from(row: ClassRow) -> Self {
        ClassSession {
            id: row.id,
            name: row.name,
            country_code: row.country_code,
            required_credits: row.required_credits,
            total_slots: row.total_slots,
            booked_slots: row.booked_slots,
            start_time: row.start_time,
            end_time: row.end_time,
        }
    }
}

const SELECT_COLUMNS: &str = "id, name, country_code, required_credits, total_slots, \
                              booked_slots, start_time, end_time";

#[async_trait]
impl ClassRepository for PgClassRepository {
    async fn save_class(
        &self,
        session: &ClassSession,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            r#"
            INSERT INTO classes
                (id, name, country_code, required_credits, total_slots,
                 booked_slots, start_time, end_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name,
                    required_credits = EXCLUDED.required_credits,
                    total_slots = EXCLUDED.total_slots,
                    booked_slots = EXCLUDED.booked_slots,
                    start_time = EXCLUDED.start_time,
                    end_time = EXCLUDED.end_time
            "#,
        )
        .bind(session.id)
        .bind(&session.name)
        .bind(&session.country_code)
        .bind(session.required_credits)
        .bind(session.total_slots)
        .bind(session.booked_slots)
        .bind(session.start_time)
        .bind(session.end_time)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_class(
        &self,
        id: Uuid,
    ) -> Result<Option<ClassSession>, Box<dyn std::error::Error + Send + Sync>> {
        let row: Option<ClassRow> =
            sqlx::query_as(&format!("SELECT {} FROM classes WHERE id = $1", SELECT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(ClassSession::from))
    }

    async fn list_classes(
        &self,
    ) -> Result<Vec<ClassSession>, Box<dyn std::error::Error + Send + Sync>> {
        let rows: Vec<ClassRow> =
            sqlx::query_as(&format!("SELECT {} FROM classes ORDER BY start_time", SELECT_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(ClassSession::from).collect())
    }

    async fn delete_class(
        &self,
        id: Uuid,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query("DELETE FROM classes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
