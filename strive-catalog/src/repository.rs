use crate::session::ClassSession;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository trait for durable class records.
#[async_trait]
pub trait ClassRepository: Send + Sync {
    async fn save_class(
        &self,
        session: &ClassSession,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get_class(
        &self,
        id: Uuid,
    ) -> Result<Option<ClassSession>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_classes(
        &self,
    ) -> Result<Vec<ClassSession>, Box<dyn std::error::Error + Send + Sync>>;

    async fn delete_class(
        &self,
        id: Uuid,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
