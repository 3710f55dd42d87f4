use std::sync::Arc;
use strive_booking::{BookingEngine, BookingRepository};
use strive_catalog::ClassRepository;
use strive_store::app_config::BusinessRules;
use strive_store::{EventProducer, RedisClient};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BookingEngine>,
    pub redis: Arc<RedisClient>,
    pub kafka: Arc<EventProducer>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub class_repo: Arc<dyn ClassRepository>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}
