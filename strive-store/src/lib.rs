pub mod app_config;
pub mod booking_repo;
pub mod class_repo;
pub mod database;
pub mod events;
pub mod redis_repo;

pub use booking_repo::PgBookingRepository;
pub use class_repo::PgClassRepository;
pub use database::DbClient;
pub use events::EventProducer;
pub use redis_repo::RedisClient;
