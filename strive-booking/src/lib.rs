pub mod engine;
pub mod locks;
pub mod models;
pub mod repository;

pub use engine::{BookingEngine, EngineConfig, EngineError};
pub use locks::InMemoryLockManager;
pub use models::{Booking, BookingOutcome, CancelOutcome, CheckIn};
pub use repository::BookingRepository;
