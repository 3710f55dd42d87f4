pub mod capacity;
pub mod repository;
pub mod session;

pub use capacity::{CapacityError, CapacityStore};
pub use repository::ClassRepository;
pub use session::ClassSession;
