pub mod queue;

pub use queue::{WaitlistEntry, WaitlistError, WaitlistQueue};
