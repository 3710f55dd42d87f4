pub mod clock;
pub mod lock;
pub mod notify;
pub mod payment;

pub use clock::{Clock, ManualClock, SystemClock};
pub use lock::{LockError, LockManager};
pub use notify::{LogNotifier, Notifier};
pub use payment::{MockPaymentGateway, PaymentGateway};
