pub mod grant;
pub mod ledger;

pub use grant::CreditGrant;
pub use ledger::{CreditLedger, LedgerError};
