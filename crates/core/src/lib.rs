pub mod ids;
pub mod money;
pub mod period;
pub mod transaction;

pub use ids::{AccountId, CategoryId, TransactionId, UNCATEGORIZED};
pub use money::Money;
pub use period::{parse_iso_date, DateError, DateRange};
pub use transaction::Transaction;
