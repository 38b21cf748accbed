use serde::{Deserialize, Serialize};
use std::fmt;

/// Category assigned to transactions nobody has categorized yet.
pub const UNCATEGORIZED: &str = "0";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                $name(id.to_string())
            }
        }
    };
}

string_id!(
    /// Document id of a bank transaction.
    TransactionId
);
string_id!(
    /// Bank account a transaction was booked on.
    AccountId
);
string_id!(CategoryId);

impl CategoryId {
    pub fn uncategorized() -> Self {
        CategoryId::new(UNCATEGORIZED)
    }

    pub fn is_uncategorized(&self) -> bool {
        self.0 == UNCATEGORIZED
    }
}
