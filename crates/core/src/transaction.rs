use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ids::{AccountId, CategoryId, TransactionId};
use super::money::Money;
use super::period::deserialize_iso_date;

/// A booked bank transaction. The recurrence engine only ever reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(alias = "_id")]
    pub id: TransactionId,
    #[serde(deserialize_with = "deserialize_iso_date")]
    pub date: NaiveDate,
    pub amount: Money,
    #[serde(default)]
    pub label: String,
    pub account: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_category_id: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_category_id: Option<CategoryId>,
}

impl Transaction {
    /// Category used for grouping: manual override, then automatic, then
    /// the uncategorized sentinel.
    pub fn category_id(&self) -> CategoryId {
        self.manual_category_id
            .as_ref()
            .or(self.automatic_category_id.as_ref())
            .cloned()
            .unwrap_or_else(CategoryId::uncategorized)
    }
}
