use cadence_core::{AccountId, CategoryId, Money, Transaction};
use serde::{Deserialize, Deserializer, Serialize};

/// Interval statistics over the day gaps between consecutive operations.
///
/// Every field is NaN when the bundle has fewer than two operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaStats {
    #[serde(deserialize_with = "nan_if_null")]
    pub mean: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub median: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub sigma: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub mad: f64,
}

// serde_json writes NaN as null.
fn nan_if_null<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BundleStats {
    pub deltas: DeltaStats,
}

/// A cluster of transactions believed to be one recurring payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Persistence id, assigned outside the engine.
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub ops: Vec<Transaction>,
    pub category_ids: Vec<CategoryId>,
    pub amounts: Vec<Money>,
    /// `None` keeps the legacy behaviour of matching every account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<AccountId>>,
    #[serde(default)]
    pub automatic_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<BundleStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

impl Bundle {
    pub fn new(category_id: CategoryId, amount: Money, ops: Vec<Transaction>) -> Self {
        let automatic_label = ops.first().map(|op| op.label.clone()).unwrap_or_default();
        Bundle {
            id: None,
            ops,
            category_ids: vec![category_id],
            amounts: vec![amount],
            accounts: None,
            automatic_label,
            manual_label: None,
            stats: None,
            brand: None,
        }
    }

    /// Label shown to users: the manual override if any.
    pub fn label(&self) -> &str {
        self.manual_label.as_deref().unwrap_or(&self.automatic_label)
    }

    pub fn deltas(&self) -> Option<&DeltaStats> {
        self.stats.as_ref().map(|s| &s.deltas)
    }

    pub fn contains_op(&self, op: &Transaction) -> bool {
        self.ops.iter().any(|o| o.id == op.id)
    }
}
