use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bundle::Bundle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
    Yearly,
    Unclassified,
}

impl Frequency {
    /// Maps a median interval in days to a named period.
    pub fn classify(median_delta_days: f64) -> Self {
        let d = median_delta_days;
        if d > 5.0 && d <= 8.0 {
            Frequency::Weekly
        } else if d > 26.0 && d <= 40.0 {
            Frequency::Monthly
        } else if d > 300.0 && d <= 400.0 {
            Frequency::Yearly
        } else {
            Frequency::Unclassified
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Yearly => write!(f, "yearly"),
            Frequency::Unclassified => write!(f, "unclassified"),
        }
    }
}

/// Human readable period of a bundle, e.g. "every month" or "every 12 days".
///
/// `None` when the bundle has no usable median yet.
pub fn frequency_text(bundle: &Bundle) -> Option<String> {
    let median = bundle.deltas()?.median;
    if !median.is_finite() {
        return None;
    }
    let text = match Frequency::classify(median) {
        Frequency::Weekly => "every week".to_string(),
        Frequency::Monthly => "every month".to_string(),
        Frequency::Yearly => "every year".to_string(),
        Frequency::Unclassified => format!("every {} days", median.round() as i64),
    };
    Some(text)
}
