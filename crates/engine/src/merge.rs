use thiserror::Error;

use crate::bundle::Bundle;
use crate::util::unique;

const JOINER: &str = " / ";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MergeError {
    #[error("Cannot merge an empty list of bundles")]
    Empty,
}

/// Merges bundles into one.
///
/// Operations are concatenated in input order and are NOT deduplicated.
/// Categories and amounts keep encounter order, each value once. Labels and
/// brands that disagree are joined with `" / "`. Stats are dropped since they
/// no longer describe the merged operations.
pub fn merge(bundles: &[Bundle]) -> Result<Bundle, MergeError> {
    let (first, rest) = bundles.split_first().ok_or(MergeError::Empty)?;
    if rest.is_empty() {
        return Ok(first.clone());
    }

    let accounts = if bundles.iter().all(|b| b.accounts.is_some()) {
        Some(unique(bundles.iter().flat_map(|b| b.accounts.iter().flatten().cloned())))
    } else {
        None
    };

    Ok(Bundle {
        id: bundles.iter().find_map(|b| b.id.clone()),
        ops: bundles.iter().flat_map(|b| b.ops.iter().cloned()).collect(),
        category_ids: unique(bundles.iter().flat_map(|b| b.category_ids.iter().cloned())),
        amounts: unique(bundles.iter().flat_map(|b| b.amounts.iter().copied())),
        accounts,
        automatic_label: join_distinct(bundles.iter().map(|b| Some(b.automatic_label.as_str())))
            .unwrap_or_default(),
        manual_label: join_distinct(bundles.iter().map(|b| b.manual_label.as_deref())),
        stats: None,
        brand: join_distinct(bundles.iter().map(|b| b.brand.as_deref())),
    })
}

fn join_distinct<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Option<String> {
    let distinct = unique(values.flatten().filter(|v| !v.is_empty()));
    if distinct.is_empty() {
        None
    } else {
        Some(distinct.join(JOINER))
    }
}
