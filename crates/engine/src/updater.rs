use cadence_core::{DateRange, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use crate::bundle::Bundle;
use crate::config::{ConfigError, EngineConfig};
use crate::grouper::group;
use crate::matcher::Matcher;
use crate::pipeline::RulePipeline;
use crate::stats::add_stats;
use crate::util::unique;

/// How a batch of new transactions is merged into known bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStrategy {
    /// Long historical import: detect bundles from scratch on the batch.
    Backfill,
    /// Regular trickle: fold into existing bundles.
    Fold,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatePolicy {
    pub backfill_min_span_days: i64,
    pub backfill_min_count: usize,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self {
            backfill_min_span_days: 90,
            backfill_min_count: 100,
        }
    }
}

impl UpdatePolicy {
    /// Backfill when the batch both spans more than the minimum number of
    /// days and holds more than the minimum number of transactions.
    pub fn choose(&self, transactions: &[Transaction]) -> UpdateStrategy {
        let span = DateRange::spanning(transactions.iter().map(|t| t.date)).map_or(0, DateRange::days);
        if span > self.backfill_min_span_days && transactions.len() > self.backfill_min_count {
            UpdateStrategy::Backfill
        } else {
            UpdateStrategy::Fold
        }
    }
}

/// Finds recurring bundles and keeps them current as transactions arrive.
#[derive(Debug, Clone)]
pub struct RecurrenceEngine {
    pipeline: RulePipeline,
    matcher: Matcher,
    policy: UpdatePolicy,
}

impl RecurrenceEngine {
    pub fn new(pipeline: RulePipeline, matcher: Matcher, policy: UpdatePolicy) -> Self {
        Self { pipeline, matcher, policy }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.pipeline()?, config.matcher(), config.update))
    }

    pub fn pipeline(&self) -> &RulePipeline {
        &self.pipeline
    }

    /// Cold start: bucket the transactions and run every rule stage.
    pub fn detect(&self, transactions: &[Transaction]) -> Vec<Bundle> {
        info!("Creating bundles from {} transactions", transactions.len());
        let initial = group(transactions);
        info!("{} candidate bundles before rules", initial.len());
        self.pipeline.run(&initial)
    }

    /// Warm start: merges `new_transactions` into `existing`.
    ///
    /// Every bundle that changed or was created has its stats recomputed;
    /// untouched bundles are returned as they were.
    pub fn update(&self, existing: &[Bundle], new_transactions: &[Transaction]) -> Vec<Bundle> {
        if new_transactions.is_empty() {
            return existing.to_vec();
        }

        match self.policy.choose(new_transactions) {
            UpdateStrategy::Backfill => {
                info!(
                    "Backfilling {} transactions next to {} existing bundles",
                    new_transactions.len(),
                    existing.len()
                );
                let created = self.detect(new_transactions);
                existing
                    .iter()
                    .cloned()
                    .chain(created.iter().map(add_stats))
                    .collect()
            }
            UpdateStrategy::Fold => {
                let outcome = self.matcher.fold(existing, new_transactions);
                let mut bundles = outcome.bundles;
                for &idx in &outcome.touched {
                    bundles[idx] = add_stats(&bundles[idx]);
                }

                let folded: HashSet<_> = outcome.folded.iter().map(|t| &t.id).collect();
                let remaining: Vec<Transaction> = new_transactions
                    .iter()
                    .filter(|t| !folded.contains(&t.id))
                    .cloned()
                    .collect();
                info!(
                    "Folded {} transactions into {} bundles, {} remaining to consider for new bundles",
                    outcome.folded.len(),
                    outcome.touched.len(),
                    remaining.len()
                );

                if !remaining.is_empty() {
                    bundles.extend(self.detect(&remaining).iter().map(add_stats));
                }
                bundles
            }
        }
    }

    /// Entry point for a batch: detects from scratch when nothing is known
    /// yet, updates otherwise.
    pub fn find_and_update(&self, existing: &[Bundle], transactions: &[Transaction]) -> Vec<Bundle> {
        info!("Find and update recurrences...");
        let updated = if existing.is_empty() {
            // Merging clears stats, so they are rebuilt over the merged ops.
            self.detect(transactions).iter().map(add_stats).collect()
        } else {
            self.update(existing, transactions)
        };
        info!(
            "{} bundles ({} new)",
            updated.len(),
            updated.len().saturating_sub(existing.len())
        );
        updated
    }
}

/// Recomputes `amounts` and `category_ids` from each bundle's operations.
///
/// Rehydrated bundles may have lost operations or had them recategorized
/// since they were saved. Bundles without operations keep their values.
pub fn refresh_observed(bundles: &[Bundle]) -> Vec<Bundle> {
    bundles
        .iter()
        .map(|b| {
            if b.ops.is_empty() {
                return b.clone();
            }
            Bundle {
                amounts: unique(b.ops.iter().map(|op| op.amount)),
                category_ids: unique(b.ops.iter().map(|op| op.category_id())),
                ..b.clone()
            }
        })
        .collect()
}
