//! Recurring payment detection.
//!
//! Transactions are bucketed by category and amount, then refined by a
//! staged rule pipeline into bundles. Later batches are folded into the
//! known bundles, or detected afresh when they look like a historical import.

pub mod brand;
pub mod bundle;
pub mod config;
pub mod frequency;
pub mod grouper;
pub mod matcher;
pub mod merge;
pub mod pipeline;
pub mod rules;
pub mod stats;
pub mod updater;
pub(crate) mod util;

pub use brand::{Brand, BrandDictionary};
pub use bundle::{Bundle, BundleStats, DeltaStats};
pub use config::{default_rules, ConfigError, EngineConfig};
pub use frequency::{frequency_text, Frequency};
pub use grouper::group;
pub use matcher::{FoldOutcome, Matcher};
pub use merge::{merge, MergeError};
pub use pipeline::{PipelineError, RulePipeline};
pub use rules::{Rule, RuleAction, RuleConfig, RuleContext, RuleError, RuleSettings, RuleType, RULES};
pub use stats::add_stats;
pub use updater::{refresh_observed, RecurrenceEngine, UpdatePolicy, UpdateStrategy};
