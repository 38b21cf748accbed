use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::brand::BrandDictionary;
use crate::bundle::Bundle;
use crate::stats::add_stats;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleError {
    #[error("Rule '{0}' needs a numeric `options` value")]
    MissingOption(String),
    #[error("Rule '{rule}' got an unusable option: {value}")]
    InvalidOption { rule: String, value: f64 },
    #[error("Invalid pattern for brand '{brand}': {reason}")]
    InvalidPattern { brand: String, reason: String },
    #[error("Failed to parse brand dictionary: {0}")]
    InvalidBrandFile(String),
}

/// How the rules of one stage transform the bundle list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Filter,
    Map,
    Group,
    Split,
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleType::Filter => write!(f, "filter"),
            RuleType::Map => write!(f, "map"),
            RuleType::Group => write!(f, "group"),
            RuleType::Split => write!(f, "split"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterRule {
    CategoryShouldBeSet,
    BundleSizeMoreThan(f64),
    AmountMoreThan(Decimal),
    DeltaMeanAbove(f64),
    DeltaMeanBelow(f64),
    SigmaBelow(f64),
    MadBelow(f64),
}

impl FilterRule {
    /// Whether the bundle survives. Stats thresholds reject bundles whose
    /// stats are missing or NaN, since every comparison with NaN is false.
    pub fn keep(&self, bundle: &Bundle) -> bool {
        match self {
            FilterRule::CategoryShouldBeSet => bundle
                .category_ids
                .first()
                .is_some_and(|c| !c.is_uncategorized()),
            FilterRule::BundleSizeMoreThan(n) => bundle.ops.len() as f64 > *n,
            FilterRule::AmountMoreThan(min) => bundle
                .amounts
                .iter()
                .any(|a| a.abs().as_decimal() > *min),
            FilterRule::DeltaMeanAbove(n) => bundle.deltas().is_some_and(|d| d.mean > *n),
            FilterRule::DeltaMeanBelow(n) => bundle.deltas().is_some_and(|d| d.mean < *n),
            FilterRule::SigmaBelow(n) => bundle.deltas().is_some_and(|d| d.sigma < *n),
            FilterRule::MadBelow(n) => bundle.deltas().is_some_and(|d| d.mad < *n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapRule {
    AddStats,
}

impl MapRule {
    pub fn apply(&self, bundle: Bundle) -> Bundle {
        match self {
            MapRule::AddStats => add_stats(&bundle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupRule {
    /// Bundles whose first operation carries the same label.
    SameLabel,
}

impl GroupRule {
    pub fn key(&self, bundle: &Bundle) -> String {
        match self {
            GroupRule::SameLabel => match bundle.ops.first() {
                Some(op) => op.label.clone(),
                None => bundle.label().to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum SplitRule {
    Brands(BrandDictionary),
}

impl SplitRule {
    pub fn split(&self, bundle: &Bundle) -> Vec<Bundle> {
        match self {
            SplitRule::Brands(brands) => brands.split(bundle),
        }
    }
}

/// A configured rule, ready to be executed by the pipeline.
#[derive(Debug, Clone)]
pub enum RuleAction {
    Filter(FilterRule),
    Map(MapRule),
    Group(GroupRule),
    Split(SplitRule),
}

impl RuleAction {
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleAction::Filter(_) => RuleType::Filter,
            RuleAction::Map(_) => RuleType::Map,
            RuleAction::Group(_) => RuleType::Group,
            RuleAction::Split(_) => RuleType::Split,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: &'static str,
    pub description: &'static str,
    pub stage: u32,
    pub action: RuleAction,
}

/// Everything a rule builder may draw on besides its own options.
pub struct RuleContext<'a> {
    pub brands: &'a BrandDictionary,
}

type RuleBuilder = fn(&str, Option<f64>, &RuleContext<'_>) -> Result<RuleAction, RuleError>;

/// Static entry of the rule registry.
pub struct RuleDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub stage: u32,
    pub rule_type: RuleType,
    build: RuleBuilder,
}

impl RuleDescriptor {
    pub fn build(&self, options: Option<f64>, ctx: &RuleContext<'_>) -> Result<Rule, RuleError> {
        let action = (self.build)(self.name, options, ctx)?;
        debug_assert_eq!(action.rule_type(), self.rule_type);
        Ok(Rule {
            name: self.name,
            description: self.description,
            stage: self.stage,
            action,
        })
    }
}

fn required(rule: &str, options: Option<f64>) -> Result<f64, RuleError> {
    let value = options.ok_or_else(|| RuleError::MissingOption(rule.to_string()))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RuleError::InvalidOption { rule: rule.to_string(), value })
    }
}

fn category_should_be_set(_: &str, _: Option<f64>, _: &RuleContext<'_>) -> Result<RuleAction, RuleError> {
    Ok(RuleAction::Filter(FilterRule::CategoryShouldBeSet))
}

fn bundle_size_should_be_more_than(
    name: &str,
    options: Option<f64>,
    _: &RuleContext<'_>,
) -> Result<RuleAction, RuleError> {
    Ok(RuleAction::Filter(FilterRule::BundleSizeMoreThan(required(name, options)?)))
}

fn amount_should_be_more_than(
    name: &str,
    options: Option<f64>,
    _: &RuleContext<'_>,
) -> Result<RuleAction, RuleError> {
    let value = required(name, options)?;
    let min = Decimal::from_f64(value).ok_or_else(|| RuleError::InvalidOption {
        rule: name.to_string(),
        value,
    })?;
    Ok(RuleAction::Filter(FilterRule::AmountMoreThan(min)))
}

fn split_brands(_: &str, _: Option<f64>, ctx: &RuleContext<'_>) -> Result<RuleAction, RuleError> {
    Ok(RuleAction::Split(SplitRule::Brands(ctx.brands.clone())))
}

fn add_stats_rule(_: &str, _: Option<f64>, _: &RuleContext<'_>) -> Result<RuleAction, RuleError> {
    Ok(RuleAction::Map(MapRule::AddStats))
}

fn delta_mean_superior_to(
    name: &str,
    options: Option<f64>,
    _: &RuleContext<'_>,
) -> Result<RuleAction, RuleError> {
    Ok(RuleAction::Filter(FilterRule::DeltaMeanAbove(required(name, options)?)))
}

fn delta_mean_inferior_to(
    name: &str,
    options: Option<f64>,
    _: &RuleContext<'_>,
) -> Result<RuleAction, RuleError> {
    Ok(RuleAction::Filter(FilterRule::DeltaMeanBelow(required(name, options)?)))
}

fn sigma_inferior_to(name: &str, options: Option<f64>, _: &RuleContext<'_>) -> Result<RuleAction, RuleError> {
    Ok(RuleAction::Filter(FilterRule::SigmaBelow(required(name, options)?)))
}

fn mad_inferior_to(name: &str, options: Option<f64>, _: &RuleContext<'_>) -> Result<RuleAction, RuleError> {
    Ok(RuleAction::Filter(FilterRule::MadBelow(required(name, options)?)))
}

fn merge_bundles(_: &str, _: Option<f64>, _: &RuleContext<'_>) -> Result<RuleAction, RuleError> {
    Ok(RuleAction::Group(GroupRule::SameLabel))
}

/// The rule registry, keyed by the names used in rule configuration.
pub const RULES: &[RuleDescriptor] = &[
    RuleDescriptor {
        name: "categoryShouldBeSet",
        description: "Filter out bundles where the category is not set",
        stage: 0,
        rule_type: RuleType::Filter,
        build: category_should_be_set,
    },
    RuleDescriptor {
        name: "bundleSizeShouldBeMoreThan",
        description: "Filter out bundles where the size is below",
        stage: 0,
        rule_type: RuleType::Filter,
        build: bundle_size_should_be_more_than,
    },
    RuleDescriptor {
        name: "amountShouldBeMoreThan",
        description: "Amount of bundle should be more than",
        stage: 0,
        rule_type: RuleType::Filter,
        build: amount_should_be_more_than,
    },
    RuleDescriptor {
        name: "splitBrands",
        description: "Make sure two brands cannot be in the same bundle",
        stage: 1,
        rule_type: RuleType::Split,
        build: split_brands,
    },
    RuleDescriptor {
        name: "addStats",
        description: "Add stats",
        stage: 2,
        rule_type: RuleType::Map,
        build: add_stats_rule,
    },
    RuleDescriptor {
        name: "deltaMeanSuperiorTo",
        description: "Mean interval in days between operations should be more than",
        stage: 3,
        rule_type: RuleType::Filter,
        build: delta_mean_superior_to,
    },
    RuleDescriptor {
        name: "deltaMeanInferiorTo",
        description: "Mean interval in days between operations should be less than",
        stage: 3,
        rule_type: RuleType::Filter,
        build: delta_mean_inferior_to,
    },
    RuleDescriptor {
        name: "sigmaInferiorTo",
        description: "Standard deviation of bundle's date intervals should be less than",
        stage: 3,
        rule_type: RuleType::Filter,
        build: sigma_inferior_to,
    },
    RuleDescriptor {
        name: "madInferiorTo",
        description: "Median absolute deviation of bundle's date intervals should be less than",
        stage: 3,
        rule_type: RuleType::Filter,
        build: mad_inferior_to,
    },
    RuleDescriptor {
        name: "mergeBundles",
        description: "Merge similar bundles",
        stage: 4,
        rule_type: RuleType::Group,
        build: merge_bundles,
    },
];

pub fn find_rule(name: &str) -> Option<&'static RuleDescriptor> {
    RULES.iter().find(|d| d.name == name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSettings {
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<f64>,
}

fn default_active() -> bool {
    true
}

impl RuleSettings {
    pub fn on() -> Self {
        RuleSettings { active: true, options: None }
    }

    pub fn with(options: f64) -> Self {
        RuleSettings { active: true, options: Some(options) }
    }
}

/// User-editable rule configuration: rule name to settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleConfig(pub BTreeMap<String, RuleSettings>);

impl RuleConfig {
    pub fn set(mut self, name: &str, settings: RuleSettings) -> Self {
        self.0.insert(name.to_string(), settings);
        self
    }

    /// Builds the live rule list from the registry.
    ///
    /// Inactive rules are skipped. Unknown names are logged and skipped.
    pub fn build_rules(&self, ctx: &RuleContext<'_>) -> Result<Vec<Rule>, RuleError> {
        let mut rules = Vec::new();
        for (name, settings) in &self.0 {
            if !settings.active {
                continue;
            }
            let Some(descriptor) = find_rule(name) else {
                tracing::warn!(rule = %name, "Unknown rule, skipping");
                continue;
            };
            rules.push(descriptor.build(settings.options, ctx)?);
        }
        Ok(rules)
    }
}
