use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::brand::{Brand, BrandDictionary};
use crate::matcher::Matcher;
use crate::pipeline::{PipelineError, RulePipeline};
use crate::rules::{RuleConfig, RuleContext, RuleError, RuleSettings};
use crate::updater::UpdatePolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Engine settings, loadable from TOML. Missing keys take their defaults.
///
/// ```toml
/// amount_tolerance = 0.1
///
/// [update]
/// backfill_min_span_days = 90
/// backfill_min_count = 100
///
/// [rules.bundleSizeShouldBeMoreThan]
/// active = true
/// options = 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Relative amount drift accepted when folding, 0.1 being 10 %.
    pub amount_tolerance: Decimal,
    pub update: UpdatePolicy,
    pub rules: RuleConfig,
    /// Replaces the built-in brand dictionary when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brands: Option<Vec<Brand>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: Decimal::new(10, 2),
            update: UpdatePolicy::default(),
            rules: default_rules(),
            brands: None,
        }
    }
}

/// Rule set used when the user has not edited anything.
pub fn default_rules() -> RuleConfig {
    RuleConfig::default()
        .set("categoryShouldBeSet", RuleSettings::on())
        .set("bundleSizeShouldBeMoreThan", RuleSettings::with(2.0))
        .set("amountShouldBeMoreThan", RuleSettings::with(5.0))
        .set("splitBrands", RuleSettings::on())
        .set("addStats", RuleSettings::on())
        .set("deltaMeanSuperiorTo", RuleSettings::with(5.0))
        .set("deltaMeanInferiorTo", RuleSettings::with(400.0))
        .set("sigmaInferiorTo", RuleSettings::with(10.0))
        .set("madInferiorTo", RuleSettings::with(5.0))
        .set("mergeBundles", RuleSettings::on())
}

impl EngineConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_content)?)
    }

    pub fn brand_dictionary(&self) -> Result<BrandDictionary, RuleError> {
        match &self.brands {
            Some(brands) => BrandDictionary::new(brands.clone()),
            None => Ok(BrandDictionary::builtin()),
        }
    }

    pub fn matcher(&self) -> Matcher {
        Matcher::new(self.amount_tolerance)
    }

    pub fn pipeline(&self) -> Result<RulePipeline, ConfigError> {
        let brands = self.brand_dictionary()?;
        let rules = self.rules.build_rules(&RuleContext { brands: &brands })?;
        Ok(RulePipeline::new(rules)?)
    }
}
