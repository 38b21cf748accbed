use anyhow::{Context, Result};
use cadence_core::{DateRange, Transaction};
use cadence_engine::{
    frequency_text, refresh_observed, Bundle, EngineConfig, RecurrenceEngine, RULES,
};
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            EngineConfig::from_toml(&raw)
                .with_context(|| format!("Invalid config {}", path.display()))
        }
        None => Ok(EngineConfig::default()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

pub fn update(
    config: &EngineConfig,
    transactions: &Path,
    bundles: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let engine = RecurrenceEngine::from_config(config).context("Invalid rule configuration")?;

    let transactions: Vec<Transaction> = read_json(transactions)?;
    let existing: Vec<Bundle> = match bundles {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    tracing::info!(
        "Loaded {} transactions and {} existing bundles",
        transactions.len(),
        existing.len()
    );
    for bundle in &existing {
        tracing::info!("{}: {} operations", bundle.label(), bundle.ops.len());
    }

    let updated = engine.find_and_update(&refresh_observed(&existing), &transactions);

    let json = serde_json::to_string_pretty(&updated)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote {} bundles to {}", updated.len(), path.display());
        }
        None => writeln!(io::stdout(), "{json}")?,
    }
    Ok(())
}

pub fn summary(bundles: &Path) -> Result<()> {
    let bundles: Vec<Bundle> = read_json(bundles)?;
    let mut out = io::stdout().lock();
    for bundle in &bundles {
        let amount = bundle
            .amounts
            .first()
            .map(|a| a.to_string())
            .unwrap_or_default();
        let extent = DateRange::spanning(bundle.ops.iter().map(|op| op.date))
            .map(|range| range.to_string())
            .unwrap_or_else(|| "-".to_string());
        let frequency = frequency_text(bundle).unwrap_or_else(|| "unknown frequency".to_string());
        writeln!(
            out,
            "{:<32} {:>10}  {:>3} ops  {}  {}",
            bundle.label(),
            amount,
            bundle.ops.len(),
            extent,
            frequency
        )?;
    }
    Ok(())
}

pub fn rules(config: &EngineConfig) -> Result<()> {
    let mut out = io::stdout().lock();
    for rule in RULES {
        let status = match config.rules.0.get(rule.name) {
            Some(settings) if settings.active => match settings.options {
                Some(options) => format!("on ({options})"),
                None => "on".to_string(),
            },
            _ => "off".to_string(),
        };
        writeln!(
            out,
            "{} {:<28} {:<7} {:<10} {}",
            rule.stage,
            rule.name,
            rule.rule_type.to_string(),
            status,
            rule.description
        )?;
    }
    Ok(())
}
