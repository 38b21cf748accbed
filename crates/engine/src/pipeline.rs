use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::bundle::Bundle;
use crate::merge::merge;
use crate::rules::{FilterRule, GroupRule, MapRule, Rule, RuleAction, RuleType, SplitRule};
use crate::util::group_by_key;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("Cannot have multiple types per stage (stage {stage}: {first} and {second})")]
    MixedStageTypes {
        stage: u32,
        first: RuleType,
        second: RuleType,
    },
    #[error("Cannot have multiple split rules in one stage (stage {0})")]
    MultipleSplitRules(u32),
}

#[derive(Debug, Clone)]
struct NamedFilter {
    name: &'static str,
    description: &'static str,
    rule: FilterRule,
}

impl NamedFilter {
    fn new(name: &'static str, description: &'static str, rule: FilterRule) -> Self {
        NamedFilter { name, description, rule }
    }
}

/// The rules of one stage, all of a single type.
#[derive(Debug, Clone)]
enum StageAction {
    Filter(Vec<NamedFilter>),
    Map(Vec<MapRule>),
    Group(Vec<GroupRule>),
    Split(SplitRule),
}

impl StageAction {
    /// A stage holding only `rule`.
    fn start(rule: Rule) -> Self {
        match rule.action {
            RuleAction::Filter(f) => {
                StageAction::Filter(vec![NamedFilter::new(rule.name, rule.description, f)])
            }
            RuleAction::Map(m) => StageAction::Map(vec![m]),
            RuleAction::Group(g) => StageAction::Group(vec![g]),
            RuleAction::Split(s) => StageAction::Split(s),
        }
    }

    /// Adds another rule of the same stage.
    fn push(&mut self, rule: Rule) -> Result<(), PipelineError> {
        let stage = rule.stage;
        match (self, rule.action) {
            (StageAction::Filter(filters), RuleAction::Filter(f)) => {
                filters.push(NamedFilter::new(rule.name, rule.description, f));
            }
            (StageAction::Map(maps), RuleAction::Map(m)) => maps.push(m),
            (StageAction::Group(groupers), RuleAction::Group(g)) => groupers.push(g),
            (StageAction::Split(_), RuleAction::Split(_)) => {
                return Err(PipelineError::MultipleSplitRules(stage));
            }
            (existing, other) => {
                return Err(PipelineError::MixedStageTypes {
                    stage,
                    first: existing.rule_type(),
                    second: other.rule_type(),
                });
            }
        }
        Ok(())
    }

    fn rule_type(&self) -> RuleType {
        match self {
            StageAction::Filter(_) => RuleType::Filter,
            StageAction::Map(_) => RuleType::Map,
            StageAction::Group(_) => RuleType::Group,
            StageAction::Split(_) => RuleType::Split,
        }
    }

    /// Consumes one bundle list and produces the next.
    fn apply(&self, bundles: Vec<Bundle>) -> Vec<Bundle> {
        match self {
            StageAction::Filter(filters) => bundles
                .into_iter()
                .filter(|bundle| match filters.iter().find(|f| !f.rule.keep(bundle)) {
                    Some(failed) => {
                        debug!(
                            label = bundle.label(),
                            ops = bundle.ops.len(),
                            rule = failed.name,
                            "Excluding bundle: {}",
                            failed.description
                        );
                        false
                    }
                    None => true,
                })
                .collect(),
            StageAction::Map(maps) => bundles
                .into_iter()
                .map(|bundle| maps.iter().fold(bundle, |b, m| m.apply(b)))
                .collect(),
            StageAction::Group(groupers) => {
                let keyed = group_by_key(bundles, |bundle| {
                    groupers.iter().map(|g| g.key(bundle)).collect::<Vec<_>>()
                });
                keyed
                    .into_iter()
                    .flat_map(|(_, group)| merge(&group))
                    .collect()
            }
            StageAction::Split(splitter) => bundles.iter().flat_map(|b| splitter.split(b)).collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct Stage {
    number: u32,
    action: StageAction,
}

/// Staged rule execution over bundles.
///
/// Stages run in ascending numeric order. Every stage holds rules of a
/// single type; this is checked once, when the pipeline is built.
#[derive(Debug, Clone)]
pub struct RulePipeline {
    stages: Vec<Stage>,
}

impl RulePipeline {
    pub fn new(rules: Vec<Rule>) -> Result<Self, PipelineError> {
        let mut by_stage: BTreeMap<u32, StageAction> = BTreeMap::new();
        for rule in rules {
            match by_stage.entry(rule.stage) {
                Entry::Vacant(slot) => {
                    slot.insert(StageAction::start(rule));
                }
                Entry::Occupied(mut slot) => slot.get_mut().push(rule)?,
            }
        }

        let stages = by_stage
            .into_iter()
            .map(|(number, action)| Stage { number, action })
            .collect();
        Ok(Self { stages })
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Stage numbers with their rule type, in execution order.
    pub fn stages(&self) -> Vec<(u32, RuleType)> {
        self.stages
            .iter()
            .map(|s| (s.number, s.action.rule_type()))
            .collect()
    }

    /// Runs every stage over a copy of `bundles`. Inputs are left untouched.
    pub fn run(&self, bundles: &[Bundle]) -> Vec<Bundle> {
        info!("Running {} stages over {} bundles", self.stages.len(), bundles.len());
        let result = self.stages.iter().fold(bundles.to_vec(), |current, stage| {
            let next = stage.action.apply(current);
            debug!(stage = stage.number, kind = %stage.action.rule_type(), bundles = next.len(), "Stage done");
            next
        });
        info!("Pipeline kept {} bundles", result.len());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brand::BrandDictionary;
    use crate::grouper::group;
    use crate::rules::{find_rule, RuleContext};
    use cadence_core::{AccountId, CategoryId, Money, Transaction, TransactionId};
    use chrono::NaiveDate;

    fn tx(id: &str, date: (i32, u32, u32), label: &str, category: &str, amount: i64) -> Transaction {
        Transaction {
            id: TransactionId::from(id),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            amount: Money::from(amount),
            label: label.to_string(),
            account: AccountId::from("accountId"),
            manual_category_id: None,
            automatic_category_id: Some(CategoryId::from(category)),
        }
    }

    fn rule(name: &str, options: Option<f64>) -> Rule {
        let brands = BrandDictionary::builtin();
        find_rule(name)
            .unwrap()
            .build(options, &RuleContext { brands: &brands })
            .unwrap()
    }

    fn netflix() -> Vec<Transaction> {
        vec![
            tx("january", (2021, 1, 1), "Netflix", "NetflixId", -50),
            tx("february", (2021, 2, 1), "Netflix", "NetflixId", -50),
            tx("march", (2021, 3, 1), "Netflix", "NetflixId", -50),
        ]
    }

    #[test]
    fn mixed_types_in_one_stage_fail_fast() {
        let mut map = rule("addStats", None);
        map.stage = 0;
        let err = RulePipeline::new(vec![rule("categoryShouldBeSet", None), map]).unwrap_err();
        assert_eq!(
            err,
            PipelineError::MixedStageTypes {
                stage: 0,
                first: RuleType::Filter,
                second: RuleType::Map
            }
        );
    }

    #[test]
    fn mixing_is_reported_with_the_stage_first_type() {
        let mut filter = rule("categoryShouldBeSet", None);
        filter.stage = 1;
        let err = RulePipeline::new(vec![rule("splitBrands", None), filter]).unwrap_err();
        assert_eq!(
            err,
            PipelineError::MixedStageTypes {
                stage: 1,
                first: RuleType::Split,
                second: RuleType::Filter
            }
        );

        let mut split = rule("splitBrands", None);
        split.stage = 0;
        let err = RulePipeline::new(vec![
            rule("categoryShouldBeSet", None),
            rule("bundleSizeShouldBeMoreThan", Some(2.0)),
            split,
        ])
        .unwrap_err();
        assert_eq!(
            err,
            PipelineError::MixedStageTypes {
                stage: 0,
                first: RuleType::Filter,
                second: RuleType::Split
            }
        );
    }

    #[test]
    fn two_split_rules_in_one_stage_fail_fast() {
        let err = RulePipeline::new(vec![rule("splitBrands", None), rule("splitBrands", None)])
            .unwrap_err();
        assert_eq!(err, PipelineError::MultipleSplitRules(1));
    }

    #[test]
    fn stages_run_in_numeric_order() {
        let mut late = rule("sigmaInferiorTo", Some(5.0));
        late.stage = 10;
        let pipeline = RulePipeline::new(vec![
            late,
            rule("addStats", None),
            rule("categoryShouldBeSet", None),
        ])
        .unwrap();
        assert_eq!(
            pipeline.stages(),
            vec![(0, RuleType::Filter), (2, RuleType::Map), (10, RuleType::Filter)]
        );
        // Stage 10 reads stats, so it only passes if stage 2 ran first.
        let out = pipeline.run(&group(&netflix()));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn filters_are_and_combined() {
        let pipeline = RulePipeline::new(vec![
            rule("categoryShouldBeSet", None),
            rule("bundleSizeShouldBeMoreThan", Some(2.0)),
        ])
        .unwrap();
        let mut txs = netflix();
        txs.push(tx("x1", (2021, 1, 5), "Boulangerie", "0", -3));
        txs.push(tx("x2", (2021, 1, 6), "Boulangerie", "0", -3));
        txs.push(tx("x3", (2021, 1, 7), "Boulangerie", "0", -3));
        txs.push(tx("y1", (2021, 1, 7), "Cinema", "400200", -12));
        let out = pipeline.run(&group(&txs));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].automatic_label, "Netflix");
    }

    #[test]
    fn nan_stats_are_filtered_not_fatal() {
        let pipeline = RulePipeline::new(vec![
            rule("addStats", None),
            rule("deltaMeanSuperiorTo", Some(0.0)),
        ])
        .unwrap();
        let single = vec![tx("only", (2021, 1, 1), "Netflix", "NetflixId", -50)];
        assert!(pipeline.run(&group(&single)).is_empty());
    }

    #[test]
    fn group_stage_merges_same_label() {
        let pipeline = RulePipeline::new(vec![rule("mergeBundles", None)]).unwrap();
        let txs = vec![
            tx("a", (2021, 1, 1), "Netflix", "NetflixId", -50),
            tx("b", (2021, 2, 1), "Netflix", "NetflixId", -55),
            tx("c", (2021, 2, 3), "Gym", "400140", -30),
        ];
        let out = pipeline.run(&group(&txs));
        assert_eq!(out.len(), 2);
        let netflix = out.iter().find(|b| b.automatic_label == "Netflix").unwrap();
        assert_eq!(netflix.ops.len(), 2);
        assert_eq!(netflix.amounts, vec![Money::from(-50), Money::from(-55)]);
    }

    #[test]
    fn split_stage_breaks_apart_brands() {
        let pipeline = RulePipeline::new(vec![rule("splitBrands", None)]).unwrap();
        let txs = vec![
            tx("a", (2021, 1, 1), "Unibet 1", "400100", 15),
            tx("b", (2021, 1, 2), "Amazon 1", "400100", 15),
            tx("c", (2021, 1, 3), "Unibet 2", "400100", 15),
        ];
        let out = pipeline.run(&group(&txs));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].brand.as_deref(), Some("Unibet"));
        assert_eq!(out[1].brand.as_deref(), Some("Amazon"));
    }

    #[test]
    fn run_does_not_touch_inputs() {
        let pipeline = RulePipeline::new(vec![
            rule("splitBrands", None),
            rule("addStats", None),
            rule("mergeBundles", None),
        ])
        .unwrap();
        let bundles = group(&netflix());
        let snapshot = bundles.clone();
        let out = pipeline.run(&bundles);
        assert_eq!(bundles, snapshot);
        assert!(bundles[0].stats.is_none());
        assert!(out[0].stats.is_some());
        assert!(!std::ptr::eq(&bundles[0], &out[0]));
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let pipeline = RulePipeline::new(vec![]).unwrap();
        let bundles = group(&netflix());
        assert_eq!(pipeline.stage_count(), 0);
        assert_eq!(pipeline.run(&bundles), bundles);
    }
}
