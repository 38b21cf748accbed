use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::bundle::Bundle;
use crate::rules::RuleError;
use crate::util::{group_by_key, unique};

const DEFAULT_BRANDS: &str = include_str!("brands.toml");

/// A merchant identity recognised from transaction labels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Brand {
    pub name: String,
    /// Case-insensitive regular expression matched against labels.
    pub pattern: String,
}

#[derive(Deserialize)]
struct BrandFile {
    brands: Vec<Brand>,
}

/// Internal pairing of a brand with its compiled pattern.
#[derive(Debug, Clone)]
struct CompiledBrand {
    name: String,
    regex: Regex,
}

#[derive(Debug, Clone, Default)]
pub struct BrandDictionary {
    brands: Vec<CompiledBrand>,
}

impl BrandDictionary {
    pub fn new(brands: Vec<Brand>) -> Result<Self, RuleError> {
        let compiled = brands
            .into_iter()
            .map(|brand| {
                let regex = RegexBuilder::new(&brand.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| RuleError::InvalidPattern {
                        brand: brand.name.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(CompiledBrand { name: brand.name, regex })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;
        Ok(Self { brands: compiled })
    }

    pub fn from_toml(toml_content: &str) -> Result<Self, RuleError> {
        let file: BrandFile = toml::from_str(toml_content)
            .map_err(|e| RuleError::InvalidBrandFile(e.to_string()))?;
        Self::new(file.brands)
    }

    /// The dictionary shipped with the engine.
    pub fn builtin() -> Self {
        Self::from_toml_or_empty(DEFAULT_BRANDS)
    }

    /// Falls back to an empty dictionary, which turns brand splitting into a no-op.
    fn from_toml_or_empty(toml_content: &str) -> Self {
        Self::from_toml(toml_content).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Brand dictionary unusable, brand splitting disabled");
            Self::default()
        })
    }

    pub fn len(&self) -> usize {
        self.brands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
    }

    /// Name of the first brand whose pattern matches `label`.
    pub fn find_matching_brand(&self, label: &str) -> Option<&str> {
        self.brands
            .iter()
            .find(|b| b.regex.is_match(label))
            .map(|b| b.name.as_str())
    }

    /// Splits a bundle so that no two brands share it.
    ///
    /// Operations without a recognised brand end up together in one part.
    pub fn split(&self, bundle: &Bundle) -> Vec<Bundle> {
        group_by_key(bundle.ops.iter().cloned(), |op| {
            self.find_matching_brand(&op.label).map(str::to_string)
        })
        .into_iter()
        .map(|(brand, ops)| Bundle {
            category_ids: unique(ops.iter().map(|op| op.category_id())),
            amounts: unique(ops.iter().map(|op| op.amount)),
            brand,
            ops,
            ..bundle.clone()
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{AccountId, CategoryId, Money, Transaction, TransactionId};
    use chrono::NaiveDate;

    fn op(id: &str, label: &str) -> Transaction {
        Transaction {
            id: TransactionId::from(id),
            date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            amount: Money::from(15),
            label: label.to_string(),
            account: AccountId::from("acc"),
            manual_category_id: None,
            automatic_category_id: Some(CategoryId::from("400100")),
        }
    }

    #[test]
    fn builtin_dictionary_compiles() {
        let dict = BrandDictionary::from_toml(DEFAULT_BRANDS).unwrap();
        assert!(!dict.is_empty());
        assert_eq!(dict.len(), BrandDictionary::builtin().len());
    }

    #[test]
    fn unusable_dictionary_falls_back_to_empty() {
        let dict = BrandDictionary::from_toml_or_empty("[[brands]]\nname = \"Broken\"\npattern = \"(\"\n");
        assert!(dict.is_empty());
        assert!(BrandDictionary::from_toml_or_empty("brands = 3").is_empty());

        let bundle = Bundle::new(
            CategoryId::from("400100"),
            Money::from(15),
            vec![op("1", "Unibet 1"), op("2", "Amazon 1")],
        );
        let parts = dict.split(&bundle);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].ops.len(), 2);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let dict = BrandDictionary::builtin();
        assert_eq!(dict.find_matching_brand("PRLV SEPA NETFLIX.COM"), Some("Netflix"));
        assert_eq!(dict.find_matching_brand("CB Boulangerie"), None);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = BrandDictionary::new(vec![Brand {
            name: "Broken".to_string(),
            pattern: "(".to_string(),
        }])
        .unwrap_err();
        assert!(matches!(err, RuleError::InvalidPattern { ref brand, .. } if brand == "Broken"));
    }

    #[test]
    fn splits_bundle_per_brand() {
        let ops = vec![
            op("1", "Unibet 1"),
            op("2", "Amazon 1"),
            op("3", "Amazon 2"),
            op("4", "Unibet 2"),
            op("5", "Unibet 3"),
        ];
        let bundle = Bundle::new(CategoryId::from("400100"), Money::from(15), ops);
        let parts = BrandDictionary::builtin().split(&bundle);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].ops.len(), 3);
        assert_eq!(parts[0].brand.as_deref(), Some("Unibet"));
        assert_eq!(parts[1].ops.len(), 2);
        assert_eq!(parts[1].brand.as_deref(), Some("Amazon"));
        assert_eq!(parts[1].amounts, vec![Money::from(15)]);
        assert_eq!(parts[1].category_ids, vec![CategoryId::from("400100")]);
    }

    #[test]
    fn unbranded_ops_stay_together() {
        let ops = vec![op("1", "Loyer"), op("2", "Loyer mars")];
        let bundle = Bundle::new(CategoryId::from("400100"), Money::from(15), ops);
        let parts = BrandDictionary::builtin().split(&bundle);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].ops.len(), 2);
        assert_eq!(parts[0].brand, None);
    }
}
