use cadence_core::{Money, Transaction};
use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::bundle::Bundle;

/// Result of folding new transactions into existing bundles.
#[derive(Debug, Clone)]
pub struct FoldOutcome {
    /// Every input bundle, in input order, updated where something folded in.
    pub bundles: Vec<Bundle>,
    /// Transactions that matched at least one bundle, in input order.
    pub folded: Vec<Transaction>,
    /// Indices into `bundles` of the bundles that received transactions.
    pub touched: Vec<usize>,
}

/// Decides whether new transactions belong to existing bundles.
#[derive(Debug, Clone)]
pub struct Matcher {
    /// Fraction by which amounts may drift outside a bundle's observed range.
    pub tolerance: Decimal,
}

impl Default for Matcher {
    fn default() -> Self {
        Self {
            tolerance: Decimal::new(10, 2),
        }
    }
}

impl Matcher {
    pub fn new(tolerance: Decimal) -> Self {
        Self { tolerance }
    }

    /// Inclusive `[(1-p) * min|amount|, (1+p) * max|amount|]`, `None` for a
    /// bundle without amounts.
    pub fn tolerance_window(&self, bundle: &Bundle) -> Option<(Money, Money)> {
        let min = bundle.amounts.iter().map(|a| a.abs()).min()?;
        let max = bundle.amounts.iter().map(|a| a.abs()).max()?;
        Some((
            min * (Decimal::ONE - self.tolerance),
            max * (Decimal::ONE + self.tolerance),
        ))
    }

    /// Category, amount window and account must all agree.
    pub fn matches(&self, bundle: &Bundle, tx: &Transaction) -> bool {
        if !bundle.category_ids.contains(&tx.category_id()) {
            return false;
        }

        let Some((low, high)) = self.tolerance_window(bundle) else {
            return false;
        };
        let amount = tx.amount.abs();
        if amount < low || amount > high {
            return false;
        }

        // Bundles saved before account scoping match every account.
        match &bundle.accounts {
            Some(accounts) if !accounts.is_empty() => accounts.contains(&tx.account),
            _ => true,
        }
    }

    /// Folds each transaction into every bundle it matches.
    ///
    /// Bundles are evaluated independently, so one transaction may land in
    /// several of them. Operations stay unique by id within each bundle.
    pub fn fold(&self, bundles: &[Bundle], transactions: &[Transaction]) -> FoldOutcome {
        let mut folded_ids = HashSet::new();
        let mut touched = Vec::new();

        let updated: Vec<Bundle> = bundles
            .iter()
            .enumerate()
            .map(|(idx, bundle)| {
                let matching: Vec<&Transaction> = transactions
                    .iter()
                    .filter(|tx| self.matches(bundle, tx))
                    .collect();
                if matching.is_empty() {
                    return bundle.clone();
                }

                touched.push(idx);
                folded_ids.extend(matching.iter().map(|tx| tx.id.clone()));

                let mut grown = bundle.clone();
                for tx in matching {
                    if !grown.contains_op(tx) {
                        grown.ops.push(tx.clone());
                    }
                }
                grown
            })
            .collect();

        let folded = transactions
            .iter()
            .filter(|tx| folded_ids.contains(&tx.id))
            .cloned()
            .collect();

        FoldOutcome {
            bundles: updated,
            folded,
            touched,
        }
    }
}
