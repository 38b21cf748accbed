use cadence_core::Transaction;

use crate::bundle::Bundle;
use crate::util::group_by_key;

/// Buckets transactions into one initial bundle per (category, amount).
pub fn group(transactions: &[Transaction]) -> Vec<Bundle> {
    group_by_key(transactions.iter().cloned(), |op| (op.category_id(), op.amount))
        .into_iter()
        .map(|((category_id, amount), ops)| Bundle::new(category_id, amount, ops))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{AccountId, CategoryId, Money, TransactionId};
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn tx(id: &str, category: Option<&str>, amount: i64) -> Transaction {
        Transaction {
            id: TransactionId::from(id),
            date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            amount: Money::from(amount),
            label: format!("label {id}"),
            account: AccountId::from("acc"),
            manual_category_id: None,
            automatic_category_id: category.map(CategoryId::from),
        }
    }

    fn membership(bundles: &[Bundle]) -> BTreeSet<(String, Money, Vec<String>)> {
        bundles
            .iter()
            .map(|b| {
                let mut ids: Vec<String> = b.ops.iter().map(|o| o.id.to_string()).collect();
                ids.sort();
                (b.category_ids[0].to_string(), b.amounts[0], ids)
            })
            .collect()
    }

    #[test]
    fn buckets_by_category_and_amount() {
        let txs = vec![
            tx("a", Some("netflix"), -50),
            tx("b", Some("netflix"), -50),
            tx("c", Some("netflix"), -60),
            tx("d", Some("salary"), 2000),
        ];
        let bundles = group(&txs);
        assert_eq!(bundles.len(), 3);
        let netflix = bundles
            .iter()
            .find(|b| b.amounts == vec![Money::from(-50)])
            .unwrap();
        assert_eq!(netflix.ops.len(), 2);
        assert_eq!(netflix.category_ids, vec![CategoryId::from("netflix")]);
        assert_eq!(netflix.automatic_label, "label a");
    }

    #[test]
    fn missing_category_falls_into_uncategorized() {
        let bundles = group(&[tx("a", None, -5), tx("b", None, -5)]);
        assert_eq!(bundles.len(), 1);
        assert!(bundles[0].category_ids[0].is_uncategorized());
    }

    #[test]
    fn membership_ignores_input_order() {
        let txs = vec![
            tx("a", Some("x"), -50),
            tx("b", Some("y"), -50),
            tx("c", Some("x"), -50),
            tx("d", Some("x"), -20),
        ];
        let mut reversed = txs.clone();
        reversed.reverse();
        assert_eq!(membership(&group(&txs)), membership(&group(&reversed)));
        assert_eq!(membership(&group(&txs)), membership(&group(&txs)));
    }

    #[test]
    fn empty_input_gives_no_bundles() {
        assert!(group(&[]).is_empty());
    }
}
