use std::collections::HashMap;
use std::hash::Hash;

/// Partitions `items` by `key`, keeping groups in first-seen order and
/// items in input order inside each group.
pub fn group_by_key<T, K, F>(items: impl IntoIterator<Item = T>, mut key: F) -> Vec<(K, Vec<T>)>
where
    K: Eq + Hash + Clone,
    F: FnMut(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<T>)> = Vec::new();

    for item in items {
        let k = key(&item);
        match index.get(&k) {
            Some(&slot) => groups[slot].1.push(item),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![item]));
            }
        }
    }

    groups
}

/// Drops repeated values, keeping the first occurrence of each.
pub fn unique<T: PartialEq>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_keep_first_seen_order() {
        let groups = group_by_key(vec![3, 10, 4, 13, 5], |n| n % 2);
        assert_eq!(groups, vec![(1, vec![3, 13, 5]), (0, vec![10, 4])]);
    }

    #[test]
    fn empty_input_has_no_groups() {
        let groups = group_by_key(Vec::<u8>::new(), |n| *n);
        assert!(groups.is_empty());
    }

    #[test]
    fn unique_keeps_first_occurrence() {
        assert_eq!(unique(vec!["b", "a", "b", "c", "a"]), vec!["b", "a", "c"]);
    }
}
