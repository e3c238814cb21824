//! Structural merge of an operator-computed baseline with an override.
//!
//! Every level follows the same rules: non-empty override scalars win, maps
//! are unioned with the override winning per key, keyed lists are matched by
//! key and merged pairwise, and set-like string lists are unioned and sorted.
//! Baseline entries keep their relative order; override-only entries are
//! slotted in by key. Merging never fails.

use std::collections::{BTreeMap, BTreeSet};

mod automation_config;
mod pod;
mod workload;

pub use automation_config::{merge_automation_configs, AutomationConfigOverride, ProcessOverride};

/// Baseline/override combination.
pub trait Merge {
    /// Returns `self` with `other` applied on top.
    fn merge(&self, other: &Self) -> Self;
}

impl<T: Merge + Clone> Merge for Option<T> {
    fn merge(&self, other: &Self) -> Self {
        match (self, other) {
            (Some(base), Some(over)) => Some(base.merge(over)),
            (None, Some(over)) => Some(over.clone()),
            (base, None) => base.clone(),
        }
    }
}

/// Non-empty override wins.
pub fn string(base: &str, over: &str) -> String {
    if over.is_empty() {
        base.to_string()
    } else {
        over.to_string()
    }
}

/// Non-zero override wins.
pub fn int<T: Copy + Default + PartialEq>(base: T, over: T) -> T {
    if over == T::default() {
        base
    } else {
        over
    }
}

/// `true` is the only non-zero boolean.
pub fn flag(base: bool, over: bool) -> bool {
    base || over
}

/// Present override replaces the baseline value wholesale.
pub fn replace<T: Clone>(base: &Option<T>, over: &Option<T>) -> Option<T> {
    over.clone().or_else(|| base.clone())
}

/// Non-empty override list replaces the baseline list (order-sensitive lists).
pub fn list<T: Clone>(base: &[T], over: &[T]) -> Vec<T> {
    if over.is_empty() {
        base.to_vec()
    } else {
        over.to_vec()
    }
}

/// Key union, override wins per key.
pub fn map(base: &BTreeMap<String, String>, over: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut merged = base.clone();
    merged.extend(over.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Union that keeps the baseline as is. Values only the override carries
/// are inserted ahead of the first greater baseline value.
pub fn string_set(base: &[String], over: &[String]) -> Vec<String> {
    let present: BTreeSet<&String> = base.iter().collect();
    let added: BTreeSet<&String> = over.iter().filter(|value| !present.contains(value)).collect();
    let mut merged = base.to_vec();
    let mut cursor = 0;
    for value in added {
        let position = merged[cursor..]
            .iter()
            .position(|existing| existing > value)
            .map_or(merged.len(), |offset| cursor + offset);
        merged.insert(position, value.clone());
        cursor = position + 1;
    }
    merged
}

/// Merges lists whose entries are identified by `key`.
///
/// Matched pairs are merged in the baseline's position. Override-only entries
/// are inserted ahead of the first entry with a greater key, so a sorted
/// baseline yields a sorted result. Duplicate override keys: last one wins.
pub fn keyed<T, K, F>(base: &[T], over: &[T], key: F) -> Vec<T>
where
    T: Merge + Clone,
    K: Ord,
    F: Fn(&T) -> K,
{
    if over.is_empty() {
        return base.to_vec();
    }
    let overrides: BTreeMap<K, &T> = over.iter().map(|item| (key(item), item)).collect();
    let base_keys: BTreeSet<K> = base.iter().map(&key).collect();

    let mut merged: Vec<T> = base
        .iter()
        .map(|item| match overrides.get(&key(item)) {
            Some(over) => item.merge(over),
            None => item.clone(),
        })
        .collect();

    let mut cursor = 0;
    for (item_key, item) in overrides.iter().filter(|(k, _)| !base_keys.contains(*k)) {
        let position = merged[cursor..]
            .iter()
            .position(|existing| key(existing) > *item_key)
            .map_or(merged.len(), |offset| cursor + offset);
        merged.insert(position, (*item).clone());
        cursor = position + 1;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Entry(&'static str, u32);

    impl Merge for Entry {
        fn merge(&self, other: &Self) -> Self {
            Entry(self.0, int(self.1, other.1))
        }
    }

    #[test]
    fn keyed_interleaves_override_only_entries() {
        let base = vec![Entry("b", 1), Entry("d", 1)];
        let over = vec![Entry("e", 2), Entry("a", 2), Entry("d", 3), Entry("c", 2)];
        let merged = keyed(&base, &over, |entry| entry.0);
        assert_eq!(
            merged,
            vec![
                Entry("a", 2),
                Entry("b", 1),
                Entry("c", 2),
                Entry("d", 3),
                Entry("e", 2)
            ]
        );
    }

    #[test]
    fn keyed_keeps_unsorted_baseline_order() {
        let base = vec![Entry("z", 1), Entry("a", 1)];
        let merged = keyed(&base, &base, |entry| entry.0);
        assert_eq!(merged, base);
    }

    #[test]
    fn string_set_keeps_baseline_order() {
        let base = vec!["b".to_string(), "a".to_string()];
        let over = vec!["c".to_string(), "a".to_string()];
        assert_eq!(string_set(&base, &over), vec!["b", "a", "c"]);
        assert_eq!(string_set(&base, &[]), base);
        assert_eq!(string_set(&base, &base), base);

        let sorted = vec!["a".to_string(), "d".to_string()];
        let over = vec!["e".to_string(), "b".to_string(), "b".to_string()];
        assert_eq!(string_set(&sorted, &over), vec!["a", "b", "d", "e"]);
    }
}
