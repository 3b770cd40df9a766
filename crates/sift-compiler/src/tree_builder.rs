//! Tree construction
//!
//! `TreeBuilder<V>` keeps a working list of `text => value` entries,
//! resolves duplicates as they arrive, and lays the final sorted list out
//! as a complete binary tree by median splitting.

use std::collections::BTreeMap;

use sift_core::charset::CharacterSet;
use sift_core::error::Error;
use sift_core::tree::Tree;
use sift_core::types::{ConflictPolicy, Rate};

use crate::optimizer::merge_purified;

// =============================================================================
// Duplicate Resolution
// =============================================================================

/// How duplicates are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeRules {
    /// Applied to rate duplicates, and to string-only duplicates
    pub policy: ConflictPolicy,
    /// Whether one string may carry several categories
    pub allow_multiple_categories: bool,
}

impl MergeRules {
    pub fn with_policy(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }
}

/// A per-entry value a builder can hold.
pub trait EntryValue: Clone {
    /// Reject a value that can never be stored under `rules`.
    fn validate(&self, _text: &str, _rules: &MergeRules) -> Result<(), Error> {
        Ok(())
    }

    /// Fold `incoming` into the value already stored for `text`.
    fn merge(&mut self, text: &str, incoming: Self, rules: &MergeRules) -> Result<(), Error>;
}

impl EntryValue for Rate {
    fn merge(&mut self, text: &str, incoming: Self, rules: &MergeRules) -> Result<(), Error> {
        *self = rules.policy.resolve_rate(text, *self, incoming)?;
        Ok(())
    }
}

/// String-only entries: duplicates are harmless unless the policy forbids them.
impl EntryValue for () {
    fn merge(&mut self, text: &str, _incoming: Self, rules: &MergeRules) -> Result<(), Error> {
        match rules.policy {
            ConflictPolicy::ThrowError => Err(Error::DuplicateEntry(text.to_string())),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// Layout
// =============================================================================

/// Slot arrays produced by a build, before payloads are packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout<V> {
    pub strings: Vec<Option<String>>,
    pub values: Vec<Option<V>>,
}

/// Place `count` sorted items into a complete tree.
///
/// Returns, per slot, the index of the sorted item stored there. Each slot
/// takes the lower median of its inclusive range; the halves go to logical
/// children `2i` and `2i + 1`.
pub fn balanced_layout(count: usize) -> Vec<Option<usize>> {
    if count == 0 {
        return Vec::new();
    }
    // ceil(log2(count + 1)) levels
    let height = usize::BITS - count.leading_zeros();
    let slots = (1usize << height) - 1;

    let mut ranges: Vec<Option<(usize, usize)>> = vec![None; slots];
    ranges[0] = Some((0, count - 1));
    let mut order = vec![None; slots];
    for slot in 0..slots {
        let Some((low, high)) = ranges[slot] else {
            continue;
        };
        let mid = low + (high - low) / 2;
        order[slot] = Some(mid);

        let lower = 2 * slot + 1;
        if lower + 1 < slots {
            if mid > low {
                ranges[lower] = Some((low, mid - 1));
            }
            if mid < high {
                ranges[lower + 1] = Some((mid + 1, high));
            }
        }
    }
    order
}

// =============================================================================
// Builder
// =============================================================================

/// Incremental builder for `Tree`s.
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder<V> {
    entries: BTreeMap<String, V>,
    rules: MergeRules,
    charset: Option<CharacterSet>,
}

impl<V: EntryValue> TreeBuilder<V> {
    pub fn new() -> Self {
        Self::with_rules(MergeRules::default())
    }

    pub fn with_rules(rules: MergeRules) -> Self {
        Self {
            entries: BTreeMap::new(),
            rules,
            charset: None,
        }
    }

    pub fn with_policy(policy: ConflictPolicy) -> Self {
        Self::with_rules(MergeRules::with_policy(policy))
    }

    pub fn rules(&self) -> &MergeRules {
        &self.rules
    }

    pub fn set_policy(&mut self, policy: ConflictPolicy) -> &mut Self {
        self.rules.policy = policy;
        self
    }

    /// Purify entries with `charset` at build time.
    pub fn set_character_set(&mut self, charset: CharacterSet) -> &mut Self {
        self.charset = Some(charset);
        self
    }

    pub fn character_set(&self) -> Option<&CharacterSet> {
        self.charset.as_ref()
    }

    /// Add one entry, resolving a duplicate with the builder's policy.
    pub fn add(&mut self, text: &str, value: V) -> Result<&mut Self, Error> {
        let rules = self.rules;
        self.insert(text, value, &rules)
    }

    /// Add one entry, resolving a duplicate with `policy`.
    pub fn add_with(&mut self, text: &str, value: V, policy: ConflictPolicy) -> Result<&mut Self, Error> {
        let rules = MergeRules {
            policy,
            ..self.rules
        };
        self.insert(text, value, &rules)
    }

    /// Add many strings sharing one value.
    pub fn add_all<I, S>(&mut self, texts: I, value: V) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for text in texts {
            self.add(text.as_ref(), value.clone())?;
        }
        Ok(self)
    }

    fn insert(&mut self, text: &str, value: V, rules: &MergeRules) -> Result<&mut Self, Error> {
        if text.is_empty() {
            return Err(Error::InvalidString);
        }
        value.validate(text, rules)?;
        match self.entries.get_mut(text) {
            Some(existing) => existing.merge(text, value, rules)?,
            None => {
                self.entries.insert(text.to_string(), value);
            }
        }
        Ok(self)
    }

    /// Remove entries; absent strings are ignored.
    pub fn remove<I, S>(&mut self, texts: I) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for text in texts {
            let text = text.as_ref();
            if text.is_empty() {
                return Err(Error::InvalidString);
            }
            self.entries.remove(text);
        }
        Ok(self)
    }

    /// Working entries in text order.
    pub fn list(&self) -> Vec<(&str, &V)> {
        self.entries.iter().map(|(text, value)| (text.as_str(), value)).collect()
    }

    pub fn get(&self, text: &str) -> Option<&V> {
        self.entries.get(text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop the working list; rules and character set are kept.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Purify, merge and lay out the working list without consuming it.
    pub fn build_layout(&self) -> Result<Layout<V>, Error> {
        if self.entries.is_empty() {
            return Err(Error::EmptyTree);
        }

        let merged;
        let entries = match &self.charset {
            Some(charset) => {
                let (purified, stats) = merge_purified(&self.entries, charset, &self.rules)?;
                log::debug!(
                    "purified {} entries into {} ({} merged)",
                    stats.before,
                    stats.after,
                    stats.merged
                );
                merged = purified;
                &merged
            }
            None => &self.entries,
        };

        let sorted: Vec<(&String, &V)> = entries.iter().collect();
        let order = balanced_layout(sorted.len());
        let mut strings = Vec::with_capacity(order.len());
        let mut values = Vec::with_capacity(order.len());
        for index in order {
            match index.and_then(|i| sorted.get(i)) {
                Some((text, value)) => {
                    strings.push(Some((*text).clone()));
                    values.push(Some((*value).clone()));
                }
                None => {
                    strings.push(None);
                    values.push(None);
                }
            }
        }

        log::debug!(
            "laid out {} entries in {} slots",
            sorted.len(),
            strings.len()
        );
        Ok(Layout { strings, values })
    }
}

impl<P: EntryValue + Copy + Default> TreeBuilder<P> {
    /// Build the tree and start a fresh working list.
    pub fn build(&mut self) -> Result<Tree<P>, Error> {
        let Layout { strings, values } = self.build_layout()?;
        let payloads = values.into_iter().map(Option::unwrap_or_default).collect();
        let tree = Tree::from_slots(strings, payloads)?;
        log::debug!("built tree: {} entries, height {}", tree.len(), tree.height());
        self.reset();
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lays_out_seven_letters() {
        let mut builder: TreeBuilder<Rate> = TreeBuilder::new();
        for (letter, rate) in [("d", 4), ("b", 2), ("f", 6), ("a", 1), ("c", 3), ("e", 5), ("g", 7)] {
            builder.add(letter, rate).unwrap();
        }
        let tree = builder.build().unwrap();
        let layout: Vec<&str> = tree.slots().iter().flatten().map(String::as_str).collect();
        assert_eq!(layout, vec!["d", "b", "f", "a", "c", "e", "g"]);
        assert_eq!(tree.payloads(), &[4, 2, 6, 1, 3, 5, 7]);
        assert_eq!(tree.search("e").map(|m| m.payload), Some(5));
        assert!(tree.search("h").is_none());
        assert!(builder.is_empty());
    }

    #[test]
    fn layout_places_every_item_once() {
        for count in 1..=40 {
            let order = balanced_layout(count);
            assert_eq!(order.len() + 1, (count + 1).next_power_of_two());
            let mut placed: Vec<usize> = order.iter().flatten().copied().collect();
            placed.sort_unstable();
            assert_eq!(placed, (0..count).collect::<Vec<_>>(), "count {count}");
        }
    }

    #[test]
    fn layout_keeps_search_order() {
        let words: Vec<String> = (0..23).map(|i| format!("w{i:02}")).collect();
        let mut builder: TreeBuilder<Rate> = TreeBuilder::new();
        builder.add_all(&words, 1).unwrap();
        let tree = builder.build().unwrap();
        assert_eq!(tree.height(), 5);
        for word in &words {
            assert!(tree.contains(word), "{word} not found");
        }
        assert!(!tree.contains("w99"));
    }

    #[test]
    fn resolves_duplicates_per_policy() {
        let cases = [
            (ConflictPolicy::Overwrite, 3),
            (ConflictPolicy::Skip, 2),
            (ConflictPolicy::UseHighest, 3),
            (ConflictPolicy::UseLowest, 2),
        ];
        for (policy, expected) in cases {
            let mut builder: TreeBuilder<Rate> = TreeBuilder::new();
            builder.add("x", 2).unwrap().add_with("x", 3, policy).unwrap();
            assert_eq!(builder.get("x"), Some(&expected), "{policy}");
        }

        let mut builder: TreeBuilder<Rate> = TreeBuilder::new();
        builder.add("x", 2).unwrap();
        assert_eq!(
            builder.add("x", 3).unwrap_err(),
            Error::DuplicateEntry("x".to_string())
        );
    }

    #[test]
    fn rejects_empty_strings_and_trees() {
        let mut builder: TreeBuilder<Rate> = TreeBuilder::new();
        assert_eq!(builder.add("", 1).unwrap_err(), Error::InvalidString);
        assert_eq!(builder.remove([""]).unwrap_err(), Error::InvalidString);
        assert_eq!(builder.build().unwrap_err(), Error::EmptyTree);
    }

    #[test]
    fn removes_and_lists_entries() {
        let mut builder: TreeBuilder<Rate> = TreeBuilder::with_policy(ConflictPolicy::Skip);
        builder.add_all(["pear", "apple", "fig"], 1).unwrap();
        builder.remove(["fig", "kiwi"]).unwrap();
        assert_eq!(builder.list(), vec![("apple", &1), ("pear", &1)]);
    }

    #[test]
    fn string_only_duplicates_follow_the_policy() {
        let mut lenient: TreeBuilder<()> = TreeBuilder::with_policy(ConflictPolicy::Skip);
        lenient.add_all(["ok", "ok"], ()).unwrap();
        assert_eq!(lenient.build().unwrap().len(), 1);

        let mut strict: TreeBuilder<()> = TreeBuilder::new();
        strict.add("ok", ()).unwrap();
        assert!(strict.add("ok", ()).is_err());
    }

    #[test]
    fn failed_builds_keep_the_working_list() {
        let mut builder: TreeBuilder<Rate> = TreeBuilder::new();
        builder.add("a", 1).unwrap();
        let layout = builder.build_layout().unwrap();
        assert_eq!(layout.strings, vec![Some("a".to_string())]);
        assert_eq!(builder.len(), 1);
    }
}
