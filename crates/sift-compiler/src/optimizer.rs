use std::collections::BTreeMap;

use sift_core::charset::CharacterSet;
use sift_core::error::Error;

use crate::tree_builder::{EntryValue, MergeRules};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub before: usize,
    pub after: usize,
    /// Entries folded into another after purification
    pub merged: usize,
    /// Entries whose text changed
    pub purified: usize,
}

/// Purify every entry and merge the ones that collide.
///
/// Collisions are resolved with `rules` in the code point order of the
/// unpurified texts, so the result never depends on insertion order.
pub fn merge_purified<V: EntryValue>(
    entries: &BTreeMap<String, V>,
    charset: &CharacterSet,
    rules: &MergeRules,
) -> Result<(BTreeMap<String, V>, MergeStats), Error> {
    let before = entries.len();
    let mut merged = 0usize;
    let mut purified = 0usize;
    let mut out: BTreeMap<String, V> = BTreeMap::new();

    for (text, value) in entries {
        let clean = charset.purify(text);
        if clean != text.as_str() {
            purified += 1;
        }
        match out.get_mut(clean.as_ref()) {
            Some(existing) => {
                existing.merge(&clean, value.clone(), rules)?;
                merged += 1;
            }
            None => {
                out.insert(clean.into_owned(), value.clone());
            }
        }
    }

    let stats = MergeStats {
        before,
        after: out.len(),
        merged,
        purified,
    };
    Ok((out, stats))
}
