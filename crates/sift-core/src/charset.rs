//! Confusable character sets
//!
//! A `CharacterSet` maps canonical characters to the confusable variants
//! that stand in for them. It is built once by `CharacterSetBuilder` (or
//! decoded from a snapshot) and is immutable afterwards.
//!
//! Invariant: no variant belongs to two canonical keys. Construction fails
//! with `Error::AmbiguousConfusable` instead of picking a winner, so
//! purification never depends on the order sources were merged in.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use regex::{NoExpand, Regex, RegexBuilder};

use crate::error::{AmbiguousConfusable, Error};

/// Upper bound on purification passes before giving up on a fixed point.
const MAX_PURIFY_PASSES: usize = 8;

/// Compiled size limit for the combined confusable pattern.
const PATTERN_SIZE_LIMIT: usize = 64 * 1024 * 1024;

// =============================================================================
// Character Set
// =============================================================================

#[derive(Debug, Clone)]
struct ConfusableGroup {
    key: String,
    variants: Vec<String>,
    pattern: Regex,
}

/// Immutable canonical-character substitution table.
#[derive(Debug, Clone)]
pub struct CharacterSet {
    groups: Vec<ConfusableGroup>,
    /// Matches any variant of any key; `None` when the set is empty
    any: Option<Regex>,
    canonical: HashMap<String, usize>,
    forward: ReplacementTable,
    bidirectional: ReplacementTable,
}

impl CharacterSet {
    /// A set with no confusables; purification is the identity.
    pub fn empty() -> Self {
        Self {
            groups: Vec::new(),
            any: None,
            canonical: HashMap::new(),
            forward: ReplacementTable::default(),
            bidirectional: ReplacementTable::default(),
        }
    }

    /// Compile a set from canonical key => variants groups.
    ///
    /// Groups are kept in key order, which is the order `purify` applies
    /// them in. Groups left without variants are dropped. A key may not
    /// contain any variant; `CharacterSetBuilder::refactor` folds the common
    /// case of a key listed as another key's variant.
    pub fn new(groups: BTreeMap<String, Vec<String>>) -> Result<Self, Error> {
        let mut owners: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (key, variants) in &groups {
            if key.is_empty() || variants.iter().any(|v| v.is_empty()) {
                return Err(Error::InvalidConfusable(key.clone()));
            }
            for variant in variants {
                let keys = owners.entry(variant.as_str()).or_default();
                if !keys.contains(&key.as_str()) {
                    keys.push(key.as_str());
                }
            }
        }

        let ambiguous: Vec<AmbiguousConfusable> = owners
            .iter()
            .filter(|(_, keys)| keys.len() > 1)
            .map(|(variant, keys)| AmbiguousConfusable {
                variant: variant.to_string(),
                keys: keys.iter().map(|k| k.to_string()).collect(),
            })
            .collect();
        if !ambiguous.is_empty() {
            return Err(Error::AmbiguousConfusable(ambiguous));
        }

        let mut compiled = Vec::with_capacity(groups.len());
        let mut canonical = HashMap::new();
        let mut all_variants = Vec::new();
        for (key, mut variants) in groups {
            variants.retain(|v| *v != key);
            variants.sort();
            variants.dedup();
            if variants.is_empty() {
                continue;
            }
            let index = compiled.len();
            for variant in &variants {
                canonical.insert(variant.clone(), index);
            }
            all_variants.extend(variants.iter().cloned());
            compiled.push(ConfusableGroup {
                pattern: alternation(&variants)?,
                key,
                variants,
            });
        }

        let any = if all_variants.is_empty() {
            None
        } else {
            Some(alternation(&all_variants)?)
        };

        // A key that contains a variant is rewritten again on the next pass.
        if let Some(re) = &any {
            if let Some(group) = compiled.iter().find(|g| re.is_match(&g.key)) {
                let variant = all_variants
                    .iter()
                    .find(|v| group.key.contains(v.as_str()))
                    .cloned()
                    .unwrap_or_default();
                return Err(Error::UnstableConfusable {
                    key: group.key.clone(),
                    variant,
                });
            }
        }

        let forward = ReplacementTable::from_groups(&compiled, false);
        let bidirectional = ReplacementTable::from_groups(&compiled, true);

        log::debug!(
            "compiled character set: {} keys, {} variants",
            compiled.len(),
            canonical.len()
        );

        Ok(Self {
            groups: compiled,
            any,
            canonical,
            forward,
            bidirectional,
        })
    }

    /// Number of canonical keys.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Canonical key => variants, in application order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.groups.iter().map(|g| (g.key.as_str(), g.variants.as_slice()))
    }

    /// Canonical key a variant stands in for.
    pub fn canonical(&self, variant: &str) -> Option<&str> {
        self.canonical.get(variant).map(|&i| self.groups[i].key.as_str())
    }

    /// Whether `text` contains any confusable.
    pub fn has_confusable(&self, text: &str) -> bool {
        self.any.as_ref().is_some_and(|re| re.is_match(text))
    }

    /// Replace every confusable with its canonical key.
    ///
    /// Keys are applied in order, each replacing its variants left to right
    /// without overlap. Passes repeat until no confusable remains, so the
    /// result is a fixed point: `purify(purify(s)) == purify(s)`.
    pub fn purify<'t>(&self, text: &'t str) -> Cow<'t, str> {
        if !self.has_confusable(text) {
            return Cow::Borrowed(text);
        }

        let mut current = text.to_string();
        for _ in 0..MAX_PURIFY_PASSES {
            for group in &self.groups {
                if group.pattern.is_match(&current) {
                    current = group
                        .pattern
                        .replace_all(&current, NoExpand(group.key.as_str()))
                        .into_owned();
                }
            }
            if !self.has_confusable(&current) {
                return Cow::Owned(current);
            }
        }

        log::warn!(
            "purification of {:?} did not settle after {} passes",
            text,
            MAX_PURIFY_PASSES
        );
        Cow::Owned(current)
    }

    /// Delete every confusable without canonicalizing.
    pub fn remove<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match &self.any {
            Some(re) => re.replace_all(text, ""),
            None => Cow::Borrowed(text),
        }
    }

    /// Single-character substitutions for the backtracking search.
    ///
    /// With `reverse` the table also maps canonical characters to their
    /// variants, which only helps trees that were not purified at build.
    pub fn replacements(&self, reverse: bool) -> &ReplacementTable {
        if reverse {
            &self.bidirectional
        } else {
            &self.forward
        }
    }
}

impl Default for CharacterSet {
    fn default() -> Self {
        Self::empty()
    }
}

fn alternation(variants: &[String]) -> Result<Regex, Error> {
    let mut ordered: Vec<&String> = variants.iter().collect();
    // Longest first so multi-char variants win over their prefixes.
    ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let pattern = ordered
        .iter()
        .map(|v| regex::escape(v))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&pattern)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map_err(|e| Error::Pattern(e.to_string()))
}

// =============================================================================
// Replacement Table
// =============================================================================

/// Ordered `(from, to)` single-character substitutions.
#[derive(Debug, Clone, Default)]
pub struct ReplacementTable {
    pairs: Vec<(char, char)>,
    index: HashMap<char, Vec<char>>,
}

impl ReplacementTable {
    fn from_groups(groups: &[ConfusableGroup], reverse: bool) -> Self {
        let mut table = Self::default();
        for group in groups {
            let Some(key) = single_char(&group.key) else {
                continue;
            };
            for variant in &group.variants {
                let Some(variant) = single_char(variant) else {
                    continue;
                };
                table.push(variant, key);
                if reverse {
                    table.push(key, variant);
                }
            }
        }
        table
    }

    /// Build a table from explicit pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (char, char)>) -> Self {
        let mut table = Self::default();
        for (from, to) in pairs {
            table.push(from, to);
        }
        table
    }

    fn push(&mut self, from: char, to: char) {
        if from == to {
            return;
        }
        let alternatives = self.index.entry(from).or_default();
        if !alternatives.contains(&to) {
            alternatives.push(to);
            self.pairs.push((from, to));
        }
    }

    /// Characters `ch` may be replaced with, in insertion order.
    #[inline]
    pub fn alternatives(&self, ch: char) -> &[char] {
        self.index.get(&ch).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn pairs(&self) -> &[(char, char)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let first = chars.next()?;
    chars.next().is_none().then_some(first)
}
