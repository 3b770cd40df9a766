//! Character set construction
//!
//! `CharacterSetBuilder` merges confusable groups from any number of
//! sources, folds keys that are themselves listed as someone else's
//! confusable, drops whitelisted variants and compiles a `CharacterSet`.

use std::collections::{BTreeMap, BTreeSet};

use sift_core::charset::CharacterSet;
use sift_core::error::Error;
use sift_core::types::SourceInclusion;

/// A provider of `key => variants` confusable groups.
pub trait ConfusableSource {
    /// Name used to look up the source's inclusion setting.
    fn name(&self) -> &str;

    fn groups(&self) -> Vec<(String, Vec<String>)>;

    /// Characters the source asks never to treat as confusable.
    fn whitelist(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CharacterSetBuilder {
    groups: BTreeMap<String, Vec<String>>,
    whitelist: BTreeSet<String>,
}

impl CharacterSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `values` as confusables of `key`.
    pub fn add_confusables<I, S>(&mut self, key: &str, values: I) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if key.is_empty() {
            return Err(Error::InvalidConfusable(String::new()));
        }
        let values: Vec<String> = values.into_iter().map(|v| v.as_ref().to_string()).collect();
        if values.iter().any(String::is_empty) {
            return Err(Error::InvalidConfusable(key.to_string()));
        }
        self.groups.entry(key.to_string()).or_default().extend(values);
        Ok(self)
    }

    /// Register every group of a `key => variants` map.
    pub fn add_set<'s, I>(&mut self, set: I) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = (&'s String, &'s Vec<String>)>,
    {
        for (key, values) in set {
            self.add_confusables(key, values)?;
        }
        Ok(self)
    }

    /// Merge a data source unless it is excluded.
    pub fn add_source(
        &mut self,
        source: &dyn ConfusableSource,
        inclusion: SourceInclusion,
    ) -> Result<&mut Self, Error> {
        if inclusion == SourceInclusion::Exclude {
            log::debug!("skipping excluded confusable source {}", source.name());
            return Ok(self);
        }
        let groups = source.groups();
        log::debug!("adding {} confusable groups from {}", groups.len(), source.name());
        for (key, values) in groups {
            self.add_confusables(&key, values)?;
        }
        self.whitelist(source.whitelist());
        Ok(self)
    }

    /// Characters that are never treated as confusable.
    pub fn whitelist<I, S>(&mut self, characters: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.whitelist.extend(
            characters
                .into_iter()
                .map(|c| c.as_ref().to_string())
                .filter(|c| !c.is_empty()),
        );
        self
    }

    /// Whitelist every character in `[first, last)`.
    pub fn whitelist_range(&mut self, first: char, last: char) -> &mut Self {
        self.whitelist((first..last).map(String::from))
    }

    /// Fold every key that appears as another key's variant into that key,
    /// until no key is listed as a variant, then dedupe each group.
    pub fn refactor(&mut self) -> &mut Self {
        let mut folds = 0usize;
        while let Some((into, from)) = self.find_nested_key() {
            if let Some(moved) = self.groups.remove(&from) {
                if let Some(target) = self.groups.get_mut(&into) {
                    target.extend(moved);
                }
            }
            folds += 1;
        }

        for (key, variants) in self.groups.iter_mut() {
            variants.retain(|v| v != key);
            variants.sort();
            variants.dedup();
        }
        self.groups.retain(|_, variants| !variants.is_empty());

        if folds > 0 {
            log::debug!("refactor folded {} keys into others", folds);
        }
        self
    }

    /// First `(key, nested)` pair where `nested` is a key listed under `key`.
    fn find_nested_key(&self) -> Option<(String, String)> {
        self.groups.iter().find_map(|(key, variants)| {
            variants
                .iter()
                .find(|v| *v != key && self.groups.contains_key(v.as_str()))
                .map(|nested| (key.clone(), nested.clone()))
        })
    }

    /// Drop every group and whitelist entry.
    pub fn clear(&mut self) -> &mut Self {
        self.groups.clear();
        self.whitelist.clear();
        self
    }

    /// Current groups, for inspection.
    pub fn groups(&self) -> &BTreeMap<String, Vec<String>> {
        &self.groups
    }

    /// Refactor, apply the whitelist and compile.
    ///
    /// Fails with `Error::AmbiguousConfusable` if a variant is still claimed
    /// by two keys.
    pub fn build(&mut self) -> Result<CharacterSet, Error> {
        self.refactor();

        let mut groups = self.groups.clone();
        if !self.whitelist.is_empty() {
            let mut dropped = 0usize;
            for variants in groups.values_mut() {
                let before = variants.len();
                variants.retain(|v| !self.whitelist.iter().any(|w| v.contains(w.as_str())));
                dropped += before - variants.len();
            }
            groups.retain(|_, variants| !variants.is_empty());
            log::debug!("whitelist removed {} confusables", dropped);
        }

        CharacterSet::new(groups)
    }
}
