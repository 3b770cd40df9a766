//! One-stop filter construction
//!
//! `FilterBuilder` owns a blacklist builder, a whitelist builder and a
//! confusables builder. `build` compiles the character set first, purifies
//! both trees with it and bundles everything into a `Filter`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sift_core::error::Error;
use sift_core::filter::Filter;
use sift_core::matcher::MatcherOptions;
use sift_core::types::{ConflictPolicy, PurifyAction, Rate, SourceInclusion};

use crate::category_builder::CategoryTreeBuilder;
use crate::charset_builder::{CharacterSetBuilder, ConfusableSource};
use crate::tree_builder::{MergeRules, TreeBuilder};

/// Build-time settings, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterOptions {
    pub conflict_policy: ConflictPolicy,
    /// Category mode for builders from `FilterBuilder::category_builder`
    pub allow_multiple_categories: bool,
    /// Purifier applied to query text when `matcher.purifiers` is empty
    pub confusables: PurifyAction,
    /// Inclusion per confusable source name; unlisted sources are included
    pub sources: BTreeMap<String, SourceInclusion>,
    pub matcher: MatcherOptions,
}

impl FilterOptions {
    pub fn merge_rules(&self) -> MergeRules {
        MergeRules {
            policy: self.conflict_policy,
            allow_multiple_categories: self.allow_multiple_categories,
        }
    }

    pub fn source_inclusion(&self, name: &str) -> SourceInclusion {
        self.sources.get(name).copied().unwrap_or_default()
    }

    /// The query-time purifier pipeline.
    pub fn purifiers(&self) -> Vec<PurifyAction> {
        if !self.matcher.purifiers.is_empty() {
            return self.matcher.purifiers.clone();
        }
        match self.confusables {
            PurifyAction::Allow => Vec::new(),
            action => vec![action],
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterBuilder {
    blacklist: TreeBuilder<Rate>,
    whitelist: TreeBuilder<()>,
    confusables: CharacterSetBuilder,
    options: FilterOptions,
}

impl FilterBuilder {
    pub fn new(options: FilterOptions) -> Self {
        Self {
            blacklist: TreeBuilder::with_rules(options.merge_rules()),
            whitelist: TreeBuilder::with_policy(ConflictPolicy::Skip),
            confusables: CharacterSetBuilder::new(),
            options,
        }
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    pub fn matcher_options_mut(&mut self) -> &mut MatcherOptions {
        &mut self.options.matcher
    }

    pub fn blacklist(&mut self) -> &mut TreeBuilder<Rate> {
        &mut self.blacklist
    }

    pub fn whitelist_builder(&mut self) -> &mut TreeBuilder<()> {
        &mut self.whitelist
    }

    pub fn confusables(&mut self) -> &mut CharacterSetBuilder {
        &mut self.confusables
    }

    pub fn add(&mut self, text: &str, rate: Rate) -> Result<&mut Self, Error> {
        self.blacklist.add(text, rate)?;
        Ok(self)
    }

    pub fn add_with(&mut self, text: &str, rate: Rate, policy: ConflictPolicy) -> Result<&mut Self, Error> {
        self.blacklist.add_with(text, rate, policy)?;
        Ok(self)
    }

    pub fn add_all<I, S>(&mut self, texts: I, rate: Rate) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.blacklist.add_all(texts, rate)?;
        Ok(self)
    }

    pub fn remove<I, S>(&mut self, texts: I) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.blacklist.remove(texts)?;
        Ok(self)
    }

    /// Strings never reported as matches.
    pub fn whitelist<I, S>(&mut self, texts: I) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.whitelist.add_all(texts, ())?;
        Ok(self)
    }

    pub fn add_confusables<I, S>(&mut self, key: &str, values: I) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.confusables.add_confusables(key, values)?;
        Ok(self)
    }

    /// Characters never treated as confusable.
    pub fn whitelist_confusables<I, S>(&mut self, characters: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.confusables.whitelist(characters);
        self
    }

    /// Merge a data source, honoring its configured inclusion.
    pub fn add_confusable_source(&mut self, source: &dyn ConfusableSource) -> Result<&mut Self, Error> {
        let inclusion = self.options.source_inclusion(source.name());
        self.confusables.add_source(source, inclusion)?;
        Ok(self)
    }

    pub fn refactor_confusables(&mut self) -> &mut Self {
        self.confusables.refactor();
        self
    }

    /// A category tree builder in the configured category mode, purifying
    /// with the confusables collected so far.
    pub fn category_builder<C: Clone + PartialEq>(&mut self) -> Result<CategoryTreeBuilder<C>, Error> {
        let mut builder = CategoryTreeBuilder::with_rules(self.options.merge_rules());
        builder.set_character_set(self.confusables.build()?);
        Ok(builder)
    }

    /// Compile everything into a filter.
    ///
    /// The blacklist and whitelist working lists are consumed; the
    /// confusables builder keeps its groups.
    pub fn build(&mut self) -> Result<Filter<Rate>, Error> {
        self.options.matcher.validate()?;
        let charset = self.confusables.build()?;
        log::debug!("character set: {} groups", charset.len());

        self.blacklist.set_character_set(charset.clone());
        let blacklist = self.blacklist.build()?;

        let whitelist = if self.whitelist.is_empty() {
            None
        } else {
            self.whitelist.set_character_set(charset.clone());
            Some(self.whitelist.build()?)
        };

        let mut matcher = self.options.matcher.clone();
        matcher.purifiers = self.options.purifiers();
        log::debug!(
            "filter: {} blacklisted, {} whitelisted, purifiers {:?}",
            blacklist.len(),
            whitelist.as_ref().map_or(0, |tree| tree.len()),
            matcher.purifiers
        );
        Ok(Filter::new(blacklist, whitelist, charset, matcher))
    }
}

impl Default for FilterBuilder {
    fn default() -> Self {
        Self::new(FilterOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_purified_entries() {
        let mut builder = FilterBuilder::default();
        builder.add("p1e", 3).unwrap();
        builder.add_confusables("i", ["1"]).unwrap();
        let filter = builder.build().unwrap();
        assert!(filter.blacklist().contains("pie"));
        assert_eq!(filter.scan("apple p1e").max_payload(), Some(3));
        assert_eq!(filter.scan("apple pie").max_payload(), Some(3));
        assert!(!filter.scan("apple tart").has_match());
    }

    #[test]
    fn whitelist_suppresses_matches() {
        let mut builder = FilterBuilder::default();
        builder.add("class", 1).unwrap();
        builder.whitelist(["class", "class"]).unwrap();
        let filter = builder.build().unwrap();
        assert!(!filter.scan("class").has_match());
    }

    #[test]
    fn purifiers_follow_the_confusables_action() {
        let allow = FilterOptions {
            confusables: PurifyAction::Allow,
            ..FilterOptions::default()
        };
        assert!(allow.purifiers().is_empty());
        assert_eq!(FilterOptions::default().purifiers(), vec![PurifyAction::Purify]);

        let mut explicit = FilterOptions::default();
        explicit.matcher.purifiers = vec![PurifyAction::Remove];
        assert_eq!(explicit.purifiers(), vec![PurifyAction::Remove]);
    }

    #[test]
    fn conflict_policy_reaches_the_blacklist() {
        let options = FilterOptions {
            conflict_policy: ConflictPolicy::UseHighest,
            ..FilterOptions::default()
        };
        let mut builder = FilterBuilder::new(options);
        builder.add("x", 2).unwrap().add("x", 5).unwrap();
        assert_eq!(builder.blacklist().get("x"), Some(&5));
    }

    #[test]
    fn loads_options_from_json() {
        let options: FilterOptions = serde_json::from_str(
            r#"{
                "conflictPolicy": "skip",
                "confusables": "remove",
                "sources": { "unicode": "exclude" },
                "matcher": { "sliceSize": 2 }
            }"#,
        )
        .unwrap();
        assert_eq!(options.conflict_policy, ConflictPolicy::Skip);
        assert_eq!(options.source_inclusion("unicode"), SourceInclusion::Exclude);
        assert_eq!(options.source_inclusion("package"), SourceInclusion::Include);
        assert_eq!(options.matcher.slice_size, 2);
        assert_eq!(options.purifiers(), vec![PurifyAction::Remove]);
    }

    #[test]
    fn build_fails_without_entries() {
        assert_eq!(FilterBuilder::default().build().unwrap_err(), Error::EmptyTree);
    }

    #[test]
    fn zero_slice_size_fails_the_build() {
        let mut builder = FilterBuilder::default();
        builder.add("pie", 1).unwrap();
        builder.matcher_options_mut().slice_size = 0;
        assert_eq!(builder.build().unwrap_err(), Error::InvalidSliceSize);

        builder.matcher_options_mut().slice_size = 1;
        assert_eq!(builder.build().unwrap().scan("pie").max_payload(), Some(1));
    }

    #[test]
    fn category_mode_reaches_category_builders() {
        let mut single = FilterBuilder::default();
        let mut tree = single.category_builder().unwrap();
        tree.add("tomato", "fruit").unwrap();
        assert_eq!(
            tree.add("tomato", "vegetable").unwrap_err(),
            Error::MultipleCategoriesNotAllowed("tomato".to_string())
        );

        let mut multiple = FilterBuilder::new(FilterOptions {
            allow_multiple_categories: true,
            ..FilterOptions::default()
        });
        multiple.add_confusables("o", ["0"]).unwrap();
        let mut tree = multiple.category_builder().unwrap();
        tree.add("tomat0", "fruit").unwrap().add("tomato", "vegetable").unwrap();
        let tree = tree.build().unwrap();
        assert_eq!(tree.search("tomato"), Some(vec!["fruit", "vegetable"]));
    }
}
