//! Category tree construction
//!
//! Entries carry a set of categories instead of a rate. Categories are
//! registered in first-seen order; at build time only the categories still
//! in use get a mask bit, so removed entries never cost a bit.

use sift_core::category::{CategoryTree, MAX_CATEGORIES};
use sift_core::charset::CharacterSet;
use sift_core::error::Error;
use sift_core::tree::Tree;

use crate::tree_builder::{EntryValue, Layout, MergeRules, TreeBuilder};

/// Registry positions carried by one entry, one bit each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategorySet(u64);

impl CategorySet {
    fn count(self) -> u32 {
        self.0.count_ones()
    }
}

impl EntryValue for CategorySet {
    fn validate(&self, text: &str, rules: &MergeRules) -> Result<(), Error> {
        if !rules.allow_multiple_categories && self.count() > 1 {
            return Err(Error::MultipleCategoriesNotAllowed(text.to_string()));
        }
        Ok(())
    }

    /// Union; rate policies do not apply to categories.
    fn merge(&mut self, text: &str, incoming: Self, rules: &MergeRules) -> Result<(), Error> {
        let union = CategorySet(self.0 | incoming.0);
        union.validate(text, rules)?;
        *self = union;
        Ok(())
    }
}

/// Registry capacity; anything past `MAX_CATEGORIES` fails at build.
const REGISTRY_BITS: usize = u64::BITS as usize;

#[derive(Debug, Clone)]
pub struct CategoryTreeBuilder<C> {
    inner: TreeBuilder<CategorySet>,
    registry: Vec<C>,
}

impl<C: Clone + PartialEq> CategoryTreeBuilder<C> {
    /// A builder that rejects a second category on one string.
    pub fn new() -> Self {
        Self::with_rules(MergeRules::default())
    }

    pub fn with_rules(rules: MergeRules) -> Self {
        Self {
            inner: TreeBuilder::with_rules(rules),
            registry: Vec::new(),
        }
    }

    pub fn allow_multiple_categories(allow: bool) -> Self {
        Self::with_rules(MergeRules {
            allow_multiple_categories: allow,
            ..MergeRules::default()
        })
    }

    pub fn set_character_set(&mut self, charset: CharacterSet) -> &mut Self {
        self.inner.set_character_set(charset);
        self
    }

    fn bit_for(&mut self, category: &C) -> Result<u64, Error> {
        let index = match self.registry.iter().position(|c| c == category) {
            Some(index) => index,
            None => {
                if self.registry.len() >= REGISTRY_BITS {
                    return Err(Error::CategoryOverflow(self.registry.len() + 1));
                }
                self.registry.push(category.clone());
                self.registry.len() - 1
            }
        };
        Ok(1 << index)
    }

    /// Tag `text` with `category`; re-adding a category is a no-op.
    pub fn add(&mut self, text: &str, category: C) -> Result<&mut Self, Error> {
        self.add_categories(text, [category])
    }

    /// Tag `text` with several categories at once; at least one is required.
    pub fn add_categories<I>(&mut self, text: &str, categories: I) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = C>,
    {
        let mut set = 0u64;
        for category in categories {
            set |= self.bit_for(&category)?;
        }
        if set == 0 {
            return Err(Error::MissingCategory(text.to_string()));
        }
        self.inner.add(text, CategorySet(set))?;
        Ok(self)
    }

    /// Tag many strings with one category.
    pub fn add_all<I, S>(&mut self, texts: I, category: C) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let bit = self.bit_for(&category)?;
        self.inner.add_all(texts, CategorySet(bit))?;
        Ok(self)
    }

    pub fn remove<I, S>(&mut self, texts: I) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.remove(texts)?;
        Ok(self)
    }

    fn decode(&self, set: CategorySet) -> Vec<C> {
        self.registry
            .iter()
            .enumerate()
            .filter(|(bit, _)| set.0 & (1u64 << *bit) != 0)
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Working entries with their categories, in text order.
    pub fn list(&self) -> Vec<(&str, Vec<C>)> {
        self.inner
            .list()
            .into_iter()
            .map(|(text, set)| (text, self.decode(*set)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Build the tree, packing masks at the narrowest width, and start fresh.
    pub fn build(&mut self) -> Result<CategoryTree<C>, Error> {
        let Layout { strings, values } = self.inner.build_layout()?;

        let used = values.iter().flatten().fold(0u64, |acc, set| acc | set.0);
        let used_count = used.count_ones() as usize;
        if used_count > MAX_CATEGORIES {
            return Err(Error::CategoryOverflow(used_count));
        }

        // Registry bit => compact bit, registry order preserved.
        let mut remap = [None; REGISTRY_BITS];
        let mut categories = Vec::with_capacity(used_count);
        for (bit, category) in self.registry.iter().enumerate() {
            if used & (1u64 << bit) != 0 {
                remap[bit] = Some(categories.len());
                categories.push(category.clone());
            }
        }

        let masks: Vec<u32> = values
            .iter()
            .map(|value| {
                let Some(set) = value else {
                    return 0;
                };
                remap
                    .iter()
                    .enumerate()
                    .filter(|(bit, _)| set.0 & (1u64 << *bit) != 0)
                    .filter_map(|(_, compact)| *compact)
                    .fold(0u32, |acc, compact| acc | (1u32 << compact))
            })
            .collect();

        let tree = CategoryTree::new(Tree::from_slots(strings, Vec::new())?, categories, &masks)?;
        self.inner.reset();
        self.registry.clear();
        Ok(tree)
    }
}

impl<C: Clone + PartialEq> Default for CategoryTreeBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}
