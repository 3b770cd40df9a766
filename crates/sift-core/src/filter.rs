//! Owned filter bundle
//!
//! A `Filter` owns a blacklist tree, an optional whitelist, the character
//! set both were purified with, and the query options. It is what
//! `FilterBuilder` produces and what a snapshot decodes into.

use std::borrow::Cow;

use crate::charset::CharacterSet;
use crate::matcher::{Matcher, MatcherOptions};
use crate::tree::Tree;
use crate::types::ScanResult;

#[derive(Debug, Clone)]
pub struct Filter<P> {
    blacklist: Tree<P>,
    whitelist: Option<Tree<()>>,
    charset: CharacterSet,
    options: MatcherOptions,
}

impl<P: Copy> Filter<P> {
    pub fn new(
        blacklist: Tree<P>,
        whitelist: Option<Tree<()>>,
        charset: CharacterSet,
        options: MatcherOptions,
    ) -> Self {
        Self {
            blacklist,
            whitelist,
            charset,
            options,
        }
    }

    /// A matcher borrowing this filter's parts.
    pub fn matcher(&self) -> Matcher<'_, P> {
        let matcher = Matcher::new(&self.blacklist)
            .with_character_set(&self.charset)
            .with_options(self.options.clone());
        match &self.whitelist {
            Some(whitelist) => matcher.with_whitelist(whitelist),
            None => matcher,
        }
    }

    pub fn scan(&self, text: &str) -> ScanResult<P> {
        self.matcher().scan(text)
    }

    pub fn purify<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.matcher().purify(text)
    }

    pub fn blacklist(&self) -> &Tree<P> {
        &self.blacklist
    }

    pub fn whitelist(&self) -> Option<&Tree<()>> {
        self.whitelist.as_ref()
    }

    pub fn character_set(&self) -> &CharacterSet {
        &self.charset
    }

    pub fn options(&self) -> &MatcherOptions {
        &self.options
    }
}
