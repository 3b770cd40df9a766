//! Core Matching Engine
//!
//! `Matcher::match_one` finds every tree entry reachable from a candidate by
//! single-character confusable substitutions, exploring alternate spellings
//! lazily from an explicit probe stack. `Matcher::scan` drives it over every
//! token window of an input text.

use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::charset::{CharacterSet, ReplacementTable};
use crate::error::Error;
use crate::text::{rewrite_forms, whitespace_tokens, windows, word_tokens};
use crate::tree::Tree;
use crate::types::{Match, PurifyAction, Rewrites, ScanResult};

/// Widest token window scanned by default.
pub const DEFAULT_SLICE_SIZE: usize = 3;

// =============================================================================
// Options
// =============================================================================

/// Query-time settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatcherOptions {
    /// Widest token window, in tokens; at least 1
    #[serde(deserialize_with = "positive_slice_size")]
    pub slice_size: usize,
    /// Normalization rewrites tried on every window
    pub rewrites: Rewrites,
    /// Also substitute canonical characters with their confusables
    pub reverse_substitutions: bool,
    /// Maximum probes popped per candidate; `None` is unbounded
    pub probe_limit: Option<usize>,
    /// Applied to query text in order before scanning
    pub purifiers: Vec<PurifyAction>,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            slice_size: DEFAULT_SLICE_SIZE,
            rewrites: Rewrites::ALL,
            reverse_substitutions: false,
            probe_limit: None,
            purifiers: Vec::new(),
        }
    }
}

impl MatcherOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if self.slice_size == 0 {
            return Err(Error::InvalidSliceSize);
        }
        Ok(())
    }
}

fn positive_slice_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let size = usize::deserialize(deserializer)?;
    if size == 0 {
        return Err(serde::de::Error::custom(Error::InvalidSliceSize));
    }
    Ok(size)
}

// =============================================================================
// Matcher
// =============================================================================

/// One in-flight spelling of the candidate.
#[derive(Debug)]
struct Probe {
    candidate: Vec<char>,
    /// 1-based logical node
    node: usize,
    /// Characters already known to match `node`'s string
    scan_pos: usize,
}

/// Result of comparing a probe against one node.
enum Step {
    Found,
    /// First differing position and the side to descend
    Branch { at: usize, higher: bool },
}

/// Read-only search over a tree, with optional whitelist and confusables.
///
/// Borrows everything; any number of matchers may share one tree.
#[derive(Debug, Clone)]
pub struct Matcher<'a, P> {
    tree: &'a Tree<P>,
    whitelist: Option<&'a Tree<()>>,
    charset: Option<&'a CharacterSet>,
    options: MatcherOptions,
}

impl<'a, P: Copy> Matcher<'a, P> {
    pub fn new(tree: &'a Tree<P>) -> Self {
        Self {
            tree,
            whitelist: None,
            charset: None,
            options: MatcherOptions::default(),
        }
    }

    /// Slices found in `whitelist` are never reported.
    pub fn with_whitelist(mut self, whitelist: &'a Tree<()>) -> Self {
        self.whitelist = Some(whitelist);
        self
    }

    /// Confusables used by the purifier pipeline and substitution search.
    pub fn with_character_set(mut self, charset: &'a CharacterSet) -> Self {
        self.charset = Some(charset);
        self
    }

    pub fn with_options(mut self, options: MatcherOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &MatcherOptions {
        &self.options
    }

    fn replacements(&self) -> Option<&'a ReplacementTable> {
        self.charset
            .map(|cs| cs.replacements(self.options.reverse_substitutions))
            .filter(|table| !table.is_empty())
    }

    /// Run the purifier pipeline over `text`.
    pub fn purify<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let Some(charset) = self.charset else {
            return Cow::Borrowed(text);
        };
        let mut current = Cow::Borrowed(text);
        for action in &self.options.purifiers {
            let changed = match action {
                PurifyAction::Allow => None,
                PurifyAction::Purify => into_owned(charset.purify(&current)),
                PurifyAction::Remove => into_owned(charset.remove(&current)),
            };
            if let Some(next) = changed {
                current = Cow::Owned(next);
            }
        }
        current
    }

    /// Every entry matching `candidate` exactly or through confusable
    /// substitutions, deduplicated by slot.
    pub fn match_one(&self, candidate: &str) -> Vec<Match<P>> {
        let chars: Vec<char> = candidate.chars().collect();
        // Substitutions never change the length.
        if !self.tree.accepts_length(chars.len()) {
            return Vec::new();
        }

        let replacements = self.replacements();
        let mut found = Vec::new();
        let mut found_slots = HashSet::new();
        let mut visited: HashSet<(Vec<char>, usize)> = HashSet::new();
        visited.insert((chars.clone(), 1));
        let mut stack = vec![Probe {
            candidate: chars,
            node: 1,
            scan_pos: 0,
        }];

        let mut popped = 0;
        while let Some(probe) = stack.pop() {
            if let Some(limit) = self.options.probe_limit {
                if popped >= limit {
                    log::warn!(
                        "probe limit {} reached for {:?}; {} probes left unexplored",
                        limit,
                        candidate,
                        stack.len() + 1
                    );
                    break;
                }
            }
            popped += 1;

            if let Some(slot) = self.walk(probe, replacements, &mut stack, &mut visited) {
                if found_slots.insert(slot) {
                    if let (Some(text), Some(payload)) =
                        (self.tree.string_at(slot), self.tree.payload_at(slot))
                    {
                        found.push(Match {
                            text: text.to_string(),
                            payload,
                            slot,
                        });
                    }
                }
            }
        }
        found
    }

    /// Descend from the probe's node, pushing alternate spellings at every
    /// first mismatch. Returns the slot of an exact hit.
    fn walk(
        &self,
        probe: Probe,
        replacements: Option<&ReplacementTable>,
        stack: &mut Vec<Probe>,
        visited: &mut HashSet<(Vec<char>, usize)>,
    ) -> Option<usize> {
        let Probe {
            candidate,
            mut node,
            mut scan_pos,
        } = probe;

        while node <= self.tree.capacity() {
            let slot = node - 1;
            let current = self.tree.string_at(slot)?;

            match compare_from(&candidate, current, scan_pos) {
                Step::Found => return Some(slot),
                Step::Branch { at, higher } => {
                    if let (Some(table), Some(&ch)) = (replacements, candidate.get(at)) {
                        for &alternative in table.alternatives(ch) {
                            let mut spelled = candidate.clone();
                            spelled[at] = alternative;
                            if visited.insert((spelled.clone(), node)) {
                                stack.push(Probe {
                                    candidate: spelled,
                                    node,
                                    scan_pos: at,
                                });
                            }
                        }
                    }
                    node = if higher { node * 2 + 1 } else { node * 2 };
                    scan_pos = 0;
                }
            }
        }
        None
    }

    /// Scan `text` for entries over every token window and rewrite.
    pub fn scan(&self, text: &str) -> ScanResult<P> {
        let purified = self.purify(text);
        let size = self.options.slice_size.max(1);

        let spaced = whitespace_tokens(&purified);
        let words = word_tokens(&purified);
        let mut slices = windows(spaced.as_slice(), size);
        slices.extend(windows(words.as_slice(), size));

        let mut matches = Vec::new();
        let mut found_slots = HashSet::new();
        let mut searched: HashSet<String> = HashSet::new();
        for slice in slices {
            if self.whitelist.is_some_and(|w| w.contains(&slice)) {
                continue;
            }
            for form in rewrite_forms(&slice, self.options.rewrites) {
                if !searched.insert(form.clone()) {
                    continue;
                }
                for found in self.match_one(&form) {
                    if found_slots.insert(found.slot) {
                        matches.push(found);
                    }
                }
            }
        }

        ScanResult {
            purified: purified.into_owned(),
            matches,
        }
    }
}

fn into_owned(text: Cow<'_, str>) -> Option<String> {
    match text {
        Cow::Owned(s) => Some(s),
        Cow::Borrowed(_) => None,
    }
}

/// Compare `candidate` with `current` from `from`, which both are known to
/// share as a prefix.
fn compare_from(candidate: &[char], current: &str, from: usize) -> Step {
    let mut theirs = current.chars().skip(from);
    let mut at = from;
    loop {
        match (candidate.get(at), theirs.next()) {
            (None, None) => return Step::Found,
            (None, Some(_)) => return Step::Branch { at, higher: false },
            (Some(_), None) => return Step::Branch { at, higher: true },
            (Some(&ours), Some(theirs_ch)) if ours != theirs_ch => {
                return Step::Branch {
                    at,
                    higher: ours > theirs_ch,
                };
            }
            _ => at += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::types::Rate;

    fn tree(layout: &[Option<&str>], rates: &[Rate]) -> Tree<Rate> {
        let strings = layout.iter().map(|s| s.map(str::to_string)).collect();
        Tree::from_slots(strings, rates.to_vec()).unwrap()
    }

    fn charset(groups: &[(&str, &str)]) -> CharacterSet {
        let groups: BTreeMap<String, Vec<String>> = groups
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.split(' ').map(str::to_string).collect()))
            .collect();
        CharacterSet::new(groups).unwrap()
    }

    /// bad, pie, zap
    fn food() -> Tree<Rate> {
        tree(&[Some("pie"), Some("bad"), Some("zap")], &[3, 1, 2])
    }

    #[test]
    fn matches_exactly_without_confusables() {
        let tree = food();
        let matcher = Matcher::new(&tree);
        let found = matcher.match_one("pie");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload, 3);
        assert!(matcher.match_one("p1e").is_empty());
        assert!(matcher.match_one("pies").is_empty());
    }

    #[test]
    fn substitutes_confusables_at_mismatches() {
        let tree = food();
        let cs = charset(&[("a", "4 @"), ("i", "1 !")]);
        let matcher = Matcher::new(&tree).with_character_set(&cs);

        assert_eq!(matcher.match_one("p1e")[0].text, "pie");
        assert_eq!(matcher.match_one("b4d")[0].text, "bad");
        assert_eq!(matcher.match_one("z@p")[0].payload, 2);
        assert!(matcher.match_one("p1g").is_empty());
    }

    #[test]
    fn substitutes_several_positions() {
        let tree = tree(&[Some("mama")], &[9]);
        let cs = charset(&[("a", "4 @")]);
        let matcher = Matcher::new(&tree).with_character_set(&cs);
        assert_eq!(matcher.match_one("m4m@").len(), 1);
    }

    #[test]
    fn reverse_substitutions_reach_unpurified_entries() {
        let tree = tree(&[Some("l33t")], &[1]);
        let cs = charset(&[("e", "3")]);

        let forward = Matcher::new(&tree).with_character_set(&cs);
        assert!(forward.match_one("leet").is_empty());

        let options = MatcherOptions {
            reverse_substitutions: true,
            ..MatcherOptions::default()
        };
        let both = Matcher::new(&tree).with_character_set(&cs).with_options(options);
        assert_eq!(both.match_one("leet").len(), 1);
        assert_eq!(both.match_one("l3et").len(), 1);
    }

    #[test]
    fn probe_limit_bounds_the_search() {
        let tree = tree(&[Some("aaaa")], &[1]);
        let cs = charset(&[("a", "4")]);
        let options = MatcherOptions {
            probe_limit: Some(1),
            ..MatcherOptions::default()
        };
        let capped = Matcher::new(&tree).with_character_set(&cs).with_options(options);
        assert!(capped.match_one("4444").is_empty());

        let unbounded = Matcher::new(&tree).with_character_set(&cs);
        assert_eq!(unbounded.match_one("4444").len(), 1);
    }

    #[test]
    fn scan_finds_obfuscated_tokens() {
        let tree = food();
        let cs = charset(&[("i", "1 !")]);
        let matcher = Matcher::new(&tree).with_character_set(&cs);

        let result = matcher.scan("I ate a p1e today");
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].text, "pie");
        assert_eq!(result.max_payload(), Some(3));

        assert!(!matcher.scan("I ate a cake today").has_match());
    }

    #[test]
    fn scan_runs_the_purifier_pipeline() {
        let tree = food();
        let cs = charset(&[("a", "4"), ("i", "1")]);
        let options = MatcherOptions {
            purifiers: vec![PurifyAction::Purify],
            ..MatcherOptions::default()
        };
        let matcher = Matcher::new(&tree).with_character_set(&cs).with_options(options);
        let result = matcher.scan("so b4d");
        assert_eq!(result.purified, "so bad");
        assert_eq!(result.matches[0].text, "bad");

        let options = MatcherOptions {
            purifiers: vec![PurifyAction::Remove],
            ..MatcherOptions::default()
        };
        let remover = Matcher::new(&tree).with_character_set(&cs).with_options(options);
        assert_eq!(remover.purify("b4d p1e"), "bd pe");
    }

    #[test]
    fn scan_joins_windows_and_applies_rewrites() {
        let tree = tree(&[Some("pie"), Some("bad pie"), Some("zap")], &[3, 5, 2]);
        let matcher = Matcher::new(&tree);

        let joined = matcher.scan("so bad   pie");
        let texts: Vec<&str> = joined.matches.iter().map(|m| m.text.as_str()).collect();
        assert!(texts.contains(&"bad pie"));
        assert!(texts.contains(&"pie"));

        assert_eq!(matcher.scan("zzzaaappp").matches[0].text, "zap");
        assert_eq!(matcher.scan("z.a.p").matches[0].text, "zap");
    }

    #[test]
    fn whitelisted_slices_are_skipped() {
        let tree = tree(&[Some("ass")], &[1]);
        let whitelist = Tree::from_slots(vec![Some("ass".to_string())], Vec::new()).unwrap();
        let options = MatcherOptions {
            rewrites: Rewrites::ORIGINAL,
            ..MatcherOptions::default()
        };

        let plain = Matcher::new(&tree).with_options(options.clone());
        assert!(plain.scan("kick ass").has_match());

        let guarded = Matcher::new(&tree).with_whitelist(&whitelist).with_options(options);
        assert!(!guarded.scan("kick ass").has_match());
    }

    #[test]
    fn options_load_from_camel_case_json() {
        let options: MatcherOptions =
            serde_json::from_str(r#"{"sliceSize": 5, "purifiers": ["purify", "remove"]}"#).unwrap();
        assert_eq!(options.slice_size, 5);
        assert_eq!(options.purifiers, vec![PurifyAction::Purify, PurifyAction::Remove]);
        assert_eq!(options.rewrites, Rewrites::ALL);
        assert_eq!(options.probe_limit, None);
    }

    #[test]
    fn zero_slice_size_is_rejected() {
        let err = serde_json::from_str::<MatcherOptions>(r#"{"sliceSize": 0}"#).unwrap_err();
        assert!(err.to_string().contains("Slice size must be at least 1"));

        let options = MatcherOptions {
            slice_size: 0,
            ..MatcherOptions::default()
        };
        assert_eq!(options.validate().unwrap_err(), Error::InvalidSliceSize);
        assert!(MatcherOptions::default().validate().is_ok());
    }
}
