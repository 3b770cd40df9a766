//! Balanced, array-packed binary search tree
//!
//! Strings live in a flat slot array using 1-based heap indexing: the
//! children of logical node `i` are `2i` (lower) and `2i + 1` (higher), and
//! logical node `i` is stored at slot `i - 1`. The builder places the
//! median of every sorted range at the node that owns it, so the array is a
//! complete tree of height `ceil(log2(N + 1))` with vacant slots only on
//! the last level.
//!
//! Ordering is Rust's `str` ordering (Unicode code point order), which is
//! total and locale independent.

use std::cmp::Ordering;

use crate::error::Error;
use crate::types::Match;

// =============================================================================
// Tree
// =============================================================================

/// Immutable sorted-string index with one payload per node.
///
/// `P` is the per-node payload: a rate, a category mask, or `()` for
/// string-only trees such as whitelists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree<P> {
    strings: Vec<Option<String>>,
    payloads: Vec<P>,
    len: usize,
    min_chars: usize,
    max_chars: usize,
}

impl<P: Copy + Default> Tree<P> {
    /// Assemble a tree from slot arrays laid out by the builder.
    ///
    /// The slot count must be `2^h - 1` for some `h`; vacant slots are
    /// `None` and their payload is ignored.
    pub fn from_slots(strings: Vec<Option<String>>, mut payloads: Vec<P>) -> Result<Self, Error> {
        if !(strings.len() + 1).is_power_of_two() {
            return Err(Error::InvalidLayout(format!(
                "slot count {} is not a complete tree size",
                strings.len()
            )));
        }
        payloads.resize(strings.len(), P::default());

        let mut len = 0;
        let mut min_chars = usize::MAX;
        let mut max_chars = 0;
        for text in strings.iter().flatten() {
            if text.is_empty() {
                return Err(Error::InvalidString);
            }
            let chars = text.chars().count();
            min_chars = min_chars.min(chars);
            max_chars = max_chars.max(chars);
            len += 1;
        }
        if len == 0 {
            return Err(Error::EmptyTree);
        }

        Ok(Self {
            strings,
            payloads,
            len,
            min_chars,
            max_chars,
        })
    }
}

impl<P: Copy> Tree<P> {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots, vacant ones included.
    pub fn capacity(&self) -> usize {
        self.strings.len()
    }

    /// Number of levels in the tree.
    pub fn height(&self) -> u32 {
        (self.strings.len() + 1).trailing_zeros()
    }

    /// Shortest and longest entry length, in chars.
    pub fn length_bounds(&self) -> (usize, usize) {
        (self.min_chars, self.max_chars)
    }

    /// Whether a candidate of `chars` characters could be in the tree.
    #[inline]
    pub fn accepts_length(&self, chars: usize) -> bool {
        chars >= self.min_chars && chars <= self.max_chars
    }

    /// String stored at a 0-based slot.
    #[inline]
    pub fn string_at(&self, slot: usize) -> Option<&str> {
        self.strings.get(slot).and_then(|s| s.as_deref())
    }

    /// Payload stored at a 0-based slot.
    #[inline]
    pub fn payload_at(&self, slot: usize) -> Option<P> {
        self.string_at(slot)?;
        self.payloads.get(slot).copied()
    }

    /// Raw slot array, for serialization.
    pub fn slots(&self) -> &[Option<String>] {
        &self.strings
    }

    /// Raw payload array, parallel to `slots()`.
    pub fn payloads(&self) -> &[P] {
        &self.payloads
    }

    /// Exact lookup by iterative descent.
    pub fn search(&self, text: &str) -> Option<Match<P>> {
        if !self.accepts_length(text.chars().count()) {
            return None;
        }

        let mut node = 1;
        while node <= self.strings.len() {
            let slot = node - 1;
            let current = self.string_at(slot)?;
            match text.cmp(current) {
                Ordering::Equal => {
                    return Some(Match {
                        text: current.to_string(),
                        payload: self.payloads[slot],
                        slot,
                    });
                }
                Ordering::Greater => node = node * 2 + 1,
                Ordering::Less => node *= 2,
            }
        }
        None
    }

    pub fn contains(&self, text: &str) -> bool {
        self.search(text).is_some()
    }

    /// Occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, P)> + '_ {
        self.strings
            .iter()
            .zip(self.payloads.iter())
            .enumerate()
            .filter_map(|(slot, (text, payload))| text.as_deref().map(|t| (slot, t, *payload)))
    }

    /// Split off the payloads, leaving a string-only tree with the same layout.
    pub fn split_payloads(self) -> (Tree<()>, Vec<P>) {
        let unit = Tree {
            payloads: vec![(); self.strings.len()],
            strings: self.strings,
            len: self.len,
            min_chars: self.min_chars,
            max_chars: self.max_chars,
        };
        (unit, self.payloads)
    }
}

impl<P: Copy + Ord> Tree<P> {
    /// Materialize every entry in the requested order.
    ///
    /// Presentation only; the search path never sorts.
    pub fn list_entries(&self, order: &OrderOptions) -> Vec<Entry<P>> {
        let mut entries: Vec<Entry<P>> = self
            .iter()
            .map(|(_, text, payload)| Entry {
                text: text.to_string(),
                payload,
            })
            .collect();
        entries.sort_by(|a, b| order.compare(a, b));
        entries
    }
}

// =============================================================================
// Listing
// =============================================================================

/// A listed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<P> {
    pub text: String,
    pub payload: P,
}

/// Key used when listing entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Code point order of the text
    Text,
    /// Length in chars
    Length,
    /// Rate or other payload
    Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Composable sort order for `Tree::list_entries`.
///
/// Keys are compared in the order they were added; later keys break ties
/// left by earlier ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderOptions {
    keys: Vec<(SortKey, Direction)>,
}

impl OrderOptions {
    /// An order with no keys; entries keep slot order.
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    pub fn by(mut self, key: SortKey, direction: Direction) -> Self {
        self.keys.push((key, direction));
        self
    }

    pub fn keys(&self) -> &[(SortKey, Direction)] {
        &self.keys
    }

    fn compare<P: Ord>(&self, a: &Entry<P>, b: &Entry<P>) -> Ordering {
        for (key, direction) in &self.keys {
            let ordering = match key {
                SortKey::Text => a.text.cmp(&b.text),
                SortKey::Length => a.text.chars().count().cmp(&b.text.chars().count()),
                SortKey::Payload => a.payload.cmp(&b.payload),
            };
            let ordering = match direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl Default for OrderOptions {
    fn default() -> Self {
        Self::new().by(SortKey::Text, Direction::Ascending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// a..g laid out as the builder would place them.
    fn letters() -> Tree<i32> {
        let layout = ["d", "b", "f", "a", "c", "e", "g"];
        let rates = vec![4, 2, 6, 1, 3, 5, 7];
        Tree::from_slots(layout.iter().map(|s| Some(s.to_string())).collect(), rates).unwrap()
    }

    #[test]
    fn finds_every_letter_with_its_rate() {
        let tree = letters();
        for (letter, rate) in [("a", 1), ("b", 2), ("c", 3), ("d", 4), ("e", 5), ("f", 6), ("g", 7)] {
            let found = tree.search(letter).expect("letter should be found");
            assert_eq!(found.payload, rate);
            assert_eq!(found.text, letter);
        }
        assert!(tree.search("h").is_none());
        assert!(tree.search("0").is_none());
    }

    #[test]
    fn reports_height_and_capacity() {
        let tree = letters();
        assert_eq!(tree.len(), 7);
        assert_eq!(tree.capacity(), 7);
        assert_eq!(tree.height(), 3);
    }

    #[test]
    fn vacant_slots_end_the_descent() {
        let slots = vec![Some("m".to_string()), Some("c".to_string()), None];
        let tree = Tree::from_slots(slots, vec![1, 2, 0]).unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree.search("z").is_none());
        assert_eq!(tree.search("c").map(|m| m.slot), Some(1));
    }

    #[test]
    fn rejects_out_of_band_lengths() {
        let slots = vec![Some("bb".to_string()), Some("aa".to_string()), Some("ccc".to_string())];
        let tree = Tree::from_slots(slots, vec![0, 0, 0]).unwrap();
        assert_eq!(tree.length_bounds(), (2, 3));
        assert!(!tree.accepts_length(1));
        assert!(tree.search("a").is_none());
        assert!(tree.search("cccc").is_none());
        assert!(tree.contains("ccc"));
    }

    #[test]
    fn rejects_malformed_slot_arrays() {
        let empty: Vec<Option<String>> = vec![None];
        assert_eq!(Tree::<i32>::from_slots(empty, vec![]), Err(Error::EmptyTree));
        let blank = vec![Some(String::new())];
        assert_eq!(Tree::<i32>::from_slots(blank, vec![0]), Err(Error::InvalidString));
        let uneven = vec![Some("a".to_string()), None];
        assert!(matches!(
            Tree::<i32>::from_slots(uneven, vec![0, 0]),
            Err(Error::InvalidLayout(_))
        ));
    }

    #[test]
    fn lists_entries_by_composed_keys() {
        let slots = vec![
            Some("bb".to_string()),
            Some("a".to_string()),
            Some("ccc".to_string()),
        ];
        let tree = Tree::from_slots(slots, vec![2, 2, 1]).unwrap();

        let by_text: Vec<String> = tree
            .list_entries(&OrderOptions::default())
            .into_iter()
            .map(|e| e.text)
            .collect();
        assert_eq!(by_text, vec!["a", "bb", "ccc"]);

        let order = OrderOptions::new()
            .by(SortKey::Payload, Direction::Descending)
            .by(SortKey::Length, Direction::Descending);
        let listed: Vec<(String, i32)> = tree
            .list_entries(&order)
            .into_iter()
            .map(|e| (e.text, e.payload))
            .collect();
        assert_eq!(
            listed,
            vec![("bb".to_string(), 2), ("a".to_string(), 2), ("ccc".to_string(), 1)]
        );
    }

    #[test]
    fn splitting_payloads_keeps_layout() {
        let (unit, rates) = letters().split_payloads();
        assert_eq!(rates, vec![4, 2, 6, 1, 3, 5, 7]);
        assert_eq!(unit.search("e").map(|m| m.slot), Some(5));
    }
}
