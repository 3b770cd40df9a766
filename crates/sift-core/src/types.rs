//! Core type definitions for sift
//!
//! These types are shared by the builders in `sift-compiler` and the
//! matching engine, and several of them map directly onto fields of the
//! SFT snapshot format.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Numeric severity or rank attached to a vocabulary entry.
pub type Rate = i32;

// =============================================================================
// Conflict Policy
// =============================================================================

/// What to do when a string is added that already exists in a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictPolicy {
    /// Replace the stored rate with the new one
    Overwrite,
    /// Keep the lower of the two rates
    UseLowest,
    /// Keep the higher of the two rates
    UseHighest,
    /// Keep the stored rate, discard the new one
    Skip,
    /// Reject the duplicate
    #[default]
    ThrowError,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overwrite => "overwrite",
            Self::UseLowest => "useLowest",
            Self::UseHighest => "useHighest",
            Self::Skip => "skip",
            Self::ThrowError => "throwError",
        }
    }

    /// Resolve a duplicate rate for `text`, returning the rate to keep.
    pub fn resolve_rate(self, text: &str, existing: Rate, incoming: Rate) -> Result<Rate, Error> {
        match self {
            Self::Overwrite => Ok(incoming),
            Self::UseLowest => Ok(existing.min(incoming)),
            Self::UseHighest => Ok(existing.max(incoming)),
            Self::Skip => Ok(existing),
            Self::ThrowError => Err(Error::DuplicateEntry(text.to_string())),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = Error;

    /// Accepts `useHighest`, `use_highest`, `use-highest` and so on.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "uselowest" => Ok(Self::UseLowest),
            "usehighest" => Ok(Self::UseHighest),
            "skip" => Ok(Self::Skip),
            "throwerror" => Ok(Self::ThrowError),
            _ => Err(Error::InvalidConflictPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Purifier and Source Options
// =============================================================================

/// Action applied to confusable characters in query text before scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum PurifyAction {
    /// Leave confusables in place
    Allow = 0,
    /// Replace confusables with their canonical character
    #[default]
    Purify = 1,
    /// Delete confusables
    Remove = 2,
}

impl TryFrom<u8> for PurifyAction {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Allow),
            1 => Ok(Self::Purify),
            2 => Ok(Self::Remove),
            _ => Err(()),
        }
    }
}

impl FromStr for PurifyAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "purify" => Ok(Self::Purify),
            "remove" => Ok(Self::Remove),
            _ => Err(format!("Invalid purify action: {s}")),
        }
    }
}

/// Whether a confusable data source contributes to a character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceInclusion {
    #[default]
    Include,
    Exclude,
}

// =============================================================================
// Slice Rewrites (bit flags, applied in declaration order)
// =============================================================================

bitflags::bitflags! {
    /// Normalization rewrites applied to every scanned slice.
    ///
    /// Each enabled rewrite produces an independent search candidate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Rewrites: u16 {
        /// The slice as-is
        const ORIGINAL = 1 << 0;
        /// Drop non-word characters
        const STRIP_NON_WORD = 1 << 1;
        /// Drop whitespace
        const STRIP_WHITESPACE = 1 << 2;
        /// Reduce whitespace runs to one
        const COLLAPSE_WHITESPACE = 1 << 3;
        /// Reduce repeated word characters to one
        const COLLAPSE_WORD = 1 << 4;
        /// Reduce any repeated character to one
        const COLLAPSE_ANY = 1 << 5;
        /// Reduce whitespace runs of 3+ to two
        const CAP_WHITESPACE = 1 << 6;
        /// Reduce repeated word characters of 3+ to two
        const CAP_WORD = 1 << 7;
        /// Reduce any repeated character of 3+ to two
        const CAP_ANY = 1 << 8;
        /// Drop everything except ASCII letters and whitespace
        const STRIP_NON_LATIN = 1 << 9;
        /// Drop lowercase vowels
        const STRIP_VOWELS = 1 << 10;

        /// Every rewrite
        const ALL = 0x07FF;
    }
}

impl Default for Rewrites {
    fn default() -> Self {
        Self::ALL
    }
}

// =============================================================================
// Match Results
// =============================================================================

/// One vocabulary entry found by a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match<P> {
    /// The entry as stored in the tree (purified form)
    pub text: String,
    /// Rate, category mask or `()`
    pub payload: P,
    /// Tree slot the entry lives in; identifies the entry
    pub slot: usize,
}

/// Result of scanning a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult<P> {
    /// The text after the purifier pipeline
    pub purified: String,
    /// Distinct entries found, in discovery order
    pub matches: Vec<Match<P>>,
}

impl<P> ScanResult<P> {
    pub fn has_match(&self) -> bool {
        !self.matches.is_empty()
    }
}

impl<P: Copy + Ord> ScanResult<P> {
    /// Highest payload among the matches, if any.
    pub fn max_payload(&self) -> Option<P> {
        self.matches.iter().map(|m| m.payload).max()
    }
}
