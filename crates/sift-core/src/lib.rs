//! Sift Core Library
//!
//! This crate provides the query-time engine for the sift string
//! classifier: given a vocabulary compiled into a balanced, array-packed
//! search tree, it reports which entries occur in an input text, including
//! spellings obfuscated with look-alike characters.
//!
//! # Architecture
//!
//! Everything here is immutable once built and can be shared across
//! threads without synchronization. Building happens in `sift-compiler`.
//!
//! # Modules
//!
//! - `tree`: `Tree<P>`, the sorted-string index with one payload per node
//! - `category`: `CategoryTree<C>`, a tree whose entries carry category masks
//! - `charset`: `CharacterSet` confusables and the substitution table
//! - `matcher`: backtracking substitution search and the text scanner
//! - `text`: tokenization, token windows and normalization rewrites
//! - `filter`: `Filter`, an owned bundle of everything a matcher borrows
//! - `snapshot`: SFT snapshot format and loader
//! - `checksum`: CRC32 for snapshot integrity
//! - `types`, `error`: shared definitions

pub mod category;
pub mod charset;
pub mod checksum;
pub mod error;
pub mod filter;
pub mod matcher;
pub mod snapshot;
pub mod text;
pub mod tree;
pub mod types;

// Re-export commonly used types
pub use category::{CategoryTree, MaskWidth, MAX_CATEGORIES};
pub use charset::{CharacterSet, ReplacementTable};
pub use error::{AmbiguousConfusable, Error};
pub use filter::Filter;
pub use matcher::{Matcher, MatcherOptions, DEFAULT_SLICE_SIZE};
pub use snapshot::{Snapshot, SnapshotError};
pub use tree::{Direction, Entry, OrderOptions, SortKey, Tree};
pub use types::{ConflictPolicy, Match, PurifyAction, Rate, Rewrites, ScanResult, SourceInclusion};
