//! Sift Vocabulary Compiler
//!
//! Build-time half of sift: turns vocabulary entries and confusable data
//! into the immutable trees, character sets and filters that `sift-core`
//! queries, and serializes filters into SFT snapshots.

pub mod builder;
pub mod category_builder;
pub mod charset_builder;
pub mod filter_builder;
pub mod optimizer;
pub mod parser;
pub mod tree_builder;

pub use builder::build_snapshot;
pub use category_builder::CategoryTreeBuilder;
pub use charset_builder::{CharacterSetBuilder, ConfusableSource};
pub use filter_builder::{FilterBuilder, FilterOptions};
pub use optimizer::{merge_purified, MergeStats};
pub use parser::{
    parse_confusable_whitelist, parse_package_confusables, parse_unicode_confusables,
    parse_vocabulary_json, parse_vocabulary_lines, ConfusableTable, ParseError,
};
pub use tree_builder::{balanced_layout, EntryValue, MergeRules, TreeBuilder};
