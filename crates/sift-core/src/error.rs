//! Build-time error taxonomy shared by the builders and the engine.
//!
//! Every variant is raised synchronously while constructing a tree or a
//! character set. Query-time operations (`search`, `scan`) never fail.

/// Error type for tree and character set construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("String must contain at least one character")]
    InvalidString,
    #[error("Cannot add existing string \"{0}\" because the conflict policy is set to throwError")]
    DuplicateEntry(String),
    #[error("Invalid conflict policy: {0}")]
    InvalidConflictPolicy(String),
    #[error("Tree contains no strings")]
    EmptyTree,
    #[error("Too many categories: {0} (at most 32 fit in a node mask)")]
    CategoryOverflow(usize),
    #[error("String \"{0}\" cannot carry more than one category")]
    MultipleCategoriesNotAllowed(String),
    #[error("Character set contains values assigned to multiple keys: {}", format_ambiguous(.0))]
    AmbiguousConfusable(Vec<AmbiguousConfusable>),
    #[error("Expected a built character set: {0}")]
    InvalidCharacterSetType(String),
    #[error("Invalid confusable for key \"{0}\": keys and values cannot be empty")]
    InvalidConfusable(String),
    #[error("String \"{0}\" must carry at least one category")]
    MissingCategory(String),
    #[error("Slice size must be at least 1")]
    InvalidSliceSize,
    #[error("Key \"{key}\" contains confusable \"{variant}\", so purification cannot settle")]
    UnstableConfusable { key: String, variant: String },
    #[error("Invalid tree layout: {0}")]
    InvalidLayout(String),
    #[error("Failed to compile confusable pattern: {0}")]
    Pattern(String),
}

/// A variant claimed by more than one canonical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousConfusable {
    pub variant: String,
    pub keys: Vec<String>,
}

fn format_ambiguous(list: &[AmbiguousConfusable]) -> String {
    list.iter()
        .map(|item| format!("'{}' => [{}]", item.variant, item.keys.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_message_lists_every_key() {
        let err = Error::AmbiguousConfusable(vec![AmbiguousConfusable {
            variant: "1".to_string(),
            keys: vec!["i".to_string(), "l".to_string()],
        }]);
        assert_eq!(
            err.to_string(),
            "Character set contains values assigned to multiple keys: '1' => [i, l]"
        );
    }
}
