//! Slice extraction and normalization rewrites
//!
//! Query text is tokenized twice (on whitespace, and on non-word
//! boundaries after whitespace is dropped), every contiguous token window
//! up to the slice size is joined with a single space, and each window is
//! rewritten into a handful of normalized candidate forms.

use crate::types::Rewrites;

/// Letter, digit or underscore.
#[inline]
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Tokens separated by whitespace.
pub fn whitespace_tokens(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Tokens of `text` with whitespace removed, split on non-word characters.
pub fn word_tokens(text: &str) -> Vec<String> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .split(|c: char| !is_word_char(c))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Every contiguous window of 1..=`slice_size` tokens, joined with a space.
///
/// Windows are produced shortest first, left to right.
pub fn windows<S: AsRef<str>>(tokens: &[S], slice_size: usize) -> Vec<String> {
    let widest = slice_size.min(tokens.len());
    let mut out = Vec::new();
    for width in 1..=widest {
        for window in tokens.windows(width) {
            let parts: Vec<&str> = window.iter().map(AsRef::as_ref).collect();
            out.push(parts.join(" "));
        }
    }
    out
}

/// Candidate forms of `slice`, one per enabled rewrite, deduplicated.
pub fn rewrite_forms(slice: &str, rewrites: Rewrites) -> Vec<String> {
    let mut forms: Vec<String> = Vec::new();
    for (flag, rewrite) in REWRITES {
        if !rewrites.contains(*flag) {
            continue;
        }
        let form = rewrite(slice);
        if !form.is_empty() && !forms.contains(&form) {
            forms.push(form);
        }
    }
    forms
}

type Rewrite = fn(&str) -> String;

/// Application order of the rewrites.
const REWRITES: &[(Rewrites, Rewrite)] = &[
    (Rewrites::ORIGINAL, |s| s.to_string()),
    (Rewrites::STRIP_NON_WORD, |s| s.chars().filter(|&c| is_word_char(c)).collect()),
    (Rewrites::STRIP_WHITESPACE, |s| s.chars().filter(|c| !c.is_whitespace()).collect()),
    (Rewrites::COLLAPSE_WHITESPACE, |s| limit_runs(s, 1, char::is_whitespace)),
    (Rewrites::COLLAPSE_WORD, |s| limit_runs(s, 1, is_word_char)),
    (Rewrites::COLLAPSE_ANY, |s| limit_runs(s, 1, |_| true)),
    (Rewrites::CAP_WHITESPACE, |s| limit_runs(s, 2, char::is_whitespace)),
    (Rewrites::CAP_WORD, |s| limit_runs(s, 2, is_word_char)),
    (Rewrites::CAP_ANY, |s| limit_runs(s, 2, |_| true)),
    (Rewrites::STRIP_NON_LATIN, |s| {
        s.chars()
            .filter(|c| c.is_ascii_alphabetic() || c.is_whitespace())
            .collect()
    }),
    (Rewrites::STRIP_VOWELS, |s| {
        s.chars().filter(|c| !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')).collect()
    }),
];

/// Shorten runs of one repeated character to at most `keep`, for
/// characters matching `class`.
fn limit_runs(text: &str, keep: usize, class: fn(char) -> bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous = None;
    let mut run = 0;
    for c in text.chars() {
        if previous == Some(c) {
            run += 1;
        } else {
            previous = Some(c);
            run = 1;
        }
        if run <= keep || !class(c) {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_two_ways() {
        let text = "a  big-bad\twolf!";
        assert_eq!(whitespace_tokens(text), vec!["a", "big-bad", "wolf!"]);
        assert_eq!(word_tokens(text), vec!["abig", "badwolf"]);
        assert!(word_tokens("  !! ").is_empty());
    }

    #[test]
    fn windows_are_bounded_by_slice_size() {
        let tokens = ["a", "b", "c"];
        assert_eq!(windows(&tokens[..], 2), vec!["a", "b", "c", "a b", "b c"]);
        assert_eq!(windows(&tokens[..], 10).len(), 6);
        assert!(windows(&tokens[..], 0).is_empty());
        assert!(windows::<&str>(&[], 3).is_empty());
    }

    #[test]
    fn limits_repeated_runs() {
        assert_eq!(limit_runs("baaad  dog", 1, is_word_char), "bad  dog");
        assert_eq!(limit_runs("baaad   dog", 2, char::is_whitespace), "baaad  dog");
        assert_eq!(limit_runs("!!!ooo", 2, |_| true), "!!oo");
    }

    #[test]
    fn produces_distinct_forms_in_order() {
        let forms = rewrite_forms("f.o o", Rewrites::ALL);
        assert_eq!(forms[0], "f.o o");
        assert!(forms.contains(&"foo".to_string()));
        assert!(forms.contains(&"f.oo".to_string()));
        assert!(forms.contains(&"fo o".to_string()));
        assert!(forms.contains(&"f. ".to_string()));

        let only = rewrite_forms("hello", Rewrites::ORIGINAL | Rewrites::STRIP_VOWELS);
        assert_eq!(only, vec!["hello", "hll"]);
    }

    #[test]
    fn drops_forms_that_vanish() {
        assert_eq!(rewrite_forms("aeiou", Rewrites::STRIP_VOWELS), Vec::<String>::new());
    }
}
