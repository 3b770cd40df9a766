//! Data-source parsers
//!
//! Turn vocabulary lists and confusable tables into plain
//! `(text, rate)` and `(key, variants)` data for the builders. Only the
//! text of the files is handled here; reading them is up to the caller.

use serde::Deserialize;

use sift_core::types::Rate;

use crate::charset_builder::ConfusableSource;

/// Rate given to vocabulary entries that carry none.
pub const DEFAULT_RATE: Rate = 0;

/// Source name of tables parsed from Unicode `confusables.txt`.
pub const UNICODE_SOURCE: &str = "unicode";

/// Source name of tables parsed from the package JSON format.
pub const PACKAGE_SOURCE: &str = "package";

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: {reason}")]
    Line { line: usize, reason: String },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
}

// =============================================================================
// Vocabulary
// =============================================================================

/// Parse `text[;rate]` lines. Blank lines and `#` comments are skipped.
pub fn parse_vocabulary_lines(text: &str) -> Result<Vec<(String, Rate)>, ParseError> {
    let mut entries = Vec::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (word, rate) = match line.rsplit_once(';') {
            Some((word, rate)) if !rate.trim().is_empty() => {
                let rate = rate.trim().parse::<Rate>().map_err(|_| ParseError::Line {
                    line: index + 1,
                    reason: format!("invalid rate {:?}", rate.trim()),
                })?;
                (word.trim(), rate)
            }
            Some((word, _)) => (word.trim(), DEFAULT_RATE),
            None => (line, DEFAULT_RATE),
        };
        if word.is_empty() {
            return Err(ParseError::Line {
                line: index + 1,
                reason: "empty entry".to_string(),
            });
        }
        entries.push((word.to_string(), rate));
    }

    Ok(entries)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VocabularyFile {
    words: Vec<WordGroup>,
    sentences: Vec<SentenceGroup>,
}

#[derive(Debug, Deserialize)]
struct WordGroup {
    rate: Rate,
    strings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SentenceGroup {
    rate: Rate,
    #[serde(default)]
    separator: String,
    variations: Vec<Vec<String>>,
}

/// Parse the JSON vocabulary format.
///
/// `sentences` are expanded into the cross product of their variation
/// lists joined by `separator`, with trailing whitespace trimmed and runs
/// of one repeated whitespace character collapsed.
pub fn parse_vocabulary_json(json: &str) -> Result<Vec<(String, Rate)>, ParseError> {
    let file: VocabularyFile = serde_json::from_str(json)?;
    let mut entries = Vec::new();

    for group in file.words {
        entries.extend(
            group
                .strings
                .into_iter()
                .filter(|s| !s.is_empty())
                .map(|s| (s, group.rate)),
        );
    }

    for group in file.sentences {
        let separator = group.separator.as_str();
        let mut variations = group.variations.iter();
        let Some(first) = variations.next() else {
            continue;
        };
        let mut sentences = first.clone();
        for options in variations {
            sentences = sentences
                .iter()
                .flat_map(|head| {
                    options
                        .iter()
                        .map(move |tail| format!("{head}{separator}{tail}").trim_end().to_string())
                })
                .collect();
        }
        entries.extend(
            sentences
                .into_iter()
                .map(|s| collapse_repeated_whitespace(&s))
                .filter(|s| !s.is_empty())
                .map(|s| (s, group.rate)),
        );
    }

    Ok(entries)
}

fn collapse_repeated_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = None;
    for c in text.chars() {
        if c.is_whitespace() && last == Some(c) {
            continue;
        }
        out.push(c);
        last = Some(c);
    }
    out
}

// =============================================================================
// Confusables
// =============================================================================

/// Parsed confusable data, usable as a `ConfusableSource`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfusableTable {
    name: String,
    groups: Vec<(String, Vec<String>)>,
    whitelist: Vec<String>,
}

impl ConfusableTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_whitelist(mut self, whitelist: Vec<String>) -> Self {
        self.whitelist = whitelist;
        self
    }

    fn push(&mut self, key: &str, variants: impl IntoIterator<Item = String>) {
        let variants: Vec<String> = variants.into_iter().filter(|v| !v.is_empty()).collect();
        if key.is_empty() || variants.is_empty() {
            return;
        }
        self.groups.push((key.to_string(), variants));
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl ConfusableSource for ConfusableTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn groups(&self) -> Vec<(String, Vec<String>)> {
        self.groups.clone()
    }

    fn whitelist(&self) -> Vec<String> {
        self.whitelist.clone()
    }
}

/// Parse Unicode `confusables.txt`: `source ; target ; type # comment`,
/// each side a run of hex code points. The target is the key, the source
/// its variant.
pub fn parse_unicode_confusables(text: &str) -> Result<ConfusableTable, ParseError> {
    let mut table = ConfusableTable::new(UNICODE_SOURCE);
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split(';');
        let (Some(source), Some(target)) = (fields.next(), fields.next()) else {
            return Err(ParseError::Line {
                line: index + 1,
                reason: "expected `source ; target`".to_string(),
            });
        };
        let variant = decode_code_points(source).map_err(|reason| ParseError::Line {
            line: index + 1,
            reason,
        })?;
        let key = decode_code_points(target).map_err(|reason| ParseError::Line {
            line: index + 1,
            reason,
        })?;
        table.push(&key, [variant]);
    }

    log::debug!("parsed {} unicode confusables", table.len());
    Ok(table)
}

fn decode_code_points(field: &str) -> Result<String, String> {
    field
        .split_whitespace()
        .map(|hex| {
            u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| format!("invalid code point {hex:?}"))
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PackageConfusables {
    alphabet_sets: Vec<AlphabetSet>,
    number_set: Vec<Vec<String>>,
    parallel_character_set: ParallelCharacterSet,
    serial_character_sets: Vec<SerialCharacterSet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AlphabetSet {
    alphabet: Vec<String>,
    character_set: Vec<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ParallelCharacterSet {
    replacement_set: Vec<String>,
    character_set: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SerialCharacterSet {
    replacement: String,
    character_set: Vec<String>,
}

/// Parse the package JSON confusables format.
///
/// * `alphabetSets`: row `r` of `characterSet` spells the alphabet, so
///   `characterSet[r][j]` is a variant of `alphabet[j]`.
/// * `numberSet`: entry `j` of each row is a variant of the digit `j`.
/// * `parallelCharacterSet`: `characterSet[i]` is a variant of
///   `replacementSet[i]`.
/// * `serialCharacterSets`: every character is a variant of `replacement`.
///
/// Empty cells are skipped.
pub fn parse_package_confusables(json: &str) -> Result<ConfusableTable, ParseError> {
    let package: PackageConfusables = serde_json::from_str(json)?;
    let mut table = ConfusableTable::new(PACKAGE_SOURCE);

    for set in &package.alphabet_sets {
        for (j, letter) in set.alphabet.iter().enumerate() {
            table.push(letter, set.character_set.iter().filter_map(|row| row.get(j).cloned()));
        }
    }

    for row in &package.number_set {
        for (digit, variant) in row.iter().enumerate() {
            table.push(&digit.to_string(), [variant.clone()]);
        }
    }

    let parallel = &package.parallel_character_set;
    if parallel.replacement_set.len() != parallel.character_set.len() {
        return Err(ParseError::Invalid(format!(
            "parallelCharacterSet has {} replacements for {} characters",
            parallel.replacement_set.len(),
            parallel.character_set.len()
        )));
    }
    for (key, variant) in parallel.replacement_set.iter().zip(&parallel.character_set) {
        table.push(key, [variant.clone()]);
    }

    for set in package.serial_character_sets {
        table.push(&set.replacement, set.character_set);
    }

    log::debug!("parsed {} package confusable groups", table.len());
    Ok(table)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WhitelistFile {
    characters: Vec<String>,
    ranges: Vec<Vec<String>>,
}

/// Parse a confusables whitelist: `characters`, plus `ranges` of
/// `[first, last)` characters.
pub fn parse_confusable_whitelist(json: &str) -> Result<Vec<String>, ParseError> {
    let file: WhitelistFile = serde_json::from_str(json)?;
    let mut characters: Vec<String> = file.characters.into_iter().filter(|c| !c.is_empty()).collect();

    for range in &file.ranges {
        let bounds: Option<(char, char)> = match range.as_slice() {
            [first, last] => first.chars().next().zip(last.chars().next()),
            _ => None,
        };
        let Some((first, last)) = bounds else {
            return Err(ParseError::Invalid(format!(
                "whitelist range {range:?} needs two non-empty values"
            )));
        };
        characters.extend((first..last).map(String::from));
    }

    Ok(characters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vocabulary_lines() {
        let text = "# comment\npie;3\n\n  cake  \ntart ; -2\nfig;\n";
        assert_eq!(
            parse_vocabulary_lines(text).unwrap(),
            vec![
                ("pie".to_string(), 3),
                ("cake".to_string(), 0),
                ("tart".to_string(), -2),
                ("fig".to_string(), 0),
            ]
        );
    }

    #[test]
    fn reports_bad_vocabulary_lines() {
        let err = parse_vocabulary_lines("ok\nbad;high").unwrap_err();
        assert!(matches!(err, ParseError::Line { line: 2, .. }), "{err}");
        assert!(parse_vocabulary_lines(";4").is_err());
    }

    #[test]
    fn expands_sentences() {
        let json = r#"{
            "words": [{ "rate": 2, "strings": ["pie", ""] }],
            "sentences": [{
                "rate": 5,
                "separator": " ",
                "variations": [["apple", "cherry"], ["pie", ""], ["", "slice"]]
            }]
        }"#;
        let entries = parse_vocabulary_json(json).unwrap();
        let texts: Vec<&str> = entries.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "pie",
                "apple pie",
                "apple pie slice",
                "apple",
                "apple slice",
                "cherry pie",
                "cherry pie slice",
                "cherry",
                "cherry slice",
            ]
        );
        assert!(entries[1..].iter().all(|(_, rate)| *rate == 5));
    }

    #[test]
    fn parses_unicode_confusables() {
        let text = "\u{feff}# confusables.txt\n\
                    0031 ;\t006C ;\tMA\t# ( 1 → l ) DIGIT ONE → LATIN SMALL LETTER L\n\
                    0049 ;\t006C ;\tMA\t#\n\
                    2474 ;\t0028 0031 0029 ;\tMA\t#\n";
        let table = parse_unicode_confusables(text).unwrap();
        assert_eq!(table.name(), UNICODE_SOURCE);
        assert_eq!(
            table.groups(),
            vec![
                ("l".to_string(), vec!["1".to_string()]),
                ("l".to_string(), vec!["I".to_string()]),
                ("(1)".to_string(), vec!["⑴".to_string()]),
            ]
        );
        assert!(matches!(
            parse_unicode_confusables("zz ; 006C ;"),
            Err(ParseError::Line { line: 1, .. })
        ));
    }

    #[test]
    fn parses_package_confusables() {
        let json = r#"{
            "alphabetSets": [{ "alphabet": ["a", "b"], "characterSet": [["α", "β"], ["@", ""]] }],
            "numberSet": [["o", "l"]],
            "parallelCharacterSet": { "replacementSet": ["e"], "characterSet": ["3"] },
            "serialCharacterSets": [{ "replacement": "x", "characterSet": ["×", "✕"] }]
        }"#;
        let table = parse_package_confusables(json).unwrap();
        assert_eq!(
            table.groups(),
            vec![
                ("a".to_string(), vec!["α".to_string(), "@".to_string()]),
                ("b".to_string(), vec!["β".to_string()]),
                ("0".to_string(), vec!["o".to_string()]),
                ("1".to_string(), vec!["l".to_string()]),
                ("e".to_string(), vec!["3".to_string()]),
                ("x".to_string(), vec!["×".to_string(), "✕".to_string()]),
            ]
        );
    }

    #[test]
    fn parses_whitelist_ranges() {
        let json = r#"{ "characters": ["@"], "ranges": [["a", "d"]] }"#;
        assert_eq!(parse_confusable_whitelist(json).unwrap(), vec!["@", "a", "b", "c"]);
        assert!(parse_confusable_whitelist(r#"{ "ranges": [["a", ""]] }"#).is_err());
        assert!(matches!(
            parse_confusable_whitelist("{"),
            Err(ParseError::Json(_))
        ));
    }
}
