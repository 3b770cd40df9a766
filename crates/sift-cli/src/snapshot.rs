use std::fs;
use std::path::Path;
use std::time::Instant;

use sift_compiler::{
    build_snapshot, parse_confusable_whitelist, parse_package_confusables, parse_unicode_confusables,
    parse_vocabulary_json, parse_vocabulary_lines, FilterBuilder, FilterOptions,
};
use sift_core::snapshot::Snapshot;
use sift_core::Rate;

/// Files feeding one compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileInputs {
    /// Vocabulary lists; `.json` files use the JSON format, others `text[;rate]` lines
    pub vocabulary: Vec<String>,
    /// Strings exempt from matching, one per line
    pub whitelist: Vec<String>,
    /// Unicode `confusables.txt` files
    pub unicode_confusables: Vec<String>,
    /// Package JSON confusable files
    pub package_confusables: Vec<String>,
    /// Confusable whitelist JSON files
    pub confusable_whitelist: Vec<String>,
    /// `FilterOptions` JSON
    pub config: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompileStats {
    pub entries_read: usize,
    pub blacklisted: usize,
    pub whitelisted: usize,
    pub confusable_groups: usize,
    pub tree_height: u32,
    pub total_ms: f64,
}

pub fn load_options(path: Option<&str>) -> Result<FilterOptions, String> {
    let Some(path) = path else {
        return Ok(FilterOptions::default());
    };
    let content = read_text(path)?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid config '{}': {}", path, e))
}

fn read_text(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

fn read_vocabulary(path: &str) -> Result<Vec<(String, Rate)>, String> {
    let content = read_text(path)?;
    let is_json = Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        parse_vocabulary_json(&content)
    } else {
        parse_vocabulary_lines(&content)
    };
    parsed.map_err(|e| format!("Failed to parse '{}': {}", path, e))
}

pub fn compile_snapshot_bytes(inputs: &CompileInputs, verbose: bool) -> Result<(Vec<u8>, CompileStats), String> {
    if inputs.vocabulary.is_empty() {
        return Err("No vocabulary files specified".to_string());
    }

    let start = Instant::now();
    let options = load_options(inputs.config.as_deref())?;
    let mut builder = FilterBuilder::new(options);
    let mut entries_read = 0usize;

    for (index, path) in inputs.vocabulary.iter().enumerate() {
        let entries = read_vocabulary(path)?;
        if verbose {
            println!("  [{}] {} - {} entries", index, file_name(path), entries.len());
        }
        entries_read += entries.len();
        for (text, rate) in &entries {
            builder
                .add(text, *rate)
                .map_err(|e| format!("{}: {}", file_name(path), e))?;
        }
    }

    for path in &inputs.whitelist {
        let content = read_text(path)?;
        let strings = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));
        builder
            .whitelist(strings)
            .map_err(|e| format!("{}: {}", file_name(path), e))?;
    }

    for path in &inputs.unicode_confusables {
        let table = parse_unicode_confusables(&read_text(path)?)
            .map_err(|e| format!("Failed to parse '{}': {}", path, e))?;
        if verbose {
            println!("  {} - {} confusables", file_name(path), table.len());
        }
        builder.add_confusable_source(&table).map_err(|e| e.to_string())?;
    }

    for path in &inputs.package_confusables {
        let table = parse_package_confusables(&read_text(path)?)
            .map_err(|e| format!("Failed to parse '{}': {}", path, e))?;
        if verbose {
            println!("  {} - {} confusable groups", file_name(path), table.len());
        }
        builder.add_confusable_source(&table).map_err(|e| e.to_string())?;
    }

    for path in &inputs.confusable_whitelist {
        let characters = parse_confusable_whitelist(&read_text(path)?)
            .map_err(|e| format!("Failed to parse '{}': {}", path, e))?;
        builder.whitelist_confusables(characters);
    }

    let filter = builder.build().map_err(|e| e.to_string())?;
    let snapshot_bytes = build_snapshot(&filter);

    Snapshot::load(&snapshot_bytes)
        .map_err(|e| format!("Generated snapshot failed validation: {}", e))?;

    let stats = CompileStats {
        entries_read,
        blacklisted: filter.blacklist().len(),
        whitelisted: filter.whitelist().map_or(0, |tree| tree.len()),
        confusable_groups: filter.character_set().len(),
        tree_height: filter.blacklist().height(),
        total_ms: start.elapsed().as_secs_f64() * 1000.0,
    };

    Ok((snapshot_bytes, stats))
}

pub fn write_snapshot(path: &Path, bytes: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    fs::write(path, bytes)
        .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<Vec<u8>, String> {
    fs::read(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))
}
