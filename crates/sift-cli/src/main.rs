//! Sift CLI
//!
//! CLI tool for compiling vocabularies into SFT snapshots and querying them.

mod snapshot;

use std::io::Read;
use std::path::Path;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use sift_core::snapshot::{SectionId, Snapshot};
use sift_core::{Direction, OrderOptions, Rate, SortKey};

use crate::snapshot::{compile_snapshot_bytes, read_snapshot, write_snapshot, CompileInputs};

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Confusable-aware vocabulary compiler and scanner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile vocabularies and confusable data into an SFT snapshot
    Compile {
        /// Vocabulary files (`.json`, or `text[;rate]` lines)
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Whitelisted strings, one per line
        #[arg(short, long)]
        whitelist: Vec<String>,

        /// Unicode confusables.txt files
        #[arg(long)]
        unicode_confusables: Vec<String>,

        /// Package JSON confusable files
        #[arg(long)]
        package_confusables: Vec<String>,

        /// Confusable whitelist JSON files
        #[arg(long)]
        confusable_whitelist: Vec<String>,

        /// Build options JSON
        #[arg(short, long)]
        config: Option<String>,

        /// Output snapshot file
        #[arg(short, long, default_value = "vocabulary.sft")]
        output: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate an SFT snapshot
    Validate {
        /// Snapshot file to validate
        #[arg(short, long)]
        input: String,
    },

    /// Dump snapshot info
    Info {
        /// Snapshot file to inspect
        #[arg(short, long)]
        input: String,
    },

    /// Scan text against a snapshot
    Scan {
        /// Snapshot file
        #[arg(short, long)]
        input: String,

        /// Text to scan; read from stdin when omitted
        text: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the entries of a snapshot
    List {
        /// Snapshot file
        #[arg(short, long)]
        input: String,

        /// Sort key
        #[arg(short, long, value_enum, default_value_t = ListOrder::Text)]
        sort: ListOrder,

        /// Sort descending
        #[arg(long)]
        desc: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ListOrder {
    Text,
    Length,
    Rate,
}

#[derive(Serialize)]
struct ScanReport<'a> {
    purified: &'a str,
    matches: Vec<MatchReport<'a>>,
}

#[derive(Serialize)]
struct MatchReport<'a> {
    text: &'a str,
    rate: Rate,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            input,
            whitelist,
            unicode_confusables,
            package_confusables,
            confusable_whitelist,
            config,
            output,
            verbose,
        } => {
            let inputs = CompileInputs {
                vocabulary: input,
                whitelist,
                unicode_confusables,
                package_confusables,
                confusable_whitelist,
                config,
            };
            cmd_compile(&inputs, &output, verbose)
        }
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Info { input } => cmd_info(&input),
        Commands::Scan { input, text, json } => cmd_scan(&input, &text, json),
        Commands::List { input, sort, desc } => cmd_list(&input, sort, desc),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_compile(inputs: &CompileInputs, output: &str, verbose: bool) -> Result<(), String> {
    let (snapshot_bytes, stats) = compile_snapshot_bytes(inputs, verbose)?;
    write_snapshot(Path::new(output), &snapshot_bytes)?;

    println!("Compiled {} vocabulary files to '{}'", inputs.vocabulary.len(), output);
    println!("  Entries:     {} read, {} after purification", stats.entries_read, stats.blacklisted);
    println!("  Whitelist:   {} entries", stats.whitelisted);
    println!("  Confusables: {} groups", stats.confusable_groups);
    println!("  Height:      {}", stats.tree_height);
    println!("  Size:        {} bytes ({:.1} KB)", snapshot_bytes.len(), snapshot_bytes.len() as f64 / 1024.0);
    println!("  Time:        {:.1}ms", stats.total_ms);

    Ok(())
}

fn cmd_validate(input: &str) -> Result<(), String> {
    let bytes = read_snapshot(Path::new(input))?;

    let snapshot = Snapshot::load(&bytes)
        .map_err(|e| format!("Invalid snapshot: {}", e))?;
    snapshot
        .to_filter()
        .map_err(|e| format!("Invalid snapshot: {}", e))?;

    println!("Snapshot '{}' is valid", input);
    println!("  Version:     {}", snapshot.version);
    println!("  Sections:    {}", snapshot.section_count());
    println!("  Size:        {} bytes", bytes.len());

    Ok(())
}

fn cmd_info(input: &str) -> Result<(), String> {
    let bytes = read_snapshot(Path::new(input))?;

    let snapshot = Snapshot::load(&bytes)
        .map_err(|e| format!("Invalid snapshot: {}", e))?;
    let filter = snapshot
        .to_filter()
        .map_err(|e| format!("Invalid snapshot: {}", e))?;

    println!("Snapshot: {}", input);
    println!("  Magic:       SFT1");
    println!("  Version:     {}", snapshot.version);
    println!("  Sections:    {}", snapshot.section_count());
    println!("  Total size:  {} bytes ({:.1} KB)", bytes.len(), bytes.len() as f64 / 1024.0);
    println!();

    println!("Sections:");
    for id in [
        SectionId::StrPool,
        SectionId::Blacklist,
        SectionId::Whitelist,
        SectionId::CharacterSet,
        SectionId::Options,
    ] {
        if let Some(info) = snapshot.get_section_info(id) {
            println!("  {:<13} {} bytes at {}", format!("{:?}", id), info.length, info.offset);
        }
    }
    println!();

    let blacklist = filter.blacklist();
    let (shortest, longest) = blacklist.length_bounds();
    println!("Blacklist:");
    println!("  Entries:     {} (capacity {})", blacklist.len(), blacklist.capacity());
    println!("  Height:      {}", blacklist.height());
    println!("  Lengths:     {}..={} chars", shortest, longest);
    println!("Whitelist:     {} entries", filter.whitelist().map_or(0, |tree| tree.len()));
    println!("Confusables:   {} groups", filter.character_set().len());
    println!();

    let options = filter.options();
    println!("Options:");
    println!("  Slice size:  {}", options.slice_size);
    println!("  Rewrites:    {:?}", options.rewrites);
    println!("  Reverse:     {}", options.reverse_substitutions);
    match options.probe_limit {
        Some(limit) => println!("  Probe limit: {}", limit),
        None => println!("  Probe limit: none"),
    }
    println!("  Purifiers:   {:?}", options.purifiers);

    Ok(())
}

fn cmd_scan(input: &str, text: &[String], json: bool) -> Result<(), String> {
    let bytes = read_snapshot(Path::new(input))?;
    let filter = Snapshot::load(&bytes)
        .and_then(|snapshot| snapshot.to_filter())
        .map_err(|e| format!("Invalid snapshot: {}", e))?;

    let text = if text.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        buf
    } else {
        text.join(" ")
    };

    let result = filter.scan(&text);

    if json {
        let report = ScanReport {
            purified: &result.purified,
            matches: result
                .matches
                .iter()
                .map(|m| MatchReport {
                    text: &m.text,
                    rate: m.payload,
                })
                .collect(),
        };
        let out = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{out}");
        return Ok(());
    }

    println!("Purified:      {}", result.purified);
    if !result.has_match() {
        println!("No matches");
        return Ok(());
    }
    println!("Matches:       {}", result.matches.len());
    for m in &result.matches {
        println!("  {:<24} rate {}", m.text, m.payload);
    }
    if let Some(max) = result.max_payload() {
        println!("Highest rate:  {}", max);
    }

    Ok(())
}

fn cmd_list(input: &str, sort: ListOrder, desc: bool) -> Result<(), String> {
    let bytes = read_snapshot(Path::new(input))?;
    let snapshot = Snapshot::load(&bytes)
        .map_err(|e| format!("Invalid snapshot: {}", e))?;
    let blacklist = snapshot
        .blacklist()
        .map_err(|e| format!("Invalid snapshot: {}", e))?;

    let direction = if desc { Direction::Descending } else { Direction::Ascending };
    let order = match sort {
        ListOrder::Text => OrderOptions::new().by(SortKey::Text, direction),
        ListOrder::Length => OrderOptions::new()
            .by(SortKey::Length, direction)
            .by(SortKey::Text, Direction::Ascending),
        ListOrder::Rate => OrderOptions::new()
            .by(SortKey::Payload, direction)
            .by(SortKey::Text, Direction::Ascending),
    };

    for entry in blacklist.list_entries(&order) {
        println!("{}\t{}", entry.text, entry.payload);
    }

    Ok(())
}
