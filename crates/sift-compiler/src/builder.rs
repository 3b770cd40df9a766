use std::collections::HashMap;

use sift_core::charset::CharacterSet;
use sift_core::filter::Filter;
use sift_core::matcher::MatcherOptions;
use sift_core::snapshot::{
    align_offset, header, header_flags, section_entry, snapshot_crc32, SectionId,
    CHARSET_KIND_BUILT, HEADER_SIZE, NO_PROBE_LIMIT, PAYLOAD_NONE, PAYLOAD_RATE,
    SECTION_ENTRY_SIZE, SFT_MAGIC, SFT_VERSION, VACANT_SLOT,
};
use sift_core::tree::Tree;
use sift_core::types::Rate;

/// Serialize a rate filter into an SFT1 snapshot.
pub fn build_snapshot(filter: &Filter<Rate>) -> Vec<u8> {
    let mut str_pool = StringPool::new();

    let blacklist = build_tree_section(filter.blacklist(), Some(filter.blacklist().payloads()), &mut str_pool);
    let whitelist = filter
        .whitelist()
        .map(|tree| build_tree_section(tree, None, &mut str_pool));
    let charset = build_charset_section(filter.character_set(), &mut str_pool);
    let options = build_options_section(filter.options());
    let str_pool_section = str_pool.build();

    let mut sections = vec![
        SectionData::new(SectionId::StrPool, str_pool_section),
        SectionData::new(SectionId::Blacklist, blacklist),
    ];
    if let Some(whitelist) = whitelist {
        sections.push(SectionData::new(SectionId::Whitelist, whitelist));
    }
    sections.push(SectionData::new(SectionId::CharacterSet, charset));
    sections.push(SectionData::new(SectionId::Options, options));

    let section_count = sections.len();
    let section_dir_offset = HEADER_SIZE;
    let section_dir_bytes = section_count * SECTION_ENTRY_SIZE;
    let mut data_offset = align_offset(section_dir_offset + section_dir_bytes, 4);

    for section in &mut sections {
        section.offset = data_offset;
        data_offset = align_offset(data_offset + section.data.len(), 4);
    }

    let total_size = data_offset;
    let mut buffer = vec![0u8; total_size];

    buffer[0..4].copy_from_slice(&SFT_MAGIC);
    write_u16_le(&mut buffer, header::VERSION, SFT_VERSION);
    write_u16_le(&mut buffer, header::FLAGS, header_flags::HAS_CRC32);
    write_u32_le(&mut buffer, header::HEADER_BYTES, HEADER_SIZE as u32);
    write_u32_le(&mut buffer, header::SECTION_COUNT, section_count as u32);
    write_u32_le(&mut buffer, header::SECTION_DIR_OFFSET, section_dir_offset as u32);
    write_u32_le(&mut buffer, header::SECTION_DIR_BYTES, section_dir_bytes as u32);

    for (index, section) in sections.iter().enumerate() {
        let entry_offset = section_dir_offset + index * SECTION_ENTRY_SIZE;
        write_u16_le(&mut buffer, entry_offset + section_entry::ID, section.id as u16);
        write_u16_le(&mut buffer, entry_offset + section_entry::FLAGS, 0);
        write_u32_le(&mut buffer, entry_offset + section_entry::OFFSET, section.offset as u32);
        write_u32_le(&mut buffer, entry_offset + section_entry::LENGTH, section.data.len() as u32);

        let end = section.offset + section.data.len();
        buffer[section.offset..end].copy_from_slice(&section.data);
    }

    let crc = snapshot_crc32(&buffer);
    write_u32_le(&mut buffer, header::SNAPSHOT_CRC32, crc);

    log::debug!(
        "snapshot: {} sections, {} bytes, crc32 {:#010x}",
        section_count,
        total_size,
        crc
    );
    buffer
}

struct SectionData {
    id: SectionId,
    data: Vec<u8>,
    offset: usize,
}

impl SectionData {
    fn new(id: SectionId, data: Vec<u8>) -> Self {
        Self { id, data, offset: 0 }
    }
}

struct StringPool {
    data: Vec<u8>,
    index: HashMap<String, u32>,
}

impl StringPool {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn intern(&mut self, s: &str) -> (u32, u32) {
        if let Some(&offset) = self.index.get(s) {
            return (offset, s.len() as u32);
        }
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(s.as_bytes());
        self.index.insert(s.to_string(), offset);
        (offset, s.len() as u32)
    }

    fn build(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.data.len());
        buf.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }
}

fn push_string(buf: &mut Vec<u8>, s: &str, str_pool: &mut StringPool) {
    let (offset, len) = str_pool.intern(s);
    buf.extend_from_slice(&offset.to_le_bytes());
    buf.extend_from_slice(&len.to_le_bytes());
}

fn build_tree_section<P: Copy>(tree: &Tree<P>, rates: Option<&[Rate]>, str_pool: &mut StringPool) -> Vec<u8> {
    let slots = tree.slots();
    let mut buf = Vec::with_capacity(8 + slots.len() * 12);
    buf.extend_from_slice(&(slots.len() as u32).to_le_bytes());
    buf.push(if rates.is_some() { PAYLOAD_RATE } else { PAYLOAD_NONE });
    buf.extend_from_slice(&[0u8; 3]);

    for slot in slots {
        match slot {
            Some(text) => push_string(&mut buf, text, str_pool),
            None => {
                buf.extend_from_slice(&VACANT_SLOT.to_le_bytes());
                buf.extend_from_slice(&0u32.to_le_bytes());
            }
        }
    }

    if let Some(rates) = rates {
        for rate in rates {
            buf.extend_from_slice(&rate.to_le_bytes());
        }
    }
    buf
}

fn build_charset_section(charset: &CharacterSet, str_pool: &mut StringPool) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(CHARSET_KIND_BUILT);
    buf.extend_from_slice(&[0u8; 3]);
    buf.extend_from_slice(&(charset.len() as u32).to_le_bytes());

    for (key, variants) in charset.groups() {
        push_string(&mut buf, key, str_pool);
        buf.extend_from_slice(&(variants.len() as u32).to_le_bytes());
        for variant in variants {
            push_string(&mut buf, variant, str_pool);
        }
    }
    buf
}

fn build_options_section(options: &MatcherOptions) -> Vec<u8> {
    let probe_limit = options
        .probe_limit
        .map_or(NO_PROBE_LIMIT, |limit| limit.min(NO_PROBE_LIMIT as usize - 1) as u32);
    let purifiers = &options.purifiers[..options.purifiers.len().min(u8::MAX as usize)];

    let mut buf = Vec::with_capacity(12 + purifiers.len());
    buf.extend_from_slice(&(options.slice_size as u32).to_le_bytes());
    buf.extend_from_slice(&options.rewrites.bits().to_le_bytes());
    buf.push(options.reverse_substitutions as u8);
    buf.push(purifiers.len() as u8);
    buf.extend_from_slice(&probe_limit.to_le_bytes());
    buf.extend(purifiers.iter().map(|action| *action as u8));
    buf
}

fn write_u16_le(data: &mut [u8], offset: usize, value: u16) {
    let bytes = value.to_le_bytes();
    data[offset..offset + 2].copy_from_slice(&bytes);
}

fn write_u32_le(data: &mut [u8], offset: usize, value: u32) {
    let bytes = value.to_le_bytes();
    data[offset..offset + 4].copy_from_slice(&bytes);
}

#[cfg(test)]
mod tests {
    use sift_core::snapshot::{Snapshot, SnapshotError};
    use sift_core::types::{PurifyAction, Rewrites};

    use crate::filter_builder::{FilterBuilder, FilterOptions};

    use super::*;

    fn sample_filter() -> Filter<Rate> {
        let mut builder = FilterBuilder::new(FilterOptions::default());
        builder
            .add("pie", 3)
            .unwrap()
            .add("cake", 5)
            .unwrap()
            .add("tart", 1)
            .unwrap();
        builder.whitelist(["cupcake"]).unwrap();
        builder.add_confusables("i", ["1", "!"]).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn round_trips_a_filter() {
        let filter = sample_filter();
        let bytes = build_snapshot(&filter);
        let snapshot = Snapshot::load(&bytes).unwrap();
        assert_eq!(snapshot.section_count(), 5);

        let loaded = snapshot.to_filter().unwrap();
        assert_eq!(loaded.blacklist(), filter.blacklist());
        assert_eq!(loaded.whitelist(), filter.whitelist());
        assert_eq!(loaded.options(), filter.options());
        assert_eq!(loaded.character_set().canonical("1"), Some("i"));

        let result = loaded.scan("a slice of p1e");
        assert_eq!(result.max_payload(), Some(3));
        assert!(!loaded.scan("a cupcake").has_match());
    }

    #[test]
    fn round_trips_non_default_options() {
        let mut builder = FilterBuilder::new(FilterOptions::default());
        builder.add("word", 2).unwrap();
        builder.matcher_options_mut().slice_size = 5;
        builder.matcher_options_mut().rewrites = Rewrites::ORIGINAL | Rewrites::STRIP_VOWELS;
        builder.matcher_options_mut().reverse_substitutions = true;
        builder.matcher_options_mut().probe_limit = Some(64);
        builder.matcher_options_mut().purifiers = vec![PurifyAction::Remove, PurifyAction::Purify];
        let filter = builder.build().unwrap();

        let bytes = build_snapshot(&filter);
        let loaded = Snapshot::load(&bytes).unwrap().to_filter().unwrap();
        assert_eq!(loaded.options(), filter.options());
        assert!(loaded.whitelist().is_none());
    }

    #[test]
    fn detects_corruption() {
        let mut bytes = build_snapshot(&sample_filter());
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            Snapshot::load(&bytes),
            Err(SnapshotError::Crc32Mismatch { .. })
        ));
    }

    #[test]
    fn shares_strings_in_the_pool() {
        let filter = sample_filter();
        let bytes = build_snapshot(&filter);
        let snapshot = Snapshot::load(&bytes).unwrap();
        let pool = snapshot.get_section(SectionId::StrPool).unwrap();
        let body = std::str::from_utf8(&pool[4..]).unwrap();
        assert_eq!(body.matches("pie").count(), 1);
    }
}
