//! SFT Snapshot Loader
//!
//! `Snapshot` validates the header, checksum and section directory up
//! front and then decodes sections on demand.

use std::collections::{BTreeMap, HashMap};

use super::format::*;
use crate::charset::CharacterSet;
use crate::checksum::Crc32;
use crate::error::Error;
use crate::filter::Filter;
use crate::matcher::MatcherOptions;
use crate::tree::Tree;
use crate::types::{PurifyAction, Rate, Rewrites};

/// Error type for snapshot loading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("Invalid magic bytes")]
    InvalidMagic,
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u16),
    #[error("CRC32 mismatch: stored={stored:#010x}, computed={computed:#010x}")]
    Crc32Mismatch { stored: u32, computed: u32 },
    #[error("Invalid section: {0}")]
    InvalidSection(String),
    #[error("Data too short")]
    DataTooShort,
    #[error(transparent)]
    Build(#[from] Error),
}

/// Section metadata.
#[derive(Debug, Clone)]
pub struct SectionInfo {
    pub id: SectionId,
    pub flags: u16,
    pub offset: usize,
    pub length: usize,
}

/// Validated view over snapshot bytes.
#[derive(Debug)]
pub struct Snapshot<'a> {
    data: &'a [u8],
    pub version: u16,
    pub flags: u16,
    sections: HashMap<SectionId, SectionInfo>,
}

impl<'a> Snapshot<'a> {
    /// Load a snapshot from bytes.
    pub fn load(data: &'a [u8]) -> Result<Self, SnapshotError> {
        if data.len() < HEADER_SIZE {
            return Err(SnapshotError::DataTooShort);
        }
        if !validate_magic(data) {
            return Err(SnapshotError::InvalidMagic);
        }

        let version = read_u16_le(data, header::VERSION);
        if version != SFT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }

        let flags = read_u16_le(data, header::FLAGS);
        let section_count = read_u32_le(data, header::SECTION_COUNT) as usize;
        let section_dir_offset = read_u32_le(data, header::SECTION_DIR_OFFSET) as usize;

        if flags & header_flags::HAS_CRC32 != 0 {
            let stored = read_u32_le(data, header::SNAPSHOT_CRC32);
            let computed = snapshot_crc32(data);
            if stored != computed {
                return Err(SnapshotError::Crc32Mismatch { stored, computed });
            }
        }

        let dir_end = section_count
            .checked_mul(SECTION_ENTRY_SIZE)
            .and_then(|bytes| bytes.checked_add(section_dir_offset))
            .ok_or(SnapshotError::DataTooShort)?;
        if dir_end > data.len() {
            return Err(SnapshotError::DataTooShort);
        }

        let mut sections = HashMap::new();
        for i in 0..section_count {
            let entry_offset = section_dir_offset + i * SECTION_ENTRY_SIZE;
            let id_raw = read_u16_le(data, entry_offset + section_entry::ID);
            // Unknown sections are skipped for forward compatibility.
            let Ok(id) = SectionId::try_from(id_raw) else {
                continue;
            };

            let info = SectionInfo {
                id,
                flags: read_u16_le(data, entry_offset + section_entry::FLAGS),
                offset: read_u32_le(data, entry_offset + section_entry::OFFSET) as usize,
                length: read_u32_le(data, entry_offset + section_entry::LENGTH) as usize,
            };
            if info.offset.saturating_add(info.length) > data.len() {
                return Err(SnapshotError::InvalidSection(format!(
                    "{:?} extends past the end of the snapshot",
                    id
                )));
            }
            sections.insert(id, info);
        }

        Ok(Self {
            data,
            version,
            flags,
            sections,
        })
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn get_section(&self, id: SectionId) -> Option<&'a [u8]> {
        let info = self.sections.get(&id)?;
        self.data.get(info.offset..info.offset + info.length)
    }

    /// Get section info.
    pub fn get_section_info(&self, id: SectionId) -> Option<&SectionInfo> {
        self.sections.get(&id)
    }

    fn require(&self, id: SectionId) -> Result<&'a [u8], SnapshotError> {
        self.get_section(id)
            .ok_or_else(|| SnapshotError::InvalidSection(format!("missing {:?} section", id)))
    }

    fn pool(&self) -> Result<&'a [u8], SnapshotError> {
        let section = self.require(SectionId::StrPool)?;
        let mut reader = ByteReader::new(section);
        let len = reader.u32().ok_or(SnapshotError::DataTooShort)? as usize;
        reader.bytes(len).ok_or(SnapshotError::DataTooShort)
    }

    /// Get string from string pool.
    pub fn get_string(&self, offset: usize, length: usize) -> Option<&'a str> {
        let pool = self.pool().ok()?;
        let bytes = pool.get(offset..offset.checked_add(length)?)?;
        std::str::from_utf8(bytes).ok()
    }

    fn read_string(&self, reader: &mut ByteReader<'_>) -> Result<String, SnapshotError> {
        let offset = reader.u32().ok_or(SnapshotError::DataTooShort)? as usize;
        let length = reader.u32().ok_or(SnapshotError::DataTooShort)? as usize;
        self.get_string(offset, length)
            .map(str::to_string)
            .ok_or_else(|| SnapshotError::InvalidSection(format!("bad string ref {offset}+{length}")))
    }

    /// Decode a tree section into slots and (for rate trees) rates.
    fn read_tree(&self, id: SectionId) -> Result<(Vec<Option<String>>, Option<Vec<Rate>>), SnapshotError> {
        let mut reader = ByteReader::new(self.require(id)?);
        let slot_count = reader.u32().ok_or(SnapshotError::DataTooShort)? as usize;
        let payload_kind = reader.u8().ok_or(SnapshotError::DataTooShort)?;
        reader.skip(3).ok_or(SnapshotError::DataTooShort)?;

        let per_slot = TREE_SLOT_SIZE + if payload_kind == PAYLOAD_RATE { 4 } else { 0 };
        if slot_count.saturating_mul(per_slot) > reader.remaining() {
            return Err(SnapshotError::DataTooShort);
        }

        let mut slots = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            let offset = reader.u32().ok_or(SnapshotError::DataTooShort)?;
            let length = reader.u32().ok_or(SnapshotError::DataTooShort)? as usize;
            if offset == VACANT_SLOT {
                slots.push(None);
                continue;
            }
            let text = self.get_string(offset as usize, length).ok_or_else(|| {
                SnapshotError::InvalidSection(format!("bad string ref {offset}+{length} in {:?}", id))
            })?;
            slots.push(Some(text.to_string()));
        }

        let rates = match payload_kind {
            PAYLOAD_NONE => None,
            PAYLOAD_RATE => {
                let mut rates = Vec::with_capacity(slot_count);
                for _ in 0..slot_count {
                    rates.push(reader.i32().ok_or(SnapshotError::DataTooShort)?);
                }
                Some(rates)
            }
            other => {
                return Err(SnapshotError::InvalidSection(format!(
                    "unknown payload kind {other} in {:?}",
                    id
                )))
            }
        };
        Ok((slots, rates))
    }

    /// The rate tree.
    pub fn blacklist(&self) -> Result<Tree<Rate>, SnapshotError> {
        let (slots, rates) = self.read_tree(SectionId::Blacklist)?;
        let rates = rates.ok_or_else(|| {
            SnapshotError::InvalidSection("blacklist section carries no rates".to_string())
        })?;
        Ok(Tree::from_slots(slots, rates)?)
    }

    /// The whitelist tree, if one was compiled in.
    pub fn whitelist(&self) -> Result<Option<Tree<()>>, SnapshotError> {
        if !self.sections.contains_key(&SectionId::Whitelist) {
            return Ok(None);
        }
        let (slots, _) = self.read_tree(SectionId::Whitelist)?;
        Ok(Some(Tree::from_slots(slots, Vec::new())?))
    }

    /// Rebuild the character set; the ambiguity check runs again.
    pub fn character_set(&self) -> Result<CharacterSet, SnapshotError> {
        let Some(section) = self.get_section(SectionId::CharacterSet) else {
            return Ok(CharacterSet::empty());
        };
        let mut reader = ByteReader::new(section);
        let kind = reader.u8().ok_or(SnapshotError::DataTooShort)?;
        if kind != CHARSET_KIND_BUILT {
            return Err(Error::InvalidCharacterSetType(format!("snapshot kind tag {kind}")).into());
        }
        reader.skip(3).ok_or(SnapshotError::DataTooShort)?;
        let group_count = reader.u32().ok_or(SnapshotError::DataTooShort)? as usize;

        let mut groups = BTreeMap::new();
        for _ in 0..group_count {
            let key = self.read_string(&mut reader)?;
            let variant_count = reader.u32().ok_or(SnapshotError::DataTooShort)? as usize;
            if variant_count.saturating_mul(8) > reader.remaining() {
                return Err(SnapshotError::DataTooShort);
            }
            let mut variants = Vec::with_capacity(variant_count);
            for _ in 0..variant_count {
                variants.push(self.read_string(&mut reader)?);
            }
            groups.insert(key, variants);
        }
        Ok(CharacterSet::new(groups)?)
    }

    /// Stored matcher options, or defaults when absent.
    pub fn matcher_options(&self) -> Result<MatcherOptions, SnapshotError> {
        let Some(section) = self.get_section(SectionId::Options) else {
            return Ok(MatcherOptions::default());
        };
        let mut reader = ByteReader::new(section);
        let slice_size = reader.u32().ok_or(SnapshotError::DataTooShort)? as usize;
        if slice_size == 0 {
            return Err(SnapshotError::InvalidSection("slice size is 0".to_string()));
        }
        let rewrites_raw = reader.u16().ok_or(SnapshotError::DataTooShort)?;
        let reverse = reader.u8().ok_or(SnapshotError::DataTooShort)?;
        let purifier_count = reader.u8().ok_or(SnapshotError::DataTooShort)?;
        let probe_limit = reader.u32().ok_or(SnapshotError::DataTooShort)?;

        let rewrites = Rewrites::from_bits(rewrites_raw).ok_or_else(|| {
            SnapshotError::InvalidSection(format!("unknown rewrite bits {rewrites_raw:#06x}"))
        })?;
        let mut purifiers = Vec::with_capacity(purifier_count as usize);
        for _ in 0..purifier_count {
            let raw = reader.u8().ok_or(SnapshotError::DataTooShort)?;
            let action = PurifyAction::try_from(raw)
                .map_err(|_| SnapshotError::InvalidSection(format!("unknown purify action {raw}")))?;
            purifiers.push(action);
        }

        Ok(MatcherOptions {
            slice_size,
            rewrites,
            reverse_substitutions: reverse != 0,
            probe_limit: (probe_limit != NO_PROBE_LIMIT).then_some(probe_limit as usize),
            purifiers,
        })
    }

    /// Decode every section into an owned filter.
    pub fn to_filter(&self) -> Result<Filter<Rate>, SnapshotError> {
        Ok(Filter::new(
            self.blacklist()?,
            self.whitelist()?,
            self.character_set()?,
            self.matcher_options()?,
        ))
    }
}

/// CRC32 of a snapshot with its stored checksum field skipped.
pub fn snapshot_crc32(data: &[u8]) -> u32 {
    let field = header::SNAPSHOT_CRC32;
    let mut crc = Crc32::new();
    crc.update(&data[..field.min(data.len())]);
    if let Some(rest) = data.get(field + 4..) {
        crc.update(rest);
    }
    crc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal hand-assembled snapshot: pool "ab", one-slot blacklist.
    fn tiny(payload_kind: u8) -> Vec<u8> {
        let mut pool = Vec::new();
        pool.extend_from_slice(&2u32.to_le_bytes());
        pool.extend_from_slice(b"ab");

        let mut tree = Vec::new();
        tree.extend_from_slice(&1u32.to_le_bytes());
        tree.extend_from_slice(&[payload_kind, 0, 0, 0]);
        tree.extend_from_slice(&0u32.to_le_bytes());
        tree.extend_from_slice(&2u32.to_le_bytes());
        tree.extend_from_slice(&7i32.to_le_bytes());

        let sections = [(SectionId::StrPool, pool), (SectionId::Blacklist, tree)];
        let dir = HEADER_SIZE;
        let mut offset = align_offset(dir + sections.len() * SECTION_ENTRY_SIZE, 4);
        let mut data = vec![0u8; offset];
        data[..4].copy_from_slice(&SFT_MAGIC);
        data[header::VERSION..header::VERSION + 2].copy_from_slice(&SFT_VERSION.to_le_bytes());
        data[header::FLAGS..header::FLAGS + 2].copy_from_slice(&header_flags::HAS_CRC32.to_le_bytes());
        data[header::SECTION_COUNT..header::SECTION_COUNT + 4]
            .copy_from_slice(&(sections.len() as u32).to_le_bytes());
        data[header::SECTION_DIR_OFFSET..header::SECTION_DIR_OFFSET + 4]
            .copy_from_slice(&(dir as u32).to_le_bytes());
        for (i, (id, body)) in sections.iter().enumerate() {
            let entry = dir + i * SECTION_ENTRY_SIZE;
            data[entry..entry + 2].copy_from_slice(&(*id as u16).to_le_bytes());
            data[entry + 4..entry + 8].copy_from_slice(&(offset as u32).to_le_bytes());
            data[entry + 8..entry + 12].copy_from_slice(&(body.len() as u32).to_le_bytes());
            data.resize(offset, 0);
            data.extend_from_slice(body);
            offset = align_offset(data.len(), 4);
        }
        let crc = snapshot_crc32(&data);
        data[header::SNAPSHOT_CRC32..header::SNAPSHOT_CRC32 + 4].copy_from_slice(&crc.to_le_bytes());
        data
    }

    #[test]
    fn loads_a_hand_built_snapshot() {
        let data = tiny(PAYLOAD_RATE);
        let snapshot = Snapshot::load(&data).unwrap();
        assert_eq!(snapshot.section_count(), 2);
        let tree = snapshot.blacklist().unwrap();
        assert_eq!(tree.search("ab").map(|m| m.payload), Some(7));
        assert_eq!(snapshot.whitelist().unwrap(), None);
        assert!(snapshot.character_set().unwrap().is_empty());
        assert_eq!(snapshot.matcher_options().unwrap(), MatcherOptions::default());
    }

    #[test]
    fn rejects_corruption() {
        let mut data = tiny(PAYLOAD_RATE);
        let last = data.len() - 1;
        data[last] ^= 0xff;
        assert!(matches!(Snapshot::load(&data), Err(SnapshotError::Crc32Mismatch { .. })));

        let mut data = tiny(PAYLOAD_RATE);
        data[0] = b'X';
        assert_eq!(Snapshot::load(&data).unwrap_err(), SnapshotError::InvalidMagic);

        assert_eq!(Snapshot::load(&[0u8; 8]).unwrap_err(), SnapshotError::DataTooShort);
    }

    #[test]
    fn blacklist_requires_rates() {
        let data = tiny(PAYLOAD_NONE);
        let snapshot = Snapshot::load(&data).unwrap();
        assert!(matches!(snapshot.blacklist(), Err(SnapshotError::InvalidSection(_))));
    }
}
