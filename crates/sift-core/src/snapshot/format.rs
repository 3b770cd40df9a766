//! SFT Snapshot Format v1 Constants
//!
//! All values are little-endian. Layout:
//!
//! ```text
//! header (32 bytes) | section directory | sections (4-byte aligned)
//! ```
//!
//! Strings live once in the `StrPool` section; every other section refers
//! to them by `(offset, length)` into the pool body.

/// Magic bytes: "SFT1"
pub const SFT_MAGIC: [u8; 4] = [0x53, 0x46, 0x54, 0x31];

/// Current format version
pub const SFT_VERSION: u16 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 32;

/// Section directory entry size
pub const SECTION_ENTRY_SIZE: usize = 12;

// =============================================================================
// Header Field Offsets
// =============================================================================

/// Header field byte offsets.
pub mod header {
    /// u8[4] magic = "SFT1"
    pub const MAGIC: usize = 0;
    /// u16 version
    pub const VERSION: usize = 4;
    /// u16 flags
    pub const FLAGS: usize = 6;
    /// u32 headerBytes (always 32)
    pub const HEADER_BYTES: usize = 8;
    /// u32 sectionCount
    pub const SECTION_COUNT: usize = 12;
    /// u32 sectionDirOffset
    pub const SECTION_DIR_OFFSET: usize = 16;
    /// u32 sectionDirBytes
    pub const SECTION_DIR_BYTES: usize = 20;
    /// u32 snapshotCrc32, computed with this field skipped
    pub const SNAPSHOT_CRC32: usize = 24;
}

/// Header flags.
pub mod header_flags {
    /// Snapshot includes CRC32 checksum
    pub const HAS_CRC32: u16 = 1 << 0;
}

pub mod section_entry {
    /// u16 section id
    pub const ID: usize = 0;
    /// u16 flags
    pub const FLAGS: usize = 2;
    /// u32 file offset
    pub const OFFSET: usize = 4;
    /// u32 byte length
    pub const LENGTH: usize = 8;
}

// =============================================================================
// Section IDs
// =============================================================================

/// Section type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SectionId {
    /// u32 length + UTF-8 bytes of every string
    StrPool = 0x0001,
    /// Rate tree
    Blacklist = 0x0002,
    /// String-only tree
    Whitelist = 0x0003,
    /// Confusable groups
    CharacterSet = 0x0004,
    /// Matcher options
    Options = 0x0005,
}

impl TryFrom<u16> for SectionId {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(Self::StrPool),
            0x0002 => Ok(Self::Blacklist),
            0x0003 => Ok(Self::Whitelist),
            0x0004 => Ok(Self::CharacterSet),
            0x0005 => Ok(Self::Options),
            _ => Err(()),
        }
    }
}

// =============================================================================
// Tree Section Layout
// =============================================================================
//
// u32 slotCount | u8 payloadKind | u8[3] pad
// slotCount x (u32 strOff, u32 strLen)     strOff = VACANT_SLOT when empty
// slotCount x i32 rate                     only for PAYLOAD_RATE

pub const TREE_HEADER_SIZE: usize = 8;
pub const TREE_SLOT_SIZE: usize = 8;

pub const PAYLOAD_NONE: u8 = 0;
pub const PAYLOAD_RATE: u8 = 1;

/// String offset of a vacant slot
pub const VACANT_SLOT: u32 = 0xFFFF_FFFF;

// =============================================================================
// Character Set Section Layout
// =============================================================================
//
// u8 kind | u8[3] pad | u32 groupCount
// per group: u32 keyOff, u32 keyLen, u32 variantCount,
//            variantCount x (u32 off, u32 len)

/// Kind tag of a built, immutable character set
pub const CHARSET_KIND_BUILT: u8 = 1;

// =============================================================================
// Options Section Layout
// =============================================================================
//
// u32 sliceSize | u16 rewrites | u8 reverseSubstitutions | u8 purifierCount
// u32 probeLimit (NO_PROBE_LIMIT when unbounded) | purifierCount x u8

pub const NO_PROBE_LIMIT: u32 = 0xFFFF_FFFF;

// =============================================================================
// Helpers
// =============================================================================

/// Align offset to boundary.
#[inline]
pub const fn align_offset(offset: usize, alignment: usize) -> usize {
    (offset + alignment - 1) & !(alignment - 1)
}

/// Validate magic bytes.
#[inline]
pub fn validate_magic(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == SFT_MAGIC
}

/// Read u16 little-endian. Caller checks bounds.
#[inline]
pub fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

/// Read u32 little-endian. Caller checks bounds.
#[inline]
pub fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

/// Bounds-checked little-endian cursor over a section.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let out = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(out)
    }

    pub fn skip(&mut self, len: usize) -> Option<()> {
        self.bytes(len).map(|_| ())
    }

    pub fn u8(&mut self) -> Option<u8> {
        self.bytes(1).map(|b| b[0])
    }

    pub fn u16(&mut self) -> Option<u16> {
        self.bytes(2).map(|b| read_u16_le(b, 0))
    }

    pub fn u32(&mut self) -> Option<u32> {
        self.bytes(4).map(|b| read_u32_le(b, 0))
    }

    pub fn i32(&mut self) -> Option<i32> {
        self.u32().map(|v| v as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_stops_at_the_end() {
        let data = [1u8, 0, 2, 0, 0, 0, 0xff];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.u16(), Some(1));
        assert_eq!(reader.u32(), Some(2));
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.u16(), None);
        assert_eq!(reader.u8(), Some(0xff));
        assert_eq!(reader.u8(), None);
    }

    #[test]
    fn aligns_and_checks_magic() {
        assert_eq!(align_offset(5, 4), 8);
        assert_eq!(align_offset(8, 4), 8);
        assert!(validate_magic(b"SFT1rest"));
        assert!(!validate_magic(b"SFT2"));
    }
}
