//! DXBC container parsing
//!
//! DXIL ships inside the same container format as older DXBC bytecode: a
//! fixed header followed by a table of offsets to tagged parts.
//!
//! ```text
//! 0   "DXBC"
//! 4   16-byte digest
//! 20  major u16, minor u16
//! 24  total size u32
//! 28  part count u32
//! 32  part offsets u32 * count
//!     part: fourcc u32, size u32, data
//! ```

use crate::{Error, Result};
use std::fmt;

const MAGIC: &[u8; 4] = b"DXBC";
const HEADER_SIZE: usize = 32;
const PART_HEADER_SIZE: usize = 8;

/// Four-character part tag
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// DXIL program
    pub const DXIL: FourCC = FourCC(*b"DXIL");
    /// Shader feature info
    pub const SFI0: FourCC = FourCC(*b"SFI0");
    /// Input signature
    pub const ISG1: FourCC = FourCC(*b"ISG1");
    /// Output signature
    pub const OSG1: FourCC = FourCC(*b"OSG1");
    /// Patch constant signature
    pub const PSG1: FourCC = FourCC(*b"PSG1");
    /// Pipeline state validation
    pub const PSV0: FourCC = FourCC(*b"PSV0");
    /// Runtime data
    pub const RDAT: FourCC = FourCC(*b"RDAT");
    /// Shader hash
    pub const HASH: FourCC = FourCC(*b"HASH");
    /// Statistics (reflection) program
    pub const STAT: FourCC = FourCC(*b"STAT");
    /// Debug program
    pub const ILDB: FourCC = FourCC(*b"ILDB");
    /// Debug name
    pub const ILDN: FourCC = FourCC(*b"ILDN");
    /// Root signature
    pub const RTS0: FourCC = FourCC(*b"RTS0");

    pub fn from_u32(value: u32) -> Self {
        FourCC(value.to_le_bytes())
    }

    pub fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|b| b.is_ascii_graphic()) {
            self.0.iter().try_for_each(|&b| write!(f, "{}", b as char))
        } else {
            write!(f, "0x{:08x}", self.to_u32())
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({self})")
    }
}

/// One tagged part of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part<'a> {
    pub kind: FourCC,
    pub data: &'a [u8],
}

/// A parsed container borrowing its bytes
#[derive(Debug, Clone)]
pub struct Container<'a> {
    digest: [u8; 16],
    version: (u16, u16),
    total_size: u32,
    parts: Vec<Part<'a>>,
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = bytes.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidContainer(message.into())
}

impl<'a> Container<'a> {
    /// True when `bytes` starts with the container magic
    pub fn is_container(bytes: &[u8]) -> bool {
        bytes.starts_with(MAGIC)
    }

    /// Parses the header and part table. Part payloads are not inspected.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(invalid(format!(
                "{} bytes is too short for a container header",
                bytes.len()
            )));
        }
        if !Self::is_container(bytes) {
            return Err(invalid("missing DXBC magic"));
        }

        let mut digest = [0u8; 16];
        digest.copy_from_slice(&bytes[4..20]);
        let truncated = || invalid("truncated container header");
        let version = (
            read_u16(bytes, 20).ok_or_else(truncated)?,
            read_u16(bytes, 22).ok_or_else(truncated)?,
        );
        let total_size = read_u32(bytes, 24).ok_or_else(truncated)?;
        let part_count = read_u32(bytes, 28).ok_or_else(truncated)? as usize;

        if total_size as usize > bytes.len() {
            return Err(invalid(format!(
                "header claims {total_size} bytes but only {} are present",
                bytes.len()
            )));
        }
        let bytes = &bytes[..total_size as usize];

        let table_end = part_count
            .checked_mul(4)
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| invalid(format!("part table of {part_count} entries overruns the container")))?;

        let mut parts = Vec::with_capacity(part_count);
        for entry in (HEADER_SIZE..table_end).step_by(4) {
            let offset = read_u32(bytes, entry).ok_or_else(truncated)? as usize;
            let kind = read_u32(bytes, offset)
                .map(FourCC::from_u32)
                .ok_or_else(|| invalid(format!("part offset {offset} is out of range")))?;
            let size = read_u32(bytes, offset + 4)
                .ok_or_else(|| invalid(format!("part {kind} has no size")))? as usize;
            let start = offset + PART_HEADER_SIZE;
            let data = start
                .checked_add(size)
                .and_then(|end| bytes.get(start..end))
                .ok_or_else(|| invalid(format!("part {kind} of {size} bytes overruns the container")))?;
            parts.push(Part { kind, data });
        }

        Ok(Container {
            digest,
            version,
            total_size,
            parts,
        })
    }

    pub fn parts(&self) -> &[Part<'a>] {
        &self.parts
    }

    /// First part with the given tag
    pub fn find(&self, kind: FourCC) -> Option<&Part<'a>> {
        self.parts.iter().find(|p| p.kind == kind)
    }

    pub fn digest(&self) -> &[u8; 16] {
        &self.digest
    }

    /// Container format version (major, minor)
    pub fn version(&self) -> (u16, u16) {
        self.version
    }

    pub fn total_size(&self) -> u32 {
        self.total_size
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Assembles a container from parts.
    pub(crate) fn build(parts: &[(FourCC, &[u8])]) -> Vec<u8> {
        let table = HEADER_SIZE + parts.len() * 4;
        let total = table
            + parts
                .iter()
                .map(|(_, data)| PART_HEADER_SIZE + data.len())
                .sum::<usize>();

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&[0xab; 16]);
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(parts.len() as u32).to_le_bytes());

        let mut offset = table;
        for (_, data) in parts {
            out.extend_from_slice(&(offset as u32).to_le_bytes());
            offset += PART_HEADER_SIZE + data.len();
        }
        for (kind, data) in parts {
            out.extend_from_slice(&kind.0);
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(data);
        }
        out
    }

    #[test]
    fn test_parse_parts() {
        let bytes = build(&[
            (FourCC::SFI0, &[0u8; 8]),
            (FourCC::DXIL, b"BC\xc0\xde"),
            (FourCC::HASH, &[1u8; 20]),
        ]);
        let container = Container::parse(&bytes).unwrap();

        assert_eq!(container.version(), (1, 0));
        assert_eq!(container.total_size() as usize, bytes.len());
        assert_eq!(container.digest(), &[0xab; 16]);
        assert_eq!(container.parts().len(), 3);
        assert_eq!(container.find(FourCC::DXIL).unwrap().data, b"BC\xc0\xde");
        assert_eq!(container.find(FourCC::HASH).unwrap().data.len(), 20);
        assert!(container.find(FourCC::RTS0).is_none());
    }

    #[test]
    fn test_empty_container() {
        let bytes = build(&[]);
        let container = Container::parse(&bytes).unwrap();
        assert!(container.parts().is_empty());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Container::parse(b"DXBC").is_err());

        let mut bytes = build(&[(FourCC::DXIL, &[0u8; 4])]);
        bytes[0] = b'X';
        assert!(matches!(Container::parse(&bytes), Err(Error::InvalidContainer(_))));

        // Part size larger than the container
        let mut bytes = build(&[(FourCC::DXIL, &[0u8; 4])]);
        let size_at = HEADER_SIZE + 4 + 4;
        bytes[size_at..size_at + 4].copy_from_slice(&100u32.to_le_bytes());
        assert!(Container::parse(&bytes).is_err());

        // Total size larger than the input
        let mut bytes = build(&[]);
        bytes[24..28].copy_from_slice(&1000u32.to_le_bytes());
        assert!(Container::parse(&bytes).is_err());
    }

    #[test]
    fn test_fourcc_display() {
        assert_eq!(FourCC::DXIL.to_string(), "DXIL");
        assert_eq!(FourCC::from_u32(xshade_sys::DFCC_DXIL), FourCC::DXIL);
        assert_eq!(FourCC([0, 1, 2, 3]).to_string(), "0x03020100");
        assert!(Container::is_container(b"DXBC...."));
        assert!(!Container::is_container(&0x0723_0203u32.to_le_bytes()));
    }
}
