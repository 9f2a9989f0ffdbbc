//! Fixed-width index records
//!
//! Each index file holds a single record type after its header. Record widths are
//! computed once per file from the longest string the file must hold (`width`) and
//! recorded in the header as the record length.
//!
//! | file           | record                                          | length        |
//! |----------------|-------------------------------------------------|---------------|
//! | `division.lkp` | file number (i16), file name                    | `width + 2`   |
//! | `entrynam.idx` | id, record offset (i32), seq offset (i32), file (i16) | `width + 10` |
//! | `<field>.trg`  | first hit (u32), hit count (u32), token         | `width + 8`   |
//! | `<field>.hit`  | entry ordinal (u32)                             | `4`           |

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{RecordError, Result};
use crate::utils::{read_padded, write_padded};

/// Size of a hit record in bytes
pub const SIZE_HIT: usize = 4;

/// Converts a byte offset to the signed 32-bit on-disk representation
pub fn checked_offset(offset: u64) -> Result<u32> {
    if offset > i32::MAX as u64 {
        return Err(RecordError::OffsetOverflow(offset).into());
    }
    Ok(offset as u32)
}

/// Converts a 1-based file number to the signed 16-bit on-disk representation
pub fn checked_file_number(number: usize) -> Result<u16> {
    if number > i16::MAX as usize {
        return Err(RecordError::TooManyFiles(number).into());
    }
    Ok(number as u16)
}

/// A record type stored in an index file
///
/// `width` is the declared width of the record's string component.
pub trait IndexRecord: Sized {
    /// Bytes used by the fixed numeric fields
    const FIXED: usize;

    /// Full record length for a given string width
    #[must_use]
    fn record_len(width: usize) -> usize {
        Self::FIXED + width
    }

    /// Recovers the string width from a header record length
    fn width(record_len: usize) -> Result<usize> {
        record_len
            .checked_sub(Self::FIXED)
            .ok_or_else(|| RecordError::InvalidRecordLength(record_len).into())
    }

    /// Serializes the record into `buffer`, which is exactly `record_len(width)` long
    fn encode(&self, buffer: &mut [u8], width: usize);

    /// Deserializes a record from exactly `record_len(width)` bytes
    fn decode(buffer: &[u8], width: usize) -> Result<Self>;
}

/// Maps a 1-based file number to a source file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionRecord {
    pub file_number: u16,
    /// Data file name, followed by the companion sequence file name if there is one
    pub name: String,
}
impl DivisionRecord {
    pub fn new(file_number: usize, name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            file_number: checked_file_number(file_number)?,
            name: name.into(),
        })
    }
}
impl IndexRecord for DivisionRecord {
    const FIXED: usize = 2;

    fn encode(&self, buffer: &mut [u8], _width: usize) {
        LittleEndian::write_i16(&mut buffer[0..2], self.file_number as i16);
        write_padded(&mut buffer[2..], self.name.as_bytes());
    }

    fn decode(buffer: &[u8], _width: usize) -> Result<Self> {
        Ok(Self {
            file_number: LittleEndian::read_i16(&buffer[0..2]) as u16,
            name: read_padded(&buffer[2..])?.to_string(),
        })
    }
}

/// Location of one entry: the master key → location table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    pub id: String,
    pub record_offset: u32,
    /// Zero when the entry has no separate sequence offset
    pub seq_offset: u32,
    pub file_number: u16,
}
impl IndexRecord for EntryRecord {
    const FIXED: usize = 10;

    fn encode(&self, buffer: &mut [u8], width: usize) {
        write_padded(&mut buffer[..width], self.id.as_bytes());
        LittleEndian::write_i32(&mut buffer[width..width + 4], self.record_offset as i32);
        LittleEndian::write_i32(&mut buffer[width + 4..width + 8], self.seq_offset as i32);
        LittleEndian::write_i16(&mut buffer[width + 8..width + 10], self.file_number as i16);
    }

    fn decode(buffer: &[u8], width: usize) -> Result<Self> {
        Ok(Self {
            id: read_padded(&buffer[..width])?.to_string(),
            record_offset: LittleEndian::read_i32(&buffer[width..width + 4]) as u32,
            seq_offset: LittleEndian::read_i32(&buffer[width + 4..width + 8]) as u32,
            file_number: LittleEndian::read_i16(&buffer[width + 8..width + 10]) as u16,
        })
    }
}

/// Summary of one unique field token, pointing at a contiguous slice of the hit file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRecord {
    /// 1-based position of the first hit in the `.hit` file
    pub first_hit: u32,
    pub hit_count: u32,
    pub token: String,
}
impl TargetRecord {
    /// 0-based range of this target's hits within the `.hit` file
    #[must_use]
    pub fn hit_range(&self) -> std::ops::Range<usize> {
        let start = self.first_hit.saturating_sub(1) as usize;
        start..start + self.hit_count as usize
    }
}
impl IndexRecord for TargetRecord {
    const FIXED: usize = 8;

    fn encode(&self, buffer: &mut [u8], _width: usize) {
        LittleEndian::write_u32(&mut buffer[0..4], self.first_hit);
        LittleEndian::write_u32(&mut buffer[4..8], self.hit_count);
        write_padded(&mut buffer[8..], self.token.as_bytes());
    }

    fn decode(buffer: &[u8], _width: usize) -> Result<Self> {
        Ok(Self {
            first_hit: LittleEndian::read_u32(&buffer[0..4]),
            hit_count: LittleEndian::read_u32(&buffer[4..8]),
            token: read_padded(&buffer[8..])?.to_string(),
        })
    }
}

/// A single entry ordinal within a target's hit slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HitRecord(pub u32);
impl IndexRecord for HitRecord {
    const FIXED: usize = SIZE_HIT;

    fn encode(&self, buffer: &mut [u8], _width: usize) {
        LittleEndian::write_u32(&mut buffer[0..4], self.0);
    }

    fn decode(buffer: &[u8], _width: usize) -> Result<Self> {
        Ok(Self(LittleEndian::read_u32(&buffer[0..4])))
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;

    fn encoded<R: IndexRecord>(record: &R, width: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; R::record_len(width)];
        record.encode(&mut buf, width);
        Ok(buf)
    }

    #[test]
    fn entry_record_layout() -> Result<()> {
        let record = EntryRecord {
            id: "X56734".into(),
            record_offset: 1234,
            seq_offset: 0,
            file_number: 3,
        };
        let buf = encoded(&record, 8)?;
        assert_eq!(&buf[..8], b"X56734  ");
        assert_eq!(&buf[8..12], &1234i32.to_le_bytes());
        assert_eq!(&buf[12..16], &[0, 0, 0, 0]);
        assert_eq!(&buf[16..18], &3i16.to_le_bytes());
        assert_eq!(EntryRecord::decode(&buf, 8)?, record);
        Ok(())
    }

    #[test]
    fn target_record_layout() -> Result<()> {
        let record = TargetRecord {
            first_hit: 3,
            hit_count: 2,
            token: "A2".into(),
        };
        let buf = encoded(&record, 4)?;
        assert_eq!(&buf[..4], &3u32.to_le_bytes());
        assert_eq!(&buf[4..8], &2u32.to_le_bytes());
        assert_eq!(&buf[8..], b"A2  ");
        assert_eq!(TargetRecord::decode(&buf, 4)?, record);
        assert_eq!(record.hit_range(), 2..4);
        Ok(())
    }

    #[test]
    fn division_record_width() -> Result<()> {
        let record = DivisionRecord::new(1, "est1.dat")?;
        let buf = encoded(&record, 12)?;
        assert_eq!(buf.len(), 14);
        assert_eq!(DivisionRecord::width(14)?, 12);
        assert_eq!(DivisionRecord::decode(&buf, 12)?, record);
        Ok(())
    }

    #[test]
    fn overflow_checks() {
        assert!(checked_offset(i32::MAX as u64).is_ok());
        assert!(checked_offset(i32::MAX as u64 + 1).is_err());
        assert!(checked_file_number(32_767).is_ok());
        assert!(checked_file_number(32_768).is_err());
        assert!(HitRecord::width(2).is_err());
    }
}
