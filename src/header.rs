//! Header module for the flatdbi library
//!
//! Every binary index file (`division.lkp`, `entrynam.idx`, `<field>.trg`,
//! `<field>.hit`) starts with the same fixed-size header describing the file size,
//! the number and length of its fixed-width records, and the database name,
//! release and date of the indexing run.
//!
//! ```text
//! offset  width  field
//!      0      4  file size in bytes (u32)
//!      4      4  record count (u32)
//!      8      2  record length in bytes (i16)
//!     10     20  database name (space padded)
//!     30     10  release (space padded)
//!     40      4  date: day, month, year - 2000, 0
//!     44    256  reserved
//! ```

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};
use chrono::{Datelike, Local, NaiveDate};

use crate::error::{HeaderError, Result};
use crate::utils::{read_padded, write_padded};

/// Width of the database name field
pub const SIZE_DBNAME: usize = 20;

/// Width of the release field
pub const SIZE_RELEASE: usize = 10;

/// Size of the populated part of the header
pub const SIZE_PROLOGUE: usize = 44;

/// Reserved bytes following the populated part of the header
pub const SIZE_RESERVED: usize = 256;

/// Size of the header in bytes
pub const SIZE_HEADER: usize = SIZE_PROLOGUE + SIZE_RESERVED;

/// Date stamp stored in every index header
///
/// Stored as four bytes: day, month, year since 2000, and a zero byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexDate {
    pub day: u8,
    pub month: u8,
    /// Years since 2000
    pub year: u8,
}
impl IndexDate {
    #[must_use]
    pub fn new(day: u8, month: u8, year: u8) -> Self {
        Self { day, month, year }
    }

    /// Converts a calendar date, which must fall in the years 2000 to 2255
    #[must_use]
    pub fn from_naive(date: NaiveDate) -> Option<Self> {
        let year = u8::try_from(date.year().checked_sub(2000)?).ok()?;
        Some(Self::new(date.day() as u8, date.month() as u8, year))
    }

    /// Parses `dd/mm/yy` or `dd/mm/yyyy`, accepting any single non-digit separator.
    ///
    /// Two digit years are taken as years since 2000.
    pub fn parse(datestr: &str) -> Result<Self> {
        let invalid = || HeaderError::InvalidDate(datestr.to_string());
        let normalized: String = datestr
            .trim()
            .chars()
            .map(|c| if c.is_ascii_digit() { c } else { '/' })
            .collect();
        let date = NaiveDate::parse_from_str(&normalized, "%d/%m/%Y").map_err(|_| invalid())?;
        let date = if date.year() < 100 {
            date.with_year(date.year() + 2000).ok_or_else(invalid)?
        } else {
            date
        };
        Self::from_naive(date).ok_or_else(|| invalid().into())
    }

    /// Today's date in the local timezone
    #[must_use]
    pub fn today() -> Self {
        Self::from_naive(Local::now().date_naive()).unwrap_or_default()
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; 4] {
        [self.day, self.month, self.year, 0]
    }

    #[must_use]
    pub fn from_bytes(buffer: [u8; 4]) -> Self {
        Self::new(buffer[0], buffer[1], buffer[2])
    }
}
impl FromStr for IndexDate {
    type Err = crate::Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
impl fmt::Display for IndexDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}/{:02}", self.day, self.month, self.year)
    }
}

/// Run-level metadata copied verbatim into the header of every index file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbMeta {
    pub dbname: String,
    pub release: String,
    pub date: IndexDate,
}
impl DbMeta {
    pub fn new(dbname: impl Into<String>, release: impl Into<String>, date: IndexDate) -> Self {
        Self {
            dbname: dbname.into(),
            release: release.into(),
            date,
        }
    }
}

/// Header structure for binary index files
///
/// `file_size` and `record_count` are placeholders until every record has been
/// written; see [`DbiHeader::size_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbiHeader {
    /// Total size of the index file in bytes
    ///
    /// 4 bytes
    pub file_size: u32,

    /// Number of fixed-width records after the header
    ///
    /// 4 bytes
    pub record_count: u32,

    /// Length of each record in bytes
    ///
    /// 2 bytes
    pub record_len: i16,

    /// Database name, release and date
    ///
    /// 20 + 10 + 4 bytes
    pub meta: DbMeta,
}
impl DbiHeader {
    /// Creates a placeholder header for a file of `record_len` byte records
    pub fn new(meta: DbMeta, record_len: usize) -> Result<Self> {
        let Ok(record_len) = i16::try_from(record_len) else {
            return Err(HeaderError::RecordTooLong(record_len).into());
        };
        Ok(Self {
            file_size: 0,
            record_count: 0,
            record_len,
            meta,
        })
    }

    /// Size in bytes of a file holding `record_count` records of this header's length
    #[must_use]
    pub fn expected_file_size(&self, record_count: u32) -> u64 {
        SIZE_HEADER as u64 + u64::from(record_count) * self.record_len.max(0) as u64
    }

    /// Parses a header from a fixed-size byte array
    pub fn from_bytes(buffer: &[u8; SIZE_HEADER]) -> Result<Self> {
        let file_size = LittleEndian::read_u32(&buffer[0..4]);
        let record_count = LittleEndian::read_u32(&buffer[4..8]);
        let record_len = LittleEndian::read_i16(&buffer[8..10]);
        let dbname = read_padded(&buffer[10..30])?.to_string();
        let release = read_padded(&buffer[30..40])?.to_string();
        let date = IndexDate::from_bytes([buffer[40], buffer[41], buffer[42], buffer[43]]);
        Ok(Self {
            file_size,
            record_count,
            record_len,
            meta: DbMeta {
                dbname,
                release,
                date,
            },
        })
    }

    /// Parses a header from the start of an arbitrarily sized buffer
    pub fn from_buffer(buffer: &[u8]) -> Result<Self> {
        let mut bytes = [0u8; SIZE_HEADER];
        if buffer.len() < SIZE_HEADER {
            return Err(HeaderError::InvalidSize(buffer.len(), SIZE_HEADER).into());
        }
        bytes.copy_from_slice(&buffer[..SIZE_HEADER]);
        Self::from_bytes(&bytes)
    }

    /// Serializes the full header
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SIZE_HEADER] {
        let mut buffer = [0u8; SIZE_HEADER];
        buffer[0..8].copy_from_slice(&Self::size_bytes(self.file_size, self.record_count));
        LittleEndian::write_i16(&mut buffer[8..10], self.record_len);
        write_padded(&mut buffer[10..30], self.meta.dbname.as_bytes());
        write_padded(&mut buffer[30..40], self.meta.release.as_bytes());
        buffer[40..44].copy_from_slice(&self.meta.date.to_bytes());
        buffer
    }

    /// The leading size and count fields, patched in place once a file is complete
    #[must_use]
    pub fn size_bytes(file_size: u32, record_count: u32) -> [u8; 8] {
        let mut buffer = [0u8; 8];
        LittleEndian::write_u32(&mut buffer[0..4], file_size);
        LittleEndian::write_u32(&mut buffer[4..8], record_count);
        buffer
    }

    /// Writes the header to a writer at its current position
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.to_bytes())
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;

    fn meta() -> DbMeta {
        DbMeta::new("EMBLDB", "141.0", IndexDate::new(17, 10, 26))
    }

    #[test]
    fn header_layout() -> Result<()> {
        let header = DbiHeader::new(meta(), 18)?;
        let mut buf = Vec::new();
        header.write_bytes(&mut buf)?;
        assert_eq!(buf.len(), SIZE_HEADER);
        assert_eq!(&buf[8..10], &18i16.to_le_bytes());
        assert_eq!(&buf[10..30], b"EMBLDB              ");
        assert_eq!(&buf[30..40], b"141.0     ");
        assert_eq!(&buf[40..44], &[17, 10, 26, 0]);
        assert!(buf[44..].iter().all(|&b| b == 0));

        let parsed = DbiHeader::from_buffer(&buf)?;
        assert_eq!(parsed, header);
        Ok(())
    }

    #[test]
    fn size_bytes_patch_only_counts() -> Result<()> {
        let header = DbiHeader::new(meta(), 4)?;
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&[1, 0, 0, 0, 2, 0, 0, 0]);

        let size = header.expected_file_size(2) as u32;
        bytes[..8].copy_from_slice(&DbiHeader::size_bytes(size, 2));

        let parsed = DbiHeader::from_buffer(&bytes)?;
        assert_eq!(parsed.file_size as usize, bytes.len());
        assert_eq!(parsed.record_count, 2);
        assert_eq!(parsed.meta, meta());
        Ok(())
    }

    #[test]
    fn record_length_must_fit_i16() {
        assert!(DbiHeader::new(meta(), 40_000).is_err());
    }

    #[test]
    fn date_parsing() -> Result<()> {
        assert_eq!(IndexDate::parse("17/10/26")?, IndexDate::new(17, 10, 26));
        assert_eq!(IndexDate::parse("01-02-2024")?, IndexDate::new(1, 2, 24));
        assert_eq!(IndexDate::parse("29.02.2000")?, IndexDate::new(29, 2, 0));
        assert!(IndexDate::parse("17/10").is_err());
        assert!(IndexDate::parse("40/10/26").is_err());
        assert!(IndexDate::parse("29/02/2023").is_err());
        assert!(IndexDate::parse("01/01/1999").is_err());
        assert_eq!(IndexDate::new(5, 3, 9).to_string(), "05/03/09");
        Ok(())
    }

    #[test]
    fn calendar_dates() {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(IndexDate::from_naive(date(2000, 1, 1)), Some(IndexDate::new(1, 1, 0)));
        assert_eq!(IndexDate::from_naive(date(2026, 10, 17)), Some(IndexDate::new(17, 10, 26)));
        assert_eq!(IndexDate::from_naive(date(1999, 12, 31)), None);
        assert_eq!(IndexDate::from_naive(date(2256, 1, 1)), None);
    }

    #[test]
    fn today_matches_local_calendar() {
        let local = Local::now().date_naive();
        let today = IndexDate::today();
        // tolerate a run straddling midnight
        let next = local.succ_opt().and_then(IndexDate::from_naive);
        assert!(Some(today) == IndexDate::from_naive(local) || Some(today) == next);
    }
}
