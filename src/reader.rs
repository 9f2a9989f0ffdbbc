//! Memory-mapped readers for finished index files
//!
//! [`IndexFile`] validates a file's header against its size on disk and gives
//! random access to its fixed-width records. [`DbIndex`] bundles the division table,
//! the entryname index and any field indexes of one database for lookups.

use std::cmp::Ordering;
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{HeaderError, IoContext, RecordError, Result};
use crate::fields::{FieldDef, DIVISION_FILE, ENTRYNAM_FILE};
use crate::header::{DbiHeader, SIZE_HEADER};
use crate::record::{DivisionRecord, EntryRecord, HitRecord, IndexRecord, TargetRecord};
use crate::utils::read_padded;

/// A finished index file holding records of type `R`
pub struct IndexFile<R: IndexRecord> {
    /// Memory mapped file contents
    mmap: Mmap,

    /// Parsed header
    header: DbiHeader,

    /// Width of the string component of each record
    width: usize,

    /// Length of each record in bytes
    record_len: usize,

    _record: PhantomData<R>,
}
impl<R: IndexRecord> IndexFile<R> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_path("open", path)?;

        // Safety: index files are not modified once written
        let mmap = unsafe { Mmap::map(&file).with_path("map", path)? };

        let header = DbiHeader::from_buffer(&mmap)?;
        if u64::from(header.file_size) != mmap.len() as u64 {
            return Err(HeaderError::FileSizeMismatch {
                recorded: u64::from(header.file_size),
                actual: mmap.len() as u64,
            }
            .into());
        }
        if header.expected_file_size(header.record_count) != mmap.len() as u64 {
            return Err(HeaderError::InconsistentLayout {
                count: header.record_count,
                len: header.record_len,
                size: header.file_size,
            }
            .into());
        }
        let record_len = usize::try_from(header.record_len)
            .map_err(|_| RecordError::InvalidRecordLength(0))?;
        let width = R::width(record_len)?;

        Ok(Self {
            mmap,
            header,
            width,
            record_len,
            _record: PhantomData,
        })
    }

    #[must_use]
    pub fn header(&self) -> &DbiHeader {
        &self.header
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn num_records(&self) -> usize {
        self.header.record_count as usize
    }

    fn record_bytes(&self, idx: usize) -> Result<&[u8]> {
        if idx >= self.num_records() {
            return Err(RecordError::OutOfRange(idx, self.num_records()).into());
        }
        let lbound = SIZE_HEADER + idx * self.record_len;
        Ok(&self.mmap[lbound..lbound + self.record_len])
    }

    /// Returns the record at a 0-based index
    pub fn get(&self, idx: usize) -> Result<R> {
        R::decode(self.record_bytes(idx)?, self.width)
    }

    /// Iterates over all records in file order
    pub fn iter(&self) -> impl Iterator<Item = Result<R>> + '_ {
        (0..self.num_records()).map(move |idx| self.get(idx))
    }

    /// Binary search over records sorted by their string component at `key_offset`
    fn search(&self, key_offset: usize, key: &str) -> Result<Option<usize>> {
        let (mut lo, mut hi) = (0, self.num_records());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let bytes = self.record_bytes(mid)?;
            let probe = read_padded(&bytes[key_offset..key_offset + self.width])?;
            match probe.as_bytes().cmp(key.as_bytes()) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(Some(mid)),
            }
        }
        Ok(None)
    }
}

/// Where an entry lives on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLocation {
    /// 1-based position in the entryname index
    pub ordinal: u32,
    pub record: EntryRecord,
    /// Division table name of the file holding the entry
    pub file_name: String,
}

/// Target and hit files of one indexed field
pub struct FieldIndex {
    pub field: &'static FieldDef,
    pub targets: IndexFile<TargetRecord>,
    pub hits: IndexFile<HitRecord>,
}
impl FieldIndex {
    pub fn open<P: AsRef<Path>>(dir: P, field: &'static FieldDef) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            field,
            targets: IndexFile::open(dir.join(field.target_file()))?,
            hits: IndexFile::open(dir.join(field.hit_file()))?,
        })
    }

    /// Returns the entry ordinals recorded for `token`, in ascending order
    pub fn lookup(&self, token: &str) -> Result<Vec<u32>> {
        let Some(idx) = self.targets.search(TargetRecord::FIXED, token)? else {
            return Ok(Vec::new());
        };
        let target = self.targets.get(idx)?;
        target
            .hit_range()
            .map(|hit| self.hits.get(hit).map(|h| h.0))
            .collect()
    }
}

/// All index files of one database
pub struct DbIndex {
    dir: PathBuf,
    pub division: IndexFile<DivisionRecord>,
    pub entries: IndexFile<EntryRecord>,
    pub fields: Vec<FieldIndex>,
}
impl DbIndex {
    /// Opens the division and entryname files plus the given field indexes
    pub fn open<P: AsRef<Path>>(dir: P, fields: &[&'static FieldDef]) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            dir: dir.to_path_buf(),
            division: IndexFile::open(dir.join(DIVISION_FILE))?,
            entries: IndexFile::open(dir.join(ENTRYNAM_FILE))?,
            fields: fields
                .iter()
                .map(|field| FieldIndex::open(dir, field))
                .collect::<Result<_>>()?,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the division table name of a 1-based file number
    pub fn file_name(&self, file_number: u16) -> Result<String> {
        let idx = usize::from(file_number).saturating_sub(1);
        let record = self.division.get(idx)?;
        Ok(record.name)
    }

    /// Looks up an entry by its identifier
    pub fn find_entry(&self, id: &str) -> Result<Option<EntryLocation>> {
        let Some(idx) = self.entries.search(0, id)? else {
            return Ok(None);
        };
        self.location(idx as u32 + 1).map(Some)
    }

    /// Resolves a 1-based entry ordinal
    pub fn location(&self, ordinal: u32) -> Result<EntryLocation> {
        let record = self.entries.get(ordinal.saturating_sub(1) as usize)?;
        let file_name = self.file_name(record.file_number)?;
        Ok(EntryLocation {
            ordinal,
            record,
            file_name,
        })
    }

    /// Looks up every entry carrying `token` in the named field
    pub fn find_by_field(&self, field: &str, token: &str) -> Result<Vec<EntryLocation>> {
        let Some(index) = self.fields.iter().find(|f| f.field.name == field) else {
            return Ok(Vec::new());
        };
        index
            .lookup(token)?
            .into_iter()
            .map(|ordinal| self.location(ordinal))
            .collect()
    }
}
