//! Index file writer
//!
//! Index files are written in two passes: a placeholder header is written when the
//! file is created, records are appended, and the header's size and count fields are
//! patched in place once every record has been written. [`IndexWriter::finish`]
//! consumes the writer so no record can be appended after the header is finalized.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::error::{HeaderError, IoContext, RecordError, Result};
use crate::header::{DbMeta, DbiHeader};
use crate::record::IndexRecord;

/// Counts reported by a finalized index file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexTotals {
    pub record_count: u32,
    pub file_size: u32,
}

/// Appends fixed-width records of type `R` after a placeholder header
pub struct IndexWriter<W: Write + Seek, R: IndexRecord> {
    /// Inner writer
    inner: W,

    /// File named in I/O errors
    path: PathBuf,

    /// Header written at creation, patched by `finish`
    header: DbiHeader,

    /// Declared width of the record's string component
    width: usize,

    /// Reusable record buffer
    buffer: Vec<u8>,

    /// Number of records written
    records_written: u32,

    _record: PhantomData<R>,
}
impl<W: Write + Seek, R: IndexRecord> IndexWriter<W, R> {
    /// Writes the placeholder header and positions the writer at the first record
    ///
    /// `path` names the destination in errors.
    pub fn new(mut inner: W, path: impl Into<PathBuf>, meta: DbMeta, width: usize) -> Result<Self> {
        let path = path.into();
        let record_len = R::record_len(width);
        let header = DbiHeader::new(meta, record_len)?;
        inner.seek(SeekFrom::Start(0)).with_path("seek", &path)?;
        inner.write_all(&header.to_bytes()).with_path("write", &path)?;
        Ok(Self {
            inner,
            path,
            header,
            width,
            buffer: vec![0; record_len],
            records_written: 0,
            _record: PhantomData,
        })
    }

    /// Appends one record
    pub fn write_record(&mut self, record: &R) -> Result<()> {
        record.encode(&mut self.buffer, self.width);
        self.inner
            .write_all(&self.buffer)
            .with_path("write", &self.path)?;
        self.records_written = self
            .records_written
            .checked_add(1)
            .ok_or(RecordError::OrdinalOverflow)?;
        Ok(())
    }

    #[must_use]
    pub fn records_written(&self) -> u32 {
        self.records_written
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Patches the header with the final size and record count and flushes
    pub fn finish(mut self) -> Result<(W, IndexTotals)> {
        let size = self.header.expected_file_size(self.records_written);
        let Ok(file_size) = u32::try_from(size) else {
            return Err(HeaderError::FileTooLarge(size).into());
        };
        let path = &self.path;
        self.inner.seek(SeekFrom::Start(0)).with_path("seek", path)?;
        self.inner
            .write_all(&DbiHeader::size_bytes(file_size, self.records_written))
            .with_path("write", path)?;
        self.inner.flush().with_path("flush", path)?;
        Ok((
            self.inner,
            IndexTotals {
                record_count: self.records_written,
                file_size,
            },
        ))
    }
}

/// Destination directory and shared header metadata for one indexing run
#[derive(Debug, Clone)]
pub struct IndexOutput {
    dir: PathBuf,
    meta: DbMeta,
}
impl IndexOutput {
    pub fn new(dir: impl Into<PathBuf>, meta: DbMeta) -> Self {
        Self {
            dir: dir.into(),
            meta,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn meta(&self) -> &DbMeta {
        &self.meta
    }

    #[must_use]
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Creates (truncating) an index file in the output directory
    pub fn create<R: IndexRecord>(
        &self,
        file_name: &str,
        width: usize,
    ) -> Result<IndexWriter<BufWriter<File>, R>> {
        let path = self.path(file_name);
        let handle = File::create(&path)
            .map(BufWriter::new)
            .with_path("create", &path)?;
        IndexWriter::new(handle, path, self.meta.clone(), width)
    }
}
