//! # flatdbi
//!
//! Builds EMBL-CD-ROM style binary indexes over flat-file sequence databases: a
//! division table of source files, a sorted entryname index locating every entry,
//! and per-field target/hit index pairs mapping tokens such as accession numbers to
//! entries.
//!
//! ```text
//! division.lkp   file number -> file name
//! entrynam.idx   id -> (record offset, sequence offset, file number), sorted by id
//! <field>.trg    token -> slice of <field>.hit, sorted by token
//! <field>.hit    entry ordinals (positions in entrynam.idx)
//! ```
//!
//! Every file starts with the same 300 byte header and holds fixed-width
//! little-endian records.

pub mod builder;
mod config;
mod division;
mod entry;
mod error;
pub mod fields;
mod header;
mod indexer;
pub mod parser;
mod reader;
mod record;
mod report;
pub mod sort;
mod source;
pub mod staging;
mod utils;
mod writer;

pub use config::{IndexConfig, IndexConfigBuilder, SortConfig, SortEngine, Strategy};
pub use division::write_division;
pub use entry::{normalize_token, Deduplicate, Entry, EntryKey, FieldToken, Ranked};
pub use error::{
    BuildError, ConfigError, Error, HeaderError, RecordError, Result, SortError, SourceError, StagingError,
};
pub use header::{DbMeta, DbiHeader, IndexDate, SIZE_HEADER};
pub use indexer::Indexer;
pub use reader::{DbIndex, EntryLocation, FieldIndex, IndexFile};
pub use record::{DivisionRecord, EntryRecord, HitRecord, IndexRecord, TargetRecord};
pub use report::{FileReport, RunReport};
pub use source::{EntrySource, FileList, InputFile, MemorySource, SourceEntry};
pub use writer::{IndexOutput, IndexTotals, IndexWriter};
