use std::path::{Path, PathBuf};

/// Custom Result type for flatdbi operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the flatdbi library, encompassing all possible error cases
/// that can occur while building or reading an index.
///
/// Every variant is fatal to an indexing run: there is no partial index recovery.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors related to index file header processing
    #[error(transparent)]
    HeaderError(#[from] HeaderError),
    /// Errors related to fixed-width index records
    #[error(transparent)]
    RecordError(#[from] RecordError),
    /// Errors raised by the sort driver or a sort backend
    #[error(transparent)]
    SortError(#[from] SortError),
    /// Errors reading back staging files
    #[error(transparent)]
    StagingError(#[from] StagingError),
    /// Misuse of an index builder
    #[error(transparent)]
    BuildError(#[from] BuildError),
    /// Errors raised while discovering or parsing input files
    #[error(transparent)]
    SourceError(#[from] SourceError),
    /// Invalid run configuration
    #[error(transparent)]
    ConfigError(#[from] ConfigError),
    /// I/O error tied to a specific file
    #[error("failed to {action} {}: {source}", .path.display())]
    FileError {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Standard I/O errors from the Rust standard library
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    /// UTF-8 encoding/decoding errors
    #[error(transparent)]
    Utf8Error(#[from] std::str::Utf8Error),
    /// Generic errors that can occur in any part of the system
    #[error(transparent)]
    AnyhowError(#[from] anyhow::Error),
}

/// Attaches the offending path to an I/O error.
pub(crate) trait IoContext<T> {
    fn with_path(self, action: &'static str, path: &Path) -> Result<T>;
}
impl<T> IoContext<T> for std::io::Result<T> {
    fn with_path(self, action: &'static str, path: &Path) -> Result<T> {
        self.map_err(|source| Error::FileError {
            action,
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Errors specific to processing and validating index file headers
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The buffer is too small to hold a header
    ///
    /// # Arguments
    /// * First `usize` - The actual number of bytes provided
    /// * Second `usize` - The expected number of bytes
    #[error("Invalid number of bytes provided: {0}. Expected: {1}")]
    InvalidSize(usize, usize),

    /// The file size recorded in the header does not match the file on disk
    #[error("Header records a file size of {recorded} bytes but the file has {actual}")]
    FileSizeMismatch { recorded: u64, actual: u64 },

    /// The record count and record length do not add up to the recorded file size
    #[error("Header records {count} records of {len} bytes which does not fill {size} bytes")]
    InconsistentLayout { count: u32, len: i16, size: u32 },

    /// The record length does not fit the signed 16-bit header field
    #[error("Record length {0} exceeds the maximum of {max}", max = i16::MAX)]
    RecordTooLong(usize),

    /// The file is larger than the 32-bit size field can express
    #[error("Index file of {0} bytes exceeds the 32-bit size field")]
    FileTooLarge(u64),

    /// The date string could not be parsed
    #[error("Invalid date '{0}': expected dd/mm/yy or dd/mm/yyyy")]
    InvalidDate(String),
}

/// Errors related to the fixed-width records stored after the header
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    /// A byte offset does not fit the signed 32-bit record field
    #[error("Offset {0} exceeds the maximum representable offset of {max}", max = i32::MAX)]
    OffsetOverflow(u64),

    /// More input files than the signed 16-bit file number can address
    #[error("{0} input files exceed the maximum of {max}", max = i16::MAX)]
    TooManyFiles(usize),

    /// More entries or hits than a 32-bit ordinal can address
    #[error("Ordinal counter overflowed 32 bits")]
    OrdinalOverflow,

    /// The record length in a header does not match the record type
    #[error("Record length {0} is too small for this record type")]
    InvalidRecordLength(usize),

    /// Attempted to access a record index that is beyond the available range
    ///
    /// # Arguments
    /// * First `usize` - The requested record index
    /// * Second `usize` - The number of records
    #[error("Requested record index ({0}) is out of record range ({1})")]
    OutOfRange(usize, usize),
}

/// Errors from the sort driver and its backends
#[derive(thiserror::Error, Debug)]
pub enum SortError {
    /// The sort program could not be started
    #[error("Could not run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The sort program exited unsuccessfully
    #[error("'{command}' exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    /// A merge was requested without any inputs
    #[error("Merge into {0} has no inputs")]
    EmptyMerge(PathBuf),
}

/// Errors reading back the text staging files
#[derive(thiserror::Error, Debug)]
pub enum StagingError {
    /// A staging line does not have the expected layout
    #[error("Malformed line {line} in {}: '{text}'", .path.display())]
    MalformedLine {
        path: PathBuf,
        line: usize,
        text: String,
    },

    /// An entry identifier is empty or contains whitespace or control characters
    #[error("Invalid entry identifier '{0}'")]
    InvalidId(String),
}

/// Errors from index builders called out of order or with foreign data
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// A token names a field outside the builder's field list
    #[error("Field {field} is out of range for {fields} indexed fields")]
    FieldOutOfRange { field: usize, fields: usize },

    /// An entry was added before any source file was started
    #[error("Entry '{0}' added outside of a source file")]
    NoOpenFile(String),

    /// The builder was used after `finish`
    #[error("Index builder used after finish")]
    Finished,
}

/// Errors raised while discovering and reading input sources
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    /// No input file matched the requested patterns
    #[error("No files matching '{pattern}' in {}", .dir.display())]
    NoFiles { dir: PathBuf, pattern: String },

    /// The requested input format is not supported
    #[error("'{0}' is not a valid input format")]
    UnknownFormat(String),

    /// The compression format of an input file could not be handled
    #[error("Could not decompress {}: {source}", .path.display())]
    Decompress {
        path: PathBuf,
        #[source]
        source: niffler::Error,
    },

    /// A FASTA file is malformed
    #[error("Invalid FASTA in {}: {source}", .path.display())]
    Fasta {
        path: PathBuf,
        #[source]
        source: seq_io::fasta::Error,
    },

    /// An input file could not be parsed
    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// Errors in the run configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Attempted to build a configuration without a database name
    #[error("Missing database name in config builder")]
    MissingDbName,

    /// The database name does not fit the header field
    #[error("Database name '{0}' is longer than {max} characters", max = crate::header::SIZE_DBNAME)]
    DbNameTooLong(String),

    /// The release string does not fit the header field
    #[error("Release '{0}' is longer than {max} characters", max = crate::header::SIZE_RELEASE)]
    ReleaseTooLong(String),

    /// The requested field is not in the field table
    #[error("Unknown index field '{0}'")]
    UnknownField(String),

    /// The strategy or sort backend name is not recognised
    #[error("'{0}' is not a valid {1}")]
    InvalidChoice(String, &'static str),
}
