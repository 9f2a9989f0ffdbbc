//! Text staging files used by the disk-sorted strategy
//!
//! Every source file gets its own entry list (`<db><NNN>.list`) and one token list
//! per indexed field (`<db><NNN>.<field>`). Numbers are zero padded to fixed widths
//! so that a plain byte-wise sort of whole lines orders them numerically:
//!
//! ```text
//! <db><NNN>.list      <id> <record offset> <seq offset> <file number>
//! <db><NNN>.<field>   <id> <record offset> <seq offset> <file number> <token>
//! <db>.idsrt          sorted and merged entry lists
//! <db>.<field>_id2    <token>\t<entry ordinal>
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::entry::{Entry, EntryKey};
use crate::error::{BuildError, IoContext, Result, StagingError};
use crate::fields::FieldDef;
use crate::utils::push_zero_padded;

/// Digits used for byte offsets (covers `i32::MAX`)
pub const OFFSET_DIGITS: usize = 10;
/// Digits used for file numbers (covers `i16::MAX`)
pub const FILE_DIGITS: usize = 5;
/// Digits used for entry ordinals (covers `u32::MAX`)
pub const ORDINAL_DIGITS: usize = 10;

/// Appends the staging form of an entry key (no trailing separator)
pub fn push_entry_key(buffer: &mut Vec<u8>, key: &EntryKey) {
    buffer.extend_from_slice(key.id.as_bytes());
    buffer.push(b' ');
    push_zero_padded(buffer, key.record_offset, OFFSET_DIGITS);
    buffer.push(b' ');
    push_zero_padded(buffer, key.seq_offset, OFFSET_DIGITS);
    buffer.push(b' ');
    push_zero_padded(buffer, key.file_number, FILE_DIGITS);
}

/// Appends a `<token>\t<ordinal>` line
pub fn push_token_ordinal(buffer: &mut Vec<u8>, token: &str, ordinal: u32) {
    buffer.extend_from_slice(token.as_bytes());
    buffer.push(b'\t');
    push_zero_padded(buffer, ordinal, ORDINAL_DIGITS);
    buffer.push(b'\n');
}

/// Parses an entry key from the start of a staging line, returning the rest of the line
pub fn parse_entry_key(line: &str) -> Option<(EntryKey, &str)> {
    let mut parts = line.splitn(5, ' ');
    let id = parts.next().filter(|id| !id.is_empty())?;
    let record_offset = parts.next()?.parse().ok()?;
    let seq_offset = parts.next()?.parse().ok()?;
    let file_number = parts.next()?.parse().ok()?;
    let rest = parts.next().unwrap_or("");
    Some((
        EntryKey {
            id: id.to_string(),
            record_offset,
            seq_offset,
            file_number,
        },
        rest,
    ))
}

/// Parses a `<token>\t<ordinal>` line
pub fn parse_token_ordinal(line: &str) -> Option<(&str, u32)> {
    let split = memchr::memrchr(b'\t', line.as_bytes())?;
    let ordinal = line[split + 1..].parse().ok()?;
    Some((&line[..split], ordinal))
}

/// Naming and cleanup of the staging files of one run
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
    dbname: String,
    cleanup: bool,
}
impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>, dbname: impl Into<String>, cleanup: bool) -> Self {
        Self {
            dir: dir.into(),
            dbname: dbname.into(),
            cleanup,
        }
    }

    /// Path prefix shared by every staging file: `<dir>/<db>`
    #[must_use]
    pub fn base(&self) -> PathBuf {
        self.dir.join(&self.dbname)
    }

    #[must_use]
    pub fn cleanup(&self) -> bool {
        self.cleanup
    }

    /// `<dir>/<db><NNN>.<ext>` for a 1-based source file number
    #[must_use]
    pub fn numbered(&self, number: usize, ext: &str) -> PathBuf {
        numbered_path(&self.base(), number, ext)
    }

    /// `<dir>/<db>.<ext>`
    #[must_use]
    pub fn unnumbered(&self, ext: &str) -> PathBuf {
        with_ext(&self.base(), ext)
    }

    /// Deletes a consumed staging file unless cleanup is disabled
    pub fn remove(&self, path: &Path) -> Result<()> {
        if self.cleanup {
            remove_if_exists(path)?;
        }
        Ok(())
    }
}

/// `<base><NNN>.<ext>`
#[must_use]
pub fn numbered_path(base: &Path, number: usize, ext: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!("{number:03}.{ext}"));
    PathBuf::from(name)
}

/// `<base>.<ext>`
#[must_use]
pub fn with_ext(base: &Path, ext: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e).with_path("remove", path),
        _ => Ok(()),
    }
}

pub(crate) fn create_buffered(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .with_path("create", path)
}

/// Writes the entry list and field token lists of one source file
pub struct StagingWriter {
    list: (PathBuf, BufWriter<File>),
    fields: Vec<(PathBuf, BufWriter<File>)>,
    /// Reusable line buffer
    buffer: Vec<u8>,
    /// Reusable buffer for the entry key prefix
    kbuf: Vec<u8>,
}
impl StagingWriter {
    pub fn create(area: &StagingArea, number: usize, fields: &[&'static FieldDef]) -> Result<Self> {
        let list_path = area.numbered(number, "list");
        let list = create_buffered(&list_path)?;
        let fields = fields
            .iter()
            .map(|field| {
                let path = area.numbered(number, field.index_name);
                create_buffered(&path).map(|w| (path, w))
            })
            .collect::<Result<_>>()?;
        Ok(Self {
            list: (list_path, list),
            fields,
            buffer: Vec::new(),
            kbuf: Vec::new(),
        })
    }

    pub fn write_entry(&mut self, entry: &Entry) -> Result<()> {
        self.kbuf.clear();
        push_entry_key(&mut self.kbuf, &entry.key);

        self.buffer.clear();
        self.buffer.extend_from_slice(&self.kbuf);
        self.buffer.push(b'\n');
        let (path, list) = &mut self.list;
        list.write_all(&self.buffer).with_path("write", path)?;

        for token in &entry.tokens {
            self.buffer.clear();
            self.buffer.extend_from_slice(&self.kbuf);
            self.buffer.push(b' ');
            self.buffer.extend_from_slice(token.token.as_bytes());
            self.buffer.push(b'\n');
            let fields = self.fields.len();
            let Some((path, writer)) = self.fields.get_mut(token.field) else {
                return Err(BuildError::FieldOutOfRange {
                    field: token.field,
                    fields,
                }
                .into());
            };
            writer.write_all(&self.buffer).with_path("write", path)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        let (path, list) = &mut self.list;
        list.flush().with_path("flush", path)?;
        for (path, writer) in &mut self.fields {
            writer.flush().with_path("flush", path)?;
        }
        Ok(())
    }
}

/// Line-by-line reader over a staging file that reports positions in errors
pub struct LineReader {
    path: PathBuf,
    reader: BufReader<File>,
    line: String,
    line_no: usize,
}
impl LineReader {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = File::open(path)
            .map(BufReader::new)
            .with_path("open", path)?;
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            line: String::new(),
            line_no: 0,
        })
    }

    /// Reads the next line without its terminator; `None` at end of file
    pub fn next_line(&mut self) -> Result<Option<&str>> {
        self.line.clear();
        let n = self
            .reader
            .read_line(&mut self.line)
            .with_path("read", &self.path)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        if self.line.ends_with('\n') {
            self.line.pop();
        }
        Ok(Some(&self.line))
    }

    /// Error for the line most recently returned
    #[must_use]
    pub fn malformed(&self) -> crate::Error {
        StagingError::MalformedLine {
            path: self.path.clone(),
            line: self.line_no,
            text: self.line.clone(),
        }
        .into()
    }

    /// Reads the next line as an entry key
    pub fn next_entry_key(&mut self) -> Result<Option<(EntryKey, String)>> {
        let parsed = match self.next_line()? {
            None => return Ok(None),
            Some(line) => parse_entry_key(line).map(|(key, rest)| (key, rest.to_string())),
        };
        parsed.map(Some).ok_or_else(|| self.malformed())
    }

    /// Reads the next line as a token and ordinal
    pub fn next_token_ordinal(&mut self) -> Result<Option<(String, u32)>> {
        let parsed = match self.next_line()? {
            None => return Ok(None),
            Some(line) => parse_token_ordinal(line).map(|(token, ord)| (token.to_string(), ord)),
        };
        parsed.map(Some).ok_or_else(|| self.malformed())
    }
}

/// Iterates the entry keys of a sorted entry list
pub struct EntryKeys(pub LineReader);
impl Iterator for EntryKeys {
    type Item = Result<EntryKey>;
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next_entry_key().transpose().map(|r| r.map(|(key, _)| key))
    }
}

/// Iterates the `(token, ordinal)` pairs of a sorted token file
pub struct TokenOrdinals(pub LineReader);
impl Iterator for TokenOrdinals {
    type Item = Result<(String, u32)>;
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next_token_ordinal().transpose()
    }
}
