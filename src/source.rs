//! Input files and the entry stream the indexer consumes from them
//!
//! A format parser turns one source file into an [`EntrySource`]: a stream of
//! [`SourceEntry`] values carrying the entry identifier, its byte offsets and its
//! field tokens. [`FileList`] enumerates the files of a database directory.

use std::fs;
use std::path::{Path, PathBuf};

use auto_impl::auto_impl;

use crate::error::{IoContext, Result, SourceError};
use crate::fields::FieldDef;

/// One record as reported by a format parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub id: String,
    /// Byte offset of the record in its data file
    pub record_offset: u64,
    /// Byte offset of the sequence, if the format stores it separately
    pub seq_offset: Option<u64>,
    /// Raw field tokens, normalised by the indexer
    pub tokens: Vec<(&'static FieldDef, String)>,
}
impl SourceEntry {
    pub fn new(id: impl Into<String>, record_offset: u64) -> Self {
        Self {
            id: id.into(),
            record_offset,
            seq_offset: None,
            tokens: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_seq_offset(mut self, offset: u64) -> Self {
        self.seq_offset = Some(offset);
        self
    }

    pub fn add_token(&mut self, field: &'static FieldDef, token: impl Into<String>) {
        self.tokens.push((field, token.into()));
    }
}

/// A stream of entries read from one source file
#[auto_impl(&mut, Box)]
pub trait EntrySource {
    /// Returns the next entry, or `None` once the source is exhausted
    fn next_entry(&mut self) -> Result<Option<SourceEntry>>;
}

/// Entries held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: std::vec::IntoIter<SourceEntry>,
}
impl From<Vec<SourceEntry>> for MemorySource {
    fn from(entries: Vec<SourceEntry>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}
impl EntrySource for MemorySource {
    fn next_entry(&mut self) -> Result<Option<SourceEntry>> {
        Ok(self.entries.next())
    }
}

/// A data file to index, with an optional companion sequence file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub seq_path: Option<PathBuf>,
}
impl InputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seq_path: None,
        }
    }

    #[must_use]
    pub fn with_seq(mut self, path: impl Into<PathBuf>) -> Self {
        self.seq_path = Some(path.into());
        self
    }

    /// File name without its directory
    #[must_use]
    pub fn name(&self) -> String {
        file_name(&self.path)
    }

    /// Name stored in the division table: the data file name, followed by the
    /// sequence file name when there is one
    #[must_use]
    pub fn division_name(&self) -> String {
        match &self.seq_path {
            Some(seq) => format!("{} {}", self.name(), file_name(seq)),
            None => self.name(),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Matches a file name against a pattern with `*` and `?` wildcards
#[must_use]
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let (p, n) = (pattern.as_bytes(), name.as_bytes());
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ni < n.len() {
        match p.get(pi) {
            Some(b'*') => {
                star = Some((pi, ni));
                pi += 1;
            }
            Some(&c) if c == b'?' || c == n[ni] => {
                pi += 1;
                ni += 1;
            }
            _ => match star {
                Some((sp, sn)) => {
                    pi = sp + 1;
                    ni = sn + 1;
                    star = Some((sp, sn + 1));
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|&c| c == b'*')
}

fn split_patterns(patterns: &str) -> Vec<String> {
    patterns
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Enumerates the input files of a database directory
#[derive(Debug, Clone)]
pub struct FileList {
    dir: PathBuf,
    include: Vec<String>,
    exclude: Vec<String>,
    /// Extension of companion sequence files
    companion: Option<String>,
}
impl FileList {
    /// Every file in `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            include: vec!["*".to_string()],
            exclude: Vec::new(),
            companion: None,
        }
    }

    /// Comma separated wildcard patterns a file name must match
    #[must_use]
    pub fn include(mut self, patterns: &str) -> Self {
        let patterns = split_patterns(patterns);
        if !patterns.is_empty() {
            self.include = patterns;
        }
        self
    }

    /// Comma separated wildcard patterns to leave out
    #[must_use]
    pub fn exclude(mut self, patterns: &str) -> Self {
        self.exclude = split_patterns(patterns);
        self
    }

    /// Pairs every data file with `<stem>.<ext>` when that file exists
    ///
    /// Companion files are never indexed on their own.
    #[must_use]
    pub fn companion(mut self, ext: &str) -> Self {
        self.companion = Some(ext.trim_start_matches('.').to_string());
        self
    }

    fn selected(&self, name: &str) -> bool {
        self.include.iter().any(|p| wildcard_match(p, name))
            && !self.exclude.iter().any(|p| wildcard_match(p, name))
    }

    /// Lists the matching regular files sorted by name
    pub fn scan(&self) -> Result<Vec<InputFile>> {
        let mut names = Vec::new();
        for item in fs::read_dir(&self.dir).with_path("read directory", &self.dir)? {
            let item = item.with_path("read directory", &self.dir)?;
            let is_file = item
                .file_type()
                .with_path("stat", &item.path())?
                .is_file();
            let name = item.file_name().to_string_lossy().into_owned();
            if is_file && self.selected(&name) {
                names.push(name);
            }
        }
        names.sort_unstable();

        if let Some(ext) = &self.companion {
            let suffix = format!(".{ext}");
            names.retain(|name| !name.ends_with(&suffix));
        }
        if names.is_empty() {
            return Err(SourceError::NoFiles {
                dir: self.dir.clone(),
                pattern: self.include.join(","),
            }
            .into());
        }

        Ok(names
            .into_iter()
            .map(|name| {
                let path = self.dir.join(&name);
                let seq = self
                    .companion
                    .as_ref()
                    .map(|ext| path.with_extension(ext))
                    .filter(|seq| seq.is_file());
                InputFile {
                    path,
                    seq_path: seq,
                }
            })
            .collect())
    }
}
