//! # Flat-file entry parsers
//!
//! Minimal parsers turning sequence database files into [`EntrySource`] streams.
//! They only extract what the indexes need: the entry name, byte offsets and field
//! tokens. Sequence data is skipped.

mod embl;
mod fasta;

pub use embl::EmblParser;
pub use fasta::FastaParser;

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{IoContext, Result, SourceError};
use crate::source::EntrySource;

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFormat {
    /// EMBL and Swiss-Prot line-code files
    #[default]
    Embl,
    Fasta,
}
impl FromStr for SourceFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "embl" | "em" | "swissprot" | "swiss" | "sw" => Ok(Self::Embl),
            "fasta" | "fa" => Ok(Self::Fasta),
            _ => Err(SourceError::UnknownFormat(s.to_string()).into()),
        }
    }
}
impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embl => write!(f, "embl"),
            Self::Fasta => write!(f, "fasta"),
        }
    }
}
impl SourceFormat {
    /// Opens a data file as an entry stream in this format
    ///
    /// FASTA files may be compressed; offsets then refer to the decompressed stream.
    pub fn open(self, path: &Path) -> Result<Box<dyn EntrySource>> {
        let file = File::open(path).with_path("open", path)?;
        Ok(match self {
            Self::Embl => Box::new(EmblParser::new(BufReader::new(file), path)),
            Self::Fasta => {
                let (reader, _format) = niffler::get_reader(Box::new(file)).map_err(|source| {
                    SourceError::Decompress {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                Box::new(FastaParser::new(reader, path))
            }
        })
    }
}

/// Line reader tracking the byte offset and number of every line, used by the EMBL
/// parser
pub(crate) struct Lines<R: BufRead> {
    reader: R,
    path: PathBuf,
    buffer: Vec<u8>,
    /// Offset of the next line
    offset: u64,
    line_no: usize,
}
impl<R: BufRead> Lines<R> {
    pub fn new(reader: R, path: &Path) -> Self {
        Self {
            reader,
            path: path.to_path_buf(),
            buffer: Vec::new(),
            offset: 0,
            line_no: 0,
        }
    }

    /// Next line without its terminator, with the offset of its first byte
    pub fn next_line(&mut self) -> Result<Option<(u64, &[u8])>> {
        self.buffer.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.buffer)
            .with_path("read", &self.path)?;
        if n == 0 {
            return Ok(None);
        }
        let start = self.offset;
        self.offset += n as u64;
        self.line_no += 1;
        let mut line = self.buffer.as_slice();
        while let [rest @ .., b'\n' | b'\r'] = line {
            line = rest;
        }
        Ok(Some((start, line)))
    }

    /// Offset of the next unread line
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Parse error at the line most recently read
    pub fn error(&self, message: impl Into<String>) -> crate::Error {
        SourceError::Parse {
            path: self.path.clone(),
            line: self.line_no,
            message: message.into(),
        }
        .into()
    }
}

/// Splits `text` on any byte in `separators`, dropping empty pieces
pub(crate) fn split_any<'a>(text: &'a str, separators: &'a [u8]) -> impl Iterator<Item = &'a str> + 'a {
    text.split(move |c: char| c.is_ascii() && separators.contains(&(c as u8)))
        .map(str::trim)
        .filter(|word| !word.is_empty())
}

/// Words of a description line: punctuation separated, trailing full stops removed
pub(crate) fn description_words(text: &str) -> impl Iterator<Item = &str> {
    split_any(text, b" \t,;:()[]{}\"")
        .map(|word| word.trim_end_matches('.'))
        .filter(|word| !word.is_empty())
}

/// Accession-like token: one to six letters, an optional underscore, then digits,
/// with an optional `.version` suffix
pub(crate) fn looks_like_accession(token: &str) -> bool {
    let base = token.split_once('.').map_or(token, |(base, version)| {
        if !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()) {
            base
        } else {
            ""
        }
    });
    let letters = base.bytes().take_while(u8::is_ascii_alphabetic).count();
    let rest = base[letters..].strip_prefix('_').unwrap_or(&base[letters..]);
    (1..=6).contains(&letters) && !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;
    use std::io::Cursor;

    #[test]
    fn format_names() -> Result<()> {
        assert_eq!("EMBL".parse::<SourceFormat>()?, SourceFormat::Embl);
        assert_eq!("fasta".parse::<SourceFormat>()?, SourceFormat::Fasta);
        assert!("genbank".parse::<SourceFormat>().is_err());
        Ok(())
    }

    #[test]
    fn line_offsets() -> Result<()> {
        let mut lines = Lines::new(Cursor::new(b"ab\r\ncd\n\nef".to_vec()), Path::new("x"));
        let mut seen = Vec::new();
        while let Some((offset, line)) = lines.next_line()? {
            seen.push((offset, line.to_vec()));
        }
        assert_eq!(
            seen,
            [(0, b"ab".to_vec()), (4, b"cd".to_vec()), (7, vec![]), (8, b"ef".to_vec())]
        );
        Ok(())
    }

    #[test]
    fn accession_shapes() {
        for acc in ["X56734", "AB000263.1", "NM_000546", "P12345"] {
            assert!(looks_like_accession(acc), "{acc}");
        }
        for word in ["complete", "123", "ABCDEFG1", "X56734.", "HBB_HUMAN"] {
            assert!(!looks_like_accession(word), "{word}");
        }
    }

    #[test]
    fn description_splitting() {
        let words: Vec<_> = description_words("Human (H.sapiens) beta-globin, exon 1.").collect();
        assert_eq!(words, ["Human", "H.sapiens", "beta-globin", "exon", "1"]);
    }
}
