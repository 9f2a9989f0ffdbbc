use std::io::Read;
use std::path::{Path, PathBuf};

use seq_io::fasta::{Reader, Record};

use super::{description_words, looks_like_accession};
use crate::error::{Result, SourceError};
use crate::fields;
use crate::source::{EntrySource, SourceEntry};

/// Parser for FASTA files with `>id [accession] description` headers
///
/// The second header word is indexed as an accession when it looks like one (and as
/// a sequence version when it carries a `.n` suffix); the remaining words are
/// description tokens. The record offset is that of the header line and the
/// sequence offset that of the line following it, assuming `\n` line ends.
pub struct FastaParser<R: Read> {
    reader: Reader<R>,
    path: PathBuf,
}
impl<R: Read> FastaParser<R> {
    pub fn new(reader: R, path: &Path) -> Self {
        Self {
            reader: Reader::new(reader),
            path: path.to_path_buf(),
        }
    }

    fn parse_error(&self, line: u64, message: &str) -> crate::Error {
        SourceError::Parse {
            path: self.path.clone(),
            line: line as usize + 1,
            message: message.to_string(),
        }
        .into()
    }
}

fn parse_header(offset: u64, header: &str) -> Option<SourceEntry> {
    let mut words = header.split_whitespace();
    let mut entry = SourceEntry::new(words.next()?, offset);
    let mut rest = words.collect::<Vec<_>>();
    if let Some(&first) = rest.first() {
        if looks_like_accession(first) {
            match first.split_once('.') {
                Some((acc, _)) => {
                    entry.add_token(&fields::ACC, acc);
                    entry.add_token(&fields::SV, first);
                }
                None => entry.add_token(&fields::ACC, first),
            }
            rest.remove(0);
        }
    }
    for word in description_words(&rest.join(" ")) {
        entry.add_token(&fields::DES, word);
    }
    Some(entry)
}

impl<R: Read> EntrySource for FastaParser<R> {
    fn next_entry(&mut self) -> Result<Option<SourceEntry>> {
        let (header, header_len) = match self.reader.next() {
            None => return Ok(None),
            Some(Err(source)) => {
                return Err(SourceError::Fasta {
                    path: self.path.clone(),
                    source,
                }
                .into())
            }
            Some(Ok(record)) => (
                String::from_utf8_lossy(record.head()).into_owned(),
                record.head().len() as u64,
            ),
        };
        let (line, offset) = self
            .reader
            .position()
            .map_or((0, 0), |pos| (pos.line(), pos.byte()));
        let Some(entry) = parse_header(offset, &header) else {
            return Err(self.parse_error(line, "header without an identifier"));
        };
        // '>' + header + '\n'
        let seq_offset = offset + header_len + 2;
        Ok(Some(entry.with_seq_offset(seq_offset)))
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;
    use std::fs::File;
    use std::io::{Cursor, Write};

    use crate::parser::SourceFormat;

    const FASTA: &str = "\
>HSBGL1 X56734.1 Human beta-globin gene, exon 1
ACGTACGTAC
GTACGT
>HSBGL2 complete cds
ACGT
>HSBGL3
";

    #[test]
    fn parses_headers_and_offsets() -> Result<()> {
        let mut parser = FastaParser::new(Cursor::new(FASTA.as_bytes()), Path::new("x.fa"));

        let first = parser.next_entry()?.unwrap();
        assert_eq!(first.id, "HSBGL1");
        assert_eq!(first.record_offset, 0);
        assert_eq!(first.seq_offset, Some(FASTA.find("ACGTACGTAC").unwrap() as u64));
        let acc: Vec<_> = first.tokens.iter().filter(|(f, _)| **f == fields::ACC).collect();
        assert_eq!(acc.len(), 1);
        assert_eq!(acc[0].1, "X56734");
        assert!(first.tokens.contains(&(&fields::SV, "X56734.1".to_string())));
        assert!(first.tokens.contains(&(&fields::DES, "beta-globin".to_string())));

        let second = parser.next_entry()?.unwrap();
        assert_eq!(second.record_offset, FASTA.find(">HSBGL2").unwrap() as u64);
        assert!(second.tokens.iter().all(|(f, _)| **f == fields::DES));
        assert_eq!(second.tokens.len(), 2);

        let third = parser.next_entry()?.unwrap();
        assert_eq!(third.id, "HSBGL3");
        assert!(third.tokens.is_empty());
        assert_eq!(third.seq_offset, Some(FASTA.len() as u64));

        assert!(parser.next_entry()?.is_none());
        Ok(())
    }

    #[test]
    fn rejects_leading_sequence() {
        let mut parser = FastaParser::new(Cursor::new(&b"ACGT\n>A\n"[..]), Path::new("x.fa"));
        assert!(parser.next_entry().is_err());
    }

    #[test]
    fn empty_header_is_an_error() {
        let mut parser = FastaParser::new(Cursor::new(&b">\nACGT\n"[..]), Path::new("x.fa"));
        assert!(parser.next_entry().is_err());
    }

    #[test]
    fn reads_compressed_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("globins.fa.gz");
        {
            let file = Box::new(File::create(&path)?);
            let mut writer = niffler::get_writer(file, niffler::Format::Gzip, niffler::Level::One)?;
            writer.write_all(FASTA.as_bytes())?;
        }

        let mut source = SourceFormat::Fasta.open(&path)?;
        let mut ids = Vec::new();
        while let Some(entry) = source.next_entry()? {
            ids.push(entry.id);
        }
        assert_eq!(ids, ["HSBGL1", "HSBGL2", "HSBGL3"]);
        Ok(())
    }
}
