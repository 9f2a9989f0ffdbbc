use std::io::BufRead;
use std::path::Path;

use super::{description_words, split_any, Lines};
use crate::error::Result;
use crate::fields;
use crate::source::{EntrySource, SourceEntry};

/// Parser for EMBL and Swiss-Prot style files
///
/// Entries start at an `ID` line and end at `//`. Indexed line types:
///
/// | line | field | tokens                                  |
/// |------|-------|-----------------------------------------|
/// | `AC` | acc   | `;` separated accessions                |
/// | `SV` | sv    | sequence version (`ID ...; SV n;` too)  |
/// | `DE` | des   | description words                       |
/// | `KW` | key   | `;` separated keywords                  |
/// | `OS` | org   | species name                            |
/// | `OC` | org   | `;` separated classification            |
///
/// The record offset is that of the `ID` line and the sequence offset that of the
/// `SQ` line.
pub struct EmblParser<R: BufRead> {
    lines: Lines<R>,
}
impl<R: BufRead> EmblParser<R> {
    pub fn new(reader: R, path: &Path) -> Self {
        Self {
            lines: Lines::new(reader, path),
        }
    }
}

/// Entry being assembled
struct Pending {
    entry: SourceEntry,
    /// Version number from a new-style `ID` line
    id_version: Option<String>,
    /// First accession number
    primary: Option<String>,
    has_sv: bool,
}
impl Pending {
    fn finish(mut self) -> SourceEntry {
        if let (false, Some(version), Some(primary)) = (self.has_sv, self.id_version, self.primary) {
            self.entry.add_token(&fields::SV, format!("{primary}.{version}"));
        }
        self.entry
    }
}

/// Splits an `ID` line into the entry name and an optional `SV n` version
fn parse_id(rest: &str) -> Option<(String, Option<String>)> {
    let mut parts = split_any(rest, b";");
    let name = parts.next()?.split_whitespace().next()?.to_string();
    let version = parts
        .next()
        .and_then(|part| part.strip_prefix("SV"))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    Some((name, version))
}

fn strip_stop(token: &str) -> &str {
    token.trim_end_matches('.').trim()
}

impl<R: BufRead> EntrySource for EmblParser<R> {
    fn next_entry(&mut self) -> Result<Option<SourceEntry>> {
        let mut pending: Option<Pending> = None;
        loop {
            let Some((offset, line)) = self.lines.next_line()? else {
                // a final entry without its terminator is still indexed
                return Ok(pending.map(Pending::finish));
            };
            if line.starts_with(b"//") {
                match pending {
                    Some(done) => return Ok(Some(done.finish())),
                    None => continue,
                }
            }
            if line.len() < 2 {
                continue;
            }
            let code = [line[0], line[1]];
            let rest = String::from_utf8_lossy(line.get(2..).unwrap_or_default()).into_owned();

            if &code == b"ID" {
                if pending.is_some() {
                    return Err(self.lines.error("ID line before the end of the previous entry"));
                }
                let Some((name, version)) = parse_id(&rest) else {
                    return Err(self.lines.error("ID line without an entry name"));
                };
                pending = Some(Pending {
                    entry: SourceEntry::new(name, offset),
                    id_version: version,
                    primary: None,
                    has_sv: false,
                });
                continue;
            }
            let Some(current) = pending.as_mut() else {
                continue;
            };
            let entry = &mut current.entry;
            match &code {
                b"AC" => {
                    for acc in split_any(&rest, b"; \t") {
                        if current.primary.is_none() {
                            current.primary = Some(acc.to_string());
                        }
                        entry.add_token(&fields::ACC, acc);
                    }
                }
                b"SV" => {
                    if let Some(sv) = rest.split_whitespace().next() {
                        current.has_sv = true;
                        entry.add_token(&fields::SV, sv);
                    }
                }
                b"DE" => {
                    for word in description_words(&rest) {
                        entry.add_token(&fields::DES, word);
                    }
                }
                b"KW" => {
                    for keyword in split_any(&rest, b";").map(strip_stop) {
                        if !keyword.is_empty() {
                            entry.add_token(&fields::KEY, keyword);
                        }
                    }
                }
                b"OS" => {
                    let species = strip_stop(rest.trim());
                    if !species.is_empty() {
                        entry.add_token(&fields::ORG, species);
                    }
                }
                b"OC" => {
                    for taxon in split_any(&rest, b";").map(strip_stop) {
                        if !taxon.is_empty() {
                            entry.add_token(&fields::ORG, taxon);
                        }
                    }
                }
                b"SQ" => {
                    if entry.seq_offset.is_none() {
                        entry.seq_offset = Some(offset);
                    }
                }
                _ => {}
            }
        }
    }
}
