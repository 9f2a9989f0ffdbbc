//! Orchestration of a whole indexing run
//!
//! ```text
//! file list -> division.lkp
//!           -> parser per file -> builder -> entrynam.idx
//!                                         -> <field>.trg / <field>.hit
//! ```
//!
//! The run is single threaded. Every error aborts it; a failed run leaves partial
//! output and staging files behind and must be repeated from scratch.

use std::fs;
use std::time::Instant;

use log::{info, warn};

use crate::builder::{DiskSortedBuilder, EntryIndexBuilder, InMemoryBuilder};
use crate::config::{IndexConfig, Strategy};
use crate::division::write_division;
use crate::entry::{normalize_token, Entry, EntryKey, FieldToken};
use crate::error::{IoContext, Result};
use crate::fields::FieldDef;
use crate::report::{FileReport, RunReport};
use crate::source::{EntrySource, InputFile, SourceEntry};
use crate::staging::StagingArea;
use crate::writer::IndexOutput;

/// Builds the complete index set of one database
pub struct Indexer {
    config: IndexConfig,
}
impl Indexer {
    #[must_use]
    pub fn new(config: IndexConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    fn builder(&self) -> Box<dyn EntryIndexBuilder> {
        let fields = self.config.fields.clone();
        match self.config.strategy {
            Strategy::InMemory => Box::new(InMemoryBuilder::new(fields)),
            Strategy::DiskSorted => {
                let area = StagingArea::new(
                    &self.config.staging_dir,
                    &self.config.meta.dbname,
                    self.config.cleanup,
                );
                let sorter = self.config.sort.sorter(&self.config.staging_dir);
                Box::new(DiskSortedBuilder::new(sorter, area, fields))
            }
        }
    }

    /// Converts a parsed entry, keeping only the tokens of indexed fields
    fn entry(&self, source: SourceEntry, file_number: usize) -> Result<Entry> {
        let key = EntryKey::new(source.id, source.record_offset, source.seq_offset, file_number)?;
        let tokens = source
            .tokens
            .into_iter()
            .filter_map(|(field, token)| {
                let idx = position(&self.config.fields, field)?;
                normalize_token(&token).map(|token| FieldToken { field: idx, token })
            })
            .collect();
        Ok(Entry { key, tokens })
    }

    /// Indexes `files` in order, opening each with `open`
    ///
    /// File numbers follow the order of `files`, starting at 1.
    pub fn run<S, F>(&self, files: &[InputFile], mut open: F) -> Result<RunReport>
    where
        S: EntrySource,
        F: FnMut(&InputFile) -> Result<S>,
    {
        let start = Instant::now();
        let config = &self.config;
        fs::create_dir_all(&config.index_dir).with_path("create", &config.index_dir)?;
        fs::create_dir_all(&config.staging_dir).with_path("create", &config.staging_dir)?;
        let output = IndexOutput::new(&config.index_dir, config.meta.clone());

        info!(
            "Indexing {} files into {} ({} strategy)",
            files.len(),
            config.index_dir.display(),
            config.strategy
        );
        write_division(&output, files)?;

        let mut builder = self.builder();
        let mut reports = Vec::with_capacity(files.len());
        for (idx, file) in files.iter().enumerate() {
            let file_number = idx + 1;
            let mut source = open(file)?;
            builder.begin_file(file_number)?;
            let mut entries = 0;
            while let Some(parsed) = source.next_entry()? {
                builder.add_entry(self.entry(parsed, file_number)?)?;
                entries += 1;
            }
            builder.end_file()?;
            info!("{file_number:5} {entries:9} {}", file.path.display());
            if entries == 0 {
                warn!("No entries found in {}", file.path.display());
            }
            reports.push(FileReport {
                file_number,
                name: file.division_name(),
                entries,
            });
        }

        let entries = builder.write_entrynam(&output)?;
        info!(
            "{} entries indexed, {} duplicates dropped",
            entries.entries, entries.duplicates
        );
        let mut fields = Vec::with_capacity(config.fields.len());
        for (idx, field) in config.fields.iter().enumerate() {
            let stats = builder.write_field(idx, &output)?;
            info!(
                "{}: {} tokens, {} targets, {} hits",
                field.index_name, stats.tokens, stats.targets, stats.hits
            );
            fields.push((*field, stats));
        }
        builder.finish()?;

        let report = RunReport {
            meta: config.meta.clone(),
            strategy: config.strategy.to_string(),
            files: reports,
            entries,
            fields,
            elapsed: start.elapsed(),
        };
        if let Some(path) = &config.report {
            report.save(path)?;
        }
        Ok(report)
    }
}

fn position(fields: &[&'static FieldDef], field: &FieldDef) -> Option<usize> {
    fields.iter().position(|f| *f == field)
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::config::{IndexConfigBuilder, SortConfig, SortEngine};
    use crate::fields::{self, DIVISION_FILE, ENTRYNAM_FILE};
    use crate::header::IndexDate;
    use crate::reader::{DbIndex, IndexFile};
    use crate::record::{DivisionRecord, HitRecord, TargetRecord};
    use crate::sort::sort_available;
    use crate::source::MemorySource;
    use anyhow::Result;
    use std::path::Path;

    fn entry(id: &str, rpos: u64, accs: &[&str]) -> SourceEntry {
        let mut entry = SourceEntry::new(id, rpos).with_seq_offset(rpos + 40);
        for acc in accs {
            entry.add_token(&fields::ACC, *acc);
        }
        entry.add_token(&fields::KEY, " heat shock ");
        entry
    }

    /// Three files of two entries each with accessions {A1,A2}, {A2,A3}, {A4}
    fn corpus() -> Vec<(InputFile, Vec<SourceEntry>)> {
        vec![
            (
                InputFile::new("/db/f1.dat"),
                vec![entry("E1", 0, &["A1"]), entry("E2", 100, &["A2"])],
            ),
            (
                InputFile::new("/db/f2.dat"),
                vec![entry("E3", 0, &["A2"]), entry("E4", 100, &["A3"])],
            ),
            (
                InputFile::new("/db/f3.dat"),
                vec![entry("E5", 0, &["A4"]), entry("E6", 100, &[])],
            ),
        ]
    }

    fn run(index_dir: &Path, strategy: Strategy, extra: Vec<SourceEntry>) -> crate::Result<RunReport> {
        let mut corpus = corpus();
        corpus[2].1.extend(extra);
        run_corpus(index_dir, strategy, SortEngine::Memory, &corpus)
    }

    fn run_corpus(
        index_dir: &Path,
        strategy: Strategy,
        engine: SortEngine,
        corpus: &[(InputFile, Vec<SourceEntry>)],
    ) -> crate::Result<RunReport> {
        let config = IndexConfigBuilder::new()
            .dbname("TESTDB")
            .release("1.0")
            .date(IndexDate::new(17, 10, 26))
            .index_dir(index_dir)
            .fields(vec![&fields::FIELDS[0], &fields::FIELDS[3]])
            .strategy(strategy)
            .sort(SortConfig {
                engine,
                ..SortConfig::default()
            })
            .build()?;
        let files: Vec<InputFile> = corpus.iter().map(|(file, _)| file.clone()).collect();
        Indexer::new(config).run(&files, |file| {
            let entries = corpus
                .iter()
                .find(|(f, _)| f == file)
                .map(|(_, entries)| entries.clone())
                .unwrap_or_default();
            Ok(MemorySource::from(entries))
        })
    }

    fn read_all(dir: &Path) -> Result<Vec<(String, Vec<u8>)>> {
        let mut files = Vec::new();
        for name in [DIVISION_FILE, ENTRYNAM_FILE, "acnum.trg", "acnum.hit", "keyword.trg", "keyword.hit"] {
            files.push((name.to_string(), fs::read(dir.join(name))?));
        }
        Ok(files)
    }

    #[test]
    fn three_file_scenario() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let report = run(dir.path(), Strategy::DiskSorted, vec![])?;
        assert_eq!(report.entries.entries, 6);
        assert_eq!(report.entries_read(), 6);

        let division = IndexFile::<DivisionRecord>::open(dir.path().join(DIVISION_FILE))?;
        assert_eq!(division.num_records(), 3);

        let trg = IndexFile::<TargetRecord>::open(dir.path().join("acnum.trg"))?;
        let hit = IndexFile::<HitRecord>::open(dir.path().join("acnum.hit"))?;
        assert_eq!(trg.num_records(), 4);
        assert_eq!(hit.num_records(), 5);
        let a2 = trg.get(1)?;
        assert_eq!((a2.token.as_str(), a2.hit_count), ("A2", 2));

        let keyword = IndexFile::<TargetRecord>::open(dir.path().join("keyword.trg"))?;
        assert_eq!(keyword.get(0)?.token, "heat shock");
        assert_eq!(keyword.get(0)?.hit_count, 6);

        // every hit ordinal resolves to the entry that carried the token
        let db = DbIndex::open(dir.path(), &[&fields::FIELDS[0]])?;
        let ids: Vec<String> = db
            .find_by_field("acc", "A2")?
            .into_iter()
            .map(|loc| loc.record.id)
            .collect();
        assert_eq!(ids, ["E2", "E3"]);
        let e4 = db.find_entry("E4")?.unwrap();
        assert_eq!((e4.ordinal, e4.file_name.as_str()), (4, "f2.dat"));
        assert_eq!(e4.record.seq_offset, 140);
        Ok(())
    }

    #[test]
    fn duplicate_ids_keep_one_record() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let extra = vec![entry("E1", 200, &["A9"]), entry("E1", 300, &["A1"])];
        let report = run(dir.path(), Strategy::InMemory, extra)?;
        assert_eq!(report.entries.entries, 6);
        assert_eq!(report.entries.duplicates, 2);
        assert_eq!(report.entries_read(), 8);

        let db = DbIndex::open(dir.path(), &[&fields::FIELDS[0]])?;
        let e1 = db.find_entry("E1")?.unwrap();
        assert_eq!((e1.record.file_number, e1.record.record_offset), (1, 0));
        assert!(db.find_by_field("acc", "A9")?.is_empty());
        // A1 of the discarded copy does not add a second hit
        assert_eq!(db.find_by_field("acc", "A1")?.len(), 1);
        Ok(())
    }

    #[test]
    fn strategies_and_reruns_are_byte_identical() -> Result<()> {
        let extra = vec![entry("E3", 500, &["A7"])];
        let first = tempfile::tempdir()?;
        let second = tempfile::tempdir()?;
        let memory = tempfile::tempdir()?;
        run(first.path(), Strategy::DiskSorted, extra.clone())?;
        run(second.path(), Strategy::DiskSorted, extra.clone())?;
        run(memory.path(), Strategy::InMemory, extra)?;

        let reference = read_all(first.path())?;
        assert_eq!(reference, read_all(second.path())?);
        assert_eq!(reference, read_all(memory.path())?);
        Ok(())
    }

    #[test]
    fn system_sort_matches_in_memory_build() -> Result<()> {
        if !sort_available() {
            return Ok(());
        }
        // mixed case, punctuation and non-ASCII bytes
        let ids = ["AB", "AB1", "ab", "\u{c9}X", "AB2"];
        let tokens = ["A", "A B", "A!", "A\u{a0}B", "\u{e9}"];
        let corpus: Vec<(InputFile, Vec<SourceEntry>)> = (0..5)
            .map(|n| {
                let entries = (0..3)
                    .map(|k| {
                        let rpos = k as u64 * 100;
                        let mut entry = SourceEntry::new(ids[(n + k) % 5], rpos).with_seq_offset(rpos + 40);
                        entry.add_token(&fields::ACC, tokens[(2 * n + k) % 5]);
                        entry.add_token(&fields::KEY, tokens[(n + 2 * k) % 5]);
                        entry
                    })
                    .collect();
                (InputFile::new(format!("/db/part{n}.dat")), entries)
            })
            .collect();

        let system = tempfile::tempdir()?;
        let memory = tempfile::tempdir()?;
        let report = run_corpus(system.path(), Strategy::DiskSorted, SortEngine::System, &corpus)?;
        run_corpus(memory.path(), Strategy::InMemory, SortEngine::System, &corpus)?;

        assert_eq!(report.entries.entries, 5);
        assert_eq!(report.entries.duplicates, 10);
        assert_eq!(read_all(system.path())?, read_all(memory.path())?);
        // staging files are consumed
        assert_eq!(fs::read_dir(system.path())?.count(), 6);
        Ok(())
    }

    #[test]
    fn unselected_fields_are_ignored() -> Result<()> {
        let config = IndexConfigBuilder::new()
            .dbname("TESTDB")
            .fields(vec![&fields::FIELDS[3]])
            .build()?;
        let indexer = Indexer::new(config);
        let entry = indexer.entry(entry("E1", 0, &["A1"]), 1)?;
        assert_eq!(entry.tokens.len(), 1);
        assert_eq!(entry.tokens[0], FieldToken { field: 0, token: "heat shock".into() });
        Ok(())
    }

    #[test]
    fn report_is_saved() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let report_path = dir.path().join("TESTDB.log");
        let config = IndexConfigBuilder::new()
            .dbname("TESTDB")
            .index_dir(dir.path())
            .strategy(Strategy::InMemory)
            .report(&report_path)
            .build()?;
        let files = vec![InputFile::new("/db/only.dat")];
        Indexer::new(config).run(&files, |_| Ok(MemorySource::from(vec![entry("E1", 0, &["A1"])])))?;
        let text = fs::read_to_string(report_path)?;
        assert!(text.contains("Entries indexed:   1"));
        Ok(())
    }
}
