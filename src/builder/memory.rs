use log::{info, warn};

use super::{
    check_fields, field_def, write_entry_index, write_field_index, EntryIndexBuilder, EntryStats,
    FieldStats,
};
use crate::entry::{Deduplicate, Entry, EntryKey, Ranked};
use crate::error::{BuildError, Result};
use crate::fields::FieldDef;
use crate::utils::MaxLen;
use crate::writer::IndexOutput;

/// Builder holding every entry and token in memory
pub struct InMemoryBuilder {
    fields: Vec<&'static FieldDef>,

    /// Entry keys in the order they were added
    entries: Vec<EntryKey>,

    /// Per field: index into `entries` and token
    tokens: Vec<Vec<(usize, String)>>,

    /// Entries in sorted order with their ordinals, set by `write_entrynam`
    ranked: Vec<Ranked>,

    id_width: MaxLen,

    finished: bool,
}
impl InMemoryBuilder {
    #[must_use]
    pub fn new(fields: Vec<&'static FieldDef>) -> Self {
        let tokens = vec![Vec::new(); fields.len()];
        Self {
            fields,
            entries: Vec::new(),
            tokens,
            ranked: Vec::new(),
            id_width: MaxLen::default(),
            finished: false,
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.finished {
            return Err(BuildError::Finished.into());
        }
        Ok(())
    }

    /// Ordinal of an entry, `None` if it was discarded as a duplicate
    ///
    /// Resolves to the first ranked entry with an equal key, as the disk join does.
    fn ordinal(&self, key: &EntryKey) -> Option<u32> {
        let pos = self.ranked.partition_point(|r| r.key < *key);
        self.ranked
            .get(pos)
            .filter(|r| r.key == *key)
            .and_then(|r| r.ordinal)
    }
}

impl EntryIndexBuilder for InMemoryBuilder {
    fn begin_file(&mut self, _file_number: usize) -> Result<()> {
        self.ensure_active()
    }

    fn add_entry(&mut self, entry: Entry) -> Result<()> {
        self.ensure_active()?;
        check_fields(&entry, self.fields.len())?;
        let idx = self.entries.len();
        self.id_width.update(&entry.key.id);
        for token in entry.tokens {
            self.tokens[token.field].push((idx, token.token));
        }
        self.entries.push(entry.key);
        Ok(())
    }

    fn end_file(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_entrynam(&mut self, output: &IndexOutput) -> Result<EntryStats> {
        self.ensure_active()?;
        info!("Sorting {} entries in memory", self.entries.len());
        let mut sorted = self.entries.clone();
        sorted.sort_unstable();
        self.ranked = Deduplicate::new(sorted.into_iter().map(Ok)).collect::<Result<_>>()?;
        write_entry_index(self.ranked.iter().cloned().map(Ok), output, self.id_width.get())
    }

    fn write_field(&mut self, field: usize, output: &IndexOutput) -> Result<FieldStats> {
        self.ensure_active()?;
        let def = field_def(&self.fields, field)?;
        let tokens = std::mem::take(&mut self.tokens[field]);
        let received = tokens.len();

        let mut width = MaxLen::default();
        let mut pairs = Vec::with_capacity(received);
        for (idx, token) in tokens {
            if let Some(ordinal) = self.ordinal(&self.entries[idx]) {
                width.update(&token);
                pairs.push((token, ordinal));
            }
        }
        let orphans = received - pairs.len();
        if orphans > 0 {
            warn!(
                "{orphans} {} tokens of discarded duplicate entries dropped",
                def.index_name
            );
        }

        info!("Sorting {} {} tokens in memory", pairs.len(), def.index_name);
        pairs.sort_unstable();
        let (targets, hits) = write_field_index(pairs.into_iter().map(Ok), output, def, width.get())?;
        Ok(FieldStats {
            tokens: received,
            orphans,
            targets,
            hits,
        })
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        self.entries = Vec::new();
        self.ranked = Vec::new();
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::builder::testing::output;
    use crate::entry::FieldToken;
    use crate::fields;
    use crate::reader::IndexFile;
    use crate::record::{EntryRecord, HitRecord};
    use anyhow::Result;

    fn add(builder: &mut InMemoryBuilder, id: &str, rpos: u64, tokens: &[&str]) -> Result<()> {
        builder.add_entry(Entry {
            key: EntryKey::new(id, rpos, None, 1)?,
            tokens: tokens
                .iter()
                .map(|t| FieldToken {
                    field: 0,
                    token: (*t).to_string(),
                })
                .collect(),
        })?;
        Ok(())
    }

    #[test]
    fn three_copies_leave_one_record() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = output(dir.path());
        let mut builder = InMemoryBuilder::new(vec![&fields::ACC]);
        builder.begin_file(1)?;
        add(&mut builder, "X001", 300, &["B"])?;
        add(&mut builder, "X001", 100, &["A"])?;
        add(&mut builder, "X001", 200, &["C"])?;
        builder.end_file()?;

        let stats = builder.write_entrynam(&out)?;
        assert_eq!(stats, EntryStats { entries: 1, duplicates: 2 });
        let entries = IndexFile::<EntryRecord>::open(out.path("entrynam.idx"))?;
        assert_eq!(entries.num_records(), 1);
        assert_eq!(entries.get(0)?.record_offset, 100);

        let field = builder.write_field(0, &out)?;
        assert_eq!((field.targets, field.orphans), (1, 2));
        Ok(())
    }

    #[test]
    fn repeated_token_is_one_hit() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = output(dir.path());
        let mut builder = InMemoryBuilder::new(vec![&fields::ACC]);
        add(&mut builder, "X001", 0, &["A1", "A1", "A1"])?;
        builder.write_entrynam(&out)?;
        let field = builder.write_field(0, &out)?;
        assert_eq!((field.tokens, field.targets, field.hits), (3, 1, 1));
        let hits = IndexFile::<HitRecord>::open(out.path("acnum.hit"))?;
        assert_eq!(hits.get(0)?, HitRecord(1));
        Ok(())
    }

    #[test]
    fn foreign_fields_and_late_calls_are_errors() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = output(dir.path());
        let mut builder = InMemoryBuilder::new(vec![&fields::ACC]);
        let foreign = Entry {
            key: EntryKey::new("X002", 0, None, 1)?,
            tokens: vec![FieldToken {
                field: 2,
                token: "A1".into(),
            }],
        };
        assert!(matches!(
            builder.add_entry(foreign),
            Err(crate::Error::BuildError(BuildError::FieldOutOfRange { field: 2, fields: 1 }))
        ));
        add(&mut builder, "X002", 0, &["A1"])?;
        builder.write_entrynam(&out)?;
        assert!(builder.write_field(1, &out).is_err());
        builder.finish()?;
        assert!(matches!(
            builder.write_field(0, &out),
            Err(crate::Error::BuildError(BuildError::Finished))
        ));
        Ok(())
    }
}
