use std::io::Write;
use std::path::Path;

use log::{debug, info, warn};

use super::{
    check_fields, field_def, write_entry_index, write_field_index, EntryIndexBuilder, EntryStats,
    FieldStats,
};
use crate::entry::{Deduplicate, Entry};
use crate::error::{BuildError, IoContext, Result};
use crate::fields::FieldDef;
use crate::sort::{sort_files, Sorter};
use crate::staging::{
    create_buffered, push_token_ordinal, EntryKeys, LineReader, StagingArea, StagingWriter,
    TokenOrdinals,
};
use crate::utils::MaxLen;
use crate::writer::IndexOutput;

/// Merged entry lists, kept until every field is joined
const IDSRT_EXT: &str = "idsrt";

/// Builder staging entries and tokens as text and sorting them on disk
///
/// Staged per source file:
///
/// ```text
/// <db><NNN>.list  -> sort/merge -> <db>.idsrt ---------------------------┐
/// <db><NNN>.acnum -> sort/merge -> <db>.acnum.sort -> join with idsrt ----┴-> <db>.acnum_id2
/// <db>.acnum_id2  -> sort       -> <db>.acnum.sort2 -> acnum.trg + acnum.hit
/// ```
pub struct DiskSortedBuilder<S: Sorter> {
    sorter: S,
    area: StagingArea,
    fields: Vec<&'static FieldDef>,

    /// Staging files of the source file in progress
    writer: Option<StagingWriter>,

    /// Highest file number started
    file_count: usize,

    /// Longest identifier seen
    id_width: MaxLen,

    /// Tokens staged per field
    token_counts: Vec<usize>,

    finished: bool,
}
impl<S: Sorter> DiskSortedBuilder<S> {
    pub fn new(sorter: S, area: StagingArea, fields: Vec<&'static FieldDef>) -> Self {
        let token_counts = vec![0; fields.len()];
        Self {
            sorter,
            area,
            fields,
            writer: None,
            file_count: 0,
            id_width: MaxLen::default(),
            token_counts,
            finished: false,
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.finished {
            return Err(BuildError::Finished.into());
        }
        Ok(())
    }

    /// Ranked entries streamed from the merged entry lists
    fn ranked(&self) -> Result<Deduplicate<EntryKeys>> {
        let reader = LineReader::open(&self.area.unnumbered(IDSRT_EXT))?;
        Ok(Deduplicate::new(EntryKeys(reader)))
    }

    /// Resolves every line of a field's sorted staging file to an entry ordinal
    ///
    /// Both inputs are in entry key order so they are read in lockstep. Resolved
    /// tokens are written to `id2` as `<token>\t<ordinal>` lines. Returns the longest
    /// resolved token and the number of orphans.
    fn join(&self, sorted: &Path, id2: &Path) -> Result<(MaxLen, usize)> {
        let mut lines = LineReader::open(sorted)?;
        let mut ranked = self.ranked()?;
        let mut current = ranked.next().transpose()?;
        let mut writer = create_buffered(id2)?;
        let mut buffer = Vec::new();
        let mut width = MaxLen::default();
        let mut orphans = 0;

        while let Some((key, token)) = lines.next_entry_key()? {
            if token.is_empty() {
                return Err(lines.malformed());
            }
            while current.as_ref().is_some_and(|r| r.key < key) {
                current = ranked.next().transpose()?;
            }
            let ordinal = current
                .as_ref()
                .filter(|r| r.key == key)
                .and_then(|r| r.ordinal);
            let Some(ordinal) = ordinal else {
                debug!("Token '{token}' of discarded entry '{}' dropped", key.id);
                orphans += 1;
                continue;
            };
            buffer.clear();
            push_token_ordinal(&mut buffer, &token, ordinal);
            writer.write_all(&buffer).with_path("write", id2)?;
            width.update(&token);
        }
        writer.flush().with_path("flush", id2)?;
        Ok((width, orphans))
    }

    fn close_file(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finish()?;
        }
        Ok(())
    }
}

impl<S: Sorter> EntryIndexBuilder for DiskSortedBuilder<S> {
    fn begin_file(&mut self, file_number: usize) -> Result<()> {
        self.ensure_active()?;
        self.close_file()?;
        self.writer = Some(StagingWriter::create(&self.area, file_number, &self.fields)?);
        self.file_count = self.file_count.max(file_number);
        Ok(())
    }

    fn add_entry(&mut self, entry: Entry) -> Result<()> {
        self.ensure_active()?;
        check_fields(&entry, self.fields.len())?;
        let Some(writer) = &mut self.writer else {
            return Err(BuildError::NoOpenFile(entry.key.id).into());
        };
        writer.write_entry(&entry)?;
        self.id_width.update(&entry.key.id);
        for token in &entry.tokens {
            self.token_counts[token.field] += 1;
        }
        Ok(())
    }

    fn end_file(&mut self) -> Result<()> {
        self.close_file()
    }

    fn write_entrynam(&mut self, output: &IndexOutput) -> Result<EntryStats> {
        self.ensure_active()?;
        self.close_file()?;
        if self.file_count == 0 {
            return write_entry_index(std::iter::empty(), output, self.id_width.get());
        }
        info!("Sorting entry lists of {} files", self.file_count);
        sort_files(
            &self.sorter,
            &self.area.base(),
            "list",
            IDSRT_EXT,
            self.file_count,
            self.area.cleanup(),
        )?;
        write_entry_index(self.ranked()?, output, self.id_width.get())
    }

    fn write_field(&mut self, field: usize, output: &IndexOutput) -> Result<FieldStats> {
        self.ensure_active()?;
        let def = field_def(&self.fields, field)?;
        let tokens = self.token_counts[field];
        if self.file_count == 0 {
            let (targets, hits) = write_field_index(std::iter::empty(), output, def, 0)?;
            return Ok(FieldStats {
                tokens,
                orphans: 0,
                targets,
                hits,
            });
        }

        info!("Sorting {} {} tokens", tokens, def.index_name);
        let sort_ext = format!("{}.sort", def.index_name);
        let id2_ext = format!("{}_id2", def.index_name);
        let sort2_ext = format!("{}.sort2", def.index_name);
        let base = self.area.base();
        sort_files(
            &self.sorter,
            &base,
            def.index_name,
            &sort_ext,
            self.file_count,
            self.area.cleanup(),
        )?;

        let sorted = self.area.unnumbered(&sort_ext);
        let (width, orphans) = self.join(&sorted, &self.area.unnumbered(&id2_ext))?;
        self.area.remove(&sorted)?;
        if orphans > 0 {
            warn!(
                "{orphans} {} tokens of discarded duplicate entries dropped",
                def.index_name
            );
        }

        sort_files(&self.sorter, &base, &id2_ext, &sort2_ext, 0, self.area.cleanup())?;
        let sorted = self.area.unnumbered(&sort2_ext);
        let pairs = TokenOrdinals(LineReader::open(&sorted)?);
        let (targets, hits) = write_field_index(pairs, output, def, width.get())?;
        self.area.remove(&sorted)?;

        Ok(FieldStats {
            tokens,
            orphans,
            targets,
            hits,
        })
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        self.close_file()?;
        self.area.remove(&self.area.unnumbered(IDSRT_EXT))
    }
}
