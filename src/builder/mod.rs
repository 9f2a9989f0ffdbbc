//! # Entry and field index builders
//!
//! An [`EntryIndexBuilder`] consumes the entries of every source file, then writes
//! the entryname index and one target/hit pair per field. Two strategies exist:
//!
//! * [`DiskSortedBuilder`] stages entries and tokens as text, sorts them with a
//!   [`Sorter`](crate::sort::Sorter) and joins the sorted streams. Peak memory is
//!   bounded by the largest sort fragment.
//! * [`InMemoryBuilder`] keeps every entry and token in memory and sorts in-process.
//!
//! Both collate by raw bytes and share the post-processing below, so they produce
//! byte-identical index files for the same input.
//!
//! ## Duplicate identifiers
//!
//! In sorted order the first entry of every run of equal identifiers is kept and
//! the rest are dropped with a warning. Because entries sort by
//! `(id, record offset, seq offset, file number)`, the survivor is the one with the
//! smallest record offset, which is not necessarily the first one read.
//!
//! Field tokens are resolved to ordinals through the full entry key. Tokens of a
//! dropped duplicate therefore never attach to the surviving entry; they are counted
//! as orphans and skipped.

mod disk;
mod memory;

pub use disk::DiskSortedBuilder;
pub use memory::InMemoryBuilder;

use log::{debug, warn};

use crate::entry::{Entry, Ranked};
use crate::error::{BuildError, Result};
use crate::fields::{FieldDef, ENTRYNAM_FILE};
use crate::record::{EntryRecord, HitRecord, TargetRecord};
use crate::writer::IndexOutput;

/// Totals of the entryname index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryStats {
    /// Distinct entries written
    pub entries: u32,
    /// Entries dropped as duplicate identifiers
    pub duplicates: usize,
}

/// Totals of one field index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldStats {
    /// Tokens received for the field
    pub tokens: usize,
    /// Tokens whose entry was dropped as a duplicate
    pub orphans: usize,
    /// Target records written (unique tokens)
    pub targets: u32,
    /// Hit records written
    pub hits: u32,
}

/// Builds the entryname and field indexes of one run
///
/// Calls follow a fixed order: `begin_file` / `add_entry` / `end_file` for every
/// source file, then `write_entrynam` once, `write_field` once per field, and
/// finally `finish`.
pub trait EntryIndexBuilder {
    /// Starts a source file with a 1-based file number
    fn begin_file(&mut self, file_number: usize) -> Result<()>;

    /// Adds one entry of the current source file
    fn add_entry(&mut self, entry: Entry) -> Result<()>;

    /// Completes the current source file
    fn end_file(&mut self) -> Result<()>;

    /// Writes `entrynam.idx` and fixes the entry ordinals
    fn write_entrynam(&mut self, output: &IndexOutput) -> Result<EntryStats>;

    /// Writes the target and hit files of the field at `field` in the builder's field list
    fn write_field(&mut self, field: usize, output: &IndexOutput) -> Result<FieldStats>;

    /// Releases anything kept for the field passes
    fn finish(&mut self) -> Result<()>;
}

/// Checks that every token of `entry` belongs to one of `fields` indexed fields
pub(crate) fn check_fields(entry: &Entry, fields: usize) -> Result<()> {
    match entry.tokens.iter().find(|token| token.field >= fields) {
        Some(token) => Err(BuildError::FieldOutOfRange {
            field: token.field,
            fields,
        }
        .into()),
        None => Ok(()),
    }
}

/// Looks up the field at `field` in a builder's field list
pub(crate) fn field_def(fields: &[&'static FieldDef], field: usize) -> Result<&'static FieldDef> {
    fields.get(field).copied().ok_or_else(|| {
        BuildError::FieldOutOfRange {
            field,
            fields: fields.len(),
        }
        .into()
    })
}

/// Writes the entryname index from ranked entries in sorted order
pub(crate) fn write_entry_index<I>(ranked: I, output: &IndexOutput, width: usize) -> Result<EntryStats>
where
    I: Iterator<Item = Result<Ranked>>,
{
    let mut writer = output.create::<EntryRecord>(ENTRYNAM_FILE, width)?;
    let mut stats = EntryStats::default();
    for ranked in ranked {
        let ranked = ranked?;
        if ranked.ordinal.is_some() {
            writer.write_record(&ranked.key.to_record())?;
        } else {
            warn!(
                "Duplicate entry '{}' in file {} at offset {} ignored",
                ranked.key.id, ranked.key.file_number, ranked.key.record_offset
            );
            stats.duplicates += 1;
        }
    }
    let (_, totals) = writer.finish()?;
    stats.entries = totals.record_count;
    Ok(stats)
}

/// Hit slice of the token currently being grouped
struct Group {
    token: String,
    first_hit: u32,
    hit_count: u32,
    last_ordinal: u32,
}
impl Group {
    fn to_record(&self) -> TargetRecord {
        TargetRecord {
            first_hit: self.first_hit,
            hit_count: self.hit_count,
            token: self.token.clone(),
        }
    }
}

/// Writes a field's target and hit files from `(token, ordinal)` pairs
///
/// Pairs must be sorted by token, then ordinal. Each run of equal tokens becomes
/// one target record over a contiguous slice of hits; repeated ordinals within a
/// run are written once. Returns `(targets, hits)`.
pub(crate) fn write_field_index<I>(
    pairs: I,
    output: &IndexOutput,
    field: &FieldDef,
    width: usize,
) -> Result<(u32, u32)>
where
    I: Iterator<Item = Result<(String, u32)>>,
{
    let mut targets = output.create::<TargetRecord>(&field.target_file(), width)?;
    let mut hits = output.create::<HitRecord>(&field.hit_file(), 0)?;

    let mut group: Option<Group> = None;
    for pair in pairs {
        let (token, ordinal) = pair?;
        match &mut group {
            Some(current) if current.token == token => {
                if current.last_ordinal == ordinal {
                    continue;
                }
                current.hit_count += 1;
                current.last_ordinal = ordinal;
            }
            _ => {
                if let Some(done) = group.take() {
                    targets.write_record(&done.to_record())?;
                }
                group = Some(Group {
                    token,
                    first_hit: hits.records_written() + 1,
                    hit_count: 1,
                    last_ordinal: ordinal,
                });
            }
        }
        hits.write_record(&HitRecord(ordinal))?;
    }
    if let Some(done) = group {
        targets.write_record(&done.to_record())?;
    }

    let (_, target_totals) = targets.finish()?;
    let (_, hit_totals) = hits.finish()?;
    debug!(
        "{}: {} targets, {} hits",
        field.index_name, target_totals.record_count, hit_totals.record_count
    );
    Ok((target_totals.record_count, hit_totals.record_count))
}
