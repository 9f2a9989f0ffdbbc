//! Entries and field tokens as consumed by the index builders

use crate::error::{Result, StagingError};
use crate::record::{checked_file_number, checked_offset, EntryRecord};

/// Identity and location of one database entry
///
/// The derived ordering is `(id, record_offset, seq_offset, file_number)` which is
/// exactly the byte order of the entry's staging line, so the in-memory and the
/// disk-sorted strategies agree on which of several duplicate ids comes first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey {
    pub id: String,
    pub record_offset: u32,
    /// Zero when the entry has no separate sequence offset
    pub seq_offset: u32,
    pub file_number: u16,
}
impl EntryKey {
    /// Validates the identifier and the offsets' on-disk ranges
    pub fn new(
        id: impl Into<String>,
        record_offset: u64,
        seq_offset: Option<u64>,
        file_number: usize,
    ) -> Result<Self> {
        let id = id.into();
        validate_id(&id)?;
        Ok(Self {
            id,
            record_offset: checked_offset(record_offset)?,
            seq_offset: checked_offset(seq_offset.unwrap_or(0))?,
            file_number: checked_file_number(file_number)?,
        })
    }

    #[must_use]
    pub fn to_record(&self) -> EntryRecord {
        EntryRecord {
            id: self.id.clone(),
            record_offset: self.record_offset,
            seq_offset: self.seq_offset,
            file_number: self.file_number,
        }
    }
}

/// One token of one indexed field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldToken {
    /// Position of the field in the run's field list
    pub field: usize,
    pub token: String,
}

/// An entry with its normalised field tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: EntryKey,
    pub tokens: Vec<FieldToken>,
}

/// Identifiers must be non-empty and contain no whitespace or control bytes
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.bytes().any(|b| b <= b' ' || b == 0x7f) {
        return Err(StagingError::InvalidId(id.to_string()).into());
    }
    Ok(())
}

/// Normalises a field token: control characters become spaces and surrounding
/// whitespace is trimmed. Returns `None` for tokens that end up empty.
#[must_use]
pub fn normalize_token(token: &str) -> Option<String> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized: String = trimmed
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let normalized = normalized.trim();
    (!normalized.is_empty()).then(|| normalized.to_string())
}

/// Outcome of resolving an entry against the de-duplicated entryname order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranked {
    pub key: EntryKey,
    /// 1-based entryname position, `None` for a discarded duplicate
    pub ordinal: Option<u32>,
}

/// Assigns ordinals to a stream of entry keys in sorted order
///
/// The first key of every run of equal identifiers receives the next ordinal; the
/// following keys of the run are duplicates and receive none.
pub struct Deduplicate<I> {
    inner: I,
    previous: Option<String>,
    next_ordinal: u32,
}
impl<I> Deduplicate<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            previous: None,
            next_ordinal: 1,
        }
    }
}
impl<I: Iterator<Item = Result<EntryKey>>> Iterator for Deduplicate<I> {
    type Item = Result<Ranked>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = match self.inner.next()? {
            Ok(key) => key,
            Err(e) => return Some(Err(e)),
        };
        if self.previous.as_deref() == Some(key.id.as_str()) {
            return Some(Ok(Ranked { key, ordinal: None }));
        }
        let ordinal = self.next_ordinal;
        let Some(next) = ordinal.checked_add(1) else {
            return Some(Err(crate::error::RecordError::OrdinalOverflow.into()));
        };
        self.next_ordinal = next;
        self.previous = Some(key.id.clone());
        Some(Ok(Ranked {
            key,
            ordinal: Some(ordinal),
        }))
    }
}
