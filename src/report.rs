//! Human readable summary of an indexing run

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::builder::{EntryStats, FieldStats};
use crate::error::{IoContext, Result};
use crate::fields::FieldDef;
use crate::header::DbMeta;

/// Entries read from one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub file_number: usize,
    pub name: String,
    pub entries: usize,
}

/// Statistics of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub meta: DbMeta,
    pub strategy: String,
    pub files: Vec<FileReport>,
    pub entries: EntryStats,
    pub fields: Vec<(&'static FieldDef, FieldStats)>,
    pub elapsed: Duration,
}
impl RunReport {
    /// Entries read over all files, duplicates included
    #[must_use]
    pub fn entries_read(&self) -> usize {
        self.files.iter().map(|f| f.entries).sum()
    }

    /// Writes the report to `path`, replacing any previous report
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path).with_path("create", path)?;
        write!(file, "{self}").with_path("write", path)?;
        file.flush().with_path("flush", path)?;
        Ok(())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "########################################")?;
        writeln!(f, "# Database: {}", self.meta.dbname)?;
        writeln!(f, "# Release:  {}", self.meta.release)?;
        writeln!(f, "# Date:     {}", self.meta.date)?;
        writeln!(f, "# Strategy: {}", self.strategy)?;
        writeln!(f, "########################################")?;
        writeln!(f)?;
        writeln!(f, "Files: {}", self.files.len())?;
        for file in &self.files {
            writeln!(f, "{:5} {:>9} {}", file.file_number, file.entries, file.name)?;
        }
        writeln!(f)?;
        writeln!(f, "Entries read:      {}", self.entries_read())?;
        writeln!(f, "Entries indexed:   {}", self.entries.entries)?;
        writeln!(f, "Duplicate ids:     {}", self.entries.duplicates)?;
        writeln!(f)?;
        writeln!(f, "Field     Tokens    Orphans   Targets   Hits")?;
        for (field, stats) in &self.fields {
            writeln!(
                f,
                "{:<9} {:<9} {:<9} {:<9} {}",
                field.index_name, stats.tokens, stats.orphans, stats.targets, stats.hits
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Elapsed: {:.3}s", self.elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::fields;
    use crate::header::IndexDate;

    #[test]
    fn summary_lists_files_and_fields() {
        let report = RunReport {
            meta: DbMeta::new("EMBL", "141", IndexDate::new(17, 10, 26)),
            strategy: "disk".into(),
            files: vec![
                FileReport { file_number: 1, name: "est1.dat".into(), entries: 4 },
                FileReport { file_number: 2, name: "est2.dat".into(), entries: 3 },
            ],
            entries: EntryStats { entries: 6, duplicates: 1 },
            fields: vec![(
                &fields::ACC,
                FieldStats { tokens: 9, orphans: 1, targets: 7, hits: 8 },
            )],
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(report.entries_read(), 7);
        let text = report.to_string();
        assert!(text.contains("# Database: EMBL"));
        assert!(text.contains("# Date:     17/10/26"));
        assert!(text.contains("    2         3 est2.dat"));
        assert!(text.contains("acnum     9         1         7         8"));
        assert!(text.contains("Elapsed: 1.500s"));
    }
}
