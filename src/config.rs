//! Run configuration

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ConfigError, Result};
use crate::fields::{self, FieldDef};
use crate::header::{DbMeta, IndexDate, SIZE_DBNAME, SIZE_RELEASE};
use crate::sort::{MemorySort, Sorter, SystemSort};

/// How entries and tokens are sorted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Stage to text files and sort them on disk
    #[default]
    DiskSorted,
    /// Hold everything in memory
    InMemory,
}
impl FromStr for Strategy {
    type Err = crate::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "disk" | "disksorted" => Ok(Self::DiskSorted),
            "memory" | "inmemory" => Ok(Self::InMemory),
            _ => Err(ConfigError::InvalidChoice(s.to_string(), "strategy").into()),
        }
    }
}
impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiskSorted => write!(f, "disk"),
            Self::InMemory => write!(f, "memory"),
        }
    }
}

/// Backend sorting the staging files of the disk strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortEngine {
    /// The host `sort` utility
    #[default]
    System,
    /// In-process sort and heap merge
    Memory,
}
impl FromStr for SortEngine {
    type Err = crate::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "system" => Ok(Self::System),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::InvalidChoice(s.to_string(), "sort engine").into()),
        }
    }
}

/// Sort backend settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortConfig {
    pub engine: SortEngine,
    /// Program run by the system engine
    pub program: String,
    /// Extra options for the system engine
    pub options: String,
    /// Threads for the system engine; zero uses every core
    pub parallel: Option<usize>,
}
impl Default for SortConfig {
    fn default() -> Self {
        Self {
            engine: SortEngine::default(),
            program: "sort".to_string(),
            options: String::new(),
            parallel: None,
        }
    }
}
impl SortConfig {
    /// Creates the configured sorter, spilling to `tmpdir`
    #[must_use]
    pub fn sorter(&self, tmpdir: &Path) -> Box<dyn Sorter> {
        match self.engine {
            SortEngine::Memory => Box::new(MemorySort),
            SortEngine::System => {
                let mut sort = SystemSort::new(&self.program)
                    .with_options(&self.options)
                    .with_tmpdir(tmpdir);
                if let Some(threads) = self.parallel {
                    sort = sort.with_parallel(threads);
                }
                Box::new(sort)
            }
        }
    }
}

/// Validated settings of one indexing run
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub meta: DbMeta,
    /// Directory receiving the index files
    pub index_dir: PathBuf,
    /// Directory for staging files
    pub staging_dir: PathBuf,
    pub fields: Vec<&'static FieldDef>,
    pub strategy: Strategy,
    pub sort: SortConfig,
    /// Delete staging files once consumed
    pub cleanup: bool,
    /// Where to write the run summary
    pub report: Option<PathBuf>,
}

/// Builder for [`IndexConfig`]; only the database name is required
#[derive(Debug, Clone, Default)]
pub struct IndexConfigBuilder {
    dbname: Option<String>,
    release: Option<String>,
    date: Option<IndexDate>,
    index_dir: Option<PathBuf>,
    staging_dir: Option<PathBuf>,
    fields: Option<Vec<&'static FieldDef>>,
    strategy: Strategy,
    sort: SortConfig,
    keep_staging: bool,
    report: Option<PathBuf>,
}
impl IndexConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = Some(dbname.into());
        self
    }
    #[must_use]
    pub fn release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }
    #[must_use]
    pub fn date(mut self, date: IndexDate) -> Self {
        self.date = Some(date);
        self
    }
    #[must_use]
    pub fn index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }
    /// Defaults to the index directory
    #[must_use]
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }
    #[must_use]
    pub fn fields(mut self, fields: Vec<&'static FieldDef>) -> Self {
        self.fields = Some(fields);
        self
    }
    #[must_use]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
    #[must_use]
    pub fn sort(mut self, sort: SortConfig) -> Self {
        self.sort = sort;
        self
    }
    /// Keeps every staging file for inspection
    #[must_use]
    pub fn keep_staging(mut self, keep: bool) -> Self {
        self.keep_staging = keep;
        self
    }
    #[must_use]
    pub fn report(mut self, path: impl Into<PathBuf>) -> Self {
        self.report = Some(path.into());
        self
    }

    pub fn build(self) -> Result<IndexConfig> {
        let Some(dbname) = self.dbname.filter(|name| !name.is_empty()) else {
            return Err(ConfigError::MissingDbName.into());
        };
        if dbname.len() > SIZE_DBNAME {
            return Err(ConfigError::DbNameTooLong(dbname).into());
        }
        // staging files are named after the database
        if dbname.contains(['/', '\\']) || dbname.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidChoice(dbname, "database name").into());
        }
        let release = self.release.unwrap_or_else(|| "0.0".to_string());
        if release.len() > SIZE_RELEASE {
            return Err(ConfigError::ReleaseTooLong(release).into());
        }
        let index_dir = self.index_dir.unwrap_or_else(|| PathBuf::from("."));
        Ok(IndexConfig {
            meta: DbMeta::new(dbname, release, self.date.unwrap_or_else(IndexDate::today)),
            staging_dir: self.staging_dir.unwrap_or_else(|| index_dir.clone()),
            index_dir,
            fields: self.fields.unwrap_or_else(|| vec![&fields::FIELDS[0]]),
            strategy: self.strategy,
            sort: self.sort,
            cleanup: !self.keep_staging,
            report: self.report,
        })
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;

    #[test]
    fn defaults() -> Result<()> {
        let config = IndexConfigBuilder::new()
            .dbname("EMBL")
            .index_dir("/idx")
            .date(IndexDate::new(1, 1, 26))
            .build()?;
        assert_eq!(config.meta.release, "0.0");
        assert_eq!(config.staging_dir, PathBuf::from("/idx"));
        assert_eq!(config.fields, [&fields::FIELDS[0]]);
        assert_eq!(config.strategy, Strategy::DiskSorted);
        assert!(config.cleanup);
        Ok(())
    }

    #[test]
    fn validation() {
        assert!(matches!(
            IndexConfigBuilder::new().build(),
            Err(crate::Error::ConfigError(ConfigError::MissingDbName))
        ));
        assert!(IndexConfigBuilder::new().dbname("A".repeat(21)).build().is_err());
        assert!(IndexConfigBuilder::new().dbname("EMBL").release("12345678901").build().is_err());
        assert!(IndexConfigBuilder::new().dbname("a/b").build().is_err());
    }

    #[test]
    fn choices() -> Result<()> {
        assert_eq!("memory".parse::<Strategy>()?, Strategy::InMemory);
        assert_eq!("Disk".parse::<Strategy>()?, Strategy::DiskSorted);
        assert_eq!("memory".parse::<SortEngine>()?, SortEngine::Memory);
        assert!("quick".parse::<SortEngine>().is_err());
        Ok(())
    }
}
