use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use flatdbi::fields::{self, DIVISION_FILE, ENTRYNAM_FILE};
use flatdbi::parser::SourceFormat;
use flatdbi::{
    DbIndex, DivisionRecord, EntryLocation, EntryRecord, FileList, HitRecord, IndexConfigBuilder,
    IndexDate, IndexFile, IndexRecord, Indexer, SortConfig, SortEngine, Strategy, TargetRecord,
};

#[derive(Parser)]
#[command(version, about = "Binary indexes for flat-file sequence databases")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a directory of database files
    Index {
        /// Directory holding the database files
        #[arg(short = 'd', long = "directory", default_value = ".")]
        directory: PathBuf,

        /// Comma separated wildcard patterns of files to index
        #[arg(short = 'f', long = "filenames", default_value = "*.dat")]
        filenames: String,

        /// Comma separated wildcard patterns of files to skip
        #[arg(long = "exclude", default_value = "")]
        exclude: String,

        /// Extension of companion sequence files
        #[arg(long = "seq-ext")]
        seq_ext: Option<String>,

        /// Input format (embl, fasta)
        #[arg(long = "format", default_value = "embl")]
        format: SourceFormat,

        /// Database name stored in every header
        #[arg(short = 'n', long = "dbname")]
        dbname: String,

        /// Release stored in every header
        #[arg(short = 'r', long = "release", default_value = "0.0")]
        release: String,

        /// Date stored in every header (dd/mm/yy), defaults to today
        #[arg(long = "date")]
        date: Option<IndexDate>,

        /// Output directory for the index files
        #[arg(short = 'o', long = "indexoutdir", default_value = ".")]
        index_dir: PathBuf,

        /// Directory for staging files, defaults to the output directory
        #[arg(long = "sortoutdir")]
        staging_dir: Option<PathBuf>,

        /// Comma separated fields to index (acc, sv, des, key, org)
        #[arg(long = "fields", default_value = "acc")]
        fields: String,

        /// Build strategy (disk, memory)
        #[arg(long = "strategy", default_value = "disk")]
        strategy: Strategy,

        /// Sort engine of the disk strategy (system, memory)
        #[arg(long = "sort-engine", default_value = "system")]
        sort_engine: SortEngine,

        /// Sort program of the system engine
        #[arg(long = "sort-program", default_value = "sort")]
        sort_program: String,

        /// Extra options for the sort program
        #[arg(long = "sortopt", default_value = "", allow_hyphen_values = true)]
        sort_options: String,

        /// Sort threads of the system engine; 0 uses every core
        #[arg(long = "parallel")]
        parallel: Option<usize>,

        /// Keep staging files
        #[arg(long = "keep-staging", default_value_t = false)]
        keep_staging: bool,

        /// Do not write the <dbname>.log summary
        #[arg(long = "no-report", default_value_t = false)]
        no_report: bool,
    },

    /// Look up entries in a built index
    Lookup {
        /// Directory holding the index files
        #[arg(short = 'i', long = "index", default_value = ".")]
        index_dir: PathBuf,

        /// Field to search; entry names are searched when omitted
        #[arg(long = "field")]
        field: Option<String>,

        /// Entry name or field token
        query: String,
    },

    /// Print the header and records of an index file
    Dump {
        /// Index file
        file: PathBuf,

        /// Print at most this many records
        #[arg(short = 'l', long = "limit")]
        limit: Option<usize>,
    },
}

/// Initializes the logger with verbosity given in `level`.
fn init_log(level: usize, quiet: bool) -> Result<()> {
    stderrlog::new()
        .module(module_path!())
        .quiet(quiet)
        .verbosity(level)
        .timestamp(stderrlog::Timestamp::Off)
        .init()?;
    Ok(())
}

fn print_location(location: &EntryLocation) {
    let record = &location.record;
    println!(
        "{}\t{}\t{}\t{}\t{}",
        record.id, location.file_name, record.record_offset, record.seq_offset, location.ordinal
    );
}

fn dump_records<R: IndexRecord>(path: &Path, limit: Option<usize>, show: impl Fn(&R) -> String) -> Result<()> {
    let file = IndexFile::<R>::open(path)?;
    let header = file.header();
    println!("# file size:     {}", header.file_size);
    println!("# records:       {}", header.record_count);
    println!("# record length: {}", header.record_len);
    println!("# database:      {}", header.meta.dbname);
    println!("# release:       {}", header.meta.release);
    println!("# date:          {}", header.meta.date);
    for record in file.iter().take(limit.unwrap_or(usize::MAX)) {
        println!("{}", show(&record?));
    }
    Ok(())
}

fn dump(path: &Path, limit: Option<usize>) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path.extension().and_then(|e| e.to_str()) {
        _ if name == DIVISION_FILE => {
            dump_records(path, limit, |r: &DivisionRecord| format!("{}\t{}", r.file_number, r.name))
        }
        _ if name == ENTRYNAM_FILE => dump_records(path, limit, |r: &EntryRecord| {
            format!("{}\t{}\t{}\t{}", r.id, r.record_offset, r.seq_offset, r.file_number)
        }),
        Some("trg") => dump_records(path, limit, |r: &TargetRecord| {
            format!("{}\t{}\t{}", r.token, r.first_hit, r.hit_count)
        }),
        Some("hit") => dump_records(path, limit, |r: &HitRecord| r.0.to_string()),
        _ => bail!("{} is not a recognised index file", path.display()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_log(cli.verbose as usize + 1, cli.quiet)?;

    match cli.command {
        Commands::Index {
            directory,
            filenames,
            exclude,
            seq_ext,
            format,
            dbname,
            release,
            date,
            index_dir,
            staging_dir,
            fields,
            strategy,
            sort_engine,
            sort_program,
            sort_options,
            parallel,
            keep_staging,
            no_report,
        } => {
            let mut list = FileList::new(&directory).include(&filenames).exclude(&exclude);
            if let Some(ext) = &seq_ext {
                list = list.companion(ext);
            }
            let files = list.scan()?;

            let mut builder = IndexConfigBuilder::new()
                .dbname(&dbname)
                .release(release)
                .index_dir(&index_dir)
                .fields(fields::parse_list(&fields)?)
                .strategy(strategy)
                .sort(SortConfig {
                    engine: sort_engine,
                    program: sort_program,
                    options: sort_options,
                    parallel,
                })
                .keep_staging(keep_staging);
            if let Some(date) = date {
                builder = builder.date(date);
            }
            if let Some(dir) = staging_dir {
                builder = builder.staging_dir(dir);
            }
            if !no_report {
                builder = builder.report(index_dir.join(format!("{dbname}.log")));
            }
            let report = Indexer::new(builder.build()?)
                .run(&files, |file| format.open(&file.path))
                .context("indexing failed")?;
            eprintln!(
                "{} entries from {} files indexed in {:.2}s",
                report.entries.entries,
                report.files.len(),
                report.elapsed.as_secs_f64()
            );
        }

        Commands::Lookup {
            index_dir,
            field,
            query,
        } => match field {
            None => {
                let db = DbIndex::open(&index_dir, &[])?;
                match db.find_entry(&query)? {
                    Some(location) => print_location(&location),
                    None => bail!("no entry named '{query}'"),
                }
            }
            Some(field) => {
                let def = fields::lookup(&field)?;
                let db = DbIndex::open(&index_dir, &[def])?;
                let locations = db.find_by_field(def.name, &query)?;
                if locations.is_empty() {
                    bail!("no {} '{query}'", def.description);
                }
                locations.iter().for_each(print_location);
            }
        },

        Commands::Dump { file, limit } => dump(&file, limit)?,
    }
    Ok(())
}
