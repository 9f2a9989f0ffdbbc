//! Division lookup table writer

use log::info;

use crate::error::Result;
use crate::fields::DIVISION_FILE;
use crate::record::{checked_file_number, DivisionRecord};
use crate::source::InputFile;
use crate::utils::MaxLen;
use crate::writer::{IndexOutput, IndexTotals};

/// Writes `division.lkp` with one record per input file, numbered from 1
///
/// The record width is the longest division name of the whole list, so the list
/// must be complete before the table is written.
pub fn write_division(output: &IndexOutput, files: &[InputFile]) -> Result<IndexTotals> {
    checked_file_number(files.len())?;
    let names: Vec<String> = files.iter().map(InputFile::division_name).collect();
    let mut width = MaxLen::default();
    names.iter().for_each(|name| width.update(name));

    let mut writer = output.create::<DivisionRecord>(DIVISION_FILE, width.get())?;
    for (idx, name) in names.into_iter().enumerate() {
        writer.write_record(&DivisionRecord::new(idx + 1, name)?)?;
    }
    let (_, totals) = writer.finish()?;
    info!("Division table lists {} files", totals.record_count);
    Ok(totals)
}
