use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::Sorter;
use crate::error::{IoContext, Result, SortError};
use crate::staging::create_buffered;

/// In-process sorter
///
/// Sorts a whole fragment in memory and merges sorted fragments with a k-way heap
/// merge that holds one line per input. Lines are compared as raw bytes, matching
/// `sort` under the C locale.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemorySort;

fn next_line<R: BufRead>(reader: &mut R, path: &Path) -> Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line).with_path("read", path)? == 0 {
        return Ok(None);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    Ok(Some(line))
}

impl Sorter for MemorySort {
    fn sort(&self, input: &Path, output: &Path) -> Result<()> {
        let contents = fs::read(input).with_path("read", input)?;
        let mut lines = Vec::new();
        let mut start = 0;
        for end in memchr::memchr_iter(b'\n', &contents) {
            lines.push(&contents[start..end]);
            start = end + 1;
        }
        if start < contents.len() {
            lines.push(&contents[start..]);
        }
        lines.sort_unstable();

        let mut writer = create_buffered(output)?;
        for line in lines {
            writer.write_all(line).with_path("write", output)?;
            writer.write_all(b"\n").with_path("write", output)?;
        }
        writer.flush().with_path("flush", output)?;
        Ok(())
    }

    fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        if inputs.is_empty() {
            return Err(SortError::EmptyMerge(output.to_path_buf()).into());
        }
        let mut readers = inputs
            .iter()
            .map(|path| File::open(path).map(BufReader::new).with_path("open", path))
            .collect::<Result<Vec<_>>>()?;

        // ties are broken by input position so the merge is deterministic
        let mut heap = BinaryHeap::with_capacity(readers.len());
        for (idx, reader) in readers.iter_mut().enumerate() {
            if let Some(line) = next_line(reader, &inputs[idx])? {
                heap.push(Reverse((line, idx)));
            }
        }

        let mut writer = create_buffered(output)?;
        while let Some(Reverse((line, idx))) = heap.pop() {
            writer.write_all(&line).with_path("write", output)?;
            writer.write_all(b"\n").with_path("write", output)?;
            if let Some(next) = next_line(&mut readers[idx], &inputs[idx])? {
                heap.push(Reverse((next, idx)));
            }
        }
        writer.flush().with_path("flush", output)?;
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;

    #[test]
    fn sorts_bytewise() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::write(&input, "b\nB\na b\na\n\u{e9}\n")?;
        MemorySort.sort(&input, &output)?;
        assert_eq!(fs::read_to_string(&output)?, "B\na\na b\nb\n\u{e9}\n");
        Ok(())
    }

    #[test]
    fn empty_input_sorts_to_empty_output() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::write(&input, "")?;
        MemorySort.sort(&input, &output)?;
        assert_eq!(fs::read(&output)?, b"");
        Ok(())
    }

    #[test]
    fn merges_sorted_inputs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths: Vec<PathBuf> = (0..3).map(|i| dir.path().join(format!("f{i}"))).collect();
        fs::write(&paths[0], "a\nd\ng\n")?;
        fs::write(&paths[1], "b\ne\n")?;
        fs::write(&paths[2], "")?;
        let output = dir.path().join("out");
        MemorySort.merge(&paths, &output)?;
        assert_eq!(fs::read_to_string(&output)?, "a\nb\nd\ne\ng\n");
        assert!(MemorySort.merge(&[], &output).is_err());
        Ok(())
    }
}
