//! # Sort driver
//!
//! Sorts per-source-file staging files and merges the sorted fragments into one
//! output, bounding the fan-in of any single merge.
//!
//! Sorting itself is delegated to a [`Sorter`]: either the host `sort` utility
//! ([`SystemSort`]) or an in-process implementation ([`MemorySort`]). Both collate
//! lines by raw bytes.
//!
//! ## Fan-in
//!
//! With `n` numbered inputs, `nsplit = floor(sqrt(n))`. Below two the fragments are
//! merged in one flat pass; otherwise they are merged in groups of `nsplit` into
//! intermediate `.mrg1` files, which are then merged into the final output.
//!
//! ```text
//! <base>001.<ext> -> <base>001.<ext>.srt ─┐
//! <base>002.<ext> -> <base>002.<ext>.srt ─┴─> <base>001.mrg1 ─┐
//! <base>003.<ext> -> <base>003.<ext>.srt ─┐                   ├─> <base>.<out>
//! <base>004.<ext> -> <base>004.<ext>.srt ─┴─> <base>002.mrg1 ─┘
//! ```

mod memory;
mod system;

#[cfg(test)]
pub(crate) use system::testing::sort_available;

pub use memory::MemorySort;
pub use system::SystemSort;

use std::path::{Path, PathBuf};

use auto_impl::auto_impl;
use log::debug;

use crate::error::Result;
use crate::staging::{numbered_path, remove_if_exists, with_ext};

/// Extension appended to individually sorted fragments
pub const SORTED_EXT: &str = "srt";

/// Extension of intermediate group merges
pub const MERGE_EXT: &str = "mrg1";

/// A line sorter collating by raw bytes
///
/// Failures are fatal to the run: no retry is attempted.
#[auto_impl(&, Box, Arc)]
pub trait Sorter {
    /// Sorts the lines of `input` into `output`
    fn sort(&self, input: &Path, output: &Path) -> Result<()>;

    /// Merges already sorted `inputs` into `output`
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<()>;
}

/// The merge path taken by [`sort_files`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergePlan {
    /// One unnumbered input sorted directly into the output
    Single,
    /// All sorted fragments merged in one pass
    Flat { fragments: usize },
    /// Fragments merged in groups of `nsplit`, then the groups merged
    Grouped { nsplit: usize, groups: usize },
}

/// `floor(sqrt(n))`, corrected for floating point rounding
#[must_use]
pub fn nsplit(n: usize) -> usize {
    if n < 2 {
        return n;
    }
    let mut x = (n as f64).sqrt() as usize;
    while x * x > n {
        x -= 1;
    }
    while (x + 1) * (x + 1) <= n {
        x += 1;
    }
    x
}

/// Sorts staging files named after `base` and merges them into `<base>.<out_ext>`
///
/// With `file_count == 0` the single file `<base>.<in_ext>` is sorted. Otherwise the
/// numbered files `<base><NNN>.<in_ext>` (1-based) are sorted individually and merged.
/// Inputs, fragments and intermediate merges are deleted when `cleanup` is set.
pub fn sort_files<S: Sorter + ?Sized>(
    sorter: &S,
    base: &Path,
    in_ext: &str,
    out_ext: &str,
    file_count: usize,
    cleanup: bool,
) -> Result<MergePlan> {
    let output = with_ext(base, out_ext);

    if file_count == 0 {
        let input = with_ext(base, in_ext);
        debug!("sorting {} -> {}", input.display(), output.display());
        sorter.sort(&input, &output)?;
        if cleanup {
            remove_if_exists(&input)?;
        }
        return Ok(MergePlan::Single);
    }

    let sorted_ext = format!("{in_ext}.{SORTED_EXT}");
    let mut fragments = Vec::with_capacity(file_count);
    for number in 1..=file_count {
        let input = numbered_path(base, number, in_ext);
        let fragment = numbered_path(base, number, &sorted_ext);
        debug!("sorting {} -> {}", input.display(), fragment.display());
        sorter.sort(&input, &fragment)?;
        if cleanup {
            remove_if_exists(&input)?;
        }
        fragments.push(fragment);
    }

    let split = nsplit(file_count);
    let plan = if split < 2 {
        debug!("merging {} fragments -> {}", fragments.len(), output.display());
        sorter.merge(&fragments, &output)?;
        MergePlan::Flat {
            fragments: fragments.len(),
        }
    } else {
        let mut intermediates = Vec::new();
        for (idx, group) in fragments.chunks(split).enumerate() {
            let merged = numbered_path(base, idx + 1, MERGE_EXT);
            debug!("merging {} fragments -> {}", group.len(), merged.display());
            sorter.merge(group, &merged)?;
            intermediates.push(merged);
        }
        debug!(
            "merging {} intermediates -> {}",
            intermediates.len(),
            output.display()
        );
        sorter.merge(&intermediates, &output)?;
        if cleanup {
            intermediates
                .iter()
                .try_for_each(|path| remove_if_exists(path))?;
        }
        MergePlan::Grouped {
            nsplit: split,
            groups: intermediates.len(),
        }
    };

    if cleanup {
        fragments.iter().try_for_each(|path| remove_if_exists(path))?;
    }
    Ok(plan)
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;
    use std::cell::RefCell;
    use std::fs;

    /// Records merge fan-in while delegating to the in-process sorter
    #[derive(Default)]
    struct RecordingSorter {
        inner: MemorySort,
        sorts: RefCell<usize>,
        merges: RefCell<Vec<usize>>,
    }
    impl Sorter for RecordingSorter {
        fn sort(&self, input: &Path, output: &Path) -> crate::Result<()> {
            *self.sorts.borrow_mut() += 1;
            self.inner.sort(input, output)
        }
        fn merge(&self, inputs: &[PathBuf], output: &Path) -> crate::Result<()> {
            self.merges.borrow_mut().push(inputs.len());
            self.inner.merge(inputs, output)
        }
    }

    fn stage(base: &Path, n: usize) -> Result<Vec<String>> {
        let mut all = Vec::new();
        for number in 1..=n {
            let lines: Vec<String> = (0..3).map(|i| format!("K{:02}", (i * 7 + number * 3) % 50)).collect();
            fs::write(numbered_path(base, number, "list"), lines.join("\n") + "\n")?;
            all.extend(lines);
        }
        all.sort();
        Ok(all)
    }

    #[test]
    fn integer_square_root() {
        let expected = [(0, 0), (1, 1), (3, 1), (4, 2), (8, 2), (9, 3), (99, 9), (100, 10)];
        for (n, root) in expected {
            assert_eq!(nsplit(n), root, "nsplit({n})");
        }
    }

    #[test]
    fn three_fragments_merge_flat() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("db");
        let expected = stage(&base, 3)?;
        let sorter = RecordingSorter::default();

        let plan = sort_files(&sorter, &base, "list", "idsrt", 3, true)?;
        assert_eq!(plan, MergePlan::Flat { fragments: 3 });
        assert_eq!(*sorter.sorts.borrow(), 3);
        assert_eq!(*sorter.merges.borrow(), [3]);

        let merged = fs::read_to_string(with_ext(&base, "idsrt"))?;
        assert_eq!(merged.lines().collect::<Vec<_>>(), expected);
        Ok(())
    }

    #[test]
    fn four_fragments_merge_grouped() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("db");
        let expected = stage(&base, 4)?;
        let sorter = RecordingSorter::default();

        let plan = sort_files(&sorter, &base, "list", "idsrt", 4, true)?;
        assert_eq!(plan, MergePlan::Grouped { nsplit: 2, groups: 2 });
        assert_eq!(*sorter.merges.borrow(), [2, 2, 2]);

        let merged = fs::read_to_string(with_ext(&base, "idsrt"))?;
        assert_eq!(merged.lines().collect::<Vec<_>>(), expected);

        // only the final output survives cleanup
        let remaining: Vec<_> = fs::read_dir(dir.path())?.collect::<std::io::Result<_>>()?;
        assert_eq!(remaining.len(), 1);
        Ok(())
    }

    #[test]
    fn uneven_groups() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("db");
        stage(&base, 10)?;
        let sorter = RecordingSorter::default();

        let plan = sort_files(&sorter, &base, "list", "idsrt", 10, false)?;
        assert_eq!(plan, MergePlan::Grouped { nsplit: 3, groups: 4 });
        assert_eq!(*sorter.merges.borrow(), [3, 3, 3, 1, 4]);
        assert!(numbered_path(&base, 1, "list.srt").exists());
        assert!(numbered_path(&base, 4, MERGE_EXT).exists());
        Ok(())
    }

    #[test]
    fn single_unnumbered_input() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().join("db");
        fs::write(with_ext(&base, "acnum_id2"), "b\t2\na\t1\n")?;
        let plan = sort_files(&MemorySort, &base, "acnum_id2", "acnum.sort2", 0, true)?;
        assert_eq!(plan, MergePlan::Single);
        assert_eq!(fs::read_to_string(with_ext(&base, "acnum.sort2"))?, "a\t1\nb\t2\n");
        assert!(!with_ext(&base, "acnum_id2").exists());
        Ok(())
    }
}
