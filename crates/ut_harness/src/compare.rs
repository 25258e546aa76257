//! Directory tree comparison
//!
//! Compares a baseline tree ("left") with a freshly produced tree ("right") and classifies
//! every difference:
//! - `left_only`: entries the baseline has but the fresh run did not produce
//! - `right_only`: entries the fresh run produced that the baseline does not have
//! - `diff_files`: entries present on both sides whose contents differ
//! - `type_mismatches`: paths whose entry kind differs between the sides
//!
//! The three path sets are pairwise disjoint. Every type mismatch is also listed in exactly one
//! of them, so `type_mismatches` annotates paths rather than adding new ones.
//!
//! Directories are recursed into transparently and never appear in the result themselves.
//! Symlinks are not followed: a link to a regular file compares by the bytes it resolves to,
//! any other link (to a directory, dangling, ...) compares by its target path.
//! All paths are relative to the compared roots and use `/` separators.

use crate::error::{HarnessError, Result};
use crate::paths;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const CHUNK_SIZE: usize = 64 * 1024;

/// What a relative path names inside one tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file, or a symlink resolving to one
    File,
    Dir,
    /// Symlink that does not resolve to a regular file
    Link,
    /// Fifo, socket or device node
    Special,
}

/// A path whose entry kind differs between baseline and fresh output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeMismatch {
    pub path: String,
    pub baseline: EntryKind,
    pub fresh: EntryKind,
}

/// Classification of the differences between a baseline and a fresh tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    pub left_only: BTreeSet<String>,
    pub right_only: BTreeSet<String>,
    pub diff_files: BTreeSet<String>,
    pub type_mismatches: Vec<TypeMismatch>,
}

impl ComparisonResult {
    /// True when both trees hold exactly the same entries with the same contents
    pub fn is_identical(&self) -> bool {
        self.left_only.is_empty()
            && self.right_only.is_empty()
            && self.diff_files.is_empty()
            && self.type_mismatches.is_empty()
    }

    pub fn has_discrepancies(&self) -> bool {
        !self.is_identical()
    }

    /// Number of distinct paths reported
    pub fn path_count(&self) -> usize {
        self.left_only.len() + self.right_only.len() + self.diff_files.len()
    }

    /// Log the differences for one test
    pub fn log(&self, test_name: &str) {
        if !self.left_only.is_empty() {
            tracing::warn!(
                "{}: these files were not generated by this unit test but should have been: {:?}",
                test_name,
                self.left_only
            );
        }
        if !self.right_only.is_empty() {
            tracing::warn!(
                "{}: these files were not in the baseline folder: {:?}",
                test_name,
                self.right_only
            );
        }
        for mismatch in &self.type_mismatches {
            tracing::warn!(
                "{}: '{}' is a {:?} in the baseline but a {:?} in the fresh output",
                test_name,
                mismatch.path,
                mismatch.baseline,
                mismatch.fresh
            );
        }
        if self.diff_files.is_empty() {
            if self.is_identical() {
                tracing::info!("{}: all files equal", test_name);
            }
        } else {
            tracing::warn!("{}: different files: {:?}", test_name, self.diff_files);
        }
    }
}

/// One entry found while walking a tree
#[derive(Debug)]
struct Entry {
    kind: EntryKind,
    /// Target of a `Link` entry
    link_target: Option<PathBuf>,
}

/// Compare a baseline tree against a fresh tree.
///
/// A root that does not exist (or is not a directory) is treated as an empty tree. Neither
/// tree is modified.
pub fn compare_dirs(baseline: &Path, fresh: &Path) -> Result<ComparisonResult> {
    let left = scan_tree(baseline)?;
    let right = scan_tree(fresh)?;
    let mut result = ComparisonResult::default();

    for (rel, left_entry) in &left {
        let key = paths::relative_key(rel);
        let Some(right_entry) = right.get(rel) else {
            // Contents of a baseline-only directory are listed as separate entries
            if left_entry.kind != EntryKind::Dir {
                result.left_only.insert(key);
            }
            continue;
        };

        match (left_entry.kind, right_entry.kind) {
            (EntryKind::Dir, EntryKind::Dir) | (EntryKind::Special, EntryKind::Special) => {}
            (EntryKind::File, EntryKind::File) => {
                if !files_equal(&baseline.join(rel), &fresh.join(rel))? {
                    result.diff_files.insert(key);
                }
            }
            (EntryKind::Link, EntryKind::Link) => {
                if left_entry.link_target != right_entry.link_target {
                    result.diff_files.insert(key);
                }
            }
            (left_kind, right_kind) => {
                // A directory side's children have no counterpart and surface on their own,
                // so only the non-directory side is listed here.
                if right_kind == EntryKind::Dir {
                    result.left_only.insert(key.clone());
                } else if left_kind == EntryKind::Dir {
                    result.right_only.insert(key.clone());
                } else {
                    result.diff_files.insert(key.clone());
                }
                result.type_mismatches.push(TypeMismatch {
                    path: key,
                    baseline: left_kind,
                    fresh: right_kind,
                });
            }
        }
    }

    for (rel, right_entry) in &right {
        if right_entry.kind != EntryKind::Dir && !left.contains_key(rel) {
            result.right_only.insert(paths::relative_key(rel));
        }
    }

    Ok(result)
}

// Relative path -> entry for everything below `root` (the root itself excluded).
fn scan_tree(root: &Path) -> Result<BTreeMap<PathBuf, Entry>> {
    let mut entries = BTreeMap::new();
    if !root.is_dir() {
        if root.exists() {
            tracing::warn!(
                "{} is not a directory; comparing it as an empty tree",
                root.display()
            );
        }
        return Ok(entries);
    }

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|source| HarnessError::ReadTree {
            path: root.to_path_buf(),
            source,
        })?;
        let rel = match entry.path().strip_prefix(root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => entry.path().to_path_buf(),
        };

        let file_type = entry.file_type();
        let kind = if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            match fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => EntryKind::File,
                _ => EntryKind::Link,
            }
        } else {
            EntryKind::Special
        };

        let link_target = if kind == EntryKind::Link {
            let target = fs::read_link(entry.path()).map_err(|source| HarnessError::ReadFile {
                path: entry.path().to_path_buf(),
                source,
            })?;
            Some(target)
        } else {
            None
        };

        entries.insert(rel, Entry { kind, link_target });
    }

    Ok(entries)
}

/// Byte-for-byte equality of two files
fn files_equal(a: &Path, b: &Path) -> Result<bool> {
    let read_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| HarnessError::ReadFile { path, source }
    };

    let mut fa = File::open(a).map_err(read_err(a))?;
    let mut fb = File::open(b).map_err(read_err(b))?;

    let len_a = fa.metadata().map_err(read_err(a))?.len();
    let len_b = fb.metadata().map_err(read_err(b))?.len();
    if len_a != len_b {
        return Ok(false);
    }

    let mut buf_a = vec![0u8; CHUNK_SIZE];
    let mut buf_b = vec![0u8; CHUNK_SIZE];
    loop {
        let n = read_full(&mut fa, &mut buf_a).map_err(read_err(a))?;
        let m = read_full(&mut fb, &mut buf_b).map_err(read_err(b))?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

// Fill `buf` as far as the reader allows; short only at EOF.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn pair() -> (TempDir, TempDir) {
        (TempDir::new().unwrap(), TempDir::new().unwrap())
    }

    #[test]
    fn test_identical_trees() {
        let (a, b) = pair();
        for root in [a.path(), b.path()] {
            write(root, "texture.dds", b"DDS \x01\x02");
            write(root, "logs/run.log", b"ok\n");
            write(root, "logs/deep/frame_0001.png", &[7u8; 200_000]);
        }

        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert!(result.is_identical());
        assert!(!result.has_discrepancies());
        assert_eq!(result.path_count(), 0);
    }

    #[test]
    fn test_one_byte_difference() {
        let (a, b) = pair();
        write(a.path(), "texture.dds", b"abcdef");
        write(b.path(), "texture.dds", b"abcdeg");
        write(a.path(), "same.txt", b"x");
        write(b.path(), "same.txt", b"x");

        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert_eq!(result.diff_files, set(&["texture.dds"]));
        assert!(result.left_only.is_empty());
        assert!(result.right_only.is_empty());
    }

    #[test]
    fn test_difference_past_first_chunk() {
        let (a, b) = pair();
        let mut data = vec![0u8; CHUNK_SIZE * 2 + 17];
        write(a.path(), "big.bin", &data);
        *data.last_mut().unwrap() = 1;
        write(b.path(), "big.bin", &data);

        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert_eq!(result.diff_files, set(&["big.bin"]));
    }

    #[test]
    fn test_length_difference() {
        let (a, b) = pair();
        write(a.path(), "f", b"abc");
        write(b.path(), "f", b"abcd");
        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert_eq!(result.diff_files, set(&["f"]));
    }

    #[test]
    fn test_missing_and_extra_depend_on_argument_order() {
        let (a, b) = pair();
        write(a.path(), "extra.log", b"log");
        write(a.path(), "nested/only_here.txt", b"1");
        write(a.path(), "common", b"c");
        write(b.path(), "common", b"c");

        let forward = compare_dirs(a.path(), b.path()).unwrap();
        assert_eq!(forward.left_only, set(&["extra.log", "nested/only_here.txt"]));
        assert!(forward.right_only.is_empty());
        assert!(forward.diff_files.is_empty());

        let backward = compare_dirs(b.path(), a.path()).unwrap();
        assert_eq!(backward.right_only, set(&["extra.log", "nested/only_here.txt"]));
        assert!(backward.left_only.is_empty());
        assert!(backward.diff_files.is_empty());
    }

    #[test]
    fn test_directories_do_not_appear_in_results() {
        let (a, b) = pair();
        fs::create_dir_all(a.path().join("empty_dir")).unwrap();
        write(b.path(), "sub/file.bin", b"1");

        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert!(result.left_only.is_empty());
        assert_eq!(result.right_only, set(&["sub/file.bin"]));
    }

    #[test]
    fn test_missing_roots_are_empty_trees() {
        let (a, b) = pair();
        write(b.path(), "new.txt", b"n");
        let missing = a.path().join("does_not_exist");

        let result = compare_dirs(&missing, b.path()).unwrap();
        assert_eq!(result.right_only, set(&["new.txt"]));

        let result = compare_dirs(b.path(), &missing).unwrap();
        assert_eq!(result.left_only, set(&["new.txt"]));

        let result = compare_dirs(&missing, &missing).unwrap();
        assert!(result.is_identical());
    }

    #[test]
    fn test_file_vs_directory_is_reported() {
        let (a, b) = pair();
        write(a.path(), "shots", b"i am a file");
        write(b.path(), "shots/frame.png", b"png");

        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert_eq!(result.left_only, set(&["shots"]));
        assert_eq!(result.right_only, set(&["shots/frame.png"]));
        assert!(result.diff_files.is_empty());
        assert_eq!(
            result.type_mismatches,
            vec![TypeMismatch {
                path: "shots".to_string(),
                baseline: EntryKind::File,
                fresh: EntryKind::Dir,
            }]
        );
        assert!(result.has_discrepancies());

        let reversed = compare_dirs(b.path(), a.path()).unwrap();
        assert_eq!(reversed.right_only, set(&["shots"]));
        assert_eq!(reversed.left_only, set(&["shots/frame.png"]));
        assert_eq!(reversed.type_mismatches[0].baseline, EntryKind::Dir);
    }

    #[test]
    fn test_sets_are_disjoint() {
        let (a, b) = pair();
        write(a.path(), "gone", b"1");
        write(b.path(), "new", b"1");
        write(a.path(), "changed", b"1");
        write(b.path(), "changed", b"2");
        write(a.path(), "kind", b"file");
        write(b.path(), "kind/inner", b"x");

        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert!(result.left_only.is_disjoint(&result.right_only));
        assert!(result.left_only.is_disjoint(&result.diff_files));
        assert!(result.right_only.is_disjoint(&result.diff_files));
        for mismatch in &result.type_mismatches {
            let in_sets = [&result.left_only, &result.right_only, &result.diff_files]
                .iter()
                .filter(|s| s.contains(&mismatch.path))
                .count();
            assert_eq!(in_sets, 1, "{} listed {} times", mismatch.path, in_sets);
        }
        // gone, new, changed, kind, kind/inner
        assert_eq!(result.path_count(), 5);
    }

    #[test]
    fn test_creation_order_does_not_matter() {
        let (a, b) = pair();
        let names = ["z.bin", "a.bin", "m/n.bin", "c.bin", "m/a.bin"];
        for name in names {
            write(a.path(), name, name.as_bytes());
        }
        for name in names.iter().rev() {
            write(b.path(), name, name.as_bytes());
        }
        write(b.path(), "c.bin", b"changed");

        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert_eq!(result.diff_files, set(&["c.bin"]));
        assert!(result.left_only.is_empty() && result.right_only.is_empty());
    }

    #[test]
    fn test_compare_does_not_modify_trees() {
        let (a, b) = pair();
        write(a.path(), "x", b"1");
        write(b.path(), "y", b"2");
        compare_dirs(a.path(), b.path()).unwrap();
        assert_eq!(fs::read(a.path().join("x")).unwrap(), b"1");
        assert_eq!(fs::read(b.path().join("y")).unwrap(), b"2");
        assert!(!a.path().join("y").exists());
        assert!(!b.path().join("x").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_identical_invalid_utf8_name_compares_clean() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (a, b) = pair();
        let name = OsStr::from_bytes(b"frame_\xff.png");
        for root in [a.path(), b.path()] {
            fs::create_dir_all(root.join("shots")).unwrap();
            fs::write(root.join("shots").join(name), b"png").unwrap();
        }

        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert!(result.is_identical(), "{:?}", result);

        fs::write(b.path().join("shots").join(name), b"PNG").unwrap();
        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert_eq!(result.diff_files, set(&["shots/frame_\\xff.png"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_invalid_utf8_names_stay_distinct() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (a, b) = pair();
        fs::write(a.path().join(OsStr::from_bytes(b"x\xfe")), b"1").unwrap();
        fs::write(a.path().join(OsStr::from_bytes(b"x\xff")), b"2").unwrap();

        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert_eq!(result.left_only.len(), 2);
        assert_eq!(result.left_only, set(&["x\\xfe", "x\\xff"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_directory_compares_by_target() {
        use std::os::unix::fs::symlink;

        let (a, b) = pair();
        for root in [a.path(), b.path()] {
            write(root, "real/frame.png", b"png");
            symlink("real", root.join("latest")).unwrap();
        }

        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert!(result.is_identical(), "{:?}", result);

        fs::remove_file(b.path().join("latest")).unwrap();
        write(b.path(), "other/frame.png", b"png");
        symlink("other", b.path().join("latest")).unwrap();

        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert_eq!(result.diff_files, set(&["latest"]));
        assert_eq!(result.right_only, set(&["other/frame.png"]));
        assert!(result.type_mismatches.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlinks_are_not_fatal() {
        use std::os::unix::fs::symlink;

        let (a, b) = pair();
        symlink("missing_target", a.path().join("dangling")).unwrap();
        symlink("missing_target", b.path().join("dangling")).unwrap();

        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert!(result.is_identical(), "{:?}", result);

        symlink("nowhere", a.path().join("was_file")).unwrap();
        write(b.path(), "was_file", b"data");

        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert_eq!(result.diff_files, set(&["was_file"]));
        assert_eq!(
            result.type_mismatches,
            vec![TypeMismatch {
                path: "was_file".to_string(),
                baseline: EntryKind::Link,
                fresh: EntryKind::File,
            }]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_file_compares_contents() {
        use std::os::unix::fs::symlink;

        let (a, b) = pair();
        write(a.path(), "data.bin", b"same");
        symlink("data.bin", a.path().join("alias.bin")).unwrap();
        write(b.path(), "data.bin", b"same");
        write(b.path(), "alias.bin", b"same");

        let result = compare_dirs(a.path(), b.path()).unwrap();
        assert!(result.is_identical(), "{:?}", result);
    }
}
