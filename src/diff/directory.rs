//! Directory snapshot differencing.
//!
//! A [`Directory`] is a root path plus a sorted listing of relative entry
//! paths; the diff classifies entries as added, deleted, or modified by
//! running the sequence matcher over the two listings and then comparing
//! the on-disk content of matched paths. Entries are compared by relative
//! path only, so a renamed-but-identical file shows up as one delete plus
//! one add.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use serde::Serialize;
use walkdir::WalkDir;

use super::sequence;

/// A snapshot of an unpacked filesystem tree.
#[derive(Debug, Clone, Serialize)]
pub struct Directory {
    pub root: PathBuf,
    /// Relative entry paths with a leading `/`, lexicographically sorted.
    pub content: Vec<String>,
}

/// One entry of a directory listing, with its resolved size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub size: i64,
}

/// A matched path whose content differs between the two trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryDiff {
    pub name: String,
    pub first_size: i64,
    pub second_size: i64,
}

/// Result of diffing two directory snapshots.
#[derive(Debug, Default, Serialize)]
pub struct DirectoryDiff {
    pub added: Vec<DirectoryEntry>,
    pub deleted: Vec<DirectoryEntry>,
    pub modified: Vec<EntryDiff>,
}

/// Snapshot the tree rooted at `root`.
pub fn directory_for(root: &Path) -> Result<Directory> {
    let mut content = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn_skipped("directory entry", &err.to_string());
                continue;
            }
        };
        let rel = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("entry escapes {}", root.display()))?;
        content.push(format!("/{}", rel.display()));
    }
    content.sort();
    Ok(Directory {
        root: root.to_path_buf(),
        content,
    })
}

/// Sorted listing of a snapshot with entry sizes resolved.
pub fn directory_entries(directory: &Directory) -> Vec<DirectoryEntry> {
    entries_for(&directory.root, &directory.content)
}

/// Diff two snapshots. The second value is true iff the trees are
/// identical (no adds, deletes, or modifications).
pub fn diff_directories(first: &Directory, second: &Directory) -> (DirectoryDiff, bool) {
    let mut added_names = sequence::additions(&first.content, &second.content);
    added_names.sort();
    let added = entries_for(&second.root, &added_names);

    let mut deleted_names = sequence::deletions(&first.content, &second.content);
    deleted_names.sort();
    let deleted = entries_for(&first.root, &deleted_names);

    let mut modified_names = modified_entries(first, second);
    modified_names.sort();
    let modified = modified_names
        .into_iter()
        .map(|name| {
            let first_size = entry_size(&resolve(&first.root, &name));
            let second_size = entry_size(&resolve(&second.root, &name));
            EntryDiff {
                name,
                first_size,
                second_size,
            }
        })
        .collect();

    let diff = DirectoryDiff {
        added,
        deleted,
        modified,
    };
    let identical = diff.added.is_empty() && diff.deleted.is_empty() && diff.modified.is_empty();
    (diff, identical)
}

/// Paths present in both listings whose underlying content differs.
///
/// Regular files are compared byte for byte behind a size fast path.
/// Archives are compared by size only: decompressing them is not worth it,
/// so two same-sized archives with different content pass as unmodified.
/// Directories are skipped since their contents are compared entry by
/// entry. A path that cannot be read is skipped with a warning rather than
/// aborting the rest of the tree.
fn modified_entries(first: &Directory, second: &Directory) -> Vec<String> {
    let shared = sequence::matches(&first.content, &second.content);

    let mut modified = Vec::new();
    for name in shared {
        let first_path = resolve(&first.root, &name);
        let second_path = resolve(&second.root, &name);

        let first_meta = match fs::symlink_metadata(&first_path) {
            Ok(meta) => meta,
            Err(err) => {
                warn_skipped(&name, &err.to_string());
                continue;
            }
        };
        let second_meta = match fs::symlink_metadata(&second_path) {
            Ok(meta) => meta,
            Err(err) => {
                warn_skipped(&name, &err.to_string());
                continue;
            }
        };

        if first_meta.is_dir() || second_meta.is_dir() {
            continue;
        }

        // A symlink on one side and a regular file on the other is a
        // content change regardless of what either resolves to.
        if first_meta.is_symlink() != second_meta.is_symlink() {
            modified.push(name);
            continue;
        }

        if is_archive(&name) {
            if first_meta.len() != second_meta.len() {
                modified.push(name);
            }
            continue;
        }

        if first_meta.len() != second_meta.len() {
            modified.push(name);
            continue;
        }

        if first_meta.is_symlink() {
            match (fs::read_link(&first_path), fs::read_link(&second_path)) {
                (Ok(a), Ok(b)) => {
                    if a != b {
                        modified.push(name);
                    }
                }
                _ => warn_skipped(&name, "unreadable symlink"),
            }
            continue;
        }

        match same_contents(&first_path, &second_path) {
            Ok(true) => {}
            Ok(false) => modified.push(name),
            Err(err) => warn_skipped(&name, &format!("{err:#}")),
        }
    }
    modified
}

fn entries_for(root: &Path, names: &[String]) -> Vec<DirectoryEntry> {
    names
        .iter()
        .map(|name| DirectoryEntry {
            name: name.clone(),
            size: entry_size(&resolve(root, name)),
        })
        .collect()
}

fn resolve(root: &Path, name: &str) -> PathBuf {
    root.join(name.trim_start_matches('/'))
}

/// Size of a file, or the summed file sizes under a directory; -1 when the
/// path cannot be read.
pub fn entry_size(path: &Path) -> i64 {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(_) => return -1,
    };
    if !meta.is_dir() {
        return meta.len() as i64;
    }
    let mut total = 0i64;
    for entry in WalkDir::new(path).into_iter().flatten() {
        if let Ok(meta) = entry.metadata()
            && meta.is_file()
        {
            total += meta.len() as i64;
        }
    }
    total
}

fn same_contents(first: &Path, second: &Path) -> Result<bool> {
    let a = fs::read(first).with_context(|| format!("reading {}", first.display()))?;
    let b = fs::read(second).with_context(|| format!("reading {}", second.display()))?;
    Ok(a == b)
}

fn is_archive(name: &str) -> bool {
    name.ends_with(".tar") || name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

fn warn_skipped(name: &str, reason: &str) {
    eprintln!("{} Skipping {name}: {reason}", "!".yellow().bold());
}
