//! Deterministic ordering for diff and analysis output.
//!
//! The diff engines return set-shaped results; everything here is a pure
//! post-processing step applied at render time. Every comparator bottoms
//! out in a name/version chain so the orderings are total: two distinct
//! entries never compare equal, and sorting the same multiset twice yields
//! identical output.

use std::cmp::Ordering;

use clap::ValueEnum;
use serde::Serialize;

use super::directory::{DirectoryEntry, EntryDiff};
use super::package::{MultiVersionDiff, MultiVersionPackageMap, PackageInfo, PackageMap, VersionDiff};

/// Which key leads the ordering of report entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortMode {
    /// Name ascending, then version ascending, then size descending.
    Name,
    /// Size descending, then name ascending, then version ascending.
    Size,
}

/// One row of a package report: a flattened (name, location, instance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub version: String,
    pub size: i64,
}

fn entry_by_name(a: &PackageEntry, b: &PackageEntry) -> Ordering {
    a.name
        .cmp(&b.name)
        .then_with(|| a.version.cmp(&b.version))
        .then_with(|| b.size.cmp(&a.size))
}

fn entry_by_size(a: &PackageEntry, b: &PackageEntry) -> Ordering {
    b.size
        .cmp(&a.size)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.version.cmp(&b.version))
}

pub fn sort_packages(entries: &mut [PackageEntry], mode: SortMode) {
    match mode {
        SortMode::Name => entries.sort_by(entry_by_name),
        SortMode::Size => entries.sort_by(entry_by_size),
    }
}

/// Flatten a single-version map into sorted report rows.
pub fn package_entries(map: &PackageMap, mode: SortMode) -> Vec<PackageEntry> {
    let mut entries: Vec<PackageEntry> = map
        .iter()
        .map(|(name, info)| PackageEntry {
            name: name.clone(),
            path: None,
            version: info.version.clone(),
            size: info.size,
        })
        .collect();
    sort_packages(&mut entries, mode);
    entries
}

/// Flatten a multi-version map into sorted report rows, one per instance.
pub fn multi_package_entries(map: &MultiVersionPackageMap, mode: SortMode) -> Vec<PackageEntry> {
    let mut entries: Vec<PackageEntry> = map
        .iter()
        .flat_map(|(name, instances)| {
            instances.iter().map(|(location, info)| PackageEntry {
                name: name.clone(),
                path: Some(location.clone()),
                version: info.version.clone(),
                size: info.size,
            })
        })
        .collect();
    sort_packages(&mut entries, mode);
    entries
}

/// Order a package's instance list: version-led for name mode, size-led
/// (descending) for size mode.
pub fn sort_instances(instances: &mut [PackageInfo], mode: SortMode) {
    match mode {
        SortMode::Name => instances.sort_by(|a, b| {
            a.version
                .cmp(&b.version)
                .then_with(|| b.size.cmp(&a.size))
        }),
        SortMode::Size => instances.sort_by(|a, b| {
            b.size
                .cmp(&a.size)
                .then_with(|| a.version.cmp(&b.version))
        }),
    }
}

pub fn sort_version_diffs(diffs: &mut [VersionDiff], mode: SortMode) {
    match mode {
        SortMode::Name => diffs.sort_by(|a, b| a.name.cmp(&b.name)),
        SortMode::Size => diffs.sort_by(|a, b| {
            b.first
                .size
                .cmp(&a.first.size)
                .then_with(|| a.name.cmp(&b.name))
        }),
    }
}

/// Sort multi-version changed entries. In size mode each image's instance
/// list is ordered largest-first and the heads of the first image's lists
/// are compared.
pub fn sort_multi_version_diffs(diffs: &mut [MultiVersionDiff], mode: SortMode) {
    for diff in diffs.iter_mut() {
        sort_instances(&mut diff.first, mode);
        sort_instances(&mut diff.second, mode);
    }
    match mode {
        SortMode::Name => diffs.sort_by(|a, b| a.name.cmp(&b.name)),
        SortMode::Size => diffs.sort_by(|a, b| {
            largest_size(&b.first)
                .cmp(&largest_size(&a.first))
                .then_with(|| a.name.cmp(&b.name))
        }),
    }
}

fn largest_size(instances: &[PackageInfo]) -> i64 {
    instances.iter().map(|info| info.size).max().unwrap_or(-1)
}

pub fn sort_directory_entries(entries: &mut [DirectoryEntry], mode: SortMode) {
    match mode {
        SortMode::Name => entries.sort_by(|a, b| a.name.cmp(&b.name)),
        SortMode::Size => entries.sort_by(|a, b| {
            b.size.cmp(&a.size).then_with(|| a.name.cmp(&b.name))
        }),
    }
}

pub fn sort_entry_diffs(diffs: &mut [EntryDiff], mode: SortMode) {
    match mode {
        SortMode::Name => diffs.sort_by(|a, b| a.name.cmp(&b.name)),
        SortMode::Size => diffs.sort_by(|a, b| {
            b.first_size
                .cmp(&a.first_size)
                .then_with(|| a.name.cmp(&b.name))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, version: &str, size: i64) -> PackageEntry {
        PackageEntry {
            name: name.to_string(),
            path: None,
            version: version.to_string(),
            size,
        }
    }

    #[test]
    fn size_mode_orders_largest_first() {
        let mut entries = vec![
            entry("a", "1.2", 10),
            entry("b", "1.5", 12),
            entry("c", "1.4", 20),
        ];
        sort_packages(&mut entries, SortMode::Size);
        assert_eq!(
            entries,
            vec![
                entry("c", "1.4", 20),
                entry("b", "1.5", 12),
                entry("a", "1.2", 10),
            ]
        );
    }

    #[test]
    fn name_mode_orders_alphabetically() {
        let mut entries = vec![
            entry("c", "1.4", 20),
            entry("b", "1.5", 12),
            entry("a", "1.2", 10),
        ];
        sort_packages(&mut entries, SortMode::Name);
        assert_eq!(
            entries,
            vec![
                entry("a", "1.2", 10),
                entry("b", "1.5", 12),
                entry("c", "1.4", 20),
            ]
        );
    }

    #[test]
    fn equal_sizes_fall_back_to_names() {
        let mut entries = vec![
            entry("a", "1.2", 10),
            entry("c", "1.4", 12),
            entry("b", "1.5", 12),
        ];
        sort_packages(&mut entries, SortMode::Size);
        assert_eq!(
            entries,
            vec![
                entry("b", "1.5", 12),
                entry("c", "1.4", 12),
                entry("a", "1.2", 10),
            ]
        );
    }

    #[test]
    fn same_name_instances_order_by_version_then_size() {
        let mut entries = vec![
            entry("a", "1.2", 10),
            entry("a", "1.4", 20),
            entry("a", "1.2", 15),
        ];
        sort_packages(&mut entries, SortMode::Name);
        assert_eq!(
            entries,
            vec![
                entry("a", "1.2", 15),
                entry("a", "1.2", 10),
                entry("a", "1.4", 20),
            ]
        );
    }

    #[test]
    fn sorting_twice_is_stable() {
        let input = vec![
            entry("b", "2.0", 12),
            entry("a", "1.0", 12),
            entry("a", "1.0", 12),
            entry("c", "0.1", 30),
        ];
        for mode in [SortMode::Name, SortMode::Size] {
            let mut once = input.clone();
            sort_packages(&mut once, mode);
            let mut twice = once.clone();
            sort_packages(&mut twice, mode);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn directory_entries_by_size_tie_break_on_name() {
        let mut entries = vec![
            DirectoryEntry { name: "a".to_string(), size: 10 },
            DirectoryEntry { name: "c".to_string(), size: 12 },
            DirectoryEntry { name: "b".to_string(), size: 12 },
        ];
        sort_directory_entries(&mut entries, SortMode::Size);
        assert_eq!(
            entries,
            vec![
                DirectoryEntry { name: "b".to_string(), size: 12 },
                DirectoryEntry { name: "c".to_string(), size: 12 },
                DirectoryEntry { name: "a".to_string(), size: 10 },
            ]
        );
    }

    #[test]
    fn multi_version_size_mode_compares_largest_first_image_instance() {
        let mut diffs = vec![
            MultiVersionDiff {
                name: "small".to_string(),
                first: vec![PackageInfo::new("1.0", 5), PackageInfo::new("1.1", 8)],
                second: vec![],
            },
            MultiVersionDiff {
                name: "big".to_string(),
                first: vec![PackageInfo::new("2.0", 50), PackageInfo::new("2.1", 3)],
                second: vec![PackageInfo::new("2.2", 1)],
            },
        ];
        sort_multi_version_diffs(&mut diffs, SortMode::Size);
        assert_eq!(diffs[0].name, "big");
        // Instance lists come out largest-first.
        assert_eq!(diffs[0].first[0].size, 50);
        assert_eq!(diffs[1].first[0].size, 8);
    }

    #[test]
    fn multi_version_name_mode_orders_instances_by_version() {
        let mut diffs = vec![MultiVersionDiff {
            name: "pac".to_string(),
            first: vec![PackageInfo::new("2.0", 1), PackageInfo::new("1.0", 2)],
            second: vec![],
        }];
        sort_multi_version_diffs(&mut diffs, SortMode::Name);
        assert_eq!(diffs[0].first[0].version, "1.0");
    }
}
