//! Report structures and rendering.
//!
//! Analyzers produce set-shaped results; this module applies the requested
//! sort mode and writes them out, either as pretty JSON (to stdout or a
//! file, `-` meaning stdout) or as a plain text report.

use std::fs;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use serde::Serialize;

use crate::diff::directory::{DirectoryDiff, DirectoryEntry};
use crate::diff::package::{MultiVersionDiff, MultiVersionPackageDiff, PackageDiff, VersionDiff};
use crate::diff::sort::{self, PackageEntry, SortMode};

/// One analyzer's diff of two images.
#[derive(Debug, Serialize)]
pub struct DiffReport {
    pub first: String,
    pub second: String,
    pub kind: &'static str,
    pub diff: DiffOutcome,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DiffOutcome {
    Directory(DirectoryDiff),
    History(HistoryDiff),
    Size(Vec<SizeDiff>),
}

#[derive(Debug, Serialize)]
pub struct HistoryDiff {
    pub added: Vec<String>,
    pub deleted: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SizeDiff {
    pub name: String,
    pub first_size: i64,
    pub second_size: i64,
}

/// One analyzer's inventory of a single image.
#[derive(Debug, Serialize)]
pub struct AnalyzeReport {
    pub image: String,
    pub kind: &'static str,
    pub analysis: Analysis,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Analysis {
    Files(Vec<DirectoryEntry>),
    History(Vec<String>),
    Size(Vec<SizeEntry>),
}

#[derive(Debug, Serialize)]
pub struct SizeEntry {
    pub name: String,
    pub size: i64,
}

/// A [`PackageDiff`] with the sort mode applied, ready to serialize.
#[derive(Debug, Serialize)]
pub struct PackageDiffReport {
    pub only_in_first: Vec<PackageEntry>,
    pub only_in_second: Vec<PackageEntry>,
    pub changed: Vec<VersionDiff>,
}

pub fn package_diff_report(diff: PackageDiff, mode: SortMode) -> PackageDiffReport {
    let mut changed = diff.changed;
    sort::sort_version_diffs(&mut changed, mode);
    PackageDiffReport {
        only_in_first: sort::package_entries(&diff.only_in_first, mode),
        only_in_second: sort::package_entries(&diff.only_in_second, mode),
        changed,
    }
}

/// A [`MultiVersionPackageDiff`] with the sort mode applied.
#[derive(Debug, Serialize)]
pub struct MultiVersionPackageDiffReport {
    pub only_in_first: Vec<PackageEntry>,
    pub only_in_second: Vec<PackageEntry>,
    pub changed: Vec<MultiVersionDiff>,
}

pub fn multi_version_package_diff_report(
    diff: MultiVersionPackageDiff,
    mode: SortMode,
) -> MultiVersionPackageDiffReport {
    let mut changed = diff.changed;
    sort::sort_multi_version_diffs(&mut changed, mode);
    MultiVersionPackageDiffReport {
        only_in_first: sort::multi_package_entries(&diff.only_in_first, mode),
        only_in_second: sort::multi_package_entries(&diff.only_in_second, mode),
        changed,
    }
}

/// Sort and write diff reports to the chosen destination.
pub fn write_diff_reports(
    mut reports: Vec<DiffReport>,
    mode: SortMode,
    json: Option<&str>,
) -> Result<()> {
    for report in &mut reports {
        sort_diff_outcome(&mut report.diff, mode);
    }

    if let Some(dest) = json {
        return write_json(&reports, dest);
    }
    for report in &reports {
        print_diff_report(report);
    }
    Ok(())
}

/// Sort and write analyze reports to the chosen destination.
pub fn write_analyze_reports(
    mut reports: Vec<AnalyzeReport>,
    mode: SortMode,
    json: Option<&str>,
) -> Result<()> {
    for report in &mut reports {
        if let Analysis::Files(entries) = &mut report.analysis {
            sort::sort_directory_entries(entries, mode);
        }
    }

    if let Some(dest) = json {
        return write_json(&reports, dest);
    }
    for report in &reports {
        print_analyze_report(report);
    }
    Ok(())
}

fn sort_diff_outcome(outcome: &mut DiffOutcome, mode: SortMode) {
    if let DiffOutcome::Directory(diff) = outcome {
        sort::sort_directory_entries(&mut diff.added, mode);
        sort::sort_directory_entries(&mut diff.deleted, mode);
        sort::sort_entry_diffs(&mut diff.modified, mode);
    }
}

fn write_json<T: Serialize>(reports: &T, dest: &str) -> Result<()> {
    let output = serde_json::to_string_pretty(reports)?;
    if dest == "-" {
        println!("{output}");
    } else {
        fs::write(dest, &output).with_context(|| format!("writing JSON to {dest}"))?;
        eprintln!("{} Wrote {dest}", "✔".green());
    }
    Ok(())
}

fn print_diff_report(report: &DiffReport) {
    println!("-----{}-----", report.kind);
    println!();
    match &report.diff {
        DiffOutcome::Directory(diff) => {
            println!("These entries have been added to {}:", report.second);
            print_directory_entries(&diff.added);
            println!();
            println!("These entries have been deleted from {}:", report.first);
            print_directory_entries(&diff.deleted);
            println!();
            println!("These entries have changed:");
            if diff.modified.is_empty() {
                println!("  (none)");
            }
            for entry in &diff.modified {
                println!(
                    "  {} ({} -> {})",
                    entry.name,
                    format_bytes(entry.first_size),
                    format_bytes(entry.second_size)
                );
            }
        }
        DiffOutcome::History(diff) => {
            println!("Lines added to {}:", report.second);
            print_lines(&diff.added);
            println!();
            println!("Lines deleted from {}:", report.first);
            print_lines(&diff.deleted);
        }
        DiffOutcome::Size(diffs) => {
            if diffs.is_empty() {
                println!("No size difference between {} and {}", report.first, report.second);
            }
            for diff in diffs {
                println!(
                    "  {}{} -> {}",
                    if diff.name.is_empty() {
                        String::new()
                    } else {
                        format!("{}: ", diff.name)
                    },
                    format_bytes(diff.first_size),
                    format_bytes(diff.second_size)
                );
            }
        }
    }
    println!();
}

fn print_analyze_report(report: &AnalyzeReport) {
    println!("-----{}-----", report.kind);
    println!();
    println!("Analysis for {}:", report.image);
    match &report.analysis {
        Analysis::Files(entries) => print_directory_entries(entries),
        Analysis::History(lines) => print_lines(lines),
        Analysis::Size(entries) => {
            for entry in entries {
                println!("  {}: {}", entry.name, format_bytes(entry.size));
            }
        }
    }
    println!();
}

fn print_directory_entries(entries: &[DirectoryEntry]) {
    if entries.is_empty() {
        println!("  (none)");
    }
    for entry in entries {
        println!("  {} ({})", entry.name, format_bytes(entry.size));
    }
}

fn print_lines(lines: &[String]) {
    if lines.is_empty() {
        println!("  (none)");
    }
    for line in lines {
        println!("  {line}");
    }
}

fn format_bytes(bytes: i64) -> String {
    if bytes < 0 {
        return "unknown".to_string();
    }
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return if size.fract() < 0.05 {
                format!("{size:.0} {unit}")
            } else {
                format!("{size:.1} {unit}")
            };
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::package::{diff_packages, PackageInfo};

    #[test]
    fn package_report_is_sorted_for_rendering() {
        let first = [
            ("zsh", PackageInfo::new("5.9", 10)),
            ("bash", PackageInfo::new("5.2", 80)),
            ("curl", PackageInfo::new("8.0", 30)),
        ]
        .into_iter()
        .map(|(name, info)| (name.to_string(), info))
        .collect();
        let second = [("curl", PackageInfo::new("8.5", 31))]
            .into_iter()
            .map(|(name, info)| (name.to_string(), info))
            .collect();

        let by_name = package_diff_report(diff_packages(first, second), SortMode::Name);
        let names: Vec<&str> = by_name
            .only_in_first
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(names, vec!["bash", "zsh"]);
        assert_eq!(by_name.changed.len(), 1);
        assert_eq!(by_name.changed[0].name, "curl");
    }

    #[test]
    fn size_mode_reorders_the_unique_partitions() {
        let first = [
            ("small", PackageInfo::new("1.0", 5)),
            ("large", PackageInfo::new("1.0", 500)),
        ]
        .into_iter()
        .map(|(name, info)| (name.to_string(), info))
        .collect();

        let report = package_diff_report(
            diff_packages(first, std::collections::HashMap::new()),
            SortMode::Size,
        );
        assert_eq!(report.only_in_first[0].name, "large");
        assert_eq!(report.only_in_first[1].name, "small");
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(-1), "unknown");
        assert_eq!(format_bytes(12), "12 B");
        assert_eq!(format_bytes(2048), "2 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024 + 300 * 1024), "5.3 MB");
    }
}
