//! The closed set of analyzers that can run over a loaded image.
//!
//! Each analyzer extracts one kind of inventory from an image and knows how
//! to diff that inventory between two images. Per-ecosystem package
//! scanners are out of scope here; the package map diff engines in
//! [`crate::diff::package`] are driven through the library API instead.

use std::fmt;

use anyhow::Result;
use clap::ValueEnum;

use crate::diff::directory::{self, entry_size};
use crate::diff::sequence;
use crate::image::Image;
use crate::output::{Analysis, DiffOutcome, HistoryDiff, SizeDiff, SizeEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Analyzer {
    /// Filesystem entries of the extracted image.
    File,
    /// Dockerfile history lines from the image config.
    History,
    /// Total size of the extracted filesystem.
    Size,
}

impl Analyzer {
    pub fn name(self) -> &'static str {
        match self {
            Analyzer::File => "file",
            Analyzer::History => "history",
            Analyzer::Size => "size",
        }
    }

    pub fn diff(self, first: &Image, second: &Image) -> Result<DiffOutcome> {
        match self {
            Analyzer::File => {
                let a = directory::directory_for(first.root())?;
                let b = directory::directory_for(second.root())?;
                let (diff, _identical) = directory::diff_directories(&a, &b);
                Ok(DiffOutcome::Directory(diff))
            }
            Analyzer::History => Ok(DiffOutcome::History(HistoryDiff {
                added: sequence::additions(&first.history, &second.history),
                deleted: sequence::deletions(&first.history, &second.history),
            })),
            Analyzer::Size => {
                let first_size = entry_size(first.root());
                let second_size = entry_size(second.root());
                let mut diff = Vec::new();
                if first_size != second_size {
                    diff.push(SizeDiff {
                        name: String::new(),
                        first_size,
                        second_size,
                    });
                }
                Ok(DiffOutcome::Size(diff))
            }
        }
    }

    pub fn analyze(self, image: &Image) -> Result<Analysis> {
        match self {
            Analyzer::File => {
                let directory = directory::directory_for(image.root())?;
                Ok(Analysis::Files(directory::directory_entries(&directory)))
            }
            Analyzer::History => Ok(Analysis::History(image.history.clone())),
            Analyzer::Size => Ok(Analysis::Size(vec![SizeEntry {
                name: image.source.clone(),
                size: entry_size(image.root()),
            }])),
        }
    }
}

impl fmt::Display for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
