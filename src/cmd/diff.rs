use anyhow::{anyhow, Result};
use crossterm::style::Stylize;

use crate::analyzer::Analyzer;
use crate::diff::sort::SortMode;
use crate::image::Image;
use crate::output::{self, DiffReport};
use crate::progress::Spinner;

pub fn run(
    first: &str,
    second: &str,
    analyzers: &[Analyzer],
    mode: SortMode,
    json: Option<&str>,
) -> Result<()> {
    let spinner = Spinner::new(format!("Loading {first} and {second}..."));
    let images = match load_pair(first, second) {
        Ok(images) => images,
        Err(err) => {
            spinner.fail("Image loading failed");
            return Err(err);
        }
    };
    spinner.finish(format!("Loaded {first} and {second}"));

    let (first_image, second_image) = images;
    let mut reports = Vec::new();
    for analyzer in analyzers {
        match analyzer.diff(&first_image, &second_image) {
            Ok(diff) => reports.push(DiffReport {
                first: first_image.source.clone(),
                second: second_image.source.clone(),
                kind: analyzer.name(),
                diff,
            }),
            Err(err) => {
                eprintln!(
                    "{} {} diff failed: {err:#}",
                    "!".yellow().bold(),
                    analyzer.name()
                );
            }
        }
    }

    if reports.is_empty() {
        anyhow::bail!("could not diff {first} and {second} with any requested analyzer");
    }

    output::write_diff_reports(reports, mode, json)
}

/// Load both images concurrently; the diff engines only run once both
/// filesystems are fully materialized.
fn load_pair(first: &str, second: &str) -> Result<(Image, Image)> {
    std::thread::scope(|scope| {
        let handle = scope.spawn(|| Image::load(second));
        let first_image = Image::load(first);
        let second_image = handle
            .join()
            .map_err(|_| anyhow!("image loading thread panicked"))?;
        Ok((first_image?, second_image?))
    })
}
