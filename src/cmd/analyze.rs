use anyhow::Result;
use crossterm::style::Stylize;

use crate::analyzer::Analyzer;
use crate::diff::sort::SortMode;
use crate::image::Image;
use crate::output::{self, AnalyzeReport};
use crate::progress::Spinner;

pub fn run(image: &str, analyzers: &[Analyzer], mode: SortMode, json: Option<&str>) -> Result<()> {
    let spinner = Spinner::new(format!("Loading {image}..."));
    let loaded = match Image::load(image) {
        Ok(loaded) => loaded,
        Err(err) => {
            spinner.fail("Image loading failed");
            return Err(err);
        }
    };
    spinner.finish(format!("Loaded {image}"));

    let mut reports = Vec::new();
    for analyzer in analyzers {
        match analyzer.analyze(&loaded) {
            Ok(analysis) => reports.push(AnalyzeReport {
                image: loaded.source.clone(),
                kind: analyzer.name(),
                analysis,
            }),
            Err(err) => {
                eprintln!(
                    "{} {} analysis failed: {err:#}",
                    "!".yellow().bold(),
                    analyzer.name()
                );
            }
        }
    }

    if reports.is_empty() {
        anyhow::bail!("could not analyze {image} with any requested analyzer");
    }

    output::write_analyze_reports(reports, mode, json)
}
