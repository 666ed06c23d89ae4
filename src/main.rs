use anyhow::Result;
use clap::{Parser, Subcommand};

use pare::analyzer::Analyzer;
use pare::cmd;
use pare::diff::sort::SortMode;

#[derive(Parser)]
#[command(name = "pare")]
#[command(about = "Compare container images by filesystem, history, and size")]
#[command(version)]
struct Cli {
    /// Analyzers to run (comma-separated)
    #[arg(
        long = "types",
        short = 't',
        global = true,
        value_enum,
        value_delimiter = ',',
        default_value = "size"
    )]
    types: Vec<Analyzer>,

    /// Sort order for report entries
    #[arg(long, global = true, value_enum, default_value = "name")]
    sort: SortMode,

    /// Output as JSON (optionally to a file)
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "-")]
    json: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two images
    Diff {
        /// First image: path to a `docker save` or OCI-layout tar archive
        image1: String,

        /// Second image to compare against
        image2: String,
    },

    /// Inspect a single image
    Analyze {
        /// Image: path to a `docker save` or OCI-layout tar archive
        image: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Diff { image1, image2 } => cmd::diff::run(
            image1,
            image2,
            &cli.types,
            cli.sort,
            cli.json.as_deref(),
        ),
        Commands::Analyze { image } => {
            cmd::analyze::run(image, &cli.types, cli.sort, cli.json.as_deref())
        }
    }
}
