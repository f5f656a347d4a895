use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use roll_table_ocr::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "roll-table-ocr",
    version,
    about = "Extract roll records from photographed table forms"
)]
struct Cli {
    /// Image files or directories of .jpg/.jpeg/.png images
    #[arg(required_unless_present = "show_languages")]
    inputs: Vec<PathBuf>,

    /// Read extra settings from a local TOML file
    #[arg(short = 's', long = "settings")]
    settings: Option<PathBuf>,

    /// Write annotated images and per-field audit logs
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Output format for extracted records
    #[arg(short = 'f', long = "format", value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Number of images processed in parallel (default: number of CPUs)
    #[arg(short = 'j', long = "jobs")]
    jobs: Option<usize>,

    /// Print the whole-page text of each image instead of table records
    #[arg(long = "raw")]
    raw: bool,

    /// Show installed tesseract languages and exit
    #[arg(long = "show-languages")]
    show_languages: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    roll_table_ocr::logging::init(cli.verbose)?;

    let output = roll_table_ocr::run(roll_table_ocr::Config {
        inputs: cli.inputs,
        settings_path: cli.settings,
        debug: cli.debug,
        format: cli.format,
        jobs: cli.jobs,
        show_languages: cli.show_languages,
        raw: cli.raw,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
