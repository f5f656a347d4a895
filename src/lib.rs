use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

pub mod diagnostics;
pub mod logging;
pub mod models;
pub mod ocr;
pub mod settings;
pub mod table;

#[cfg(test)]
mod test_util;

pub use diagnostics::{DiagnosticsRecorder, ExtractionObserver, NamingPolicy, NoopObserver};
pub use models::{BoundingBox, Cell, Column, ExtractedRecord, PageText, TableRow};
pub use ocr::{Recognizer, TesseractRecognizer};
pub use settings::Settings;
pub use table::{ExtractOptions, TableExtractor};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Tsv,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub inputs: Vec<PathBuf>,
    pub settings_path: Option<PathBuf>,
    pub debug: bool,
    pub format: OutputFormat,
    pub jobs: Option<usize>,
    pub show_languages: bool,
    /// Dump whole-page text per image instead of extracting the table.
    pub raw: bool,
}

pub async fn run(config: Config) -> Result<String> {
    let settings = settings::load_settings(config.settings_path.as_deref())?;

    if config.show_languages {
        let langs = ocr::list_tesseract_languages(&settings.ocr.tesseract)?;
        return Ok(langs.join("\n"));
    }

    let images = collect_images(&config.inputs)?;
    if images.is_empty() {
        return Err(anyhow!("no images found"));
    }

    let recognizer: Arc<dyn Recognizer> = Arc::new(TesseractRecognizer::new(&settings.ocr)?);
    run_with(config, recognizer, settings, images).await
}

async fn run_with(
    config: Config,
    recognizer: Arc<dyn Recognizer>,
    settings: Settings,
    images: Vec<PathBuf>,
) -> Result<String> {
    let jobs = config.jobs.filter(|value| *value > 0).unwrap_or_else(num_cpus::get);

    if config.raw {
        let pages = succeeded(read_pages(images, recognizer, jobs).await?)?;
        let pages: Vec<PageText> = pages
            .into_iter()
            .map(|(path, lines)| PageText {
                source_file: file_name(&path),
                lines,
            })
            .collect();
        return format_pages(&pages, config.format);
    }

    let results = extract_images(images, recognizer, Arc::new(settings), config.debug, jobs).await?;
    let mut records = Vec::new();
    for (path, rows) in succeeded(results)? {
        let source_file = file_name(&path);
        records.extend(rows.into_iter().map(|row| ExtractedRecord {
            source_file: source_file.clone(),
            row,
        }));
    }
    format_records(&records, config.format)
}

/// Drops failed images after logging them. An image that was read but held
/// no table still counts as a success; the batch fails only when every
/// image failed.
fn succeeded<T>(results: Vec<(PathBuf, Result<T>)>) -> Result<Vec<(PathBuf, T)>> {
    let mut ok = Vec::with_capacity(results.len());
    let mut first_failure = None;
    for (path, result) in results {
        match result {
            Ok(value) => ok.push((path, value)),
            Err(err) => {
                warn!("{:#}", err);
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
        }
    }
    match first_failure {
        Some(err) if ok.is_empty() => Err(err),
        _ => Ok(ok),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Processes every image on the blocking pool, at most `jobs` at a time.
/// Results keep the order of `images`.
pub async fn extract_images(
    images: Vec<PathBuf>,
    recognizer: Arc<dyn Recognizer>,
    settings: Arc<Settings>,
    debug: bool,
    jobs: usize,
) -> Result<Vec<(PathBuf, Result<Vec<TableRow>>)>> {
    process_batch(images, jobs, move |path| {
        extract_image(path, recognizer.as_ref(), &settings, debug)
    })
    .await
}

/// Reads the whole-page text of every image, without table detection.
pub async fn read_pages(
    images: Vec<PathBuf>,
    recognizer: Arc<dyn Recognizer>,
    jobs: usize,
) -> Result<Vec<(PathBuf, Result<Vec<String>>)>> {
    process_batch(images, jobs, move |path| {
        info!("reading page: {}", path.display());
        let image = table::load_image(path)?;
        Ok(recognizer.recognize_page(&image.to_rgb8()))
    })
    .await
}

async fn process_batch<T, F>(
    images: Vec<PathBuf>,
    jobs: usize,
    work: F,
) -> Result<Vec<(PathBuf, Result<T>)>>
where
    T: Send + 'static,
    F: Fn(&Path) -> Result<T> + Send + Sync + 'static,
{
    let work = Arc::new(work);
    let permits = Arc::new(Semaphore::new(jobs.max(1)));
    let mut handles = Vec::with_capacity(images.len());
    for path in images {
        let permits = permits.clone();
        let work = work.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .with_context(|| "extraction pool closed")?;
            let image_path = path.clone();
            let result = tokio::task::spawn_blocking(move || (*work)(&image_path))
                .await
                .with_context(|| format!("extraction task failed: {}", path.display()))?;
            Ok::<_, anyhow::Error>((path, result))
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.with_context(|| "extraction task panicked")??);
    }
    Ok(results)
}

/// Extracts the table of one image, writing diagnostics when `debug` is set.
pub fn extract_image(
    path: &Path,
    recognizer: &dyn Recognizer,
    settings: &Settings,
    debug: bool,
) -> Result<Vec<TableRow>> {
    info!("processing: {}", path.display());
    let extractor = TableExtractor::new(recognizer, settings.extract);
    if !debug {
        return extractor.extract_path(path, &mut NoopObserver);
    }

    let naming = NamingPolicy::from_settings(&settings.debug)?;
    let image = table::load_image(path)?;
    let mut recorder = DiagnosticsRecorder::new(&image);
    let rows = extractor.extract(&image, &mut recorder);
    recorder.finish(&naming, path)?;
    Ok(rows)
}

/// Expands directories into their image files (sorted by name). Plain paths
/// are kept as given so a missing file is reported when it is loaded.
pub fn collect_images(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            images.push(input.clone());
            continue;
        }
        let mut found = Vec::new();
        let entries = std::fs::read_dir(input)
            .with_context(|| format!("failed to list directory: {}", input.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("failed to read directory entry: {}", input.display()))?
                .path();
            if path.is_file() && has_image_extension(&path) {
                found.push(path);
            }
        }
        found.sort();
        images.extend(found);
    }
    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

pub fn format_records(records: &[ExtractedRecord], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(records).with_context(|| "failed to serialize records")
        }
        OutputFormat::Tsv => {
            let mut lines = Vec::with_capacity(records.len() + 1);
            let mut header = vec!["Source File"];
            header.extend(Column::ALL.iter().map(|column| column.title()));
            lines.push(header.join("\t"));
            for record in records {
                let mut fields = vec![tsv_field(&record.source_file)];
                fields.extend(
                    Column::ALL
                        .iter()
                        .map(|column| tsv_field(record.row.get(*column))),
                );
                lines.push(fields.join("\t"));
            }
            Ok(lines.join("\n"))
        }
    }
}

pub fn format_pages(pages: &[PageText], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(pages).with_context(|| "failed to serialize page text")
        }
        OutputFormat::Tsv => {
            let mut lines = vec!["Source File\tLine".to_string()];
            for page in pages {
                for line in &page.lines {
                    lines.push(format!("{}\t{}", tsv_field(&page.source_file), tsv_field(line)));
                }
            }
            Ok(lines.join("\n"))
        }
    }
}

fn tsv_field(value: &str) -> String {
    value
        .chars()
        .map(|ch| if matches!(ch, '\t' | '\n' | '\r') { ' ' } else { ch })
        .collect()
}
