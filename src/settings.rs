use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::table::{ExtractOptions, FieldRange};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub extract: ExtractOptions,
    pub ocr: OcrSettings,
    pub debug: DebugSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrSettings {
    pub tesseract: String,
    pub general_languages: String,
    pub digit_languages: String,
    pub text_languages: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            tesseract: "tesseract".to_string(),
            general_languages: "rus+eng".to_string(),
            digit_languages: "eng".to_string(),
            text_languages: "rus+eng".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugSettings {
    pub output_dir: PathBuf,
    pub image_name: String,
    pub log_name: String,
    /// Glob on the source file stem mapped to a fixed debug image name.
    pub overrides: BTreeMap<String, String>,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            image_name: "debug_{stem}.png".to_string(),
            log_name: "debug_log_{stem}.json".to_string(),
            overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    grid: Option<GridSection>,
    rows: Option<RowsSection>,
    fields: Option<FieldsSection>,
    ocr: Option<OcrSection>,
    debug: Option<DebugSection>,
}

#[derive(Debug, Default, Deserialize)]
struct GridSection {
    line_kernel: Option<u32>,
    line_iterations: Option<u32>,
    min_cell_area: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RowsSection {
    tolerance: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct FieldsSection {
    format_mm: Option<[u64; 2]>,
    weight_kg: Option<[u64; 2]>,
    grammage_gm2: Option<[u64; 2]>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSection {
    tesseract: Option<String>,
    general_languages: Option<String>,
    digit_languages: Option<String>,
    text_languages: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DebugSection {
    output_dir: Option<String>,
    image_name: Option<String>,
    log_name: Option<String>,
    overrides: Option<BTreeMap<String, String>>,
}

/// Loads the embedded defaults, then the local and home settings files, then
/// `extra_path` when given.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    load_settings_from(&ordered_paths, extra_path)
}

pub fn load_settings_from(search_paths: &[PathBuf], extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse built-in settings")?;
    settings.merge(defaults);

    let mut ordered_paths = search_paths.to_vec();
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(grid) = incoming.grid {
            let options = &mut self.extract.grid;
            if let Some(kernel) = grid.line_kernel.filter(|value| *value > 1) {
                options.line_kernel = kernel;
            }
            if let Some(iterations) = grid.line_iterations.filter(|value| *value > 0) {
                options.line_iterations = iterations;
            }
            if let Some(area) = grid.min_cell_area.filter(|value| *value >= 0.0) {
                options.min_cell_area = area;
            }
        }
        if let Some(tolerance) = incoming.rows.and_then(|rows| rows.tolerance) {
            self.extract.row_tolerance = tolerance;
        }
        if let Some(fields) = incoming.fields {
            merge_range(&mut self.extract.ranges.format_mm, fields.format_mm);
            merge_range(&mut self.extract.ranges.weight_kg, fields.weight_kg);
            merge_range(&mut self.extract.ranges.grammage_gm2, fields.grammage_gm2);
        }
        if let Some(ocr) = incoming.ocr {
            merge_text(&mut self.ocr.tesseract, ocr.tesseract);
            merge_text(&mut self.ocr.general_languages, ocr.general_languages);
            merge_text(&mut self.ocr.digit_languages, ocr.digit_languages);
            merge_text(&mut self.ocr.text_languages, ocr.text_languages);
        }
        if let Some(debug) = incoming.debug {
            if let Some(dir) = debug.output_dir.filter(|value| !value.trim().is_empty()) {
                self.debug.output_dir = PathBuf::from(dir);
            }
            merge_text(&mut self.debug.image_name, debug.image_name);
            merge_text(&mut self.debug.log_name, debug.log_name);
            if let Some(overrides) = debug.overrides {
                for (pattern, name) in overrides {
                    if !name.trim().is_empty() {
                        self.debug.overrides.insert(pattern, name);
                    }
                }
            }
        }
    }
}

fn merge_text(target: &mut String, incoming: Option<String>) {
    if let Some(value) = incoming {
        if !value.trim().is_empty() {
            *target = value.trim().to_string();
        }
    }
}

fn merge_range(target: &mut FieldRange, incoming: Option<[u64; 2]>) {
    if let Some([lo, hi]) = incoming {
        if lo <= hi {
            *target = FieldRange::new(lo, hi);
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".roll-table-ocr"))
        }
    })
}
