use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};

use crate::settings::DebugSettings;

const STEM_PLACEHOLDER: &str = "{stem}";

/// Decides where the diagnostic artifacts of one source image are written.
#[derive(Debug, Clone)]
pub struct NamingPolicy {
    output_dir: PathBuf,
    image_template: String,
    log_template: String,
    overrides: Vec<(GlobMatcher, String)>,
}

impl NamingPolicy {
    pub fn from_settings(settings: &DebugSettings) -> Result<Self> {
        let mut overrides = Vec::new();
        for (pattern, name) in &settings.overrides {
            let matcher = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("invalid debug override pattern: {}", pattern))?
                .compile_matcher();
            overrides.push((matcher, name.clone()));
        }
        Ok(Self {
            output_dir: settings.output_dir.clone(),
            image_template: settings.image_name.clone(),
            log_template: settings.log_name.clone(),
            overrides,
        })
    }

    pub fn image_path(&self, source: &Path) -> PathBuf {
        let stem = source_stem(source);
        let name = self
            .overrides
            .iter()
            .find(|(matcher, _)| matcher.is_match(&stem))
            .map(|(_, name)| name.clone())
            .unwrap_or_else(|| render(&self.image_template, &stem));
        self.output_dir.join(name)
    }

    pub fn log_path(&self, source: &Path) -> PathBuf {
        self.output_dir
            .join(render(&self.log_template, &source_stem(source)))
    }

    pub fn ensure_output_dir(&self) -> Result<&Path> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("failed to create debug dir: {}", self.output_dir.display())
        })?;
        Ok(&self.output_dir)
    }
}

fn render(template: &str, stem: &str) -> String {
    template.replace(STEM_PLACEHOLDER, stem)
}

fn source_stem(source: &Path) -> String {
    let stem = source
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("input");
    sanitize_filename_component(stem)
}

fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    for ch in value.chars() {
        if ch.is_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        } else if ch.is_whitespace() {
            out.push('_');
        }
    }
    if out.is_empty() {
        "input".to_string()
    } else {
        out
    }
}
