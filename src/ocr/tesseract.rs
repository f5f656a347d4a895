use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use std::io::Write;
use std::process::Command;
use tracing::warn;

/// One tesseract configuration: languages, engine mode and page segmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TesseractPass {
    pub(crate) languages: String,
    pub(crate) oem: u32,
    pub(crate) psm: u32,
    pub(crate) whitelist: Option<&'static str>,
}

impl TesseractPass {
    pub(crate) fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-l".to_string(),
            self.languages.clone(),
            "--oem".to_string(),
            self.oem.to_string(),
            "--psm".to_string(),
            self.psm.to_string(),
        ];
        if let Some(chars) = self.whitelist {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={}", chars));
        }
        args
    }
}

pub fn list_tesseract_languages(binary: &str) -> Result<Vec<String>> {
    let output = Command::new(binary)
        .arg("--list-langs")
        .output()
        .with_context(|| format!("failed to run {} --list-langs", binary))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract --list-langs failed: {}", stderr.trim()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_language_list(&stdout))
}

fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keeps the requested languages that tesseract actually has installed.
///
/// When the installed list cannot be read the request is passed through
/// untouched and tesseract itself reports what is missing.
pub(crate) fn normalize_ocr_languages(requested: &str, available: Option<&[String]>) -> Result<String> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("ocr languages is empty"));
    }
    let Some(available) = available else {
        return Ok(trimmed.to_string());
    };

    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for raw in trimmed.split(['+', ',', ' ']) {
        let lang = raw.trim();
        if lang.is_empty() {
            continue;
        }
        if available.iter().any(|value| value == lang) {
            chosen.push(lang.to_string());
        } else {
            missing.push(lang.to_string());
        }
    }

    if chosen.is_empty() {
        return Err(anyhow!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        ));
    }
    if !missing.is_empty() {
        warn!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        );
    }

    Ok(chosen.join("+"))
}

pub(crate) fn run_tesseract_text(binary: &str, image: &RgbImage, pass: &TesseractPass) -> Result<String> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .with_context(|| "failed to create temp file for OCR")?;
    image
        .write_to(&mut tmp, image::ImageFormat::Png)
        .with_context(|| "failed to write temp image for OCR")?;
    tmp.flush().ok();

    let output = Command::new(binary)
        .arg(tmp.path())
        .arg("stdout")
        .args(pass.args())
        .output()
        .with_context(|| "failed to run tesseract (is it installed?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract failed: {}", stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
