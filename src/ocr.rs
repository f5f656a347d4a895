mod tesseract;

use anyhow::Result;
use image::RgbImage;
use tracing::{debug, warn};

use crate::settings::OcrSettings;

pub use tesseract::list_tesseract_languages;

use tesseract::{TesseractPass, normalize_ocr_languages, run_tesseract_text};

const DIGITS: &str = "0123456789";

/// Text recognition over a single cell image.
///
/// Implementations return an empty string when nothing is found and never
/// fail; engine errors are logged and degrade to empty text.
pub trait Recognizer: Send + Sync {
    /// Mixed Cyrillic/Latin alphanumeric text, fragments joined in reading order.
    fn recognize_general(&self, region: &RgbImage) -> String;

    /// Recognition tuned for digit sequences.
    fn recognize_digits(&self, region: &RgbImage) -> String;

    /// Slower, independent pass used for free-text comments.
    fn recognize_high_accuracy_text(&self, region: &RgbImage) -> String;

    /// Text of a whole page as non-empty lines, top to bottom.
    fn recognize_page(&self, page: &RgbImage) -> Vec<String> {
        page_lines(&self.recognize_high_accuracy_text(page))
    }
}

/// Runs the `tesseract` command line tool with one configuration per pass.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: String,
    general: TesseractPass,
    digits: TesseractPass,
    text: TesseractPass,
    page: TesseractPass,
}

impl TesseractRecognizer {
    pub fn new(settings: &OcrSettings) -> Result<Self> {
        let available = match list_tesseract_languages(&settings.tesseract) {
            Ok(list) => Some(list),
            Err(err) => {
                warn!("could not list tesseract languages: {:#}", err);
                None
            }
        };
        let available = available.as_deref();

        let text_languages = normalize_ocr_languages(&settings.text_languages, available)?;
        let recognizer = Self {
            binary: settings.tesseract.clone(),
            general: TesseractPass {
                languages: normalize_ocr_languages(&settings.general_languages, available)?,
                oem: 1,
                psm: 7,
                whitelist: None,
            },
            digits: TesseractPass {
                languages: normalize_ocr_languages(&settings.digit_languages, available)?,
                oem: 1,
                psm: 7,
                whitelist: Some(DIGITS),
            },
            text: TesseractPass {
                languages: text_languages.clone(),
                oem: 3,
                psm: 6,
                whitelist: None,
            },
            page: TesseractPass {
                languages: text_languages,
                oem: 3,
                psm: 3,
                whitelist: None,
            },
        };
        debug!(
            "tesseract: general={} digits={} text={}",
            recognizer.general.languages, recognizer.digits.languages, recognizer.text.languages
        );
        Ok(recognizer)
    }

    fn read(&self, region: &RgbImage, pass: &TesseractPass, label: &str) -> String {
        match run_tesseract_text(&self.binary, region, pass) {
            Ok(text) => text,
            Err(err) => {
                warn!("ocr ({}) failed: {:#}", label, err);
                String::new()
            }
        }
    }
}

impl Recognizer for TesseractRecognizer {
    fn recognize_general(&self, region: &RgbImage) -> String {
        collapse_whitespace(&self.read(region, &self.general, "general"))
    }

    fn recognize_digits(&self, region: &RgbImage) -> String {
        collapse_whitespace(&self.read(region, &self.digits, "digits"))
    }

    fn recognize_high_accuracy_text(&self, region: &RgbImage) -> String {
        self.read(region, &self.text, "text").trim().to_string()
    }

    fn recognize_page(&self, page: &RgbImage) -> Vec<String> {
        page_lines(&self.read(page, &self.page, "page"))
    }
}

fn page_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect()
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
