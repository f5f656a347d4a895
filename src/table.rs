//! Table structure recovery: grid detection, row grouping and field
//! assignment for one image at a time.

pub mod assign;
pub mod grid;
pub mod normalize;
pub mod preprocess;
pub mod rows;

use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, RgbImage};
use std::path::Path;
use tracing::{debug, info};

use crate::diagnostics::ExtractionObserver;
use crate::models::{BoundingBox, Cell, TableRow};
use crate::ocr::Recognizer;

pub use assign::{FieldClaims, FieldRange, FieldRanges, RowAssignment, assign_row_fields};
pub use grid::{GridOptions, detect_cells};
pub use normalize::{digits_in_range, normalize_roll_number};
pub use preprocess::preprocess_cell;
pub use rows::{DEFAULT_ROW_TOLERANCE, group_rows};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractOptions {
    pub grid: GridOptions,
    pub row_tolerance: u32,
    pub ranges: FieldRanges,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            grid: GridOptions::default(),
            row_tolerance: DEFAULT_ROW_TOLERANCE,
            ranges: FieldRanges::default(),
        }
    }
}

/// Runs the whole pipeline for single images against an injected recognizer.
pub struct TableExtractor<'a> {
    recognizer: &'a dyn Recognizer,
    options: ExtractOptions,
}

impl<'a> TableExtractor<'a> {
    pub fn new(recognizer: &'a dyn Recognizer, options: ExtractOptions) -> Self {
        Self {
            recognizer,
            options,
        }
    }

    pub fn extract_path(
        &self,
        path: &Path,
        observer: &mut dyn ExtractionObserver,
    ) -> Result<Vec<TableRow>> {
        let image = load_image(path)?;
        Ok(self.extract(&image, observer))
    }

    /// Extracts one record per detected row. An image without a detectable
    /// grid gives an empty result.
    pub fn extract(
        &self,
        image: &DynamicImage,
        observer: &mut dyn ExtractionObserver,
    ) -> Vec<TableRow> {
        let boxes = detect_cells(image, &self.options.grid);
        let rows = group_rows(&boxes, self.options.row_tolerance);
        info!("table: {} cells in {} rows", boxes.len(), rows.len());
        observer.on_rows(&rows);

        let rgb = image.to_rgb8();
        rows.iter()
            .enumerate()
            .map(|(index, row_boxes)| {
                let cells = self.read_cells(&rgb, row_boxes);
                let assignment = assign_row_fields(&cells, &self.options.ranges, |cell| {
                    let region = preprocess_cell(&crop(&rgb, &cell.bbox));
                    self.recognizer.recognize_high_accuracy_text(&region)
                });
                let row = &assignment.row;
                debug!(
                    "row {}: roll={} format={} weight={} grammage={} comment={:?}",
                    index + 1,
                    row.roll_number,
                    row.format_mm,
                    row.weight_kg,
                    row.grammage_gm2,
                    row.comment.chars().take(40).collect::<String>()
                );
                observer.on_row(index, &cells, &assignment);
                assignment.row
            })
            .collect()
    }

    fn read_cells(&self, image: &RgbImage, boxes: &[BoundingBox]) -> Vec<Cell> {
        boxes
            .iter()
            .map(|bbox| {
                let region = preprocess_cell(&crop(image, bbox));
                Cell::new(
                    *bbox,
                    self.recognizer.recognize_general(&region),
                    self.recognizer.recognize_digits(&region),
                )
            })
            .collect()
    }
}

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        return Err(anyhow!("image not found: {}", path.display()));
    }
    image::open(path).with_context(|| format!("cannot load image: {}", path.display()))
}

fn crop(image: &RgbImage, bbox: &BoundingBox) -> RgbImage {
    image::imageops::crop_imm(image, bbox.x, bbox.y, bbox.width, bbox.height).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NoopObserver;
    use crate::test_util::{CellText, GridSpec, MockRecognizer, render_grid};
    use image::Rgb;
    use pretty_assertions::assert_eq;

    #[test]
    fn blank_image_yields_no_rows() {
        let recognizer = MockRecognizer::default();
        let extractor = TableExtractor::new(&recognizer, ExtractOptions::default());
        let blank = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 300, Rgb([255, 255, 255])));
        assert!(extractor.extract(&blank, &mut NoopObserver).is_empty());
        assert_eq!(recognizer.calls(), 0);
    }

    #[test]
    fn missing_file_is_an_error() {
        let recognizer = MockRecognizer::default();
        let extractor = TableExtractor::new(&recognizer, ExtractOptions::default());
        let err = extractor
            .extract_path(Path::new("/nonexistent/table1.jpg"), &mut NoopObserver)
            .unwrap_err();
        assert!(err.to_string().contains("image not found"));
    }

    #[test]
    fn undecodable_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").expect("write");
        let recognizer = MockRecognizer::default();
        let extractor = TableExtractor::new(&recognizer, ExtractOptions::default());
        let err = extractor.extract_path(&path, &mut NoopObserver).unwrap_err();
        assert!(err.to_string().contains("cannot load image"));
    }

    #[test]
    fn reads_rows_from_a_ruled_table() {
        let spec = GridSpec::new(vec![120, 90, 90, 90, 300], vec![60, 60]);
        let recognizer = MockRecognizer::default()
            .with_cell(120, CellText::same("B10001"))
            .with_cell(90, CellText::same("900"))
            .with_cell(300, CellText::general("torn edge"));
        let extractor = TableExtractor::new(&recognizer, ExtractOptions::default());
        let rows = extractor.extract(&DynamicImage::ImageRgb8(render_grid(&spec)), &mut NoopObserver);

        assert_eq!(rows.len(), 2);
        for row in rows {
            assert_eq!(row.roll_number, "B10001");
            assert_eq!(row.format_mm, "900");
            assert_eq!(row.weight_kg, "900");
            assert_eq!(row.grammage_gm2, "");
            assert_eq!(row.comment, "900 torn edge");
        }
    }
}
