use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::BoundingBox;
use crate::ocr::Recognizer;

const MARGIN: u32 = 20;
const LINE: u32 = 2;
const WIDTH_SLACK: u32 = 8;

/// A ruled table: interior column widths and row heights in pixels.
pub(crate) struct GridSpec {
    columns: Vec<u32>,
    rows: Vec<u32>,
}

impl GridSpec {
    pub(crate) fn new(columns: Vec<u32>, rows: Vec<u32>) -> Self {
        Self { columns, rows }
    }

    fn lines(sizes: &[u32]) -> Vec<u32> {
        let mut lines = vec![MARGIN];
        for size in sizes {
            let last = *lines.last().unwrap_or(&MARGIN);
            lines.push(last + LINE + size);
        }
        lines
    }

    /// Boxes the grid detector should report: each interior grown by the
    /// surrounding one-pixel border.
    pub(crate) fn cell_boxes(&self) -> Vec<BoundingBox> {
        let xs = Self::lines(&self.columns);
        let ys = Self::lines(&self.rows);
        let mut boxes = Vec::new();
        for (row, height) in self.rows.iter().enumerate() {
            for (col, width) in self.columns.iter().enumerate() {
                boxes.push(BoundingBox::new(
                    xs[col] + LINE - 1,
                    ys[row] + LINE - 1,
                    width + 2,
                    height + 2,
                ));
            }
        }
        boxes
    }
}

pub(crate) fn render_grid(spec: &GridSpec) -> RgbImage {
    let xs = GridSpec::lines(&spec.columns);
    let ys = GridSpec::lines(&spec.rows);
    let right = xs.last().copied().unwrap_or(MARGIN) + LINE;
    let bottom = ys.last().copied().unwrap_or(MARGIN) + LINE;
    let mut image = RgbImage::from_pixel(right + MARGIN, bottom + MARGIN, Rgb([255, 255, 255]));
    let ink = Rgb([0, 0, 0]);
    for x in &xs {
        let rect = Rect::at(*x as i32, MARGIN as i32).of_size(LINE, bottom - MARGIN);
        draw_filled_rect_mut(&mut image, rect, ink);
    }
    for y in &ys {
        let rect = Rect::at(MARGIN as i32, *y as i32).of_size(right - MARGIN, LINE);
        draw_filled_rect_mut(&mut image, rect, ink);
    }
    image
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CellText {
    general: String,
    digits: String,
    high_accuracy: String,
}

impl CellText {
    /// Both fast passes read the same text; the second pass reads nothing.
    pub(crate) fn same(text: &str) -> Self {
        Self {
            general: text.to_string(),
            digits: text.to_string(),
            high_accuracy: String::new(),
        }
    }

    pub(crate) fn general(text: &str) -> Self {
        Self {
            general: text.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn with_high_accuracy(mut self, text: &str) -> Self {
        self.high_accuracy = text.to_string();
        self
    }
}

/// Answers by the width of the region it is shown, so synthetic grids can
/// give every column its own text.
#[derive(Default)]
pub(crate) struct MockRecognizer {
    by_width: Vec<(u32, CellText)>,
    calls: AtomicUsize,
}

impl MockRecognizer {
    pub(crate) fn with_cell(mut self, interior_width: u32, text: CellText) -> Self {
        self.by_width.push((interior_width + 2, text));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, region: &RgbImage) -> Option<&CellText> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let width = region.width();
        self.by_width
            .iter()
            .filter(|(expected, _)| expected.abs_diff(width) <= WIDTH_SLACK)
            .min_by_key(|(expected, _)| expected.abs_diff(width))
            .map(|(_, text)| text)
    }
}

impl Recognizer for MockRecognizer {
    fn recognize_general(&self, region: &RgbImage) -> String {
        self.lookup(region).map(|text| text.general.clone()).unwrap_or_default()
    }

    fn recognize_digits(&self, region: &RgbImage) -> String {
        self.lookup(region).map(|text| text.digits.clone()).unwrap_or_default()
    }

    fn recognize_high_accuracy_text(&self, region: &RgbImage) -> String {
        self.lookup(region)
            .map(|text| text.high_accuracy.clone())
            .unwrap_or_default()
    }
}
