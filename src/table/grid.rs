use image::{DynamicImage, GrayImage};
use imageproc::contours::{Contour, find_contours};
use tracing::debug;

use crate::models::BoundingBox;

use super::preprocess::{Polarity, binarize_otsu, to_luma};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridOptions {
    /// Length of the line structuring element, in pixels.
    pub line_kernel: u32,
    /// How many times erosion and dilation are applied during opening.
    pub line_iterations: u32,
    /// Contours enclosing this many square pixels or fewer are noise.
    pub min_cell_area: f64,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            line_kernel: 40,
            line_iterations: 2,
            min_cell_area: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Horizontal,
    Vertical,
}

/// Finds candidate table cells from the ruling lines of `image`.
///
/// Boxes come back sorted by top, then left. An image without detectable
/// gridlines yields an empty vector.
pub fn detect_cells(image: &DynamicImage, options: &GridOptions) -> Vec<BoundingBox> {
    let gray = to_luma(image);
    let ink = binarize_otsu(&gray, Polarity::Inverted);
    let skeleton = grid_skeleton(&ink, options);

    let contours = find_contours::<i32>(&skeleton);
    let candidates: Vec<BoundingBox> = contours
        .iter()
        .filter(|contour| contour_area(contour) > options.min_cell_area)
        .filter_map(bounding_rect)
        .collect();

    // The outer frame of the table encloses every cell; keep the cells only.
    let boxes = reading_order(
        candidates
            .iter()
            .filter(|outer| !candidates.iter().any(|inner| outer.strictly_contains(inner)))
            .copied()
            .collect(),
    );

    debug!(
        "grid: {} contours, {} candidate cells, {} kept",
        contours.len(),
        candidates.len(),
        boxes.len()
    );
    boxes
}

/// Sorts by top, then left, with size breaking ties so equal boxes sit
/// together and are dropped once.
fn reading_order(mut boxes: Vec<BoundingBox>) -> Vec<BoundingBox> {
    boxes.sort_by_key(|bbox| (bbox.y, bbox.x, bbox.width, bbox.height));
    boxes.dedup();
    boxes
}

pub(crate) fn grid_skeleton(ink: &GrayImage, options: &GridOptions) -> GrayImage {
    let horizontal = open_lines(ink, Orientation::Horizontal, options);
    let vertical = open_lines(ink, Orientation::Vertical, options);
    let mut skeleton = horizontal;
    for (out, other) in skeleton.pixels_mut().zip(vertical.pixels()) {
        out[0] = out[0].saturating_add(other[0]);
    }
    skeleton
}

// Opening a binary mask with a 1-pixel-thick line element, repeated n times,
// keeps exactly the runs at least n * (len - 1) + 1 pixels long.
fn open_lines(mask: &GrayImage, orientation: Orientation, options: &GridOptions) -> GrayImage {
    let kernel = options.line_kernel.max(1);
    let iterations = options.line_iterations.max(1);
    let min_run = iterations.saturating_mul(kernel - 1).saturating_add(1);

    let (width, height) = mask.dimensions();
    let (lanes, lane_len) = match orientation {
        Orientation::Horizontal => (height, width),
        Orientation::Vertical => (width, height),
    };
    let at = |lane: u32, pos: u32| match orientation {
        Orientation::Horizontal => (pos, lane),
        Orientation::Vertical => (lane, pos),
    };

    let mut output = GrayImage::new(width, height);
    for lane in 0..lanes {
        let mut pos = 0;
        while pos < lane_len {
            let (x, y) = at(lane, pos);
            if mask.get_pixel(x, y)[0] == 0 {
                pos += 1;
                continue;
            }
            let start = pos;
            while pos < lane_len {
                let (x, y) = at(lane, pos);
                if mask.get_pixel(x, y)[0] == 0 {
                    break;
                }
                pos += 1;
            }
            if pos - start >= min_run {
                for keep in start..pos {
                    let (x, y) = at(lane, keep);
                    output.put_pixel(x, y, image::Luma([255]));
                }
            }
        }
    }
    output
}

fn contour_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (idx, current) in points.iter().enumerate() {
        let next = &points[(idx + 1) % points.len()];
        twice_area += current.x as i64 * next.y as i64 - next.x as i64 * current.y as i64;
    }
    twice_area.unsigned_abs() as f64 / 2.0
}

fn bounding_rect(contour: &Contour<i32>) -> Option<BoundingBox> {
    let min_x = contour.points.iter().map(|p| p.x).min()?;
    let max_x = contour.points.iter().map(|p| p.x).max()?;
    let min_y = contour.points.iter().map(|p| p.y).min()?;
    let max_y = contour.points.iter().map(|p| p.y).max()?;
    Some(BoundingBox::new(
        u32::try_from(min_x).ok()?,
        u32::try_from(min_y).ok()?,
        u32::try_from(max_x - min_x + 1).ok()?,
        u32::try_from(max_y - min_y + 1).ok()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{GridSpec, render_grid};
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn opening_drops_short_strokes() {
        let mut ink = GrayImage::new(200, 20);
        for x in 10..190 {
            ink.put_pixel(x, 5, Luma([255]));
        }
        for x in 10..60 {
            ink.put_pixel(x, 12, Luma([255]));
        }
        let options = GridOptions::default();
        let lines = open_lines(&ink, Orientation::Horizontal, &options);
        assert_eq!(lines.get_pixel(100, 5)[0], 255);
        assert_eq!(lines.get_pixel(30, 12)[0], 0);
    }

    #[test]
    fn blank_page_has_no_cells() {
        let blank = RgbImage::from_pixel(300, 200, Rgb([255, 255, 255]));
        let boxes = detect_cells(&DynamicImage::ImageRgb8(blank), &GridOptions::default());
        assert!(boxes.is_empty());
    }

    #[test]
    fn finds_every_cell_of_a_ruled_table() {
        let spec = GridSpec::new(vec![120, 260, 90], vec![60, 60]);
        let image = render_grid(&spec);
        let boxes = detect_cells(&DynamicImage::ImageRgb8(image), &GridOptions::default());

        assert_eq!(boxes.len(), 6);
        let expected = spec.cell_boxes();
        for (found, want) in boxes.iter().zip(expected.iter()) {
            assert!(found.x.abs_diff(want.x) <= 2, "{found:?} vs {want:?}");
            assert!(found.y.abs_diff(want.y) <= 2, "{found:?} vs {want:?}");
            assert!(found.width.abs_diff(want.width) <= 4, "{found:?} vs {want:?}");
            assert!(found.height.abs_diff(want.height) <= 4, "{found:?} vs {want:?}");
        }
    }

    #[test]
    fn boxes_are_sorted_top_then_left() {
        let spec = GridSpec::new(vec![100, 100], vec![50, 50, 50]);
        let boxes = detect_cells(
            &DynamicImage::ImageRgb8(render_grid(&spec)),
            &GridOptions::default(),
        );
        let mut sorted = boxes.clone();
        sorted.sort_by_key(|bbox| (bbox.y, bbox.x));
        assert_eq!(boxes, sorted);
    }

    #[test]
    fn duplicates_split_by_a_same_origin_box_are_merged() {
        let cell = BoundingBox::new(10, 20, 100, 60);
        let wider = BoundingBox::new(10, 20, 180, 60);
        let below = BoundingBox::new(10, 90, 100, 60);
        let boxes = reading_order(vec![cell, wider, below, cell]);
        assert_eq!(boxes, vec![cell, wider, below]);
    }
}
