use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::contrast::otsu_level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Polarity {
    /// Bright pixels become foreground (255).
    Normal,
    /// Dark pixels (ink, ruling lines) become foreground (255).
    Inverted,
}

/// Binarizes a cell crop with an Otsu threshold and expands it back to three
/// channels so both recognition passes see the same input.
pub fn preprocess_cell(cell: &RgbImage) -> RgbImage {
    let gray = to_luma(&DynamicImage::ImageRgb8(cell.clone()));
    let binary = binarize_otsu(&gray, Polarity::Normal);
    DynamicImage::ImageLuma8(binary).to_rgb8()
}

/// BT.601 luma, compositing any alpha over white first.
pub(crate) fn to_luma(image: &DynamicImage) -> GrayImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut luma = GrayImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let r = (r as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        let g = (g as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        let b = (b as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        let value = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8;
        luma.put_pixel(x, y, image::Luma([value]));
    }
    luma
}

pub(crate) fn binarize_otsu(image: &GrayImage, polarity: Polarity) -> GrayImage {
    let level = otsu_level(image);
    binarize(image, level, polarity)
}

fn binarize(image: &GrayImage, threshold: u8, polarity: Polarity) -> GrayImage {
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        let bright = pixel[0] > threshold;
        let foreground = match polarity {
            Polarity::Normal => bright,
            Polarity::Inverted => !bright,
        };
        pixel[0] = if foreground { 255 } else { 0 };
    }
    output
}
