//! Side observations of the pipeline: annotated images and audit trails.
//! Nothing here feeds back into extraction decisions.

mod naming;

use anyhow::{Context, Result};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::Serialize;
use std::path::{Path, PathBuf};
use time::{OffsetDateTime, format_description};
use tracing::info;

use crate::models::{BoundingBox, Cell, Column};
use crate::table::RowAssignment;

pub use naming::NamingPolicy;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: u32 = 2;
const MAX_COMMENT_CHARS: usize = 100;

/// Hooks invoked with the outputs of grid detection and field assignment.
pub trait ExtractionObserver {
    fn on_rows(&mut self, _rows: &[Vec<BoundingBox>]) {}

    fn on_row(&mut self, _index: usize, _cells: &[Cell], _assignment: &RowAssignment) {}
}

pub struct NoopObserver;

impl ExtractionObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    /// 1-based row number.
    pub row: usize,
    pub column: &'static str,
    pub raw: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
struct AuditLog<'a> {
    source: String,
    generated_at: String,
    rows: usize,
    entries: &'a [AuditEntry],
}

#[derive(Debug, Clone)]
pub struct DiagnosticsArtifacts {
    pub image_path: PathBuf,
    pub log_path: PathBuf,
}

/// Draws every detected cell on a copy of the source image and records what
/// each row's columns resolved to.
pub struct DiagnosticsRecorder {
    canvas: RgbImage,
    rows: usize,
    entries: Vec<AuditEntry>,
}

impl DiagnosticsRecorder {
    pub fn new(source: &DynamicImage) -> Self {
        Self {
            canvas: source.to_rgb8(),
            rows: 0,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    pub fn finish(self, naming: &NamingPolicy, source: &Path) -> Result<DiagnosticsArtifacts> {
        naming.ensure_output_dir()?;
        let image_path = naming.image_path(source);
        let log_path = naming.log_path(source);

        self.canvas
            .save(&image_path)
            .with_context(|| format!("failed to write debug image: {}", image_path.display()))?;

        let generated_at = OffsetDateTime::now_utc()
            .format(&format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());
        let log = AuditLog {
            source: source.display().to_string(),
            generated_at,
            rows: self.rows,
            entries: &self.entries,
        };
        let json = serde_json::to_string_pretty(&log).with_context(|| "failed to serialize audit log")?;
        std::fs::write(&log_path, json)
            .with_context(|| format!("failed to write debug log: {}", log_path.display()))?;

        info!("debug image saved: {}", image_path.display());
        info!("debug log saved: {}", log_path.display());
        Ok(DiagnosticsArtifacts {
            image_path,
            log_path,
        })
    }
}

impl ExtractionObserver for DiagnosticsRecorder {
    fn on_rows(&mut self, rows: &[Vec<BoundingBox>]) {
        for bbox in rows.iter().flatten() {
            draw_box(&mut self.canvas, bbox);
        }
    }

    fn on_row(&mut self, index: usize, cells: &[Cell], assignment: &RowAssignment) {
        self.rows = self.rows.max(index + 1);
        let claims = &assignment.claims;
        for column in Column::ALL {
            let (claim, digits) = match column {
                Column::RollNumber => (claims.roll_number, false),
                Column::FormatMm => (claims.format_mm, true),
                Column::WeightKg => (claims.weight_kg, true),
                Column::GrammageGm2 => (claims.grammage_gm2, true),
                Column::Comment => (claims.comment, false),
            };
            let raw = claim
                .and_then(|idx| cells.get(idx))
                .map(|cell| {
                    if digits {
                        cell.raw_digit_text.clone()
                    } else {
                        cell.raw_general_text.clone()
                    }
                })
                .unwrap_or_default();
            let mut value = assignment.row.get(column).to_string();
            if column == Column::Comment {
                value = value.chars().take(MAX_COMMENT_CHARS).collect();
            }
            self.entries.push(AuditEntry {
                row: index + 1,
                column: column.title(),
                raw,
                value,
            });
        }
    }
}

fn draw_box(canvas: &mut RgbImage, bbox: &BoundingBox) {
    for inset in 0..BOX_THICKNESS {
        let width = bbox.width.saturating_sub(inset * 2);
        let height = bbox.height.saturating_sub(inset * 2);
        if width == 0 || height == 0 {
            break;
        }
        let rect = Rect::at((bbox.x + inset) as i32, (bbox.y + inset) as i32).of_size(width, height);
        draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
    }
}
