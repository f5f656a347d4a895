use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// True when `other` lies inside `self` and the two are not the same box.
    pub fn strictly_contains(&self, other: &BoundingBox) -> bool {
        self != other
            && other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// One detected region together with its two independent readings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub bbox: BoundingBox,
    pub raw_general_text: String,
    pub raw_digit_text: String,
}

impl Cell {
    pub fn new(
        bbox: BoundingBox,
        raw_general_text: impl Into<String>,
        raw_digit_text: impl Into<String>,
    ) -> Self {
        Self {
            bbox,
            raw_general_text: raw_general_text.into(),
            raw_digit_text: raw_digit_text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    RollNumber,
    FormatMm,
    WeightKg,
    GrammageGm2,
    Comment,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::RollNumber,
        Column::FormatMm,
        Column::WeightKg,
        Column::GrammageGm2,
        Column::Comment,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Column::RollNumber => "Roll Number",
            Column::FormatMm => "Format (mm)",
            Column::WeightKg => "Weight (kg)",
            Column::GrammageGm2 => "Grammage (g/m2)",
            Column::Comment => "Comment",
        }
    }
}

/// One extracted table record. Empty strings mean "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableRow {
    #[serde(rename = "Roll Number")]
    pub roll_number: String,
    #[serde(rename = "Format (mm)")]
    pub format_mm: String,
    #[serde(rename = "Weight (kg)")]
    pub weight_kg: String,
    #[serde(rename = "Grammage (g/m2)")]
    pub grammage_gm2: String,
    #[serde(rename = "Comment")]
    pub comment: String,
}

impl TableRow {
    pub fn get(&self, column: Column) -> &str {
        match column {
            Column::RollNumber => &self.roll_number,
            Column::FormatMm => &self.format_mm,
            Column::WeightKg => &self.weight_kg,
            Column::GrammageGm2 => &self.grammage_gm2,
            Column::Comment => &self.comment,
        }
    }

    pub fn is_empty(&self) -> bool {
        Column::ALL.iter().all(|column| self.get(*column).is_empty())
    }
}

/// A record tagged with the image it came from, as emitted by the batch runner.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedRecord {
    #[serde(rename = "Source File")]
    pub source_file: String,
    #[serde(flatten)]
    pub row: TableRow,
}

/// Whole-page text of one image, one entry per recognized line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageText {
    #[serde(rename = "Source File")]
    pub source_file: String,
    #[serde(rename = "Lines")]
    pub lines: Vec<String>,
}
