use crate::models::{Cell, TableRow};

use super::normalize::{digits_in_range, normalize_roll_number};

/// Inclusive value range accepted for a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRange {
    pub lo: u64,
    pub hi: u64,
}

impl FieldRange {
    pub const fn new(lo: u64, hi: u64) -> Self {
        Self { lo, hi }
    }
}

/// Ranges for the numeric columns, resolved in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRanges {
    pub format_mm: FieldRange,
    pub weight_kg: FieldRange,
    pub grammage_gm2: FieldRange,
}

impl Default for FieldRanges {
    fn default() -> Self {
        Self {
            format_mm: FieldRange::new(300, 1800),
            weight_kg: FieldRange::new(20, 3000),
            grammage_gm2: FieldRange::new(20, 400),
        }
    }
}

/// Which cell (by index in the row) each column claimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldClaims {
    pub roll_number: Option<usize>,
    pub format_mm: Option<usize>,
    pub weight_kg: Option<usize>,
    pub grammage_gm2: Option<usize>,
    pub comment: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowAssignment {
    pub row: TableRow,
    pub claims: FieldClaims,
    /// Cells left over once the numeric columns were resolved.
    pub unclaimed: Vec<usize>,
}

/// Maps the cells of one row onto the five output columns.
///
/// Each column takes the first remaining cell (left to right) whose value has
/// the right shape and removes it from the pool. The comment is read from the
/// widest leftover cell with `read_comment`; when that yields nothing, the
/// general text of every leftover cell is joined instead.
pub fn assign_row_fields<F>(cells: &[Cell], ranges: &FieldRanges, read_comment: F) -> RowAssignment
where
    F: FnOnce(&Cell) -> String,
{
    let mut pool: Vec<usize> = (0..cells.len()).collect();
    let mut row = TableRow::default();
    let mut claims = FieldClaims::default();

    if let Some((idx, value)) = take_first(&mut pool, |i| normalize_roll_number(&cells[i].raw_general_text)) {
        claims.roll_number = Some(idx);
        row.roll_number = value;
    }

    let numeric = [
        (ranges.format_mm, &mut row.format_mm, &mut claims.format_mm),
        (ranges.weight_kg, &mut row.weight_kg, &mut claims.weight_kg),
        (ranges.grammage_gm2, &mut row.grammage_gm2, &mut claims.grammage_gm2),
    ];
    for (range, field, claim) in numeric {
        if let Some((idx, value)) = take_first(&mut pool, |i| {
            digits_in_range(&cells[i].raw_digit_text, range.lo, range.hi)
        }) {
            *claim = Some(idx);
            *field = value;
        }
    }

    if let Some(widest) = widest_cell(cells, &pool) {
        claims.comment = Some(widest);
        row.comment = read_comment(&cells[widest]).trim().to_string();
        if row.comment.is_empty() {
            row.comment = pool
                .iter()
                .map(|&i| cells[i].raw_general_text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string();
        }
    }

    RowAssignment {
        row,
        claims,
        unclaimed: pool,
    }
}

fn take_first<F>(pool: &mut Vec<usize>, mut extract: F) -> Option<(usize, String)>
where
    F: FnMut(usize) -> String,
{
    let (position, value) = pool.iter().enumerate().find_map(|(position, &idx)| {
        let value = extract(idx);
        (!value.is_empty()).then_some((position, value))
    })?;
    Some((pool.remove(position), value))
}

// Ties go to the leftmost cell.
fn widest_cell(cells: &[Cell], pool: &[usize]) -> Option<usize> {
    pool.iter().copied().fold(None, |best: Option<usize>, idx| match best {
        Some(current) if cells[current].bbox.width >= cells[idx].bbox.width => Some(current),
        _ => Some(idx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;
    use pretty_assertions::assert_eq;

    fn row_of(general: &[&str], digits: &[&str], widths: &[u32]) -> Vec<Cell> {
        let mut x = 0;
        general
            .iter()
            .zip(digits)
            .zip(widths)
            .map(|((general, digits), width)| {
                let cell = Cell::new(BoundingBox::new(x, 0, *width, 40), *general, *digits);
                x += width;
                cell
            })
            .collect()
    }

    fn no_second_pass(_: &Cell) -> String {
        String::new()
    }

    #[test]
    fn roll_number_and_comment() {
        let cells = row_of(&["B12345", "Comment text here"], &["12345", ""], &[50, 200]);
        let assignment = assign_row_fields(&cells, &FieldRanges::default(), no_second_pass);
        assert_eq!(
            assignment.row,
            TableRow {
                roll_number: "B12345".to_string(),
                comment: "Comment text here".to_string(),
                ..TableRow::default()
            }
        );
        assert_eq!(assignment.claims.roll_number, Some(0));
        assert_eq!(assignment.claims.comment, Some(1));
    }

    #[test]
    fn numeric_columns_in_order() {
        let cells = row_of(
            &["8I2345", "900", "150", "80"],
            &["82345", "900", "150", "80"],
            &[80, 60, 60, 60],
        );
        let assignment = assign_row_fields(&cells, &FieldRanges::default(), |_| {
            panic!("no cell should be left for the comment")
        });
        assert_eq!(
            assignment.row,
            TableRow {
                roll_number: "B12345".to_string(),
                format_mm: "900".to_string(),
                weight_kg: "150".to_string(),
                grammage_gm2: "80".to_string(),
                comment: String::new(),
            }
        );
        assert!(assignment.unclaimed.is_empty());
    }

    #[test]
    fn out_of_range_value_falls_through_to_comment() {
        let cells = row_of(&["B11111", "5000"], &["11111", "5000"], &[60, 60]);
        let assignment = assign_row_fields(&cells, &FieldRanges::default(), no_second_pass);
        assert_eq!(assignment.row.format_mm, "");
        assert_eq!(assignment.row.weight_kg, "");
        assert_eq!(assignment.row.grammage_gm2, "");
        assert_eq!(assignment.row.comment, "5000");
        assert_eq!(assignment.unclaimed, vec![1]);
    }

    #[test]
    fn first_match_wins_over_best_fit() {
        // 350 fits both format and grammage; format is resolved first.
        let cells = row_of(&["350", "1200"], &["350", "1200"], &[60, 60]);
        let assignment = assign_row_fields(&cells, &FieldRanges::default(), no_second_pass);
        assert_eq!(assignment.row.format_mm, "350");
        assert_eq!(assignment.row.weight_kg, "1200");
        assert_eq!(assignment.row.grammage_gm2, "");
    }

    #[test]
    fn second_pass_text_is_preferred_for_comment() {
        let cells = row_of(&["B12345", "c0mment", "x"], &["", "", ""], &[50, 220, 30]);
        let assignment = assign_row_fields(&cells, &FieldRanges::default(), |cell| {
            assert_eq!(cell.bbox.width, 220);
            "  comment  ".to_string()
        });
        assert_eq!(assignment.row.comment, "comment");
        assert_eq!(assignment.claims.comment, Some(1));
    }

    #[test]
    fn fallback_joins_every_leftover_cell() {
        let cells = row_of(&["left", "B12345", "right"], &["", "", ""], &[100, 50, 100]);
        let assignment = assign_row_fields(&cells, &FieldRanges::default(), no_second_pass);
        assert_eq!(assignment.row.comment, "left right");
        assert_eq!(assignment.claims.comment, Some(0));
    }

    #[test]
    fn empty_row_stays_empty() {
        let assignment = assign_row_fields(&[], &FieldRanges::default(), no_second_pass);
        assert!(assignment.row.is_empty());
        assert_eq!(assignment.claims, FieldClaims::default());
    }

    #[test]
    fn no_cell_is_claimed_twice() {
        let cells = row_of(
            &["B12345", "400", "400", "400", "note"],
            &["12345", "400", "400", "400", ""],
            &[50, 50, 50, 50, 50],
        );
        let assignment = assign_row_fields(&cells, &FieldRanges::default(), no_second_pass);
        let claims = assignment.claims;
        let claimed: Vec<usize> = [
            claims.roll_number,
            claims.format_mm,
            claims.weight_kg,
            claims.grammage_gm2,
            claims.comment,
        ]
        .into_iter()
        .flatten()
        .collect();
        let mut unique = claimed.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(claimed.len(), unique.len());
        assert_eq!(claimed, vec![0, 1, 2, 3, 4]);
    }
}
