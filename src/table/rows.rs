use crate::models::BoundingBox;

pub const DEFAULT_ROW_TOLERANCE: u32 = 30;

/// Groups cell boxes into rows, top to bottom, each row ordered left to right.
///
/// A box opens a new row when its top differs from the top of the row's first
/// box by more than `tolerance` pixels.
pub fn group_rows(boxes: &[BoundingBox], tolerance: u32) -> Vec<Vec<BoundingBox>> {
    let mut ordered = boxes.to_vec();
    ordered.sort_by_key(|bbox| (bbox.y, bbox.x));

    let mut rows = Vec::new();
    let mut current: Vec<BoundingBox> = Vec::new();
    let mut anchor_y = None;

    for bbox in ordered {
        match anchor_y {
            Some(top) if bbox.y.abs_diff(top) <= tolerance => current.push(bbox),
            _ => {
                if !current.is_empty() {
                    rows.push(finish_row(std::mem::take(&mut current)));
                }
                anchor_y = Some(bbox.y);
                current.push(bbox);
            }
        }
    }
    if !current.is_empty() {
        rows.push(finish_row(current));
    }
    rows
}

fn finish_row(mut row: Vec<BoundingBox>) -> Vec<BoundingBox> {
    row.sort_by_key(|bbox| (bbox.x, bbox.y));
    row
}
