//! Line reconstruction from unordered positioned text items.
//!
//! Glyph-level extraction has no notion of a "line". Readable text is
//! rebuilt from positions in two passes with two different tolerances:
//!
//! 1. **Reading-order sort.** Items are ordered top to bottom; items whose
//!    `y` lies within [`SAME_LINE_SORT_TOLERANCE`] of the band they start
//!    are treated as one row and ordered left to right.
//! 2. **Line grouping.** Walking the sorted items, an item joins the current
//!    line while `|y - last_y| <= LINE_BREAK_THRESHOLD`, otherwise it starts
//!    a new line. Items inside a line keep their sorted order.
//!
//! The looser grouping threshold absorbs sub-pixel baseline jitter
//! (superscripts, mixed fonts) while visually distinct lines still split.
//!
//! The sort is total and stable, so the same input always produces
//! byte-identical output.

use crate::model::TextItem;
use std::cmp::Ordering;

/// Maximum `y` distance for two items to be ordered as one row.
pub const SAME_LINE_SORT_TOLERANCE: f32 = 5.0;

/// Maximum `y` distance between consecutive items of one line.
pub const LINE_BREAK_THRESHOLD: f32 = 10.0;

/// Order items top-to-bottom, then left-to-right within a row band.
pub fn sort_reading_order(items: &[TextItem]) -> Vec<&TextItem> {
    let mut sorted: Vec<&TextItem> = items.iter().collect();
    sorted.sort_by(|a, b| by_y_then_x(a, b));

    // Re-order each band of near-equal y by x alone.
    let mut start = 0;
    while start < sorted.len() {
        let anchor = sorted[start].y;
        let mut end = start + 1;
        while end < sorted.len() && (sorted[end].y - anchor).abs() < SAME_LINE_SORT_TOLERANCE {
            end += 1;
        }
        sorted[start..end].sort_by(|a, b| a.x.total_cmp(&b.x).then_with(|| a.y.total_cmp(&b.y)));
        start = end;
    }

    sorted
}

fn by_y_then_x(a: &TextItem, b: &TextItem) -> Ordering {
    a.y.total_cmp(&b.y).then_with(|| a.x.total_cmp(&b.x))
}

/// Group reading-ordered items into lines.
pub fn group_lines<'a>(sorted: &[&'a TextItem]) -> Vec<Vec<&'a TextItem>> {
    let mut lines: Vec<Vec<&'a TextItem>> = Vec::new();
    let mut last_y: Option<f32> = None;

    for &item in sorted {
        match (last_y, lines.last_mut()) {
            (Some(y), Some(line)) if (item.y - y).abs() <= LINE_BREAK_THRESHOLD => line.push(item),
            _ => lines.push(vec![item]),
        }
        last_y = Some(item.y);
    }

    lines
}

/// Rebuild page text: items joined by a space within a line, lines by `\n`.
pub fn reconstruct_text(items: &[TextItem]) -> String {
    let sorted = sort_reading_order(items);
    group_lines(&sorted)
        .iter()
        .map(|line| {
            line.iter()
                .map(|i| i.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
