//! Plain-text column layout.

/// Lay out `columns` side by side, one output line per row.
///
/// Every column is padded to its widest entry plus one space. Shorter
/// columns leave blank cells, so the row count is that of the longest
/// column.
#[must_use]
pub fn render_columns<S: AsRef<str>>(columns: &[Vec<S>]) -> Vec<String> {
    let widths: Vec<usize> = columns
        .iter()
        .map(|col| col.iter().map(|cell| width(cell.as_ref())).max().unwrap_or(0))
        .collect();
    let rows = columns.iter().map(Vec::len).max().unwrap_or(0);

    (0..rows)
        .map(|row| {
            let mut line = String::new();
            for (col, &max) in columns.iter().zip(&widths) {
                let cell = col.get(row).map_or("", AsRef::as_ref);
                line.push_str(cell);
                line.extend(std::iter::repeat(' ').take(max - width(cell) + 1));
            }
            line
        })
        .collect()
}

fn width(cell: &str) -> usize {
    cell.chars().count()
}
