use crate::models::results::QueryResult;

/// Cells wider than this are cut and end with `…`.
pub const MAX_CELL_WIDTH: usize = 40;

/// Renders rows as an aligned text table in the style of `psql`.
pub fn render_table(result: &QueryResult) -> String {
    if result.columns.is_empty() {
        return format!("({} rows)\n", result.row_count);
    }

    let header: Vec<String> = result.columns.iter().map(|c| clip(c)).collect();
    let rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| clip(cell)).collect())
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    out.push_str(&render_line(&header, &widths));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
    out.push_str(&rule.join("+"));
    out.push('\n');
    for row in &rows {
        out.push_str(&render_line(row, &widths));
    }

    let noun = if result.row_count == 1 { "row" } else { "rows" };
    out.push_str(&format!("({} {})\n", result.row_count, noun));
    out
}

fn render_line(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, width)| {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            format!(" {:<width$} ", cell, width = *width)
        })
        .collect();
    let mut line = padded.join("|").trim_end().to_string();
    line.push('\n');
    line
}

fn clip(text: &str) -> String {
    let flat = text.replace(['\n', '\r', '\t'], " ");
    if flat.chars().count() <= MAX_CELL_WIDTH {
        return flat;
    }
    let mut clipped: String = flat.chars().take(MAX_CELL_WIDTH - 1).collect();
    clipped.push('…');
    clipped
}
