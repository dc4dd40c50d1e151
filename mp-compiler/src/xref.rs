//! Cross-reference listing of the symbols of a finished compilation.

use crate::semantic::Symbol;

const HEADERS: [&str; 6] = ["Name", "Scope", "Kind", "Type", "Line", "References"];

fn kind(symbol: &Symbol) -> &'static str {
    if symbol.ty.is_procedure() {
        "proc"
    } else if symbol.is_parameter {
        "param"
    } else {
        "var"
    }
}

fn row(symbol: &Symbol) -> [String; 6] {
    let mut lines = symbol.reference_lines.clone();
    lines.sort_unstable();
    let references: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    [
        symbol.name.clone(),
        symbol
            .owning_procedure
            .clone()
            .unwrap_or_else(|| "global".to_string()),
        kind(symbol).to_string(),
        symbol.ty.describe(),
        symbol.definition_line.to_string(),
        references.join(", "),
    ]
}

/// Render `symbols` as a table sorted by name (globals before locals of
/// the same name), each with its reference lines in ascending order.
pub fn render(symbols: &[Symbol]) -> String {
    let mut sorted: Vec<&Symbol> = symbols.iter().collect();
    sorted.sort_by(|a, b| (&a.name, &a.owning_procedure).cmp(&(&b.name, &b.owning_procedure)));
    let rows: Vec<[String; 6]> = sorted.into_iter().map(row).collect();

    let mut widths = HEADERS.map(str::len);
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_row = |cells: &[&str]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    };
    push_row(&HEADERS[..]);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&rule.iter().map(String::as_str).collect::<Vec<_>>());
    for cells in &rows {
        push_row(&cells.iter().map(String::as_str).collect::<Vec<_>>());
    }
    out
}
