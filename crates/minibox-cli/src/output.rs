//! Formatted output helpers for CLI commands.

#![allow(clippy::print_stdout)]

use std::fmt::Write as _;

use minibox_runtime::container::ContainerSummary;

const HEADERS: [&str; 4] = ["CONTAINER ID", "NAME", "IMAGE", "STATUS"];

/// Prints one line to stdout.
pub fn print_line(line: &str) {
    println!("{line}");
}

/// Prints preformatted text to stdout without adding a newline.
pub fn print_block(text: &str) {
    print!("{text}");
}

/// Renders containers as an aligned table with a header row.
#[must_use]
pub fn container_table(rows: &[ContainerSummary]) -> String {
    let cells: Vec<[String; 4]> = rows
        .iter()
        .map(|c| {
            [
                c.id.to_string(),
                c.name.clone(),
                c.image.clone(),
                c.status.to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let header = HEADERS.map(str::to_owned);
    for row in std::iter::once(&header).chain(&cells) {
        let line = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        let _ = writeln!(out, "{}", line.trim_end());
    }
    out
}
