//! 📊 progress.rs — "Are we there yet?" — every batch import, every time, forever.
//!
//! 🚀 This module answers the age-old question "is it still going?" with a
//! progress bar across files, and the follow-up question "so how did it go?"
//! with a table so comfy it should come with a throw pillow and a cat.
//!
//! ⚠️  Warning: Watching this progress bar will not make it go faster.
//! Neither will refreshing Kibana. We've tried. Science says no.
//!
//! 🦆 The duck has nothing to do with this module. It's just vibing.

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

/// 🔢 Formats a number with commas for the 3 people in the audience who like
/// readability. "1000000 docs" → "1,000,000 docs" — you're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// 📊 The per-file scoreboard one batch run accumulates.
#[derive(Debug, Default)]
pub(crate) struct ImportSummary {
    rows: Vec<FileRow>,
}

/// 📋 One file's final numbers.
#[derive(Debug)]
struct FileRow {
    file: String,
    indexed: u64,
    failed: u64,
    skipped: u64,
}

impl ImportSummary {
    pub(crate) fn record(&mut self, file: impl Into<String>, indexed: u64, failed: u64, skipped: u64) {
        self.rows.push(FileRow {
            file: file.into(),
            indexed,
            failed,
            skipped,
        });
    }

    /// 🍽️ Render the scoreboard. NOTHING preset — borders are for cowards
    /// and also don't survive most log shippers.
    pub(crate) fn render(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["file", "indexed", "failed", "skipped"]);

        for row in &self.rows {
            table.add_row(vec![
                Cell::new(&row.file),
                Cell::new(format_number(row.indexed)).set_alignment(CellAlignment::Right),
                Cell::new(format_number(row.failed)).set_alignment(CellAlignment::Right),
                Cell::new(format_number(row.skipped)).set_alignment(CellAlignment::Right),
            ]);
        }

        // 🧮 The bottom line. Literally.
        let (indexed, failed, skipped) = self.totals();
        table.add_row(vec![
            Cell::new("TOTAL"),
            Cell::new(format_number(indexed)).set_alignment(CellAlignment::Right),
            Cell::new(format_number(failed)).set_alignment(CellAlignment::Right),
            Cell::new(format_number(skipped)).set_alignment(CellAlignment::Right),
        ]);
        table.to_string()
    }

    pub(crate) fn totals(&self) -> (u64, u64, u64) {
        self.rows.iter().fold((0, 0, 0), |(i, f, s), row| {
            (i + row.indexed, f + row.failed, s + row.skipped)
        })
    }
}

/// 📊 A progress bar across the files of one batch run. One tick per file —
/// file counts are honest units; byte estimates on append-only files are not.
pub(crate) fn file_progress_bar(total_files: u64) -> ProgressBar {
    let bar = ProgressBar::new(total_files);
    bar.set_style(
        ProgressStyle::with_template("📦 {bar:30} {pos}/{len} files — {msg}")
            // 🐛 The template is a compile-time string we wrote ourselves;
            // if it ever fails to parse, fall back to the stock bar and move on.
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_big_numbers_get_their_commas() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn the_one_where_the_totals_row_actually_totals() {
        let mut the_summary = ImportSummary::default();
        the_summary.record("events-2025-01-01.ndjson", 10, 1, 2);
        the_summary.record("events-2025-01-02.ndjson", 5, 0, 0);

        assert_eq!(the_summary.totals(), (15, 1, 2));
        let the_rendered = the_summary.render();
        assert!(the_rendered.contains("TOTAL"));
        assert!(the_rendered.contains("15"));
    }
}
