use std::time::Duration;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use ncsv_core::RunSummary;

use crate::cli::SummaryFormatArg;

pub fn print_summary(summary: &RunSummary, format: SummaryFormatArg) -> serde_json::Result<()> {
    match format {
        SummaryFormatArg::Table => println!("{}", render_summary(summary)),
        SummaryFormatArg::Json => println!("{}", serde_json::to_string_pretty(summary)?),
    }
    Ok(())
}

pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = format!(
        "Processing completed. Total lines processed: {}\nElapsed time: {}\n",
        summary.lines_processed,
        format_elapsed(summary.elapsed)
    );
    out.push_str(&format!("Input: {}\n", summary.input.display()));
    out.push_str(&format!("Mismatch log: {}\n", summary.mismatch_file.display()));
    out.push_str(&totals_table(summary).to_string());
    out.push('\n');
    out.push_str(&files_table(summary).to_string());
    out
}

fn totals_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Metric"), header_cell("Value")]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    table.add_row(vec![Cell::new("Header columns"), Cell::new(summary.header_columns)]);
    table.add_row(vec![Cell::new("Records read"), Cell::new(summary.records_read)]);
    table.add_row(vec![Cell::new("Records written"), Cell::new(summary.records_written)]);
    table.add_row(vec![
        Cell::new("Extra columns"),
        count_cell(summary.extra_columns, Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("Missing columns"),
        count_cell(summary.missing_columns, Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("Unreadable lines"),
        count_cell(summary.read_errors, Color::Red),
    ]);
    if summary.sanitized_fields > 0 {
        table.add_row(vec![
            Cell::new("Cleaned fields"),
            Cell::new(summary.sanitized_fields),
        ]);
    }
    table.add_row(vec![Cell::new("Workers"), dim_cell(summary.workers)]);
    if summary.peak_reorder_depth > 0 {
        table.add_row(vec![
            Cell::new("Peak reorder buffer"),
            dim_cell(summary.peak_reorder_depth),
        ]);
    }
    table
}

fn files_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Output file"), header_cell("Rows")]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for file in &summary.output_files {
        table.add_row(vec![
            Cell::new(file.path.display()),
            Cell::new(file.rows),
        ]);
    }
    table
}

fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.3}s", elapsed.as_secs_f64())
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn count_cell(count: u64, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ncsv_core::{OrderMode, OutputFile};

    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            input: PathBuf::from("data.csv"),
            header_columns: 3,
            lines_processed: 6,
            records_read: 5,
            records_written: 5,
            read_errors: 0,
            extra_columns: 1,
            missing_columns: 2,
            mismatches_logged: 3,
            sanitized_fields: 0,
            output_files: vec![
                OutputFile {
                    path: PathBuf::from("data_normalized_1.csv"),
                    rows: 3,
                },
                OutputFile {
                    path: PathBuf::from("data_normalized_2.csv"),
                    rows: 2,
                },
            ],
            mismatch_file: PathBuf::from("mismatches.text"),
            workers: 4,
            order: OrderMode::Unordered,
            peak_reorder_depth: 0,
            elapsed: Duration::from_millis(1234),
        }
    }

    #[test]
    fn test_render_summary_headline() {
        let rendered = render_summary(&summary());
        assert!(rendered.starts_with(
            "Processing completed. Total lines processed: 6\nElapsed time: 1.234s\n"
        ));
        assert!(rendered.contains("data_normalized_2.csv"));
        assert!(rendered.contains("Missing columns"));
        assert!(!rendered.contains("Peak reorder buffer"));
    }

    #[test]
    fn test_json_summary_fields() {
        let json = serde_json::to_value(summary()).unwrap();
        assert_eq!(json["lines_processed"], 6);
        assert_eq!(json["elapsed_ms"], 1234);
        assert_eq!(json["output_files"][1]["rows"], 2);
    }
}
