use std::fmt::Write;

use serde_json::Value;
use shared::{
    domain::{Course, Sprint},
    protocol::TaskCheckResult,
};
use table_engine::{ColumnDescriptor, SortDirection, TableView};

pub fn course_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::key("id", "ID"),
        ColumnDescriptor::key("name", "Course"),
        ColumnDescriptor::key("code", "Code"),
        ColumnDescriptor::key("duration", "Weeks"),
        ColumnDescriptor::key("commitment_time", "Hours/week").filterable(false),
        ColumnDescriptor::key("mode_of_learning", "Mode"),
        ColumnDescriptor::key("is_published", "Status").with_cell(|value, _| {
            if value.as_bool() == Some(true) {
                "Published".to_string()
            } else {
                "Draft".to_string()
            }
        }),
    ]
}

pub fn sprint_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::key("id", "ID"),
        ColumnDescriptor::key("name", "Sprint"),
        ColumnDescriptor::key("start_date", "Starts"),
        ColumnDescriptor::key("duration", "Weeks"),
        ColumnDescriptor::key("is_active", "Active").with_cell(|value, _| match value {
            Value::Bool(true) => "yes".to_string(),
            _ => "no".to_string(),
        }),
    ]
}

/// Column ids accepted by `--sort` and `--where`.
pub fn column_ids(columns: &[ColumnDescriptor]) -> Vec<&str> {
    columns.iter().map(|column| column.id.as_str()).collect()
}

pub fn render_table(view: &TableView) -> String {
    let labels: Vec<String> = view
        .headers
        .iter()
        .map(|header| match header.sort {
            Some(SortDirection::Asc) => format!("{} ^", header.label),
            Some(SortDirection::Desc) => format!("{} v", header.label),
            None => header.label.clone(),
        })
        .collect();

    let mut widths: Vec<usize> = labels.iter().map(|label| label.chars().count()).collect();
    for row in &view.rows {
        for (width, cell) in widths.iter_mut().zip(&row.cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &labels, &widths);
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    push_line(&mut out, &rule, &widths);
    for row in &view.rows {
        push_line(&mut out, &row.cells, &widths);
    }

    let page = &view.pagination;
    match (page.first_row, page.last_row) {
        (Some(first), Some(last)) => {
            let _ = writeln!(
                out,
                "page {} of {} | rows {}-{} of {} ({} total)",
                page.page_index + 1,
                page.page_count,
                first + 1,
                last + 1,
                page.filtered_rows,
                page.total_rows
            );
        }
        _ => {
            let _ = writeln!(out, "no matching rows ({} total)", page.total_rows);
        }
    }
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    let _ = writeln!(out, "{}", line.join("  ").trim_end());
}

pub fn describe_course(course: &Course) -> String {
    match course.id {
        Some(id) => format!("course {id}: {}", course.name),
        None => format!("course (pending): {}", course.name),
    }
}

pub fn describe_sprint(sprint: &Sprint) -> String {
    match sprint.id {
        Some(id) => format!("sprint {id}: {}", sprint.name),
        None => format!("sprint: {}", sprint.name),
    }
}

/// Checker output: both streams, then the verdict line.
pub fn describe_check(result: &TaskCheckResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "task {} @ {}", result.task_name, result.repo_url);
    for (label, stream) in [("stdout", &result.stdout), ("stderr", &result.stderr)] {
        if !stream.trim().is_empty() {
            let _ = writeln!(out, "--- {label}\n{}", stream.trim_end());
        }
    }
    let verdict = if result.passed() { "passed" } else { "failed" };
    let _ = writeln!(out, "exit code {}: {verdict}", result.exit_code);
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use table_engine::{derive, to_rows, TableIntent, ViewState};

    use super::*;

    #[test]
    fn renders_sorted_header_and_footer() {
        let rows = to_rows(&vec![
            json!({ "id": 1, "name": "Advanced React Development", "is_published": true }),
            json!({ "id": 2, "name": "Python for Data Science", "is_published": false }),
        ])
        .expect("rows");
        let state = ViewState::default().reduce(TableIntent::SortToggled {
            column_id: "name".into(),
            multi: false,
        });

        let text = render_table(&derive(&rows, &course_columns(), &state));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("Course ^"));
        assert!(lines[2].contains("Advanced React Development"));
        assert!(lines[2].contains("Published"));
        assert!(lines[3].contains("Draft"));
        assert_eq!(lines[4], "page 1 of 1 | rows 1-2 of 2 (2 total)");
    }

    #[test]
    fn empty_view_says_so() {
        let text = render_table(&derive(&[], &sprint_columns(), &ViewState::default()));
        assert!(text.ends_with("no matching rows (0 total)\n"));
    }

    #[test]
    fn check_output_skips_empty_streams() {
        let text = describe_check(&TaskCheckResult {
            task_name: "0x01".into(),
            repo_url: "https://github.com/ada/shell".into(),
            exit_code: 1,
            stdout: String::new(),
            stderr: "Invalid Git repository URL\n".into(),
        });
        assert_eq!(
            text,
            "task 0x01 @ https://github.com/ada/shell\n--- stderr\nInvalid Git repository URL\nexit code 1: failed\n"
        );
    }
}
