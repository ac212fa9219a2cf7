use std::fmt::Write;

use clap::ValueEnum;

use crate::engine::{DepartmentSummary, QueryResult};
use crate::models::{PerformanceMetric, StudentRecord, StudentRow};

const BAR_WIDTH: usize = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

/// Queries shown after an error so the user has something to retry with.
pub fn example_queries(metric: PerformanceMetric) -> Vec<String> {
    let noun = metric.noun();
    vec![
        format!("Who has the highest {noun}?"),
        format!("Average {noun} in ECE"),
        "List students in CSE".to_string(),
        "Show students with attendance below 75".to_string(),
        "Compare departments".to_string(),
    ]
}

pub fn render<S: StudentRecord>(
    query: &str,
    result: &QueryResult<S>,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let output = match format {
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Text => render_text(result),
        OutputFormat::Markdown => render_markdown(query, result),
    };
    Ok(output)
}

fn render_text<S: StudentRecord>(result: &QueryResult<S>) -> String {
    let mut output = String::new();

    match result {
        QueryResult::Error { message } => {
            let _ = writeln!(output, "Error: {message}");
            let _ = writeln!(output);
            let _ = writeln!(output, "Try one of:");
            for example in example_queries(S::METRIC) {
                let _ = writeln!(output, "- {example}");
            }
        }
        QueryResult::Single {
            message, record, ..
        } => {
            let _ = writeln!(output, "{message}");
            if let Some(record) = record {
                let _ = writeln!(output);
                output.push_str(&record_card(record));
            }
        }
        QueryResult::Multiple {
            message,
            records,
            chart,
        } => {
            let _ = writeln!(output, "{message}");
            if !chart.is_empty() {
                let _ = writeln!(output);
                output.push_str(&bar_chart(S::METRIC, chart));
            }
            if !records.is_empty() {
                let _ = writeln!(output);
                output.push_str(&text_table(&roster_cells(records)));
            }
        }
    }

    output
}

fn render_markdown<S: StudentRecord>(query: &str, result: &QueryResult<S>) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Roster Query");
    let _ = writeln!(output, "> {}", query.trim());
    let _ = writeln!(output);

    match result {
        QueryResult::Error { message } => {
            let _ = writeln!(output, "**Error:** {message}");
            let _ = writeln!(output);
            let _ = writeln!(output, "## Try Instead");
            for example in example_queries(S::METRIC) {
                let _ = writeln!(output, "- {example}");
            }
        }
        QueryResult::Single {
            message, record, ..
        } => {
            let _ = writeln!(output, "{message}");
            if let Some(record) = record {
                let _ = writeln!(output);
                let _ = writeln!(output, "## Student");
                output.push_str(&markdown_table(&roster_cells(std::slice::from_ref(record))));
            }
        }
        QueryResult::Multiple {
            message,
            records,
            chart,
        } => {
            let _ = writeln!(output, "{message}");
            if !chart.is_empty() {
                let _ = writeln!(output);
                let _ = writeln!(output, "## Department Comparison");
                output.push_str(&markdown_table(&chart_cells(S::METRIC, chart)));
            }
            if !records.is_empty() {
                let _ = writeln!(output);
                let _ = writeln!(output, "## Students");
                output.push_str(&markdown_table(&roster_cells(records)));
            }
        }
    }

    output
}

/// Plain table of a whole roster, used by `list`.
pub fn roster_table<S: StudentRecord>(roster: &[S]) -> String {
    if roster.is_empty() {
        return "No students in the roster.\n".to_string();
    }
    text_table(&roster_cells(roster))
}

fn record_card<S: StudentRecord>(record: &S) -> String {
    let row = record.to_row();
    let mut output = String::new();
    let _ = writeln!(output, "  ID:          {}", record.id());
    let _ = writeln!(output, "  Name:        {}", record.name());
    let _ = writeln!(output, "  Department:  {}", record.department());
    let _ = writeln!(
        output,
        "  {:<13}{}",
        format!("{}:", S::METRIC.heading()),
        record.performance()
    );
    let _ = writeln!(output, "  Attendance:  {}%", record.attendance());
    if let Some(date_of_birth) = row.date_of_birth {
        let _ = writeln!(output, "  DOB:         {}", date_of_birth.format("%d %b %Y"));
    }
    if let Some(email) = row.email {
        let _ = writeln!(output, "  Email:       {email}");
    }
    output
}

fn roster_cells<S: StudentRecord>(records: &[S]) -> Vec<Vec<String>> {
    let rows: Vec<StudentRow> = records.iter().map(StudentRecord::to_row).collect();
    let with_dob = rows.iter().any(|row| row.date_of_birth.is_some());
    let with_email = rows.iter().any(|row| row.email.is_some());

    let mut header = vec![
        "ID".to_string(),
        "Name".to_string(),
        "Department".to_string(),
        S::METRIC.heading().to_string(),
        "Attendance".to_string(),
    ];
    if with_dob {
        header.push("DOB".to_string());
    }
    if with_email {
        header.push("Email".to_string());
    }

    let mut cells = vec![header];
    for (record, row) in records.iter().zip(rows) {
        let mut line = vec![
            record.id().to_string(),
            record.name().to_string(),
            record.department().to_string(),
            record.performance().to_string(),
            format!("{}%", record.attendance()),
        ];
        if with_dob {
            line.push(row.date_of_birth.map(|d| d.to_string()).unwrap_or_default());
        }
        if with_email {
            line.push(row.email.unwrap_or_default());
        }
        cells.push(line);
    }
    cells
}

fn chart_cells(metric: PerformanceMetric, chart: &[DepartmentSummary]) -> Vec<Vec<String>> {
    let mut cells = vec![vec![
        "Department".to_string(),
        format!("Avg {}", metric.noun()),
        "Avg attendance".to_string(),
        "Students".to_string(),
    ]];
    for row in chart {
        cells.push(vec![
            row.department.to_string(),
            row.average_metric.to_string(),
            format!("{}%", row.average_attendance),
            row.student_count.to_string(),
        ]);
    }
    cells
}

fn bar(value: f64, max: f64) -> String {
    let filled = ((value / max).clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

fn bar_chart(metric: PerformanceMetric, chart: &[DepartmentSummary]) -> String {
    let mut output = String::new();
    for row in chart {
        let _ = writeln!(
            output,
            "{:<5} {:<10} {} {}",
            row.department.code(),
            metric.label(),
            bar(row.average_metric, metric.max_value()),
            row.average_metric
        );
        let _ = writeln!(
            output,
            "{:<5} {:<10} {} {}%",
            "",
            "attendance",
            bar(row.average_attendance, 100.0),
            row.average_attendance
        );
    }
    output
}

fn text_table(cells: &[Vec<String>]) -> String {
    let columns = cells.first().map_or(0, Vec::len);
    let widths: Vec<usize> = (0..columns)
        .map(|col| {
            cells
                .iter()
                .filter_map(|line| line.get(col))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut output = String::new();
    for (index, line) in cells.iter().enumerate() {
        let padded: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(output, "{}", padded.join("  ").trim_end());
        if index == 0 {
            let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
            let _ = writeln!(output, "{}", rule.join("  "));
        }
    }
    output
}

fn markdown_table(cells: &[Vec<String>]) -> String {
    let mut output = String::new();
    for (index, line) in cells.iter().enumerate() {
        let _ = writeln!(output, "| {} |", line.join(" | "));
        if index == 0 {
            let rule = vec!["---"; line.len()];
            let _ = writeln!(output, "| {} |", rule.join(" | "));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::evaluate;
    use crate::models::{Department, MarksStudent};

    fn roster() -> Vec<MarksStudent> {
        vec![
            MarksStudent {
                id: 1,
                name: "Asha".to_string(),
                department: Department::Cse,
                marks: 90,
                attendance: 95,
            },
            MarksStudent {
                id: 2,
                name: "Bilal".to_string(),
                department: Department::It,
                marks: 60,
                attendance: 80,
            },
        ]
    }

    #[test]
    fn single_answer_includes_record_card() {
        let result = evaluate("highest marks", &roster());
        let text = render("highest marks", &result, OutputFormat::Text).unwrap();
        assert!(text.starts_with("Top student: Asha with 90 marks\n"));
        assert!(text.contains("Department:  CSE"));
        assert!(text.contains("Marks:       90"));
        assert!(!text.contains("Email"));
    }

    #[test]
    fn list_renders_table() {
        let result = evaluate("list all", &roster());
        let text = render("list all", &result, OutputFormat::Text).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "All students (2 total)");
        assert!(lines[2].starts_with("ID  Name"));
        assert!(lines[4].contains("Asha"));
        assert!(lines[5].contains("Bilal"));
    }

    #[test]
    fn comparison_renders_bars() {
        let result = evaluate("compare departments", &roster());
        let text = render("compare departments", &result, OutputFormat::Text).unwrap();
        assert!(text.contains(&format!("CSE   marks      {}{} 90", "█".repeat(27), "░".repeat(3))));
        assert!(text.contains("attendance"));
    }

    #[test]
    fn errors_suggest_examples() {
        let result = evaluate("", &roster());
        let text = render("", &result, OutputFormat::Text).unwrap();
        assert!(text.starts_with("Error: Please enter a query to continue."));
        assert!(text.contains("- Who has the highest marks?"));
    }

    #[test]
    fn markdown_has_sections() {
        let result = evaluate("compare departments", &roster());
        let text = render("compare departments", &result, OutputFormat::Markdown).unwrap();
        assert!(text.contains("## Department Comparison"));
        assert!(text.contains("| CSE | 90 | 95% | 1 |"));
        assert!(!text.contains("## Students"));
    }

    #[test]
    fn json_output_is_tagged() {
        let result = evaluate("average marks", &roster());
        let text = render("average marks", &result, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "single");
        assert_eq!(value["value"], 75.0);
    }

    #[test]
    fn empty_roster_table_says_so() {
        let empty: Vec<MarksStudent> = Vec::new();
        assert_eq!(roster_table(&empty), "No students in the roster.\n");
    }
}
