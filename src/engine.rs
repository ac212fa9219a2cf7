//! Plain-language query evaluation over a roster snapshot.
//!
//! Intent is picked by fixed-priority keyword matching; the first rule
//! that matches wins:
//!
//! ```text
//!  1 highest + cgpa|mark       6 average + attendance
//!  2 lowest  + cgpa|mark       7 below N
//!  3 average + cgpa|mark       8 above N
//!  4 highest + attendance      9 list | show all
//!  5 lowest  + attendance     10 compare | department
//!                             11 everything else
//! ```
//!
//! A department code anywhere in the text narrows rules 1-9. Rules 10 and
//! 11 always look at the whole roster.

use std::cmp::Ordering;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::models::{Department, PerformanceMetric, StudentRecord};

// Word boundaries and digits are ASCII only.
static DEPARTMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?-u:\b)(cse|ece|mech|it)(?-u:\b)").expect("Invalid regex")
});
static BELOW_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"below\s+([0-9]+(?:\.[0-9]+)?)").expect("Invalid regex"));
static ABOVE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"above\s+([0-9]+(?:\.[0-9]+)?)").expect("Invalid regex"));

/// Message returned when evaluation fails for a reason the user cannot fix.
pub const GENERIC_FAILURE: &str = "Something went wrong processing your query. Please try again.";

/// Decimal places kept for "average ..." answers.
pub const AVERAGE_DECIMALS: u32 = 2;

/// Rounds half away from zero at the given precision, so 0.125 becomes
/// 0.13 and 2.5 becomes 3.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("Please enter a query to continue.")]
    EmptyQuery,

    #[error("No students found in {0} department.")]
    EmptyDepartment(Department),

    #[error("No students found in the roster.")]
    EmptyRoster,

    #[error("No students found with {field} {direction} {threshold}.")]
    NoMatches {
        field: &'static str,
        direction: Direction,
        threshold: f64,
    },

    /// Detail is logged; the user only sees the generic message.
    #[error("Something went wrong processing your query. Please try again.")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Below,
    Above,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Below => f.write_str("below"),
            Direction::Above => f.write_str("above"),
        }
    }
}

/// Numeric column a rule reads from each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterField {
    Performance,
    Attendance,
}

impl RosterField {
    fn value<S: StudentRecord>(self, student: &S) -> f64 {
        match self {
            RosterField::Performance => student.performance(),
            RosterField::Attendance => f64::from(student.attendance()),
        }
    }

    fn label(self, metric: PerformanceMetric) -> &'static str {
        match self {
            RosterField::Performance => metric.label(),
            RosterField::Attendance => "attendance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    Highest(RosterField),
    Lowest(RosterField),
    Average(RosterField),
    Threshold {
        field: RosterField,
        direction: Direction,
        threshold: f64,
    },
    List,
    Compare,
    Everything,
}

/// Picks the first matching rule for already lower-cased text.
pub fn classify(text: &str, metric: PerformanceMetric) -> Intent {
    let performance = text.contains("cgpa") || text.contains("mark");
    let attendance = text.contains("attendance");

    if text.contains("highest") && performance {
        return Intent::Highest(RosterField::Performance);
    }
    if text.contains("lowest") && performance {
        return Intent::Lowest(RosterField::Performance);
    }
    if text.contains("average") && performance {
        return Intent::Average(RosterField::Performance);
    }
    if text.contains("highest") && attendance {
        return Intent::Highest(RosterField::Attendance);
    }
    if text.contains("lowest") && attendance {
        return Intent::Lowest(RosterField::Attendance);
    }
    if text.contains("average") && attendance {
        return Intent::Average(RosterField::Attendance);
    }

    let field = if attendance {
        RosterField::Attendance
    } else {
        RosterField::Performance
    };
    for (pattern, direction) in [
        (&BELOW_PATTERN, Direction::Below),
        (&ABOVE_PATTERN, Direction::Above),
    ] {
        let threshold = pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|literal| metric.parse_threshold(literal.as_str()));
        if let Some(threshold) = threshold {
            return Intent::Threshold {
                field,
                direction,
                threshold,
            };
        }
    }

    if text.contains("list") || text.contains("show all") {
        return Intent::List;
    }
    if text.contains("compare") || text.contains("department") {
        return Intent::Compare;
    }
    Intent::Everything
}

/// First department code mentioned in the text, if any.
pub fn extract_department(text: &str) -> Option<Department> {
    DEPARTMENT_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|code| code.as_str().parse().ok())
}

/// Per-department averages for the comparison chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSummary {
    pub department: Department,
    pub average_metric: f64,
    pub average_attendance: f64,
    pub student_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueryResult<S> {
    Single {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        record: Option<S>,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<f64>,
    },
    Multiple {
        message: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        records: Vec<S>,
        #[serde(rename = "chartData", skip_serializing_if = "Vec::is_empty")]
        chart: Vec<DepartmentSummary>,
    },
    Error {
        message: String,
    },
}

impl<S> QueryResult<S> {
    pub fn message(&self) -> &str {
        match self {
            QueryResult::Single { message, .. }
            | QueryResult::Multiple { message, .. }
            | QueryResult::Error { message } => message,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error { .. })
    }

    pub fn records(&self) -> &[S] {
        match self {
            QueryResult::Single {
                record: Some(record),
                ..
            } => std::slice::from_ref(record),
            QueryResult::Multiple { records, .. } => records,
            _ => &[],
        }
    }

    pub fn chart(&self) -> &[DepartmentSummary] {
        match self {
            QueryResult::Multiple { chart, .. } => chart,
            _ => &[],
        }
    }
}

/// Stateless evaluator. The only setting is whether comparison answers
/// also carry the flat roster.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryEngine {
    compare_with_roster: bool,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roster_in_comparisons(mut self, enabled: bool) -> Self {
        self.compare_with_roster = enabled;
        self
    }

    /// Answers `query` against `roster`. Never fails: every problem comes
    /// back as [`QueryResult::Error`].
    pub fn evaluate<S: StudentRecord>(&self, query: &str, roster: &[S]) -> QueryResult<S> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(query, roster)));

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                if let QueryError::Internal(detail) = &err {
                    error!(%detail, "query evaluation failed");
                } else {
                    debug!(%err, "query produced no answer");
                }
                QueryResult::Error {
                    message: err.to_string(),
                }
            }
            Err(_) => {
                error!("query evaluation panicked");
                QueryResult::Error {
                    message: GENERIC_FAILURE.to_string(),
                }
            }
        }
    }

    fn run<S: StudentRecord>(&self, query: &str, roster: &[S]) -> Result<QueryResult<S>, QueryError> {
        let text = query.trim().to_lowercase();
        if text.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let department = extract_department(&text);
        let candidates: Vec<&S> = roster
            .iter()
            .filter(|student| department.map_or(true, |d| student.department() == d))
            .collect();

        if candidates.is_empty() {
            return Err(match department {
                Some(department) => QueryError::EmptyDepartment(department),
                None => QueryError::EmptyRoster,
            });
        }

        let metric = S::METRIC;
        let intent = classify(&text, metric);
        debug!(?intent, ?department, candidates = candidates.len(), "classified query");

        let scope = department
            .map(|d| format!(" in {d}"))
            .unwrap_or_default();

        let result = match intent {
            Intent::Highest(field) => {
                let top = pick_extreme(&candidates, field, Ordering::Greater)?;
                let message = match field {
                    RosterField::Performance => format!(
                        "Top student{scope}: {} with {}",
                        top.name(),
                        metric.describe(top.performance())
                    ),
                    RosterField::Attendance => format!(
                        "Best attendance{scope}: {} with {}%",
                        top.name(),
                        top.attendance()
                    ),
                };
                QueryResult::Single {
                    message,
                    record: Some(top.clone()),
                    value: Some(field.value(top)),
                }
            }
            Intent::Lowest(field) => {
                let bottom = pick_extreme(&candidates, field, Ordering::Less)?;
                let message = match field {
                    RosterField::Performance => format!(
                        "Lowest scoring student{scope}: {} with {}",
                        bottom.name(),
                        metric.describe(bottom.performance())
                    ),
                    RosterField::Attendance => format!(
                        "Lowest attendance{scope}: {} with {}%",
                        bottom.name(),
                        bottom.attendance()
                    ),
                };
                QueryResult::Single {
                    message,
                    record: Some(bottom.clone()),
                    value: Some(field.value(bottom)),
                }
            }
            Intent::Average(field) => {
                let average = round_to(mean(&candidates, field)?, AVERAGE_DECIMALS);
                let message = match field {
                    RosterField::Performance => {
                        format!("Average {}{scope}: {average:.2}", metric.noun())
                    }
                    RosterField::Attendance => format!("Average attendance{scope}: {average:.2}%"),
                };
                QueryResult::Single {
                    message,
                    record: None,
                    value: Some(average),
                }
            }
            Intent::Threshold {
                field,
                direction,
                threshold,
            } => {
                let matches: Vec<S> = candidates
                    .iter()
                    .filter(|student| {
                        let value = field.value(**student);
                        match direction {
                            Direction::Below => value < threshold,
                            Direction::Above => value > threshold,
                        }
                    })
                    .map(|student| (*student).clone())
                    .collect();

                let label = field.label(metric);
                if matches.is_empty() {
                    return Err(QueryError::NoMatches {
                        field: label,
                        direction,
                        threshold,
                    });
                }

                QueryResult::Multiple {
                    message: format!(
                        "Found {} student(s) with {label} {direction} {threshold}",
                        matches.len()
                    ),
                    records: matches,
                    chart: Vec::new(),
                }
            }
            Intent::List => {
                let heading = match department {
                    Some(department) => format!("Students in {department}"),
                    None => "All students".to_string(),
                };
                QueryResult::Multiple {
                    message: format!("{heading} ({} total)", candidates.len()),
                    records: candidates.into_iter().cloned().collect(),
                    chart: Vec::new(),
                }
            }
            Intent::Compare => {
                let records = if self.compare_with_roster {
                    roster.to_vec()
                } else {
                    Vec::new()
                };
                QueryResult::Multiple {
                    message: "Department-wise comparison".to_string(),
                    records,
                    chart: summarize_departments(roster)?,
                }
            }
            Intent::Everything => QueryResult::Multiple {
                message: "Here are all the students in the roster:".to_string(),
                records: roster.to_vec(),
                chart: Vec::new(),
            },
        };

        Ok(result)
    }
}

/// Shorthand for a default [`QueryEngine`].
pub fn evaluate<S: StudentRecord>(query: &str, roster: &[S]) -> QueryResult<S> {
    QueryEngine::new().evaluate(query, roster)
}

/// Keeps the first record on ties; a later record must be strictly
/// better to replace it.
fn pick_extreme<'a, S: StudentRecord>(
    candidates: &[&'a S],
    field: RosterField,
    wanted: Ordering,
) -> Result<&'a S, QueryError> {
    let mut iter = candidates.iter().copied();
    let mut best = iter
        .next()
        .ok_or_else(|| QueryError::Internal("no candidates to rank".to_string()))?;

    for student in iter {
        let ordering = field
            .value(student)
            .partial_cmp(&field.value(best))
            .ok_or_else(|| QueryError::Internal(format!("incomparable value for student {}", student.id())))?;
        if ordering == wanted {
            best = student;
        }
    }

    Ok(best)
}

fn mean<S: StudentRecord>(candidates: &[&S], field: RosterField) -> Result<f64, QueryError> {
    let total: f64 = candidates.iter().map(|student| field.value(*student)).sum();
    let average = total / candidates.len() as f64;
    if !average.is_finite() {
        return Err(QueryError::Internal(format!(
            "average over {} records is not finite",
            candidates.len()
        )));
    }
    Ok(average)
}

/// Groups the whole roster by department, in order of first appearance.
pub fn summarize_departments<S: StudentRecord>(
    roster: &[S],
) -> Result<Vec<DepartmentSummary>, QueryError> {
    struct Totals {
        department: Department,
        metric: f64,
        attendance: f64,
        count: usize,
    }

    let mut groups: Vec<Totals> = Vec::new();
    for student in roster {
        let position = match groups
            .iter()
            .position(|group| group.department == student.department())
        {
            Some(position) => position,
            None => {
                groups.push(Totals {
                    department: student.department(),
                    metric: 0.0,
                    attendance: 0.0,
                    count: 0,
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[position];
        group.metric += student.performance();
        group.attendance += f64::from(student.attendance());
        group.count += 1;
    }

    let decimals = S::METRIC.summary_decimals();
    groups
        .into_iter()
        .map(|group| {
            let count = group.count as f64;
            let average_metric = round_to(group.metric / count, decimals);
            let average_attendance = round_to(group.attendance / count, 0);
            if !average_metric.is_finite() || !average_attendance.is_finite() {
                return Err(QueryError::Internal(format!(
                    "non-finite average for {}",
                    group.department
                )));
            }
            Ok(DepartmentSummary {
                department: group.department,
                average_metric,
                average_attendance,
                student_count: group.count,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CgpaStudent, MarksStudent};
    use chrono::NaiveDate;

    fn marks(id: i64, name: &str, department: Department, marks: u8, attendance: u8) -> MarksStudent {
        MarksStudent {
            id,
            name: name.to_string(),
            department,
            marks,
            attendance,
        }
    }

    fn cgpa(id: i64, department: Department, cgpa: f64, attendance: u8) -> CgpaStudent {
        CgpaStudent {
            id,
            name: format!("Student {id}"),
            department,
            cgpa,
            attendance,
            date_of_birth: NaiveDate::from_ymd_opt(2003, 1, 1).unwrap(),
            email: format!("student{id}@college.edu"),
        }
    }

    fn pair() -> Vec<MarksStudent> {
        vec![
            marks(1, "A", Department::Cse, 90, 95),
            marks(2, "B", Department::It, 90, 80),
        ]
    }

    fn mixed() -> Vec<MarksStudent> {
        vec![
            marks(1, "Asha", Department::Cse, 92, 94),
            marks(2, "Bilal", Department::Ece, 85, 88),
            marks(3, "Chen", Department::Cse, 70, 60),
            marks(4, "Devi", Department::Mech, 85, 72),
            marks(5, "Eli", Department::Cse, 60, 99),
        ]
    }

    fn ids<S: StudentRecord>(result: &QueryResult<S>) -> Vec<i64> {
        result.records().iter().map(|s| s.id()).collect()
    }

    #[test]
    fn highest_marks_tie_goes_to_first_record() {
        let result = evaluate("who has the highest marks", &pair());
        assert!(matches!(result, QueryResult::Single { .. }));
        assert_eq!(ids(&result), vec![1]);
        assert_eq!(result.message(), "Top student: A with 90 marks");
    }

    #[test]
    fn tie_break_is_stable_across_calls() {
        let roster = pair();
        for _ in 0..3 {
            let result = evaluate("lowest marks", &roster);
            assert_eq!(ids(&result), vec![1]);
        }
    }

    #[test]
    fn compare_builds_chart_rows_for_whole_roster() {
        let result = evaluate("compare departments", &pair());
        match &result {
            QueryResult::Multiple { records, chart, .. } => {
                assert!(records.is_empty());
                assert_eq!(
                    chart,
                    &vec![
                        DepartmentSummary {
                            department: Department::Cse,
                            average_metric: 90.0,
                            average_attendance: 95.0,
                            student_count: 1,
                        },
                        DepartmentSummary {
                            department: Department::It,
                            average_metric: 90.0,
                            average_attendance: 80.0,
                            student_count: 1,
                        },
                    ]
                );
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn compare_ignores_department_in_text() {
        let result = evaluate("compare cse with the other departments", &mixed());
        let departments: Vec<Department> = result.chart().iter().map(|row| row.department).collect();
        assert_eq!(
            departments,
            vec![Department::Cse, Department::Ece, Department::Mech]
        );
    }

    #[test]
    fn compare_can_carry_the_roster() {
        let engine = QueryEngine::new().with_roster_in_comparisons(true);
        let result = engine.evaluate("compare departments", &mixed());
        assert_eq!(ids(&result), vec![1, 2, 3, 4, 5]);
        assert_eq!(result.chart().len(), 3);
    }

    #[test]
    fn compare_rounds_cgpa_to_two_places_and_attendance_to_whole() {
        let roster = vec![
            cgpa(1, Department::Ece, 8.0, 90),
            cgpa(2, Department::Ece, 7.0, 81),
            cgpa(3, Department::Ece, 9.0, 80),
        ];
        let rows = summarize_departments(&roster).unwrap();
        assert_eq!(rows[0].average_metric, 8.0);
        // 251 / 3 = 83.67
        assert_eq!(rows[0].average_attendance, 84.0);

        let roster = vec![cgpa(1, Department::It, 8.25, 90), cgpa(2, Department::It, 7.5, 90)];
        let rows = summarize_departments(&roster).unwrap();
        assert_eq!(rows[0].average_metric, 7.88);
    }

    #[test]
    fn empty_roster_is_an_error() {
        let roster: Vec<MarksStudent> = Vec::new();
        for query in ["highest marks", "compare departments", "anything"] {
            let result = evaluate(query, &roster);
            assert_eq!(
                result,
                QueryResult::Error {
                    message: "No students found in the roster.".to_string()
                }
            );
        }
    }

    #[test]
    fn blank_query_is_an_error() {
        let result = evaluate("   ", &mixed());
        assert_eq!(result.message(), "Please enter a query to continue.");
        assert!(result.is_error());
    }

    #[test]
    fn unknown_department_short_circuits_every_rule() {
        let result = evaluate("compare mech departments", &pair());
        assert_eq!(result.message(), "No students found in MECH department.");
    }

    #[test]
    fn list_returns_department_subset_in_order() {
        let result = evaluate("list students in CSE", &mixed());
        assert_eq!(ids(&result), vec![1, 3, 5]);
        assert_eq!(result.message(), "Students in CSE (3 total)");
    }

    #[test]
    fn show_all_without_department_lists_everyone() {
        let result = evaluate("show all students", &mixed());
        assert_eq!(ids(&result).len(), 5);
        assert_eq!(result.message(), "All students (5 total)");
    }

    #[test]
    fn average_attendance_rounds_half_away_from_zero() {
        let mut roster = vec![marks(1, "A", Department::Cse, 50, 1)];
        for id in 2..=8 {
            roster.push(marks(id, "Z", Department::Cse, 50, 0));
        }
        // 1 / 8 = 0.125
        let result = evaluate("average attendance", &roster);
        match result {
            QueryResult::Single { record, value, message } => {
                assert!(record.is_none());
                assert_eq!(value, Some(0.13));
                assert_eq!(message, "Average attendance: 0.13%");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn average_marks_is_scoped_to_department() {
        let result = evaluate("average marks in cse", &mixed());
        // (92 + 70 + 60) / 3 = 74.0
        assert_eq!(result.message(), "Average marks in CSE: 74.00");
    }

    #[test]
    fn average_cgpa_uses_metric_name() {
        let roster = vec![cgpa(1, Department::Cse, 8.5, 90), cgpa(2, Department::It, 9.0, 80)];
        let result = evaluate("what is the average cgpa", &roster);
        assert_eq!(result.message(), "Average CGPA: 8.75");
    }

    #[test]
    fn above_excludes_the_boundary() {
        let result = evaluate("students above 85 marks", &mixed());
        assert_eq!(ids(&result), vec![1]);
        assert_eq!(result.message(), "Found 1 student(s) with marks above 85");
    }

    #[test]
    fn below_attendance_uses_attendance_field() {
        let result = evaluate("attendance below 80", &mixed());
        assert_eq!(ids(&result), vec![3, 4]);
    }

    #[test]
    fn below_marks_truncates_decimal_threshold() {
        // 70.9 is read as 70, so the record with exactly 70 is excluded.
        let result = evaluate("marks below 70.9", &mixed());
        assert_eq!(ids(&result), vec![5]);
    }

    #[test]
    fn below_cgpa_keeps_decimal_threshold() {
        let roster = vec![cgpa(1, Department::Cse, 7.4, 90), cgpa(2, Department::Cse, 7.5, 80)];
        let result = evaluate("cgpa below 7.5", &roster);
        assert_eq!(ids(&result), vec![1]);
    }

    #[test]
    fn empty_threshold_match_is_an_error() {
        let result = evaluate("marks above 99", &mixed());
        assert_eq!(result.message(), "No students found with marks above 99.");
    }

    #[test]
    fn oversized_threshold_still_applies() {
        let result = evaluate("students above 99999999999999999999 marks", &pair());
        assert_eq!(
            result,
            QueryResult::Error {
                message: "No students found with marks above 100000000000000000000.".to_string()
            }
        );

        let result = evaluate("students below 99999999999999999999 marks", &pair());
        assert_eq!(ids(&result), vec![1, 2]);
        assert_eq!(
            result.message(),
            "Found 2 student(s) with marks below 100000000000000000000"
        );
    }

    #[test]
    fn infinite_cgpa_threshold_still_applies() {
        let roster = vec![cgpa(1, Department::Cse, 7.4, 90), cgpa(2, Department::Cse, 9.9, 80)];
        let query = format!("cgpa below {}", "9".repeat(400));
        let result = evaluate(&query, &roster);
        assert_eq!(ids(&result), vec![1, 2]);
    }

    #[test]
    fn non_ascii_digits_are_not_thresholds() {
        assert_eq!(classify("marks below ٣", PerformanceMetric::Marks), Intent::Everything);
    }

    #[test]
    fn internal_faults_return_generic_message() {
        let roster = vec![
            cgpa(1, Department::Cse, f64::NAN, 90),
            cgpa(2, Department::Cse, 8.0, 80),
        ];
        for query in ["highest cgpa", "average cgpa", "compare departments"] {
            let result = evaluate(query, &roster);
            assert_eq!(
                result,
                QueryResult::Error {
                    message: GENERIC_FAILURE.to_string()
                },
                "query {query:?}"
            );
        }
    }

    #[test]
    fn lowest_attendance_returns_record() {
        let result = evaluate("lowest attendance", &mixed());
        assert_eq!(ids(&result), vec![3]);
        assert_eq!(result.message(), "Lowest attendance: Chen with 60%");
    }

    #[test]
    fn department_keyword_alone_compares() {
        let result = evaluate("department stats", &mixed());
        assert_eq!(result.message(), "Department-wise comparison");
        let departments: Vec<Department> = result.chart().iter().map(|row| row.department).collect();
        assert_eq!(
            departments,
            vec![Department::Cse, Department::Ece, Department::Mech]
        );
        assert!(result.records().is_empty());
    }

    #[test]
    fn below_without_number_falls_through() {
        assert_eq!(classify("students below par", PerformanceMetric::Marks), Intent::Everything);
    }

    #[test]
    fn first_rule_wins_when_cues_overlap() {
        let metric = PerformanceMetric::Marks;
        assert_eq!(
            classify("highest and lowest marks", metric),
            Intent::Highest(RosterField::Performance)
        );
        assert_eq!(
            classify("highest marks and attendance", metric),
            Intent::Highest(RosterField::Performance)
        );
        assert_eq!(
            classify("average attendance below 50", metric),
            Intent::Average(RosterField::Attendance)
        );
        assert_eq!(classify("list department students", metric), Intent::List);
    }

    #[test]
    fn highest_attendance_returns_record() {
        let result = evaluate("highest attendance in cse", &mixed());
        assert_eq!(ids(&result), vec![5]);
        assert_eq!(result.message(), "Best attendance in CSE: Eli with 99%");
    }

    #[test]
    fn unmatched_query_returns_whole_roster() {
        let result = evaluate("tell me about cse", &mixed());
        assert_eq!(ids(&result), vec![1, 2, 3, 4, 5]);
        assert_eq!(result.message(), "Here are all the students in the roster:");
    }

    #[test]
    fn the_word_it_selects_the_it_department() {
        assert_eq!(extract_department("is it true"), Some(Department::It));
        assert_eq!(extract_department("edit mode"), None);
        assert_eq!(extract_department("MECH toppers"), Some(Department::Mech));
        // Non-ASCII letters do not count as word characters.
        assert_eq!(extract_department("éit"), Some(Department::It));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let roster = mixed();
        let first = evaluate("students above 60 marks in cse", &roster);
        let second = evaluate("students above 60 marks in cse", &roster);
        assert_eq!(first, second);
    }

    #[test]
    fn round_to_handles_halves() {
        assert_eq!(round_to(0.125, 2), 0.13);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(87.5, 2), 87.5);
        assert_eq!(round_to(83.666, 2), 83.67);
    }

    #[test]
    fn results_serialize_with_type_tag() {
        let result = evaluate("highest marks", &pair());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "single");
        assert_eq!(json["record"]["id"], 1);

        let json = serde_json::to_value(evaluate("compare departments", &pair())).unwrap();
        assert_eq!(json["type"], "multiple");
        assert_eq!(json["chartData"][0]["department"], "CSE");
        assert!(json.get("records").is_none());
    }
}
