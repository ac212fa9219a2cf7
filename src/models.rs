use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::seed;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid regex"));

/// Problems found while building or checking a student record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("unknown department '{0}' (expected CSE, ECE, MECH or IT)")]
    UnknownDepartment(String),

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("{field} must be a whole number, got {value}")]
    NotWhole { field: &'static str, value: f64 },

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("invalid email address '{0}'")]
    InvalidEmail(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Department {
    Cse,
    Ece,
    Mech,
    It,
}

impl Department {
    pub const ALL: [Department; 4] = [
        Department::Cse,
        Department::Ece,
        Department::Mech,
        Department::It,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Department::Cse => "CSE",
            Department::Ece => "ECE",
            Department::Mech => "MECH",
            Department::It => "IT",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Department {
    type Err = RecordError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CSE" => Ok(Department::Cse),
            "ECE" => Ok(Department::Ece),
            "MECH" => Ok(Department::Mech),
            "IT" => Ok(Department::It),
            _ => Err(RecordError::UnknownDepartment(value.trim().to_string())),
        }
    }
}

impl TryFrom<String> for Department {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Department> for String {
    fn from(department: Department) -> Self {
        department.code().to_string()
    }
}

/// Which numeric field a deployment ranks students by. Chosen once at
/// startup; every record in a roster uses the same one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMetric {
    #[default]
    Cgpa,
    Marks,
}

impl PerformanceMetric {
    /// Field name as it appears in rows, files and messages.
    pub fn label(self) -> &'static str {
        match self {
            PerformanceMetric::Cgpa => "cgpa",
            PerformanceMetric::Marks => "marks",
        }
    }

    /// Name used inside answer sentences ("Average CGPA", "Average marks").
    pub fn noun(self) -> &'static str {
        match self {
            PerformanceMetric::Cgpa => "CGPA",
            PerformanceMetric::Marks => "marks",
        }
    }

    pub fn heading(self) -> &'static str {
        match self {
            PerformanceMetric::Cgpa => "CGPA",
            PerformanceMetric::Marks => "Marks",
        }
    }

    pub fn max_value(self) -> f64 {
        match self {
            PerformanceMetric::Cgpa => 10.0,
            PerformanceMetric::Marks => 100.0,
        }
    }

    /// Decimal places kept when averaging the metric per department.
    pub fn summary_decimals(self) -> u32 {
        match self {
            PerformanceMetric::Cgpa => 2,
            PerformanceMetric::Marks => 0,
        }
    }

    /// Parses the numeric literal captured after "above"/"below".
    /// The marks deployment only looks at the integer part. Literals too
    /// large for `f64` become infinity rather than being dropped.
    pub fn parse_threshold(self, literal: &str) -> Option<f64> {
        let value = literal.parse::<f64>().ok()?;
        match self {
            PerformanceMetric::Cgpa => Some(value),
            PerformanceMetric::Marks => Some(value.trunc()),
        }
    }

    /// Phrases a value for the answer sentence, e.g. "91 marks".
    pub fn describe(self, value: f64) -> String {
        match self {
            PerformanceMetric::Cgpa => format!("a CGPA of {value}"),
            PerformanceMetric::Marks => format!("{value} marks"),
        }
    }
}

impl fmt::Display for PerformanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PerformanceMetric {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cgpa" => Ok(PerformanceMetric::Cgpa),
            "marks" | "mark" => Ok(PerformanceMetric::Marks),
            other => Err(format!("unknown performance metric '{other}' (expected cgpa or marks)")),
        }
    }
}

/// A roster entry. Both deployment schemas implement this so the engine,
/// the stores and the renderers only deal with one shape.
pub trait StudentRecord:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const METRIC: PerformanceMetric;

    fn id(&self) -> i64;
    fn name(&self) -> &str;
    fn department(&self) -> Department;
    fn attendance(&self) -> u8;
    fn performance(&self) -> f64;

    fn validate(&self) -> Result<(), RecordError>;
    fn from_row(row: StudentRow) -> Result<Self, RecordError>;
    fn to_row(&self) -> StudentRow;
    fn default_roster() -> Vec<Self>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CgpaStudent {
    pub id: i64,
    pub name: String,
    pub department: Department,
    pub cgpa: f64,
    pub attendance: u8,
    pub date_of_birth: NaiveDate,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksStudent {
    pub id: i64,
    pub name: String,
    pub department: Department,
    pub marks: u8,
    pub attendance: u8,
}

/// Flat interchange row used by CSV/JSON files and the Postgres table.
/// Fields that only one schema uses are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub department: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cgpa: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<f64>,
    pub attendance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

fn check_name(name: &str) -> Result<(), RecordError> {
    if name.trim().is_empty() {
        return Err(RecordError::EmptyName);
    }
    Ok(())
}

fn check_range(field: &'static str, value: f64, max: f64) -> Result<(), RecordError> {
    if !value.is_finite() || !(0.0..=max).contains(&value) {
        return Err(RecordError::OutOfRange {
            field,
            min: 0.0,
            max,
            value,
        });
    }
    Ok(())
}

fn percentage(field: &'static str, value: f64) -> Result<u8, RecordError> {
    check_range(field, value, 100.0)?;
    if value.fract() != 0.0 {
        return Err(RecordError::NotWhole { field, value });
    }
    Ok(value as u8)
}

fn check_email(email: &str) -> Result<(), RecordError> {
    if !EMAIL_PATTERN.is_match(email) {
        return Err(RecordError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

impl StudentRecord for CgpaStudent {
    const METRIC: PerformanceMetric = PerformanceMetric::Cgpa;

    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn department(&self) -> Department {
        self.department
    }

    fn attendance(&self) -> u8 {
        self.attendance
    }

    fn performance(&self) -> f64 {
        self.cgpa
    }

    fn validate(&self) -> Result<(), RecordError> {
        check_name(&self.name)?;
        check_range("cgpa", self.cgpa, Self::METRIC.max_value())?;
        check_range("attendance", f64::from(self.attendance), 100.0)?;
        check_email(&self.email)
    }

    fn from_row(row: StudentRow) -> Result<Self, RecordError> {
        let student = CgpaStudent {
            id: row.id.ok_or(RecordError::MissingField("id"))?,
            name: row.name.trim().to_string(),
            department: row.department.parse()?,
            cgpa: row.cgpa.ok_or(RecordError::MissingField("cgpa"))?,
            attendance: percentage("attendance", row.attendance)?,
            date_of_birth: row
                .date_of_birth
                .ok_or(RecordError::MissingField("dateOfBirth"))?,
            email: row
                .email
                .map(|email| email.trim().to_string())
                .ok_or(RecordError::MissingField("email"))?,
        };
        student.validate()?;
        Ok(student)
    }

    fn to_row(&self) -> StudentRow {
        StudentRow {
            id: Some(self.id),
            name: self.name.clone(),
            department: self.department.to_string(),
            cgpa: Some(self.cgpa),
            marks: None,
            attendance: f64::from(self.attendance),
            date_of_birth: Some(self.date_of_birth),
            email: Some(self.email.clone()),
        }
    }

    fn default_roster() -> Vec<Self> {
        seed::cgpa_roster()
    }
}

impl StudentRecord for MarksStudent {
    const METRIC: PerformanceMetric = PerformanceMetric::Marks;

    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn department(&self) -> Department {
        self.department
    }

    fn attendance(&self) -> u8 {
        self.attendance
    }

    fn performance(&self) -> f64 {
        f64::from(self.marks)
    }

    fn validate(&self) -> Result<(), RecordError> {
        check_name(&self.name)?;
        check_range("marks", f64::from(self.marks), Self::METRIC.max_value())?;
        check_range("attendance", f64::from(self.attendance), 100.0)
    }

    fn from_row(row: StudentRow) -> Result<Self, RecordError> {
        let marks = row.marks.ok_or(RecordError::MissingField("marks"))?;
        let student = MarksStudent {
            id: row.id.ok_or(RecordError::MissingField("id"))?,
            name: row.name.trim().to_string(),
            department: row.department.parse()?,
            marks: percentage("marks", marks)?,
            attendance: percentage("attendance", row.attendance)?,
        };
        student.validate()?;
        Ok(student)
    }

    fn to_row(&self) -> StudentRow {
        StudentRow {
            id: Some(self.id),
            name: self.name.clone(),
            department: self.department.to_string(),
            cgpa: None,
            marks: Some(f64::from(self.marks)),
            attendance: f64::from(self.attendance),
            date_of_birth: None,
            email: None,
        }
    }

    fn default_roster() -> Vec<Self> {
        seed::marks_roster()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cgpa_row() -> StudentRow {
        StudentRow {
            id: Some(7),
            name: " Priya Nair ".to_string(),
            department: "cse".to_string(),
            cgpa: Some(8.7),
            marks: None,
            attendance: 91.0,
            date_of_birth: NaiveDate::from_ymd_opt(2003, 4, 12),
            email: Some("priya.nair@college.edu".to_string()),
        }
    }

    #[test]
    fn department_parsing_is_case_insensitive() {
        assert_eq!("mech".parse::<Department>().unwrap(), Department::Mech);
        assert_eq!(" It ".parse::<Department>().unwrap(), Department::It);
        assert_eq!(Department::Ece.to_string(), "ECE");
        assert!("civil".parse::<Department>().is_err());
    }

    #[test]
    fn department_serializes_as_upper_case_code() {
        let json = serde_json::to_string(&Department::Cse).unwrap();
        assert_eq!(json, "\"CSE\"");
        let parsed: Department = serde_json::from_str("\"ece\"").unwrap();
        assert_eq!(parsed, Department::Ece);
    }

    #[test]
    fn cgpa_row_converts_and_canonicalizes() {
        let student = CgpaStudent::from_row(cgpa_row()).unwrap();
        assert_eq!(student.name, "Priya Nair");
        assert_eq!(student.department, Department::Cse);
        assert_eq!(student.attendance, 91);
        assert_eq!(student.to_row().department, "CSE");
    }

    #[test]
    fn cgpa_row_rejects_bad_email_and_range() {
        let mut row = cgpa_row();
        row.email = Some("not-an-email".to_string());
        assert!(matches!(
            CgpaStudent::from_row(row),
            Err(RecordError::InvalidEmail(_))
        ));

        let mut row = cgpa_row();
        row.cgpa = Some(10.5);
        assert!(matches!(
            CgpaStudent::from_row(row),
            Err(RecordError::OutOfRange { field: "cgpa", .. })
        ));
    }

    #[test]
    fn marks_row_requires_whole_numbers() {
        let row = StudentRow {
            id: Some(1),
            name: "Arjun".to_string(),
            department: "IT".to_string(),
            marks: Some(88.5),
            attendance: 90.0,
            ..StudentRow::default()
        };
        assert_eq!(
            MarksStudent::from_row(row),
            Err(RecordError::NotWhole {
                field: "marks",
                value: 88.5
            })
        );
    }

    #[test]
    fn marks_row_without_metric_is_rejected() {
        let row = StudentRow {
            id: Some(1),
            name: "Arjun".to_string(),
            department: "IT".to_string(),
            attendance: 90.0,
            ..StudentRow::default()
        };
        assert_eq!(
            MarksStudent::from_row(row),
            Err(RecordError::MissingField("marks"))
        );
    }

    #[test]
    fn threshold_parsing_follows_metric() {
        assert_eq!(PerformanceMetric::Cgpa.parse_threshold("7.5"), Some(7.5));
        assert_eq!(PerformanceMetric::Marks.parse_threshold("85.9"), Some(85.0));
        assert_eq!(PerformanceMetric::Marks.parse_threshold("60"), Some(60.0));
        assert_eq!(
            PerformanceMetric::Marks.parse_threshold("99999999999999999999"),
            Some(1e20)
        );
        let huge = "9".repeat(400);
        assert_eq!(PerformanceMetric::Cgpa.parse_threshold(&huge), Some(f64::INFINITY));
    }

    #[test]
    fn default_rosters_are_valid() {
        for student in CgpaStudent::default_roster() {
            student.validate().unwrap();
        }
        for student in MarksStudent::default_roster() {
            student.validate().unwrap();
        }
    }
}
