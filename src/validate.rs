use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::models::SubmissionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Decimal,
    Integer,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct NumericField {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub min: f64,
    pub max: f64,
    /// Highest option the form offers, when it is wider than `max`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offered_max: Option<u32>,
    pub default: &'static str,
    #[serde(skip)]
    pub required_message: &'static str,
    #[serde(skip)]
    pub min_message: &'static str,
    #[serde(skip)]
    pub max_message: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChoiceField {
    pub name: &'static str,
    pub label: &'static str,
    pub choices: &'static [&'static str],
    pub default: &'static str,
}

const fn integer(
    name: &'static str,
    label: &'static str,
    min: f64,
    max: f64,
    default: &'static str,
    messages: [&'static str; 3],
) -> NumericField {
    NumericField {
        name,
        label,
        kind: FieldKind::Integer,
        min,
        max,
        offered_max: None,
        default,
        required_message: messages[0],
        min_message: messages[1],
        max_message: messages[2],
    }
}

pub static NUMERIC_FIELDS: [NumericField; 16] = [
    NumericField {
        name: "gpa",
        label: "Overall GPA/CGPA",
        kind: FieldKind::Decimal,
        min: 0.0,
        max: 10.0,
        offered_max: None,
        default: "",
        required_message: "GPA is required",
        min_message: "GPA must be at least 0",
        max_message: "GPA must be less than or equal to 10",
    },
    NumericField {
        name: "attendance",
        label: "Attendance Percentage",
        kind: FieldKind::Decimal,
        min: 0.0,
        max: 100.0,
        offered_max: None,
        default: "",
        required_message: "Attendance is required",
        min_message: "Attendance must be at least 0",
        max_message: "Attendance must be at most 100",
    },
    integer(
        "backlogs",
        "Number of Backlogs",
        0.0,
        10.0,
        "0",
        [
            "Backlogs is required",
            "Backlogs must be at least 0",
            "Backlogs must be at most 10",
        ],
    ),
    integer(
        "internships",
        "Number of Internships Completed",
        0.0,
        10.0,
        "0",
        [
            "Internships is required",
            "Internships must be at least 0",
            "Internships must be at most 10",
        ],
    ),
    integer(
        "internship_duration",
        "Internship Duration (months)",
        0.0,
        12.0,
        "0",
        [
            "Internship duration is required",
            "Internship duration must be at least 0",
            "Internship duration must be at most 12 months",
        ],
    ),
    integer(
        "leadership_skill",
        "Leadership Skill",
        1.0,
        10.0,
        "1",
        [
            "Leadership skill is required",
            "Leadership skill must be at least 1",
            "Leadership skill must be at most 10",
        ],
    ),
    integer(
        "communication_skill",
        "Self-Rated Communication Skill",
        1.0,
        10.0,
        "1",
        [
            "Communication skill is required",
            "Communication skill must be at least 1",
            "Communication skill must be at most 10",
        ],
    ),
    integer(
        "teamwork_ability",
        "Teamwork Ability",
        1.0,
        10.0,
        "1",
        [
            "Teamwork ability is required",
            "Teamwork ability must be at least 1",
            "Teamwork ability must be at most 10",
        ],
    ),
    integer(
        "problem_solving_ability",
        "Problem Solving Ability",
        1.0,
        10.0,
        "1",
        [
            "Problem solving ability is required",
            "Problem solving ability must be at least 1",
            "Problem solving ability must be at most 10",
        ],
    ),
    NumericField {
        offered_max: Some(250),
        ..integer(
            "job_applications_sent",
            "Number of Job Applications Sent",
            0.0,
            50.0,
            "0",
            [
                "Job applications sent is required",
                "Job applications sent must be at least 0",
                "Job applications sent must be at most 50",
            ],
        )
    },
    NumericField {
        offered_max: Some(50),
        ..integer(
            "interviews_attended",
            "Number of Interviews Attended",
            0.0,
            20.0,
            "0",
            [
                "Interviews attended is required",
                "Interviews attended must be at least 0",
                "Interviews attended must be at most 20",
            ],
        )
    },
    integer(
        "major_projects_completed",
        "Major Projects Completed",
        0.0,
        10.0,
        "0",
        [
            "Major projects completed is required",
            "Major projects completed must be at least 0",
            "Major projects completed must be at most 10",
        ],
    ),
    integer(
        "mock_interviews",
        "Mock Interviews",
        0.0,
        20.0,
        "0",
        [
            "Mock interviews is required",
            "Mock interviews must be at least 0",
            "Mock interviews must be at most 20",
        ],
    ),
    integer(
        "competitions",
        "Participation in Competitions",
        0.0,
        20.0,
        "0",
        [
            "Competitions is required",
            "Competitions must be at least 0",
            "Competitions must be at most 20",
        ],
    ),
    integer(
        "volunteer_experience",
        "Volunteer Experience (months)",
        0.0,
        36.0,
        "0",
        [
            "Volunteer experience is required",
            "Volunteer experience must be at least 0",
            "Volunteer experience must be at most 36 months",
        ],
    ),
    integer(
        "career_counseling",
        "Career Counseling Sessions",
        0.0,
        10.0,
        "0",
        [
            "Career counseling is required",
            "Career counseling must be at least 0",
            "Career counseling must be at most 10",
        ],
    ),
];

pub static CHOICE_FIELDS: [ChoiceField; 2] = [
    ChoiceField {
        name: "gender",
        label: "Gender",
        choices: &["Male", "Female"],
        default: "Male",
    },
    ChoiceField {
        name: "stream_type",
        label: "Stream Type",
        choices: &["Technical", "Non-Technical"],
        default: "Technical",
    },
];

const NOT_A_NUMBER: &str = "Must be a number";
const NOT_AN_INTEGER: &str = "Must be an integer";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors(Vec<(&'static str, String)>);

impl FieldErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push((field, message.into()));
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, message)| message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(name, message)| (*name, message.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FieldErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, message) in &self.0 {
            map.serialize_entry(field, message)?;
        }
        map.end()
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for FieldErrors {}

/// Applies the rule chain for one numeric field. The first failing rule wins.
pub fn check_numeric(field: &NumericField, raw: Option<&str>) -> Result<f64, &'static str> {
    let text = raw.map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(field.required_message);
    }

    let value = match text.parse::<f64>() {
        Ok(value) if f64::is_finite(value) => value,
        _ => return Err(NOT_A_NUMBER),
    };

    if field.kind == FieldKind::Integer && value.fract() != 0.0 {
        return Err(NOT_AN_INTEGER);
    }
    if value < field.min {
        return Err(field.min_message);
    }
    if value > field.max {
        return Err(field.max_message);
    }

    Ok(value)
}

pub fn check_choice<'a>(field: &ChoiceField, raw: Option<&'a str>) -> Result<&'a str, String> {
    let value = raw.unwrap_or_default();
    if value.is_empty() {
        return Err("Required".to_string());
    }
    if field.choices.contains(&value) {
        return Ok(value);
    }

    let expected: Vec<String> = field.choices.iter().map(|c| format!("'{c}'")).collect();
    Err(format!(
        "Invalid enum value. Expected {}, received '{}'",
        expected.join(" | "),
        value
    ))
}

pub fn validate_form(input: &HashMap<String, String>) -> Result<SubmissionRecord, FieldErrors> {
    let mut errors = FieldErrors::default();
    let mut coerced = Map::new();

    for field in NUMERIC_FIELDS.iter() {
        match check_numeric(field, input.get(field.name).map(String::as_str)) {
            Ok(value) => {
                let value = match field.kind {
                    FieldKind::Integer => Value::from(value as u64),
                    FieldKind::Decimal => Value::from(value),
                };
                coerced.insert(field.name.to_string(), value);
            }
            Err(message) => errors.push(field.name, message),
        }
    }

    for field in CHOICE_FIELDS.iter() {
        match check_choice(field, input.get(field.name).map(String::as_str)) {
            Ok(value) => {
                coerced.insert(field.name.to_string(), Value::from(value));
            }
            Err(message) => errors.push(field.name, message),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    serde_json::from_value(Value::Object(coerced)).map_err(|err| {
        let mut errors = FieldErrors::default();
        errors.push("form", err.to_string());
        errors
    })
}

#[derive(Debug, Serialize)]
pub struct FieldTable {
    pub numeric: &'static [NumericField],
    pub categorical: &'static [ChoiceField],
}

pub fn field_table() -> FieldTable {
    FieldTable {
        numeric: &NUMERIC_FIELDS,
        categorical: &CHOICE_FIELDS,
    }
}
