//! Display preparation for previously fetched records.
//!
//! Records stay untyped JSON objects here so fields this crate does not
//! know about survive the round trip.

use std::cmp::Reverse;
use std::collections::HashMap;

use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::model::{CourseRef, PortalTime};

pub const UNKNOWN_COURSE_NAME: &str = "Unknown Course";

pub type CourseLookup = HashMap<String, CourseRef>;

/// The record families and the timestamp each one is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Notice,
    Assignment,
    File,
}

impl RecordKind {
    pub fn time_field(self) -> &'static str {
        match self {
            RecordKind::Notice => "publishTime",
            RecordKind::Assignment => "deadline",
            RecordKind::File => "uploadTime",
        }
    }
}

/// Parses the `courseId -> { name, teacherName }` mapping handed over by
/// the caller. Missing or non-string fields read as empty.
pub fn parse_course_lookup(json: &str) -> Result<CourseLookup> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(id, course)| {
                let field = |key: &str| {
                    course
                        .get(key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                let course = CourseRef {
                    name: field("name"),
                    teacher_name: field("teacherName"),
                };
                (id, course)
            })
            .collect()),
        other => Err(Error::InvalidInput(format!(
            "course lookup must be a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

/// JSON text in, JSON text out: the bridge form of [`normalize_records`].
pub fn process_records(raw_json: &str, course_names_json: &str, kind: RecordKind) -> Result<String> {
    let records = match serde_json::from_str::<Value>(raw_json)? {
        Value::Array(records) => records,
        other => {
            return Err(Error::InvalidInput(format!(
                "records must be a JSON array, got {}",
                type_name(&other)
            )));
        }
    };
    let courses = parse_course_lookup(course_names_json)?;
    let normalized = normalize_records(records, &courses, kind)?;
    Ok(serde_json::to_string(&normalized)?)
}

/// Attaches course name and teacher to every record and orders them by
/// the kind's timestamp, newest first. Records whose timestamp cannot be
/// read go last, in their original order.
pub fn normalize_records(
    records: Vec<Value>,
    courses: &CourseLookup,
    kind: RecordKind,
) -> Result<Vec<Map<String, Value>>> {
    let mut normalized = records
        .into_iter()
        .enumerate()
        .map(|(index, record)| match record {
            Value::Object(mut map) => {
                let course = map
                    .get("courseId")
                    .and_then(course_key)
                    .and_then(|id| courses.get(&id));
                let name = course
                    .map(|c| c.name.as_str())
                    .filter(|name| !name.is_empty())
                    .unwrap_or(UNKNOWN_COURSE_NAME);
                let teacher = course.map(|c| c.teacher_name.as_str()).unwrap_or_default();
                map.insert("courseName".to_string(), Value::from(name));
                map.insert("courseTeacherName".to_string(), Value::from(teacher));
                Ok(map)
            }
            other => Err(Error::InvalidInput(format!(
                "record {index} must be a JSON object, got {}",
                type_name(&other)
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    let field = kind.time_field();
    normalized.sort_by_cached_key(|record| {
        let instant = record.get(field).and_then(record_instant);
        (instant.is_none(), Reverse(instant))
    });
    Ok(normalized)
}

fn course_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn record_instant(value: &Value) -> Option<OffsetDateTime> {
    serde_json::from_value::<PortalTime>(value.clone())
        .ok()?
        .instant()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
