use serde::{Deserialize, Serialize};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::{format_description, offset},
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub download_url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseRef {
    pub name: String,
    pub teacher_name: String,
}

/// A portal timestamp. The portal sends epoch milliseconds in some
/// endpoints and preformatted text in others; both are kept as received.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum PortalTime {
    Millis(i64),
    Text(String),
}

impl Default for PortalTime {
    fn default() -> Self {
        PortalTime::Text(String::new())
    }
}

/// Portal wall-clock times are Beijing time.
pub const PORTAL_OFFSET: UtcOffset = offset!(+8);

const DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");
const DATETIME_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const DATETIME_FORMAT_SHORT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

impl PortalTime {
    /// Interprets the value as an instant, if it is one.
    pub fn instant(&self) -> Option<OffsetDateTime> {
        match self {
            PortalTime::Millis(ms) => from_millis(*ms),
            PortalTime::Text(text) => parse_time_text(text.trim()),
        }
    }
}

fn from_millis(ms: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()
}

fn parse_time_text(text: &str) -> Option<OffsetDateTime> {
    if text.is_empty() {
        return None;
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse::<i64>().ok().and_then(from_millis);
    }
    OffsetDateTime::parse(text, &Rfc3339)
        .ok()
        .or_else(|| {
            PrimitiveDateTime::parse(text, DATETIME_FORMAT)
                .or_else(|_| PrimitiveDateTime::parse(text, DATETIME_FORMAT_SHORT))
                .ok()
                .map(|dt| dt.assume_offset(PORTAL_OFFSET))
        })
        .or_else(|| {
            Date::parse(text, DATE_FORMAT)
                .ok()
                .map(|d| d.midnight().assume_offset(PORTAL_OFFSET))
        })
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: String,
    pub title: String,
    pub publisher: String,
    pub publish_time: PortalTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<PortalTime>,
    pub marked_important: bool,
    pub has_read: bool,
    pub url: String,
    pub course_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_homework_id: Option<String>,
    pub base_id: String,
    pub title: String,
    pub url: String,
    pub deadline: PortalTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_submission_deadline: Option<PortalTime>,
    pub is_late_submission: bool,
    pub completion_type: String,
    pub submission_type: String,
    pub submit_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_time: Option<PortalTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<f64>,
    pub grader_name: String,
    pub course_id: String,
    pub submitted: bool,
    pub graded: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_attachment: Option<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_attachment: Option<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_attachment: Option<Attachment>,
    #[serde(default)]
    pub grade_content: String,
    #[serde(default)]
    pub submitted_content: String,
    #[serde(default)]
    pub answer_content: String,
}

impl Assignment {
    /// Merge key: the per-student id when the portal assigned one.
    pub fn identity(&self) -> &str {
        self.student_homework_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.base_id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileResource {
    pub id: String,
    pub file_id: String,
    pub title: String,
    pub description: String,
    pub size: u64,
    pub upload_time: PortalTime,
    pub file_type: String,
    pub course_id: String,
    pub is_new: bool,
    pub download_url: String,
}
