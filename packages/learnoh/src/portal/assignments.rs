use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::payload::{number, parse_items, text, time, truthy};
use super::{PortalClient, payload_array, settle};
use crate::attachment::attachment_after;
use crate::config::Session;
use crate::decode::decode_html;
use crate::error::PortalError;
use crate::merge::AssignmentMerger;
use crate::model::{Assignment, Attachment};

/// One assignment list endpoint and the status its records carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentView {
    pub path: &'static str,
    pub submitted: bool,
    pub graded: bool,
}

/// Unsubmitted, submitted but ungraded, graded. Later views win the merge.
pub const ASSIGNMENT_VIEWS: [AssignmentView; 3] = [
    AssignmentView {
        path: "/b/wlxt/kczy/zy/student/zyListWj",
        submitted: false,
        graded: false,
    },
    AssignmentView {
        path: "/b/wlxt/kczy/zy/student/zyListYjwg",
        submitted: true,
        graded: false,
    },
    AssignmentView {
        path: "/b/wlxt/kczy/zy/student/zyListYpg",
        submitted: true,
        graded: true,
    },
];

const ASSIGNMENT_PAGE_PATH: &str = "/f/wlxt/kczy/zy/student/viewCj";
const SUBMIT_PAGE_PATH: &str = "/f/wlxt/kczy/zy/student/tijiao";

pub const ATTACHMENT_MARKER: &str = "作业附件";
pub const ANSWER_ATTACHMENT_MARKER: &str = "答案附件";
pub const SUBMITTED_ATTACHMENT_MARKER: &str = "提交附件";
pub const GRADE_ATTACHMENT_MARKER: &str = "评语附件";

/// Every section marker; a section's attachment never extends into the next.
const SECTION_MARKERS: [&str; 4] = [
    ATTACHMENT_MARKER,
    ANSWER_ATTACHMENT_MARKER,
    SUBMITTED_ATTACHMENT_MARKER,
    GRADE_ATTACHMENT_MARKER,
];

static CONTENT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.list.calendar.clearfix > div.fl.right > div.c55")
        .expect("Failed to parse assignment content selector")
});
static SUBMITTED_CONTENT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.submit-content").expect("Failed to parse submitted content selector")
});
static GRADE_CONTENT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.grade-content").expect("Failed to parse grade content selector")
});

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawAssignment {
    wlkcid: Value,
    xszyid: Value,
    zyid: Value,
    bt: Value,
    jzsj: Value,
    bjjzsj: Value,
    sfbj: Value,
    zywcfs: Value,
    zytjfs: Value,
    scsj: Value,
    cj: Value,
    jsm: Value,
}

impl RawAssignment {
    fn into_assignment(self, course_id: &str, view: AssignmentView, base: &Url) -> Assignment {
        let wlkcid = Some(text(&self.wlkcid))
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| course_id.to_string());
        let student_homework_id = Some(text(&self.xszyid)).filter(|id| !id.is_empty());
        let base_id = text(&self.zyid);
        let page_url = |path: &str| {
            let mut url = base.join(path).unwrap_or_else(|_| base.clone());
            url.query_pairs_mut()
                .append_pair("wlkcid", &wlkcid)
                .append_pair("xszyid", student_homework_id.as_deref().unwrap_or_default());
            url.to_string()
        };

        Assignment {
            id: student_homework_id.clone().unwrap_or_else(|| base_id.clone()),
            url: page_url(ASSIGNMENT_PAGE_PATH),
            submit_url: page_url(SUBMIT_PAGE_PATH),
            student_homework_id,
            base_id,
            title: decode_html(&text(&self.bt)),
            deadline: time(&self.jzsj).unwrap_or_default(),
            late_submission_deadline: truthy(&self.bjjzsj)
                .then(|| time(&self.bjjzsj))
                .flatten(),
            is_late_submission: text(&self.sfbj) == "1",
            completion_type: text(&self.zywcfs),
            submission_type: text(&self.zytjfs),
            submit_time: time(&self.scsj),
            grade: grade(&self.cj),
            grader_name: text(&self.jsm),
            course_id: course_id.to_string(),
            submitted: view.submitted,
            graded: view.graded,
            description: String::new(),
            attachment: None,
            submitted_attachment: None,
            grade_attachment: None,
            answer_attachment: None,
            grade_content: String::new(),
            submitted_content: String::new(),
            answer_content: String::new(),
        }
    }
}

/// Reads `cj`. Letter grades and other text the portal may put there
/// cannot be represented and are dropped with a warning.
fn grade(value: &Value) -> Option<f64> {
    let grade = number(value);
    if grade.is_none() && !text(value).trim().is_empty() {
        tracing::warn!(cj = %value, "Dropping non-numeric grade");
    }
    grade
}

/// Everything an assignment page adds to the list record.
#[derive(Debug, Default, PartialEq)]
pub struct AssignmentDetail {
    pub description: String,
    pub answer_content: String,
    pub submitted_content: String,
    pub grade_content: String,
    pub attachment: Option<Attachment>,
    pub answer_attachment: Option<Attachment>,
    pub submitted_attachment: Option<Attachment>,
    pub grade_attachment: Option<Attachment>,
}

impl AssignmentDetail {
    fn apply(self, assignment: &mut Assignment) {
        assignment.description = self.description;
        assignment.answer_content = self.answer_content;
        assignment.submitted_content = self.submitted_content;
        assignment.grade_content = self.grade_content;
        assignment.attachment = self.attachment;
        assignment.answer_attachment = self.answer_attachment;
        assignment.submitted_attachment = self.submitted_attachment;
        assignment.grade_attachment = self.grade_attachment;
    }
}

pub fn parse_assignment_page(html: &str, base: &Url) -> AssignmentDetail {
    let document = Html::parse_document(html);
    let mut contents = document
        .select(&CONTENT_SELECTOR)
        .map(|el| el.inner_html().trim().to_string());
    let first_of = |selector: &Selector| {
        document
            .select(selector)
            .next()
            .map(|el| el.inner_html().trim().to_string())
            .unwrap_or_default()
    };

    AssignmentDetail {
        description: contents.next().unwrap_or_default(),
        answer_content: contents.next().unwrap_or_default(),
        submitted_content: first_of(&SUBMITTED_CONTENT_SELECTOR),
        grade_content: first_of(&GRADE_CONTENT_SELECTOR),
        attachment: attachment_after(html, ATTACHMENT_MARKER, &SECTION_MARKERS, base),
        answer_attachment: attachment_after(html, ANSWER_ATTACHMENT_MARKER, &SECTION_MARKERS, base),
        submitted_attachment: attachment_after(
            html,
            SUBMITTED_ATTACHMENT_MARKER,
            &SECTION_MARKERS,
            base,
        ),
        grade_attachment: attachment_after(html, GRADE_ATTACHMENT_MARKER, &SECTION_MARKERS, base),
    }
}

impl PortalClient {
    /// Fetches assignments of every course from all three status views and
    /// merges records describing the same assignment.
    pub async fn fetch_assignments(
        &self,
        course_ids: &[String],
        session: &Session,
    ) -> Vec<Assignment> {
        tracing::info!("Fetching assignments for {} courses", course_ids.len());
        let branches = course_ids.iter().flat_map(move |course_id| {
            ASSIGNMENT_VIEWS.iter().map(move |view| async move {
                settle(
                    course_id,
                    self.assignment_branch(*view, course_id, session).await,
                )
            })
        });
        let merger: AssignmentMerger = self.fan_out(branches).await.into_iter().flatten().collect();
        tracing::info!("Collected {} assignments", merger.len());
        merger.into_records()
    }

    async fn assignment_branch(
        &self,
        view: AssignmentView,
        course_id: &str,
        session: &Session,
    ) -> Result<Vec<Assignment>, PortalError> {
        let object = self.post_course_form(view.path, session, course_id).await?;
        let raw: Vec<RawAssignment> = parse_items(view.path, payload_array(object, &["aaData"]));
        let assignments = raw
            .into_iter()
            .map(|item| item.into_assignment(course_id, view, self.base_url()));
        Ok(self
            .fan_out(assignments.map(|assignment| self.with_assignment_detail(assignment, session)))
            .await)
    }

    #[tracing::instrument(level = tracing::Level::DEBUG, skip(self, assignment, session), fields(assignment_id = %assignment.id))]
    async fn with_assignment_detail(
        &self,
        mut assignment: Assignment,
        session: &Session,
    ) -> Assignment {
        let detail_url = match Url::parse(&assignment.url) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("zyid", &assignment.base_id);
                url.to_string()
            }
            Err(_) => assignment.url.clone(),
        };
        match self.get_page(&detail_url, session).await {
            Ok(html) => parse_assignment_page(&html, self.base_url()).apply(&mut assignment),
            Err(e) => tracing::warn!("Assignment detail unavailable: {e}"),
        }
        assignment
    }
}
