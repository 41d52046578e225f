use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::payload::{number, one_of, parse_items, text, time};
use super::{PortalClient, payload_array, settle};
use crate::attachment::attachment_after;
use crate::config::Session;
use crate::decode::{decode_base64_text, decode_html};
use crate::error::PortalError;
use crate::model::{Attachment, Notice, PortalTime};

/// Notice list views: unexpired, then expired.
pub const NOTICE_VIEWS: [&str; 2] = [
    "/b/wlxt/kcgg/wlkc_ggb/student/pageListXsbyWgq",
    "/b/wlxt/kcgg/wlkc_ggb/student/pageListXsbyYgq",
];

const NOTICE_PAGE_PATH: &str = "/f/wlxt/kcgg/wlkc_ggb/student/beforeViewXs";

/// Class of the attachment row on a notice page.
pub const NOTICE_ATTACHMENT_MARKER: &str = "fujian";

const HAS_READ_VALUES: [&str; 3] = ["1", "是", "已读"];

static CONTENT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#ggnr").expect("Failed to parse notice content selector"));

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawNotice {
    ggid: Value,
    bt: Value,
    fbrxm: Value,
    fbsj: Value,
    #[serde(rename = "fbsjStr")]
    fbsj_str: Value,
    jzsj: Value,
    sfqd: Value,
    sfyd: Value,
    ggnr: Value,
}

impl RawNotice {
    fn into_notice(self, course_id: &str, base: &Url) -> Notice {
        let id = text(&self.ggid);
        let publish_time = match &self.fbsj {
            Value::String(s) if !s.is_empty() => PortalTime::Text(s.clone()),
            other => time(&self.fbsj_str)
                .or_else(|| time(other))
                .unwrap_or_default(),
        };
        let mut url = base.join(NOTICE_PAGE_PATH).unwrap_or_else(|_| base.clone());
        url.query_pairs_mut()
            .append_pair("wlkcid", course_id)
            .append_pair("id", &id);

        Notice {
            title: decode_html(&text(&self.bt)),
            publisher: text(&self.fbrxm),
            publish_time,
            expire_time: time(&self.jzsj),
            marked_important: number(&self.sfqd) == Some(1.0),
            has_read: one_of(&self.sfyd, &HAS_READ_VALUES),
            url: url.to_string(),
            course_id: course_id.to_string(),
            content: decode_html(&decode_base64_text(&text(&self.ggnr))),
            attachment: None,
            id,
        }
    }
}

/// What a notice page adds to the list record.
#[derive(Debug, Default, PartialEq)]
pub struct NoticeDetail {
    pub content: String,
    pub attachment: Option<Attachment>,
}

pub fn parse_notice_page(html: &str, base: &Url) -> NoticeDetail {
    let document = Html::parse_document(html);
    let content = document
        .select(&CONTENT_SELECTOR)
        .next()
        .map(|el| el.inner_html().trim().to_string())
        .unwrap_or_default();
    NoticeDetail {
        content,
        attachment: attachment_after(html, NOTICE_ATTACHMENT_MARKER, &[], base),
    }
}

impl PortalClient {
    /// Fetches notices of every course from both list views.
    pub async fn fetch_notices(&self, course_ids: &[String], session: &Session) -> Vec<Notice> {
        tracing::info!("Fetching notices for {} courses", course_ids.len());
        let branches = course_ids.iter().flat_map(move |course_id| {
            NOTICE_VIEWS.iter().map(move |view| async move {
                settle(course_id, self.notice_branch(view, course_id, session).await)
            })
        });
        let notices: Vec<Notice> = self.fan_out(branches).await.into_iter().flatten().collect();
        tracing::info!("Collected {} notices", notices.len());
        notices
    }

    async fn notice_branch(
        &self,
        view: &str,
        course_id: &str,
        session: &Session,
    ) -> Result<Vec<Notice>, PortalError> {
        let object = self.post_course_form(view, session, course_id).await?;
        let raw: Vec<RawNotice> =
            parse_items(view, payload_array(object, &["aaData", "resultsList"]));
        let notices = raw
            .into_iter()
            .map(|item| item.into_notice(course_id, self.base_url()));
        Ok(self
            .fan_out(notices.map(|notice| self.with_notice_detail(notice, session)))
            .await)
    }

    #[tracing::instrument(level = tracing::Level::DEBUG, skip(self, notice, session), fields(notice_id = %notice.id))]
    async fn with_notice_detail(&self, mut notice: Notice, session: &Session) -> Notice {
        match self.get_page(&notice.url, session).await {
            Ok(html) => {
                let detail = parse_notice_page(&html, self.base_url());
                if notice.content.is_empty() {
                    notice.content = detail.content;
                }
                notice.attachment = detail.attachment;
            }
            Err(e) => tracing::warn!("Notice detail unavailable: {e}"),
        }
        notice
    }
}
