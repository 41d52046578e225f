use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::payload::{number, parse_items, text, time};
use super::{PortalClient, payload_array, settle};
use crate::config::Session;
use crate::decode::decode_html;
use crate::error::PortalError;
use crate::model::FileResource;

pub const FILE_LIST_PATH: &str = "/b/wlxt/kj/wlkc_kjxxb/student/kjxxbByWlkcidAndSizeForStudent";
const DOWNLOAD_PATH: &str = "/b/wlxt/kj/wlkc_kjxxb/student/downloadFile";

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawFile {
    kjxxid: Value,
    wjid: Value,
    bt: Value,
    ms: Value,
    #[serde(rename = "fileSize")]
    file_size: Value,
    scsj: Value,
    wjlx: Value,
    #[serde(rename = "isNew")]
    is_new: Value,
}

impl RawFile {
    fn into_file(self, course_id: &str, base: &Url) -> FileResource {
        let file_id = text(&self.wjid);
        let mut download_url = base.join(DOWNLOAD_PATH).unwrap_or_else(|_| base.clone());
        download_url
            .query_pairs_mut()
            .append_pair("sfgk", "0")
            .append_pair("wjid", &file_id);

        FileResource {
            id: text(&self.kjxxid),
            title: decode_html(&text(&self.bt)),
            description: decode_html(&text(&self.ms)),
            size: number(&self.file_size)
                .filter(|n| n.is_finite() && *n >= 0.0)
                .map_or(0, |n| n as u64),
            upload_time: time(&self.scsj).unwrap_or_default(),
            file_type: text(&self.wjlx),
            course_id: course_id.to_string(),
            is_new: is_new(&self.is_new),
            download_url: download_url.to_string(),
            file_id,
        }
    }
}

/// `isNew` comes as `true`, `"true"` or `1`. Nothing else counts.
fn is_new(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        Value::Number(n) => n.as_u64() == Some(1),
        _ => false,
    }
}

impl PortalClient {
    /// Fetches the file listing of every course.
    pub async fn fetch_files(&self, course_ids: &[String], session: &Session) -> Vec<FileResource> {
        tracing::info!("Fetching files for {} courses", course_ids.len());
        let branches = course_ids.iter().map(move |course_id| async move {
            settle(course_id, self.file_branch(course_id, session).await)
        });
        let files: Vec<FileResource> = self.fan_out(branches).await.into_iter().flatten().collect();
        tracing::info!("Collected {} files", files.len());
        files
    }

    async fn file_branch(
        &self,
        course_id: &str,
        session: &Session,
    ) -> Result<Vec<FileResource>, PortalError> {
        let mut url = self.csrf_url(FILE_LIST_PATH, session)?;
        url.query_pairs_mut()
            .append_pair("wlkcid", course_id)
            .append_pair("size", &self.config().file_page_size.to_string());
        let object = self.get_json(FILE_LIST_PATH, url, session).await?;
        let raw: Vec<RawFile> = parse_items(FILE_LIST_PATH, payload_array(object, &[]));
        Ok(raw
            .into_iter()
            .map(|item| item.into_file(course_id, self.base_url()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::PortalTime;

    #[test]
    fn maps_list_item_fields() {
        let raw: RawFile = serde_json::from_value(json!({
            "kjxxid": "k1",
            "wjid": "w1",
            "bt": "第一讲 &amp; 习题",
            "ms": "",
            "fileSize": 20480,
            "scsj": "2024-02-20 08:00",
            "wjlx": "pdf",
            "isNew": "true",
        }))
        .unwrap();
        let base = Url::parse("https://learn.tsinghua.edu.cn/").unwrap();
        let file = raw.into_file("c1", &base);

        assert_eq!(file.id, "k1");
        assert_eq!(file.file_id, "w1");
        assert_eq!(file.title, "第一讲 & 习题");
        assert_eq!(file.size, 20480);
        assert_eq!(file.upload_time, PortalTime::Text("2024-02-20 08:00".into()));
        assert!(file.is_new);
        assert_eq!(
            file.download_url,
            "https://learn.tsinghua.edu.cn/b/wlxt/kj/wlkc_kjxxb/student/downloadFile?sfgk=0&wjid=w1"
        );
    }

    #[test]
    fn is_new_accepts_portal_spellings() {
        let base = Url::parse("https://learn.tsinghua.edu.cn/").unwrap();
        for (value, expected) in [
            (json!(true), true),
            (json!("true"), true),
            (json!(1), true),
            (json!("1"), false),
            (json!("false"), false),
            (json!(false), false),
            (json!(0), false),
            (json!(2), false),
            (Value::Null, false),
        ] {
            let raw: RawFile = serde_json::from_value(json!({ "isNew": value.clone() })).unwrap();
            assert_eq!(raw.into_file("c1", &base).is_new, expected, "isNew = {value}");
        }
    }
}
