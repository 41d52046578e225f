//! HTTP side of the adapter: list and detail requests against the portal.
//!
//! Every fetch fans out one branch per course and view. A branch that fails
//! is logged and contributes nothing; the fetch itself never fails.

pub mod assignments;
pub mod files;
pub mod notices;
mod payload;

use std::future::Future;

use futures::{StreamExt, future::join_all, stream};
use reqwest::{
    Client,
    header::{COOKIE, HeaderMap, HeaderValue},
};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::config::{PortalConfig, Session};
use crate::error::{Error, PortalError};

/// Marker the portal puts in `result` when a JSON call succeeded.
const SUCCESS_RESULT: &str = "success";

pub struct PortalClient {
    client: Client,
    config: PortalConfig,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct Envelope {
    result: Option<String>,
    msg: Option<String>,
    object: Value,
}

impl Envelope {
    fn into_object(self, endpoint: &str) -> Result<Value, PortalError> {
        if self.result.as_deref() == Some(SUCCESS_RESULT) {
            Ok(self.object)
        } else {
            Err(PortalError::envelope(
                endpoint,
                format!(
                    "result={:?} msg={:?}",
                    self.result.unwrap_or_default(),
                    self.msg.unwrap_or_default()
                ),
            ))
        }
    }
}

impl PortalClient {
    pub fn new(config: PortalConfig) -> Result<Self, Error> {
        let mut builder = Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    /// Resolves `path` and appends the session's `_csrf` token.
    pub(crate) fn csrf_url(&self, path: &str, session: &Session) -> Result<Url, PortalError> {
        let mut url = self
            .config
            .endpoint(path)
            .map_err(|e| PortalError::parse(path, format!("Invalid endpoint URL: {e}")))?;
        url.query_pairs_mut().append_pair("_csrf", &session.csrf);
        Ok(url)
    }

    pub(crate) fn session_headers(session: &Session) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(&session.cookie) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(e) => tracing::warn!("Session cookie is not a valid header value: {e}"),
        }
        headers
    }

    /// POSTs the course filter form the list endpoints expect and returns
    /// the envelope payload.
    async fn post_course_form(
        &self,
        path: &str,
        session: &Session,
        course_id: &str,
    ) -> Result<Value, PortalError> {
        let url = self.csrf_url(path, session)?;
        let ao_data = serde_json::json!([{ "name": "wlkcid", "value": course_id }]).to_string();
        tracing::debug!(course_id, "POST {}", path);
        let response = self
            .client
            .post(url)
            .headers(Self::session_headers(session))
            .form(&[("aoData", ao_data)])
            .send()
            .await
            .map_err(|e| PortalError::request(path, e.to_string()))?;
        Self::read_envelope(path, response).await
    }

    async fn get_json(
        &self,
        endpoint: &str,
        url: Url,
        session: &Session,
    ) -> Result<Value, PortalError> {
        tracing::debug!("GET {}", endpoint);
        let response = self
            .client
            .get(url)
            .headers(Self::session_headers(session))
            .send()
            .await
            .map_err(|e| PortalError::request(endpoint, e.to_string()))?;
        Self::read_envelope(endpoint, response).await
    }

    /// Fetches an HTML page for scraping.
    async fn get_page(&self, url: &str, session: &Session) -> Result<String, PortalError> {
        let response = self
            .client
            .get(url)
            .headers(Self::session_headers(session))
            .send()
            .await
            .map_err(|e| PortalError::request(url, e.to_string()))?;
        if !response.status().is_success() {
            return Err(PortalError::status(url, response.status()));
        }
        response
            .text()
            .await
            .map_err(|e| PortalError::request(url, format!("Failed to read page body: {e}")))
    }

    async fn read_envelope(
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<Value, PortalError> {
        if !response.status().is_success() {
            return Err(PortalError::status(endpoint, response.status()));
        }
        let text = response
            .text()
            .await
            .map_err(|e| PortalError::request(endpoint, format!("Failed to read body: {e}")))?;
        serde_json::from_str::<Envelope>(&text)
            .map_err(|e| PortalError::parse(endpoint, format!("Malformed envelope: {e}")))?
            .into_object(endpoint)
    }

    /// Runs every future to completion and returns their outputs in
    /// submission order.
    async fn fan_out<F, T>(&self, tasks: impl IntoIterator<Item = F>) -> Vec<T>
    where
        F: Future<Output = T>,
    {
        match self.config.max_concurrency {
            Some(limit) => stream::iter(tasks).buffered(limit).collect().await,
            None => join_all(tasks).await,
        }
    }
}

/// Unwraps a branch result into its records, logging the failure.
fn settle<T>(course_id: &str, result: Result<Vec<T>, PortalError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        tracing::warn!(course_id, kind = ?e.kind(), "{e}");
        Vec::new()
    })
}

/// Picks the payload array out of an envelope object, trying `keys` in order.
fn payload_array(object: Value, keys: &[&str]) -> Vec<Value> {
    match object {
        Value::Array(items) if keys.is_empty() => items,
        Value::Object(mut map) => keys
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_requires_success_marker() {
        let ok: Envelope =
            serde_json::from_value(json!({ "result": "success", "object": { "aaData": [] } }))
                .unwrap();
        assert!(ok.into_object("x").is_ok());

        let failed: Envelope =
            serde_json::from_value(json!({ "result": "error", "msg": "会话过期" })).unwrap();
        let err = failed.into_object("x").unwrap_err();
        assert_eq!(err.kind(), crate::PortalErrorKind::Envelope);

        let missing: Envelope = serde_json::from_value(json!({ "object": [] })).unwrap();
        assert!(missing.into_object("x").is_err());
    }

    #[test]
    fn payload_array_tries_alternate_keys() {
        let object = json!({ "resultsList": [{ "ggid": "1" }] });
        assert_eq!(payload_array(object, &["aaData", "resultsList"]).len(), 1);

        let object = json!({ "aaData": null, "resultsList": [1, 2] });
        assert_eq!(payload_array(object, &["aaData", "resultsList"]).len(), 2);

        let object = json!({ "aaData": [1, 2, 3], "resultsList": [1] });
        assert_eq!(payload_array(object, &["aaData", "resultsList"]).len(), 3);
    }

    #[test]
    fn payload_array_takes_bare_arrays_only_without_keys() {
        assert_eq!(payload_array(json!([1, 2]), &[]).len(), 2);
        assert!(payload_array(json!([1, 2]), &["aaData"]).is_empty());
        assert!(payload_array(json!({ "aaData": [1] }), &[]).is_empty());
        assert!(payload_array(Value::Null, &["aaData"]).is_empty());
    }

    #[test]
    fn csrf_is_appended_to_endpoint() {
        let client = PortalClient::new(PortalConfig::default()).unwrap();
        let url = client
            .csrf_url(
                "/b/wlxt/kczy/zy/student/zyListWj",
                &Session::new("c", "tok en"),
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://learn.tsinghua.edu.cn/b/wlxt/kczy/zy/student/zyListWj?_csrf=tok+en"
        );
    }

    #[tokio::test]
    async fn fan_out_keeps_submission_order_when_bounded() {
        let config = PortalConfig::default().with_max_concurrency(Some(2));
        let client = PortalClient::new(config).unwrap();
        let out = client
            .fan_out((0..5u64).map(|i| async move {
                tokio::time::sleep(std::time::Duration::from_millis(10 * (5 - i))).await;
                i
            }))
            .await;
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
    }
}
