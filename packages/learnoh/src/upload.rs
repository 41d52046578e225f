//! Multipart POST with progress reporting.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, stream};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde_json::Value;
use url::Url;

use crate::config::Session;
use crate::error::{Error, PortalError, Result};
use crate::multipart::{FilePart, encode_form};
use crate::portal::PortalClient;

/// Size of the slices the request body is streamed in.
pub const UPLOAD_CHUNK_SIZE: usize = 16 * 1024;

/// Receives upload progress. `sent` counts body bytes handed to the
/// transport so far; the last call has `sent == total`.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, request_id: &str, sent: u64, total: u64);
}

impl<F> ProgressListener for F
where
    F: Fn(&str, u64, u64) + Send + Sync,
{
    fn on_progress(&self, request_id: &str, sent: u64, total: u64) {
        self(request_id, sent, total)
    }
}

/// A local file to attach to an upload.
#[derive(Debug, Clone, Default)]
pub struct LocalFile {
    pub path: PathBuf,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Absolute URL, or a path resolved against the portal base URL.
    pub url: String,
    pub params: Vec<(String, String)>,
    pub file: Option<LocalFile>,
    /// Progress is only reported for requests that carry an id.
    pub request_id: Option<String>,
}

/// Reads the form fields of an upload from a JSON object. String values are
/// sent as-is, anything else as its JSON text.
pub fn parse_params(json: &str) -> Result<Vec<(String, String)>> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect()),
        _ => Err(Error::InvalidInput(
            "upload parameters must be a JSON object".to_string(),
        )),
    }
}

impl PortalClient {
    /// Sends `request` as `multipart/form-data` and returns the raw
    /// response body.
    ///
    /// A file that cannot be read is left out of the form with a warning.
    /// Failure of the request itself is returned to the caller.
    #[tracing::instrument(
        level = tracing::Level::DEBUG,
        skip(self, request, session, listener),
        fields(url = %request.url, request_id = ?request.request_id)
    )]
    pub async fn post_multipart(
        &self,
        request: UploadRequest,
        session: &Session,
        listener: Option<Arc<dyn ProgressListener>>,
    ) -> Result<String> {
        let url = self.upload_url(&request.url, session)?;

        let file = match &request.file {
            Some(file) => {
                match FilePart::read(
                    &file.path,
                    file.file_name.as_deref(),
                    file.content_type.as_deref(),
                )
                .await
                {
                    Ok(part) => Some(part),
                    Err(e) => {
                        tracing::warn!(path = %file.path.display(), "Omitting unreadable upload file: {e}");
                        None
                    }
                }
            }
            None => None,
        };

        let body = encode_form(
            request
                .params
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
            file.as_ref(),
        );
        let total = body.len();
        tracing::debug!(total, "POST multipart {}", url.path());

        let progress = request.request_id.zip(listener);
        let mut sent = 0u64;
        let chunks = stream::iter(body.chunks(UPLOAD_CHUNK_SIZE)).map(move |chunk: Bytes| {
            sent += chunk.len() as u64;
            if let Some((request_id, listener)) = &progress {
                listener.on_progress(request_id, sent, total);
            }
            Ok::<_, std::io::Error>(chunk)
        });

        let endpoint = url.path().to_string();
        let response = self
            .http()
            .post(url)
            .headers(Self::session_headers(session))
            .header(CONTENT_TYPE, body.content_type())
            .header(CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(chunks))
            .send()
            .await
            .map_err(|e| PortalError::request(&endpoint, e.to_string()))?;
        if !response.status().is_success() {
            return Err(PortalError::status(&endpoint, response.status()).into());
        }
        response
            .text()
            .await
            .map_err(|e| PortalError::request(&endpoint, format!("Failed to read body: {e}")).into())
    }

    fn upload_url(&self, target: &str, session: &Session) -> Result<Url> {
        let mut url = match Url::parse(target) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .config()
                .endpoint(target)
                .map_err(|e| Error::InvalidInput(format!("invalid upload URL {target:?}: {e}")))?,
            Err(e) => {
                return Err(Error::InvalidInput(format!(
                    "invalid upload URL {target:?}: {e}"
                )));
            }
        };
        url.query_pairs_mut().append_pair("_csrf", &session.csrf);
        Ok(url)
    }
}
