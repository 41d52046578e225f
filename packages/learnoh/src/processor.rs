//! String-in/string-out surface the host application calls into.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{PortalConfig, Session};
use crate::error::Result;
use crate::normalize::{RecordKind, process_records};
use crate::portal::PortalClient;
use crate::upload::{LocalFile, ProgressListener, UploadRequest, parse_params};

/// Capabilities owned by the host application.
pub trait HostShell: Send + Sync {
    /// Sends the host application to the background.
    fn move_to_background(&self);
}

/// Shell used when no host is attached; it only records the request.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingShell;

impl HostShell for LoggingShell {
    fn move_to_background(&self) {
        tracing::info!("move_to_background requested but no host shell is attached");
    }
}

/// Arguments of [`DataProcessor::post`].
#[derive(Debug, Clone, Default)]
pub struct PostRequest {
    pub url: String,
    pub cookie: String,
    pub csrf: String,
    /// JSON object of form fields.
    pub params: String,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub request_id: Option<String>,
}

pub struct DataProcessor {
    portal: PortalClient,
    shell: Arc<dyn HostShell>,
    progress: Option<Arc<dyn ProgressListener>>,
}

impl DataProcessor {
    pub fn new(config: PortalConfig) -> Result<Self> {
        Ok(Self {
            portal: PortalClient::new(config)?,
            shell: Arc::new(LoggingShell),
            progress: None,
        })
    }

    pub fn with_shell(mut self, shell: Arc<dyn HostShell>) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_progress_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.progress = Some(listener);
        self
    }

    pub fn portal(&self) -> &PortalClient {
        &self.portal
    }

    pub async fn process_notices(&self, raw_json: &str, course_names_json: &str) -> Result<String> {
        process_records(raw_json, course_names_json, RecordKind::Notice)
    }

    pub async fn process_assignments(
        &self,
        raw_json: &str,
        course_names_json: &str,
    ) -> Result<String> {
        process_records(raw_json, course_names_json, RecordKind::Assignment)
    }

    pub async fn process_files(&self, raw_json: &str, course_names_json: &str) -> Result<String> {
        process_records(raw_json, course_names_json, RecordKind::File)
    }

    pub async fn fetch_notices(&self, course_ids: &[String], cookie: &str, csrf: &str) -> Result<String> {
        let notices = self
            .portal
            .fetch_notices(course_ids, &Session::new(cookie, csrf))
            .await;
        Ok(serde_json::to_string(&notices)?)
    }

    pub async fn fetch_assignments(
        &self,
        course_ids: &[String],
        cookie: &str,
        csrf: &str,
    ) -> Result<String> {
        let assignments = self
            .portal
            .fetch_assignments(course_ids, &Session::new(cookie, csrf))
            .await;
        Ok(serde_json::to_string(&assignments)?)
    }

    pub async fn fetch_files(&self, course_ids: &[String], cookie: &str, csrf: &str) -> Result<String> {
        let files = self
            .portal
            .fetch_files(course_ids, &Session::new(cookie, csrf))
            .await;
        Ok(serde_json::to_string(&files)?)
    }

    /// Uploads a form with an optional file and returns the raw response
    /// body. Progress goes to the attached [`ProgressListener`].
    pub async fn post(&self, request: PostRequest) -> Result<String> {
        let upload = UploadRequest {
            url: request.url,
            params: parse_params(&request.params)?,
            file: request
                .file_path
                .filter(|path| !path.is_empty())
                .map(|path| LocalFile {
                    path: PathBuf::from(path),
                    file_name: request.file_name,
                    content_type: request.file_type,
                }),
            request_id: request.request_id,
        };
        self.portal
            .post_multipart(
                upload,
                &Session::new(request.cookie, request.csrf),
                self.progress.clone(),
            )
            .await
    }

    pub fn move_to_background(&self) {
        self.shell.move_to_background();
    }
}
