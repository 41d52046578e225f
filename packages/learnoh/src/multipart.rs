//! `multipart/form-data` encoding for portal uploads.
//!
//! The body is kept as a list of encoded parts so the transport can report
//! progress while streaming it; the encoder itself knows nothing about
//! progress.

use std::path::Path;

use bytes::{Bytes, BytesMut};
use uuid::Uuid;

/// Form field the portal reads uploaded files from.
pub const FILE_FIELD_NAME: &str = "fileupload";

const CRLF: &str = "\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl FilePart {
    /// Reads a local file. The file name defaults to the path's last
    /// component and the content type to a guess from the file name.
    pub async fn read(
        path: &Path,
        file_name: Option<&str>,
        content_type: Option<&str>,
    ) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let file_name = file_name
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "file".to_string());
        let content_type = content_type
            .filter(|ty| !ty.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                mime_guess::from_path(&file_name)
                    .first_or_octet_stream()
                    .to_string()
            });
        Ok(Self {
            file_name,
            content_type,
            data: Bytes::from(data),
        })
    }
}

pub struct MultipartEncoder {
    boundary: String,
    parts: Vec<Bytes>,
}

impl Default for MultipartEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartEncoder {
    pub fn new() -> Self {
        Self::with_boundary(format!(
            "----LearnohFormBoundary{}",
            Uuid::new_v4().simple()
        ))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        let part = format!(
            "--{boundary}{CRLF}Content-Disposition: form-data; name=\"{name}\"{CRLF}{CRLF}{value}{CRLF}",
            boundary = self.boundary,
            name = escape_quoted(name),
        );
        self.parts.push(Bytes::from(part));
        self
    }

    pub fn file(mut self, file: &FilePart) -> Self {
        let header = format!(
            "--{boundary}{CRLF}Content-Disposition: form-data; name=\"{FILE_FIELD_NAME}\"; filename=\"{file_name}\"{CRLF}Content-Type: {content_type}{CRLF}{CRLF}",
            boundary = self.boundary,
            file_name = escape_quoted(&file.file_name),
            content_type = file.content_type,
        );
        let mut part = BytesMut::with_capacity(header.len() + file.data.len() + CRLF.len());
        part.extend_from_slice(header.as_bytes());
        part.extend_from_slice(&file.data);
        part.extend_from_slice(CRLF.as_bytes());
        self.parts.push(part.freeze());
        self
    }

    pub fn finish(mut self) -> MultipartBody {
        self.parts
            .push(Bytes::from(format!("--{}--{CRLF}", self.boundary)));
        MultipartBody {
            boundary: self.boundary,
            parts: self.parts,
        }
    }
}

/// Builds the upload body for a parameter list and an optional file.
pub fn encode_form<'a>(
    params: impl IntoIterator<Item = (&'a str, &'a str)>,
    file: Option<&FilePart>,
) -> MultipartBody {
    let encoder = params
        .into_iter()
        .fold(MultipartEncoder::new(), |encoder, (name, value)| {
            encoder.text(name, value)
        });
    match file {
        Some(file) => encoder.file(file),
        None => encoder,
    }
    .finish()
}

/// An encoded body: every part followed by the closing boundary.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    parts: Vec<Bytes>,
}

impl MultipartBody {
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encoded parts; the last one is the closing boundary.
    pub fn parts(&self) -> &[Bytes] {
        &self.parts
    }

    pub fn len(&self) -> u64 {
        self.parts.iter().map(|part| part.len() as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn to_bytes(&self) -> Bytes {
        self.parts.concat().into()
    }

    /// Splits the body into chunks of at most `chunk_size` bytes.
    pub fn chunks(&self, chunk_size: usize) -> Vec<Bytes> {
        let chunk_size = chunk_size.max(1);
        self.parts
            .iter()
            .flat_map(|part| {
                (0..part.len())
                    .step_by(chunk_size)
                    .map(move |start| part.slice(start..(start + chunk_size).min(part.len())))
            })
            .collect()
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
