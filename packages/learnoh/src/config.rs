use std::time::Duration;

use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://learn.tsinghua.edu.cn/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_FILE_PAGE_SIZE: u32 = 200;

/// Where the portal lives and how hard to hit it.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Origin every endpoint and relative link is resolved against.
    pub base_url: Url,
    pub user_agent: String,
    /// `size` parameter of the course file listing.
    pub file_page_size: u32,
    /// Upper bound on in-flight requests per fan-out stage. `None` issues
    /// every request at once.
    pub max_concurrency: Option<usize>,
    pub request_timeout: Option<Duration>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("DEFAULT_BASE_URL should be a valid URL"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            file_page_size: DEFAULT_FILE_PAGE_SIZE,
            max_concurrency: None,
            request_timeout: None,
        }
    }
}

impl PortalConfig {
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit.filter(|n| *n > 0);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Resolves `path` (absolute or relative) against the portal origin.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }
}

/// Caller-supplied credentials. Never logged.
#[derive(Clone)]
pub struct Session {
    pub cookie: String,
    pub csrf: String,
}

impl Session {
    pub fn new(cookie: impl Into<String>, csrf: impl Into<String>) -> Self {
        Self {
            cookie: cookie.into(),
            csrf: csrf.into(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("cookie", &"<redacted>")
            .field("csrf", &"<redacted>")
            .finish()
    }
}
