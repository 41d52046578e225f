#![allow(dead_code)]

use std::sync::OnceLock;

use learnoh::{PortalClient, PortalConfig, Session};
use tracing_subscriber::EnvFilter;
use url::Url;
use wiremock::MockServer;

static INIT: OnceLock<()> = OnceLock::new();

pub fn init_test_tracing() {
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn session() -> Session {
    Session::new("JSESSIONID=abc; XSRF-TOKEN=tok", "tok")
}

pub fn client_for(server: &MockServer) -> PortalClient {
    let base = Url::parse(&server.uri()).expect("mock server uri should parse");
    PortalClient::new(PortalConfig::default().with_base_url(base)).expect("client should build")
}

/// The url-encoded `aoData` fragment naming `course_id`.
pub fn course_form(course_id: &str) -> String {
    format!("%22{course_id}%22")
}

pub fn success(object: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "result": "success", "msg": null, "object": object })
}
