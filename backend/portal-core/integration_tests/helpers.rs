use portal_core::{BufferedLogSink, PortalAuthenticator, PortalConfig, PortalTransport};

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html>
<body>
  <form method="post" action="/login">
    <input type="hidden" name="csrf_token" value="abc123">
    <input type="text" name="username">
    <input type="password" name="password">
  </form>
</body>
</html>"#;

pub struct Harness {
    pub server: MockServer,
    pub config: PortalConfig,
    pub sink: Arc<BufferedLogSink>,
    pub authenticator: PortalAuthenticator,
}

impl Harness {
    pub async fn csrf_form() -> Self {
        let server = MockServer::start().await;
        let config = PortalConfig::csrf_form(server.uri());
        Self::with_config(server, config)
    }

    pub fn with_config(server: MockServer, config: PortalConfig) -> Self {
        let sink = Arc::new(BufferedLogSink::new().silent());
        let transport = PortalTransport::from_config(&config).expect("transport");
        let authenticator =
            PortalAuthenticator::new(&config, transport, sink.clone()).expect("authenticator");
        Self {
            server,
            config,
            sink,
            authenticator,
        }
    }

    pub async fn mount_login_page(&self, body: &str) {
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_submit(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }
}
