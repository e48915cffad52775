//! Two-step challenge/response login against the captive portal.
//!
//! 1. GET the challenge page (cookies land in the shared jar)
//! 2. Extract the anti-forgery token with the ordered rules
//! 3. POST credentials + token + fixed fields as a form
//! 4. Classify the response
//!
//! Each step returns `Result<_, AuthError>`; [`PortalAuthenticator::authenticate`]
//! folds whatever happened into an [`AuthAttemptResult`] and never fails.
//! Nothing is retried.

use crate::classify::{Classification, Classifier};
use crate::config::{EndpointConfig, FormFields, PortalConfig};
use crate::error::{AuthError, AuthFailureKind, ConfigError};
use crate::extraction::{ExtractedToken, TokenExtractor};
use crate::log_sink::{LogSink, preview};
use crate::transport::PortalTransport;

use common::{HttpStatusCode, RedactedSecret};

use std::sync::Arc;

use log::Level;
use url::Url;

const MASKED_VALUE: &str = "********";
const SUCCESS_STATUS_MESSAGE: &str = "Authentication successful!";

/// Username and password for one attempt. Not persisted.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: RedactedSecret,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: RedactedSecret::new(password),
        }
    }
}

/// Outcome of one [`PortalAuthenticator::authenticate`] call.
///
/// `error_message` and `failure` are `Some` exactly when `succeeded` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAttemptResult {
    pub succeeded: bool,
    /// Status of the submit response; `None` if the attempt ended earlier.
    pub http_status: Option<HttpStatusCode>,
    /// Body of the submit response; empty if the attempt ended earlier.
    pub response_body: String,
    pub error_message: Option<String>,
    pub failure: Option<AuthFailureKind>,
    pub token_used: Option<String>,
}

impl AuthAttemptResult {
    /// One-line status for the primary display. No body snippets.
    pub fn status_message(&self) -> String {
        match &self.error_message {
            None => SUCCESS_STATUS_MESSAGE.to_string(),
            Some(message) => format!("Authentication failed: {message}"),
        }
    }
}

/// What the attempt saw before it ended, successful or not.
#[derive(Default)]
struct AttemptTrace {
    token: Option<String>,
    status: Option<HttpStatusCode>,
    body: String,
}

pub struct PortalAuthenticator {
    transport: PortalTransport,
    endpoint: EndpointConfig,
    fields: FormFields,
    extractor: TokenExtractor,
    classifier: Classifier,
    sink: Arc<dyn LogSink>,
}

impl PortalAuthenticator {
    /// Compile the rule sets from `config` and bind them to `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if a token or error pattern is invalid.
    pub fn new(
        config: &PortalConfig,
        transport: PortalTransport,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            transport,
            endpoint: config.endpoint.clone(),
            fields: config.fields.clone(),
            extractor: TokenExtractor::new(&config.token.rules)?,
            classifier: Classifier::new(&config.classification)?,
            sink,
        })
    }

    pub fn transport(&self) -> &PortalTransport {
        &self.transport
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Simplified form of [`authenticate`](Self::authenticate).
    pub async fn login(&self, username: &str, password: &str) -> bool {
        self.authenticate(&Credentials::new(username, password))
            .await
            .succeeded
    }

    /// Run one full attempt. Never panics, never returns an error.
    pub async fn authenticate(&self, credentials: &Credentials) -> AuthAttemptResult {
        self.sink.info(&format!(
            "Starting authentication for user '{}' against {}",
            credentials.username,
            self.transport.base_url()
        ));

        let mut trace = AttemptTrace::default();
        let outcome = self.run(credentials, &mut trace).await;

        match outcome {
            Ok(()) => {
                self.sink.success("Authentication successful");
                AuthAttemptResult {
                    succeeded: true,
                    http_status: trace.status,
                    response_body: trace.body,
                    error_message: None,
                    failure: None,
                    token_used: trace.token,
                }
            }
            Err(error) => {
                self.sink.error(&error.to_string());
                AuthAttemptResult {
                    succeeded: false,
                    http_status: trace.status,
                    response_body: trace.body,
                    error_message: Some(error.user_message()),
                    failure: Some(error.kind()),
                    token_used: trace.token,
                }
            }
        }
    }

    async fn run(&self, credentials: &Credentials, trace: &mut AttemptTrace) -> Result<(), AuthError> {
        let challenge_url = self.transport.url(&self.endpoint.challenge_path)?;

        self.sink.step(1, "Fetching login page");
        let challenge_body = self.fetch_challenge(&challenge_url).await?;

        self.sink.step(2, "Extracting session token");
        let token = self.extract_token(&challenge_body)?;
        trace.token = Some(token.value.clone());

        self.sink.step(3, "Submitting credentials");
        let (status, body) = self
            .submit(credentials, &token.value, &challenge_url)
            .await?;
        trace.status = Some(status);
        trace.body = body;

        self.sink.step(4, "Checking authentication result");
        self.check_result(status, &trace.body)
    }

    async fn fetch_challenge(&self, url: &Url) -> Result<String, AuthError> {
        self.sink.http_request("GET", url.as_str(), None);

        let response = self.transport.get(url.clone()).send().await?;
        let status = HttpStatusCode(response.status().as_u16());
        if response.url() != url {
            self.sink
                .info(&format!("Login page redirected to {}", response.url()));
        }

        let body = response.text().await?;
        self.sink.http_response(status, body.len(), None);

        if body.trim().is_empty() {
            return Err(AuthError::empty_response(url.as_str()));
        }

        if !status.is_success() {
            self.sink.warning(&format!(
                "Login page returned HTTP {status}, trying token extraction anyway"
            ));
        }

        self.sink.info(&format!(
            "Session cookies held for portal: {}",
            self.transport.cookie_count()
        ));

        Ok(body)
    }

    fn extract_token(&self, body: &str) -> Result<ExtractedToken, AuthError> {
        match self.extractor.extract(body) {
            Some(token) => {
                self.sink.info(&format!(
                    "Token found via rule '{}' ({} chars)",
                    token.rule,
                    token.value.len()
                ));
                self.sink
                    .record(Level::Debug, &format!("[TOKEN] {}", token.value));
                Ok(token)
            }
            None => {
                self.sink.warning(&format!(
                    "No token rule matched. Login page preview: {}",
                    preview(body)
                ));
                Err(AuthError::token_not_found(self.extractor.len()))
            }
        }
    }

    async fn submit(
        &self,
        credentials: &Credentials,
        token: &str,
        challenge_url: &Url,
    ) -> Result<(HttpStatusCode, String), AuthError> {
        let submit_url = self.transport.url(&self.endpoint.submit_path)?;
        let form = self.build_form(credentials, token);

        self.sink.http_request(
            "POST",
            submit_url.as_str(),
            Some(&self.masked_parameters(&form)),
        );

        let response = self
            .transport
            .post_form(submit_url, challenge_url, &form)
            .send()
            .await?;
        let status = HttpStatusCode(response.status().as_u16());
        let body = response.text().await?;

        self.sink.http_response(status, body.len(), None);

        Ok((status, body))
    }

    fn check_result(&self, status: HttpStatusCode, body: &str) -> Result<(), AuthError> {
        match self.classifier.check_authentication_success(status, body) {
            Classification::Accepted { indicator } => {
                match indicator {
                    Some(indicator) => self
                        .sink
                        .info(&format!("Success indicator found: '{indicator}'")),
                    None => self
                        .sink
                        .info("No failure indicator found, accepting response"),
                }
                Ok(())
            }
            Classification::Rejected { message, indicator } => {
                if let Some(indicator) = indicator {
                    self.sink
                        .warning(&format!("Failure indicator found: '{indicator}'"));
                }
                self.sink
                    .warning(&format!("Response preview: {}", preview(body)));
                Err(AuthError::rejected(status, message))
            }
            Classification::Unexpected { message } => {
                self.sink.warning(&format!(
                    "Response matched no known indicator. Preview: {}",
                    preview(body)
                ));
                Err(AuthError::unexpected_response(status, message))
            }
        }
    }

    /// Credentials and token first, then the fixed fields in key order.
    fn build_form(&self, credentials: &Credentials, token: &str) -> Vec<(String, String)> {
        let mut form = vec![
            (self.fields.username.clone(), credentials.username.clone()),
            (
                self.fields.password.clone(),
                credentials.password.expose().to_string(),
            ),
            (self.fields.token.clone(), token.to_string()),
        ];

        for (name, value) in &self.endpoint.extra_fields {
            if form.iter().any(|(existing, _)| existing == name) {
                self.sink.warning(&format!(
                    "Ignoring extra field '{name}': it would overwrite a credential field"
                ));
                continue;
            }
            form.push((name.clone(), value.clone()));
        }

        form
    }

    fn masked_parameters(&self, form: &[(String, String)]) -> String {
        form.iter()
            .map(|(name, value)| {
                if *name == self.fields.password {
                    format!("{name}={MASKED_VALUE}")
                } else {
                    format!("{name}={value}")
                }
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}
