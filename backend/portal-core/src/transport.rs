//! HTTP transport shared by the login flow and the keep-alive.
//!
//! One `reqwest::Client` and one cookie jar per portal. Clones of
//! [`PortalTransport`] share both, so the cookies set by the challenge page are
//! replayed on the submit and on every keep-alive request. Nothing else in the
//! crate builds a client for portal traffic.

use crate::config::{EndpointConfig, PortalConfig, TransportConfig};
use crate::error::transport::TransportError;

use std::sync::Arc;

use log::debug;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, ORIGIN, PRAGMA, REFERER};
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder};
use url::Url;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";
const NO_CACHE: &str = "no-cache";

#[derive(Clone)]
pub struct PortalTransport {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
}

impl PortalTransport {
    /// # Errors
    ///
    /// Returns [`TransportError`] if the base URL does not parse or the client
    /// cannot be built (e.g. TLS backend initialisation).
    pub fn new(endpoint: &EndpointConfig, transport: &TransportConfig) -> Result<Self, TransportError> {
        let base_url = Url::parse(&endpoint.base_url)?;
        let jar = Arc::new(Jar::default());

        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(Policy::limited(transport.max_redirects))
            .danger_accept_invalid_certs(transport.accept_invalid_certs)
            .timeout(transport.request_timeout())
            .user_agent(transport.user_agent.as_str())
            .build()?;

        debug!(
            "Portal transport ready for {base_url} (invalid certs accepted: {}, max redirects: {}, timeout: {:?})",
            transport.accept_invalid_certs,
            transport.max_redirects,
            transport.request_timeout()
        );

        Ok(Self {
            client,
            jar,
            base_url,
        })
    }

    /// # Errors
    ///
    /// See [`PortalTransport::new`].
    pub fn from_config(config: &PortalConfig) -> Result<Self, TransportError> {
        Self::new(&config.endpoint, &config.transport)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a portal path against the base URL.
    pub fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }

    /// `scheme://host[:port]` of the portal, as sent in `Origin`.
    pub fn origin(&self) -> String {
        self.base_url.origin().ascii_serialization()
    }

    /// Cookie header the jar would send to the portal, if any.
    pub fn cookie_header(&self) -> Option<String> {
        self.jar
            .cookies(&self.base_url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    /// Number of portal cookies currently held.
    pub fn cookie_count(&self) -> usize {
        self.cookie_header()
            .map(|header| header.split(';').filter(|c| !c.trim().is_empty()).count())
            .unwrap_or(0)
    }

    /// Browser-like GET.
    pub(crate) fn get(&self, url: Url) -> RequestBuilder {
        self.client
            .get(url)
            .header(ACCEPT, ACCEPT_HTML)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
            .header(CACHE_CONTROL, NO_CACHE)
            .header(PRAGMA, NO_CACHE)
    }

    /// Form POST carrying same-origin headers pointing back at `referer`.
    pub(crate) fn post_form(
        &self,
        url: Url,
        referer: &Url,
        form: &[(String, String)],
    ) -> RequestBuilder {
        self.client
            .post(url)
            .header(ACCEPT, ACCEPT_HTML)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
            .header(CACHE_CONTROL, NO_CACHE)
            .header(ORIGIN, self.origin())
            .header(REFERER, referer.as_str())
            .form(form)
    }
}
