//! HTTP-like capability the pipeline depends on.

use thiserror::Error;

use crate::types::Headers;

/// Access-layer failure for one URI; recorded against every URI that needed it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("connection error: {reason}")]
    Connection { reason: String },

    #[error("too many redirects: {reason}")]
    TooManyRedirects { reason: String },

    #[error("No Memento-Datetime in Response Headers for URI-M {uri}")]
    MissingTimestampHeader { uri: String },

    #[error("transport error: {reason}")]
    Other { reason: String },
}

impl FetchError {
    /// Short machine-readable class of the failure.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection-error",
            Self::TooManyRedirects { .. } => "too-many-redirects",
            Self::MissingTimestampHeader { .. } => "no-timestamp-header",
            Self::Other { .. } => "transport-error",
        }
    }

    /// Text persisted as a memento's error information.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        format!("{}: {self}", self.kind())
    }
}

/// Outcome of a discovery probe (HEAD, redirects followed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResponse {
    /// URI of the last response in the redirect chain.
    pub final_uri: String,
    pub redirected: bool,
    pub headers: Headers,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// Blocking transport shared by every pipeline worker.
///
/// Header names in returned maps are expected in lower case.
pub trait Transport: Send + Sync {
    fn probe(&self, uri: &str) -> Result<ProbeResponse, FetchError>;

    fn fetch(&self, uri: &str) -> Result<FetchResponse, FetchError>;
}

#[cfg(feature = "http")]
pub use reqwest_transport::{ReqwestTransport, ReqwestTransportOptions};

#[cfg(feature = "http")]
mod reqwest_transport {
    use std::time::Duration;

    use reqwest::blocking::{Client, Response};
    use reqwest::redirect::Policy;
    use url::Url;

    use super::{FetchError, FetchResponse, ProbeResponse, Transport};
    use crate::constants::{DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT};
    use crate::types::Headers;

    /// Client settings; retries and backoff are left to the caller's environment.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransportOptions {
        pub user_agent: String,
        pub max_redirects: usize,
        /// `None` disables the request timeout.
        pub timeout: Option<Duration>,
    }

    impl Default for ReqwestTransportOptions {
        fn default() -> Self {
            Self {
                user_agent: DEFAULT_USER_AGENT.to_string(),
                max_redirects: DEFAULT_MAX_REDIRECTS,
                timeout: None,
            }
        }
    }

    impl ReqwestTransportOptions {
        #[must_use]
        pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
            self.user_agent = user_agent.into();
            self
        }

        #[must_use]
        pub fn max_redirects(mut self, max_redirects: usize) -> Self {
            self.max_redirects = max_redirects;
            self
        }

        #[must_use]
        pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
            self.timeout = timeout;
            self
        }
    }

    /// [`Transport`] backed by a blocking `reqwest` client.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Result<Self, FetchError> {
            Self::with_options(&ReqwestTransportOptions::default())
        }

        pub fn with_options(options: &ReqwestTransportOptions) -> Result<Self, FetchError> {
            let client = Client::builder()
                .user_agent(options.user_agent.clone())
                .redirect(Policy::limited(options.max_redirects))
                .timeout(options.timeout)
                .build()
                .map_err(|err| FetchError::Other {
                    reason: format!("failed to build HTTP client: {err}"),
                })?;
            Ok(Self { client })
        }
    }

    fn classify(err: &reqwest::Error) -> FetchError {
        let reason = err.to_string();
        if err.is_redirect() {
            FetchError::TooManyRedirects { reason }
        } else if err.is_connect() || err.is_timeout() {
            FetchError::Connection { reason }
        } else {
            FetchError::Other { reason }
        }
    }

    fn collect_headers(response: &Response) -> Headers {
        response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }

    impl Transport for ReqwestTransport {
        fn probe(&self, uri: &str) -> Result<ProbeResponse, FetchError> {
            let response = self.client.head(uri).send().map_err(|err| classify(&err))?;
            let redirected = Url::parse(uri).is_ok_and(|requested| &requested != response.url());
            Ok(ProbeResponse {
                final_uri: response.url().to_string(),
                redirected,
                headers: collect_headers(&response),
            })
        }

        fn fetch(&self, uri: &str) -> Result<FetchResponse, FetchError> {
            let response = self.client.get(uri).send().map_err(|err| classify(&err))?;
            let status = response.status().as_u16();
            let headers = collect_headers(&response);
            let body = response.bytes().map_err(|err| classify(&err))?.to_vec();
            Ok(FetchResponse {
                status,
                headers,
                body,
            })
        }
    }

}
