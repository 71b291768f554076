use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::FetchSettings;
use crate::response::FetchResponse;
use crate::{Error, Result};

/// A single, non-following HTTP GET.
///
/// Implementations must not follow redirects themselves; [`RedirectFetcher`]
/// owns that policy so the limit is enforced identically for every transport.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a GET for `url` with `headers` forwarded verbatim.
    ///
    /// The returned body must be live and not yet drained.
    async fn get(&self, url: &Url, headers: &HeaderMap) -> Result<FetchResponse>;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport with a 30 second timeout and the default user agent.
    pub fn new() -> Result<Self> {
        Self::with_settings(&FetchSettings::default())
    }

    /// Creates a transport from fetch settings.
    pub fn with_settings(settings: &FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::none())
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url, headers: &HeaderMap) -> Result<FetchResponse> {
        let response = self
            .client
            .get(url.clone())
            .headers(headers.clone())
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map_err(Error::Network).boxed();

        Ok(FetchResponse::live(url.clone(), status, headers, body))
    }
}

/// How many 301/302 hops a fetch may follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectLimit {
    /// Follow at most this many redirects; zero fails on the first one.
    Limited(u32),
    /// No caller-imposed limit. The fetcher's safety ceiling still applies.
    Unbounded,
}

impl From<Option<u32>> for RedirectLimit {
    fn from(limit: Option<u32>) -> Self {
        limit.map_or(Self::Unbounded, Self::Limited)
    }
}

/// HTTP(S) GET that follows 301/302 redirects up to a limit.
#[derive(Clone)]
pub struct RedirectFetcher {
    transport: Arc<dyn HttpTransport>,
    ceiling: u32,
}

impl RedirectFetcher {
    /// Default hard ceiling for [`RedirectLimit::Unbounded`] fetches.
    pub const DEFAULT_CEILING: u32 = 20;

    /// Wrap a transport with the default safety ceiling.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            ceiling: Self::DEFAULT_CEILING,
        }
    }

    /// Override the safety ceiling applied to unbounded fetches.
    #[must_use]
    pub const fn with_ceiling(mut self, ceiling: u32) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Fetch `url`, forwarding `headers` to every hop.
    ///
    /// Returns the first response that is not a 301/302, whatever its status;
    /// interpreting that status is the caller's job. The body is live.
    ///
    /// # Errors
    ///
    /// - [`Error::MaxRedirectsExceeded`] when a redirect arrives after the
    ///   limit (or the ceiling, in unbounded mode) is used up
    /// - [`Error::InvalidUrl`] for non-HTTP(S) addresses or a redirect without
    ///   a usable `Location`
    /// - [`Error::Network`]/[`Error::Transport`] when the transport fails
    pub async fn fetch(
        &self,
        url: &Url,
        headers: &HeaderMap,
        limit: RedirectLimit,
    ) -> Result<FetchResponse> {
        ensure_http(url)?;

        let (mut remaining, effective_limit) = match limit {
            RedirectLimit::Limited(n) => (n, n),
            RedirectLimit::Unbounded => (self.ceiling, self.ceiling),
        };
        let mut current = url.clone();

        loop {
            let response = self.transport.get(&current, headers).await?;
            let status = response.status();

            if status != StatusCode::MOVED_PERMANENTLY && status != StatusCode::FOUND {
                info!(url = %current, status = status.as_u16(), "Fetched");
                return Ok(response);
            }

            if remaining == 0 {
                return Err(Error::MaxRedirectsExceeded {
                    url: current.to_string(),
                    limit: effective_limit,
                });
            }
            remaining -= 1;

            let next = redirect_target(&current, response.headers())?;
            debug!(from = %current, to = %next, remaining, "Following redirect");
            current = next;
        }
    }
}

fn ensure_http(url: &Url) -> Result<()> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::InvalidUrl(format!(
            "Unsupported scheme '{other}' in '{url}'"
        ))),
    }
}

/// Resolve the `Location` of a redirect against the address that sent it.
fn redirect_target(current: &Url, headers: &HeaderMap) -> Result<Url> {
    let location = headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::InvalidUrl(format!("Redirect from '{current}' without Location")))?;

    let next = current.join(location.trim())?;
    ensure_http(&next)?;
    Ok(next)
}
