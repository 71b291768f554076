//! Discovery and retrieval of oembed documents.
//!
//! [`OembedClient`] composes the provider registry, the two TTL caches, the
//! redirect-bounded fetcher and the head-link extractor into the three public
//! operations:
//!
//! - [`OembedClient::discover_links`]: registry, then discovery cache, then
//!   network (`Link` headers first, `<head>` scan second)
//! - [`OembedClient::fetch_oembed`]: oembed cache replay, or a live fetch whose
//!   body is captured into the cache while it streams to the caller
//! - [`OembedClient::get_oembed`]: discovery plus format-based link selection
//!   plus fetch
//!
//! ## Background completion
//!
//! The network part of discovery and the capture of a live oembed body run on
//! spawned tasks. A caller that drops its future, or the body stream it was
//! handed, does not stop the fetch or the cache write.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use oembed_core::{Config, OembedClient, OembedOptions};
//!
//! # async fn run() -> oembed_core::Result<()> {
//! let client = OembedClient::from_config(&Config::load()?)?;
//! let options = OembedOptions::new().format("json").maxwidth(640);
//!
//! let response = client.get_oembed("https://vimeo.com/76979871", &options).await?;
//! let body = response.bytes().await?;
//! println!("{}", String::from_utf8_lossy(&body));
//! # Ok(())
//! # }
//! ```

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::channel::mpsc;
use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{Instrument, debug, info, instrument, warn};
use url::Url;

use crate::cache::{CapturedResponse, DiscoveryCache, OembedCache};
use crate::config::{CacheSettings, Config, FetchSettings};
use crate::extract::extract_head_links;
use crate::fetcher::{HttpTransport, RedirectFetcher, RedirectLimit, ReqwestTransport};
use crate::links::{OembedLink, parse_link_headers};
use crate::providers::ProviderRegistry;
use crate::response::{BodyStream, FetchResponse};
use crate::{Error, Result};

/// Per-request options for oembed retrieval.
#[derive(Debug, Clone, Default)]
pub struct OembedOptions {
    /// Appended to the request as `maxwidth`.
    pub maxwidth: Option<u32>,
    /// Appended to the request as `maxheight`.
    pub maxheight: Option<u32>,
    /// Pattern searched for in each link's MIME type, e.g. `"json"`.
    pub format: Option<String>,
    /// Forwarded verbatim to the oembed endpoint.
    pub headers: HeaderMap,
}

impl OembedOptions {
    /// Options with nothing set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `maxwidth`.
    #[must_use]
    pub const fn maxwidth(mut self, maxwidth: u32) -> Self {
        self.maxwidth = Some(maxwidth);
        self
    }

    /// Set `maxheight`.
    #[must_use]
    pub const fn maxheight(mut self, maxheight: u32) -> Self {
        self.maxheight = Some(maxheight);
        self
    }

    /// Prefer links whose MIME type matches `pattern`.
    #[must_use]
    pub fn format(mut self, pattern: impl Into<String>) -> Self {
        self.format = Some(pattern.into());
        self
    }

    /// Add a header forwarded to the oembed endpoint.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replace all forwarded headers.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Compile [`Self::format`], if set.
    pub fn format_pattern(&self) -> Result<Option<Regex>> {
        self.format
            .as_deref()
            .map(|f| Regex::new(f).map_err(|e| Error::InvalidFormat(format!("'{f}': {e}"))))
            .transpose()
    }

    /// The oembed request address: `endpoint` with `maxwidth` then
    /// `maxheight` appended when set. Also the oembed cache key.
    pub fn request_url(&self, endpoint: &str) -> Result<Url> {
        let mut url = Url::parse(endpoint)?;
        if self.maxwidth.is_some() || self.maxheight.is_some() {
            let mut query = url.query_pairs_mut();
            if let Some(maxwidth) = self.maxwidth {
                query.append_pair("maxwidth", &maxwidth.to_string());
            }
            if let Some(maxheight) = self.maxheight {
                query.append_pair("maxheight", &maxheight.to_string());
            }
        }
        Ok(url)
    }
}

/// Pick the first link whose type matches `format`, else the first link.
pub fn select_link<'a>(links: &'a [OembedLink], format: Option<&Regex>) -> Option<&'a OembedLink> {
    format
        .and_then(|pattern| {
            links
                .iter()
                .find(|link| pattern.is_match(link.link_type.as_mime()))
        })
        .or_else(|| links.first())
}

/// Entry point for oembed discovery and retrieval.
///
/// Cloning is cheap; clones share the caches and the transport.
#[derive(Clone)]
pub struct OembedClient {
    fetcher: RedirectFetcher,
    registry: Arc<ProviderRegistry>,
    discovery_cache: DiscoveryCache,
    oembed_cache: OembedCache,
    discovery_ttl: Duration,
    oembed_ttl: Duration,
    discovery_limit: RedirectLimit,
    oembed_limit: RedirectLimit,
}

impl OembedClient {
    /// Client with default settings, the built-in providers and a reqwest
    /// transport.
    pub fn new() -> Result<Self> {
        Self::from_config(&Config::default())
    }

    /// Client built from configuration, with a reqwest transport.
    ///
    /// Providers come from `[providers].path` when set, otherwise from the
    /// built-in table.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::with_settings(&config.fetch)?);
        let registry = match &config.providers.path {
            Some(path) => ProviderRegistry::load(path)?,
            None => ProviderRegistry::builtin()?,
        };
        Ok(Self::builder(transport)
            .registry(registry)
            .cache_settings(config.cache.clone())
            .fetch_settings(&config.fetch)
            .build())
    }

    /// Start building a client around an explicit transport.
    ///
    /// The builder starts with an empty provider registry, fresh caches and
    /// default settings.
    pub fn builder(transport: Arc<dyn HttpTransport>) -> OembedClientBuilder {
        OembedClientBuilder::new(transport)
    }

    /// The provider registry in use.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// The discovery cache in use.
    #[must_use]
    pub const fn discovery_cache(&self) -> &DiscoveryCache {
        &self.discovery_cache
    }

    /// The oembed cache in use.
    #[must_use]
    pub const fn oembed_cache(&self) -> &OembedCache {
        &self.oembed_cache
    }

    /// Oembed links for `page`.
    ///
    /// Order of sources: the provider registry (never cached, no network),
    /// the discovery cache, then a fetch of the page. From the page, valid
    /// oembed `Link` headers win and the body is not read; otherwise the
    /// `<head>` is scanned. Results from headers or from a closed head are
    /// cached; a truncated or degraded scan is returned but not cached.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] for an unparsable or non-HTTP(S) address
    /// - [`Error::UnexpectedStatus`] when the page is not status 200
    /// - fetch errors from [`RedirectFetcher::fetch`]
    #[instrument(skip_all, fields(url = %page))]
    pub async fn discover_links(&self, page: &str) -> Result<Vec<OembedLink>> {
        if let Some(links) = self.registry.lookup(page) {
            debug!(links = links.len(), "Matched static provider");
            return Ok(links);
        }

        let key = page.to_string();
        if let Some(links) = self.discovery_cache.get(&key).await {
            debug!(links = links.len(), "Discovery cache hit");
            return Ok(links.to_vec());
        }
        debug!("Discovery cache miss");

        let url = Url::parse(page)?;
        let discovery = PageDiscovery {
            fetcher: self.fetcher.clone(),
            cache: self.discovery_cache.clone(),
            ttl: self.discovery_ttl,
            limit: self.discovery_limit,
        };
        run_detached(discovery.run(key, url)).await
    }

    /// Fetch an oembed document from `endpoint`.
    ///
    /// `maxwidth`/`maxheight` are appended to the address (see
    /// [`OembedOptions::request_url`]), which is also the cache key. A cache
    /// hit is replayed with status 200 and the captured headers and bytes,
    /// without any network call. On a miss the endpoint is fetched with the
    /// caller's headers; a 200 body streams to the caller and is captured
    /// into the cache once complete.
    ///
    /// # Errors
    ///
    /// - [`Error::NotModified`] when the endpoint answers 304
    /// - [`Error::NotFound`] for any other non-200 status
    /// - fetch errors from [`RedirectFetcher::fetch`]
    #[instrument(skip_all, fields(url = %endpoint))]
    pub async fn fetch_oembed(
        &self,
        endpoint: &str,
        options: &OembedOptions,
    ) -> Result<FetchResponse> {
        let url = options.request_url(endpoint)?;
        let key = url.to_string();

        if let Some(captured) = self.oembed_cache.get(&key).await {
            debug!(bytes = captured.body.len(), "Oembed cache hit");
            return Ok(FetchResponse::replayed(url, captured.headers, captured.body));
        }
        debug!("Oembed cache miss");

        let capture = OembedCapture {
            fetcher: self.fetcher.clone(),
            cache: self.oembed_cache.clone(),
            ttl: self.oembed_ttl,
            limit: self.oembed_limit,
            headers: options.headers.clone(),
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        tokio::spawn(capture.run(url, key, reply_tx).in_current_span());

        reply_rx
            .await
            .map_err(|_| Error::Transport("Oembed fetch task ended without a response".into()))?
    }

    /// Discover links for `page`, pick one and fetch its oembed document.
    ///
    /// With `options.format` set, the first link whose MIME type matches the
    /// pattern is used; otherwise, or when none matches, the first link.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFormat`] when `options.format` is not a valid pattern
    /// - [`Error::NotFound`] when discovery finds no links
    /// - errors from [`Self::discover_links`] and [`Self::fetch_oembed`]
    #[instrument(skip_all, fields(url = %page))]
    pub async fn get_oembed(&self, page: &str, options: &OembedOptions) -> Result<FetchResponse> {
        let format = options.format_pattern()?;
        let links = self.discover_links(page).await?;

        let link = select_link(&links, format.as_ref())
            .ok_or_else(|| Error::NotFound(format!("No oembed links for '{page}'")))?;
        debug!(href = %link.href, link_type = %link.link_type, "Selected oembed link");

        self.fetch_oembed(link.href.as_str(), options).await
    }
}

/// Builder for [`OembedClient`] with injected collaborators.
pub struct OembedClientBuilder {
    transport: Arc<dyn HttpTransport>,
    registry: ProviderRegistry,
    discovery_cache: DiscoveryCache,
    oembed_cache: OembedCache,
    cache: CacheSettings,
    fetch: FetchSettings,
}

impl OembedClientBuilder {
    fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            registry: ProviderRegistry::empty(),
            discovery_cache: DiscoveryCache::new(),
            oembed_cache: OembedCache::new(),
            cache: CacheSettings::default(),
            fetch: FetchSettings::default(),
        }
    }

    /// Use `registry` for the static fast path.
    #[must_use]
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Share an existing discovery cache.
    #[must_use]
    pub fn discovery_cache(mut self, cache: DiscoveryCache) -> Self {
        self.discovery_cache = cache;
        self
    }

    /// Share an existing oembed cache.
    #[must_use]
    pub fn oembed_cache(mut self, cache: OembedCache) -> Self {
        self.oembed_cache = cache;
        self
    }

    /// Cache lifetimes.
    #[must_use]
    pub fn cache_settings(mut self, settings: CacheSettings) -> Self {
        self.cache = settings;
        self
    }

    /// Redirect limits and ceiling. Timeout and user agent belong to the
    /// transport and are ignored here.
    #[must_use]
    pub fn fetch_settings(mut self, settings: &FetchSettings) -> Self {
        self.fetch = settings.clone();
        self
    }

    /// Finish the client.
    pub fn build(self) -> OembedClient {
        OembedClient {
            fetcher: RedirectFetcher::new(self.transport).with_ceiling(self.fetch.redirect_ceiling),
            registry: Arc::new(self.registry),
            discovery_cache: self.discovery_cache,
            oembed_cache: self.oembed_cache,
            discovery_ttl: self.cache.discovery_ttl(),
            oembed_ttl: self.cache.oembed_ttl(),
            discovery_limit: self.fetch.discovery_limit(),
            oembed_limit: self.fetch.oembed_limit(),
        }
    }
}

/// Await `task` on its own tokio task so it completes even if the caller
/// goes away.
async fn run_detached<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(task.in_current_span())
        .await
        .map_err(|e| Error::Transport(format!("Background task failed: {e}")))?
}

/// The network part of link discovery for one page.
struct PageDiscovery {
    fetcher: RedirectFetcher,
    cache: DiscoveryCache,
    ttl: Duration,
    limit: RedirectLimit,
}

impl PageDiscovery {
    async fn run(self, key: String, url: Url) -> Result<Vec<OembedLink>> {
        let response = self.fetcher.fetch(&url, &HeaderMap::new(), self.limit).await?;
        if response.status() != StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                url: key,
                status: response.status().as_u16(),
            });
        }

        let base = response.url().clone();
        let header_links = parse_link_headers(response.header_values("link"), &base);
        if !header_links.is_empty() {
            debug!(links = header_links.len(), "Using oembed Link headers");
            self.cache
                .set(key, Arc::from(header_links.as_slice()), self.ttl)
                .await;
            return Ok(header_links);
        }

        let scan = extract_head_links(response.into_body_stream(), &base).await;
        if scan.is_complete() {
            self.cache
                .set(key, Arc::from(scan.links.as_slice()), self.ttl)
                .await;
        }
        info!(links = scan.links.len(), complete = scan.is_complete(), "Discovered oembed links");
        Ok(scan.links)
    }
}

/// A live oembed fetch whose body is teed into the oembed cache.
struct OembedCapture {
    fetcher: RedirectFetcher,
    cache: OembedCache,
    ttl: Duration,
    limit: RedirectLimit,
    headers: HeaderMap,
}

impl OembedCapture {
    async fn run(self, url: Url, key: String, reply: oneshot::Sender<Result<FetchResponse>>) {
        let response = match self.fetcher.fetch(&url, &self.headers, self.limit).await {
            Ok(response) => response,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            },
        };

        match response.status() {
            StatusCode::OK => {},
            StatusCode::NOT_MODIFIED => {
                let _ = reply.send(Err(Error::NotModified(key)));
                return;
            },
            status => {
                debug!(status = status.as_u16(), "Oembed endpoint returned no document");
                let _ = reply.send(Err(Error::NotFound(key)));
                return;
            },
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let body = response.into_body_stream();

        let (chunk_tx, chunk_rx) = mpsc::unbounded();
        let live = FetchResponse::live(final_url, StatusCode::OK, headers.clone(), chunk_rx.boxed());
        if reply.send(Ok(live)).is_err() {
            debug!("Caller went away; capturing oembed body anyway");
        }

        self.capture(body, chunk_tx, key, headers).await;
    }

    /// Forward every chunk to the reader while accumulating it. The cache is
    /// written before `chunk_tx` is dropped, so a reader that sees the end of
    /// the body can rely on the entry being present.
    async fn capture(
        self,
        mut body: BodyStream,
        chunk_tx: mpsc::UnboundedSender<Result<Bytes>>,
        key: String,
        headers: HeaderMap,
    ) {
        let mut captured = BytesMut::new();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    captured.extend_from_slice(&bytes);
                    // A closed channel only means the reader stopped listening.
                    let _ = chunk_tx.unbounded_send(Ok(bytes));
                },
                Err(e) => {
                    warn!(url = %key, error = %e, "Oembed body failed; response not cached");
                    let _ = chunk_tx.unbounded_send(Err(e));
                    return;
                },
            }
        }

        let body = captured.freeze();
        debug!(url = %key, bytes = body.len(), "Captured oembed response");
        self.cache
            .set(key, CapturedResponse { headers, body }, self.ttl)
            .await;
    }
}
