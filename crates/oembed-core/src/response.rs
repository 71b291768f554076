//! Response objects shared by live fetches and cache replays.
//!
//! A [`FetchResponse`] looks the same whether its body is still arriving from
//! the network or is being replayed from a captured oembed document, so
//! callers never branch on where the bytes come from.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::fmt;
use url::Url;

use crate::Result;

/// A live, not-yet-drained response body.
///
/// Must be consumed by exactly one reader.
pub type BodyStream = BoxStream<'static, Result<Bytes>>;

/// Where the body of a [`FetchResponse`] comes from.
pub enum ResponseSource {
    /// Bytes still arriving from the transport.
    Live(BodyStream),
    /// Bytes captured earlier and replayed from the oembed cache.
    Replayed(Bytes),
}

impl fmt::Debug for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live(_) => f.write_str("Live(..)"),
            Self::Replayed(bytes) => f.debug_tuple("Replayed").field(&bytes.len()).finish(),
        }
    }
}

/// Status, headers and body of one HTTP response, live or replayed.
#[derive(Debug)]
pub struct FetchResponse {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    source: ResponseSource,
}

impl FetchResponse {
    /// Response whose body is still streaming from the network.
    #[must_use]
    pub fn live(url: Url, status: StatusCode, headers: HeaderMap, body: BodyStream) -> Self {
        Self {
            url,
            status,
            headers,
            source: ResponseSource::Live(body),
        }
    }

    /// Status-200 response that replays previously captured bytes.
    #[must_use]
    pub const fn replayed(url: Url, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            url,
            status: StatusCode::OK,
            headers,
            source: ResponseSource::Replayed(body),
        }
    }

    /// Address that produced this response (after redirects).
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// All values of a header, in order, skipping values that are not UTF-8.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Whether the body is served from the oembed cache.
    #[must_use]
    pub const fn is_replayed(&self) -> bool {
        matches!(self.source, ResponseSource::Replayed(_))
    }

    /// Split off the headers and body source.
    #[must_use]
    pub fn into_parts(self) -> (Url, StatusCode, HeaderMap, ResponseSource) {
        (self.url, self.status, self.headers, self.source)
    }

    /// The body as a lazy chunk stream, regardless of origin.
    ///
    /// A replayed body yields its captured bytes as a single chunk (nothing for
    /// an empty capture) and then ends.
    pub fn into_body_stream(self) -> BodyStream {
        match self.source {
            ResponseSource::Live(body) => body,
            ResponseSource::Replayed(bytes) if bytes.is_empty() => stream::empty().boxed(),
            ResponseSource::Replayed(bytes) => stream::once(async move { Ok(bytes) }).boxed(),
        }
    }

    /// Drain the body into one buffer.
    pub async fn bytes(self) -> Result<Bytes> {
        if let ResponseSource::Replayed(bytes) = self.source {
            return Ok(bytes);
        }
        let mut body = self.into_body_stream();
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}
