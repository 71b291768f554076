//! In-memory transport for tests that count network calls.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

use crate::fetcher::HttpTransport;
use crate::response::FetchResponse;
use crate::{Error, Result};

#[derive(Clone)]
struct StubPage {
    status: u16,
    headers: Vec<(String, String)>,
    chunks: Vec<Bytes>,
    fail_after_chunks: bool,
}

/// Transport that serves canned pages and records every request.
///
/// Unknown addresses fail with a transport error.
#[derive(Default)]
pub struct StubTransport {
    pages: Mutex<HashMap<String, StubPage>>,
    requests: Mutex<Vec<(String, HeaderMap)>>,
    chunks_read: Arc<AtomicUsize>,
}

#[allow(clippy::unwrap_used)]
impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `body` as a single chunk.
    pub fn page(&self, url: &str, status: u16, headers: &[(&str, &str)], body: &str) {
        self.chunked_page(url, status, headers, &[body], false);
    }

    /// Serve `chunks` one by one; optionally end the stream with an error
    /// instead of a clean end.
    pub fn chunked_page(
        &self,
        url: &str,
        status: u16,
        headers: &[(&str, &str)],
        chunks: &[&str],
        fail_after_chunks: bool,
    ) {
        let page = StubPage {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            chunks: chunks
                .iter()
                .filter(|c| !c.is_empty())
                .map(|c| Bytes::copy_from_slice(c.as_bytes()))
                .collect(),
            fail_after_chunks,
        };
        self.pages.lock().unwrap().insert(url.to_string(), page);
    }

    /// Answer `url` with a 302 to `location`.
    pub fn redirect(&self, url: &str, location: &str) {
        self.page(url, 302, &[("location", location)], "");
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Body items handed out across all responses.
    pub fn chunks_read(&self) -> usize {
        self.chunks_read.load(Ordering::SeqCst)
    }

    pub fn last_headers(&self) -> Option<HeaderMap> {
        self.requests.lock().unwrap().last().map(|(_, h)| h.clone())
    }
}

#[async_trait]
#[allow(clippy::unwrap_used)]
impl HttpTransport for StubTransport {
    async fn get(&self, url: &Url, headers: &HeaderMap) -> Result<FetchResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), headers.clone()));

        let page = self
            .pages
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| Error::Transport(format!("connection refused: {url}")))?;

        let mut response_headers = HeaderMap::new();
        for (name, value) in &page.headers {
            response_headers.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }

        let mut items: Vec<Result<Bytes>> = page.chunks.into_iter().map(Ok).collect();
        if page.fail_after_chunks {
            items.push(Err(Error::Transport("stream reset".to_string())));
        }

        let chunks_read = Arc::clone(&self.chunks_read);
        let body = stream::iter(items).inspect(move |_| {
            chunks_read.fetch_add(1, Ordering::SeqCst);
        });

        Ok(FetchResponse::live(
            url.clone(),
            StatusCode::from_u16(page.status).unwrap(),
            response_headers,
            body.boxed(),
        ))
    }
}
