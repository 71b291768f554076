//! # oembed-core
//!
//! Discovery and cached retrieval of oembed documents for arbitrary web pages.
//!
//! Given only a page address, this crate locates the page's oembed endpoint
//! and fetches the oembed document, caching both steps.
//!
//! ## Architecture
//!
//! - **Provider registry**: pattern-matched shortcuts for known sites, no network
//! - **Redirect fetcher**: HTTP(S) GET over a pluggable transport, following
//!   301/302 up to a limit
//! - **Head-link extractor**: streaming `<link>` scan that stops at `</head>`
//! - **Caches**: page -> links (300s) and oembed request -> captured response (3600s)
//! - **Client**: the `discover_links`/`fetch_oembed`/`get_oembed` operations
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oembed_core::{OembedClient, OembedOptions};
//!
//! # async fn run() -> oembed_core::Result<()> {
//! let client = OembedClient::new()?;
//!
//! for link in client.discover_links("https://example.com/videos/1").await? {
//!     println!("{} {}", link.link_type, link.href);
//! }
//!
//! let response = client
//!     .get_oembed("https://example.com/videos/1", &OembedOptions::new().format("json"))
//!     .await?;
//! println!("{} bytes", response.bytes().await?.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`]:
//!
//! ```rust,no_run
//! use oembed_core::{Error, OembedClient, OembedOptions};
//!
//! # async fn run(client: OembedClient) {
//! match client.get_oembed("https://example.com/", &OembedOptions::new()).await {
//!     Ok(response) => println!("status {}", response.status()),
//!     Err(Error::NotFound(what)) => eprintln!("no oembed: {what}"),
//!     Err(e) if e.is_recoverable() => eprintln!("try again later: {e}"),
//!     Err(e) => eprintln!("{} error: {e}", e.category()),
//! }
//! # }
//! ```

/// In-memory TTL caches
pub mod cache;
/// Discovery and retrieval operations
pub mod client;
/// Configuration loading and defaults
pub mod config;
/// Error types and result aliases
pub mod error;
/// Streaming head-link extraction
pub mod extract;
/// Transports and redirect-bounded fetching
pub mod fetcher;
/// Oembed link types and `Link` header parsing
pub mod links;
/// Static provider registry
pub mod providers;
/// Live and replayed responses
pub mod response;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use cache::{CapturedResponse, DiscoveryCache, OembedCache, TtlCache};
pub use client::{OembedClient, OembedClientBuilder, OembedOptions, select_link};
pub use config::{CacheSettings, Config, FetchSettings, ProviderSettings};
pub use error::{Error, Result};
pub use extract::{HeadScan, HeadScanEnd, extract_head_links};
pub use fetcher::{HttpTransport, RedirectFetcher, RedirectLimit, ReqwestTransport};
pub use links::{OembedLink, OembedType, parse_link_headers};
pub use providers::{ProviderLink, ProviderRegistry, ProviderRule};
pub use response::{BodyStream, FetchResponse, ResponseSource};
