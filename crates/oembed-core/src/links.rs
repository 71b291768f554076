//! Oembed link types and `Link` header parsing.
//!
//! A page advertises its oembed resources as alternate links, either in the
//! HTTP response:
//!
//! ```text
//! Link: <https://example.com/oembed?url=...&format=json>; rel="alternate"; type="application/json+oembed"
//! ```
//!
//! or as `<link>` elements inside the document head (see [`crate::extract`]).
//! Both sources are funnelled through the same MIME filter: only the three
//! oembed media types are candidates, everything else is dropped before a link
//! is stored or returned.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use url::Url;

use crate::Error;

/// Relation used for links synthesised by the static provider registry.
pub const ALTERNATE_REL: &str = "alternate";

/// One of the three recognised oembed media types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OembedType {
    /// `application/json+oembed`
    #[serde(rename = "application/json+oembed")]
    Json,
    /// `application/xml+oembed`
    #[serde(rename = "application/xml+oembed")]
    Xml,
    /// `text/xml+oembed`
    #[serde(rename = "text/xml+oembed")]
    TextXml,
}

impl OembedType {
    /// The MIME string for this type.
    #[must_use]
    pub const fn as_mime(self) -> &'static str {
        match self {
            Self::Json => "application/json+oembed",
            Self::Xml => "application/xml+oembed",
            Self::TextXml => "text/xml+oembed",
        }
    }

    /// Parse a MIME string, returning `None` for anything that is not oembed.
    ///
    /// Comparison ignores ASCII case and surrounding whitespace.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim();
        [Self::Json, Self::Xml, Self::TextXml]
            .into_iter()
            .find(|t| t.as_mime().eq_ignore_ascii_case(mime))
    }
}

impl fmt::Display for OembedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

impl FromStr for OembedType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_mime(s).ok_or_else(|| Error::Config(format!("Not an oembed type: {s}")))
    }
}

/// A candidate oembed resource discovered for a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OembedLink {
    /// Absolute address of the oembed document.
    pub href: Url,
    /// Link relation as advertised (normally `alternate`).
    pub rel: String,
    /// Oembed media type of the document.
    #[serde(rename = "type")]
    pub link_type: OembedType,
}

impl OembedLink {
    /// Build a link from raw attribute values, applying the oembed MIME filter.
    ///
    /// `href` is resolved against `base`. Returns `None` when the type is not
    /// an oembed type or the href cannot be resolved.
    #[must_use]
    pub fn from_attributes(href: &str, rel: Option<&str>, mime: &str, base: &Url) -> Option<Self> {
        let link_type = OembedType::from_mime(mime)?;
        let href = match base.join(href.trim()) {
            Ok(url) => url,
            Err(e) => {
                debug!(href = %href, error = %e, "Dropping oembed link with unusable href");
                return None;
            },
        };
        Some(Self {
            href,
            rel: rel.unwrap_or_default().trim().to_string(),
            link_type,
        })
    }
}

/// Parse one or more `Link` header values, keeping only oembed-typed entries.
///
/// Each value may hold several comma-separated links. Commas inside the
/// `<...>` target or inside quoted parameter values do not split entries.
/// Targets are resolved against `base`.
///
/// ```rust
/// use oembed_core::links::{parse_link_headers, OembedType};
/// use url::Url;
///
/// let base = Url::parse("https://example.com/watch/1").unwrap();
/// let links = parse_link_headers(
///     [r#"</oembed?id=1>; rel="alternate"; type="application/json+oembed", </feed>; rel=alternate; type="application/rss+xml""#],
///     &base,
/// );
/// assert_eq!(links.len(), 1);
/// assert_eq!(links[0].href.as_str(), "https://example.com/oembed?id=1");
/// assert_eq!(links[0].link_type, OembedType::Json);
/// ```
pub fn parse_link_headers<'a, I>(values: I, base: &Url) -> Vec<OembedLink>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .flat_map(split_entries)
        .filter_map(|entry| parse_entry(entry, base))
        .collect()
}

/// Split a header value on top-level commas.
fn split_entries(value: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut in_target = false;
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            '<' if !in_quotes => in_target = true,
            '>' if !in_quotes => in_target = false,
            '"' if !in_target => in_quotes = !in_quotes,
            ',' if !in_target && !in_quotes => {
                entries.push(&value[start..i]);
                start = i + 1;
            },
            _ => {},
        }
    }
    entries.push(&value[start..]);
    entries.retain(|e| !e.trim().is_empty());
    entries
}

fn parse_entry(entry: &str, base: &Url) -> Option<OembedLink> {
    let entry = entry.trim();
    let open = entry.find('<')?;
    let close = open + entry[open..].find('>')?;
    let target = &entry[open + 1..close];

    let mut rel = None;
    let mut mime = None;
    for param in split_params(&entry[close + 1..]) {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match name.trim().to_ascii_lowercase().as_str() {
            "rel" if rel.is_none() => rel = Some(value),
            "type" if mime.is_none() => mime = Some(value),
            _ => {},
        }
    }

    OembedLink::from_attributes(target, rel, mime?, base)
}

/// Split link parameters on semicolons that are not inside quotes.
fn split_params(params: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                out.push(&params[start..i]);
                start = i + 1;
            },
            _ => {},
        }
    }
    out.push(&params[start..]);
    out.retain(|p| !p.trim().is_empty());
    out
}
