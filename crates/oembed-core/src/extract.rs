//! Streaming extraction of oembed `<link>` elements from a page head.
//!
//! The page body is tokenized incrementally with an async `quick-xml` reader
//! running directly on the live body stream. Nothing beyond the current chunk
//! is buffered, and scanning stops at the first `</head>`: the rest of the
//! body is never pulled from the transport.
//!
//! ## Markup tolerance
//!
//! Pages are uncontrolled web content, so the reader runs with end-name
//! checks disabled, accepts unmatched end tags, and reads attributes with
//! HTML rules (unquoted and valueless attributes). The raw-text elements
//! `<script>`, `<style>` and `<title>` are skipped byte-wise instead of being
//! tokenized, since their contents routinely contain `<`.
//!
//! A tokenizer error does not fail discovery: the scan ends as
//! [`HeadScanEnd::Degraded`] with the links collected so far.

use futures::TryStreamExt;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};
use url::Url;

use crate::links::OembedLink;
use crate::response::BodyStream;

/// Elements whose content is skipped without tokenizing.
const RAW_TEXT_ELEMENTS: [&[u8]; 3] = [b"script", b"style", b"title"];

/// How a head scan finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadScanEnd {
    /// `</head>` was seen; the remaining body was not read.
    HeadClosed,
    /// The body ended without closing the head.
    StreamEnded,
    /// The tokenizer or the body stream failed; links are best-effort.
    Degraded(String),
}

/// Links found in a page head and how the scan ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadScan {
    /// Oembed links in document order.
    pub links: Vec<OembedLink>,
    /// Termination reason.
    pub end: HeadScanEnd,
}

impl HeadScan {
    /// Whether the head section was read through to its closing tag.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.end == HeadScanEnd::HeadClosed
    }
}

/// Scan `body` for oembed `<link>` elements until the head closes.
///
/// Relative `href` values are resolved against `base`. Never fails; see
/// [`HeadScanEnd`] for how the scan ended.
pub async fn extract_head_links(body: BodyStream, base: &Url) -> HeadScan {
    let stream = StreamReader::new(body.map_err(std::io::Error::other));
    let mut reader = Reader::from_reader(stream);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.check_comments = false;

    let mut links = Vec::new();
    let mut buf = Vec::new();

    let end = loop {
        match reader.read_event_into_async(&mut buf).await {
            Ok(Event::Empty(tag)) => collect_link(&tag, base, &mut links),
            Ok(Event::Start(tag)) => {
                collect_link(&tag, base, &mut links);
                let name = tag.name().as_ref().to_ascii_lowercase();
                if RAW_TEXT_ELEMENTS.contains(&name.as_slice()) {
                    match skip_raw_text(reader.get_mut(), &name).await {
                        Ok(true) => {},
                        Ok(false) => break HeadScanEnd::StreamEnded,
                        Err(e) => break HeadScanEnd::Degraded(e.to_string()),
                    }
                }
            },
            Ok(Event::End(tag)) if tag.name().as_ref().eq_ignore_ascii_case(b"head") => {
                break HeadScanEnd::HeadClosed;
            },
            Ok(Event::Eof) => break HeadScanEnd::StreamEnded,
            Ok(_) => {},
            Err(e) => break HeadScanEnd::Degraded(e.to_string()),
        }
        buf.clear();
    };

    match &end {
        HeadScanEnd::Degraded(reason) => {
            warn!(url = %base, reason = %reason, links = links.len(), "Head scan degraded");
        },
        HeadScanEnd::StreamEnded => {
            debug!(url = %base, links = links.len(), "Body ended before </head>");
        },
        HeadScanEnd::HeadClosed => {},
    }

    HeadScan { links, end }
}

fn collect_link(tag: &BytesStart<'_>, base: &Url, links: &mut Vec<OembedLink>) {
    if !tag.name().as_ref().eq_ignore_ascii_case(b"link") {
        return;
    }

    let mut href = None;
    let mut rel = None;
    let mut mime = None;
    for attr in tag.html_attributes().flatten() {
        let value = unescape_lenient(&String::from_utf8_lossy(&attr.value));
        let key = attr.key.as_ref();
        if key.eq_ignore_ascii_case(b"href") {
            href = Some(value);
        } else if key.eq_ignore_ascii_case(b"rel") {
            rel = Some(value);
        } else if key.eq_ignore_ascii_case(b"type") {
            mime = Some(value);
        }
    }

    if let (Some(href), Some(mime)) = (href, mime) {
        if let Some(link) = OembedLink::from_attributes(&href, rel.as_deref(), &mime, base) {
            links.push(link);
        }
    }
}

/// Resolve character references in an attribute value one at a time.
///
/// Bare `&` and unknown entities are kept verbatim: `/o?u=x&amp;a=1&b=2`
/// becomes `/o?u=x&a=1&b=2`.
fn unescape_lenient(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let reference = tail[1..]
            .find(|c: char| c == ';' || c == '&' || c.is_whitespace())
            .filter(|&end| tail.as_bytes()[end + 1] == b';')
            .map(|end| &tail[..end + 2]);
        match reference.and_then(|r| quick_xml::escape::unescape(r).ok().map(|v| (r.len(), v))) {
            Some((len, value)) => {
                out.push_str(&value);
                rest = &tail[len..];
            },
            None => {
                out.push('&');
                rest = &tail[1..];
            },
        }
    }
    out.push_str(rest);
    out
}

/// Consume bytes up to and including the `</name ...>` that closes a raw-text
/// element. `name` must be lowercase. Returns `false` if the input ends first.
async fn skip_raw_text<R>(reader: &mut R, name: &[u8]) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let mut matched = 0;
    let mut closing = false;

    loop {
        let (used, done) = {
            let chunk = reader.fill_buf().await?;
            if chunk.is_empty() {
                return Ok(false);
            }

            let mut found = None;
            for (i, &b) in chunk.iter().enumerate() {
                if closing {
                    if b == b'>' {
                        found = Some(i + 1);
                        break;
                    }
                    continue;
                }
                let expected = if matched < 2 {
                    b"</"[matched]
                } else {
                    name[matched - 2]
                };
                if b.to_ascii_lowercase() == expected {
                    matched += 1;
                    closing = matched == name.len() + 2;
                } else {
                    matched = usize::from(b == b'<');
                }
            }
            found.map_or((chunk.len(), false), |n| (n, true))
        };

        reader.consume(used);
        if done {
            return Ok(true);
        }
    }
}
