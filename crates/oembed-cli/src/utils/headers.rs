//! `-H "Name: value"` parsing.

use anyhow::{Context, Result, bail};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Parse curl-style header arguments into a header map, keeping repeats.
pub fn parse_header_args(args: &[String]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for arg in args {
        let Some((name, value)) = arg.split_once(':') else {
            bail!("Invalid header '{arg}': expected 'Name: value'");
        };
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .with_context(|| format!("Invalid header name in '{arg}'"))?;
        let value = HeaderValue::from_str(value.trim())
            .with_context(|| format!("Invalid header value in '{arg}'"))?;
        headers.append(name, value);
    }
    Ok(headers)
}
