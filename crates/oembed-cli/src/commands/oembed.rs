use anyhow::Result;
use futures::StreamExt;
use oembed_core::{FetchResponse, OembedClient, OembedOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::cli::RequestArgs;
use crate::utils::headers::parse_header_args;

/// Discover the oembed endpoint of `url` and print its document.
pub async fn get_for_page(
    client: &OembedClient,
    url: &str,
    format: Option<String>,
    request: &RequestArgs,
) -> Result<()> {
    let mut options = build_options(request)?;
    options.format = format;
    let response = client.get_oembed(url, &options).await?;
    print_response(response, request.include).await
}

/// Fetch a known oembed endpoint and print the document.
pub async fn fetch_endpoint(
    client: &OembedClient,
    endpoint: &str,
    request: &RequestArgs,
) -> Result<()> {
    let options = build_options(request)?;
    let response = client.fetch_oembed(endpoint, &options).await?;
    print_response(response, request.include).await
}

fn build_options(request: &RequestArgs) -> Result<OembedOptions> {
    Ok(OembedOptions {
        maxwidth: request.maxwidth,
        maxheight: request.maxheight,
        format: None,
        headers: parse_header_args(&request.headers)?,
    })
}

async fn print_response(response: FetchResponse, include: bool) -> Result<()> {
    debug!(url = %response.url(), replayed = response.is_replayed(), "Writing response");
    let mut out = tokio::io::stdout();
    write_response(&mut out, response, include).await?;
    out.flush().await?;
    Ok(())
}

async fn write_response<W>(out: &mut W, response: FetchResponse, include: bool) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if include {
        let mut head = format!("{}\n", response.status());
        for (name, value) in response.headers() {
            head.push_str(&format!("{}: {}\n", name, String::from_utf8_lossy(value.as_bytes())));
        }
        head.push('\n');
        out.write_all(head.as_bytes()).await?;
    }

    let mut body = response.into_body_stream();
    while let Some(chunk) = body.next().await {
        out.write_all(&chunk?).await?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[tokio::test]
    async fn test_include_prints_status_and_headers_first() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        let response = FetchResponse::replayed(
            url::Url::parse("https://example.com/oembed").unwrap(),
            headers,
            "{}".into(),
        );

        let mut out = Vec::new();
        write_response(&mut out, response, true).await.unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "200 OK\ncontent-type: application/json\n\n{}"
        );
    }

    #[test]
    fn test_build_options_carries_dimensions_and_headers() {
        let request = RequestArgs {
            maxwidth: Some(320),
            maxheight: None,
            headers: vec!["X-Trace: 1".to_string()],
            include: false,
        };
        let options = build_options(&request).unwrap();
        assert_eq!(options.maxwidth, Some(320));
        assert_eq!(options.headers.get("x-trace").unwrap(), "1");
        assert!(options.format.is_none());
    }
}
