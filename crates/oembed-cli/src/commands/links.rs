use anyhow::Result;
use oembed_core::{OembedClient, OembedLink};
use std::io::Write;

/// Print the links discovered for `url`, one per line or as JSON.
pub async fn list_links(client: &OembedClient, url: &str, json: bool) -> Result<()> {
    let links = client.discover_links(url).await?;
    let mut out = std::io::stdout().lock();
    write_links(&mut out, &links, json)?;
    out.flush()?;
    Ok(())
}

fn write_links(out: &mut impl Write, links: &[OembedLink], json: bool) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, links)?;
        writeln!(out)?;
    } else if links.is_empty() {
        eprintln!("No oembed links found");
    } else {
        for link in links {
            writeln!(out, "{}\t{}", link.link_type, link.href)?;
        }
    }
    Ok(())
}
