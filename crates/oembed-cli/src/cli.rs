//! # CLI Structure and Argument Parsing
//!
//! The `oembed` command is a thin front end over the three library operations:
//!
//! ```bash
//! # Which oembed documents does a page advertise?
//! oembed links https://vimeo.com/76979871
//! oembed links https://example.com/post/1 --json
//!
//! # Discover and fetch, preferring JSON, capped at 640px wide
//! oembed get https://example.com/post/1 --format json --maxwidth 640
//!
//! # Fetch a known endpoint directly, with a conditional request
//! oembed fetch 'https://example.com/oembed?url=...' -H 'If-None-Match: "v1"' --include
//! ```
//!
//! Logs go to stderr: warnings by default, everything with `--verbose`, only
//! errors with `--quiet`. The body goes to stdout.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure for the `oembed` command
#[derive(Parser, Clone, Debug)]
#[command(name = "oembed")]
#[command(version)]
#[command(about = "Discover and fetch oembed documents for web pages", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "OEMBED_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Provider list JSON, overriding the configured or built-in one
    #[arg(long, global = true, value_name = "FILE")]
    pub providers: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Print the oembed links discovered for a page
    Links {
        /// Page address
        url: String,

        /// Print links as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Discover a page's oembed endpoint and print the document
    Get {
        /// Page address
        url: String,

        /// Pattern matched against link types, e.g. `json` or `xml`
        #[arg(short, long)]
        format: Option<String>,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// Fetch an oembed endpoint directly and print the document
    Fetch {
        /// Oembed endpoint address
        endpoint: String,

        #[command(flatten)]
        request: RequestArgs,
    },
}

/// Options shared by the commands that fetch an oembed document.
#[derive(Args, Clone, Debug, Default)]
pub struct RequestArgs {
    /// Maximum embed width
    #[arg(long, value_name = "PX")]
    pub maxwidth: Option<u32>,

    /// Maximum embed height
    #[arg(long, value_name = "PX")]
    pub maxheight: Option<u32>,

    /// Extra request header, `Name: value` (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Print the status line and response headers before the body
    #[arg(short, long)]
    pub include: bool,
}
