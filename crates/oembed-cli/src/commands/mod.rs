//! Command implementations.

mod links;
mod oembed;

pub use links::list_links;
pub use oembed::{fetch_endpoint, get_for_page};
