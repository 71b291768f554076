//! Helpers shared by the commands.

pub mod headers;
pub mod logging;
