//! CLI command modules.

pub mod analysis;
pub mod http;
pub mod sessions;
pub mod status;
