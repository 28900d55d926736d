/// Client configuration from `envelope-sync.toml` and environment variables
pub mod client;

pub use client::{ClientConfig, load_client_configuration, load_config};
