// Vidra Infra Backends - HTTP adapters for external generation services

mod config;
mod http;

pub use config::{load_backends_file, BackendEndpointConfig, BackendsFile};
pub use http::HttpBackend;
