pub mod artifact_store;
pub mod http_client;

pub use artifact_store::ArtifactStore;
pub use http_client::HttpServer;
