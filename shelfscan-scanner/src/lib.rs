pub mod ajax_state;
pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::CatalogClient;
pub use config::ClientConfig;
pub use error::ScanError;
pub use types::{ProductState, ProductStub};
