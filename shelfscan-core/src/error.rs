use shelfscan_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Catalog request failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Category node is missing required field '{field}': {node}")]
    Schema { field: String, node: String },

    #[error("Failed to store {entity}: {source}")]
    Store {
        entity: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl HarvestError {
    pub fn store(entity: impl Into<String>, source: rusqlite::Error) -> Self {
        HarvestError::Store {
            entity: entity.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;
