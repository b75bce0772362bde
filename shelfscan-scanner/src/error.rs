use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("JSON decode error for {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ScanError {
    /// Transport or HTTP status failure.
    pub fn is_fetch(&self) -> bool {
        matches!(self, ScanError::HttpError(_) | ScanError::Status { .. })
    }

    /// The remote answered, but not in the shape we expect.
    pub fn is_parse(&self) -> bool {
        matches!(self, ScanError::Json { .. } | ScanError::ParseError(_))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
