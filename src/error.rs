use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Schema creation or migration failed; the store must not be used.
    #[error("database initialization failed: {0}")]
    Initialization(String),

    #[error("database query failed: {0}")]
    Query(#[from] tokio_rusqlite::Error),

    /// A domain rule was violated; the caller can correct the input.
    #[error("{0}")]
    Validation(String),

    /// The remote server answered with a non-success status.
    #[error("request failed: HTTP {0}")]
    Network(reqwest::StatusCode),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
