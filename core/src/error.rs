use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Storage write failed: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
