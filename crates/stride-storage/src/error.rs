use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The OS credential store refused or failed the operation.
    #[error("{0}")]
    Platform(String),

    #[error("stored value is unreadable: {0}")]
    Encoding(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("no credential store on {0}")]
    Unsupported(&'static str),
}

pub type StorageResult<T> = Result<T, StorageError>;
