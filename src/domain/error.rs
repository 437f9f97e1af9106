// src/domain/error.rs
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Remote service error: {0}")]
    RemoteError(String),
    #[error("Client has been torn down")]
    ClientClosed,
}
