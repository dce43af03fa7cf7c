// src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelAccountError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Unsupported account ABI: {0}")]
    UnsupportedAccountAbi(String),

    #[error("Unsupported factory ABI: {0}")]
    UnsupportedFactoryAbi(String),

    #[error("Failed to decode call data: {0}")]
    Decode(String),

    #[error("Ethereum provider error: {0}")]
    Provider(String),

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}
