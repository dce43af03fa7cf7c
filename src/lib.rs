// src/lib.rs
//! Kernel smart account adapter for ERC-4337: init code, `execute` encoding
//! and user operation / message signing.

pub mod abi;
pub mod base;
pub mod chain;
pub mod error;
pub mod kernel;
pub mod owner;
pub mod rpc;
pub mod types;
pub mod validator;

#[cfg(test)]
mod test_helper;

pub use base::BaseAccount;
pub use error::KernelAccountError;
pub use kernel::{KernelAccount, KernelAccountParams};
pub use types::{CallType, DeploymentState, ExecuteCall, SignableMessage, UserOperation};
pub use validator::{EcdsaValidator, Validator, ValidatorMode};
