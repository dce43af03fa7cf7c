// src/abi.rs
//! Whitelisted contract ABIs.
//!
//! Accounts and factories are declared by an identifier string. Only
//! identifiers present in the tables below are encoded for; anything else is
//! handled according to the configured [`UnsupportedAbiPolicy`].

use std::collections::HashMap;

use ethers::abi::{self, parse_abi, ParamType, Token, Tokenizable};
use ethers::contract::BaseContract;
use ethers::types::{Bytes, H256};
use ethers::utils::id;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::KernelAccountError;
use crate::types::UserOperation;

/// Canonical signature of the entry point's `getUserOpHash`. The human
/// readable parser has no syntax for an anonymous tuple argument, so this call
/// is encoded by hand.
pub const GET_USER_OP_HASH_SIGNATURE: &str = "getUserOpHash((address,uint256,bytes,bytes,uint256,uint256,uint256,uint256,uint256,bytes,bytes))";

lazy_static! {
    static ref KERNEL_ACCOUNT_ABI: Result<BaseContract, String> = parse_contract(&[
        "function execute(address to, uint256 value, bytes data, uint8 operation)",
    ]);

    static ref ECDSA_KERNEL_FACTORY_ABI: Result<BaseContract, String> = parse_contract(&[
        "function createAccount(address _owner, uint256 _index) returns (address proxy)",
        "function getAccountAddress(address _owner, uint256 _index) view returns (address)",
    ]);

    static ref ENTRY_POINT_ABI: Result<BaseContract, String> = parse_contract(&[
        "function getNonce(address sender, uint192 key) view returns (uint256 nonce)",
    ]);

    static ref WHITELISTED_KERNEL_ACCOUNTS: HashMap<&'static str, AccountAbi> =
        HashMap::from([("kernel", AccountAbi::Kernel), ("KernelAccountAbi", AccountAbi::Kernel)]);

    static ref WHITELISTED_KERNEL_FACTORIES: HashMap<&'static str, FactoryAbi> = HashMap::from([
        ("ecdsa_kernel_factory", FactoryAbi::EcdsaKernelFactory),
        ("ECDSAKernelFactoryAbi", FactoryAbi::EcdsaKernelFactory),
    ]);
}

fn parse_contract(signatures: &[&str]) -> Result<BaseContract, String> {
    parse_abi(signatures).map(BaseContract::from).map_err(|e| e.to_string())
}

fn loaded(
    contract: &'static Result<BaseContract, String>,
) -> Result<&'static BaseContract, KernelAccountError> {
    contract.as_ref().map_err(|e| KernelAccountError::Decode(format!("invalid abi: {e}")))
}

/// Entry point (v0.6) functions read by the account layer.
pub fn entry_point_abi() -> Result<&'static BaseContract, KernelAccountError> {
    loaded(&*ENTRY_POINT_ABI)
}

/// `getUserOpHash(userOp)` call data: selector followed by the encoded tuple.
pub fn encode_get_user_op_hash(user_op: &UserOperation) -> Bytes {
    let mut data = id(GET_USER_OP_HASH_SIGNATURE).to_vec();
    data.extend(abi::encode(&[user_op.clone().into_token()]));
    Bytes::from(data)
}

pub fn decode_get_user_op_hash(output: &[u8]) -> Result<H256, KernelAccountError> {
    match abi::decode(&[ParamType::FixedBytes(32)], output)
        .map_err(|e| KernelAccountError::Decode(e.to_string()))?
        .as_slice()
    {
        [Token::FixedBytes(hash)] if hash.len() == 32 => Ok(H256::from_slice(hash)),
        other => Err(KernelAccountError::Decode(format!(
            "unexpected getUserOpHash output {other:?}"
        ))),
    }
}

/// Account implementations this crate knows how to encode for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountAbi {
    Kernel,
}

impl AccountAbi {
    pub fn lookup(identifier: &str) -> Option<Self> {
        WHITELISTED_KERNEL_ACCOUNTS.get(identifier).copied()
    }

    pub fn contract(self) -> Result<&'static BaseContract, KernelAccountError> {
        match self {
            AccountAbi::Kernel => loaded(&*KERNEL_ACCOUNT_ABI),
        }
    }
}

/// Account factories this crate knows how to build init code for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryAbi {
    EcdsaKernelFactory,
}

impl FactoryAbi {
    pub fn lookup(identifier: &str) -> Option<Self> {
        WHITELISTED_KERNEL_FACTORIES.get(identifier).copied()
    }

    pub fn contract(self) -> Result<&'static BaseContract, KernelAccountError> {
        match self {
            FactoryAbi::EcdsaKernelFactory => loaded(&*ECDSA_KERNEL_FACTORY_ABI),
        }
    }
}

/// What to do when an account or factory identifier is not whitelisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedAbiPolicy {
    /// Fail with an `Unsupported*Abi` error.
    #[default]
    Strict,
    /// Return an empty payload (`0x`).
    LegacyEmpty,
}
