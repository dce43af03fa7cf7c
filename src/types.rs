// src/types.rs
use std::ops::Deref;

use ethers::abi::AbiEncode;
use ethers::contract::{EthAbiCodec, EthAbiType};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};

use crate::error::KernelAccountError;

/// ERC-4337 (entry point v0.6) user operation.
#[derive(
    Debug, Default, Clone, PartialEq, Eq, EthAbiCodec, EthAbiType, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

/// Packed form used for hashing: dynamic fields are replaced by their hashes
/// and the signature is left out.
#[derive(EthAbiCodec, EthAbiType)]
struct UserOperationNoSignature {
    sender: Address,
    nonce: U256,
    init_code: H256,
    call_data: H256,
    call_gas_limit: U256,
    verification_gas_limit: U256,
    pre_verification_gas: U256,
    max_fee_per_gas: U256,
    max_priority_fee_per_gas: U256,
    paymaster_and_data: H256,
}

impl From<&UserOperation> for UserOperationNoSignature {
    fn from(op: &UserOperation) -> Self {
        Self {
            sender: op.sender,
            nonce: op.nonce,
            init_code: keccak256(op.init_code.deref()).into(),
            call_data: keccak256(op.call_data.deref()).into(),
            call_gas_limit: op.call_gas_limit,
            verification_gas_limit: op.verification_gas_limit,
            pre_verification_gas: op.pre_verification_gas,
            max_fee_per_gas: op.max_fee_per_gas,
            max_priority_fee_per_gas: op.max_priority_fee_per_gas,
            paymaster_and_data: keccak256(op.paymaster_and_data.deref()).into(),
        }
    }
}

impl UserOperation {
    /// Computes the user operation hash the entry point at `entry_point` would
    /// report on chain `chain_id`.
    pub fn hash(&self, entry_point: &Address, chain_id: u64) -> H256 {
        let packed = UserOperationNoSignature::from(self).encode();
        H256::from(keccak256(
            [
                keccak256(packed).to_vec(),
                entry_point.encode(),
                U256::from(chain_id).encode(),
            ]
            .concat(),
        ))
    }

    pub fn with_signature(mut self, signature: Bytes) -> Self {
        self.signature = signature;
        self
    }
}

/// Whether the account contract exists on chain. Starts out `Undetermined`
/// and is resolved at most once per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    #[default]
    Undetermined,
    Deployed,
    NotDeployed,
}

/// Kernel `Operation` enum passed as the last argument of `execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallType {
    Call = 0,
    DelegateCall = 1,
}

impl CallType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for CallType {
    type Error = KernelAccountError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(CallType::Call),
            1 => Ok(CallType::DelegateCall),
            other => Err(KernelAccountError::Decode(format!("unknown call type {other}"))),
        }
    }
}

/// Arguments of a decoded `execute` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteCall {
    pub target: Address,
    pub value: U256,
    pub data: Bytes,
    pub call_type: CallType,
}

/// Input accepted by `signMessage`.
///
/// Strings prefixed with `0x` are treated as hex, any other string is signed
/// as its UTF-8 bytes and raw bytes pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignableMessage {
    Text(String),
    Raw(Bytes),
}

impl SignableMessage {
    pub fn to_bytes(&self) -> Result<Bytes, KernelAccountError> {
        match self {
            SignableMessage::Text(text) => match text.strip_prefix("0x") {
                Some(encoded) => hex::decode(encoded)
                    .map(Bytes::from)
                    .map_err(|e| KernelAccountError::InvalidMessage(e.to_string())),
                None => Ok(Bytes::from(text.as_bytes().to_vec())),
            },
            SignableMessage::Raw(bytes) => Ok(bytes.clone()),
        }
    }
}

impl From<&str> for SignableMessage {
    fn from(text: &str) -> Self {
        SignableMessage::Text(text.to_owned())
    }
}

impl From<String> for SignableMessage {
    fn from(text: String) -> Self {
        SignableMessage::Text(text)
    }
}

impl From<Bytes> for SignableMessage {
    fn from(bytes: Bytes) -> Self {
        SignableMessage::Raw(bytes)
    }
}

impl From<Vec<u8>> for SignableMessage {
    fn from(bytes: Vec<u8>) -> Self {
        SignableMessage::Raw(bytes.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn hex_messages_are_decoded() {
        let msg = SignableMessage::from("0xdeadbeef");
        assert_eq!(msg.to_bytes().unwrap(), Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]));
    }

    #[test]
    fn plain_strings_are_utf8() {
        let msg = SignableMessage::from("hello");
        assert_eq!(msg.to_bytes().unwrap(), Bytes::from(b"hello".to_vec()));
    }

    #[test]
    fn raw_bytes_pass_through() {
        let msg = SignableMessage::from(vec![1u8, 2, 3]);
        assert_eq!(msg.to_bytes().unwrap(), Bytes::from(vec![1u8, 2, 3]));
    }

    #[test]
    fn malformed_hex_is_rejected() {
        let msg = SignableMessage::from("0xzz");
        assert!(matches!(msg.to_bytes(), Err(KernelAccountError::InvalidMessage(_))));
    }

    #[test]
    fn call_type_codes() {
        assert_eq!(CallType::Call.code(), 0);
        assert_eq!(CallType::DelegateCall.code(), 1);
        assert_eq!(CallType::try_from(1).unwrap(), CallType::DelegateCall);
        assert!(CallType::try_from(2).is_err());
    }

    #[test]
    fn user_operations_use_camel_case_on_the_wire() {
        let op = UserOperation { init_code: Bytes::from(vec![0xfa]), ..Default::default() };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["initCode"], "0xfa");
        assert!(json.get("paymasterAndData").is_some());

        let back: UserOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn hash_ignores_signature() {
        let entry_point =
            Address::from_str("0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789").unwrap();
        let op = UserOperation {
            sender: Address::from_low_u64_be(0xabc),
            nonce: U256::from(7),
            call_data: Bytes::from(vec![1, 2, 3]),
            ..Default::default()
        };
        let signed = op.clone().with_signature(Bytes::from(vec![9; 65]));
        assert_eq!(op.hash(&entry_point, 1), signed.hash(&entry_point, 1));
        assert_ne!(op.hash(&entry_point, 1), op.hash(&entry_point, 5));
    }
}
