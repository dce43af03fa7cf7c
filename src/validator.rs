// src/validator.rs
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, Bytes};
use serde::{Deserialize, Serialize};

use crate::error::KernelAccountError;
use crate::owner::AccountOwner;
use crate::types::UserOperation;

/// Kernel validation mode, sent as the 4-byte prefix of a user operation
/// signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorMode {
    Sudo,
    Plugin,
    Enable,
}

impl ValidatorMode {
    pub fn selector(self) -> [u8; 4] {
        match self {
            ValidatorMode::Sudo => [0, 0, 0, 0],
            ValidatorMode::Plugin => [0, 0, 0, 1],
            ValidatorMode::Enable => [0, 0, 0, 2],
        }
    }
}

impl FromStr for ValidatorMode {
    type Err = KernelAccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sudo" => Ok(ValidatorMode::Sudo),
            "plugin" => Ok(ValidatorMode::Plugin),
            "enable" => Ok(ValidatorMode::Enable),
            other => Err(KernelAccountError::Precondition(format!(
                "unknown validator mode {other}"
            ))),
        }
    }
}

/// Signing policy attached to a kernel account.
#[async_trait]
pub trait Validator: Send + Sync {
    fn mode(&self) -> ValidatorMode;

    /// Signature to place in `userOp.signature`.
    async fn get_signature(&self, user_op: &UserOperation) -> Result<Bytes, KernelAccountError>;

    async fn sign_message(&self, message: &[u8]) -> Result<Bytes, KernelAccountError>;
}

/// Validator backed by a single ECDSA owner key.
pub struct EcdsaValidator {
    owner: Arc<dyn AccountOwner>,
    mode: ValidatorMode,
    entry_point: Address,
    chain_id: u64,
}

impl EcdsaValidator {
    pub fn new(
        owner: Arc<dyn AccountOwner>,
        mode: ValidatorMode,
        entry_point: Address,
        chain_id: u64,
    ) -> Self {
        Self { owner, mode, entry_point, chain_id }
    }

    pub fn sudo(owner: Arc<dyn AccountOwner>, entry_point: Address, chain_id: u64) -> Self {
        Self::new(owner, ValidatorMode::Sudo, entry_point, chain_id)
    }
}

impl fmt::Debug for EcdsaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaValidator")
            .field("mode", &self.mode)
            .field("entry_point", &self.entry_point)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

#[async_trait]
impl Validator for EcdsaValidator {
    fn mode(&self) -> ValidatorMode {
        self.mode
    }

    async fn get_signature(&self, user_op: &UserOperation) -> Result<Bytes, KernelAccountError> {
        let hash = user_op.hash(&self.entry_point, self.chain_id);
        let signature = self.owner.sign_message(hash.as_bytes()).await?;

        let mut data = self.mode.selector().to_vec();
        data.extend_from_slice(&signature);
        Ok(Bytes::from(data))
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Bytes, KernelAccountError> {
        self.owner.sign_message(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::{LocalWallet, Signer};
    use ethers::types::{Signature, U256};

    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn validator(mode: ValidatorMode) -> (EcdsaValidator, LocalWallet) {
        let wallet: LocalWallet = TEST_KEY.parse().unwrap();
        let v = EcdsaValidator::new(
            Arc::new(wallet.clone()),
            mode,
            Address::from_low_u64_be(0xe1),
            1337,
        );
        (v, wallet)
    }

    #[test]
    fn modes_parse_from_config_strings() {
        assert_eq!("sudo".parse::<ValidatorMode>().unwrap(), ValidatorMode::Sudo);
        assert_eq!("plugin".parse::<ValidatorMode>().unwrap(), ValidatorMode::Plugin);
        assert!("root".parse::<ValidatorMode>().is_err());
    }

    #[tokio::test]
    async fn user_op_signature_is_mode_prefixed() {
        let (v, wallet) = validator(ValidatorMode::Plugin);
        let op = UserOperation { nonce: U256::from(3), ..Default::default() };

        let sig = v.get_signature(&op).await.unwrap();
        assert_eq!(&sig[..4], &[0, 0, 0, 1]);
        assert_eq!(sig.len(), 4 + 65);

        let hash = op.hash(&Address::from_low_u64_be(0xe1), 1337);
        let recovered = Signature::try_from(&sig[4..]).unwrap().recover(hash.as_bytes()).unwrap();
        assert_eq!(recovered, wallet.address());
    }

    #[tokio::test]
    async fn message_signature_is_unprefixed() {
        let (v, _) = validator(ValidatorMode::Sudo);
        let sig = v.sign_message(b"gm").await.unwrap();
        assert_eq!(sig.len(), 65);
    }
}
