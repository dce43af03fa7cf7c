// src/owner.rs
use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes};

use crate::error::KernelAccountError;

/// The externally owned key controlling a kernel account.
#[async_trait]
pub trait AccountOwner: Send + Sync {
    async fn get_address(&self) -> Result<Address, KernelAccountError>;

    /// EIP-191 personal signature over `message`.
    async fn sign_message(&self, message: &[u8]) -> Result<Bytes, KernelAccountError>;
}

#[async_trait]
impl AccountOwner for LocalWallet {
    async fn get_address(&self) -> Result<Address, KernelAccountError> {
        Ok(self.address())
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Bytes, KernelAccountError> {
        let signature = Signer::sign_message(self, message)
            .await
            .map_err(|e| KernelAccountError::Signer(e.to_string()))?;
        Ok(Bytes::from(signature.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known anvil/hardhat account #0.
    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[tokio::test]
    async fn local_wallet_signs_recoverable_messages() {
        let wallet: LocalWallet = TEST_KEY.parse().unwrap();
        let sig = AccountOwner::sign_message(&wallet, b"hello").await.unwrap();
        assert_eq!(sig.len(), 65);

        let signature = ethers::types::Signature::try_from(sig.as_ref()).unwrap();
        let recovered = signature.recover(&b"hello"[..]).unwrap();
        assert_eq!(recovered, AccountOwner::get_address(&wallet).await.unwrap());
    }
}
