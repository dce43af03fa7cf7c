// src/base.rs
use std::sync::Arc;

use ethers::types::{Address, Bytes, H256, U256};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::abi::{self, FactoryAbi};
use crate::chain::ChainClient;
use crate::error::KernelAccountError;
use crate::owner::AccountOwner;
use crate::types::{DeploymentState, UserOperation};

/// Placeholder signature used while estimating gas.
pub const DUMMY_SIGNATURE: &str = "0x4046ab7d9c387d7a5ef5ca0777eded29767fd9863048946d35b3042d2f7458ff7c62ade2903503e15973a63a296313eab15b964a18d79f4b06c8c01c7028143c1c";

/// Smart account state shared by every account flavour: who owns it, which
/// factory deploys it, and how to reach the chain and the entry point.
pub struct BaseAccount<C> {
    chain: C,
    owner: Arc<dyn AccountOwner>,
    entry_point: Address,
    chain_id: u64,
    factory_address: Address,
    factory_abi: Option<FactoryAbi>,
    index: U256,
    account_address: OnceCell<Address>,
    deployment: Mutex<DeploymentState>,
}

impl<C: ChainClient> BaseAccount<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain: C,
        owner: Arc<dyn AccountOwner>,
        entry_point: Address,
        chain_id: u64,
        factory_address: Address,
        factory_abi: Option<FactoryAbi>,
        index: U256,
        account_address: Option<Address>,
    ) -> Self {
        Self {
            chain,
            owner,
            entry_point,
            chain_id,
            factory_address,
            factory_abi,
            index,
            account_address: OnceCell::new_with(account_address),
            deployment: Mutex::new(DeploymentState::Undetermined),
        }
    }

    pub fn owner(&self) -> &Arc<dyn AccountOwner> {
        &self.owner
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn factory_address(&self) -> Address {
        self.factory_address
    }

    pub fn factory_abi(&self) -> Option<FactoryAbi> {
        self.factory_abi
    }

    pub fn index(&self) -> U256 {
        self.index
    }

    /// Verifies the account address resolves and the entry point has code.
    pub async fn init_checks(self) -> Result<Self, KernelAccountError> {
        // 1. Resolve the account address and make sure its code is readable
        let address = self.get_address().await?;
        self.chain.get_code(address).await?;

        // 2. The entry point must be deployed
        let entry_point_code = self.chain.get_code(self.entry_point).await?;
        if entry_point_code.is_empty() {
            return Err(KernelAccountError::Precondition(format!(
                "entryPoint not deployed at {:?}",
                self.entry_point
            )));
        }

        info!("Initialized account {:?} (entry point {:?})", address, self.entry_point);
        Ok(self)
    }

    pub fn get_dummy_signature(&self) -> Bytes {
        DUMMY_SIGNATURE.parse().unwrap_or_default()
    }

    /// Account address: the configured one, or the counterfactual address
    /// reported by the factory for `(owner, index)`.
    pub async fn get_address(&self) -> Result<Address, KernelAccountError> {
        self.account_address
            .get_or_try_init(|| async {
                // Unknown factories cannot be asked for the counterfactual
                // address, whatever the ABI policy; configure the address instead.
                let factory_abi = self.factory_abi.ok_or_else(|| {
                    KernelAccountError::UnsupportedFactoryAbi(
                        "cannot derive account address without a known factory, set account_address"
                            .to_string(),
                    )
                })?;
                let contract = factory_abi.contract()?;
                let owner = self.owner.get_address().await?;
                let data = contract
                    .encode("getAccountAddress", (owner, self.index))
                    .map_err(|e| KernelAccountError::Decode(e.to_string()))?;
                let output = self.chain.call(self.factory_address, data).await?;
                let address: Address = contract
                    .decode_output("getAccountAddress", output)
                    .map_err(|e| KernelAccountError::Decode(e.to_string()))?;
                debug!("Resolved counterfactual address {:?}", address);
                Ok::<_, KernelAccountError>(address)
            })
            .await
            .copied()
    }

    pub async fn get_nonce(&self) -> Result<U256, KernelAccountError> {
        if !self.is_account_deployed().await? {
            return Ok(U256::zero());
        }
        // Nonce key 0: kernel accounts use a single sequential nonce.
        let address = self.get_address().await?;
        let entry_point = abi::entry_point_abi()?;
        let data = entry_point
            .encode("getNonce", (address, U256::zero()))
            .map_err(|e| KernelAccountError::Decode(e.to_string()))?;
        let output = self.chain.call(self.entry_point, data).await?;
        entry_point
            .decode_output("getNonce", output)
            .map_err(|e| KernelAccountError::Decode(e.to_string()))
    }

    /// User operation hash as computed by the entry point contract.
    pub async fn get_user_op_hash(&self, user_op: &UserOperation) -> Result<H256, KernelAccountError> {
        let data = abi::encode_get_user_op_hash(user_op);
        let output = self.chain.call(self.entry_point, data).await?;
        abi::decode_get_user_op_hash(&output)
    }

    pub async fn is_account_deployed(&self) -> Result<bool, KernelAccountError> {
        Ok(self.get_deployment_state().await? == DeploymentState::Deployed)
    }

    /// Resolves the deployment state on first use and caches it. The lock is
    /// held across the probe so concurrent callers share a single query; a
    /// failed probe leaves the state undetermined.
    pub async fn get_deployment_state(&self) -> Result<DeploymentState, KernelAccountError> {
        let mut state = self.deployment.lock().await;
        if *state == DeploymentState::Undetermined {
            let address = self.get_address().await?;
            let code = self.chain.get_code(address).await?;
            *state = if code.is_empty() {
                DeploymentState::NotDeployed
            } else {
                DeploymentState::Deployed
            };
            debug!("Account {:?} deployment state: {:?}", address, *state);
        }
        Ok(*state)
    }
}
