// src/test_helper.rs
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::AbiEncode;
use ethers::signers::LocalWallet;
use ethers::types::{Address, Bytes, U256};
use tokio::sync::Mutex;

use crate::abi::UnsupportedAbiPolicy;
use crate::chain::ChainClient;
use crate::error::KernelAccountError;
use crate::kernel::{KernelAccount, KernelAccountParams};
use crate::validator::{EcdsaValidator, ValidatorMode};

pub const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn entry_point() -> Address {
    Address::from_str("0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789").unwrap()
}

pub fn factory() -> Address {
    Address::from_low_u64_be(0xfac7)
}

pub fn account() -> Address {
    Address::from_low_u64_be(0xacc0)
}

pub fn wallet() -> LocalWallet {
    TEST_KEY.parse().unwrap()
}

/// In-memory chain: fixed bytecode per address and canned `eth_call` results
/// keyed by target and selector.
#[derive(Default)]
pub struct MockChain {
    pub code: HashMap<Address, Bytes>,
    pub calls: HashMap<(Address, [u8; 4]), Bytes>,
    pub code_probes: AtomicUsize,
    pub fail_next_probe: AtomicBool,
    /// Every `eth_call` issued, in order.
    pub sent_calls: Mutex<Vec<(Address, Bytes)>>,
}

impl MockChain {
    /// Entry point deployed, factory reports [`account`] for any owner, and
    /// the entry point reports `nonce` for any sender.
    pub fn new(account_deployed: bool, nonce: u64) -> Self {
        let mut chain = MockChain::default();
        chain.code.insert(entry_point(), Bytes::from(vec![0x60, 0x80]));
        if account_deployed {
            chain.code.insert(account(), Bytes::from(vec![0x60, 0x80]));
        }
        chain.calls.insert(
            (factory(), selector("getAccountAddress(address,uint256)")),
            account().encode().into(),
        );
        chain.calls.insert(
            (entry_point(), selector("getNonce(address,uint192)")),
            U256::from(nonce).encode().into(),
        );
        chain
    }

    pub fn probes(&self) -> usize {
        self.code_probes.load(Ordering::SeqCst)
    }
}

pub fn selector(signature: &str) -> [u8; 4] {
    ethers::utils::id(signature)
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_code(&self, address: Address) -> Result<Bytes, KernelAccountError> {
        if address == account() {
            self.code_probes.fetch_add(1, Ordering::SeqCst);
            if self.fail_next_probe.swap(false, Ordering::SeqCst) {
                return Err(KernelAccountError::Provider("connection reset".to_string()));
            }
        }
        Ok(self.code.get(&address).cloned().unwrap_or_default())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, KernelAccountError> {
        self.sent_calls.lock().await.push((to, data.clone()));
        let mut key = [0u8; 4];
        key.copy_from_slice(&data[..4]);
        self.calls
            .get(&(to, key))
            .cloned()
            .ok_or_else(|| KernelAccountError::Provider(format!("execution reverted at {:?}", to)))
    }
}

pub fn params(mode: ValidatorMode) -> KernelAccountParams<EcdsaValidator> {
    let owner = Arc::new(wallet());
    KernelAccountParams {
        owner: owner.clone(),
        factory_address: factory(),
        index: U256::zero(),
        account_abi: "kernel".to_string(),
        factory_abi: Some("ecdsa_kernel_factory".to_string()),
        validator: EcdsaValidator::new(owner, mode, entry_point(), 1337),
        entry_point: entry_point(),
        chain_id: 1337,
        account_address: None,
        abi_policy: UnsupportedAbiPolicy::Strict,
    }
}

pub fn kernel_account(
    chain: MockChain,
    mode: ValidatorMode,
) -> KernelAccount<MockChain, EcdsaValidator> {
    KernelAccount::new(chain, params(mode))
}
