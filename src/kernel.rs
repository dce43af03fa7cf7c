// src/kernel.rs
use std::sync::Arc;

use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, H256, U256};
use tracing::{debug, warn};

use crate::abi::{AccountAbi, FactoryAbi, UnsupportedAbiPolicy};
use crate::base::BaseAccount;
use crate::chain::ChainClient;
use crate::error::KernelAccountError;
use crate::owner::AccountOwner;
use crate::types::{CallType, ExecuteCall, SignableMessage, UserOperation};
use crate::validator::{Validator, ValidatorMode};

/// Suffix appended to ERC-6492 wrapped signatures.
pub const ERC6492_MAGIC_SUFFIX: [u8; 32] = [
    0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92,
    0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92,
];

/// Construction parameters for a [`KernelAccount`].
pub struct KernelAccountParams<V> {
    pub owner: Arc<dyn AccountOwner>,
    pub factory_address: Address,
    pub index: U256,
    /// Whitelisted account ABI identifier, e.g. `kernel`.
    pub account_abi: String,
    /// Whitelisted factory ABI identifier, e.g. `ecdsa_kernel_factory`.
    pub factory_abi: Option<String>,
    pub validator: V,
    pub entry_point: Address,
    pub chain_id: u64,
    /// Skips counterfactual address resolution when set.
    pub account_address: Option<Address>,
    pub abi_policy: UnsupportedAbiPolicy,
}

/// A kernel smart account: encodes `execute` calls, builds init code and
/// signs through its validator.
pub struct KernelAccount<C, V> {
    base: BaseAccount<C>,
    validator: V,
    account_abi: String,
    factory_abi: Option<String>,
    abi_policy: UnsupportedAbiPolicy,
}

impl<C: ChainClient, V: Validator> KernelAccount<C, V> {
    pub fn new(chain: C, params: KernelAccountParams<V>) -> Self {
        let factory_abi = params.factory_abi.as_deref().and_then(FactoryAbi::lookup);
        let base = BaseAccount::new(
            chain,
            params.owner,
            params.entry_point,
            params.chain_id,
            params.factory_address,
            factory_abi,
            params.index,
            params.account_address,
        );

        Self {
            base,
            validator: params.validator,
            account_abi: params.account_abi,
            factory_abi: params.factory_abi,
            abi_policy: params.abi_policy,
        }
    }

    pub async fn init_checks(mut self) -> Result<Self, KernelAccountError> {
        self.base = self.base.init_checks().await?;
        Ok(self)
    }

    pub fn base(&self) -> &BaseAccount<C> {
        &self.base
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    pub async fn get_address(&self) -> Result<Address, KernelAccountError> {
        self.base.get_address().await
    }

    /// Call data for executing `data` against `target`.
    ///
    /// Restricted validators calling the account itself skip the `execute`
    /// wrapper.
    pub async fn encode_execute(
        &self,
        target: Address,
        value: U256,
        data: Bytes,
    ) -> Result<Bytes, KernelAccountError> {
        let account = self.base.get_address().await?;
        if target == account && self.validator.mode() != ValidatorMode::Sudo {
            return Ok(data);
        }
        self.encode_execute_action(target, value, data, CallType::Call)
    }

    pub async fn encode_execute_delegate(
        &self,
        target: Address,
        value: U256,
        data: Bytes,
    ) -> Result<Bytes, KernelAccountError> {
        self.encode_execute_action(target, value, data, CallType::DelegateCall)
    }

    /// Decodes `execute` call data back into its arguments.
    pub fn decode_execute_delegate(&self, data: &[u8]) -> Result<ExecuteCall, KernelAccountError> {
        let account_abi = AccountAbi::lookup(&self.account_abi)
            .ok_or_else(|| KernelAccountError::UnsupportedAccountAbi(self.account_abi.clone()))?;
        // Decode the operation as a full word: a `u8` target would silently
        // keep only the low byte.
        let (target, value, data, code): (Address, U256, Bytes, U256) = account_abi
            .contract()?
            .decode("execute", data)
            .map_err(|e| KernelAccountError::Decode(e.to_string()))?;
        if code > U256::from(u8::MAX) {
            return Err(KernelAccountError::Decode(format!("call type {code} out of range")));
        }

        let call_type = CallType::try_from(code.low_u32() as u8)?;

        Ok(ExecuteCall { target, value, data, call_type })
    }

    pub fn encode_execute_action(
        &self,
        target: Address,
        value: U256,
        data: Bytes,
        call_type: CallType,
    ) -> Result<Bytes, KernelAccountError> {
        match AccountAbi::lookup(&self.account_abi) {
            Some(account_abi) => account_abi
                .contract()?
                .encode("execute", (target, value, data, call_type.code()))
                .map_err(|e| KernelAccountError::Decode(e.to_string())),
            None => self.unsupported(KernelAccountError::UnsupportedAccountAbi(
                self.account_abi.clone(),
            )),
        }
    }

    pub async fn sign_user_op(&self, user_op: UserOperation) -> Result<UserOperation, KernelAccountError> {
        let signature = self.validator.get_signature(&user_op).await?;
        Ok(user_op.with_signature(signature))
    }

    pub async fn sign_user_op_hash(&self, user_op_hash: H256) -> Result<Bytes, KernelAccountError> {
        self.validator.sign_message(user_op_hash.as_bytes()).await
    }

    /// Signs `message` through the validator. Signatures of accounts that are
    /// not deployed yet are wrapped per ERC-6492.
    pub async fn sign_message(
        &self,
        message: impl Into<SignableMessage>,
    ) -> Result<Bytes, KernelAccountError> {
        // Normalize hex / text input to the bytes the validator signs.
        let message = message.into().to_bytes()?;
        let signature = self.validator.sign_message(&message).await?;

        // Deployed accounts verify through ERC-1271 directly.
        if self.base.is_account_deployed().await? {
            return Ok(signature);
        }

        // abi.encode(factory, factoryCallData, signature) ++ magic suffix
        debug!("Account not deployed, wrapping signature per ERC-6492");
        let factory_call = self.get_factory_account_init_code().await?;
        let mut wrapped = abi::encode(&[
            Token::Address(self.base.factory_address()),
            Token::Bytes(factory_call.to_vec()),
            Token::Bytes(signature.to_vec()),
        ]);
        wrapped.extend_from_slice(&ERC6492_MAGIC_SUFFIX);
        Ok(Bytes::from(wrapped))
    }

    /// Init code for the user operation: empty once the account exists.
    pub async fn get_init_code(&self) -> Result<Bytes, KernelAccountError> {
        if self.base.is_account_deployed().await? {
            return Ok(Bytes::default());
        }
        self.get_account_init_code().await
    }

    pub async fn get_account_init_code(&self) -> Result<Bytes, KernelAccountError> {
        // factory address (20 bytes) followed by the factory call
        let factory_call = self.get_factory_account_init_code().await?;
        let mut init_code = self.base.factory_address().as_bytes().to_vec();
        init_code.extend_from_slice(&factory_call);
        Ok(Bytes::from(init_code))
    }

    pub async fn get_factory_account_init_code(&self) -> Result<Bytes, KernelAccountError> {
        match self.base.factory_abi() {
            Some(factory_abi) => {
                let owner = self.base.owner().get_address().await?;
                factory_abi
                    .contract()?
                    .encode("createAccount", (owner, self.base.index()))
                    .map_err(|e| KernelAccountError::Decode(e.to_string()))
            }
            None => self.unsupported(KernelAccountError::UnsupportedFactoryAbi(
                self.factory_abi.clone().unwrap_or_default(),
            )),
        }
    }

    fn unsupported(&self, err: KernelAccountError) -> Result<Bytes, KernelAccountError> {
        match self.abi_policy {
            UnsupportedAbiPolicy::Strict => Err(err),
            UnsupportedAbiPolicy::LegacyEmpty => {
                warn!("{}, returning empty payload", err);
                Ok(Bytes::default())
            }
        }
    }
}
