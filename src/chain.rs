// src/chain.rs
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest};

use crate::error::KernelAccountError;

/// Read-only chain access required by the account layer.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Deployed bytecode at `address`, empty if there is none.
    async fn get_code(&self, address: Address) -> Result<Bytes, KernelAccountError>;

    /// `eth_call` against `to` with `data`, returning the raw return data.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, KernelAccountError>;
}

/// [`ChainClient`] backed by an ethers middleware stack.
pub struct ProviderClient<M> {
    client: Arc<M>,
}

impl<M> ProviderClient<M> {
    pub fn new(client: Arc<M>) -> Self {
        Self { client }
    }
}

impl ProviderClient<Provider<Http>> {
    pub fn connect(eth_rpc_url: &str) -> Result<Self, KernelAccountError> {
        let provider = Provider::<Http>::try_from(eth_rpc_url)
            .map_err(|e| KernelAccountError::Provider(e.to_string()))?;
        Ok(Self::new(Arc::new(provider)))
    }
}

impl<M> fmt::Debug for ProviderClient<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainClient for ProviderClient<M> {
    async fn get_code(&self, address: Address) -> Result<Bytes, KernelAccountError> {
        self.client
            .get_code(address, None)
            .await
            .map_err(|e| KernelAccountError::Provider(e.to_string()))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, KernelAccountError> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        self.client
            .call(&tx, None)
            .await
            .map_err(|e| KernelAccountError::Provider(e.to_string()))
    }
}
