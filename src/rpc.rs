// src/rpc.rs
use std::sync::Arc;

use ethers::types::{Address, Bytes, H256, U256};
use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::error::{ErrorObject, ErrorObjectOwned};
use tracing::{debug, error};

use crate::chain::ChainClient;
use crate::error::KernelAccountError;
use crate::kernel::KernelAccount;
use crate::types::{DeploymentState, ExecuteCall, UserOperation};
use crate::validator::Validator;

#[rpc(server, namespace = "kernel")]
pub trait KernelRpc {
    /// Address of the managed account, counterfactual if not yet deployed.
    #[method(name = "getAddress")]
    async fn get_address(&self) -> RpcResult<Address>;

    #[method(name = "getInitCode")]
    async fn get_init_code(&self) -> RpcResult<Bytes>;

    #[method(name = "getNonce")]
    async fn get_nonce(&self) -> RpcResult<U256>;

    #[method(name = "getUserOpHash")]
    async fn get_user_op_hash(&self, user_op: UserOperation) -> RpcResult<H256>;

    #[method(name = "deploymentState")]
    async fn deployment_state(&self) -> RpcResult<DeploymentState>;

    #[method(name = "encodeExecute")]
    async fn encode_execute(&self, target: Address, value: U256, data: Bytes) -> RpcResult<Bytes>;

    #[method(name = "encodeExecuteDelegate")]
    async fn encode_execute_delegate(
        &self,
        target: Address,
        value: U256,
        data: Bytes,
    ) -> RpcResult<Bytes>;

    #[method(name = "decodeExecute")]
    async fn decode_execute(&self, data: Bytes) -> RpcResult<ExecuteCall>;

    /// Signs the user operation with the account's validator.
    #[method(name = "signUserOperation")]
    async fn sign_user_operation(&self, user_op: UserOperation) -> RpcResult<UserOperation>;

    /// Signs a hex (`0x`-prefixed) or UTF-8 message.
    #[method(name = "signMessage")]
    async fn sign_message(&self, message: String) -> RpcResult<Bytes>;
}

pub struct KernelRpcImpl<C, V> {
    account: Arc<KernelAccount<C, V>>,
}

impl<C, V> KernelRpcImpl<C, V> {
    pub fn new(account: Arc<KernelAccount<C, V>>) -> Self {
        Self { account }
    }
}

fn to_rpc_error(method: &str, e: KernelAccountError) -> ErrorObjectOwned {
    error!("kernel_{} failed: {}", method, e);
    ErrorObject::owned(-32000, format!("Kernel account error: {}", e), None::<()>)
}

#[async_trait]
impl<C, V> KernelRpcServer for KernelRpcImpl<C, V>
where
    C: ChainClient + 'static,
    V: Validator + 'static,
{
    async fn get_address(&self) -> RpcResult<Address> {
        self.account.get_address().await.map_err(|e| to_rpc_error("getAddress", e))
    }

    async fn get_init_code(&self) -> RpcResult<Bytes> {
        self.account.get_init_code().await.map_err(|e| to_rpc_error("getInitCode", e))
    }

    async fn get_nonce(&self) -> RpcResult<U256> {
        self.account.base().get_nonce().await.map_err(|e| to_rpc_error("getNonce", e))
    }

    async fn get_user_op_hash(&self, user_op: UserOperation) -> RpcResult<H256> {
        self.account
            .base()
            .get_user_op_hash(&user_op)
            .await
            .map_err(|e| to_rpc_error("getUserOpHash", e))
    }

    async fn deployment_state(&self) -> RpcResult<DeploymentState> {
        self.account
            .base()
            .get_deployment_state()
            .await
            .map_err(|e| to_rpc_error("deploymentState", e))
    }

    async fn encode_execute(&self, target: Address, value: U256, data: Bytes) -> RpcResult<Bytes> {
        self.account
            .encode_execute(target, value, data)
            .await
            .map_err(|e| to_rpc_error("encodeExecute", e))
    }

    async fn encode_execute_delegate(
        &self,
        target: Address,
        value: U256,
        data: Bytes,
    ) -> RpcResult<Bytes> {
        self.account
            .encode_execute_delegate(target, value, data)
            .await
            .map_err(|e| to_rpc_error("encodeExecuteDelegate", e))
    }

    async fn decode_execute(&self, data: Bytes) -> RpcResult<ExecuteCall> {
        self.account.decode_execute_delegate(&data).map_err(|e| to_rpc_error("decodeExecute", e))
    }

    async fn sign_user_operation(&self, user_op: UserOperation) -> RpcResult<UserOperation> {
        debug!("Received sign request for sender: {:?}", user_op.sender);
        self.account
            .sign_user_op(user_op)
            .await
            .map_err(|e| to_rpc_error("signUserOperation", e))
    }

    async fn sign_message(&self, message: String) -> RpcResult<Bytes> {
        self.account.sign_message(message).await.map_err(|e| to_rpc_error("signMessage", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helper::{account, kernel_account, MockChain};
    use crate::types::CallType;
    use crate::validator::ValidatorMode;

    fn service(deployed: bool) -> KernelRpcImpl<MockChain, crate::validator::EcdsaValidator> {
        let kernel = kernel_account(MockChain::new(deployed, 9), ValidatorMode::Sudo);
        KernelRpcImpl::new(Arc::new(kernel))
    }

    #[tokio::test]
    async fn exposes_account_state() {
        let rpc = service(true);
        assert_eq!(KernelRpcServer::get_address(&rpc).await.unwrap(), account());
        assert_eq!(KernelRpcServer::get_nonce(&rpc).await.unwrap(), U256::from(9));
        assert_eq!(rpc.deployment_state().await.unwrap(), DeploymentState::Deployed);
    }

    #[tokio::test]
    async fn delegate_encoding_round_trips_over_rpc() {
        let rpc = service(false);
        let data = Bytes::from(vec![1, 2, 3]);
        let encoded =
            KernelRpcServer::encode_execute_delegate(&rpc, account(), U256::one(), data.clone())
                .await
                .unwrap();
        let call = rpc.decode_execute(encoded).await.unwrap();
        assert_eq!(call.call_type, CallType::DelegateCall);
        assert_eq!(call.data, data);
    }

    #[tokio::test]
    async fn errors_map_to_server_error_code() {
        let rpc = service(true);
        let err = KernelRpcServer::sign_message(&rpc, "0xnothex".to_string()).await.unwrap_err();
        assert_eq!(err.code(), -32000);
        assert!(err.message().starts_with("Kernel account error: Invalid message"));
    }
}
