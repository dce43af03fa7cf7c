// src/main.rs
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use jsonrpsee::server::{ServerBuilder, ServerHandle};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use kernel_aa::abi::UnsupportedAbiPolicy;
use kernel_aa::chain::ProviderClient;
use kernel_aa::rpc::{KernelRpcImpl, KernelRpcServer};
use kernel_aa::{EcdsaValidator, KernelAccount, KernelAccountParams, ValidatorMode};

fn parse_address(s: &str) -> Result<Address, String> {
    Address::from_str(s).map_err(|_| format!("String {s} is not a valid address"))
}

fn parse_u256(s: &str) -> Result<U256, String> {
    U256::from_str_radix(s, 10).map_err(|_| format!("String {s} is not a valid U256"))
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(long, env = "RPC_SERVER_ADDR", default_value = "127.0.0.1:8546")]
    rpc_server_addr: String,

    #[clap(long, env = "PRIVATE_KEY")]
    private_key: String,

    #[clap(long, env = "CHAIN_ID")]
    chain_id: u64,

    #[clap(long, env = "ETH_RPC_URL")]
    eth_rpc_url: String,

    #[clap(
        long,
        env = "ENTRY_POINT",
        default_value = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789",
        value_parser = parse_address
    )]
    entry_point: Address,

    #[clap(long, env = "FACTORY", value_parser = parse_address)]
    factory: Address,

    #[clap(long, env = "ACCOUNT_INDEX", default_value = "0", value_parser = parse_u256)]
    index: U256,

    #[clap(long, env = "ACCOUNT_ABI", default_value = "kernel")]
    account_abi: String,

    #[clap(long, env = "FACTORY_ABI", default_value = "ecdsa_kernel_factory")]
    factory_abi: String,

    /// Fail on unknown account/factory ABIs instead of returning `0x`.
    #[clap(long, env = "STRICT_ABI")]
    strict_abi: bool,

    #[clap(long, env = "VALIDATOR_MODE", default_value = "sudo")]
    validator_mode: ValidatorMode,

    /// Use this account address instead of asking the factory.
    #[clap(long, env = "ACCOUNT_ADDRESS", value_parser = parse_address)]
    account_address: Option<Address>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse command line arguments
    let args = Args::parse();

    // Owner key and chain client
    let wallet = args.private_key.parse::<LocalWallet>()?.with_chain_id(args.chain_id);
    info!("Loaded owner {:?}", wallet.address());
    let owner = Arc::new(wallet);

    let chain = ProviderClient::connect(&args.eth_rpc_url)?;
    let validator =
        EcdsaValidator::new(owner.clone(), args.validator_mode, args.entry_point, args.chain_id);

    // Build the account and run the startup checks
    let params = KernelAccountParams {
        owner,
        factory_address: args.factory,
        index: args.index,
        account_abi: args.account_abi,
        factory_abi: Some(args.factory_abi),
        validator,
        entry_point: args.entry_point,
        chain_id: args.chain_id,
        account_address: args.account_address,
        abi_policy: if args.strict_abi {
            UnsupportedAbiPolicy::Strict
        } else {
            UnsupportedAbiPolicy::LegacyEmpty
        },
    };
    let account = KernelAccount::new(chain, params).init_checks().await?;
    info!(
        "Kernel account {:?} ({:?})",
        account.get_address().await?,
        account.base().get_deployment_state().await?
    );

    // Start the JSON-RPC server
    let server_addr: SocketAddr = args.rpc_server_addr.parse()?;
    let kernel_rpc = KernelRpcImpl::new(Arc::new(account));

    info!("Starting kernel account RPC server on {}", server_addr);
    let server_handle = start_server(server_addr, kernel_rpc).await?;

    // Keep the server running until Ctrl+C is pressed
    tokio::signal::ctrl_c().await?;
    server_handle.stop()?;
    info!("Server stopped");

    Ok(())
}

async fn start_server<C, V>(
    server_addr: SocketAddr,
    kernel_rpc: KernelRpcImpl<C, V>,
) -> anyhow::Result<ServerHandle>
where
    C: kernel_aa::chain::ChainClient + 'static,
    V: kernel_aa::Validator + 'static,
{
    let server = ServerBuilder::default().build(server_addr).await?;
    let server_handle = server.start(kernel_rpc.into_rpc());

    Ok(server_handle)
}
