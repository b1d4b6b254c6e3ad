use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use dapp_pool::{
    fetch_slot0_via_storage, BlockTag, DecimalPrice, PoolPriceState, PoolReader, PoolSnapshot,
    DEFAULT_OUTPUT_DECIMALS, USDC_WETH_005_POOL,
};
use dapp_wallet::{
    apply_event, format_token_amount, is_fake_rich, parse_token_amount, sync_session, Chain,
    ChainClient, ChainWatcher, EventHub, EventKind, MintableToken, Session, SessionState,
    FAKE_RICH_THRESHOLD_TOKENS,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct AppContext {
    rpc_url: Option<String>,
    private_key: Option<String>,
    token_address: Option<String>,
}

impl AppContext {
    fn from_env() -> Self {
        Self {
            rpc_url: std::env::var("DAPP_RPC_URL").ok(),
            private_key: std::env::var("DAPP_PRIVATE_KEY").ok(),
            token_address: std::env::var("DAPP_TOKEN_ADDRESS").ok(),
        }
    }

    fn rpc_url(&self, command: &str) -> Result<&str> {
        self.rpc_url
            .as_deref()
            .ok_or_else(|| eyre!("DAPP_RPC_URL is required for {command} command"))
    }

    fn signer(&self) -> Result<Option<PrivateKeySigner>> {
        self.private_key
            .as_deref()
            .map(|key| {
                key.trim()
                    .parse::<PrivateKeySigner>()
                    .wrap_err("DAPP_PRIVATE_KEY is not a valid hex private key")
            })
            .transpose()
    }

    fn token_address(&self, command: &str) -> Result<Address> {
        let raw = self
            .token_address
            .as_deref()
            .ok_or_else(|| eyre!("DAPP_TOKEN_ADDRESS is required for {command} command"))?;
        raw.trim()
            .parse()
            .wrap_err_with(|| format!("DAPP_TOKEN_ADDRESS {raw:?} is not an address"))
    }

    /// Chain client for read-only commands. A configured signer becomes the account.
    fn chain_client(&self, command: &str) -> Result<ChainClient<impl Provider + Clone>> {
        let rpc_url = self.rpc_url(command)?;
        let provider =
            ProviderBuilder::new().on_http(rpc_url.parse().wrap_err("invalid RPC URL format")?);
        let client = ChainClient::new(provider);
        Ok(match self.signer()? {
            Some(signer) => client.with_signer_address(signer.address()),
            None => client,
        })
    }
}

#[derive(Parser, Debug)]
#[command(name = "pool-dapp")]
#[command(about = "Uniswap V3 pool prices and wallet session tools")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a raw sqrtPriceX96 to a decimal price (no RPC).
    Price(PriceArgs),
    /// Read a pool's slot0, liquidity and tokens, and derive its price.
    Pool(PoolArgs),
    /// Show account, network, latest block and session state.
    Status(StatusArgs),
    /// Follow account and chain changes until Ctrl-C.
    Watch(WatchArgs),
    /// Mint test tokens on Sepolia.
    Mint(MintArgs),
    /// Show test token balances.
    Balance(BalanceArgs),
}

#[derive(Args, Debug)]
struct PriceArgs {
    /// Raw slot0 sqrtPriceX96 (decimal or 0x-hex).
    #[arg(long)]
    sqrt_price_x96: U256,

    #[arg(long)]
    token0_decimals: u8,

    #[arg(long)]
    token1_decimals: u8,

    #[arg(long, default_value_t = DEFAULT_OUTPUT_DECIMALS)]
    output_decimals: u8,

    /// Also print token1 per token0.
    #[arg(long)]
    invert: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
struct PoolArgs {
    #[arg(long, default_value_t = USDC_WETH_005_POOL)]
    pool: Address,

    /// Pin all reads to this block (default: latest).
    #[arg(long)]
    block: Option<u64>,

    #[arg(long, default_value_t = DEFAULT_OUTPUT_DECIMALS)]
    output_decimals: u8,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// Cross-check slot0 against the raw storage word.
    #[arg(long)]
    verify: bool,
}

#[derive(Args, Debug)]
struct StatusArgs {
    /// Network the session expects to be on.
    #[arg(long, default_value = "mainnet")]
    expect_chain: Chain,
}

#[derive(Args, Debug)]
struct WatchArgs {
    #[arg(long, default_value_t = 4)]
    interval_secs: u64,

    #[arg(long, default_value = "mainnet")]
    expect_chain: Chain,
}

#[derive(Args, Debug)]
struct MintArgs {
    /// Recipient (default: the signer).
    #[arg(long)]
    to: Option<Address>,

    /// Whole-token amount, fractional values allowed.
    #[arg(long, default_value = "100")]
    amount: String,
}

#[derive(Args, Debug)]
struct BalanceArgs {
    /// Accounts to query (default: the connected account).
    #[arg(long)]
    account: Vec<Address>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let ctx = AppContext::from_env();

    match cli.command {
        Commands::Price(args) => handle_price(args),
        Commands::Pool(args) => handle_pool(&ctx, args).await,
        Commands::Status(args) => handle_status(&ctx, args).await,
        Commands::Watch(args) => handle_watch(&ctx, args).await,
        Commands::Mint(args) => handle_mint(&ctx, args).await,
        Commands::Balance(args) => handle_balance(&ctx, args).await,
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .wrap_err("failed to create progress style")?,
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn format_timestamp(unix_secs: u64) -> String {
    i64::try_from(unix_secs)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn handle_price(args: PriceArgs) -> Result<()> {
    let state = PoolPriceState::new(
        args.sqrt_price_x96,
        args.token0_decimals,
        args.token1_decimals,
        args.output_decimals,
    );
    let price = state
        .compute()
        .wrap_err("cannot derive a price from these inputs")?;

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["sqrtPriceX96", &state.sqrt_price_x96.to_string()]);
    table.add_row(vec![
        "Decimals (token0 / token1)",
        &format!("{} / {}", state.token0_decimals, state.token1_decimals),
    ]);
    table.add_row(vec!["Raw result", &price.numerator.to_string()]);
    table.add_row(vec!["token0 per token1", &price.to_string()]);
    if args.invert {
        table.add_row(vec!["token1 per token0", &describe_inverse(&price)]);
    }

    println!("\n{}\n", table);
    Ok(())
}

fn describe_inverse(price: &DecimalPrice) -> String {
    match price.inverse() {
        Ok(inverse) => inverse.to_string(),
        Err(e) => format!("n/a ({e})"),
    }
}

async fn handle_pool(ctx: &AppContext, args: PoolArgs) -> Result<()> {
    let rpc_url = ctx.rpc_url("pool")?;
    let provider =
        ProviderBuilder::new().on_http(rpc_url.parse().wrap_err("invalid RPC URL format")?);
    let reader = PoolReader::new(provider, rpc_url);
    let block = BlockTag::from(args.block);

    let snapshot = reader
        .snapshot(args.pool, block)
        .await
        .wrap_err_with(|| format!("failed to read pool {}", args.pool))?;

    let verified = if args.verify {
        let storage = fetch_slot0_via_storage(rpc_url, args.pool, block).await?;
        let matches = storage.sqrt_price_x96 == snapshot.slot0.sqrt_price_x96
            && storage.tick == snapshot.slot0.tick;
        if !matches {
            warn!(
                call_sqrt_price = %snapshot.slot0.sqrt_price_x96,
                storage_sqrt_price = %storage.sqrt_price_x96,
                call_tick = snapshot.slot0.tick,
                storage_tick = storage.tick,
                "slot0() disagrees with storage slot 0"
            );
        }
        Some(matches)
    } else {
        None
    };

    match args.output {
        OutputFormat::Table => print_pool_table(&snapshot, args.output_decimals, verified),
        OutputFormat::Json => print_pool_json(&snapshot, args.output_decimals, verified)?,
    }
    Ok(())
}

fn print_pool_table(snapshot: &PoolSnapshot, output_decimals: u8, verified: Option<bool>) {
    let price = snapshot.price(output_decimals);

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Pool", &snapshot.address.to_string()]);
    table.add_row(vec!["Block", &snapshot.block.to_param()]);
    table.add_row(vec![
        "token0",
        &format!("{} ({} decimals)", snapshot.token0.symbol, snapshot.token0.decimals),
    ]);
    table.add_row(vec![
        "token1",
        &format!("{} ({} decimals)", snapshot.token1.symbol, snapshot.token1.decimals),
    ]);
    table.add_row(vec!["sqrtPriceX96", &snapshot.slot0.sqrt_price_x96.to_string()]);
    table.add_row(vec!["Tick", &snapshot.slot0.tick.to_string()]);
    table.add_row(vec!["Liquidity", &snapshot.liquidity.to_string()]);

    match &price {
        Ok(price) => {
            table.add_row(vec![
                format!("{} per {}", snapshot.token0.symbol, snapshot.token1.symbol),
                price.to_string(),
            ]);
            table.add_row(vec![
                format!("{} per {}", snapshot.token1.symbol, snapshot.token0.symbol),
                describe_inverse(price),
            ]);
        }
        Err(e) => {
            table.add_row(vec!["Price".to_string(), format!("n/a ({e})")]);
        }
    }

    if let Some(matches) = verified {
        let verdict = if matches { "slot0 matches storage" } else { "MISMATCH" };
        table.add_row(vec!["Storage check", verdict]);
    }

    println!("\n{}\n", table);
}

fn print_pool_json(snapshot: &PoolSnapshot, output_decimals: u8, verified: Option<bool>) -> Result<()> {
    use serde::Serialize;

    #[derive(Serialize)]
    struct JsonPool {
        pool: String,
        block: String,
        token0: JsonToken,
        token1: JsonToken,
        sqrt_price_x96: String,
        tick: i32,
        liquidity: String,
        price: Option<String>,
        inverse_price: Option<String>,
        price_error: Option<String>,
        storage_verified: Option<bool>,
    }

    #[derive(Serialize)]
    struct JsonToken {
        address: String,
        symbol: String,
        decimals: u8,
    }

    let token = |info: &dapp_pool::TokenInfo| JsonToken {
        address: info.address.to_string(),
        symbol: info.symbol.clone(),
        decimals: info.decimals,
    };

    let (price, inverse_price, price_error) = match snapshot.price(output_decimals) {
        Ok(price) => (
            Some(price.to_string()),
            price.inverse().ok().map(|inverse| inverse.to_string()),
            None,
        ),
        Err(e) => (None, None, Some(e.to_string())),
    };

    let output = JsonPool {
        pool: snapshot.address.to_string(),
        block: snapshot.block.to_param(),
        token0: token(&snapshot.token0),
        token1: token(&snapshot.token1),
        sqrt_price_x96: snapshot.slot0.sqrt_price_x96.to_string(),
        tick: snapshot.slot0.tick,
        liquidity: snapshot.liquidity.to_string(),
        price,
        inverse_price,
        price_error,
        storage_verified: verified,
    };

    let json_str = serde_json::to_string_pretty(&output).wrap_err("failed to serialize JSON")?;
    println!("{}", json_str);
    Ok(())
}

async fn handle_status(ctx: &AppContext, args: StatusArgs) -> Result<()> {
    let client = ctx.chain_client("status")?;
    let mut session = Session::new(args.expect_chain);
    sync_session(&mut session, &client).await;

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Session", session.state().label()]);
    table.add_row(vec!["Expected Network", &args.expect_chain.to_string()]);

    if session.state().is_connected() {
        let summary = client.account_summary().await?;
        table.add_row(vec!["Account", &summary.account.to_string()]);
        table.add_row(vec!["Network", &summary.chain.to_string()]);
        table.add_row(vec!["Block", &summary.block_number.to_string()]);
        table.add_row(vec!["Block Time", &format_timestamp(summary.block_timestamp)]);
        table.add_row(vec![
            "Balance (ETH)",
            &format_token_amount(summary.balance_wei, 18)?,
        ]);
        if let Some(faucet) = summary.chain.faucet_url() {
            table.add_row(vec!["Faucet", faucet]);
        }
    } else {
        table.add_row(vec!["Account", "not connected"]);
    }

    println!("\n{}\n", table);

    if let SessionState::WrongNetwork { chain_id, .. } = session.state() {
        println!(
            "Connected to {} but expected {}. Switch the wallet to chain {}.\n",
            Chain::from_id(*chain_id),
            args.expect_chain,
            args.expect_chain.hex_id()
        );
    }

    info!(state = session.state().label(), "status complete");
    Ok(())
}

async fn handle_watch(ctx: &AppContext, args: WatchArgs) -> Result<()> {
    if args.interval_secs == 0 {
        bail!("--interval-secs must be at least 1");
    }

    let client = ctx.chain_client("watch")?;
    let mut session = Session::new(args.expect_chain);
    sync_session(&mut session, &client).await;
    info!(
        state = session.state().label(),
        account = ?session.state().account(),
        "watching for account and chain changes (Ctrl-C to stop)"
    );

    let hub = EventHub::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let subscriptions: Vec<_> = [EventKind::AccountsChanged, EventKind::ChainChanged]
        .into_iter()
        .map(|kind| {
            let tx = tx.clone();
            hub.subscribe(kind, move |event| {
                // The receiver only goes away at shutdown.
                let _ = tx.send(event.clone());
            })
        })
        .collect();
    drop(tx);

    let mut watcher = ChainWatcher::new(client.clone());
    let interval = Duration::from_secs(args.interval_secs);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    let watch = async {
        watcher.run(&hub, interval, shutdown).await;
        drop(subscriptions);
    };
    let apply = async {
        while let Some(event) = rx.recv().await {
            let changed = apply_event(&mut session, event, &client).await;
            if let Some(SessionState::WrongNetwork { chain_id, .. }) = changed {
                warn!(
                    chain_id = *chain_id,
                    expected = args.expect_chain.id(),
                    "wallet is on the wrong network"
                );
            }
        }
    };
    tokio::join!(watch, apply);

    info!(state = session.state().label(), "watch stopped");
    Ok(())
}

async fn handle_mint(ctx: &AppContext, args: MintArgs) -> Result<()> {
    let rpc_url = ctx.rpc_url("mint")?;
    let signer = ctx
        .signer()?
        .ok_or_else(|| eyre!("DAPP_PRIVATE_KEY is required for mint command"))?;
    let token_address = ctx.token_address("mint")?;
    let signer_address = signer.address();

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .on_http(rpc_url.parse().wrap_err("invalid RPC URL format")?);

    let chain_id = provider
        .get_chain_id()
        .await
        .wrap_err("eth_chainId failed")?;
    let chain = Chain::from_id(chain_id);
    if chain != Chain::Sepolia {
        bail!(
            "mint only runs on {}; the node is on {}",
            Chain::Sepolia,
            chain
        );
    }

    let token = MintableToken::new(token_address, provider);
    let decimals = token.decimals_or_default().await;
    let amount = parse_token_amount(&args.amount, decimals)?;
    let to = args.to.unwrap_or(signer_address);

    let pb = spinner("Minting...")?;
    let minted = token.mint(to, amount).await;
    pb.finish_and_clear();
    let handle = minted?;

    let balance = token.balance_of(to).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Transaction", &handle.hash.to_string()]);
    table.add_row(vec![
        "Block",
        &handle
            .block_number
            .map_or_else(|| "pending".to_string(), |n| n.to_string()),
    ]);
    table.add_row(vec!["Gas Used", &handle.gas_used.to_string()]);
    table.add_row(vec!["Minted", &format_token_amount(amount, decimals)?]);
    table.add_row(vec!["Recipient", &to.to_string()]);
    table.add_row(vec!["New Balance", &format_token_amount(balance, decimals)?]);

    println!("\n{}\n", table);
    if is_fake_rich(balance, decimals) {
        println!("You are fake rich!\n");
    }
    Ok(())
}

async fn handle_balance(ctx: &AppContext, args: BalanceArgs) -> Result<()> {
    let token_address = ctx.token_address("balance")?;
    let client = ctx.chain_client("balance")?;

    let accounts = if args.account.is_empty() {
        let accounts = client.accounts().await?;
        let first = accounts
            .first()
            .copied()
            .ok_or_else(|| eyre!("no connected account; pass --account or set DAPP_PRIVATE_KEY"))?;
        vec![first]
    } else {
        args.account
    };

    let token = MintableToken::new(token_address, client.provider().clone());
    let decimals = token.decimals_or_default().await;
    let balances = futures::future::try_join_all(
        accounts.iter().map(|account| token.balance_of(*account)),
    )
    .await?;

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Account", "Balance", "Note"]);
    for (account, balance) in accounts.iter().zip(&balances) {
        let note = if is_fake_rich(*balance, decimals) {
            "You are fake rich!".to_string()
        } else {
            String::new()
        };
        table.add_row(vec![
            account.to_string(),
            format_token_amount(*balance, decimals)?,
            note,
        ]);
    }

    println!("\n{}\n", table);
    info!(
        token = %token_address,
        accounts = accounts.len(),
        threshold_tokens = FAKE_RICH_THRESHOLD_TOKENS,
        "balances read"
    );
    Ok(())
}
