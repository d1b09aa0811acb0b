use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use chain_crawler::crawler::{CrawlMode, CrawlOptions, Crawler};
use chain_crawler::decoding::EventRegistry;
use chain_crawler::extraction::BlockExtractor;
use chain_crawler::rpc::RpcClient;
use chain_crawler::storage::{FileSink, IngestionSink, S3Sink};
use chain_crawler::types::config::chain::ChainConfig;
use chain_crawler::types::config::crawler::CrawlerConfig;
use chain_crawler::types::config::sink::SinkConfig;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Crawls chain history into NDJSON partitions", long_about = None)]
struct Cli {
    /// Path to the JSON config file
    #[clap(long, env = "CRAWLER_CONFIG", default_value = "config/config.json", global = true)]
    config: PathBuf,

    /// Whether to log in JSON format
    #[clap(long, env, default_value_t = false, global = true)]
    log_json: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a block range, or only the heights touched by the staking contract
    Crawl(CrawlArgs),
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Chain name as configured, e.g. "ethereum"
    #[clap(long)]
    chain: String,

    /// Network name as configured, e.g. "mainnet"
    #[clap(long)]
    network: String,

    /// Highest block to crawl. Defaults to the chain head.
    #[clap(long)]
    start: Option<u64>,

    /// Lowest block to crawl. Defaults to the chain's start_block, or 0.
    #[clap(long)]
    end: Option<u64>,

    /// Only crawl blocks where the staking contract emitted logs
    #[clap(long, default_value_t = false)]
    fork: bool,

    /// Deployment environment selecting the output buckets
    #[clap(long, value_enum, default_value_t = Environment::Dev)]
    env: Environment,

    /// Overrides crawler.batch_size
    #[clap(long)]
    batch_size: Option<u64>,

    /// Overrides crawler.concurrency_limit
    #[clap(long)]
    concurrency: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Environment {
    Dev,
    Prod,
}

impl Environment {
    fn as_str(self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = CrawlerConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    tracing::info!("Loaded config with {} chain(s)", config.chains.len());

    match cli.command {
        Command::Crawl(args) => crawl(&config, args).await,
    }
}

fn init_tracing(log_json: bool) {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_env_filter(filter())
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }
}

async fn crawl(config: &CrawlerConfig, args: CrawlArgs) -> anyhow::Result<()> {
    let chain = config.chain(&args.chain, &args.network)?;
    let buckets = config.buckets(args.env.as_str())?;

    load_required_env_var(chain)?;
    let url = chain.rpc_url()?;
    let client = RpcClient::new(config.rpc.client_config(url))
        .with_context(|| format!("Failed to build RPC client for {}/{}", chain.name, chain.network))?;

    let sink = build_sink(&config.sink).await?;
    let extractor = BlockExtractor::new(
        chain.identity(),
        chain.contract_address,
        Arc::new(EventRegistry::staking_manager()),
    );
    let crawler = Crawler::new(Arc::new(client), sink, extractor, buckets);

    let options = CrawlOptions {
        mode: if args.fork {
            CrawlMode::ForkDiff
        } else {
            CrawlMode::FullRange
        },
        start: args.start,
        floor: args.end.or(chain.start_block).unwrap_or(0),
        batch_size: args.batch_size.unwrap_or(config.crawler.batch_size),
        concurrency_limit: args.concurrency.unwrap_or(config.crawler.concurrency_limit),
        fork_chunk_size: config.crawler.fork_chunk_size,
    };

    let report = crawler
        .run(&options)
        .await
        .with_context(|| format!("Crawl of {}/{} aborted", chain.name, chain.network))?;

    if report.blocks_failed > 0 {
        tracing::warn!(
            "{} blocks failed; re-run the same range to fill them in",
            report.blocks_failed
        );
    }
    Ok(())
}

async fn build_sink(config: &SinkConfig) -> anyhow::Result<Arc<dyn IngestionSink>> {
    match config {
        SinkConfig::S3 {
            region,
            endpoint_url,
        } => {
            tracing::info!("Writing partitions to S3");
            Ok(Arc::new(S3Sink::new(region.clone(), endpoint_url.clone()).await))
        }
        SinkConfig::File { root } => {
            tracing::info!("Writing partitions under {}", root.display());
            std::fs::create_dir_all(root)
                .with_context(|| format!("Failed to create sink root {}", root.display()))?;
            Ok(Arc::new(FileSink::new(root.as_path())))
        }
    }
}

/// Ensures the chain's RPC URL env var is set, loading .env if needed.
fn load_required_env_var(chain: &ChainConfig) -> anyhow::Result<()> {
    let var = chain.rpc_url_env_var.as_str();
    if env::var(var).is_ok() {
        return Ok(());
    }

    dotenvy::dotenv()
        .with_context(|| format!("Missing env var {var} and failed to load .env file"))?;

    anyhow::ensure!(
        env::var(var).is_ok(),
        "Missing required env var after loading .env: {}",
        var
    );
    Ok(())
}
