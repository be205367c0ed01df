//! inkscore Indexer CLI
//!
//! Entry point for the indexer binary. Provides subcommands for:
//! - `run` - Start the indexing service
//! - `migrate` - Run database migrations
//! - `backfill` - Create/cancel/retry/list backfill jobs
//! - `cursor` - Reset a contract's ingestion cursor
//! - `contract` - Register and list contracts
//! - `stats` - Show indexing statistics
//!
//! Exit codes: 0 success, 1 fatal error, 2 invalid arguments.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;

use inkscore_indexer::config::{LoggingSettings, Settings};
use inkscore_indexer::error::AppError;
use inkscore_indexer::ports::{ContractStore, CursorStore, EnrichmentStore, TransactionStore};
use inkscore_indexer::runtime::Runtime;
use inkscore_indexer::types::entities::NewContract;
use inkscore_indexer::types::enums::{ContractStatus, IndexType, JobStatus};
use inkscore_indexer::types::primitives::{BlockNumber, EthAddress};

/// inkscore Transaction Indexer
#[derive(Parser, Debug)]
#[command(name = "inkscore-indexer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Environment name (selects config/{environment}.toml)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the indexing service
    Run,

    /// Run database migrations
    Migrate,

    /// Manage backfill jobs
    Backfill {
        #[command(subcommand)]
        action: BackfillAction,
    },

    /// Manage ingestion cursors
    Cursor {
        #[command(subcommand)]
        action: CursorAction,
    },

    /// Manage registered contracts
    Contract {
        #[command(subcommand)]
        action: ContractAction,
    },

    /// Show indexing statistics
    Stats,

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug)]
enum BackfillAction {
    /// Enqueue a backfill job for a contract
    Create {
        /// Contract address (0x-prefixed hex)
        contract: String,

        /// Inclusive window start (RFC 3339, e.g. 2025-01-01T00:00:00Z)
        #[arg(long)]
        from: Option<String>,

        /// Inclusive window end (RFC 3339)
        #[arg(long)]
        to: Option<String>,

        /// Job priority (1 = highest)
        #[arg(long, default_value_t = 1)]
        priority: i32,
    },

    /// Cancel a pending or processing job
    Cancel {
        /// Job id
        id: i64,
    },

    /// Retry a failed job
    Retry {
        /// Job id
        id: i64,
    },

    /// List jobs, optionally filtered by status
    List {
        /// Status filter (pending, processing, completed, failed, cancelled)
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CursorAction {
    /// Reset a contract's cursor and return it to pending
    Reset {
        /// Contract address (0x-prefixed hex)
        contract: String,
    },
}

#[derive(Subcommand, Debug)]
enum ContractAction {
    /// Register a contract for indexing
    Add {
        /// Contract address (0x-prefixed hex)
        address: String,

        /// Chain id
        #[arg(long, default_value_t = 57073)]
        chain_id: u64,

        /// Index type (count or volume)
        #[arg(long, default_value = "count")]
        index_type: String,

        /// Deployment block (bounds RPC scans)
        #[arg(long)]
        deploy_block: Option<u64>,
    },

    /// List registered contracts
    List,
}

/// CLI failure split by exit code.
enum CliError {
    /// Operator input was invalid (exit 2).
    Usage(String),
    /// Anything else (exit 1).
    Fatal(eyre::Report),
}

impl From<AppError> for CliError {
    fn from(err: AppError) -> Self {
        match &err {
            AppError::Domain(_) => Self::Usage(err.to_string()),
            _ => Self::Fatal(eyre::Report::msg(err.to_string())),
        }
    }
}

impl From<config::ConfigError> for CliError {
    fn from(err: config::ConfigError) -> Self {
        Self::Fatal(eyre::Report::msg(format!("configuration: {err}")))
    }
}

fn parse_address(input: &str) -> Result<EthAddress, CliError> {
    EthAddress::from_hex(input).map_err(|e| CliError::Usage(format!("invalid address: {e}")))
}

fn parse_date(input: &str) -> Result<chrono::DateTime<chrono::Utc>, CliError> {
    input
        .parse()
        .map_err(|e| CliError::Usage(format!("invalid RFC 3339 date '{input}': {e}")))
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional; absence is not an error.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = match Settings::load(&cli.environment) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&settings.logging, cli.verbose);

    match dispatch(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(message)) => {
            eprintln!("Error: {message}");
            ExitCode::from(2)
        }
        Err(CliError::Fatal(report)) => {
            eprintln!("Error: {report}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(logging: &LoggingSettings, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn dispatch(cli: Cli, settings: Settings) -> Result<(), CliError> {
    match cli.command {
        Commands::Version => {
            println!("inkscore-indexer {}", inkscore_indexer::VERSION);
            Ok(())
        }
        Commands::Run => {
            info!(version = inkscore_indexer::VERSION, "Starting inkscore indexer");
            let runtime = Runtime::build(settings).await?;
            runtime.migrate().await?;
            runtime.run().await?;
            Ok(())
        }
        Commands::Migrate => {
            let runtime = Runtime::build(settings).await?;
            runtime.migrate().await?;
            println!("Migrations applied");
            Ok(())
        }
        Commands::Backfill { action } => backfill_command(action, settings).await,
        Commands::Cursor { action } => cursor_command(action, settings).await,
        Commands::Contract { action } => contract_command(action, settings).await,
        Commands::Stats => stats_command(settings).await,
    }
}

async fn backfill_command(action: BackfillAction, settings: Settings) -> Result<(), CliError> {
    let runtime = Runtime::build(settings).await?;
    let queue = runtime.job_queue();

    match action {
        BackfillAction::Create {
            contract,
            from,
            to,
            priority,
        } => {
            let address = parse_address(&contract)?;
            let from = from.as_deref().map(parse_date).transpose()?;
            let to = to.as_deref().map(parse_date).transpose()?;

            let job = queue.enqueue_backfill(&address, from, to, priority).await?;
            println!("Enqueued backfill job {} for {}", job.id, address);
            Ok(())
        }
        BackfillAction::Cancel { id } => {
            let job = queue.cancel(id).await?;
            println!("Job {} is now {}", job.id, job.status);
            Ok(())
        }
        BackfillAction::Retry { id } => {
            let job = queue.retry(id).await?;
            println!("Job {} is now {}", job.id, job.status);
            Ok(())
        }
        BackfillAction::List { status } => {
            let status = status
                .as_deref()
                .map(str::parse::<JobStatus>)
                .transpose()
                .map_err(|e| CliError::Usage(e.to_string()))?;

            let jobs = queue.list(status).await?;
            println!("{:<6} {:<12} {:<10} {:>8} {:>9} ERROR", "ID", "STATUS", "CONTRACT", "PRIO", "PROGRESS");
            for job in jobs {
                println!(
                    "{:<6} {:<12} {:<10} {:>8} {:>8.1}% {}",
                    job.id,
                    job.status,
                    job.contract_id,
                    job.priority,
                    job.payload.progress,
                    job.error_message.as_deref().unwrap_or("-"),
                );
            }
            Ok(())
        }
    }
}

async fn cursor_command(action: CursorAction, settings: Settings) -> Result<(), CliError> {
    let runtime = Runtime::build(settings).await?;
    let store = runtime.store();

    match action {
        CursorAction::Reset { contract } => {
            let address = parse_address(&contract)?;
            CursorStore::reset(store.as_ref(), &address).await?;
            // A reset cursor means a fresh backfill; completion is no
            // longer terminal for this contract.
            ContractStore::set_status(store.as_ref(), &address, ContractStatus::Pending).await?;
            println!("Cursor reset for {address}; contract returned to pending");
            Ok(())
        }
    }
}

async fn contract_command(action: ContractAction, settings: Settings) -> Result<(), CliError> {
    let runtime = Runtime::build(settings).await?;
    let store = runtime.store();

    match action {
        ContractAction::Add {
            address,
            chain_id,
            index_type,
            deploy_block,
        } => {
            let address = parse_address(&address)?;
            let index_type = index_type
                .parse::<IndexType>()
                .map_err(|e| CliError::Usage(e.to_string()))?;

            let id = ContractStore::insert(
                store.as_ref(),
                &NewContract {
                    address,
                    chain_id,
                    deploy_block: deploy_block.map(BlockNumber::new),
                    index_type,
                },
            )
            .await?;
            println!("Registered contract {address} (id {id})");
            Ok(())
        }
        ContractAction::List => {
            let contracts = ContractStore::list(store.as_ref()).await?;
            println!(
                "{:<6} {:<44} {:<10} {:<8} {:>12}",
                "ID", "ADDRESS", "STATUS", "TYPE", "INDEXED"
            );
            for contract in contracts {
                println!(
                    "{:<6} {:<44} {:<10} {:<8} {:>12}",
                    contract.id,
                    contract.address,
                    contract.status,
                    contract.index_type,
                    contract.total_indexed,
                );
            }
            Ok(())
        }
    }
}

async fn stats_command(settings: Settings) -> Result<(), CliError> {
    let runtime = Runtime::build(settings).await?;
    let store = runtime.store();

    let contracts = ContractStore::list(store.as_ref()).await?;
    let mut total_rows = 0u64;
    let mut total_enriched = 0u64;

    println!(
        "{:<44} {:<10} {:>10} {:>10} {:>9}",
        "ADDRESS", "STATUS", "ROWS", "ENRICHED", "PROGRESS"
    );
    for contract in &contracts {
        let rows = TransactionStore::count_for_contract(store.as_ref(), &contract.address).await?;
        let enriched =
            EnrichmentStore::count_for_contract(store.as_ref(), &contract.address).await?;
        total_rows += rows;
        total_enriched += enriched;

        println!(
            "{:<44} {:<10} {:>10} {:>10} {:>8.1}%",
            contract.address, contract.status, rows, enriched, contract.progress_percent,
        );
    }

    println!();
    println!(
        "{} contracts, {} rows, {} enriched, deficit {}",
        contracts.len(),
        total_rows,
        total_enriched,
        total_rows.saturating_sub(total_enriched),
    );
    Ok(())
}
