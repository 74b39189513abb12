//! Feesweep CLI
//!
//! Issues a fee-bearing token, distributes it, and harvests withheld fees.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feesweep::{commands, config::SweepConfig, keys::Address};

#[derive(Parser)]
#[command(name = "feesweep")]
#[command(about = "Fee-bearing token issuance, distribution, and fee harvesting")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "feesweep.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue the fee-bearing mint
    Issue,

    /// Mint supply and distribute it to holders
    Distribute {
        /// Generate this many throwaway holders instead of the configured ones
        #[arg(long)]
        generate: Option<usize>,
    },

    /// List the accounts carrying withheld fees
    Scan,

    /// Sweep withheld fees into the vault
    Harvest {
        /// Forward the vault balance to this address afterwards
        #[arg(long)]
        forward: Option<Address>,
    },

    /// Run issue, distribute, scan, and harvest in order
    Run {
        /// Use an in-memory ledger instead of the network
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show the recorded workflow state
    Status,

    /// Generate a standalone keypair
    Keygen,

    /// Request dev-network funds
    Airdrop {
        /// Lamports to request
        #[arg(long, default_value_t = 1_000_000_000)]
        lamports: u64,

        /// Recipient; defaults to the configured payer
        #[arg(long)]
        address: Option<Address>,
    },

    /// Validate configuration file
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let mut config = SweepConfig::load(&cli.config)?;
    config.apply_env();

    match cli.command {
        Commands::Issue => commands::issue::run(&config).await,
        Commands::Distribute { generate } => commands::distribute::run(&config, generate).await,
        Commands::Scan => commands::scan::run(&config).await,
        Commands::Harvest { forward } => commands::harvest::run(&config, forward).await,
        Commands::Run { dry_run, yes } => commands::run::run(&config, dry_run, yes).await,
        Commands::Status => commands::status::run(&config).await,
        Commands::Keygen => commands::keygen::run().await,
        Commands::Airdrop { lamports, address } => {
            commands::airdrop::run(&config, lamports, address).await
        }
        Commands::ValidateConfig => {
            let config = SweepConfig::from_file(&cli.config)?;
            config.validate()?;
            println!("Configuration is valid.");
            println!("  Endpoint: {}", config.network.endpoint);
            println!("  Commitment: {}", config.network.commitment);
            println!(
                "  Fee: {} bp, max fee {}",
                config.token.fee_basis_points, config.token.max_fee
            );
            println!("  Decimals: {}", config.token.decimals);
            println!("  State file: {}", config.state_path.display());
            Ok(())
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}
