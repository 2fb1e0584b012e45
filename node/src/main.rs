//! FlightSurety Node Binary

use clap::{Parser, Subcommand};
use flightsurety_core::{NodeConfig, StorageBackend};
use flightsurety_crypto::keys::KeyPair;
use flightsurety_insurance::GenesisConfig;
use flightsurety_node::NodeBuilder;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flightsurety-node")]
#[command(about = "FlightSurety Node - Flight Delay Insurance Ledger")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node
    Run {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Genesis file path
        #[arg(short, long)]
        genesis: Option<PathBuf>,

        /// API listen address
        #[arg(long)]
        api_addr: Option<String>,

        /// Data directory
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Persist the ledger with sled instead of keeping it in memory
        #[arg(long)]
        persistent: bool,

        /// Number of simulated oracles (0 disables the fleet)
        #[arg(long)]
        oracles: Option<usize>,
    },

    /// Generate a new keypair
    Keygen {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate genesis configuration
    Genesis {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Genesis airline address (hex); a fresh keypair is generated if omitted
        #[arg(long)]
        airline: Option<String>,

        /// Genesis airline name
        #[arg(long, default_value = "Genesis Air")]
        name: String,

        /// Funding in whole coins
        #[arg(long, default_value = "10")]
        fund: u64,

        /// Seed flights as NAME:TIMESTAMP_MS
        #[arg(long = "flight")]
        flights: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            genesis,
            api_addr,
            data_dir,
            persistent,
            oracles,
        } => {
            let mut node_config = match config {
                Some(path) => NodeConfig::from_file(&path)?,
                None => NodeConfig::default(),
            };
            if let Some(dir) = data_dir {
                node_config.data_dir = dir;
            }
            if persistent {
                node_config.storage = StorageBackend::Sled;
            }

            init_logging(&node_config.log_level);
            info!("Starting FlightSurety Node...");

            // The node key is the operator and genesis airline unless configured otherwise
            let keypair = load_or_create_keypair(&node_config.data_dir)?;
            if node_config.operator.is_none() {
                node_config.operator = Some(keypair.address().to_hex());
            }

            let genesis_config = match genesis {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)?;
                    GenesisConfig::from_json(&content)?
                }
                None => GenesisConfig::devnet(&keypair.address(), 10),
            };

            let mut builder = NodeBuilder::new()
                .config(node_config)
                .genesis(genesis_config);
            if let Some(addr) = api_addr {
                builder = builder.api_addr(&addr);
            }
            if let Some(count) = oracles {
                builder = builder.oracles(count);
            }

            let node = builder.build()?;
            node.start().await?;
        }

        Commands::Keygen { output } => {
            let keypair = KeyPair::generate();
            let json = serde_json::to_string_pretty(&keypair_json(&keypair))?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &json)?;
                    println!("Keypair saved to: {}", path.display());
                }
                None => {
                    println!("{}", json);
                }
            }
        }

        Commands::Genesis {
            output,
            airline,
            name,
            fund,
            flights,
        } => {
            let address = match airline {
                Some(hex) => flightsurety_core::Address::from_hex(&hex)?,
                None => {
                    let keypair = KeyPair::generate();
                    println!("Generated airline key: {}", hex::encode(keypair.secret_bytes()));
                    keypair.address()
                }
            };

            let mut genesis =
                GenesisConfig::new("FlightSurety Devnet", &address, &name).with_fund(fund);
            for flight in &flights {
                let (flight_name, timestamp) = flight
                    .split_once(':')
                    .ok_or_else(|| anyhow::anyhow!("flight must be NAME:TIMESTAMP_MS: {}", flight))?;
                genesis = genesis.add_flight(flight_name, timestamp.parse()?);
            }

            std::fs::write(&output, genesis.to_json()?)?;
            println!("Genesis configuration saved to: {}", output.display());
        }
    }

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn keypair_json(keypair: &KeyPair) -> serde_json::Value {
    serde_json::json!({
        "public_key": keypair.public_key().to_hex(),
        "address": keypair.address().to_hex(),
        "secret_key": hex::encode(keypair.secret_bytes()),
    })
}

fn load_or_create_keypair(data_dir: &Path) -> anyhow::Result<KeyPair> {
    let key_path = data_dir.join("node_key.json");

    if key_path.exists() {
        let content = std::fs::read_to_string(&key_path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;

        if let Some(secret_hex) = value.get("secret_key").and_then(|v| v.as_str()) {
            let secret_bytes = hex::decode(secret_hex)?;
            let keypair = KeyPair::from_secret_bytes(&secret_bytes)?;
            info!("Loaded keypair from {}", key_path.display());
            return Ok(keypair);
        }
    }

    std::fs::create_dir_all(data_dir)?;

    let keypair = KeyPair::generate();
    std::fs::write(&key_path, serde_json::to_string_pretty(&keypair_json(&keypair))?)?;
    info!("Generated new keypair, saved to {}", key_path.display());

    Ok(keypair)
}
