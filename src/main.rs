use clap::Parser;
use log::info;

use std::path::PathBuf;
use std::sync::Arc;

use lattice_node::blockchain::BlockStore;
use lattice_node::config::{Network, NodeConfig};
use lattice_node::node::Node;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "lattice-node", about = "Block-lattice ledger node")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides the network from the configuration file
    #[arg(long, value_enum)]
    network: Option<Network>,

    /// Overrides the UDP listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = Args::parse();
    let mut config = NodeConfig::load(&args.config)?;
    if let Some(network) = args.network {
        config.network = network;
    }
    if let Some(port) = args.port {
        config.listen_port = port;
    }

    let ledger = config.ledger();
    std::fs::create_dir_all(&ledger.path)?;
    let store = Arc::new(BlockStore::open(ledger)?);

    let node = Arc::new(Node::bind(config, store).await?);
    info!("Node bound to {}", node.local_addr()?);

    node.run().await?;
    Ok(())
}
