use clap::Parser;
use synod_common::{config::DEFAULT_PORT, ClusterConfig};
use synod_node::{
    cli::{parse_value, Cli, Commands},
    config_summary, ensure_config, logging, propose_with_retry, repl,
    runtime::report,
    select_local, start_udp_node,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::install_panic_hook(&cli.log_dir);

    if let Commands::InitConfig { port, force } = cli.command() {
        if force && cli.config.exists() {
            std::fs::remove_file(&cli.config)?;
        }
        if ensure_config(&cli.config, port)? {
            println!("Sample configuration written to {}", cli.config.display());
        } else {
            println!("{} already exists (use --force to overwrite)", cli.config.display());
        }
        return Ok(());
    }

    ensure_config(&cli.config, DEFAULT_PORT)?;
    let config = ClusterConfig::load_from_file(&cli.config)?;
    let config = select_local(config, cli.node.as_deref(), cli.address)?;

    if let Commands::Status = cli.command() {
        println!("{}", serde_json::to_string_pretty(&config_summary(&config)?)?);
        return Ok(());
    }

    let _guard = logging::init(config.local.as_str(), &cli.log_dir)?;
    info!("--- STARTING PAXOS NODE {} ---", config.local);
    info!("Config: {}", cli.config.display());
    for peer in &config.peers {
        info!("  {} -> {} (id {})", peer.name, peer.address, peer.node_id);
    }
    info!("Quorum: {} of {}", config.quorum_size(), config.peers.len());

    let node = match start_udp_node(config).await {
        Ok(node) => node,
        Err(e) => {
            error!("Failed to start node: {}", e);
            return Err(e.into());
        }
    };

    let outcome: Result<(), Box<dyn std::error::Error>> = match cli.command() {
        Commands::Propose { value, retries } => {
            let value = parse_value(&value);
            let interval = node.config().retry_interval();
            match propose_with_retry(&node, value.clone(), retries, interval).await {
                Ok(decision) => {
                    report(&decision, &value);
                    println!("{}", serde_json::to_string_pretty(&decision)?);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::Run | Commands::Status | Commands::InitConfig { .. } => repl::run_menu(node.clone(), 3).await.map_err(Into::into),
    };

    node.stop().await;
    info!("Node stopped");
    outcome
}
