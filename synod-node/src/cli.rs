use std::{net::IpAddr, path::PathBuf};

use clap::{Parser, Subcommand};
use serde_json::Value;

use synod_common::config::DEFAULT_PORT;

#[derive(Parser, Debug)]
#[command(name = "synod-node")]
#[command(about = "Single-decree Paxos node over UDP")]
pub struct Cli {
    /// Cluster configuration file
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Run as this node (name from the peer table)
    #[arg(short, long, conflicts_with = "address")]
    pub node: Option<String>,

    /// Run as the node configured with this IP address
    #[arg(short, long)]
    pub address: Option<IpAddr>,

    /// Directory for the consensus audit log
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the node with the interactive menu (default)
    Run,
    /// Propose one value, print the outcome and exit
    Propose {
        /// JSON value; anything that does not parse is sent as a string
        value: String,
        #[arg(short, long, default_value_t = 3)]
        retries: u32,
    },
    /// Print the resolved local node, peers and quorum without starting a node
    Status,
    /// Write a sample four-node configuration
    InitConfig {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}

/// Command-line values are JSON when they parse, plain strings otherwise.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
