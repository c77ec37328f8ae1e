//! Interactive menu for a running node.

use std::{sync::Arc, time::Duration};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use synod_consensus::PaxosNode;

use crate::{
    cli::parse_value,
    runtime::{propose_with_retry, report},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    Propose(String),
    Status,
    Learned,
    QuickTest,
    Exit,
    Unknown(String),
}

/// `1 hello`, `propose hello`, `2`, `status`... Bare `1` asks for the value separately.
pub fn parse_choice(line: &str) -> Option<MenuChoice> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let choice = match head.to_ascii_lowercase().as_str() {
        "1" | "propose" | "p" => MenuChoice::Propose(rest.to_string()),
        "2" | "status" | "s" => MenuChoice::Status,
        "3" | "learned" | "l" => MenuChoice::Learned,
        "4" | "test" | "t" => MenuChoice::QuickTest,
        "5" | "exit" | "quit" | "q" => MenuChoice::Exit,
        _ => MenuChoice::Unknown(line.to_string()),
    };
    Some(choice)
}

fn print_menu(node: &PaxosNode) {
    println!();
    println!("=== Paxos node {} ({}) ===", node.name(), node.address());
    println!("1. Propose a value");
    println!("2. Show status");
    println!("3. Show learned value");
    println!("4. Quick test");
    println!("5. Exit");
    print!("> ");
    let _ = std::io::Write::flush(&mut std::io::stdout());
}

async fn propose(node: &PaxosNode, raw: &str, retries: u32, interval: Duration) {
    let value = parse_value(raw);
    match propose_with_retry(node, value.clone(), retries, interval).await {
        Ok(decision) => report(&decision, &value),
        Err(e) => error!("❌ Could not reach consensus on {}: {}", value, e),
    }
}

/// Runs until the user exits, stdin closes, or Ctrl-C.
pub async fn run_menu(node: Arc<PaxosNode>, retries: u32) -> std::io::Result<()> {
    let interval = node.config().retry_interval();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut awaiting_value = false;

    loop {
        if !awaiting_value {
            print_menu(&node);
        }

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received");
                break;
            }
        };
        let Some(line) = line else { break };

        if awaiting_value {
            awaiting_value = false;
            if !line.trim().is_empty() {
                propose(&node, line.trim(), retries, interval).await;
            }
            continue;
        }

        match parse_choice(&line) {
            None => {}
            Some(MenuChoice::Propose(raw)) if raw.is_empty() => {
                print!("Value: ");
                let _ = std::io::Write::flush(&mut std::io::stdout());
                awaiting_value = true;
            }
            Some(MenuChoice::Propose(raw)) => propose(&node, &raw, retries, interval).await,
            Some(MenuChoice::Status) => println!("{}", node.get_status().await),
            Some(MenuChoice::Learned) => match node.learned().await {
                Some((proposal, value)) => println!("Learned {} (proposal {})", value, proposal),
                None => println!("Nothing learned yet"),
            },
            Some(MenuChoice::QuickTest) => {
                let raw = format!("\"test-{}-{}\"", node.name(), chrono::Utc::now().format("%H%M%S"));
                propose(&node, &raw, retries, interval).await;
            }
            Some(MenuChoice::Exit) => break,
            Some(MenuChoice::Unknown(other)) => println!("Unknown option: {}", other),
        }
    }
    Ok(())
}
