//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p fourcards_client -- [--config client.json] [--process <id>]
//!       [--cu-url <url>] [--mu-url <url>] [--session <path>] [--poll-ms 3000]
//!       [--join <link>]
//!
//! The client loads (or creates) the local wallet, looks up the registered
//! username, and then takes console commands.
//!
//! Console commands:
//!   status                         - Show session status
//!   register <username>            - Register or rename the player
//!   create                         - Create a room and print its invite link
//!   join <link> | join <id> <code> - Enter a room (joins unless you created it)
//!   room                           - Show the latest room snapshot
//!   leave                          - Stop watching the current room
//!   logout                         - Clear the session, including the wallet
//!   quit                           - Exit client

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use fourcards_client::client::{GameClient, LandingState};
use fourcards_shared::config::ClientConfig;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "client", about = "Four Cards game client")]
struct Args {
    /// JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Game process id.
    #[arg(long)]
    process: Option<String>,
    #[arg(long)]
    cu_url: Option<String>,
    #[arg(long)]
    mu_url: Option<String>,
    /// Session store path.
    #[arg(long)]
    session: Option<PathBuf>,
    /// Room polling interval in milliseconds.
    #[arg(long)]
    poll_ms: Option<u64>,
    /// Room link to enter on startup.
    #[arg(long)]
    join: Option<String>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(ClientConfig, Option<String>)> {
        let mut cfg = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(process) = self.process {
            cfg.process_id = process;
        }
        if let Some(url) = self.cu_url {
            cfg.cu_url = url;
        }
        if let Some(url) = self.mu_url {
            cfg.mu_url = url;
        }
        if let Some(path) = self.session {
            cfg.session_path = path.display().to_string();
        }
        if let Some(ms) = self.poll_ms {
            cfg.poll_interval_ms = ms;
        }
        Ok((cfg, self.join))
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (cfg, join) = Args::parse().into_config()?;
    info!(process = %cfg.process_id, session = %cfg.session_path, "Starting client");

    let mut client = GameClient::connect(cfg).context("connect")?;

    match client.init_landing().await? {
        LandingState::Ready { address, username } => {
            println!("Welcome back, {} ({})", username, address);
        }
        LandingState::NeedsUsername {
            address,
            new_wallet,
        } => {
            if new_wallet {
                println!("Generated a new wallet: {}", address);
            }
            println!("Register a username with 'register <username>' before creating or joining rooms.");
        }
    }

    if let Some(link) = join {
        match client.exec_console(&format!("join {link}")).await {
            Ok(output) => print_lines(&output),
            Err(e) => println!("Error: {}", e),
        }
    }

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Type 'status' for info, 'quit' to exit.");
    println!();

    while let Some(line) = console_rx.recv().await {
        if matches!(line.as_str(), "quit" | "exit") {
            break;
        }
        match client.exec_console(&line).await {
            Ok(output) => print_lines(&output),
            Err(e) => println!("Error: {}", e),
        }
    }

    client.leave_room().await;
    Ok(())
}
