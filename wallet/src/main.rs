// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Totem ticket ledger project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

//! Ticket wallet: keeps ticket keys locally and sends signed actions to a node.
//!
//! EXAMPLE:
//!   totem-wallet new --name judge1
//!   totem-wallet mint --name judge1 --price 5.00
//!   totem-wallet activate --name judge1 --location "Demo Station"
//!   totem-wallet status --name judge1

mod client;
mod store;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ledger_core::{TicketPayload, Timestamp, TransactionType, DEFAULT_TICKET_DURATION_MS};

use crate::client::{NodeClient, SubmitBody};
use crate::store::WalletStore;

#[derive(Parser, Debug)]
#[command(name = "totem-wallet")]
#[command(version, about = "Totem ticket wallet", long_about = None)]
struct Cli {
    /// Node HTTP API base URL
    #[arg(long, env = "TOTEM_API_URL", default_value = "http://127.0.0.1:8000", global = true)]
    api_url: String,
    /// Wallet file path
    #[arg(long, default_value = "./wallets.json", global = true)]
    wallet_file: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new ticket key and store it under a name
    New {
        #[arg(long)]
        name: String,
    },
    /// List stored wallets with their last known status
    List,
    /// Buy a ticket
    Mint {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "5.00")]
        price: String,
        /// Validity window once activated, in milliseconds
        #[arg(long, default_value_t = DEFAULT_TICKET_DURATION_MS)]
        duration_ms: u64,
        #[arg(long, default_value = "CLI_KIOSK")]
        device_id: String,
    },
    /// Start the ticket's validity window
    Activate {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "Demo Station")]
        location: String,
        #[arg(long, default_value = "PHONE_APP")]
        device_id: String,
    },
    /// Record an inspector scan
    Inspect {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "Train IC1")]
        location: String,
        #[arg(long, default_value = "POLICE_SCANNER")]
        device_id: String,
    },
    /// Ask the node for the ticket's current status
    Status {
        #[arg(long)]
        name: String,
    },
}

impl Command {
    /// The action and payload to sign for ticket-changing commands.
    fn action(&self, now: Timestamp) -> Option<(&str, TransactionType, TicketPayload)> {
        match self {
            Command::Mint {
                name,
                price,
                duration_ms,
                device_id,
            } => Some((
                name.as_str(),
                TransactionType::Mint,
                TicketPayload::new(now)
                    .with_price(price.as_str())
                    .with_duration(*duration_ms)
                    .with_device_id(device_id.as_str()),
            )),
            Command::Activate {
                name,
                location,
                device_id,
            } => Some((
                name.as_str(),
                TransactionType::Activate,
                TicketPayload::new(now)
                    .with_location(location.as_str())
                    .with_device_id(device_id.as_str()),
            )),
            Command::Inspect {
                name,
                location,
                device_id,
            } => Some((
                name.as_str(),
                TransactionType::Inspect,
                TicketPayload::new(now)
                    .with_location(location.as_str())
                    .with_device_id(device_id.as_str()),
            )),
            _ => None,
        }
    }
}

fn main() -> Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut store = WalletStore::open(&cli.wallet_file)?;
    let client = NodeClient::new(&cli.api_url);

    match &cli.command {
        Command::New { name } => {
            let wallet = store.create(name)?;
            println!("created wallet {}: {}", wallet.name, wallet.id);
            println!("stored in {}", store.path().display());
        }
        Command::List => {
            if store.wallets().is_empty() {
                println!("(no wallets found in {})", store.path().display());
            }
            for (i, w) in store.wallets().iter().enumerate() {
                println!("{}. {}\t[{}]\t{}", i + 1, w.name, w.status, short_id(&w.id));
            }
        }
        Command::Status { name } => {
            let id = store.get(name)?.id.clone();
            let status = client.status(&id).await?;
            store.set_status(name, &status)?;
            println!("{name}: {status}");
        }
        command => {
            let Some((name, tx_type, payload)) = command.action(Timestamp::now()) else {
                return Ok(());
            };
            let wallet = store.get(name)?;
            let key = wallet.signing_key()?;
            let body = SubmitBody::signed(tx_type, &wallet.id, &payload, &key)?;

            println!("sending {tx_type} to {}", client.base());
            let receipt = client.submit(&body).await?;
            match (receipt.block_index, receipt.block_hash) {
                (Some(index), Some(hash)) => {
                    println!("accepted: tx {} sealed in block {index} ({hash})", receipt.tx_id)
                }
                _ => println!("accepted: tx {} is {}", receipt.tx_id, receipt.status),
            }

            let id = wallet.id.clone();
            // The node may have already moved the ticket on; record what it says now.
            let status = client.status(&id).await.unwrap_or_else(|_| "UNKNOWN".to_string());
            store.set_status(name, &status)?;
            println!("{name}: {status}");
        }
    }

    Ok(())
}

fn short_id(id: &str) -> String {
    let head: String = id.chars().take(16).collect();
    format!("{head}...")
}
