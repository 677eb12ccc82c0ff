// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Totem ticket ledger project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "totem-node")]
#[command(version, about = "Totem ticket ledger node", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default node configuration
    Init(InitArgs),
    /// Start the ledger and its HTTP API
    Start(StartArgs),
    /// Display version information
    Version(VersionArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Data directory path
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Node identifier
    #[arg(long)]
    pub node_id: Option<String>,
    /// Overwrite an existing config
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct StartArgs {
    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Data directory override
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// HTTP bind address override (e.g. 0.0.0.0:8000)
    #[arg(long)]
    pub http_addr: Option<String>,
    /// HTTP port override (keeps the configured host)
    #[arg(long)]
    pub http_port: Option<u16>,
    /// Leading zero hex digits required of sealed block hashes
    #[arg(long)]
    pub difficulty: Option<usize>,
    /// Leave submissions pending until POST /mine instead of sealing each one
    #[arg(long, default_value_t = false)]
    pub no_auto_seal: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct VersionArgs {
    /// Show detailed build information
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
