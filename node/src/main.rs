// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Totem ticket ledger project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

mod cli;
mod config;
mod http;
mod storage;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ledger_core::CancelToken;
use tracing::{info, warn};

use crate::config::NodeConfiguration;

fn main() -> Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = crate::cli::parse_cli();

    match &cli.command {
        crate::cli::Commands::Init(args) => {
            let config_path = args
                .config
                .clone()
                .unwrap_or_else(NodeConfiguration::default_config_path);

            let cfg = NodeConfiguration::default()
                .merge_with_env()
                .merge_with_cli(&cli);

            if !args.force && config_path.exists() {
                return Err(anyhow!(
                    "config file already exists: {} (use --force to overwrite)",
                    config_path.display()
                ));
            }

            std::fs::create_dir_all(cfg.chain_dir()).with_context(|| {
                format!("failed to create data_dir: {}", cfg.data_dir.display())
            })?;
            cfg.save_to_file(&config_path)?;

            println!(
                "init complete: config_path={}, data_dir={}",
                config_path.display(),
                cfg.data_dir.display()
            );
        }
        crate::cli::Commands::Start(args) => {
            let config_path = args
                .config
                .clone()
                .unwrap_or_else(NodeConfiguration::default_config_path);

            let cfg = if config_path.exists() {
                let loaded = NodeConfiguration::load_from_file(&config_path)?;
                info!(path = %config_path.display(), "loaded config");
                loaded
            } else {
                info!(path = %config_path.display(), "config not found; using defaults");
                NodeConfiguration::default()
            };
            let cfg = cfg.merge_with_env().merge_with_cli(&cli);
            cfg.validate()?;

            run_node(cfg).await?;
        }
        crate::cli::Commands::Version(args) => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            if args.verbose {
                let git_commit = option_env!("GIT_COMMIT").unwrap_or("unknown");
                let build_date = option_env!("BUILD_DATE").unwrap_or("unknown");
                let rustc_version = option_env!("RUSTC_VERSION").unwrap_or("unknown");
                println!("git_commit: {git_commit}");
                println!("build_date: {build_date}");
                println!("rustc: {rustc_version}");
            }
        }
    }

    Ok(())
}

async fn run_node(cfg: NodeConfiguration) -> Result<()> {
    info!(
        node_id = %cfg.node_id,
        data_dir = %cfg.data_dir.display(),
        difficulty = cfg.ledger.difficulty,
        auto_seal = cfg.ledger.auto_seal,
        "starting node"
    );

    let (ledger, store) = crate::storage::open_ledger(&cfg.chain_dir(), cfg.ledger.difficulty)?;
    let ledger = Arc::new(ledger);
    let store = Arc::new(store);
    store.flush(&ledger)?;

    let cancel = CancelToken::new();
    let state = crate::http::AppState {
        ledger: ledger.clone(),
        store: store.clone(),
        cancel: cancel.clone(),
        auto_seal: cfg.ledger.auto_seal,
    };
    let app = crate::http::router(state, &cfg.http);

    let listener = tokio::net::TcpListener::bind(cfg.http.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.http.http_addr))?;
    info!(addr = %cfg.http.http_addr, "http api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown signal received");
            // Abort any nonce search in flight so draining requests return.
            cancel.cancel();
        })
        .await
        .context("http server error")?;

    let written = store.flush(&ledger)?;
    info!(height = ledger.height(), written, dir = %store.dir().display(), "node stopped");
    Ok(())
}
