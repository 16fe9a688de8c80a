// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Easel server entrypoint.
//!
//! Serves the lease, snapshot and version API over HTTP. Tables live in `--data-dir` when
//! given, otherwise in memory. Ctrl-C shuts down gracefully.

use std::error::Error;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use easel::config::ServerArgs;
use easel::store::{DataDir, Store};

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("easel=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn open_store(args: &ServerArgs) -> Result<Store, Box<dyn Error>> {
    let config = args.server_config();
    match &args.data_dir {
        Some(root) => {
            let dir = DataDir::new(root).with_durability(args.durability());
            Ok(Store::open(dir, config)?)
        }
        None => {
            tracing::warn!("no data directory given; state is kept in memory only");
            Ok(Store::in_memory(config))
        }
    }
}

fn main() {
    let args = ServerArgs::parse();
    init_tracing(&args.log);

    let result = (|| -> Result<(), Box<dyn Error>> {
        let store = open_store(&args)?;
        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind(args.bind).await?;
            tracing::info!(
                addr = %listener.local_addr()?,
                auth = ?args.auth,
                lease_timeout_secs = store.config().lease.timeout.as_secs(),
                "listening"
            );

            let shutdown = CancellationToken::new();
            let on_signal = shutdown.clone();
            tokio::spawn(async move {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %err, "could not listen for ctrl-c");
                    return;
                }
                tracing::info!("shutting down");
                on_signal.cancel();
            });

            easel::server::serve(listener, store, shutdown).await?;
            Ok::<(), Box<dyn Error>>(())
        })?;

        Ok(())
    })();

    if let Err(err) = result {
        tracing::error!(error = %err, "server failed");
        eprintln!("easel: {err}");
        std::process::exit(1);
    }
}
