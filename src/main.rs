// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Run the k9p server: mirror the cluster and serve it over 9P2000.
// Author: Lukas Bower
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use k9p::cluster::{ClusterClient, ClusterConfig, Reflector, ReflectorSettings};
use k9p::logging::{self, LogFormat};
use k9p::{server, Shutdown, Store};
use log::{error, info, LevelFilter};
use tokio::net::TcpListener;

/// Serve a Kubernetes cluster's namespaces and deployments as a 9P2000 file tree.
#[derive(Debug, Parser)]
#[command(name = "k9p", version, about)]
struct Cli {
    /// Address to accept 9P connections on.
    #[arg(long = "bind-9p", default_value = "0.0.0.0:564")]
    bind_9p: String,

    /// API server URL; overrides the kubeconfig server.
    #[arg(long)]
    master: Option<String>,

    /// Path to a kubeconfig file. Without it or --master the in-cluster
    /// service account is used.
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Emit human-readable log lines instead of JSON.
    #[arg(long, default_value_t = false)]
    pretty_log: bool,

    /// Server-side timeout of each watch request, in seconds.
    #[arg(long, default_value_t = 300)]
    watch_timeout: u64,

    /// Pause before retrying a failed list or watch, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    retry_backoff: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = if cli.pretty_log {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    };
    logging::init(format, LevelFilter::Info);

    let config = ClusterConfig::from_flags(cli.master.as_deref(), cli.kubeconfig.as_deref())
        .context("failed to resolve cluster configuration")?;
    info!("[k9p] using API server {}", config.server);
    let settings = ReflectorSettings {
        watch_timeout: Duration::from_secs(cli.watch_timeout),
        retry_backoff: Duration::from_millis(cli.retry_backoff),
    };
    let client = ClusterClient::new(&config, settings.watch_timeout)
        .context("failed to build API client")?;

    let shutdown = Shutdown::new();
    let store = Arc::new(Store::new());
    Reflector::new(Arc::new(client), Arc::clone(&store), settings, shutdown.clone())
        .spawn()
        .context("failed to start reflectors")?;

    let listener = TcpListener::bind(&cli.bind_9p)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind_9p))?;

    let signals = shutdown.clone();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => {
                info!("[k9p] received shutdown signal");
                signals.trigger();
            }
            Err(err) => error!("[k9p] failed to listen for shutdown signal: {err}"),
        }
    });

    server::serve(listener, store, shutdown)
        .await
        .context("9P server failed")?;
    info!("[k9p] stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
