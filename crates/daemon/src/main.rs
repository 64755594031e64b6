// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tbotd entry point.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tbot_daemon::server::{TcpControlServer, WsStreamServer};
use tbot_daemon::{lifecycle, App, Config};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "tbotd",
    version,
    about = "Trading-task orchestrator daemon"
)]
struct Cli {
    /// Log verbosity: 0 errors, 1 info, 2+ debug
    #[arg(short = 'v', long, value_name = "LEVEL")]
    verbosity: Option<u8>,

    /// Stay attached to the terminal and log to stderr
    #[arg(short = 'f', long)]
    foreground: bool,

    /// Listen address, addr[:port]
    #[arg(long, value_name = "ADDR[:PORT]")]
    bind: Option<String>,

    /// Drop privileges after binding, user[:group]
    #[arg(long, value_name = "USER[:GROUP]")]
    user: Option<String>,

    /// Savegame path; empty disables persistence
    #[arg(long, value_name = "PATH")]
    datafile: Option<String>,

    /// Pid file path (also the single-instance lock)
    #[arg(long, value_name = "PATH")]
    pidfile: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = Config::load();
    if let Some(verbosity) = cli.verbosity {
        config.verbosity = verbosity;
    }
    if cli.foreground {
        config.foreground = true;
    }
    if let Some(bind) = &cli.bind {
        if let Err(e) = config.set_bind(bind) {
            eprintln!("tbotd: {e}");
            std::process::exit(1);
        }
    }
    if let Some(datafile) = &cli.datafile {
        config.set_datafile(datafile);
    }
    if let Some(pidfile) = cli.pidfile {
        config.pidfile = Some(pidfile);
    }
    if cli.user.is_some() {
        config.user = cli.user;
    }

    let _log_guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("tbotd: logging setup failed: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!("Initialization failed: {}", e);
        eprintln!("tbotd: {e}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting tbotd ({})", env!("CARGO_PKG_VERSION"));

    // NOTE(lifetime): held to maintain the exclusive pid lock; released on drop
    let _pid_lock = match &config.pidfile {
        Some(path) => Some(lifecycle::acquire_pidfile(path)?),
        None => None,
    };

    // Bind both listeners before dropping privileges
    let app = App::build(config);
    let tcp = TcpControlServer::bind(&app.config.control_addr(), Arc::clone(&app.manager)).await?;
    let ws = WsStreamServer::bind(
        &app.config.stream_addr(),
        Arc::clone(&app.manager),
        app.bus.clone(),
    )
    .await?;

    if let Some(user) = app.config.user.clone() {
        lifecycle::drop_privileges(&user)?;
    }

    app.start();
    tokio::spawn(tcp.run());
    tokio::spawn(ws.run());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("Caught SIGTERM, shutting down..."),
        _ = sigint.recv() => info!("Caught SIGINT, shutting down..."),
    }

    app.shutdown().await;
    info!("Daemon stopped");
    Ok(())
}

/// Verbosity 0 is errors only, 1 info, anything higher debug; a logfile
/// from `[server]` gets a non-blocking appender, and foreground runs
/// additionally log to stderr.
fn setup_logging(
    config: &Config,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = match config.verbosity {
        0 => "error",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    match &config.server.logfile {
        Some(logfile) => {
            let dir = logfile.parent().unwrap_or(std::path::Path::new("."));
            let file_name = logfile
                .file_name()
                .ok_or_else(|| std::io::Error::other("logfile has no file name"))?;
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);
            if config.foreground {
                registry
                    .with(file_layer)
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .init();
            } else {
                registry.with(file_layer).init();
            }
            Ok(Some(guard))
        }
        None => {
            registry.with(fmt::layer().with_writer(std::io::stderr)).init();
            Ok(None)
        }
    }
}
