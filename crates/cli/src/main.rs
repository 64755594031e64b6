// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tbot - control client for the trading-task orchestrator

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod shell;

use anyhow::Result;
use clap::Parser;
use client::Client;
use tbot_daemon::DEFAULT_PORT;

#[derive(Parser)]
#[command(name = "tbot", version, about = "Trading-task orchestrator client")]
struct Cli {
    /// Log verbosity: 0 quiet, 1 normal, 2+ chatty
    #[arg(short = 'v', long, value_name = "LEVEL", default_value_t = 1)]
    verbosity: u8,

    /// Run one command line and exit
    #[arg(short = 'e', value_name = "CMDLINE")]
    execute: Option<String>,

    /// Server to connect to, host[:port]
    #[arg(long, value_name = "HOST[:PORT]", default_value = "localhost")]
    server: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let server = if cli.server.contains(':') {
        cli.server.clone()
    } else {
        format!("{}:{}", cli.server, DEFAULT_PORT)
    };

    let mut client = Client::new(server, cli.verbosity >= 2);

    match cli.execute {
        Some(line) => {
            let response = client.call_raw(&line).await?;
            shell::print_response(&line, &response);
            Ok(())
        }
        None => shell::run(&mut client).await,
    }
}
