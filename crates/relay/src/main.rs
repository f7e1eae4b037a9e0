// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use event_relay::config::RelayConfig;

#[tokio::main]
async fn main() {
    let config = RelayConfig::parse();
    if let Err(e) = config.validate() {
        eprintln!("error: {e:#}");
        std::process::exit(2);
    }

    event_relay::init_tracing(&config);

    if let Err(e) = event_relay::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
