/*
 * Copyright 2026 Molock Team
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use anyhow::Context;
use clap::Parser;
use echomock::config::ConfigLoader;
use echomock::rules::RouteTable;
use echomock::server::{run_server, AppState};
use echomock::telemetry::{init_telemetry, shutdown_telemetry};
use echomock::utils::{shutdown_signal, Shutdown};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long, default_value = "false")]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    if args.check {
        println!(
            "Configuration {:?} is valid ({} routes)",
            args.config,
            config.routes.len()
        );
        return Ok(());
    }

    init_telemetry(&config).await?;

    let shutdown = Shutdown::new();
    let state = AppState::new(RouteTable::new(config.routes.clone()), shutdown.clone());

    let server = run_server(&config, state).await?;

    info!("Echomock server is running on {}", config.address);
    info!("Press Ctrl+C to shutdown");

    let server_handle = server.handle();
    tokio::select! {
        result = server => {
            result.context("Server terminated with an error")?;
            info!("Server stopped");
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            // Delayed requests observe this and abandon their responses.
            shutdown.trigger();
            server_handle.stop(true).await;
            info!("Server shutdown complete");
        }
    }

    shutdown_telemetry().await;

    Ok(())
}
