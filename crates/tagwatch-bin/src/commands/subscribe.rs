// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `subscribe` command.

use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::runtime::{RunMode, TagwatchRuntime};

/// Executes the `subscribe` command.
pub async fn subscribe(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let config = super::load_config(cli, &args)?;
    info!(
        server = %config.server_url,
        window_secs = config.observation_window_secs,
        batch_size = config.batch_size,
        "Starting subscription run"
    );

    let report = TagwatchRuntime::new(config, RunMode::Subscribe).run().await?;
    super::print_report(cli, &report);
    Ok(())
}
