// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` command.

use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::runtime::{RunMode, TagwatchRuntime};

/// Executes the `read` command.
pub async fn read(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let config = super::load_config(cli, &args)?;
    info!(server = %config.server_url, "Starting read run");

    let report = TagwatchRuntime::new(config, RunMode::Read).run().await?;
    super::print_report(cli, &report);
    Ok(())
}
