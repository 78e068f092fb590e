// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! tagwatch - batched OPC UA tag subscription
//!
//! Main binary entry point.

use tagwatch_bin::error::report_error_and_exit;
use tagwatch_bin::{commands, init_logging, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.effective_log_level(), cli.log_format);

    if let Err(e) = commands::execute(cli).await {
        report_error_and_exit(e);
    }
}
