// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `subscribe`: Batched subscription for the observation window
//! - `read`: One-shot read of every tag
//! - `validate`: Validate configuration and the tag list
//! - `version`: Show version information

mod read;
mod subscribe;
mod validate;
mod version;

pub use read::read;
pub use subscribe::subscribe;
pub use validate::validate;
pub use version::version;

use tagwatch_config::{ConfigLoader, TagwatchConfig};

use crate::cli::{Cli, Commands, RunArgs};
use crate::error::BinResult;
use crate::runtime::RunReport;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Subscribe(args) => subscribe::subscribe(&cli, args).await,
        Commands::Read(args) => read::read(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
    }
}

/// Loads the configuration, applies command line overrides, then validates.
///
/// Validation runs last so a flag can repair an invalid file value.
pub(crate) fn load_config(cli: &Cli, overrides: &RunArgs) -> BinResult<TagwatchConfig> {
    let loader = ConfigLoader::builder().validate(false).build();
    let mut config = loader.load_or_default(cli.config.as_deref())?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Prints the end-of-run summary unless quiet.
pub(crate) fn print_report(cli: &Cli, report: &RunReport) {
    if cli.quiet {
        return;
    }

    let summary = &report.summary;
    println!("Results: {}", report.output_path.display());
    println!("  Tags:          {}", summary.tags_read);
    println!("  Resolved:      {}", summary.resolved);
    println!("  Unresolved:    {}", summary.unresolved);
    println!("  Registered:    {}", summary.registered);
    println!("  Failed:        {}", summary.registration_failures);
    println!("  Records:       {}", report.records_written);
    println!("  Elapsed:       {:.1}s", summary.elapsed.as_secs_f64());
}
