// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tagwatch-bin
//!
//! Command line front end for tagwatch.
//!
//! This crate provides the binary entry point, including:
//!
//! - CLI argument parsing with clap
//! - Run orchestration (tag list, result file, pipeline)
//! - Signal handling that ends the observation window early
//! - Logging initialization
//! - Command implementations (subscribe, read, validate, version)
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────┐
//!                    │   main.rs   │
//!                    └──────┬──────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │   cli.rs    │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        └──────────┘ └────┬─────┘ └──────────┘
//!                          │
//!                   ┌──────▼──────┐
//!                   │  shutdown   │
//!                   └─────────────┘
//!                          │
//!                  ┌───────▼───────┐
//!                  │  tagwatch-*   │
//!                  └───────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Subscribe with the defaults (Taglist.txt, opc.tcp://localhost:4840)
//! tagwatch
//!
//! # Custom config, smaller batches
//! tagwatch -c /etc/tagwatch/config.yaml subscribe -b 50
//!
//! # One-shot read into a fixed file
//! tagwatch read -o snapshot.csv --no-timestamp
//!
//! # Validate configuration and tag list
//! tagwatch validate --show-config
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands, RunArgs};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{RunMode, RunReport, TagwatchRuntime};
pub use shutdown::shutdown_signal;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
