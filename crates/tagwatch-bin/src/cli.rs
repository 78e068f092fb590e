// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `subscribe`: Subscribe to every tag for the observation window (default)
//! - `read`: Read every tag once
//! - `validate`: Validate configuration and the tag list
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use tagwatch_config::TagwatchConfig;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// tagwatch - batched OPC UA tag subscription
///
/// Resolves a list of tags on an OPC UA server, subscribes to them in paced
/// batches and writes every value change to a CSV-like result file.
#[derive(Parser, Debug)]
#[command(
    name = "tagwatch",
    author = "Sylvex <contact@sylvex.io>",
    version = tagwatch_core::VERSION,
    about = "Batched OPC UA tag subscription and reads",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path (yaml, toml or json)
    #[arg(short, long, env = "TAGWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "TAGWATCH_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "TAGWATCH_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Subscribe to every tag and record value changes
    ///
    /// This is the default command. Tags are registered in batches, value
    /// changes are collected for the observation window, then every
    /// registration is removed.
    Subscribe(RunArgs),

    /// Read every tag once
    Read(RunArgs),

    /// Validate the configuration and the tag list without connecting
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Settings that override the configuration file for one run.
#[derive(Args, Debug, Default, Clone, PartialEq)]
pub struct RunArgs {
    /// OPC UA server URL
    #[arg(short, long)]
    pub server_url: Option<String>,

    /// Tag list file, one identifier per line
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output file path or prefix
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Use the output path as is, without the timestamp suffix
    #[arg(long)]
    pub no_timestamp: bool,

    /// Sampling interval in milliseconds
    #[arg(long)]
    pub sampling_interval_ms: Option<u64>,

    /// Observation window in seconds
    #[arg(short, long)]
    pub window_secs: Option<u64>,

    /// Nodes per registration batch (0 = single batch)
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Pause between batches in seconds
    #[arg(short = 'd', long)]
    pub batch_delay_secs: Option<f64>,
}

impl RunArgs {
    /// Writes every given flag into `config`.
    pub fn apply(&self, config: &mut TagwatchConfig) {
        if let Some(url) = &self.server_url {
            config.server_url = url.clone();
        }
        if let Some(input) = &self.input {
            config.input_path = input.clone();
        }
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if self.no_timestamp {
            config.timestamp_output = false;
        }
        if let Some(ms) = self.sampling_interval_ms {
            config.sampling_interval_ms = ms;
        }
        if let Some(secs) = self.window_secs {
            config.observation_window_secs = secs;
        }
        if let Some(size) = self.batch_size {
            config.batch_size = size;
        }
        if let Some(delay) = self.batch_delay_secs {
            config.inter_batch_delay_secs = delay;
        }
    }
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Overrides applied before validation
    #[command(flatten)]
    pub overrides: RunArgs,

    /// Show the effective configuration after validation
    #[arg(long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Subscribe` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Subscribe(RunArgs::default()))
    }

    /// Get the effective log level based on flags.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["tagwatch"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Subscribe(args) if args == RunArgs::default()));
    }

    #[test]
    fn test_subscribe_flags() {
        let cli = Cli::parse_from([
            "tagwatch",
            "subscribe",
            "-s",
            "opc.tcp://plc:4840",
            "-i",
            "tags.txt",
            "-b",
            "200",
            "-d",
            "0.5",
            "-w",
            "15",
            "--sampling-interval-ms",
            "1000",
            "--no-timestamp",
        ]);
        let Some(Commands::Subscribe(args)) = cli.command else {
            panic!("Expected Subscribe command");
        };
        assert_eq!(args.server_url.as_deref(), Some("opc.tcp://plc:4840"));
        assert_eq!(args.batch_size, Some(200));
        assert_eq!(args.batch_delay_secs, Some(0.5));

        let mut config = TagwatchConfig::default();
        args.apply(&mut config);
        assert_eq!(config.server_url, "opc.tcp://plc:4840");
        assert_eq!(config.input_path, PathBuf::from("tags.txt"));
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.inter_batch_delay_secs, 0.5);
        assert_eq!(config.observation_window_secs, 15);
        assert_eq!(config.sampling_interval_ms, 1000);
        assert!(!config.timestamp_output);
    }

    #[test]
    fn test_apply_without_flags_keeps_config() {
        let mut config = TagwatchConfig::default();
        RunArgs::default().apply(&mut config);
        assert_eq!(config, TagwatchConfig::default());
    }

    #[test]
    fn test_read_command() {
        let cli = Cli::parse_from(["tagwatch", "read", "-o", "snapshot.csv"]);
        assert!(matches!(cli.command, Some(Commands::Read(ref a)) if a.output == Some(PathBuf::from("snapshot.csv"))));
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["tagwatch", "validate", "--show-config", "-f", "json"]);
        if let Some(Commands::Validate(args)) = cli.command {
            assert!(args.show_config);
            assert_eq!(args.format, OutputFormat::Json);
        } else {
            panic!("Expected Validate command");
        }
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["tagwatch", "-c", "/etc/tagwatch/config.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/tagwatch/config.yaml")));
    }

    #[test]
    fn test_quiet_and_verbose() {
        let cli = Cli::parse_from(["tagwatch", "-q"]);
        assert_eq!(cli.effective_log_level(), "warn");

        let cli = Cli::parse_from(["tagwatch", "-v"]);
        assert_eq!(cli.effective_log_level(), "debug");

        let cli = Cli::parse_from(["tagwatch", "-l", "trace"]);
        assert_eq!(cli.effective_log_level(), "trace");
    }
}
