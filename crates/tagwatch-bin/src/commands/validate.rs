// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use chrono::Local;

use tagwatch_config::TagwatchConfig;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command.
///
/// Nothing connects to the server; the configuration is checked and the tag
/// list is read to count its entries.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config = super::load_config(cli, &args.overrides)
        .map_err(|e| e.with_context("Configuration validation failed"))?;

    config.session_config()?;

    let tags = tagwatch_core::read_tag_list(&config.input_path)?;
    let warnings = collect_warnings(&config, tags.len());
    let output_file = config.output_file_path(&Local::now());
    let source = cli
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults)".to_string());

    match args.format {
        OutputFormat::Text => {
            println!("Configuration is valid: {}", source);
            println!();
            println!("Summary:");
            println!("  Server:       {}", config.server_url);
            println!("  Tag list:     {} ({} tags)", config.input_path.display(), tags.len());
            println!("  Output:       {}", output_file.display());
            println!("  Sampling:     {} ms", config.sampling_interval_ms);
            println!("  Window:       {} s", config.observation_window_secs);
            println!("  Batch size:   {}", config.batch_size);
            println!("  Batch delay:  {} s", config.inter_batch_delay_secs);
            println!("  Security:     {:?} / {:?}", config.session.security_mode, config.session.security_policy);

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", to_pretty_json(&config)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": source,
                "summary": {
                    "server_url": config.server_url,
                    "input_path": config.input_path,
                    "tag_count": tags.len(),
                    "output_file": output_file,
                    "batch_size": config.batch_size,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!("{}", to_pretty_json(&output)?);
        }
    }

    Ok(())
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> BinResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| BinError::runtime(e.to_string()))
}

fn collect_warnings(config: &TagwatchConfig, tag_count: usize) -> Vec<String> {
    let mut warnings = Vec::new();

    if tag_count == 0 {
        warnings.push("Tag list is empty".to_string());
    }
    if config.observation_window_secs == 0 {
        warnings.push("Observation window is 0 s, no value changes will be recorded".to_string());
    }
    if config.batch_size == 0 && tag_count > 0 {
        warnings.push(format!("Batching disabled, all {} tags register at once", tag_count));
    }
    if config.session.trust_server_certs {
        warnings.push("Server certificates are trusted without verification".to_string());
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings() {
        let config = TagwatchConfig::default();
        assert!(collect_warnings(&config, 10).iter().all(|w| !w.contains("empty")));
        assert!(collect_warnings(&config, 0).iter().any(|w| w.contains("empty")));

        let config = TagwatchConfig {
            batch_size: 0,
            observation_window_secs: 0,
            ..TagwatchConfig::default()
        };
        let warnings = collect_warnings(&config, 3);
        assert!(warnings.iter().any(|w| w.contains("all 3 tags")));
        assert!(warnings.iter().any(|w| w.contains("Observation window")));
    }
}
