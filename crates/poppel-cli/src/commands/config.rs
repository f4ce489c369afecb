//! Config command handlers

use anyhow::Result;

use poppel_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config: &Config, output: &Output) -> Result<()> {
    match output.format {
        OutputFormat::Json => output.json(config)?,
        OutputFormat::Quiet => {
            println!("{}", Config::config_file_path().display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  log_level:         {}", config.log_level);
            println!(
                "  log_file:          {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  pretty_attributes: {}", config.pretty_attributes);
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}
