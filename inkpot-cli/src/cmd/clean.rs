use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::Path;
use tracing::info;

use crate::config::InkpotConfig;

pub fn make_subcommand() -> Command {
    Command::new("clean")
        .about("Remove the generated site")
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory to remove [default: ./build]"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file [default: ./inkpot.toml]"),
        )
}

/// Returns `false` if there was nothing to remove.
pub fn remove_output(output_dir: &Path) -> Result<bool> {
    if !output_dir.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(output_dir)
        .with_context(|| format!("failed to remove {}", output_dir.display()))?;
    Ok(true)
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let inkpot_config = InkpotConfig::load_or_default(args);
    let output_dir = Path::new(&inkpot_config.build.output);

    if remove_output(output_dir)? {
        info!("Removed {}", output_dir.display());
    } else {
        info!("Nothing to clean at {}", output_dir.display());
    }

    Ok(())
}
