use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::Value;

/// Validate a form configuration and inspect the control tree it builds.
#[derive(Parser, Debug, Clone)]
#[command(name = "proteus", version, about, long_about = None)]
pub struct Cli {
    /// Path to the form configuration file (.json, .yaml or .yml)
    #[arg(env = "PROTEUS_CONFIG")]
    pub config: PathBuf,

    /// Print the qualified key of every built control
    #[arg(long)]
    pub tree: bool,

    /// Print the materialized form value
    #[arg(long)]
    pub values: bool,
}

/// Reads a config file into untyped JSON, picking the parser by extension.
/// YAML is accepted alongside JSON the same way config directories mix both.
pub fn load_raw_config(path: &Path) -> anyhow::Result<Value> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| anyhow::anyhow!("cannot read {}: {err}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let raw = match extension {
        "yaml" | "yml" => serde_yaml::from_str(&contents)?,
        _ => serde_json::from_str(&contents)?,
    };
    Ok(raw)
}
