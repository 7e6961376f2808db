//! CLI subcommand implementations for the caplift binary.

pub mod codec_cmd;
pub mod output;
pub mod patch_cmd;
pub mod rules_cmd;
pub mod simulate_cmd;

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Read a document from `path`, or from stdin when no path is given.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Read and parse a JSON document.
pub fn read_json(path: Option<&Path>) -> Result<serde_json::Value> {
    let text = read_input(path)?;
    serde_json::from_str(&text).context("input is not valid JSON")
}
