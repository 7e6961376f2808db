//! `caplift encode` and `caplift decode`: run a payload through the
//! installed interceptors.

use crate::capability::Classifier;
use crate::cli::output::{self, Styled};
use crate::cli::read_input;
use crate::config::RuntimeConfig;
use crate::host::json::to_json;
use crate::intercept::{CapabilityInterceptors, HostPrimitives, InterceptorRegistry};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

fn intercepted(config: &RuntimeConfig) -> HostPrimitives {
    let mut primitives = HostPrimitives::native();
    let policy = CapabilityInterceptors::new(Arc::new(Classifier::new(config.targets.clone())));
    InterceptorRegistry::new().install(&mut primitives, &policy);
    primitives
}

/// Encode a payload through the text-encode hook.
pub fn encode(config: &RuntimeConfig, file: Option<&Path>) -> Result<()> {
    let input = read_input(file)?;
    let input = input.trim_end_matches(['\r', '\n']);
    let bytes = intercepted(config).text_encoder.encode(input);
    let out = String::from_utf8(bytes).context("encoder produced invalid UTF-8")?;
    let changed = out != input;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "changed": changed,
            "output": out,
        }));
        return Ok(());
    }

    println!("{out}");
    report(changed);
    Ok(())
}

/// Decode a payload through the structured-decode hook.
pub fn decode(config: &RuntimeConfig, file: Option<&Path>) -> Result<()> {
    let input = read_input(file)?;
    let value = intercepted(config)
        .parse
        .parse(&input)
        .context("payload could not be decoded")?;
    let decoded = to_json(&value)?;

    if output::is_json() {
        output::print_json(&serde_json::json!({ "decoded": decoded }));
        return Ok(());
    }
    output::print_json(&decoded);
    Ok(())
}

fn report(changed: bool) {
    if output::is_quiet() {
        return;
    }
    let s = Styled::new();
    if changed {
        eprintln!("  {} payload rewritten", s.ok_sym());
    } else {
        eprintln!("  {} payload passed through unchanged", s.info_sym());
    }
}
