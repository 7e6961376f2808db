//! `caplift patch` and `caplift classify`.

use crate::capability::Classifier;
use crate::cli::output::{self, Styled};
use crate::cli::read_json;
use crate::config::RuntimeConfig;
use crate::host::json::{from_json, to_json};
use crate::host::HostValue;
use anyhow::{Context, Result};
use std::path::Path;

/// Patch a JSON document and print the result.
pub fn run(config: &RuntimeConfig, file: Option<&Path>) -> Result<()> {
    let input = read_json(file)?;
    let classifier = Classifier::new(config.targets.clone());
    let host = from_json(&input);
    let report = classifier.patch(&host);
    let patched = to_json(&host).context("patched document is not encodable")?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "patched": patched,
            "report": report,
        }));
        return Ok(());
    }

    output::print_json(&patched);
    if !output::is_quiet() {
        let s = Styled::new();
        let sym = if report.changed() { s.ok_sym() } else { s.info_sym() };
        eprintln!(
            "  {sym} {} corrections, {} objects visited, {} failures",
            report.corrections, report.objects_visited, report.failures
        );
        if report.depth_limited > 0 {
            eprintln!(
                "  {} {} objects beyond depth {} left untouched",
                s.warn_sym(),
                report.depth_limited,
                config.targets.max_depth
            );
        }
    }
    Ok(())
}

/// Parse a CLI value: JSON when it parses, a plain string otherwise.
fn parse_value(raw: &str) -> HostValue {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => from_json(&value),
        Err(_) => HostValue::String(raw.to_string()),
    }
}

/// Show the verdict for a single field.
pub fn classify(config: &RuntimeConfig, key: &str, raw: &str) -> Result<()> {
    let classifier = Classifier::new(config.targets.clone());
    let value = parse_value(raw);
    let before = to_json(&value)?;

    let (rule, after) = match classifier.classify(key, &value) {
        Some(verdict) => {
            let rule = verdict.rule;
            // Raised sub-fields are written into `value` itself.
            let after = match verdict.apply()? {
                Some(replacement) => to_json(&replacement)?,
                None => to_json(&value)?,
            };
            (Some(rule), after)
        }
        None => (None, before.clone()),
    };

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "key": key,
            "rule": rule,
            "before": before,
            "after": after,
        }));
        return Ok(());
    }

    let s = Styled::new();
    match rule {
        Some(rule) => eprintln!(
            "  {} {key}: {before} -> {} {}",
            s.ok_sym(),
            s.green(&after.to_string()),
            s.dim(&format!("({rule})"))
        ),
        None => eprintln!("  {} {key}: {before} unchanged", s.info_sym()),
    }
    Ok(())
}
