//! `caplift rules`: list the rule table, targets and profile catalog.

use crate::capability::Classifier;
use crate::cli::output::{self, Styled};
use crate::config::RuntimeConfig;
use anyhow::Result;

pub fn run(config: &RuntimeConfig) -> Result<()> {
    let classifier = Classifier::new(config.targets.clone());
    let targets = classifier.targets();
    let rules = classifier.rules();

    if output::is_json() {
        let rules: Vec<_> = rules
            .iter()
            .map(|r| serde_json::json!({"name": r.name, "keys": r.pattern.describe()}))
            .collect();
        output::print_json(&serde_json::json!({
            "rules": rules,
            "targets": targets,
        }));
        return Ok(());
    }

    let s = Styled::new();
    output::print_header(&s);

    output::print_section(&s, "Rules");
    for rule in rules {
        output::print_check(s.info_sym(), rule.name, &rule.pattern.describe());
    }
    eprintln!();

    output::print_section(&s, "Targets");
    output::print_check(s.ok_sym(), "resolution", &targets.resolution_label());
    output::print_check(s.ok_sym(), "bitrate", &format!("{} kbps", targets.max_bitrate));
    output::print_check(s.ok_sym(), "hdcp", &targets.hdcp_version);
    output::print_check(s.ok_sym(), "depth", &targets.max_depth.to_string());
    eprintln!();

    output::print_section(&s, "Profiles");
    for profile in &targets.profile_catalog {
        eprintln!("    {}", s.cyan(profile));
    }
    if output::is_verbose() {
        eprintln!();
        eprintln!(
            "  {}",
            s.dim(&format!("{} profiles prepended to every profile list", targets.profile_catalog.len()))
        );
    }
    Ok(())
}
