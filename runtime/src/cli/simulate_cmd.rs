//! `caplift simulate`: drive the navigation monitor against an in-memory page.
//!
//! Each route is pushed through the hooked history primitive, one step apart.
//! The route `back` returns to the previous location and fires a popstate.
//! With `--player`, a player object appears in the capability namespace after
//! the first watch route so installation cycles have something to wrap.

use crate::cli::output::{self, Styled};
use crate::config::RuntimeConfig;
use crate::engine::CapabilityEngine;
use crate::host::sandbox::SandboxHost;
use crate::host::{HostEnvironment, HostFunction, HostValue, ObjectRef};
use crate::intercept::HostPrimitives;
use crate::navigation::{parse_route, History, NavigationMonitor};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Route token for back navigation.
const BACK: &str = "back";

/// A stand-in player with a capped config and a couple of methods.
fn demo_namespace() -> ObjectRef {
    let config = ObjectRef::from_entries([
        ("maxVideoBitrate", HostValue::from(5800)),
        ("maxVideoHeight", HostValue::from(1080)),
    ]);
    let for_get = config.clone();
    let player = ObjectRef::from_entries([
        ("config", HostValue::Object(config)),
        (
            "getConfiguration",
            HostValue::Function(HostFunction::new("getConfiguration", move |_| {
                Ok(HostValue::Object(for_get.clone()))
            })),
        ),
        (
            "seek",
            HostValue::Function(HostFunction::new("seek", |_| Ok(HostValue::Null))),
        ),
    ]);
    ObjectRef::from_entries([("player", HostValue::Object(player))])
}

pub async fn run(
    config: &RuntimeConfig,
    start: &str,
    routes: &[String],
    step_ms: u64,
    with_player: bool,
) -> Result<()> {
    let host = Arc::new(SandboxHost::new(start));
    let engine = CapabilityEngine::new(config.clone(), host.clone());
    let mut primitives = HostPrimitives::native();
    engine.init(&mut primitives);

    let monitor = NavigationMonitor::new(engine.clone());
    let history = monitor.history_hook(host.clone());
    let shutdown = Arc::new(Notify::new());
    let task = tokio::spawn(monitor.run(shutdown.clone()));

    let step = Duration::from_millis(step_ms);
    for route in routes {
        if route == BACK {
            if !host.back() {
                warn!("no earlier location, back ignored");
                continue;
            }
            info!(location = %host.location().href, "back");
            history.pop_state();
        } else {
            info!(route = %route, "navigating");
            history.push_state(route);
        }
        if with_player && host.namespace().is_none() && parse_route(&host.location().pathname).is_watch() {
            host.set_namespace(Some(demo_namespace()));
        }
        tokio::time::sleep(step).await;
    }
    // Let the last cycle's delayed attempts run out.
    let tail: u64 = config.timings.reinstall_delays_ms.iter().copied().max().unwrap_or(0);
    tokio::time::sleep(Duration::from_millis(tail + config.timings.settle_ms)).await;

    shutdown.notify_one();
    task.await.context("navigation monitor panicked")?;

    let cycles = engine.cycles();
    let session = engine.session();
    let snapshot = engine.snapshot();

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "cycles": cycles,
            "session": session,
            "status": snapshot,
        }));
        return Ok(());
    }

    let s = Styled::new();
    output::print_section(&s, "Installation cycles");
    if cycles.is_empty() {
        output::print_check(s.info_sym(), "none", "");
    }
    for cycle in &cycles {
        output::print_check(
            s.ok_sym(),
            cycle.video_id.as_deref().unwrap_or("-"),
            &s.dim(&cycle.reason),
        );
    }
    eprintln!();
    output::print_section(&s, "Session");
    match session {
        Some(session) => {
            let state = if session.hook_installed {
                s.green("hooked")
            } else {
                s.yellow("waiting for player")
            };
            output::print_check(s.ok_sym(), &session.video_id, &state);
        }
        None => output::print_check(s.info_sym(), "idle", ""),
    }
    Ok(())
}
