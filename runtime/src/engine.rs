//! The capability engine: one instance owns all mutable runtime state.
//!
//! Interceptor installation, the playback session, the status board and the
//! record of scheduled installation cycles live here behind `init`/`reset`
//! instead of in process-wide globals. Locks are never held across an await.

use crate::capability::{Classifier, PatchReport};
use crate::config::RuntimeConfig;
use crate::host::{HostEnvironment, HostValue};
use crate::intercept::{CapabilityInterceptors, HostPrimitives, InterceptorRegistry};
use crate::navigation::{parse_route, NavigationStateMachine, PlaybackSession, Transition, VideoObservation};
use crate::player::MethodHook;
use crate::status::{OutboundMessage, StatusBoard, StatusSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Older cycles are dropped past this many.
const CYCLE_LOG_CAPACITY: usize = 32;

/// One scheduled round of installation attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallCycle {
    pub video_id: Option<String>,
    pub reason: String,
    pub scheduled_at: DateTime<Utc>,
}

/// Result of a single installation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InstallOutcome {
    AlreadyInstalled,
    NamespaceMissing,
    PlayerMissing,
    Installed { methods: usize },
}

impl InstallOutcome {
    /// True once nothing more needs to be attempted.
    pub fn is_settled(&self) -> bool {
        matches!(self, InstallOutcome::AlreadyInstalled | InstallOutcome::Installed { .. })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct CapabilityEngine {
    config: RuntimeConfig,
    classifier: Arc<Classifier>,
    hook: MethodHook,
    host: Arc<dyn HostEnvironment>,
    nav: Mutex<NavigationStateMachine>,
    status: StatusBoard,
    cycles: Mutex<VecDeque<InstallCycle>>,
    registry: Mutex<InterceptorRegistry>,
}

impl CapabilityEngine {
    pub fn new(config: RuntimeConfig, host: Arc<dyn HostEnvironment>) -> Arc<Self> {
        let classifier = Arc::new(Classifier::new(config.targets.clone()));
        Arc::new(Self {
            hook: MethodHook::new(classifier.clone()),
            classifier,
            config,
            host,
            nav: Mutex::new(NavigationStateMachine::new()),
            status: StatusBoard::new(),
            cycles: Mutex::new(VecDeque::new()),
            registry: Mutex::new(InterceptorRegistry::new()),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn classifier(&self) -> Arc<Classifier> {
        self.classifier.clone()
    }

    /// Install the interceptors on `primitives` and seed the session from the
    /// current location. Seeding never schedules an installation cycle.
    /// Returns false if the interceptors were already installed.
    pub fn init(&self, primitives: &mut HostPrimitives) -> bool {
        let policy = CapabilityInterceptors::new(self.classifier.clone());
        let installed = lock(&self.registry).install(primitives, &policy);

        let location = self.host.location();
        lock(&self.nav).observe(&parse_route(&location.pathname));
        self.status.set_video_id(self.video_id());

        info!(
            installed,
            resolution = %self.classifier.targets().resolution_label(),
            "capability engine initialized"
        );
        installed
    }

    /// Restore the original primitives.
    pub fn shutdown(&self, primitives: &mut HostPrimitives) -> bool {
        lock(&self.registry).uninstall(primitives)
    }

    /// Drop the playback session, the cycle record and the status.
    pub fn reset(&self) {
        lock(&self.nav).reset();
        lock(&self.cycles).clear();
        self.status.set_video_id(None);
        self.status.set_playback_active(false);
    }

    /// Run a fresh patch traversal over `root`.
    pub fn patch(&self, root: &HostValue) -> PatchReport {
        self.classifier.patch(root)
    }

    /// Re-evaluate the current location. A new session schedules a cycle.
    pub fn observe(self: &Arc<Self>, reason: &str) -> Transition {
        let location = self.host.location();
        let transition = lock(&self.nav).observe(&parse_route(&location.pathname));

        match &transition {
            Transition::Entered { video_id } | Transition::Switched { to: video_id, .. } => {
                info!(video_id = %video_id, reason, "playback session started");
                self.status.set_video_id(Some(video_id.clone()));
                self.schedule_cycle(reason);
            }
            Transition::Left { video_id } => {
                info!(video_id = %video_id, "left watch route");
                self.status.set_video_id(None);
                self.status.set_playback_active(false);
            }
            Transition::Unchanged => {}
        }
        transition
    }

    /// A player element appeared: re-evaluate, and retry installation for a
    /// session that is still unhooked.
    pub fn player_signal(self: &Arc<Self>, reason: &str) -> Transition {
        let transition = self.observe(reason);
        if transition == Transition::Unchanged {
            let pending = lock(&self.nav)
                .session()
                .is_some_and(|s| !s.hook_installed);
            if pending {
                self.schedule_cycle(reason);
            }
        }
        transition
    }

    /// Forget the installed flag and schedule a full cycle.
    pub fn force_rehook(self: &Arc<Self>, reason: &str) {
        info!(reason, "rehook requested");
        lock(&self.nav).clear_installed();
        self.schedule_cycle(reason);
    }

    /// Record a cycle and start one timer per reinstall delay. Each attempt
    /// is a no-op once installed.
    fn schedule_cycle(self: &Arc<Self>, reason: &str) {
        let cycle = InstallCycle {
            video_id: self.video_id(),
            reason: reason.to_string(),
            scheduled_at: Utc::now(),
        };
        {
            let mut cycles = lock(&self.cycles);
            if cycles.len() == CYCLE_LOG_CAPACITY {
                cycles.pop_front();
            }
            cycles.push_back(cycle);
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime for delayed attempts, trying once now");
            self.try_install();
            return;
        };
        for delay in self.config.timings.reinstall_delays() {
            let engine = Arc::clone(self);
            handle.spawn(async move {
                tokio::time::sleep(delay).await;
                let outcome = engine.try_install();
                debug!(?outcome, delay_ms = delay.as_millis() as u64, "scheduled install attempt");
            });
        }
    }

    /// One installation attempt against the late-bound player.
    pub fn try_install(&self) -> InstallOutcome {
        if lock(&self.nav).hook_installed() {
            return InstallOutcome::AlreadyInstalled;
        }
        let Some(namespace) = self.host.namespace() else {
            return InstallOutcome::NamespaceMissing;
        };
        self.hook.walk_namespace(&namespace);

        let player = match namespace.get("player") {
            Ok(Some(HostValue::Object(player))) => player,
            Ok(_) => return InstallOutcome::PlayerMissing,
            Err(e) => {
                debug!("namespace unreadable: {e}");
                return InstallOutcome::PlayerMissing;
            }
        };
        match self.hook.install_on(&player) {
            Ok(methods) => {
                lock(&self.nav).mark_installed();
                InstallOutcome::Installed { methods }
            }
            Err(e) => {
                debug!("player install failed: {e}");
                InstallOutcome::PlayerMissing
            }
        }
    }

    /// The periodic attempt: patch the namespace if present, then install.
    pub fn opportunistic_attempt(&self) -> InstallOutcome {
        if let Some(namespace) = self.host.namespace() {
            self.patch(&HostValue::Object(namespace));
        }
        self.try_install()
    }

    pub fn cycles(&self) -> Vec<InstallCycle> {
        lock(&self.cycles).iter().cloned().collect()
    }

    pub fn session(&self) -> Option<PlaybackSession> {
        lock(&self.nav).session().cloned()
    }

    pub fn video_id(&self) -> Option<String> {
        lock(&self.nav).video_id().map(str::to_string)
    }

    /// Apply a video observation; a pause is published immediately.
    pub fn record_video(&self, obs: &VideoObservation) {
        if self.status.record_video(obs) {
            self.publish_status();
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<OutboundMessage> {
        self.status.subscribe()
    }

    pub fn publish_status(&self) -> usize {
        self.status.publish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::json::{from_json, to_json};
    use crate::host::sandbox::SandboxHost;
    use crate::host::{HostFunction, ObjectRef};
    use serde_json::json;

    fn engine_at(path: &str) -> (Arc<CapabilityEngine>, Arc<SandboxHost>) {
        let host = Arc::new(SandboxHost::new(path));
        let engine = CapabilityEngine::new(RuntimeConfig::default(), host.clone());
        (engine, host)
    }

    fn namespace_with_player() -> ObjectRef {
        let player = ObjectRef::from_entries([
            ("maxBitrate", HostValue::from(5000)),
            (
                "play",
                HostValue::Function(HostFunction::new("play", |_| Ok(HostValue::Null))),
            ),
        ]);
        ObjectRef::from_entries([("player", HostValue::Object(player))])
    }

    #[test]
    fn test_init_seeds_without_scheduling() {
        let (engine, _host) = engine_at("/watch/42");
        let mut primitives = HostPrimitives::native();
        assert!(engine.init(&mut primitives));
        assert!(!engine.init(&mut primitives));
        assert_eq!(engine.video_id().as_deref(), Some("42"));
        assert!(engine.cycles().is_empty());
        assert_eq!(engine.snapshot().stats.video_id.as_deref(), Some("42"));

        let parsed = primitives.parse.parse(r#"{"maxVideoBitrate":5000}"#).unwrap();
        assert_eq!(to_json(&parsed).unwrap(), json!({"maxVideoBitrate": 16000}));
        assert!(engine.shutdown(&mut primitives));
    }

    #[test]
    fn test_install_outcomes() {
        let (engine, host) = engine_at("/watch/1");
        engine.init(&mut HostPrimitives::native());
        assert_eq!(engine.try_install(), InstallOutcome::NamespaceMissing);

        host.set_namespace(Some(ObjectRef::new()));
        assert_eq!(engine.try_install(), InstallOutcome::PlayerMissing);

        let ns = namespace_with_player();
        host.set_namespace(Some(ns.clone()));
        assert_eq!(engine.try_install(), InstallOutcome::Installed { methods: 1 });
        assert_eq!(engine.try_install(), InstallOutcome::AlreadyInstalled);

        let player = ns.get("player").unwrap().unwrap();
        assert_eq!(to_json(&player).unwrap(), json!({"maxBitrate": 16000}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_session_schedules_one_cycle() {
        let (engine, host) = engine_at("/browse");
        engine.init(&mut HostPrimitives::native());
        host.set_namespace(Some(namespace_with_player()));

        host.navigate("/watch/7");
        assert_eq!(
            engine.observe("poll"),
            Transition::Entered {
                video_id: "7".into()
            }
        );
        assert_eq!(engine.observe("poll"), Transition::Unchanged);
        assert_eq!(engine.cycles().len(), 1);

        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        assert!(engine.session().unwrap().hook_installed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_rehook_reinstalls() {
        let (engine, host) = engine_at("/watch/7");
        engine.init(&mut HostPrimitives::native());
        host.set_namespace(Some(namespace_with_player()));
        assert!(engine.try_install().is_settled());

        engine.force_rehook("control message");
        assert!(!engine.session().unwrap().hook_installed);
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        assert!(engine.session().unwrap().hook_installed);
        assert_eq!(engine.cycles()[0].reason, "control message");
    }

    #[test]
    fn test_leaving_clears_status() {
        let (engine, host) = engine_at("/watch/9");
        engine.init(&mut HostPrimitives::native());
        engine.record_video(&VideoObservation {
            width: 3840,
            height: 2160,
            playing: true,
        });
        host.navigate("/browse");
        assert_eq!(
            engine.observe("poll"),
            Transition::Left {
                video_id: "9".into()
            }
        );
        let stats = engine.snapshot().stats;
        assert!(!stats.playback_active);
        assert_eq!(stats.video_id, None);
        assert_eq!(stats.current_resolution.as_deref(), Some("3840x2160"));
    }

    #[test]
    fn test_reset() {
        let (engine, _host) = engine_at("/watch/9");
        engine.init(&mut HostPrimitives::native());
        engine.force_rehook("manual");
        engine.reset();
        assert!(engine.session().is_none());
        assert!(engine.cycles().is_empty());
        let report = engine.patch(&from_json(&json!({"maxHeight": 1080})));
        assert_eq!(report.corrections, 1);
    }
}
