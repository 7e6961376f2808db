//! Route changes through the hooked history primitive, end to end.

use caplift_runtime::config::RuntimeConfig;
use caplift_runtime::engine::CapabilityEngine;
use caplift_runtime::host::sandbox::SandboxHost;
use caplift_runtime::host::{HostFunction, HostValue, ObjectRef};
use caplift_runtime::intercept::HostPrimitives;
use caplift_runtime::navigation::{
    ControlMessage, History, HistoryHook, NavSignal, NavigationMonitor, VideoObservation,
};
use caplift_runtime::status::OutboundMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

struct Page {
    host: Arc<SandboxHost>,
    engine: Arc<CapabilityEngine>,
    history: HistoryHook,
    signals: tokio::sync::mpsc::UnboundedSender<NavSignal>,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl Page {
    /// Starts the monitor and lets its first location poll run.
    async fn open(start: &str) -> Self {
        let host = Arc::new(SandboxHost::new(start));
        let engine = CapabilityEngine::new(RuntimeConfig::default(), host.clone());
        engine.init(&mut HostPrimitives::native());

        let monitor = NavigationMonitor::new(engine.clone());
        let history = monitor.history_hook(host.clone());
        let signals = monitor.sender();
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(monitor.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(1)).await;
        Self {
            host,
            engine,
            history,
            signals,
            shutdown,
            task,
        }
    }

    async fn close(self) {
        self.shutdown.notify_one();
        self.task.await.unwrap();
    }
}

fn namespace_with_player() -> ObjectRef {
    let player = ObjectRef::from_entries([
        ("maxVideoHeight", HostValue::from(1080)),
        (
            "load",
            HostValue::Function(HostFunction::new("load", |_| Ok(HostValue::Null))),
        ),
    ]);
    ObjectRef::from_entries([("player", HostValue::Object(player))])
}

#[tokio::test(start_paused = true)]
async fn test_rapid_switch_schedules_one_cycle_for_latest_video() {
    let page = Page::open("https://localhost/browse").await;

    page.history.push_state("/watch/111");
    tokio::time::sleep(Duration::from_millis(10)).await;
    page.history.push_state("/watch/222");
    tokio::time::sleep(Duration::from_millis(300)).await;

    let cycles = page.engine.cycles();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].video_id.as_deref(), Some("222"));

    // Same route again: identifier unchanged, no new cycle.
    page.history.push_state("/watch/222");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(page.engine.cycles().len(), 1);

    page.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_late_player_is_hooked() {
    let page = Page::open("https://localhost/browse").await;

    page.history.push_state("/watch/81234");
    // The player shows up after the first scheduled attempts missed it.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!page.engine.session().unwrap().hook_installed);
    page.host.set_namespace(Some(namespace_with_player()));

    tokio::time::sleep(Duration::from_millis(2000)).await;
    let session = page.engine.session().unwrap();
    assert_eq!(session.video_id, "81234");
    assert!(session.hook_installed);

    page.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_leaving_and_returning() {
    let page = Page::open("https://localhost/watch/1").await;
    assert_eq!(page.engine.video_id().as_deref(), Some("1"));

    page.history.replace_state("/browse");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(page.engine.session().is_none());

    page.history.push_state("/watch/1");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(page.engine.cycles().len(), 1);

    page.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_back_navigation_starts_previous_session() {
    let page = Page::open("https://localhost/browse").await;

    page.history.push_state("/watch/10");
    tokio::time::sleep(Duration::from_millis(100)).await;
    page.history.push_state("/watch/20");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(page.engine.video_id().as_deref(), Some("20"));

    assert!(page.host.back());
    page.history.pop_state();
    // Delivered after the settle delay, well before the next location poll.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(page.engine.video_id().as_deref(), Some("10"));
    assert_eq!(page.engine.cycles().len(), 3);

    page.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_poller_catches_untracked_navigation() {
    let page = Page::open("https://localhost/browse").await;

    // A location change that bypasses the history hook.
    page.host.navigate("/watch/5");
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(page.engine.video_id().as_deref(), Some("5"));

    page.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_reinit_and_pause_signals() {
    let page = Page::open("https://localhost/watch/3").await;
    let mut status = page.engine.subscribe_status();

    page.signals
        .send(NavSignal::Control(ControlMessage::Reinit {
            reason: "navigation monitor".into(),
        }))
        .unwrap();
    page.signals
        .send(NavSignal::Video(VideoObservation {
            width: 3840,
            height: 2160,
            playing: true,
        }))
        .unwrap();
    page.signals
        .send(NavSignal::Video(VideoObservation {
            width: 3840,
            height: 2160,
            playing: false,
        }))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(page.engine.cycles()[0].reason, "navigation monitor");
    // The pause is published right away, ahead of the periodic broadcast.
    let OutboundMessage::Status { stats } = status.try_recv().unwrap();
    assert!(!stats.stats.playback_active);
    assert_eq!(stats.stats.current_resolution.as_deref(), Some("3840x2160"));
    assert_eq!(stats.stats.video_id.as_deref(), Some("3"));

    page.close().await;
}
