//! Navigation monitor: the async runtime around the engine.
//!
//! Signals from every source funnel through one channel. The location
//! poller, the opportunistic installation loop and the status broadcaster
//! are independent timers spawned alongside the signal loop.

use crate::engine::CapabilityEngine;
use crate::navigation::history::{History, HistoryHook};
use crate::navigation::signal::{ControlMessage, NavSignal};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

pub struct NavigationMonitor {
    engine: Arc<CapabilityEngine>,
    tx: mpsc::UnboundedSender<NavSignal>,
    rx: mpsc::UnboundedReceiver<NavSignal>,
}

impl NavigationMonitor {
    pub fn new(engine: Arc<CapabilityEngine>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { engine, tx, rx }
    }

    /// Handle for external signal sources.
    pub fn sender(&self) -> mpsc::UnboundedSender<NavSignal> {
        self.tx.clone()
    }

    /// Wrap a history implementation so its mutations reach this monitor.
    pub fn history_hook(&self, original: Arc<dyn History>) -> HistoryHook {
        HistoryHook::new(original, self.sender(), self.engine.config().timings.settle())
    }

    /// Apply one signal to the engine.
    pub fn handle(&self, signal: NavSignal) {
        match signal {
            NavSignal::LocationPoll => {
                self.engine.observe("location poll");
            }
            NavSignal::History(method) => {
                self.engine.observe(&format!("history {method:?}"));
            }
            NavSignal::PopState => {
                self.engine.observe("popstate");
            }
            NavSignal::DomMutation(nodes) => {
                if nodes.iter().any(|n| n.is_player_signal()) {
                    self.engine.player_signal("player element added");
                }
            }
            NavSignal::Control(ControlMessage::Reinit { reason }) => {
                self.engine.force_rehook(&reason);
            }
            NavSignal::Video(obs) => self.engine.record_video(&obs),
        }
    }

    /// Run until `shutdown` is notified.
    pub async fn run(mut self, shutdown: Arc<Notify>) {
        let timers = [
            self.spawn_poller(),
            self.spawn_opportunistic(),
            self.spawn_status(),
        ];
        info!("navigation monitor started");

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                signal = self.rx.recv() => match signal {
                    Some(signal) => self.handle(signal),
                    None => break,
                },
            }
        }

        for timer in timers {
            timer.abort();
        }
        info!("navigation monitor stopped");
    }

    fn spawn_poller(&self) -> JoinHandle<()> {
        let tx = self.sender();
        let period = self.engine.config().timings.poll_interval();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(NavSignal::LocationPoll).is_err() {
                    break;
                }
            }
        })
    }

    fn spawn_opportunistic(&self) -> JoinHandle<()> {
        let engine = self.engine.clone();
        let timings = &engine.config().timings;
        let (period, window) = (timings.attempt_interval(), timings.attempt_window());
        tokio::spawn(async move {
            let deadline = Instant::now() + window;
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if Instant::now() >= deadline {
                    debug!("opportunistic install window closed");
                    break;
                }
                let outcome = engine.opportunistic_attempt();
                if outcome.is_settled() {
                    debug!(?outcome, "opportunistic install finished");
                    break;
                }
            }
        })
    }

    fn spawn_status(&self) -> JoinHandle<()> {
        let engine = self.engine.clone();
        let period = engine.config().timings.status_interval();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                engine.publish_status();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::host::sandbox::SandboxHost;
    use crate::host::{HostFunction, HostValue, ObjectRef};
    use crate::navigation::signal::DomNode;
    use std::time::Duration;

    fn setup(path: &str) -> (Arc<CapabilityEngine>, Arc<SandboxHost>, NavigationMonitor) {
        let host = Arc::new(SandboxHost::new(path));
        let engine = CapabilityEngine::new(RuntimeConfig::default(), host.clone());
        let monitor = NavigationMonitor::new(engine.clone());
        (engine, host, monitor)
    }

    #[test]
    fn test_player_dom_signal_retries_unhooked_session() {
        let (engine, _host, monitor) = setup("/watch/5");
        engine.init(&mut crate::intercept::HostPrimitives::native());

        monitor.handle(NavSignal::DomMutation(vec![DomNode::element("div")]));
        assert!(engine.cycles().is_empty());

        monitor.handle(NavSignal::DomMutation(vec![DomNode::element("video")]));
        assert_eq!(engine.cycles().len(), 1);
    }

    #[test]
    fn test_reinit_control_message() {
        let (engine, _host, monitor) = setup("/watch/5");
        monitor.handle(NavSignal::Control(ControlMessage::Reinit {
            reason: "content script".into(),
        }));
        assert_eq!(engine.cycles()[0].reason, "content script");
    }

    #[tokio::test(start_paused = true)]
    async fn test_opportunistic_loop_installs_without_navigation() {
        let (engine, host, monitor) = setup("/watch/5");
        engine.init(&mut crate::intercept::HostPrimitives::native());
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(monitor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(!engine.session().unwrap().hook_installed);

        let player = ObjectRef::from_entries([(
            "load",
            HostValue::Function(HostFunction::new("load", |_| Ok(HostValue::Null))),
        )]);
        host.set_namespace(Some(ObjectRef::from_entries([(
            "player",
            HostValue::Object(player),
        )])));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(engine.session().unwrap().hook_installed);
        assert!(engine.cycles().is_empty());

        shutdown.notify_one();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_broadcast_interval() {
        let (engine, _host, monitor) = setup("/watch/5");
        engine.init(&mut crate::intercept::HostPrimitives::native());
        let mut rx = engine.subscribe_status();
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(monitor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(rx.try_recv().is_err());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_ok());

        shutdown.notify_one();
        task.await.unwrap();
    }
}
