//! History-mutation primitives and the hook that reports them.

use crate::navigation::signal::NavSignal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HistoryMethod {
    PushState,
    ReplaceState,
}

/// The two in-place navigation primitives of the host.
pub trait History: Send + Sync {
    fn push_state(&self, url: &str);
    fn replace_state(&self, url: &str);
}

/// Calls the original primitive, then posts a navigation signal once the
/// settle delay has passed so the location reflects the new route.
pub struct HistoryHook {
    original: Arc<dyn History>,
    signals: mpsc::UnboundedSender<NavSignal>,
    settle: Duration,
}

impl HistoryHook {
    pub fn new(
        original: Arc<dyn History>,
        signals: mpsc::UnboundedSender<NavSignal>,
        settle: Duration,
    ) -> Self {
        Self {
            original,
            signals,
            settle,
        }
    }

    /// Report a back/forward navigation. Like the mutations, it is delivered
    /// once the settle delay has passed.
    pub fn pop_state(&self) {
        self.notify(NavSignal::PopState);
    }

    fn notify(&self, signal: NavSignal) {
        let signals = self.signals.clone();
        let settle = self.settle;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(settle).await;
                    send(&signals, signal);
                });
            }
            Err(_) => {
                debug!("no runtime for settle delay, signalling immediately");
                send(&signals, signal);
            }
        }
    }
}

fn send(signals: &mpsc::UnboundedSender<NavSignal>, signal: NavSignal) {
    if let Err(e) = signals.send(signal) {
        debug!(signal = ?e.0, "navigation monitor gone, signal dropped");
    }
}

impl History for HistoryHook {
    fn push_state(&self, url: &str) {
        self.original.push_state(url);
        self.notify(NavSignal::History(HistoryMethod::PushState));
    }

    fn replace_state(&self, url: &str) {
        self.original.replace_state(url);
        self.notify(NavSignal::History(HistoryMethod::ReplaceState));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl History for Recorder {
        fn push_state(&self, url: &str) {
            self.0.lock().unwrap().push(format!("push {url}"));
        }
        fn replace_state(&self, url: &str) {
            self.0.lock().unwrap().push(format!("replace {url}"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_after_settle_delay() {
        let recorder = Arc::new(Recorder::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let hook = HistoryHook::new(recorder.clone(), tx, Duration::from_millis(50));

        hook.push_state("/watch/1");
        assert_eq!(*recorder.0.lock().unwrap(), vec!["push /watch/1"]);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rx.recv().await, Some(NavSignal::History(HistoryMethod::PushState)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pop_state_waits_for_settle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let hook = HistoryHook::new(Arc::new(Recorder::default()), tx, Duration::from_millis(50));

        hook.pop_state();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(rx.try_recv().unwrap(), NavSignal::PopState);
    }

    #[test]
    fn test_closed_monitor_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let recorder = Arc::new(Recorder::default());
        let hook = HistoryHook::new(recorder.clone(), tx, Duration::from_millis(50));
        hook.push_state("/watch/9");
        hook.pop_state();
        assert_eq!(*recorder.0.lock().unwrap(), vec!["push /watch/9"]);
    }

    #[test]
    fn test_signal_without_runtime_is_immediate() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let hook = HistoryHook::new(Arc::new(Recorder::default()), tx, Duration::from_millis(50));
        hook.replace_state("/browse");
        assert_eq!(
            rx.try_recv().unwrap(),
            NavSignal::History(HistoryMethod::ReplaceState)
        );
    }
}
