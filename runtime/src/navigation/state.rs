//! Playback-session state machine.
//!
//! `Idle` off watch routes, `WatchActive` while a video identifier is in the
//! path. Observing the same identifier twice is a no-op, which is what
//! suppresses duplicate triggers from redundant signal sources.

use crate::navigation::route::Route;
use serde::Serialize;

/// The session tracked while on a watch route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackSession {
    pub video_id: String,
    pub hook_installed: bool,
}

impl PlaybackSession {
    fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            hook_installed: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NavState {
    #[default]
    Idle,
    WatchActive(PlaybackSession),
}

/// Result of observing a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Entered { video_id: String },
    Switched { from: String, to: String },
    Left { video_id: String },
    Unchanged,
}

#[derive(Debug, Default)]
pub struct NavigationStateMachine {
    state: NavState,
}

impl NavigationStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &NavState {
        &self.state
    }

    /// Feed the current route and apply the resulting transition.
    pub fn observe(&mut self, route: &Route) -> Transition {
        let current = self.video_id().map(str::to_string);
        match (route, current) {
            (Route::Watch(id), Some(from)) if from == *id => Transition::Unchanged,
            (Route::Watch(id), Some(from)) => {
                self.state = NavState::WatchActive(PlaybackSession::new(id.as_str()));
                Transition::Switched {
                    from,
                    to: id.clone(),
                }
            }
            (Route::Watch(id), None) => {
                self.state = NavState::WatchActive(PlaybackSession::new(id.as_str()));
                Transition::Entered {
                    video_id: id.clone(),
                }
            }
            (Route::Other, Some(video_id)) => {
                self.state = NavState::Idle;
                Transition::Left { video_id }
            }
            // The identifier has not reached the path yet, or nothing to leave.
            (Route::WatchPending, _) | (Route::Other, None) => Transition::Unchanged,
        }
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        match &self.state {
            NavState::WatchActive(session) => Some(session),
            NavState::Idle => None,
        }
    }

    pub fn video_id(&self) -> Option<&str> {
        self.session().map(|s| s.video_id.as_str())
    }

    pub fn hook_installed(&self) -> bool {
        self.session().is_some_and(|s| s.hook_installed)
    }

    /// Record a successful installation. Returns false if there is no
    /// session or it was already installed.
    pub fn mark_installed(&mut self) -> bool {
        match &mut self.state {
            NavState::WatchActive(session) if !session.hook_installed => {
                session.hook_installed = true;
                true
            }
            _ => false,
        }
    }

    /// Forget the installed flag so the next cycle wraps again.
    pub fn clear_installed(&mut self) {
        if let NavState::WatchActive(session) = &mut self.state {
            session.hook_installed = false;
        }
    }

    pub fn reset(&mut self) {
        self.state = NavState::Idle;
    }
}
