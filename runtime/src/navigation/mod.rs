//! Navigation tracking for a single-page application.
//!
//! Route changes arrive as [`signal::NavSignal`]s from several redundant
//! sources; the [`state::NavigationStateMachine`] collapses them into
//! session transitions and the [`monitor::NavigationMonitor`] turns those
//! into method-hook installation cycles.

pub mod history;
pub mod monitor;
pub mod route;
pub mod signal;
pub mod state;

pub use history::{History, HistoryHook, HistoryMethod};
pub use monitor::NavigationMonitor;
pub use route::{parse_route, Route};
pub use signal::{ControlMessage, DomNode, NavSignal, VideoObservation};
pub use state::{NavState, NavigationStateMachine, PlaybackSession, Transition};
