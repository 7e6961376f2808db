//! Signals that make the monitor re-evaluate navigation.

use crate::navigation::history::HistoryMethod;
use serde::{Deserialize, Serialize};

/// Player container classes that appear when the player mounts.
const PLAYER_CLASSES: &[&str] = &["watch-video", "VideoContainer", "nf-player-container"];
/// Root element id the player mounts under.
const PLAYER_MOUNT_ID: &str = "appMountPoint";

#[derive(Debug, Clone, PartialEq)]
pub enum NavSignal {
    /// Periodic location check.
    LocationPoll,
    /// A history mutation, delivered after the settle delay.
    History(HistoryMethod),
    /// Back/forward navigation.
    PopState,
    /// Nodes added to the document.
    DomMutation(Vec<DomNode>),
    /// Cross-context control message.
    Control(ControlMessage),
    /// State of the playing video element.
    Video(VideoObservation),
}

/// Inbound control messages, tagged on `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Force a fresh installation cycle.
    Reinit {
        #[serde(default)]
        reason: String,
    },
}

/// A minimal element description from a DOM mutation record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomNode {
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub children: Vec<DomNode>,
}

impl DomNode {
    pub fn element(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_child(mut self, child: DomNode) -> Self {
        self.children.push(child);
        self
    }

    /// True if this node is, or contains, a video element or player container.
    pub fn is_player_signal(&self) -> bool {
        self.tag.eq_ignore_ascii_case("video")
            || self.id.as_deref() == Some(PLAYER_MOUNT_ID)
            || self
                .classes
                .iter()
                .any(|c| PLAYER_CLASSES.contains(&c.as_str()))
            || self.children.iter().any(DomNode::is_player_signal)
    }
}

/// Dimensions and play state of the active video element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoObservation {
    pub width: u32,
    pub height: u32,
    pub playing: bool,
}

impl VideoObservation {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}
