//! Playback status snapshots and their periodic broadcast.

use crate::navigation::VideoObservation;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

/// Subscribers that fall this far behind start losing snapshots.
const STATUS_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStats {
    pub playback_active: bool,
    pub current_resolution: Option<String>,
    pub video_id: Option<String>,
}

/// Stats stamped with the time they were taken (Unix milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    #[serde(flatten)]
    pub stats: PlaybackStats,
    pub timestamp: i64,
}

/// Outbound structured messages, tagged on `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    Status { stats: StatusSnapshot },
}

/// Current playback stats plus the broadcast channel they are published on.
pub struct StatusBoard {
    stats: Mutex<PlaybackStats>,
    tx: broadcast::Sender<OutboundMessage>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            stats: Mutex::new(PlaybackStats::default()),
            tx,
        }
    }

    fn with_stats<R>(&self, f: impl FnOnce(&mut PlaybackStats) -> R) -> R {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats)
    }

    pub fn stats(&self) -> PlaybackStats {
        self.with_stats(|s| s.clone())
    }

    pub fn set_video_id(&self, video_id: Option<String>) {
        self.with_stats(|s| s.video_id = video_id);
    }

    pub fn set_playback_active(&self, active: bool) {
        self.with_stats(|s| s.playback_active = active);
    }

    /// Apply a video element observation. Returns true if playback just paused.
    pub fn record_video(&self, obs: &VideoObservation) -> bool {
        self.with_stats(|s| {
            let was_active = s.playback_active;
            if obs.width > 0 {
                s.current_resolution = Some(obs.resolution());
            }
            s.playback_active = obs.playing;
            was_active && !obs.playing
        })
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            stats: self.stats(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutboundMessage> {
        self.tx.subscribe()
    }

    /// Publish the current snapshot. Returns the number of receivers reached.
    pub fn publish(&self) -> usize {
        let stats = self.snapshot();
        self.tx.send(OutboundMessage::Status { stats }).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let msg = OutboundMessage::Status {
            stats: StatusSnapshot {
                stats: PlaybackStats {
                    playback_active: true,
                    current_resolution: Some("3840x2160".into()),
                    video_id: Some("81234".into()),
                },
                timestamp: 1_700_000_000_000,
            },
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "STATUS",
                "stats": {
                    "playbackActive": true,
                    "currentResolution": "3840x2160",
                    "videoId": "81234",
                    "timestamp": 1_700_000_000_000i64
                }
            })
        );
    }

    #[test]
    fn test_pause_detected() {
        let board = StatusBoard::new();
        let playing = VideoObservation {
            width: 1920,
            height: 1080,
            playing: true,
        };
        assert!(!board.record_video(&playing));
        assert_eq!(board.stats().current_resolution.as_deref(), Some("1920x1080"));
        assert!(board.record_video(&VideoObservation {
            playing: false,
            ..playing
        }));
        assert!(!board.stats().playback_active);
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let board = StatusBoard::new();
        assert_eq!(board.publish(), 0);

        let mut rx = board.subscribe();
        board.set_video_id(Some("7".into()));
        assert_eq!(board.publish(), 1);
        let OutboundMessage::Status { stats } = rx.recv().await.unwrap();
        assert_eq!(stats.stats.video_id.as_deref(), Some("7"));
        assert!(stats.timestamp > 0);
    }
}
