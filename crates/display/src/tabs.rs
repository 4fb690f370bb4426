//! Cross-instance force-update broadcast.
//!
//! The in-process counterpart of the legacy `barbershop_updates`
//! BroadcastChannel. The wire shape of the message is kept byte-compatible
//! (`{"type": "forceUpdate", "timestamp": …, "source": …}`) so bridged
//! deployments can relay it unchanged.
//!
//! Unlike a browser BroadcastChannel, an in-process broadcast echoes to the
//! sender too; receivers filter messages carrying their own session id.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use barberboard_core::SessionId;

/// The legacy channel name, kept for bridged deployments.
pub const CHANNEL_NAME: &str = "barbershop_updates";

const CHANNEL_CAPACITY: usize = 16;

/// A message on the update channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TabMessage {
    /// Every receiver should re-pull records and reload.
    #[serde(rename_all = "camelCase")]
    ForceUpdate {
        /// Millis at which the update was pushed.
        timestamp: i64,
        /// Session id of the pushing instance.
        source: SessionId,
    },
}

impl TabMessage {
    /// The session id of the instance that posted this message.
    #[must_use]
    pub const fn source(&self) -> &SessionId {
        match self {
            Self::ForceUpdate { source, .. } => source,
        }
    }
}

/// Handle to the shared update channel. Every display instance in the
/// process holds a clone of the same channel.
#[derive(Debug, Clone)]
pub struct TabChannel {
    sender: broadcast::Sender<TabMessage>,
}

impl TabChannel {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Post a message. Having no listeners is not an error.
    pub fn post(&self, message: TabMessage) {
        let _ = self.sender.send(message);
    }

    /// Subscribe to messages posted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TabMessage> {
        self.sender.subscribe()
    }
}

impl Default for TabChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_matches_the_legacy_channel() {
        let message = TabMessage::ForceUpdate {
            timestamp: 1_700_000_000_000,
            source: SessionId::from("user_abc123xyz".to_string()),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "forceUpdate",
                "timestamp": 1_700_000_000_000_i64,
                "source": "user_abc123xyz",
            })
        );
    }

    #[test]
    fn test_post_without_listeners_does_not_panic() {
        let channel = TabChannel::new();
        channel.post(TabMessage::ForceUpdate {
            timestamp: 1,
            source: SessionId::generate(),
        });
    }

    #[tokio::test]
    async fn test_clones_share_one_channel() {
        let channel = TabChannel::new();
        let clone = channel.clone();
        let mut rx = clone.subscribe();

        let message = TabMessage::ForceUpdate {
            timestamp: 9,
            source: SessionId::generate(),
        };
        channel.post(message.clone());
        assert_eq!(rx.recv().await.unwrap(), message);
    }
}
