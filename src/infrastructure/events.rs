use crate::domain::AnalyticsSnapshot;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

pub const ANALYTICS_UPDATE_EVENT: &str = "analyticsUpdate";
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsEvent {
    pub user_id: Uuid,
    pub snapshot: AnalyticsSnapshot,
}

impl AnalyticsEvent {
    /// Wire frame pushed to sockets: `{"event": "analyticsUpdate", "data": {...}}`.
    pub fn to_frame(&self) -> serde_json::Value {
        json!({ "event": ANALYTICS_UPDATE_EVENT, "data": self.snapshot })
    }
}

/// Fire-and-forget fan-out of analytics snapshots to connected sockets.
pub struct EventHub {
    sender: broadcast::Sender<AnalyticsEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalyticsEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of subscribers the event reached.
    pub fn publish_analytics(&self, user_id: Uuid, snapshot: AnalyticsSnapshot) -> usize {
        match self.sender.send(AnalyticsEvent { user_id, snapshot }) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(user_id = %user_id, "No socket subscribers for analytics update");
                0
            }
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_snapshots() {
        let hub = EventHub::default();
        let mut rx = hub.subscribe();
        let user_id = Uuid::new_v4();

        let snapshot = AnalyticsSnapshot {
            total_chats: 1,
            ..Default::default()
        };
        assert_eq!(hub.publish_analytics(user_id, snapshot.clone()), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.user_id, user_id);
        assert_eq!(event.to_frame()["event"], "analyticsUpdate");
        assert_eq!(event.to_frame()["data"]["totalChats"], 1);
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let hub = EventHub::default();
        assert_eq!(hub.publish_analytics(Uuid::new_v4(), AnalyticsSnapshot::default()), 0);
    }
}
