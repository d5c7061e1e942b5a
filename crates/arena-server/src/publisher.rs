//! In-process room event fan-out.
//!
//! One `tokio::sync::broadcast` sender per channel. Publishing never blocks:
//! a channel nobody listens to drops the event, and a subscriber that falls
//! behind loses its oldest events instead of holding up the coordinator.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use arena_core::{Channel, NotificationPublisher, RoomEvent};
use tokio::sync::broadcast;

/// Broadcast-backed [`NotificationPublisher`].
#[derive(Debug)]
pub struct BroadcastPublisher {
    capacity: usize,
    channels: Mutex<HashMap<Channel, broadcast::Sender<RoomEvent>>>,
}

impl BroadcastPublisher {
    /// Create a publisher whose per-channel buffers hold `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), channels: Mutex::new(HashMap::new()) }
    }

    /// Subscribe to a channel, creating it on first use.
    ///
    /// Only events published after this call are received.
    pub fn subscribe(&self, channel: &Channel) -> broadcast::Receiver<RoomEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(channel.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Live subscribers on a channel.
    pub fn subscriber_count(&self, channel: &Channel) -> usize {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.get(channel).map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(64)
    }
}

impl NotificationPublisher for BroadcastPublisher {
    fn publish(&self, channel: &Channel, event: RoomEvent) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = channels.get(channel) else {
            tracing::trace!(%channel, "no subscribers, event dropped");
            return;
        };

        if sender.send(event).is_err() {
            // Every receiver is gone.
            channels.remove(channel);
            tracing::trace!(%channel, "last subscriber gone, channel pruned");
        }
    }
}

#[cfg(test)]
mod tests {
    use arena_core::{MemberJoined, MemberLeft};
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    use super::*;

    fn joined(nickname: &str) -> RoomEvent {
        RoomEvent::Joined(MemberJoined {
            nickname: nickname.to_string(),
            level: 1,
            remainder: 0,
            is_owner: false,
        })
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let publisher = BroadcastPublisher::new(8);
        let channel = Channel::room(1);
        let mut first = publisher.subscribe(&channel);
        let mut second = publisher.subscribe(&channel);

        publisher.publish(&channel, joined("alice"));

        assert_eq!(first.recv().await.unwrap(), joined("alice"));
        assert_eq!(second.recv().await.unwrap(), joined("alice"));
        assert_eq!(publisher.subscriber_count(&channel), 2);
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let publisher = BroadcastPublisher::new(8);
        let mut room_one = publisher.subscribe(&Channel::room(1));

        publisher.publish(&Channel::room(2), joined("bob"));
        publisher.publish(
            &Channel::room(1),
            RoomEvent::Left(MemberLeft { nickname: "carol".to_string(), new_owner: None }),
        );

        assert!(matches!(room_one.recv().await.unwrap(), RoomEvent::Left(_)));
        assert_eq!(room_one.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_dropped() {
        let publisher = BroadcastPublisher::new(8);
        publisher.publish(&Channel::room(1), joined("alice"));

        let mut late = publisher.subscribe(&Channel::room(1));
        assert_eq!(late.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn dropped_subscribers_prune_channel() {
        let publisher = BroadcastPublisher::new(8);
        let channel = Channel::room(1);
        drop(publisher.subscribe(&channel));

        publisher.publish(&channel, joined("alice"));
        assert_eq!(publisher.subscriber_count(&channel), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_without_blocking() {
        let publisher = BroadcastPublisher::new(2);
        let channel = Channel::room(1);
        let mut slow = publisher.subscribe(&channel);

        for name in ["a", "b", "c", "d"] {
            publisher.publish(&channel, joined(name));
        }

        assert_eq!(slow.recv().await, Err(RecvError::Lagged(2)));
        assert_eq!(slow.recv().await.unwrap(), joined("c"));
    }
}
