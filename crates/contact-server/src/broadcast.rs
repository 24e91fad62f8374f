//! Per-room broadcast groups, grounded on `poker-server::room::RoomManager`'s
//! per-player `mpsc` sender map (no broadcast fan-out of private data, each
//! connection drains its own channel).
//!
//! Unlike the poker room manager, a Contact room's membership is entirely
//! driven by `contact-core`'s matchmaking — this registry only tracks where
//! to deliver already-serialized frames, it never creates or destroys rooms
//! itself.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};

pub type SessionTx = mpsc::UnboundedSender<String>;
pub type SessionRx = mpsc::UnboundedReceiver<String>;

#[derive(Default)]
struct RoomGroup {
    senders: HashMap<String, SessionTx>,
}

/// Tracks, per room, the outbound channel for each connected player's
/// session so a completed action can fan its snapshot out to everyone in
/// the room (or back to just the acting player, for errors and player-scoped
/// queries).
#[derive(Default)]
pub struct BroadcastRegistry {
    rooms: RwLock<HashMap<String, RoomGroup>>,
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `room_id`'s group as `player_id`, returning the receiving half
    /// of this session's outbound channel.
    pub async fn join(self: &Arc<Self>, room_id: &str, player_id: &str) -> SessionRx {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut rooms = self.rooms.write().await;
        rooms.entry(room_id.to_string()).or_default().senders.insert(player_id.to_string(), tx);
        rx
    }

    /// Leave a room's group (called on disconnect). Drops the empty group
    /// entirely once the last sender is removed.
    pub async fn leave(&self, room_id: &str, player_id: &str) {
        let mut rooms = self.rooms.write().await;
        let Some(group) = rooms.get_mut(room_id) else { return };
        group.senders.remove(player_id);
        if group.senders.is_empty() {
            rooms.remove(room_id);
        }
    }

    /// Send pre-serialized `payload` to every session in `room_id`.
    pub async fn broadcast(&self, room_id: &str, payload: &str) {
        let rooms = self.rooms.read().await;
        let Some(group) = rooms.get(room_id) else { return };
        for tx in group.senders.values() {
            let _ = tx.send(payload.to_string());
        }
    }

    /// Send pre-serialized `payload` to exactly one session.
    pub async fn unicast(&self, room_id: &str, player_id: &str, payload: &str) {
        let rooms = self.rooms.read().await;
        let Some(group) = rooms.get(room_id) else { return };
        if let Some(tx) = group.senders.get(player_id) {
            let _ = tx.send(payload.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_member_but_not_other_rooms() {
        let registry = Arc::new(BroadcastRegistry::new());
        let mut alice_rx = registry.join("room-1", "alice").await;
        let mut bob_rx = registry.join("room-1", "bob").await;
        let mut carol_rx = registry.join("room-2", "carol").await;

        registry.broadcast("room-1", "hello").await;

        assert_eq!(alice_rx.try_recv().unwrap(), "hello");
        assert_eq!(bob_rx.try_recv().unwrap(), "hello");
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unicast_reaches_only_the_named_player() {
        let registry = Arc::new(BroadcastRegistry::new());
        let mut alice_rx = registry.join("room-1", "alice").await;
        let mut bob_rx = registry.join("room-1", "bob").await;

        registry.unicast("room-1", "alice", "just for you").await;

        assert_eq!(alice_rx.try_recv().unwrap(), "just for you");
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_removes_empty_room_group() {
        let registry = Arc::new(BroadcastRegistry::new());
        let _rx = registry.join("room-1", "alice").await;
        registry.leave("room-1", "alice").await;
        // A broadcast into a now-empty/removed room is simply a no-op.
        registry.broadcast("room-1", "anyone there?").await;
    }
}
