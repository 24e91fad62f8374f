//! Transport-bound actor, one per WebSocket connection (spec §4.5), grounded
//! on `poker-server::ws_handler`'s lobby-then-game-loop shape and
//! `consumers.py`'s `ContactGameWSConsumer`.
//!
//! A session hub owns exactly one `Engine`, so the "single-threaded
//! cooperative per connection" scheduling model (spec §5) falls straight out
//! of this being the only task that ever calls into that engine: inbound
//! frames and fired delayed actions are multiplexed onto the one `select!`
//! loop below rather than handed to separate tasks.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use contact_core::{ActionOutcome, ClientEvent, DelayedAction, Delegate, Engine, Entity, GameEvent, Offer, Repository, Room};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::broadcast::BroadcastRegistry;

fn room_payload(room: &Room, offers: &[Offer]) -> Value {
    let mut data = room.public_data();
    if let Value::Object(ref mut map) = data {
        map.insert("offers".to_string(), json!(offers.iter().map(Offer::public_data).collect::<Vec<_>>()));
    }
    data
}

/// Maps an inbound action to the event name its outbound echo carries
/// (spec §6: the server broadcasts under the same event as the action).
fn event_for_action(action: &ClientEvent) -> GameEvent {
    match action {
        ClientEvent::Join { .. } => GameEvent::Join,
        ClientEvent::Word { .. } => GameEvent::Word,
        ClientEvent::Offer { .. } => GameEvent::Offer,
        ClientEvent::OfferComment { .. } => GameEvent::OfferComment,
        ClientEvent::Contact { .. } => GameEvent::Contact,
        ClientEvent::ContactCancel { .. } => GameEvent::ContactCancel,
        ClientEvent::RoomState => GameEvent::RoomState,
        ClientEvent::PlayerState => GameEvent::PlayerState,
    }
}

pub async fn handle_socket(socket: WebSocket, registry: Arc<BroadcastRegistry>, repository: Repository) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    // ── Lobby: wait for `join` before anything else is accepted ──────────
    let username = loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(ClientEvent::Join { username }) => break username,
                Ok(_) => {
                    let _ = ws_sink.send(Message::Text(error_json("join a game first").into())).await;
                },
                Err(error) => {
                    let _ = ws_sink
                        .send(Message::Text(error_json(&format!("invalid message: {error}")).into()))
                        .await;
                },
            },
            Some(Ok(Message::Close(_))) | None => return,
            _ => continue,
        }
    };

    let (delegate_tx, mut delegate_rx) = mpsc::unbounded_channel::<DelayedAction>();
    let delegate = Delegate::new(delegate_tx);
    let join_outcome = Engine::join(repository, delegate, &username).await;
    let mut engine = join_outcome.engine;
    let room_id = engine.room.id.clone();
    let player_id = engine.player.id.clone();

    let mut outbound_rx = registry.join(&room_id, &player_id).await;

    let write_handle = tokio::spawn(async move {
        while let Some(payload) = outbound_rx.recv().await {
            if ws_sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // Initial snapshot: `start` broadcasts (a new room is filling), `continue`
    // is unicast to the restored session only (spec §4.5). Either way the
    // payload carries the room's live offers, not an empty placeholder.
    let offers = engine.room_offers().await;
    let initial_payload = serde_json::to_string(&contact_core::ServerEnvelope::new(
        join_outcome.event,
        room_payload(&engine.room, &offers),
    ))
    .expect("envelope always serializes");
    match join_outcome.event {
        GameEvent::Start => registry.broadcast(&room_id, &initial_payload).await,
        _ => registry.unicast(&room_id, &player_id, &initial_payload).await,
    }

    tracing::info!(room_id = %room_id, player_id = %player_id, event = join_outcome.event.as_str(), "session joined");

    // Delayed actions fire on their own timer but are always *applied* back
    // on this task, keeping the Engine single-owner (spec §9: "independent
    // timers scoped to the SessionHub's lifetime").
    let (fired_tx, mut fired_rx) = mpsc::unbounded_channel::<DelayedAction>();

    loop {
        tokio::select! {
            delayed = delegate_rx.recv() => {
                let Some(delayed) = delayed else { continue };
                let fired_tx = fired_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delayed.after).await;
                    let _ = fired_tx.send(delayed);
                });
            }
            fired = fired_rx.recv() => {
                let Some(delayed) = fired else { continue };
                let Some(event) = GameEvent::parse(&delayed.event) else { continue };
                apply_outcome(&registry, &room_id, &player_id, event, engine.perform_delayed_action(event, delayed.action_kwargs).await).await;
            }
            frame = ws_stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(action) => {
                                let event = event_for_action(&action);
                                let outcome = engine.perform_action(action).await;
                                apply_outcome(&registry, &room_id, &player_id, event, outcome).await;
                            }
                            Err(error) => {
                                registry.unicast(&room_id, &player_id, &error_json(&format!("invalid message: {error}"))).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => continue,
                }
            }
        }
    }

    write_handle.abort();
    engine.disconnect_player().await;
    registry.leave(&room_id, &player_id).await;
    tracing::info!(room_id = %room_id, player_id = %player_id, "session disconnected");
}

async fn apply_outcome(
    registry: &Arc<BroadcastRegistry>,
    room_id: &str,
    player_id: &str,
    event: GameEvent,
    outcome: Result<ActionOutcome, contact_core::GameError>,
) {
    match outcome {
        Ok(ActionOutcome::Room { room, offers }) => {
            let envelope = contact_core::ServerEnvelope::new(event, room_payload(&room, &offers));
            if let Ok(payload) = serde_json::to_string(&envelope) {
                registry.broadcast(room_id, &payload).await;
            }
        },
        Ok(ActionOutcome::Player(player)) => {
            let envelope = contact_core::ServerEnvelope::new(event, player.public_data());
            if let Ok(payload) = serde_json::to_string(&envelope) {
                registry.unicast(room_id, player_id, &payload).await;
            }
        },
        Ok(ActionOutcome::Silent) => {},
        Err(error) => {
            let envelope = contact_core::ErrorEnvelope::from_game_error(event, &error);
            if let Ok(payload) = serde_json::to_string(&envelope) {
                registry.unicast(room_id, player_id, &payload).await;
            }
        },
    }
}

fn error_json(details: &str) -> String {
    json!({"error": true, "event": "join", "data": {"details": details, "errorType": "action"}}).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_for_action_mirrors_the_inbound_event() {
        assert_eq!(event_for_action(&ClientEvent::RoomState).as_str(), "room_state");
        assert_eq!(event_for_action(&ClientEvent::PlayerState).as_str(), "player_state");
        assert_eq!(
            event_for_action(&ClientEvent::Word { word: "apple".to_string() }).as_str(),
            "word"
        );
    }
}
