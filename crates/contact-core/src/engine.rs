//! Per-connection game brain (spec §4.4), grounded on
//! `original_source/contact/game/game_manager.py`'s `GameManager`.
//!
//! One `Engine` owns one player's view of one room. Every public action is
//! synchronous in the sense spec §5 requires: once started, a call runs
//! straight through to completion without yielding to another action on the
//! same connection; suspension only happens inside store calls and inside
//! the delegate's timer wait, both already `.await`ed serially here.

use std::time::Duration;

use serde_json::{Value, json};

use crate::delegate::Delegate;
use crate::errors::GameError;
use crate::models::{FinishReason, Offer, Player, Room};
use crate::protocol::{ClientEvent, GameEvent};
use crate::repository::Repository;

const POINTS_CONTACT_CANCEL: i64 = 1;
const POINTS_CONTACT_INITIATOR_SUCCESS: i64 = 3;
const POINTS_CONTACT_PARTICIPANT_SUCCESS: i64 = 2;

/// What a completed action should become on the wire, from the SessionHub's
/// point of view (spec §4.5: broadcast the room snapshot, unicast a player
/// snapshot, or emit nothing at all).
#[derive(Debug)]
pub enum ActionOutcome {
    Room { room: Room, offers: Vec<Offer> },
    Player(Player),
    /// The "do-not-broadcast" signal (spec §7): a delayed handler completed
    /// but found its own premise stale (e.g. the disconnected player
    /// reconnected before the grace window elapsed).
    Silent,
}

pub struct JoinOutcome {
    pub engine: Engine,
    /// `Start` for a newly-matchmade player, `Continue` for one rejoining an
    /// existing room (spec §4.5: restored sessions get a unicast snapshot).
    pub event: GameEvent,
}

/// Indexes `value` by Unicode scalar value up to `len` code points (spec
/// §4.4/`SPEC_FULL.md`: "for Unicode-safe play use code-point indexing").
fn code_point_prefix(value: &str, len: usize) -> String {
    value.chars().take(len).collect()
}

pub struct Engine {
    repository: Repository,
    delegate: Delegate,
    pub player: Player,
    pub room: Room,
}

impl Engine {
    /// `Player.getOrCreate(username)` plus matchmaking (spec §4.4
    /// construction). A restored player whose room has since been cleaned up
    /// is treated as a fresh joiner rather than erroring.
    pub async fn join(repository: Repository, delegate: Delegate, username: &str) -> JoinOutcome {
        let (mut player, created) = repository.get_or_create_player(username).await;
        let mut restored = !created;

        let room = if restored {
            match repository.get_by_id::<Room>(&player.room_id).await {
                Some(room) => {
                    repository.delete_player_from_disconnected(&player).await;
                    room
                },
                None => {
                    restored = false;
                    Self::append_user_to_game(&repository, &delegate, &mut player).await
                },
            }
        } else {
            Self::append_user_to_game(&repository, &delegate, &mut player).await
        };

        let event = if restored { GameEvent::Continue } else { GameEvent::Start };
        JoinOutcome { engine: Engine { repository, delegate, player, room }, event }
    }

    /// Matchmaker (spec §4.3/§4.6): take the free room or create one, seat
    /// the player, and promote to full (host election + `unfree` + the
    /// wall-clock `FINISH(timeExpired)` timer) once capacity is reached.
    async fn append_user_to_game(repository: &Repository, delegate: &Delegate, player: &mut Player) -> Room {
        let mut room = match repository.get_free_room().await {
            Some(room) => room,
            None => repository.create_room().await,
        };

        repository.append_player_to_room(player, &mut room).await;

        if room.number_of_players as usize >= repository.config().players_per_room {
            let players = repository.get_room_players(&room).await;
            if let Some(host) = players.first() {
                room.game_host_key = host.id.clone();
                if host.id == player.id {
                    player.is_host = true;
                    repository.save(player).await;
                } else {
                    let mut host_player = host.clone();
                    host_player.is_host = true;
                    repository.save(&host_player).await;
                }
            }
            room.is_full = true;
            repository.unfree(&room).await;
            repository.save(&room).await;

            delegate.order_delayed_action(
                repository.config().game_time_limit(),
                GameEvent::Finish.as_str(),
                json!({"reason": FinishReason::TimeExpired.as_str()}),
            );

            tracing::info!(room_id = %room.id, host = %room.game_host_key, "room filled");
        }

        room
    }

    /// Dispatch a client-originated action (spec §4.4's action table).
    /// Refreshes player and room first, matching spec §5's "refresh before
    /// any read that depends on state possibly modified by another session".
    pub async fn perform_action(&mut self, action: ClientEvent) -> Result<ActionOutcome, GameError> {
        self.repository.refresh(&mut self.player).await;
        self.repository.refresh(&mut self.room).await;

        match action {
            ClientEvent::Join { .. } => Err(GameError::action("already joined")),
            ClientEvent::Word { word } => self.set_word(word).await,
            ClientEvent::Offer { answer, definition } => self.offer(answer, definition).await,
            ClientEvent::OfferComment { offer_id, comment_text } => {
                self.offer_comment(offer_id, comment_text).await
            },
            ClientEvent::Contact { offer_id, estimated_word } => self.contact(offer_id, estimated_word).await,
            ClientEvent::ContactCancel { offer_id, estimated_word } => {
                self.cancel_contact(offer_id, estimated_word).await
            },
            ClientEvent::RoomState => self.room_state().await,
            ClientEvent::PlayerState => self.player_state().await,
        }
    }

    /// Re-invoke a scheduled delayed action (spec §4.5: "invokes the same
    /// handler as an inbound message"). `FINISH` and `CONTACT_RESULT` are
    /// the only events ever scheduled this way.
    pub async fn perform_delayed_action(
        &mut self,
        event: GameEvent,
        action_kwargs: Value,
    ) -> Result<ActionOutcome, GameError> {
        self.repository.refresh(&mut self.player).await;
        self.repository.refresh(&mut self.room).await;

        match event {
            GameEvent::ContactResult => self.contact_result().await,
            GameEvent::Finish => {
                let reason = action_kwargs
                    .get("reason")
                    .and_then(Value::as_str)
                    .and_then(FinishReason::parse)
                    .unwrap_or(FinishReason::TimeExpired);
                let winner_hint = action_kwargs.get("winner").and_then(Value::as_str).map(str::to_string);
                self.finish(reason, winner_hint).await
            },
            _ => Err(GameError::action("event is not schedulable")),
        }
    }

    async fn room_snapshot(&self) -> Result<ActionOutcome, GameError> {
        let offers = self.room_offers().await;
        Ok(ActionOutcome::Room { room: self.room.clone(), offers })
    }

    /// The room's current offers, for building a snapshot outside action
    /// dispatch (spec §4.5's initial join payload, sent before any action
    /// has run).
    pub async fn room_offers(&self) -> Vec<Offer> {
        self.repository.get_room_offers(&self.room).await
    }

    async fn set_word(&mut self, word: String) -> Result<ActionOutcome, GameError> {
        if !self.player.is_host {
            return Err(GameError::rule("only the host may set the word"));
        }
        self.room.hosted_word = word.to_lowercase();
        self.room.game_is_started = true;
        self.repository.save(&self.room).await;
        self.room_snapshot().await
    }

    async fn offer(&mut self, answer: String, definition: String) -> Result<ActionOutcome, GameError> {
        if self.player.is_host {
            return Err(GameError::rule("the host may not post an offer"));
        }
        let answer = answer.to_lowercase();
        if !self.repository.check_answer_relevance(&answer, &self.room).await {
            return Err(GameError::action("that answer has already been contacted"));
        }
        let open_word = self.room.open_word();
        if code_point_prefix(&answer, open_word.chars().count()) != open_word {
            return Err(GameError::action("answer does not fit open letters"));
        }

        let mut new_offer = Offer::blank(crate::fields::new_hex_id());
        new_offer.sender_id = self.player.id.clone();
        new_offer.definition = definition.to_lowercase();
        new_offer.answer_internal = answer;

        self.repository.save(&new_offer).await;
        self.repository.append_offer_to_room(&new_offer, &self.room).await;
        self.room_snapshot().await
    }

    async fn offer_comment(&mut self, offer_id: String, comment_text: String) -> Result<ActionOutcome, GameError> {
        let mut offer = self
            .repository
            .get_by_id::<Offer>(&offer_id)
            .await
            .ok_or_else(|| GameError::action("offer not found"))?;
        if offer.is_canceled {
            return Err(GameError::rule("offer has been canceled"));
        }
        if offer.sender_id != self.player.id {
            return Err(GameError::rule("only the sender may comment on their own offer"));
        }
        offer.hints.push(comment_text);
        self.repository.save(&offer).await;
        self.room_snapshot().await
    }

    async fn cancel_contact(&mut self, offer_id: String, estimated_word: String) -> Result<ActionOutcome, GameError> {
        if !self.player.is_host {
            return Err(GameError::rule("only the host may cancel a contact"));
        }
        let mut offer = self
            .repository
            .get_by_id::<Offer>(&offer_id)
            .await
            .ok_or_else(|| GameError::action("offer not found"))?;
        if offer.is_canceled {
            return Err(GameError::rule("offer is already canceled"));
        }

        if offer.answer_internal == estimated_word.to_lowercase() {
            offer.is_canceled = true;
            self.repository.save(&offer).await;
            self.repository.increment_field(&mut self.player, "points", POINTS_CONTACT_CANCEL).await;
        }

        self.room_snapshot().await
    }

    async fn contact(&mut self, offer_id: String, estimated_word: String) -> Result<ActionOutcome, GameError> {
        if self.room.contact_in_process {
            return Err(GameError::rule("a contact is already in progress"));
        }
        let mut offer = self
            .repository
            .get_by_id::<Offer>(&offer_id)
            .await
            .ok_or_else(|| GameError::action("offer not found"))?;
        if offer.sender_id == self.player.id {
            return Err(GameError::rule("the offer's sender may not contact it"));
        }
        if offer.is_canceled {
            return Err(GameError::rule("offer has been canceled"));
        }

        let estimated_word = estimated_word.to_lowercase();
        let open_word = self.room.open_word();
        if code_point_prefix(&estimated_word, open_word.chars().count()) != open_word {
            return Err(GameError::action("estimated word does not fit open letters"));
        }

        offer.in_process = true;
        offer.participants.push(self.player.id.clone());
        offer.estimated_word = estimated_word;
        self.repository.save(&offer).await;

        self.room.contact_in_process = true;
        self.room.contact_offer_key = offer.id.clone();
        self.repository.save(&self.room).await;

        self.delegate.order_delayed_action(
            self.repository.config().contact_window(),
            GameEvent::ContactResult.as_str(),
            json!({}),
        );

        self.room_snapshot().await
    }

    /// Resolve the room's active contact (spec §4.4 "Contact resolution").
    /// Only ever reached via a scheduled delayed action, never a direct
    /// client event.
    async fn contact_result(&mut self) -> Result<ActionOutcome, GameError> {
        let offer_id = self.room.contact_offer_key.clone();
        let Some(mut offer) = self.repository.get_by_id::<Offer>(&offer_id).await else {
            self.room.contact_in_process = false;
            self.repository.save(&self.room).await;
            return Ok(ActionOutcome::Silent);
        };

        let success = !offer.is_canceled && offer.estimated_word == offer.answer_internal;
        offer.is_contacted = success;
        self.repository.save(&offer).await;

        let hosted_len = self.room.hosted_word.chars().count() as i64;
        let full_word_guessed = offer.answer_internal == self.room.hosted_word;
        let about_to_complete = hosted_len - self.room.open_letters_number == 1;

        if about_to_complete || (success && offer.estimated_word == self.room.hosted_word) || full_word_guessed {
            let winner = if success {
                offer.participants.last().cloned().unwrap_or_else(|| offer.sender_id.clone())
            } else {
                offer.sender_id.clone()
            };
            self.delegate.order_delayed_action(
                Duration::from_millis(500),
                GameEvent::Finish.as_str(),
                json!({"reason": FinishReason::PlayersWon.as_str(), "winner": winner}),
            );
        }

        if success {
            self.repository.increment_field(&mut self.room, "open_letters_number", 1).await;
            self.repository.mark_offer_processed(&offer, &self.room).await;
            self.award_contact_points(&offer).await;
            self.repository.clear_offers(&self.room).await;
        }

        self.room.contact_in_process = false;
        self.repository.save(&self.room).await;

        self.room_snapshot().await
    }

    /// Spec §9 Open Question 1 / `SPEC_FULL.md`'s point-crediting supplement:
    /// the last participant to attempt this offer is the contact initiator
    /// (3 points); any earlier participants on the same still-open offer are
    /// credited the participant rate (2 points).
    async fn award_contact_points(&mut self, offer: &Offer) {
        let Some((initiator_id, earlier)) = offer.participants.split_last() else {
            return;
        };
        for participant_id in earlier {
            if let Some(mut participant) = self.repository.get_by_id::<Player>(participant_id).await {
                self.repository
                    .increment_field(&mut participant, "points", POINTS_CONTACT_PARTICIPANT_SUCCESS)
                    .await;
            }
        }
        if initiator_id == &self.player.id {
            self.repository.increment_field(&mut self.player, "points", POINTS_CONTACT_INITIATOR_SUCCESS).await;
        } else if let Some(mut initiator) = self.repository.get_by_id::<Player>(initiator_id).await {
            self.repository.increment_field(&mut initiator, "points", POINTS_CONTACT_INITIATOR_SUCCESS).await;
        }
    }

    /// Spec §4.4 "FINISH handling" plus `SPEC_FULL.md`'s winner/reason
    /// completion supplement. Idempotent: a room already finished silently
    /// no-ops a second delivery.
    pub async fn finish(&mut self, reason: FinishReason, winner_hint: Option<String>) -> Result<ActionOutcome, GameError> {
        if self.room.game_is_finished {
            return Ok(ActionOutcome::Silent);
        }

        if reason == FinishReason::Disconnection && !self.repository.check_for_disconnected_player(&self.player).await
        {
            // The player reconnected within the grace window; the marker is
            // gone, so this scheduled finish is stale.
            return Ok(ActionOutcome::Silent);
        }

        self.room.game_is_finished = true;
        self.room.game_finish_reason = reason.as_str().to_string();
        self.room.winner = match reason {
            FinishReason::Disconnection | FinishReason::TimeExpired => "none".to_string(),
            FinishReason::HostWon => self.room.game_host_key.clone(),
            FinishReason::PlayersWon => winner_hint.unwrap_or_else(|| "none".to_string()),
        };
        self.repository.save(&self.room).await;

        if reason == FinishReason::Disconnection {
            self.repository.order_room_cleaning(self.room.clone());
        }

        tracing::info!(room_id = %self.room.id, reason = reason.as_str(), winner = %self.room.winner, "game finished");
        self.room_snapshot().await
    }

    async fn room_state(&mut self) -> Result<ActionOutcome, GameError> {
        self.room_snapshot().await
    }

    async fn player_state(&mut self) -> Result<ActionOutcome, GameError> {
        Ok(ActionOutcome::Player(self.player.clone()))
    }

    /// Invoked by the SessionHub on socket close (spec §4.4 "Disconnect
    /// handling"). A reconnect of the same player before the scheduled
    /// `FINISH` fires causes it to self-cancel via the recheck in `finish`.
    pub async fn disconnect_player(&mut self) {
        self.repository.refresh(&mut self.room).await;
        let already_cleaning = self.repository.room_is_cleaning(&self.room).await;
        let still_exists = self.repository.room_exists(&self.room).await;

        if self.room.is_full && !already_cleaning && still_exists {
            self.repository.set_player_disconnected(&self.player).await;
            self.delegate.order_delayed_action(
                self.repository.config().grace_window(),
                GameEvent::Finish.as_str(),
                json!({"reason": FinishReason::Disconnection.as_str()}),
            );
            tracing::debug!(player_id = %self.player.id, room_id = %self.room.id, "player disconnected, finish scheduled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::Store;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn repository() -> Repository {
        Repository::new(Arc::new(Store::new()), Arc::new(Config::default()))
    }

    fn delegate() -> (Delegate, mpsc::UnboundedReceiver<crate::delegate::DelayedAction>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Delegate::new(tx), rx)
    }

    /// S1: three players fill a room in order; the third triggers full +
    /// deterministic host election + a scheduled timeExpired finish.
    #[tokio::test]
    async fn s1_matchmaking_fills_a_room() {
        let repository = repository();
        let (delegate, mut rx) = delegate();

        let alice = Engine::join(repository.clone(), delegate.clone(), "alice").await;
        assert_eq!(alice.event.as_str(), "start");
        assert_eq!(alice.engine.room.number_of_players, 1);
        assert!(!alice.engine.room.is_full);

        let bob = Engine::join(repository.clone(), delegate.clone(), "bob").await;
        assert_eq!(bob.engine.room.number_of_players, 2);

        let carol = Engine::join(repository.clone(), delegate.clone(), "carol").await;
        assert_eq!(carol.engine.room.number_of_players, 3);
        assert!(carol.engine.room.is_full);
        assert_eq!(carol.engine.room.game_host_key, "alice");
        assert!(repository.get_free_room().await.is_none());

        let scheduled = rx.try_recv().expect("finish scheduled");
        assert_eq!(scheduled.event, "finish");
        assert_eq!(scheduled.after, repository.config().game_time_limit());
    }

    async fn fill_room() -> (Engine, Engine, Engine, mpsc::UnboundedReceiver<crate::delegate::DelayedAction>) {
        let repository = repository();
        let (delegate, rx) = delegate();
        let alice = Engine::join(repository.clone(), delegate.clone(), "alice").await.engine;
        let bob = Engine::join(repository.clone(), delegate.clone(), "bob").await.engine;
        let carol = Engine::join(repository.clone(), delegate.clone(), "carol").await.engine;
        (alice, bob, carol, rx)
    }

    /// S2: happy word-reveal path through offer -> contact -> contact_result.
    #[tokio::test]
    async fn s2_happy_word_reveal() {
        let (mut alice, mut bob, mut carol, mut rx) = fill_room().await;

        alice.perform_action(ClientEvent::Word { word: "apple".to_string() }).await.unwrap();
        let _ = rx.try_recv(); // drain the timeExpired finish scheduled at fill-time

        let outcome =
            bob.perform_action(ClientEvent::Offer { answer: "ant".to_string(), definition: "insect".to_string() })
                .await
                .unwrap();
        let ActionOutcome::Room { offers, .. } = outcome else { panic!("expected room snapshot") };
        let offer_id = offers[0].id.clone();

        carol
            .perform_action(ClientEvent::Contact { offer_id: offer_id.clone(), estimated_word: "ant".to_string() })
            .await
            .unwrap();
        let scheduled = rx.try_recv().expect("contact_result scheduled");
        assert_eq!(scheduled.event, "contact_result");

        carol.repository.refresh(&mut carol.room).await;
        let outcome = carol.perform_delayed_action(GameEvent::ContactResult, scheduled.action_kwargs).await.unwrap();
        let ActionOutcome::Room { room, offers } = outcome else { panic!("expected room snapshot") };
        assert_eq!(room.open_letters_number, 2);
        assert_eq!(room.open_word(), "ap");
        assert!(!room.contact_in_process);
        assert!(offers.is_empty());
        assert!(!carol.repository.check_answer_relevance("ant", &room).await);
    }

    /// S3: host cancels within the window; canceling player earns a point,
    /// open letters stay put.
    #[tokio::test]
    async fn s3_host_cancels_contact() {
        let (mut alice, mut bob, mut carol, mut rx) = fill_room().await;
        alice.perform_action(ClientEvent::Word { word: "apple".to_string() }).await.unwrap();
        let _ = rx.try_recv();

        let outcome =
            bob.perform_action(ClientEvent::Offer { answer: "ant".to_string(), definition: "insect".to_string() })
                .await
                .unwrap();
        let ActionOutcome::Room { offers, .. } = outcome else { panic!() };
        let offer_id = offers[0].id.clone();

        carol
            .perform_action(ClientEvent::Contact { offer_id: offer_id.clone(), estimated_word: "ant".to_string() })
            .await
            .unwrap();
        let scheduled = rx.try_recv().unwrap();

        alice
            .perform_action(ClientEvent::ContactCancel { offer_id: offer_id.clone(), estimated_word: "ant".to_string() })
            .await
            .unwrap();
        assert_eq!(alice.player.points, 1);

        alice.repository.refresh(&mut alice.room).await;
        let outcome = alice.perform_delayed_action(GameEvent::ContactResult, scheduled.action_kwargs).await.unwrap();
        let ActionOutcome::Room { room, .. } = outcome else { panic!() };
        assert_eq!(room.open_letters_number, 1);
        assert!(!room.contact_in_process);
        let offer = alice.repository.get_by_id::<Offer>(&offer_id).await.unwrap();
        assert!(offer.is_canceled);
        assert!(!offer.is_contacted);
    }

    /// S5: disconnect grace — a reconnect before the window elapses
    /// silently cancels the scheduled finish.
    #[tokio::test]
    async fn s5_disconnect_grace_reconnect_cancels_finish() {
        let (mut alice, _bob, _carol, mut rx) = fill_room().await;
        let _ = rx.try_recv();

        alice.disconnect_player().await;
        let scheduled = rx.try_recv().expect("disconnection finish scheduled");
        assert!(alice.repository.check_for_disconnected_player(&alice.player).await);

        alice.repository.delete_player_from_disconnected(&alice.player).await;

        let reason = FinishReason::parse(scheduled.action_kwargs["reason"].as_str().unwrap()).unwrap();
        let outcome = alice.finish(reason, None).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Silent));
        assert!(!alice.room.game_is_finished);
    }

    /// S4: a successful contact on an offer whose answer matches the full
    /// hosted word schedules a `playersWon` finish crediting the contacting
    /// player (the most recent participant), not the offer's sender.
    #[tokio::test]
    async fn s4_full_word_contact_schedules_players_won_finish() {
        let (mut alice, mut bob, mut carol, mut rx) = fill_room().await;
        alice.perform_action(ClientEvent::Word { word: "cat".to_string() }).await.unwrap();
        let _ = rx.try_recv();

        let outcome =
            bob.perform_action(ClientEvent::Offer { answer: "cat".to_string(), definition: "animal".to_string() })
                .await
                .unwrap();
        let ActionOutcome::Room { offers, .. } = outcome else { panic!("expected room snapshot") };
        let offer_id = offers[0].id.clone();

        carol
            .perform_action(ClientEvent::Contact { offer_id: offer_id.clone(), estimated_word: "cat".to_string() })
            .await
            .unwrap();
        let contact_result_scheduled = rx.try_recv().expect("contact_result scheduled");
        assert_eq!(contact_result_scheduled.event, "contact_result");

        carol.repository.refresh(&mut carol.room).await;
        let outcome =
            carol.perform_delayed_action(GameEvent::ContactResult, contact_result_scheduled.action_kwargs).await.unwrap();
        let ActionOutcome::Room { room, .. } = outcome else { panic!("expected room snapshot") };
        assert!(!room.game_is_finished);

        let finish_scheduled = rx.try_recv().expect("playersWon finish scheduled");
        assert_eq!(finish_scheduled.event, "finish");
        assert_eq!(finish_scheduled.after, Duration::from_millis(500));
        assert_eq!(finish_scheduled.action_kwargs["reason"], "playersWon");
        assert_eq!(finish_scheduled.action_kwargs["winner"], "carol");

        let reason = FinishReason::parse(finish_scheduled.action_kwargs["reason"].as_str().unwrap()).unwrap();
        let winner = finish_scheduled.action_kwargs["winner"].as_str().map(str::to_string);
        carol.repository.refresh(&mut carol.room).await;
        let outcome = carol.finish(reason, winner).await.unwrap();
        let ActionOutcome::Room { room, .. } = outcome else { panic!("expected room snapshot") };
        assert!(room.game_is_finished);
        assert_eq!(room.game_finish_reason, "playersWon");
        assert_eq!(room.winner, "carol");
    }

    /// S6: an offer whose answer doesn't fit the open letters is rejected
    /// with an action error and never persisted.
    #[tokio::test]
    async fn s6_illegal_offer_is_rejected() {
        let (mut alice, mut bob, _carol, mut rx) = fill_room().await;
        alice.perform_action(ClientEvent::Word { word: "apple".to_string() }).await.unwrap();
        let _ = rx.try_recv();

        let error = bob
            .perform_action(ClientEvent::Offer { answer: "xyz".to_string(), definition: "?".to_string() })
            .await
            .unwrap_err();
        assert_eq!(error.kind(), "action");

        let offers = bob.repository.get_room_offers(&bob.room).await;
        assert!(offers.is_empty());
    }
}
