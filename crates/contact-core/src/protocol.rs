//! The wire envelope and event vocabulary (spec §6).
//!
//! Client and server share `{event, data}`; which concrete shape `data` takes
//! depends on `event`. Inbound action payloads are typed ([`ClientEvent`]);
//! outbound payloads are built by the engine/session layer from each
//! record's `public_data()` and carried as [`serde_json::Value`] rather than
//! re-typed here, since spec §6 leaves the exact snapshot shape to the
//! `publicData` projection rather than a fixed schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The wire-exact event vocabulary (spec §6), plus `join` (see
/// `SPEC_FULL.md`'s player identity handshake supplement).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    Join,
    Start,
    Continue,
    Finish,
    RoomState,
    PlayerState,
    Offer,
    OfferComment,
    Word,
    Contact,
    ContactResult,
    ContactCancel,
}

impl GameEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            GameEvent::Join => "join",
            GameEvent::Start => "start",
            GameEvent::Continue => "continue",
            GameEvent::Finish => "finish",
            GameEvent::RoomState => "room_state",
            GameEvent::PlayerState => "player_state",
            GameEvent::Offer => "offer",
            GameEvent::OfferComment => "offer_comment",
            GameEvent::Word => "word",
            GameEvent::Contact => "contact",
            GameEvent::ContactResult => "contact_result",
            GameEvent::ContactCancel => "contact_cancel",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "join" => GameEvent::Join,
            "start" => GameEvent::Start,
            "continue" => GameEvent::Continue,
            "finish" => GameEvent::Finish,
            "room_state" => GameEvent::RoomState,
            "player_state" => GameEvent::PlayerState,
            "offer" => GameEvent::Offer,
            "offer_comment" => GameEvent::OfferComment,
            "word" => GameEvent::Word,
            "contact" => GameEvent::Contact,
            "contact_result" => GameEvent::ContactResult,
            "contact_cancel" => GameEvent::ContactCancel,
            _ => return None,
        })
    }
}

/// Inbound `{event, data}` actions a session accepts, tagged by the event
/// string and keyed by payload shape (spec §4.4's action table plus the
/// `join`/`room_state` supplements).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Join {
        username: String,
    },
    Word {
        word: String,
    },
    Offer {
        answer: String,
        definition: String,
    },
    OfferComment {
        #[serde(rename = "offerId")]
        offer_id: String,
        #[serde(rename = "commentText")]
        comment_text: String,
    },
    Contact {
        #[serde(rename = "offerId")]
        offer_id: String,
        #[serde(rename = "estimatedWord")]
        estimated_word: String,
    },
    ContactCancel {
        #[serde(rename = "offerId")]
        offer_id: String,
        #[serde(rename = "estimatedWord")]
        estimated_word: String,
    },
    RoomState,
    PlayerState,
}

/// A successful action's broadcast/unicast envelope: `{event, data}` (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct ServerEnvelope {
    pub event: String,
    pub data: Value,
}

impl ServerEnvelope {
    pub fn new(event: GameEvent, data: Value) -> Self {
        Self { event: event.as_str().to_string(), data }
    }
}

/// A domain-error reply, unicast only to the offending session (spec §7).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: bool,
    pub event: String,
    pub data: ErrorData,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorData {
    pub details: String,
    #[serde(rename = "errorType")]
    pub error_type: String,
}

impl ErrorEnvelope {
    pub fn from_game_error(event: GameEvent, error: &crate::errors::GameError) -> Self {
        Self {
            error: true,
            event: event.as_str().to_string(),
            data: ErrorData { details: error.details().to_string(), error_type: error.kind().to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_strings_round_trip() {
        for event in [
            GameEvent::Join,
            GameEvent::Start,
            GameEvent::Continue,
            GameEvent::Finish,
            GameEvent::RoomState,
            GameEvent::PlayerState,
            GameEvent::Offer,
            GameEvent::OfferComment,
            GameEvent::Word,
            GameEvent::Contact,
            GameEvent::ContactResult,
            GameEvent::ContactCancel,
        ] {
            assert_eq!(GameEvent::parse(event.as_str()), Some(event));
        }
    }

    #[test]
    fn client_event_decodes_tagged_envelope() {
        let raw = serde_json::json!({
            "event": "contact",
            "data": {"offerId": "abc", "estimatedWord": "ant"}
        });
        let decoded: ClientEvent = serde_json::from_value(raw).unwrap();
        match decoded {
            ClientEvent::Contact { offer_id, estimated_word } => {
                assert_eq!(offer_id, "abc");
                assert_eq!(estimated_word, "ant");
            },
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn error_envelope_carries_kind_and_details() {
        let error = crate::errors::GameError::rule("non-host tried to set word");
        let envelope = ErrorEnvelope::from_game_error(GameEvent::Word, &error);
        assert!(envelope.error);
        assert_eq!(envelope.data.error_type, "rule");
    }
}
