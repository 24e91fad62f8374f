//! The three hash-backed record types (spec §3): [`Player`], [`Room`],
//! [`Offer`]. Field names mirror `original_source/contact/game/storage.py`
//! 1:1 (its attribute names are the wire keys a client actually receives),
//! since spec §6 only marks event strings and store keys as wire-exact and
//! leaves the per-record JSON shape to the implementation.

use serde_json::{Map, Value, json};
use std::collections::HashMap;

use crate::fields;
use crate::record::Entity;

// ---------------------------------------------------------------------------
// FinishReason
// ---------------------------------------------------------------------------

/// Spec §3 Room.finishReason: `disconnection | timeExpired | hostWon | playersWon`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Disconnection,
    TimeExpired,
    HostWon,
    PlayersWon,
}

impl FinishReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FinishReason::Disconnection => "disconnection",
            FinishReason::TimeExpired => "timeExpired",
            FinishReason::HostWon => "hostWon",
            FinishReason::PlayersWon => "playersWon",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "disconnection" => FinishReason::Disconnection,
            "timeExpired" => FinishReason::TimeExpired,
            "hostWon" => FinishReason::HostWon,
            "playersWon" => FinishReason::PlayersWon,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Spec §3 Player: `id` (stable = username), `isHost`, `roomId` (weak
/// back-reference, empty when not seated), `points`.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub is_host: bool,
    pub room_id: String,
    pub points: i64,
}

impl Player {
    pub fn blank(id: String) -> Self {
        Self { id, is_host: false, room_id: String::new(), points: 0 }
    }
}

impl Entity for Player {
    const PREFIX: &'static str = "player";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_store_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("is_host".to_string(), fields::encode_bool(self.is_host)),
            ("room_id".to_string(), self.room_id.clone()),
            ("points".to_string(), fields::encode_int(self.points)),
        ])
    }

    fn from_store_fields(id: String, raw: &HashMap<String, String>) -> Self {
        Self {
            id,
            is_host: fields::decode_bool(fields::get(raw, "is_host")),
            room_id: fields::get(raw, "room_id").to_string(),
            points: fields::decode_int(fields::get(raw, "points")),
        }
    }

    fn apply_increment(&mut self, field: &str, delta: i64) {
        if field == "points" {
            self.points += delta;
        }
    }

    fn public_data(&self) -> Value {
        let mut map = Map::new();
        map.insert("id_key".into(), json!(self.id));
        map.insert("is_game_host".into(), json!(self.is_host));
        if !self.room_id.is_empty() {
            map.insert("room_id".into(), json!(self.room_id));
        }
        map.insert("points".into(), json!(self.points));
        Value::Object(map)
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// Spec §3 Room. `hosted_word`, `open_letters_number`, and
/// `contact_offer_key` are internal (server-only); `open_word` is
/// calculated, never persisted.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    pub number_of_players: i64,
    pub game_host_key: String,
    pub is_full: bool,
    pub game_is_started: bool,
    pub game_is_finished: bool,
    pub winner: String,
    pub game_finish_reason: String,
    pub hosted_word: String,
    pub open_letters_number: i64,
    pub contact_in_process: bool,
    pub contact_offer_key: String,
}

impl Room {
    pub fn blank(id: String) -> Self {
        Self {
            id,
            number_of_players: 0,
            game_host_key: String::new(),
            is_full: false,
            game_is_started: false,
            game_is_finished: false,
            winner: String::new(),
            game_finish_reason: String::new(),
            hosted_word: String::new(),
            open_letters_number: 1,
            contact_in_process: false,
            contact_offer_key: String::new(),
        }
    }

    /// Calculated field: `hostedWord` truncated to `openLettersNumber`
    /// code points (spec §4.4: "for Unicode-safe play use code-point
    /// indexing"), empty while no word has been set.
    pub fn open_word(&self) -> String {
        if self.hosted_word.is_empty() {
            return String::new();
        }
        self.hosted_word
            .chars()
            .take(self.open_letters_number.max(0) as usize)
            .collect()
    }

    pub fn players_list_key(&self) -> String {
        format!("players:room:{}", self.id)
    }

    pub fn offers_list_key(&self) -> String {
        format!("offers:room:{}", self.id)
    }

    pub fn processed_answers_set_key(&self) -> String {
        format!("offers:processed:room:{}", self.id)
    }
}

impl Entity for Room {
    const PREFIX: &'static str = "room";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_store_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("number_of_players".to_string(), fields::encode_int(self.number_of_players)),
            ("game_host_key".to_string(), self.game_host_key.clone()),
            ("is_full".to_string(), fields::encode_bool(self.is_full)),
            ("game_is_started".to_string(), fields::encode_bool(self.game_is_started)),
            ("game_is_finished".to_string(), fields::encode_bool(self.game_is_finished)),
            ("winner".to_string(), self.winner.clone()),
            ("game_finish_reason".to_string(), self.game_finish_reason.clone()),
            ("hosted_word".to_string(), self.hosted_word.clone()),
            ("open_letters_number".to_string(), fields::encode_int(self.open_letters_number)),
            ("contact_in_process".to_string(), fields::encode_bool(self.contact_in_process)),
            ("contact_offer_key".to_string(), self.contact_offer_key.clone()),
        ])
    }

    fn from_store_fields(id: String, raw: &HashMap<String, String>) -> Self {
        Self {
            id,
            number_of_players: fields::decode_int(fields::get(raw, "number_of_players")),
            game_host_key: fields::get(raw, "game_host_key").to_string(),
            is_full: fields::decode_bool(fields::get(raw, "is_full")),
            game_is_started: fields::decode_bool(fields::get(raw, "game_is_started")),
            game_is_finished: fields::decode_bool(fields::get(raw, "game_is_finished")),
            winner: fields::get(raw, "winner").to_string(),
            game_finish_reason: fields::get(raw, "game_finish_reason").to_string(),
            hosted_word: fields::get(raw, "hosted_word").to_string(),
            open_letters_number: {
                let raw_value = fields::get(raw, "open_letters_number");
                if raw_value.is_empty() { 1 } else { fields::decode_int(raw_value) }
            },
            contact_in_process: fields::decode_bool(fields::get(raw, "contact_in_process")),
            contact_offer_key: fields::get(raw, "contact_offer_key").to_string(),
        }
    }

    fn apply_increment(&mut self, field: &str, delta: i64) {
        match field {
            "number_of_players" => self.number_of_players += delta,
            "open_letters_number" => self.open_letters_number += delta,
            _ => {}
        }
    }

    fn public_data(&self) -> Value {
        let mut map = Map::new();
        map.insert("id_key".into(), json!(self.id));
        map.insert("number_of_players".into(), json!(self.number_of_players));
        if !self.game_host_key.is_empty() {
            map.insert("game_host_key".into(), json!(self.game_host_key));
        }
        map.insert("is_full".into(), json!(self.is_full));
        map.insert("game_is_started".into(), json!(self.game_is_started));
        map.insert("game_is_finished".into(), json!(self.game_is_finished));
        if !self.winner.is_empty() {
            map.insert("winner".into(), json!(self.winner));
        }
        if !self.game_finish_reason.is_empty() {
            map.insert("game_finish_reason".into(), json!(self.game_finish_reason));
        }
        let open_word = self.open_word();
        if !open_word.is_empty() {
            map.insert("open_word".into(), json!(open_word));
        }
        map.insert("contact_in_process".into(), json!(self.contact_in_process));
        Value::Object(map)
    }
}

// ---------------------------------------------------------------------------
// Offer
// ---------------------------------------------------------------------------

/// Spec §3 Offer. `answer_internal` is internal; `answer` is calculated and
/// only revealed once the offer is contacted or canceled.
#[derive(Debug, Clone)]
pub struct Offer {
    pub id: String,
    pub sender_id: String,
    pub definition: String,
    pub answer_internal: String,
    pub hints: Vec<String>,
    pub is_canceled: bool,
    pub is_contacted: bool,
    pub in_process: bool,
    pub participants: Vec<String>,
    pub estimated_word: String,
}

impl Offer {
    pub fn blank(id: String) -> Self {
        Self {
            id,
            sender_id: String::new(),
            definition: String::new(),
            answer_internal: String::new(),
            hints: Vec::new(),
            is_canceled: false,
            is_contacted: false,
            in_process: false,
            participants: Vec::new(),
            estimated_word: String::new(),
        }
    }

    /// Calculated field: hidden until the offer has been contacted or
    /// canceled (spec §3: "exposed only after isContacted or isCanceled").
    pub fn answer(&self) -> Option<String> {
        if self.is_contacted || self.is_canceled {
            Some(self.answer_internal.clone())
        } else {
            None
        }
    }
}

impl Entity for Offer {
    const PREFIX: &'static str = "offer";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_store_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("sender_id".to_string(), self.sender_id.clone()),
            ("definition".to_string(), self.definition.clone()),
            ("answer_internal".to_string(), self.answer_internal.clone()),
            ("hints".to_string(), fields::encode_list(&self.hints)),
            ("is_canceled".to_string(), fields::encode_bool(self.is_canceled)),
            ("is_contacted".to_string(), fields::encode_bool(self.is_contacted)),
            ("in_process".to_string(), fields::encode_bool(self.in_process)),
            ("participants".to_string(), fields::encode_list(&self.participants)),
            ("estimated_word".to_string(), self.estimated_word.clone()),
        ])
    }

    fn from_store_fields(id: String, raw: &HashMap<String, String>) -> Self {
        Self {
            id,
            sender_id: fields::get(raw, "sender_id").to_string(),
            definition: fields::get(raw, "definition").to_string(),
            answer_internal: fields::get(raw, "answer_internal").to_string(),
            hints: fields::decode_list(fields::get(raw, "hints")),
            is_canceled: fields::decode_bool(fields::get(raw, "is_canceled")),
            is_contacted: fields::decode_bool(fields::get(raw, "is_contacted")),
            in_process: fields::decode_bool(fields::get(raw, "in_process")),
            participants: fields::decode_list(fields::get(raw, "participants")),
            estimated_word: fields::get(raw, "estimated_word").to_string(),
        }
    }

    fn apply_increment(&mut self, _field: &str, _delta: i64) {
        // Offer has no counter fields.
    }

    fn public_data(&self) -> Value {
        let mut map = Map::new();
        map.insert("id_key".into(), json!(self.id));
        map.insert("sender_id".into(), json!(self.sender_id));
        if !self.definition.is_empty() {
            map.insert("definition".into(), json!(self.definition));
        }
        if let Some(answer) = self.answer() {
            map.insert("answer".into(), json!(answer));
        }
        if !self.hints.is_empty() {
            map.insert("hints".into(), json!(self.hints));
        }
        map.insert("is_canceled".into(), json!(self.is_canceled));
        map.insert("is_contacted".into(), json!(self.is_contacted));
        map.insert("in_process".into(), json!(self.in_process));
        if !self.participants.is_empty() {
            map.insert("participants".into(), json!(self.participants));
        }
        if !self.estimated_word.is_empty() {
            map.insert("estimated_word".into(), json!(self.estimated_word));
        }
        Value::Object(map)
    }
}
