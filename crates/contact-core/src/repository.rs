//! Domain-specific operations over the ObjectMapper (spec §4.3), grounded on
//! `original_source/contact/game/storage.py`'s module-level functions.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::models::{Offer, Player, Room};
use crate::record::{Entity, Mapper};
use crate::store::Store;

const FREE_ROOM_KEY: &str = "free_room";

fn disconnection_key(player_id: &str) -> String {
    format!("disconnection:{player_id}")
}

fn cleaning_key(room_id: &str) -> String {
    format!("cleaning:room:{room_id}")
}

/// Shared handle over the store plus the domain operations every Engine
/// needs, independent of any one connection's lifetime.
#[derive(Clone)]
pub struct Repository {
    store: Arc<Store>,
    config: Arc<Config>,
}

impl Repository {
    pub fn new(store: Arc<Store>, config: Arc<Config>) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn mapper(&self) -> Mapper<'_> {
        Mapper::new(&self.store)
    }

    pub async fn get_by_id<T: Entity>(&self, id: &str) -> Option<T> {
        self.mapper().get_by_id(id).await
    }

    pub async fn save<T: Entity>(&self, record: &T) {
        self.mapper().save(record).await
    }

    pub async fn refresh<T: Entity>(&self, record: &mut T) {
        self.mapper().refresh(record).await
    }

    pub async fn increment_field<T: Entity>(&self, record: &mut T, field: &str, delta: i64) {
        self.mapper().increment_field(record, field, delta).await
    }

    pub async fn get_or_create_player(&self, username: &str) -> (Player, bool) {
        self.mapper().get_or_create(username, Player::blank).await
    }

    // -- Free room / matchmaking -------------------------------------------

    pub async fn get_free_room(&self) -> Option<Room> {
        let room_id = self.store.get(FREE_ROOM_KEY).await?;
        self.get_by_id(&room_id).await
    }

    pub async fn create_room(&self) -> Room {
        let room = Room::blank(crate::fields::new_hex_id());
        self.save(&room).await;
        self.store.set(FREE_ROOM_KEY, &room.id, None).await;
        room
    }

    pub async fn unfree(&self, room: &Room) {
        if self.store.get(FREE_ROOM_KEY).await.as_deref() == Some(room.id.as_str()) {
            self.store.del(&[FREE_ROOM_KEY]).await;
        }
    }

    // -- Room-scoped collections --------------------------------------------

    pub async fn get_player_ids(&self, room: &Room) -> Vec<String> {
        self.store.lrange(&room.players_list_key(), 0, -1).await
    }

    pub async fn get_offer_ids(&self, room: &Room) -> Vec<String> {
        self.store.lrange(&room.offers_list_key(), 0, -1).await
    }

    pub async fn get_room_players(&self, room: &Room) -> Vec<Player> {
        let mut players = Vec::new();
        for id in self.get_player_ids(room).await {
            if let Some(player) = self.get_by_id::<Player>(&id).await {
                players.push(player);
            }
        }
        players
    }

    pub async fn get_room_offers(&self, room: &Room) -> Vec<Offer> {
        let mut offers = Vec::new();
        for id in self.get_offer_ids(room).await {
            if let Some(offer) = self.get_by_id::<Offer>(&id).await {
                offers.push(offer);
            }
        }
        offers
    }

    pub async fn append_player_to_room(&self, player: &mut Player, room: &mut Room) {
        player.room_id = room.id.clone();
        self.save(player).await;
        self.increment_field(room, "number_of_players", 1).await;
        self.store.rpush(&room.players_list_key(), &player.id).await;
    }

    pub async fn append_offer_to_room(&self, offer: &Offer, room: &Room) {
        self.store.rpush(&room.offers_list_key(), &offer.id).await;
    }

    /// Deletes every offer record plus the list itself (spec §4.4's
    /// "clear all pending offers in the room" on successful contact).
    pub async fn clear_offers(&self, room: &Room) {
        let offer_ids = self.get_offer_ids(room).await;
        for id in &offer_ids {
            self.store.del(&[&Offer::key_for(id)]).await;
        }
        self.store.del(&[&room.offers_list_key()]).await;
    }

    pub async fn mark_offer_processed(&self, offer: &Offer, room: &Room) {
        self.store.sadd(&room.processed_answers_set_key(), &offer.answer_internal).await;
    }

    pub async fn check_answer_relevance(&self, answer: &str, room: &Room) -> bool {
        !self.store.sismember(&room.processed_answers_set_key(), answer).await
    }

    // -- Disconnection markers ----------------------------------------------

    pub async fn set_player_disconnected(&self, player: &Player) {
        let ttl = self.config.grace_window() + Duration::from_secs(5);
        self.store.set(&disconnection_key(&player.id), "1", Some(ttl)).await;
    }

    pub async fn delete_player_from_disconnected(&self, player: &Player) {
        self.store.del(&[&disconnection_key(&player.id)]).await;
    }

    pub async fn check_for_disconnected_player(&self, player: &Player) -> bool {
        self.store.exists(&disconnection_key(&player.id)).await
    }

    // -- Room cleanup ---------------------------------------------------------

    pub async fn room_is_cleaning(&self, room: &Room) -> bool {
        self.store.exists(&cleaning_key(&room.id)).await
    }

    pub async fn room_exists(&self, room: &Room) -> bool {
        self.store.exists(&room.storage_key()).await
    }

    /// Schedules (but does not await) the cleanup sweep: sets the cleaning
    /// marker, sleeps `cleanup_delay`, then deletes every record/list/set
    /// belonging to `room`, plus `free_room` if it still points here
    /// (spec §4.3 `orderRoomCleaning`).
    pub fn order_room_cleaning(&self, room: Room) {
        let repository = self.clone();
        tokio::spawn(async move {
            repository.store.set(&cleaning_key(&room.id), "1", None).await;
            tracing::debug!(room_id = %room.id, "room cleaning scheduled");
            tokio::time::sleep(repository.config.cleanup_delay()).await;

            let offer_ids = repository.get_offer_ids(&room).await;
            let player_ids = repository.get_player_ids(&room).await;

            let offer_keys: Vec<String> = offer_ids.iter().map(|id| Offer::key_for(id)).collect();
            let player_keys: Vec<String> = player_ids.iter().map(|id| Player::key_for(id)).collect();
            let mut keys: Vec<&str> = offer_keys.iter().map(String::as_str).collect();
            keys.extend(player_keys.iter().map(String::as_str));
            let room_key = room.storage_key();
            let players_list_key = room.players_list_key();
            let offers_list_key = room.offers_list_key();
            let processed_key = room.processed_answers_set_key();
            keys.push(&room_key);
            keys.push(&players_list_key);
            keys.push(&offers_list_key);
            keys.push(&processed_key);
            repository.store.del(&keys).await;

            if repository.store.get(FREE_ROOM_KEY).await.as_deref() == Some(room.id.as_str()) {
                repository.store.del(&[FREE_ROOM_KEY]).await;
            }

            repository.store.del(&[&cleaning_key(&room.id)]).await;
            tracing::debug!(room_id = %room.id, "room cleaning done");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> Repository {
        Repository::new(Arc::new(Store::new()), Arc::new(Config::default()))
    }

    #[tokio::test]
    async fn create_room_sets_free_room_pointer() {
        let repository = repository();
        let room = repository.create_room().await;
        let free = repository.get_free_room().await.expect("free room set");
        assert_eq!(free.id, room.id);
    }

    #[tokio::test]
    async fn unfree_only_clears_matching_room() {
        let repository = repository();
        let room = repository.create_room().await;
        let other = Room::blank("other".to_string());
        repository.unfree(&other).await;
        assert!(repository.get_free_room().await.is_some());
        repository.unfree(&room).await;
        assert!(repository.get_free_room().await.is_none());
    }

    #[tokio::test]
    async fn append_player_to_room_updates_player_and_list() {
        let repository = repository();
        let mut room = repository.create_room().await;
        let mut player = Player::blank("alice".to_string());
        repository.append_player_to_room(&mut player, &mut room).await;
        assert_eq!(player.room_id, room.id);
        assert_eq!(room.number_of_players, 1);
        assert_eq!(repository.get_player_ids(&room).await, vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn processed_answers_gate_relevance() {
        let repository = repository();
        let room = repository.create_room().await;
        assert!(repository.check_answer_relevance("ant", &room).await);
        let mut offer = Offer::blank("o1".to_string());
        offer.answer_internal = "ant".to_string();
        repository.mark_offer_processed(&offer, &room).await;
        assert!(!repository.check_answer_relevance("ant", &room).await);
    }

    #[tokio::test]
    async fn disconnection_marker_round_trips() {
        let repository = repository();
        let player = Player::blank("bob".to_string());
        assert!(!repository.check_for_disconnected_player(&player).await);
        repository.set_player_disconnected(&player).await;
        assert!(repository.check_for_disconnected_player(&player).await);
        repository.delete_player_from_disconnected(&player).await;
        assert!(!repository.check_for_disconnected_player(&player).await);
    }

    #[tokio::test]
    async fn clear_offers_removes_records_and_list() {
        let repository = repository();
        let room = repository.create_room().await;
        let offer = Offer::blank("o1".to_string());
        repository.save(&offer).await;
        repository.append_offer_to_room(&offer, &room).await;
        repository.clear_offers(&room).await;
        assert!(repository.get_offer_ids(&room).await.is_empty());
        assert!(repository.get_by_id::<Offer>("o1").await.is_none());
    }

    #[tokio::test]
    async fn order_room_cleaning_removes_everything_after_delay() {
        let mut config = Config::default();
        config.cleanup_delay_secs = 0;
        let repository = Repository::new(Arc::new(Store::new()), Arc::new(config));
        let mut room = repository.create_room().await;
        let mut player = Player::blank("alice".to_string());
        repository.append_player_to_room(&mut player, &mut room).await;

        repository.order_room_cleaning(room.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(repository.get_by_id::<Room>(&room.id).await.is_none());
        assert!(repository.get_by_id::<Player>("alice").await.is_none());
        assert!(repository.get_free_room().await.is_none());
    }
}
