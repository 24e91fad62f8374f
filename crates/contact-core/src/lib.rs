pub mod config;
pub mod delegate;
pub mod engine;
pub mod errors;
pub mod fields;
pub mod models;
pub mod protocol;
pub mod record;
pub mod repository;
pub mod store;

pub use config::Config;
pub use delegate::{Delegate, DelayedAction};
pub use engine::{ActionOutcome, Engine, JoinOutcome};
pub use errors::GameError;
pub use models::{FinishReason, Offer, Player, Room};
pub use protocol::{ClientEvent, ErrorEnvelope, GameEvent, ServerEnvelope};
pub use record::{Entity, Mapper};
pub use repository::Repository;
pub use store::Store;
