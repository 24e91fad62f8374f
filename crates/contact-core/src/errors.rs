//! Domain errors reported back to a client.
//!
//! Spec §7 distinguishes exactly two client-visible error kinds: a `rule`
//! violation (an action the player is never allowed to take, e.g. a non-host
//! setting the word) and an `action` error (a structurally valid action whose
//! inputs don't fit the current state, e.g. an answer that doesn't match the
//! open letters). Anything else — store failures, malformed records — is an
//! infrastructure error and never becomes a `GameError`; the caller logs it
//! and drops the connection.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("{0}")]
    Rule(String),
    #[error("{0}")]
    Action(String),
}

impl GameError {
    pub fn rule(details: impl Into<String>) -> Self {
        Self::Rule(details.into())
    }

    pub fn action(details: impl Into<String>) -> Self {
        Self::Action(details.into())
    }

    /// The wire-exact `errorType` discriminant (spec §6).
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::Rule(_) => "rule",
            GameError::Action(_) => "action",
        }
    }

    pub fn details(&self) -> &str {
        match self {
            GameError::Rule(s) | GameError::Action(s) => s,
        }
    }
}
