//! The Engine's weak back-reference to its owning session (spec §9 design
//! notes: "prefer sending a `DelayedAction{after, event, args}` message on a
//! channel the hub drains; the hub owns its timers and its lifetime").
//!
//! `Engine` never holds a pointer to the `SessionHub`/`Delegate` that will
//! eventually run a delayed action — only the sending half of a channel. The
//! hub owns the receiving half, spawns its own timers off it, and is free to
//! drop pending actions on shutdown without the Engine knowing or caring.

use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

/// A request to re-invoke `event` (as if it were an inbound action, with
/// `action_kwargs` as its payload) after `after` elapses.
#[derive(Debug, Clone)]
pub struct DelayedAction {
    pub after: Duration,
    pub event: String,
    pub action_kwargs: Value,
}

/// The sending half of an Engine's delayed-action channel. Cheaply
/// cloneable; every clone feeds the same hub-owned receiver.
#[derive(Clone)]
pub struct Delegate {
    sender: mpsc::UnboundedSender<DelayedAction>,
}

impl Delegate {
    pub fn new(sender: mpsc::UnboundedSender<DelayedAction>) -> Self {
        Self { sender }
    }

    /// Schedule `event` to run again after `after`, carrying `action_kwargs`
    /// (spec §4.4/§9 `orderDelayedAction`). A closed receiver (hub already
    /// shut down) is silently ignored — the action is simply abandoned,
    /// matching "on hub shutdown, pending timers are abandoned".
    pub fn order_delayed_action(&self, after: Duration, event: impl Into<String>, action_kwargs: Value) {
        let _ = self.sender.send(DelayedAction { after, event: event.into(), action_kwargs });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_delayed_action_delivers_on_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let delegate = Delegate::new(tx);
        delegate.order_delayed_action(Duration::from_secs(7), "contact_result", serde_json::json!({"offerId": "o1"}));
        let action = rx.try_recv().expect("action queued");
        assert_eq!(action.event, "contact_result");
        assert_eq!(action.after, Duration::from_secs(7));
        assert_eq!(action.action_kwargs["offerId"], "o1");
    }

    #[test]
    fn send_after_receiver_dropped_is_a_silent_no_op() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let delegate = Delegate::new(tx);
        delegate.order_delayed_action(Duration::from_secs(1), "finish", serde_json::json!({}));
    }
}
