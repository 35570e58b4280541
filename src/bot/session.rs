//! Per-user conversational session state and its store.

use std::collections::HashMap;
use std::sync::Mutex;

use teloxide::types::UserId;

use crate::bot::reminders::Repeat;

/// How the user chose to express a reminder trigger time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeMode {
    Absolute,
    Relative,
}

/// Progress through a multi-step flow, with the scratch data each step needs.
///
/// A user with no stored session is idle. Only the success path of a flow
/// clears the entry; invalid input leaves it in place for a retry.
#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    /// Exchange flow: a currency was chosen, waiting for the amount.
    AwaitingAmount { currency: String },
    /// Reminder flow: waiting for a trigger time in the chosen grammar.
    AwaitingReminderTime { mode: TimeMode },
    /// Reminder flow: time resolved, waiting for the repeat choice and then
    /// the message text.
    AwaitingReminderMessage {
        trigger_time: i64,
        repeat: Option<Repeat>,
    },
}

/// Keyed session storage, injected into the flow handlers.
///
/// Last write wins: there is no per-user locking and no TTL, so concurrent
/// updates from the same user can overwrite each other and stale sessions
/// persist until overwritten or deleted.
pub trait SessionStore: Send + Sync {
    fn get(&self, user_id: UserId) -> Option<Session>;
    fn set(&self, user_id: UserId, session: Session);
    fn delete(&self, user_id: UserId);
}

/// Process-wide in-memory store. Sessions do not survive a restart.
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, user_id: UserId) -> Option<Session> {
        self.sessions.lock().unwrap().get(&user_id).cloned()
    }

    fn set(&self, user_id: UserId, session: Session) {
        self.sessions.lock().unwrap().insert(user_id, session);
    }

    fn delete(&self, user_id: UserId) {
        self.sessions.lock().unwrap().remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: UserId = UserId(42);

    #[test]
    fn test_get_absent() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get(USER), None);
    }

    #[test]
    fn test_set_then_get() {
        let store = MemorySessionStore::new();
        store.set(
            USER,
            Session::AwaitingAmount {
                currency: "EUR".to_string(),
            },
        );
        assert_eq!(
            store.get(USER),
            Some(Session::AwaitingAmount {
                currency: "EUR".to_string()
            })
        );
    }

    #[test]
    fn test_last_write_wins() {
        let store = MemorySessionStore::new();
        store.set(
            USER,
            Session::AwaitingAmount {
                currency: "USD".to_string(),
            },
        );
        store.set(
            USER,
            Session::AwaitingReminderTime {
                mode: TimeMode::Relative,
            },
        );
        assert_eq!(
            store.get(USER),
            Some(Session::AwaitingReminderTime {
                mode: TimeMode::Relative
            })
        );
    }

    #[test]
    fn test_delete() {
        let store = MemorySessionStore::new();
        store.set(
            USER,
            Session::AwaitingAmount {
                currency: "CAD".to_string(),
            },
        );
        store.delete(USER);
        assert_eq!(store.get(USER), None);
        // Deleting an absent session is a no-op.
        store.delete(USER);
    }

    #[test]
    fn test_users_are_independent() {
        let store = MemorySessionStore::new();
        store.set(
            UserId(1),
            Session::AwaitingAmount {
                currency: "USD".to_string(),
            },
        );
        assert_eq!(store.get(UserId(2)), None);
    }
}
