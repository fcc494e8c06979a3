//! The presence manager: who is in the lobby right now.
//!
//! # Ordering
//!
//! Every mutation and every fan-out happens while holding the single
//! `users` lock. Notifications are only *queued* under the lock (each
//! user's [`Outbox`](parlor_transport::Outbox) is an unbounded channel
//! drained by that connection's writer task), so the lock is never held
//! across network I/O, yet the order in which events are queued for a
//! given user still matches the order of insertions and removals.
//!
//! That gives the guarantee the lobby relies on: if A is online when B
//! logs in, A gets exactly one "B online" and B gets exactly one
//! "A online", no matter how many other logins race with them.

use std::collections::HashMap;

use parlor_protocol::{LobbyEvent, ListAction, ListKind};
use tokio::sync::Mutex;

use crate::{SessionError, User};

/// The authoritative map of connected lobby users.
#[derive(Debug, Default)]
pub struct PresenceManager {
    users: Mutex<HashMap<String, User>>,
}

impl PresenceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly authenticated user and exchanges presence
    /// notifications with everyone already online.
    ///
    /// The new user's first queued event is always
    /// [`LobbyEvent::LoginAccepted`], ahead of any "online" notice.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the username is already
    /// online. Nothing is sent in that case.
    pub async fn add_user(&self, user: User) -> Result<(), SessionError> {
        let mut users = self.users.lock().await;
        if users.contains_key(&user.username) {
            return Err(SessionError::AlreadyConnected(user.username));
        }

        user.send(LobbyEvent::LoginAccepted {
            username: user.username.clone(),
        });
        for other in users.values() {
            other.send(LobbyEvent::UserOnline {
                username: user.username.clone(),
            });
            user.send(LobbyEvent::UserOnline {
                username: other.username.clone(),
            });
        }

        tracing::info!(username = %user.username, online = users.len() + 1, "user online");
        users.insert(user.username.clone(), user);
        Ok(())
    }

    /// Removes a user and tells everyone left.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the user isn't online.
    pub async fn remove_user(&self, username: &str) -> Result<User, SessionError> {
        let mut users = self.users.lock().await;
        let user = users
            .remove(username)
            .ok_or_else(|| SessionError::NotFound(username.to_string()))?;

        for other in users.values() {
            other.send(LobbyEvent::UserOffline {
                username: user.username.clone(),
            });
        }

        tracing::info!(%username, online = users.len(), "user offline");
        Ok(user)
    }

    /// Sends a chat line to every online user, the sender included,
    /// except those who have blocked the sender.
    ///
    /// Returns how many users it was queued for.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] if the sender isn't online
    /// - [`SessionError::Muted`] if the sender is muted
    pub async fn broadcast_chat(&self, sender: &str, text: &str) -> Result<usize, SessionError> {
        let users = self.users.lock().await;
        let from = users
            .get(sender)
            .ok_or_else(|| SessionError::NotFound(sender.to_string()))?;
        if from.muted {
            return Err(SessionError::Muted);
        }

        let mut delivered = 0;
        for user in users.values().filter(|u| !u.has_blocked(sender)) {
            let queued = user.send(LobbyEvent::ChatMessage {
                sender: sender.to_string(),
                text: text.to_string(),
            });
            if queued {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    /// Keeps an online user's cached lists in step with the store.
    pub async fn apply_list_change(
        &self,
        username: &str,
        list: ListKind,
        action: ListAction,
        target: &str,
    ) -> Result<(), SessionError> {
        let mut users = self.users.lock().await;
        let user = users
            .get_mut(username)
            .ok_or_else(|| SessionError::NotFound(username.to_string()))?;
        user.apply_list_change(list, action, target);
        Ok(())
    }

    pub async fn is_online(&self, username: &str) -> bool {
        self.users.lock().await.contains_key(username)
    }

    /// Number of users currently online.
    pub async fn user_count(&self) -> usize {
        self.users.lock().await.len()
    }
}
