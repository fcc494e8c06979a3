//! A user who is logged in to the lobby.

use std::collections::HashSet;

use parlor_protocol::{LobbyEvent, ListAction, ListKind};
use parlor_transport::{Outbound, Outbox};

use crate::Account;

/// One live lobby user.
///
/// Holds the cached parts of the account the lobby consults on every
/// message (muted flag, friend and blocked lists) plus the outbound queue
/// of the connection currently representing the user.
#[derive(Debug)]
pub struct User {
    pub username: String,
    pub email: Option<String>,
    pub muted: bool,
    pub friends: HashSet<String>,
    pub blocked: HashSet<String>,
    outbox: Outbox<LobbyEvent>,
}

impl User {
    /// Builds a user from their account record and connection queue.
    pub fn new(account: Account, outbox: Outbox<LobbyEvent>) -> Self {
        Self {
            username: account.username,
            email: account.email,
            muted: account.muted,
            friends: account.friends.into_iter().collect(),
            blocked: account.blocked.into_iter().collect(),
            outbox,
        }
    }

    /// Queues `event` for this user's connection.
    ///
    /// Returns `false` if the connection's writer is gone; the reader side
    /// notices the disconnect and removes the user.
    pub fn send(&self, event: LobbyEvent) -> bool {
        self.outbox.send(Outbound::Send(event)).is_ok()
    }

    pub fn has_blocked(&self, other: &str) -> bool {
        self.blocked.contains(other)
    }

    /// Mirrors a list change already applied to the user store.
    pub fn apply_list_change(&mut self, list: ListKind, action: ListAction, target: &str) {
        let entries = match list {
            ListKind::Friends => &mut self.friends,
            ListKind::Blocked => &mut self.blocked,
        };
        match action {
            ListAction::Add => {
                entries.insert(target.to_string());
            }
            ListAction::Remove => {
                entries.remove(target);
            }
        }
    }
}
