//! The user data layer.
//!
//! The lobby never talks to a database directly. It goes through the
//! [`UserStore`] trait, which covers exactly what the lobby needs:
//! checking credentials, reading and updating profiles, statistics, and
//! the friend and blocked lists.
//!
//! [`MemoryStore`] is the implementation the lobby ships with. It holds
//! accounts in a map seeded from configuration and keeps every change in
//! memory for the life of the process.

use std::collections::{BTreeSet, HashMap};

use parlor_protocol::{ListAction, ListKind, Profile, Statistics};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::StoreError;

/// One account as written in the lobby's configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub friends: Vec<String>,
    #[serde(default)]
    pub blocked: Vec<String>,
    /// Carried-over record from earlier play.
    #[serde(default)]
    pub statistics: Statistics,
}

/// Access to user records.
///
/// # Trait bounds
///
/// - `Send + Sync` → one store is shared by every connection task.
/// - `'static` → it lives as long as the server.
///
/// Methods return `impl Future + Send` rather than using `async fn` so
/// that callers can hold the futures across `tokio::spawn` boundaries.
pub trait UserStore: Send + Sync + 'static {
    /// Returns `Ok(true)` if `password` is right for `username`.
    /// Unknown users are `Ok(false)`, not an error.
    fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<bool, StoreError>> + Send;

    /// The full account record, used to build a lobby
    /// [`User`](crate::User) after login and to check join permissions.
    fn account(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Account, StoreError>> + Send;

    fn statistics(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Statistics, StoreError>> + Send;

    fn profile(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<Profile, StoreError>> + Send;

    fn update_profile(
        &self,
        username: &str,
        email: Option<String>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Adds `target` to or removes it from one of `username`'s lists.
    ///
    /// # Errors
    /// - [`StoreError::DuplicateEntry`] adding a name already present
    /// - [`StoreError::MissingEntry`] removing a name not present
    /// - [`StoreError::NotFound`] if `target` has no account
    fn update_list(
        &self,
        username: &str,
        list: ListKind,
        action: ListAction,
        target: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug)]
struct Record {
    password: String,
    email: Option<String>,
    muted: bool,
    friends: BTreeSet<String>,
    blocked: BTreeSet<String>,
    stats: Statistics,
}

impl Record {
    fn list_mut(&mut self, list: ListKind) -> &mut BTreeSet<String> {
        match list {
            ListKind::Friends => &mut self.friends,
            ListKind::Blocked => &mut self.blocked,
        }
    }
}

/// An in-memory [`UserStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Record>>,
}

impl MemoryStore {
    /// Builds a store holding `accounts`. Later duplicates replace earlier
    /// ones; configuration loading rejects duplicates before this point.
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Self {
        let records = accounts
            .into_iter()
            .map(|a| {
                let record = Record {
                    password: a.password,
                    email: a.email,
                    muted: a.muted,
                    friends: a.friends.into_iter().collect(),
                    blocked: a.blocked.into_iter().collect(),
                    stats: a.statistics,
                };
                (a.username, record)
            })
            .collect();
        Self {
            records: Mutex::new(records),
        }
    }
}

fn not_found(username: &str) -> StoreError {
    StoreError::NotFound(username.to_string())
}

impl UserStore for MemoryStore {
    async fn authenticate(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        let records = self.records.lock().await;
        Ok(records
            .get(username)
            .is_some_and(|r| r.password == password))
    }

    async fn account(&self, username: &str) -> Result<Account, StoreError> {
        let records = self.records.lock().await;
        let r = records.get(username).ok_or_else(|| not_found(username))?;
        Ok(Account {
            username: username.to_string(),
            password: r.password.clone(),
            email: r.email.clone(),
            muted: r.muted,
            friends: r.friends.iter().cloned().collect(),
            blocked: r.blocked.iter().cloned().collect(),
            statistics: r.stats,
        })
    }

    async fn statistics(&self, username: &str) -> Result<Statistics, StoreError> {
        let records = self.records.lock().await;
        records
            .get(username)
            .map(|r| r.stats)
            .ok_or_else(|| not_found(username))
    }

    async fn profile(&self, username: &str) -> Result<Profile, StoreError> {
        let records = self.records.lock().await;
        let r = records.get(username).ok_or_else(|| not_found(username))?;
        Ok(Profile {
            username: username.to_string(),
            email: r.email.clone(),
        })
    }

    async fn update_profile(
        &self,
        username: &str,
        email: Option<String>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let r = records.get_mut(username).ok_or_else(|| not_found(username))?;
        r.email = email;
        Ok(())
    }

    async fn update_list(
        &self,
        username: &str,
        list: ListKind,
        action: ListAction,
        target: &str,
    ) -> Result<(), StoreError> {
        if username == target {
            return Err(StoreError::SelfReference);
        }
        let mut records = self.records.lock().await;
        if !records.contains_key(target) {
            return Err(not_found(target));
        }
        let r = records.get_mut(username).ok_or_else(|| not_found(username))?;
        let entries = r.list_mut(list);
        match action {
            ListAction::Add if !entries.insert(target.to_string()) => {
                Err(StoreError::DuplicateEntry {
                    list,
                    username: target.to_string(),
                })
            }
            ListAction::Remove if !entries.remove(target) => {
                Err(StoreError::MissingEntry {
                    list,
                    username: target.to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}
