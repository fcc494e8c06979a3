//! The lobby's room directory.
//!
//! The lobby never runs rooms. It keeps one [`LobbyRoom`] per room it
//! brokered: who owns it, who may join, and which game server hosts it.
//! Game servers report back when a room starts or closes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};

use parlor_protocol::{Gid, RoomListEntry, RoomStatus, RuleSet, Visibility};
use tokio::sync::Mutex;

use crate::RoomError;

/// Lobby-side metadata of one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyRoom {
    pub gid: Gid,
    pub owner: String,
    pub visibility: Visibility,
    pub rules: RuleSet,
    pub status: RoomStatus,
    /// Users the lobby has sent to the game server, owner first.
    pub roster: Vec<String>,
    /// The hosting game server, once it accepted the room.
    pub host: Option<SocketAddr>,
}

impl LobbyRoom {
    fn list_entry(&self) -> RoomListEntry {
        RoomListEntry {
            gid: self.gid,
            owner: self.owner.clone(),
            players: u8::try_from(self.roster.len()).unwrap_or(u8::MAX),
            max_players: self.rules.max_humans,
            locked: self.rules.password.is_some(),
            friends_only: self.rules.friends_only,
            status: self.status,
        }
    }
}

/// Every room the lobby knows about.
#[derive(Debug)]
pub struct RoomDirectory {
    next_gid: AtomicU32,
    rooms: Mutex<HashMap<Gid, LobbyRoom>>,
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self {
            next_gid: AtomicU32::new(1),
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Records a new room for `owner` and assigns its gid.
    ///
    /// The room is `Open` but has no host until
    /// [`set_host`](Self::set_host) is called.
    ///
    /// # Errors
    /// [`RoomError::AlreadyOwnsRoom`] if `owner` has a room that hasn't
    /// closed yet.
    pub async fn create(
        &self,
        owner: &str,
        visibility: Visibility,
        rules: RuleSet,
    ) -> Result<Gid, RoomError> {
        let mut rooms = self.rooms.lock().await;
        if rooms.values().any(|r| r.owner == owner) {
            return Err(RoomError::AlreadyOwnsRoom(owner.to_string()));
        }
        let gid = Gid(self.next_gid.fetch_add(1, Ordering::Relaxed));
        rooms.insert(
            gid,
            LobbyRoom {
                gid,
                owner: owner.to_string(),
                visibility,
                rules,
                status: RoomStatus::Open,
                roster: vec![owner.to_string()],
                host: None,
            },
        );
        tracing::debug!(%gid, %owner, "room recorded");
        Ok(gid)
    }

    /// Records the game server that accepted the room.
    pub async fn set_host(&self, gid: Gid, host: SocketAddr) -> Result<(), RoomError> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.get_mut(&gid).ok_or(RoomError::NotFound(gid))?;
        room.host = Some(host);
        Ok(())
    }

    /// A copy of one room's record.
    pub async fn get(&self, gid: Gid) -> Result<LobbyRoom, RoomError> {
        self.rooms
            .lock()
            .await
            .get(&gid)
            .cloned()
            .ok_or(RoomError::NotFound(gid))
    }

    /// Checks whether `username` may join and, if so, adds them to the
    /// roster and returns the hosting server.
    ///
    /// `owner_friends` and `owner_blocked` are the owner's lists, which
    /// the caller reads from the user store. The owner always gets in.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`] for an unknown gid
    /// - [`RoomError::NotOpen`] if the room started or has no host yet
    /// - [`RoomError::Blocked`] if the owner blocked the user
    /// - [`RoomError::FriendsOnly`] if the user isn't the owner's friend
    /// - [`RoomError::WrongPassword`] on a password mismatch
    pub async fn join(
        &self,
        gid: Gid,
        username: &str,
        password: Option<&str>,
        owner_friends: &[String],
        owner_blocked: &[String],
    ) -> Result<SocketAddr, RoomError> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.get_mut(&gid).ok_or(RoomError::NotFound(gid))?;
        let host = match (room.status, room.host) {
            (RoomStatus::Open, Some(host)) => host,
            _ => return Err(RoomError::NotOpen(gid)),
        };

        if username != room.owner {
            let listed = |list: &[String]| list.iter().any(|n| n == username);
            if listed(owner_blocked) {
                return Err(RoomError::Blocked(gid));
            }
            if room.rules.friends_only && !listed(owner_friends) {
                return Err(RoomError::FriendsOnly(gid));
            }
            if !room.rules.password_matches(password) {
                return Err(RoomError::WrongPassword);
            }
        }

        if !room.roster.iter().any(|n| n == username) {
            room.roster.push(username.to_string());
        }
        Ok(host)
    }

    /// Public rooms that can still be joined, ordered by gid.
    pub async fn list_open(&self) -> Vec<RoomListEntry> {
        let rooms = self.rooms.lock().await;
        let mut entries: Vec<_> = rooms
            .values()
            .filter(|r| {
                r.visibility == Visibility::Public
                    && r.status == RoomStatus::Open
                    && r.host.is_some()
            })
            .map(LobbyRoom::list_entry)
            .collect();
        entries.sort_by_key(|e| e.gid);
        entries
    }

    /// Applies a status change. A `Closed` room is forgotten.
    ///
    /// Status only moves forward (Open → InProgress → Closed); a report
    /// that would move it back is ignored.
    pub async fn set_status(&self, gid: Gid, status: RoomStatus) -> Option<LobbyRoom> {
        let mut rooms = self.rooms.lock().await;
        if status == RoomStatus::Closed {
            let removed = rooms.remove(&gid);
            if removed.is_some() {
                tracing::info!(%gid, "room closed");
            }
            return removed;
        }
        let room = rooms.get_mut(&gid)?;
        if room.status == RoomStatus::Open && status == RoomStatus::InProgress {
            room.status = status;
            tracing::info!(%gid, "room in progress");
        }
        Some(room.clone())
    }

    /// Closes every not-yet-started room owned by `owner`, e.g. on logout.
    /// Returns the gids closed.
    pub async fn close_owned_by(&self, owner: &str) -> Vec<Gid> {
        let mut rooms = self.rooms.lock().await;
        let closing: Vec<Gid> = rooms
            .values()
            .filter(|r| r.owner == owner && r.status == RoomStatus::Open)
            .map(|r| r.gid)
            .collect();
        for gid in &closing {
            rooms.remove(gid);
            tracing::info!(%gid, %owner, "room closed, owner left the lobby");
        }
        closing
    }

    /// Number of rooms not yet closed.
    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 7000))
    }

    async fn hosted(dir: &RoomDirectory, owner: &str, rules: RuleSet) -> Gid {
        let gid = dir.create(owner, Visibility::Public, rules).await.unwrap();
        dir.set_host(gid, addr()).await.unwrap();
        gid
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_gids() {
        let dir = RoomDirectory::new();
        let a = dir.create("ann", Visibility::Public, RuleSet::default()).await.unwrap();
        let b = dir.create("bob", Visibility::Public, RuleSet::default()).await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_create_one_open_room_per_owner() {
        let dir = RoomDirectory::new();
        let gid = hosted(&dir, "ann", RuleSet::default()).await;
        assert!(matches!(
            dir.create("ann", Visibility::Private, RuleSet::default()).await,
            Err(RoomError::AlreadyOwnsRoom(_))
        ));
        dir.set_status(gid, RoomStatus::Closed).await;
        dir.create("ann", Visibility::Public, RuleSet::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_join_checks_block_friends_and_password() {
        let dir = RoomDirectory::new();
        let rules = RuleSet {
            password: Some("pw".into()),
            friends_only: true,
            ..RuleSet::default()
        };
        let gid = hosted(&dir, "ann", rules).await;
        let friends = vec!["bob".to_string(), "eve".to_string()];
        let blocked = vec!["eve".to_string()];

        let (d, friends, blocked) = (&dir, friends.as_slice(), blocked.as_slice());
        let join = move |user: &'static str, pw: Option<&'static str>| {
            d.join(gid, user, pw, friends, blocked)
        };

        assert!(matches!(join("eve", Some("pw")).await, Err(RoomError::Blocked(_))));
        assert!(matches!(join("cat", Some("pw")).await, Err(RoomError::FriendsOnly(_))));
        assert!(matches!(join("bob", Some("no")).await, Err(RoomError::WrongPassword)));
        assert_eq!(join("bob", Some("pw")).await.unwrap(), addr());
        // The owner skips every check.
        assert_eq!(join("ann", None).await.unwrap(), addr());

        let room = dir.get(gid).await.unwrap();
        assert_eq!(room.roster, vec!["ann", "bob"]);
    }

    #[tokio::test]
    async fn test_join_requires_open_hosted_room() {
        let dir = RoomDirectory::new();
        let gid = dir.create("ann", Visibility::Public, RuleSet::default()).await.unwrap();
        assert!(matches!(
            dir.join(gid, "bob", None, &[], &[]).await,
            Err(RoomError::NotOpen(_))
        ));
        dir.set_host(gid, addr()).await.unwrap();
        dir.set_status(gid, RoomStatus::InProgress).await;
        assert!(matches!(
            dir.join(gid, "bob", None, &[], &[]).await,
            Err(RoomError::NotOpen(_))
        ));
        assert!(matches!(
            dir.join(Gid(999), "bob", None, &[], &[]).await,
            Err(RoomError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_open_hides_private_and_started_rooms() {
        let dir = RoomDirectory::new();
        let open = hosted(&dir, "ann", RuleSet::default()).await;
        let started = hosted(&dir, "bob", RuleSet::default()).await;
        dir.set_status(started, RoomStatus::InProgress).await;
        let private = dir.create("cat", Visibility::Private, RuleSet::default()).await.unwrap();
        dir.set_host(private, addr()).await.unwrap();

        let list = dir.list_open().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].gid, open);
        assert_eq!(list[0].players, 1);
        assert_eq!(list[0].status, RoomStatus::Open);
    }

    #[tokio::test]
    async fn test_status_never_moves_backwards() {
        let dir = RoomDirectory::new();
        let gid = hosted(&dir, "ann", RuleSet::default()).await;
        dir.set_status(gid, RoomStatus::InProgress).await;
        let room = dir.set_status(gid, RoomStatus::Open).await.unwrap();
        assert_eq!(room.status, RoomStatus::InProgress);
    }

    #[tokio::test]
    async fn test_close_owned_by_skips_started_rooms() {
        let dir = RoomDirectory::new();
        let open = hosted(&dir, "ann", RuleSet::default()).await;
        let started = hosted(&dir, "bob", RuleSet::default()).await;
        dir.set_status(started, RoomStatus::InProgress).await;

        assert_eq!(dir.close_owned_by("ann").await, vec![open]);
        assert!(dir.close_owned_by("bob").await.is_empty());
        assert_eq!(dir.len().await, 1);
    }
}
