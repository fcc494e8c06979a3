//! Lobby → game server: choosing a server and opening rooms on it.
//!
//! Creating a room is a three-step exchange, each step bounded by the
//! configured server timeout:
//!
//! 1. probe every configured game server and keep the least loaded one;
//! 2. connect to it as a peer server and send `OpenRoom`;
//! 3. wait for `RoomOpened`, then record the host in the directory.
//!
//! If any step fails the directory entry is dropped again, so the owner
//! can simply retry.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::future::join_all;
use parlor_protocol::{
    ConnectionKind, Gid, LobbyEvent, PeerMessage, RoomStatus, RuleSet, StatusReport, Visibility,
};
use parlor_session::UserStore;
use parlor_transport::Connection;
use tokio::time;

use super::LobbyState;
use crate::{probe_status, GameServerEntry, ParlorError};

/// Records a room for `owner` and opens it on a game server.
pub(crate) async fn create_room<S: UserStore>(
    state: &LobbyState<S>,
    owner: &str,
    visibility: Visibility,
    password: Option<String>,
    friends_only: bool,
) -> Result<LobbyEvent, ParlorError> {
    let rules = RuleSet {
        password,
        friends_only,
        ..state.config.default_rules.clone()
    };
    let gid = state.directory.create(owner, visibility, rules.clone()).await?;

    match open_remote(state, gid, owner, rules).await {
        Ok(host) => {
            state.directory.set_host(gid, host).await?;
            tracing::info!(%gid, %owner, %host, "room created");
            Ok(LobbyEvent::RoomCreated {
                gid,
                host: host.ip().to_string(),
                port: host.port(),
            })
        }
        Err(e) => {
            state.directory.set_status(gid, RoomStatus::Closed).await;
            Err(e)
        }
    }
}

async fn open_remote<S: UserStore>(
    state: &LobbyState<S>,
    gid: Gid,
    owner: &str,
    rules: RuleSet,
) -> Result<SocketAddr, ParlorError> {
    let timeout = state.config.server_timeout();
    let server = least_loaded(&state.config.game_servers, timeout).await?;
    tracing::debug!(%gid, server = %server.name, "opening room on game server");

    time::timeout(timeout, open_room_on(server.addr, gid, owner, rules, timeout))
        .await
        .map_err(|_| ParlorError::ServerTimeout)??;
    Ok(server.addr)
}

async fn open_room_on(
    addr: SocketAddr,
    gid: Gid,
    owner: &str,
    rules: RuleSet,
    timeout: Duration,
) -> Result<(), ParlorError> {
    let mut conn = Connection::connect(addr, ConnectionKind::PeerServer, timeout).await?;
    conn.send(&PeerMessage::OpenRoom {
        gid,
        owner: owner.to_string(),
        rules,
    })
    .await?;

    match conn.recv::<PeerMessage>().await? {
        PeerMessage::RoomOpened {
            gid: opened,
            accepted: true,
            ..
        } if opened == gid => Ok(()),
        PeerMessage::RoomOpened { reason, .. } => Err(ParlorError::RoomRefused { gid, reason }),
        other => Err(ParlorError::RoomRefused {
            gid,
            reason: format!("unexpected reply {other:?}"),
        }),
    }
}

/// Probes every server concurrently and picks the reachable one hosting
/// the fewest rooms. Ties go to the earlier entry.
pub(crate) async fn least_loaded(
    servers: &[GameServerEntry],
    timeout: Duration,
) -> Result<&GameServerEntry, ParlorError> {
    let probes = servers
        .iter()
        .map(|server| async move { (server, probe_status(server.addr, timeout).await) });

    let mut best: Option<(&GameServerEntry, StatusReport)> = None;
    for (server, result) in join_all(probes).await {
        match result {
            Ok(report) => {
                if best.is_none_or(|(_, current)| report.rooms < current.rooms) {
                    best = Some((server, report));
                }
            }
            Err(e) => {
                tracing::warn!(server = %server.name, addr = %server.addr, error = %e, "game server unreachable");
            }
        }
    }
    best.map(|(server, _)| server).ok_or(ParlorError::NoGameServer)
}
