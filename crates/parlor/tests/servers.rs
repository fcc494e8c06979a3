//! End-to-end tests: a lobby and a game server on loopback, driven by
//! real clients.

use std::net::SocketAddr;
use std::time::Duration;

use parlor::{
    probe_status, GameClient, GameConfig, GameServer, LobbyClient, LobbyConfig, LobbyServer,
    MemoryStore,
};
use parlor_protocol::{
    GameEvent, GameRequest, Gid, ListAction, ListKind, LobbyEvent, LobbyRequest, Profile,
    RoomListEntry, RuleSet, Visibility,
};
use parlor_room::RoomEngine;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{self, sleep};

const TIMEOUT: Duration = Duration::from_secs(5);

const ACCOUNTS: &str = r#"[
    { "username": "ann", "password": "pw", "friends": ["bob"], "blocked": ["cat"] },
    { "username": "bob", "password": "pw" },
    { "username": "cat", "password": "pw" },
    { "username": "dan", "password": "pw", "muted": true,
      "statistics": { "games_played": 7, "games_won": 2 } }
]"#;

// =========================================================================
// Helpers
// =========================================================================

struct Deployment {
    lobby: SocketAddr,
    game: SocketAddr,
    engine: RoomEngine,
}

/// An address nothing is listening on (for now).
async fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn start_lobby(game_servers: &str) -> SocketAddr {
    let lobby_addr = free_addr().await;
    start_lobby_at(lobby_addr, game_servers).await;
    lobby_addr
}

async fn start_lobby_at(bind: SocketAddr, game_servers: &str) {
    let mut config = LobbyConfig::from_json(&format!(
        r#"{{
            "bind": "{bind}",
            "game_servers": {game_servers},
            "identify_timeout_secs": 1,
            "server_timeout_secs": 2,
            "accounts": {ACCOUNTS}
        }}"#
    ))
    .unwrap();
    let store = MemoryStore::new(std::mem::take(&mut config.accounts));
    let lobby = LobbyServer::bind(config, store).await.unwrap();
    tokio::spawn(lobby.run());
}

/// A game server reporting to a lobby that points back at it.
async fn deploy(owner_join_timeout_secs: u64) -> Deployment {
    let lobby = free_addr().await;
    let config = GameConfig::from_json(&format!(
        r#"{{
            "bind": "127.0.0.1:0",
            "lobby": "{lobby}",
            "owner_join_timeout_secs": {owner_join_timeout_secs},
            "identify_timeout_secs": 1
        }}"#
    ))
    .unwrap();
    let server = GameServer::bind(config).await.unwrap();
    let game = server.local_addr().unwrap();
    let engine = server.engine();
    tokio::spawn(server.run());

    start_lobby_at(lobby, &format!(r#"[{{ "name": "test", "addr": "{game}" }}]"#)).await;
    Deployment {
        lobby,
        game,
        engine,
    }
}

async fn login(lobby: SocketAddr, username: &str) -> LobbyClient {
    let mut client = LobbyClient::connect(lobby, TIMEOUT).await.unwrap();
    client
        .send(&LobbyRequest::Login {
            username: username.into(),
            password: "pw".into(),
        })
        .await
        .unwrap();
    assert_eq!(
        client.recv().await.unwrap(),
        LobbyEvent::LoginAccepted {
            username: username.into()
        }
    );
    client
}

async fn request(client: &mut LobbyClient, request: LobbyRequest) -> LobbyEvent {
    client.send(&request).await.unwrap();
    client
        .recv_until(|e| {
            !matches!(
                e,
                LobbyEvent::UserOnline { .. }
                    | LobbyEvent::UserOffline { .. }
                    | LobbyEvent::ChatMessage { .. }
            )
        })
        .await
        .unwrap()
}

async fn notice(client: &mut LobbyClient, req: LobbyRequest) -> String {
    match request(client, req).await {
        LobbyEvent::Notice { text } => text,
        other => panic!("expected a notice, got {other:?}"),
    }
}

async fn create_room(client: &mut LobbyClient, password: Option<&str>) -> (Gid, String, u16) {
    let reply = request(
        client,
        LobbyRequest::CreateRoom {
            visibility: Visibility::Public,
            password: password.map(str::to_string),
            friends_only: false,
        },
    )
    .await;
    match reply {
        LobbyEvent::RoomCreated { gid, host, port } => (gid, host, port),
        other => panic!("expected RoomCreated, got {other:?}"),
    }
}

async fn list_rooms(client: &mut LobbyClient) -> Vec<RoomListEntry> {
    match request(client, LobbyRequest::ListRooms).await {
        LobbyEvent::RoomList { rooms } => rooms,
        other => panic!("expected RoomList, got {other:?}"),
    }
}

/// Polls the lobby until no room is listed.
async fn wait_for_empty_list(client: &mut LobbyClient) {
    for _ in 0..50 {
        if list_rooms(client).await.is_empty() {
            return;
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("room never left the lobby list");
}

async fn join_game(game: SocketAddr, gid: Gid, username: &str) -> GameClient {
    let mut client = GameClient::connect(game, TIMEOUT).await.unwrap();
    client
        .send(&GameRequest::JoinGame {
            gid,
            username: username.into(),
            password: None,
        })
        .await
        .unwrap();
    client
}

fn joined(slot: u8, username: &str, owner: bool, admitted: bool) -> GameEvent {
    GameEvent::PlayerJoined {
        slot,
        username: username.into(),
        owner,
        admitted,
    }
}

/// Reads until the server closes the connection.
async fn expect_hangup(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    let read = time::timeout(TIMEOUT, async {
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => continue,
            }
        }
    })
    .await;
    assert!(read.is_ok(), "server kept the connection open");
}

// =========================================================================
// Lobby
// =========================================================================

#[tokio::test]
async fn test_presence_is_exchanged_on_login_and_logout() {
    let d = deploy(300).await;
    let mut ann = login(d.lobby, "ann").await;
    let mut bob = login(d.lobby, "bob").await;

    assert_eq!(
        bob.recv().await.unwrap(),
        LobbyEvent::UserOnline { username: "ann".into() }
    );
    assert_eq!(
        ann.recv().await.unwrap(),
        LobbyEvent::UserOnline { username: "bob".into() }
    );

    bob.send(&LobbyRequest::Logout).await.unwrap();
    assert_eq!(bob.recv().await.unwrap(), LobbyEvent::LoggedOut);
    assert_eq!(
        ann.recv().await.unwrap(),
        LobbyEvent::UserOffline { username: "bob".into() }
    );
}

#[tokio::test]
async fn test_login_rules() {
    let d = deploy(300).await;
    let mut client = LobbyClient::connect(d.lobby, TIMEOUT).await.unwrap();

    client.send(&LobbyRequest::ListRooms).await.unwrap();
    assert_eq!(
        client.recv().await.unwrap(),
        LobbyEvent::Notice { text: "log in first".into() }
    );

    client
        .send(&LobbyRequest::Login {
            username: "ann".into(),
            password: "wrong".into(),
        })
        .await
        .unwrap();
    assert!(matches!(
        client.recv().await.unwrap(),
        LobbyEvent::LoginRejected { .. }
    ));

    client
        .send(&LobbyRequest::Login {
            username: "ann".into(),
            password: "pw".into(),
        })
        .await
        .unwrap();
    assert_eq!(
        client.recv().await.unwrap(),
        LobbyEvent::LoginAccepted { username: "ann".into() }
    );

    let mut again = LobbyClient::connect(d.lobby, TIMEOUT).await.unwrap();
    again
        .send(&LobbyRequest::Login {
            username: "ann".into(),
            password: "pw".into(),
        })
        .await
        .unwrap();
    assert_eq!(
        again.recv().await.unwrap(),
        LobbyEvent::LoginRejected {
            reason: "ann is already logged in".into()
        }
    );
}

#[tokio::test]
async fn test_chat_reaches_others_but_not_from_muted_users() {
    let d = deploy(300).await;
    let mut ann = login(d.lobby, "ann").await;
    let mut bob = login(d.lobby, "bob").await;
    let mut dan = login(d.lobby, "dan").await;

    assert_eq!(
        notice(&mut dan, LobbyRequest::Chat { text: "psst".into() }).await,
        "you are muted"
    );

    ann.send(&LobbyRequest::Chat { text: "hello".into() }).await.unwrap();
    let line = bob
        .recv_until(|e| matches!(e, LobbyEvent::ChatMessage { .. }))
        .await
        .unwrap();
    assert_eq!(
        line,
        LobbyEvent::ChatMessage {
            sender: "ann".into(),
            text: "hello".into()
        }
    );
}

#[tokio::test]
async fn test_lists_profile_and_statistics() {
    let d = deploy(300).await;
    let mut bob = login(d.lobby, "bob").await;

    let add_ann = LobbyRequest::UpdateList {
        kind: ListKind::Friends,
        action: ListAction::Add,
        username: "ann".into(),
    };
    assert_eq!(notice(&mut bob, add_ann.clone()).await, "list updated");
    assert_eq!(
        notice(&mut bob, add_ann).await,
        "ann is already on your friends list"
    );
    let add_ghost = LobbyRequest::UpdateList {
        kind: ListKind::Blocked,
        action: ListAction::Add,
        username: "zed".into(),
    };
    assert_eq!(notice(&mut bob, add_ghost).await, "no such user: zed");

    match request(&mut bob, LobbyRequest::GetStatistics { username: "dan".into() }).await {
        LobbyEvent::Statistics { username, stats } => {
            assert_eq!(username, "dan");
            assert_eq!(stats.games_played, 7);
            assert_eq!(stats.games_won, 2);
        }
        other => panic!("expected Statistics, got {other:?}"),
    }

    let update = LobbyRequest::UpdateProfile {
        email: Some("bob@example.com".into()),
    };
    assert_eq!(notice(&mut bob, update).await, "profile updated");
    assert_eq!(
        request(&mut bob, LobbyRequest::GetProfile { username: "bob".into() }).await,
        LobbyEvent::Profile {
            profile: Profile {
                username: "bob".into(),
                email: Some("bob@example.com".into()),
            }
        }
    );
}

#[tokio::test]
async fn test_join_checks_block_list_and_password() {
    let d = deploy(300).await;
    let mut ann = login(d.lobby, "ann").await;
    let mut bob = login(d.lobby, "bob").await;
    let mut cat = login(d.lobby, "cat").await;

    let (gid, host, port) = create_room(&mut ann, Some("secret")).await;
    assert_eq!(host, "127.0.0.1");
    assert_eq!(port, d.game.port());

    let rooms = list_rooms(&mut bob).await;
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].gid, gid);
    assert_eq!(rooms[0].owner, "ann");
    assert!(rooms[0].locked);

    let join = |password: Option<&str>| LobbyRequest::JoinRoom {
        gid,
        password: password.map(str::to_string),
    };
    assert_eq!(
        notice(&mut cat, join(Some("secret"))).await,
        format!("you can't join room {gid}")
    );
    assert_eq!(notice(&mut bob, join(None)).await, "wrong room password");
    assert_eq!(
        request(&mut bob, join(Some("secret"))).await,
        LobbyEvent::JoinRedirect { gid, host, port }
    );

    assert_eq!(
        notice(&mut bob, LobbyRequest::JoinRoom { gid: Gid(999), password: None }).await,
        "room G-999 not found"
    );
}

#[tokio::test]
async fn test_one_open_room_per_owner() {
    let d = deploy(300).await;
    let mut ann = login(d.lobby, "ann").await;
    create_room(&mut ann, None).await;

    let again = LobbyRequest::CreateRoom {
        visibility: Visibility::Public,
        password: None,
        friends_only: false,
    };
    assert_eq!(notice(&mut ann, again).await, "ann already has an open room");
}

#[tokio::test]
async fn test_owner_logout_closes_open_room() {
    let d = deploy(300).await;
    let mut ann = login(d.lobby, "ann").await;
    let mut bob = login(d.lobby, "bob").await;
    create_room(&mut ann, None).await;
    assert_eq!(list_rooms(&mut bob).await.len(), 1);

    ann.send(&LobbyRequest::Logout).await.unwrap();
    wait_for_empty_list(&mut bob).await;
}

#[tokio::test]
async fn test_logout_frees_name_and_rooms_at_once() {
    let d = deploy(300).await;
    let mut ann = login(d.lobby, "ann").await;
    create_room(&mut ann, None).await;

    ann.send(&LobbyRequest::Logout).await.unwrap();
    assert_eq!(ann.recv().await.unwrap(), LobbyEvent::LoggedOut);

    // No grace period: the old session is gone once LoggedOut arrives.
    let mut again = login(d.lobby, "ann").await;
    assert!(list_rooms(&mut again).await.is_empty());
}

#[tokio::test]
async fn test_no_reachable_game_server_is_a_server_error() {
    let dead = free_addr().await;
    let lobby = start_lobby(&format!(r#"[{{ "name": "dead", "addr": "{dead}" }}]"#)).await;
    let mut ann = login(lobby, "ann").await;

    let create = LobbyRequest::CreateRoom {
        visibility: Visibility::Public,
        password: None,
        friends_only: false,
    };
    for _ in 0..2 {
        // The failed attempt must not leave a half-made room behind.
        assert_eq!(
            request(&mut ann, create.clone()).await,
            LobbyEvent::ServerError { text: "server error".into() }
        );
    }
    assert!(list_rooms(&mut ann).await.is_empty());
}

// =========================================================================
// Game server
// =========================================================================

#[tokio::test]
async fn test_full_room_lifecycle() {
    let d = deploy(300).await;
    let mut ann = login(d.lobby, "ann").await;
    let mut bob = login(d.lobby, "bob").await;

    let (gid, host, port) = create_room(&mut ann, None).await;
    let mut ann_game = join_game(d.game, gid, "ann").await;
    assert_eq!(
        ann_game.recv().await.unwrap(),
        GameEvent::RulesChanged { rules: RuleSet::default() }
    );
    assert_eq!(ann_game.recv().await.unwrap(), joined(0, "ann", true, true));

    assert_eq!(
        request(&mut bob, LobbyRequest::JoinRoom { gid, password: None }).await,
        LobbyEvent::JoinRedirect { gid, host, port }
    );
    let mut bob_game = join_game(d.game, gid, "bob").await;
    assert!(matches!(
        bob_game.recv().await.unwrap(),
        GameEvent::RulesChanged { .. }
    ));
    assert_eq!(bob_game.recv().await.unwrap(), joined(0, "ann", true, true));
    assert_eq!(bob_game.recv().await.unwrap(), joined(1, "bob", false, false));
    assert_eq!(ann_game.recv().await.unwrap(), joined(1, "bob", false, false));

    // Only the owner runs the room.
    bob_game.send(&GameRequest::BeginGame).await.unwrap();
    assert_eq!(
        bob_game.recv().await.unwrap(),
        GameEvent::Notice { text: "only the room owner can do that".into() }
    );

    ann_game.send(&GameRequest::AdmitPlayer { slot: 1 }).await.unwrap();
    assert_eq!(ann_game.recv().await.unwrap(), GameEvent::PlayerAdmitted { slot: 1 });
    assert_eq!(bob_game.recv().await.unwrap(), GameEvent::PlayerAdmitted { slot: 1 });

    ann_game.send(&GameRequest::BeginGame).await.unwrap();
    let order = ann_game.recv().await.unwrap();
    assert_eq!(bob_game.recv().await.unwrap(), order);
    let seats = match order {
        GameEvent::TurnOrder { seats } => seats,
        other => panic!("expected TurnOrder, got {other:?}"),
    };
    let mut slots: Vec<u8> = seats.iter().map(|s| s.slot).collect();
    slots.sort_unstable();
    assert_eq!(slots, vec![0, 1, 2, 3]);
    assert_eq!(seats.iter().filter(|s| s.computer).count(), 2);

    // The game server tells the lobby the room started.
    wait_for_empty_list(&mut bob).await;
    assert!(d.engine.contains(gid).await);
}

#[tokio::test]
async fn test_game_join_errors_are_readable() {
    let d = deploy(300).await;
    let mut ann = login(d.lobby, "ann").await;
    let (gid, _, _) = create_room(&mut ann, None).await;

    let mut early = join_game(d.game, gid, "bob").await;
    assert_eq!(
        early.recv().await.unwrap(),
        GameEvent::Notice { text: "owner hasn't joined yet".into() }
    );

    // A refused join leaves the connection open for another try.
    let mut lost = join_game(d.game, Gid(999), "ann").await;
    assert_eq!(
        lost.recv().await.unwrap(),
        GameEvent::Notice { text: "room G-999 not found".into() }
    );
    lost.send(&GameRequest::JoinGame {
        gid,
        username: "ann".into(),
        password: None,
    })
    .await
    .unwrap();
    assert!(matches!(
        lost.recv().await.unwrap(),
        GameEvent::RulesChanged { .. }
    ));
    assert_eq!(lost.recv().await.unwrap(), joined(0, "ann", true, true));

    early
        .send(&GameRequest::JoinGame {
            gid,
            username: "bob".into(),
            password: None,
        })
        .await
        .unwrap();
    assert!(matches!(
        early.recv().await.unwrap(),
        GameEvent::RulesChanged { .. }
    ));
    assert_eq!(early.recv().await.unwrap(), joined(0, "ann", true, true));
    assert_eq!(early.recv().await.unwrap(), joined(1, "bob", false, false));

    let mut eager = GameClient::connect(d.game, TIMEOUT).await.unwrap();
    eager.send(&GameRequest::BeginGame).await.unwrap();
    assert_eq!(
        eager.recv().await.unwrap(),
        GameEvent::Notice { text: "join a room first".into() }
    );
}

#[tokio::test]
async fn test_owner_timeout_closes_room_everywhere() {
    let d = deploy(1).await;
    let mut ann = login(d.lobby, "ann").await;
    let (gid, _, _) = create_room(&mut ann, None).await;
    assert!(d.engine.contains(gid).await);

    wait_for_empty_list(&mut ann).await;
    assert!(!d.engine.contains(gid).await);

    // The lobby forgot the room, so the owner may open another.
    let (next, _, _) = create_room(&mut ann, None).await;
    assert_ne!(next, gid);
}

#[tokio::test]
async fn test_owner_leaving_before_start_closes_room() {
    let d = deploy(300).await;
    let mut ann = login(d.lobby, "ann").await;
    let (gid, _, _) = create_room(&mut ann, None).await;

    let mut ann_game = join_game(d.game, gid, "ann").await;
    ann_game
        .recv_until(|e| matches!(e, GameEvent::PlayerJoined { .. }))
        .await
        .unwrap();
    drop(ann_game);

    wait_for_empty_list(&mut ann).await;
    assert!(!d.engine.contains(gid).await);
}

// =========================================================================
// Connection gate and status probes
// =========================================================================

#[tokio::test]
async fn test_status_probe_reports_load() {
    let d = deploy(300).await;
    let mut ann = login(d.lobby, "ann").await;
    create_room(&mut ann, None).await;

    let game = probe_status(d.game, TIMEOUT).await.unwrap();
    assert_eq!(game.rooms, 1);
    assert_eq!(game.users, 0);

    let lobby = probe_status(d.lobby, TIMEOUT).await.unwrap();
    assert_eq!(lobby.rooms, 1);
    assert_eq!(lobby.users, 1);
}

#[tokio::test]
async fn test_silent_connection_is_dropped() {
    let d = deploy(300).await;
    let mut silent = TcpStream::connect(d.lobby).await.unwrap();
    expect_hangup(&mut silent).await;
}

#[tokio::test]
async fn test_unknown_connection_type_is_dropped() {
    let d = deploy(300).await;
    let mut stranger = TcpStream::connect(d.game).await.unwrap();
    stranger.write_all(&[0x41]).await.unwrap();
    expect_hangup(&mut stranger).await;
}
