//! Integration tests for the room engine and its per-room workers.
//!
//! Timeouts are kept short (tens of milliseconds) so the owner-join
//! window can be exercised for real.

use std::time::Duration;

use parlor_protocol::{GameEvent, Gid, RoomStatus, RuleSet, SLOT_COUNT};
use parlor_room::{EngineConfig, RoomEngine, RoomError, RoomPhase};
use parlor_transport::Outbound;
use tokio::sync::mpsc::{self, UnboundedReceiver};

type Inbox = UnboundedReceiver<Outbound<GameEvent>>;

const TIMEOUT: Duration = Duration::from_millis(150);

fn engine() -> (RoomEngine, UnboundedReceiver<(Gid, RoomStatus)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let config = EngineConfig {
        owner_join_timeout: TIMEOUT,
    };
    (RoomEngine::with_status_reports(config, tx), rx)
}

fn rules(max_humans: u8) -> RuleSet {
    RuleSet {
        max_humans,
        ..RuleSet::default()
    }
}

async fn join(engine: &RoomEngine, gid: Gid, name: &str) -> (Result<usize, RoomError>, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let result = engine
        .add_player_to_room(gid, name, None, tx)
        .await
        .map(|o| o.slot);
    (result, rx)
}

/// Waits for the next event that isn't about seating.
async fn next_turn_order(inbox: &mut Inbox) -> Vec<u8> {
    loop {
        let item = tokio::time::timeout(Duration::from_secs(2), inbox.recv())
            .await
            .expect("turn order should arrive")
            .expect("queue open");
        if let Outbound::Send(GameEvent::TurnOrder { seats }) = item {
            return seats.iter().map(|s| s.slot).collect();
        }
    }
}

#[tokio::test]
async fn test_owner_timeout_closes_and_deregisters() {
    let (engine, mut status) = engine();
    let gid = Gid(1);
    engine.open_room(gid, "ann", rules(4)).await.unwrap();
    assert!(engine.contains(gid).await);

    let report = tokio::time::timeout(TIMEOUT * 10, status.recv())
        .await
        .expect("room should close")
        .unwrap();
    assert_eq!(report, (gid, RoomStatus::Closed));
    assert!(!engine.contains(gid).await);
    assert_eq!(engine.room_count().await, 0);
}

#[tokio::test]
async fn test_engine_without_status_reports_still_closes_rooms() {
    let engine = RoomEngine::new(EngineConfig {
        owner_join_timeout: TIMEOUT,
    });
    let gid = Gid(11);
    engine.open_room(gid, "ann", rules(4)).await.unwrap();
    assert!(engine.contains(gid).await);

    tokio::time::sleep(TIMEOUT * 4).await;
    assert!(!engine.contains(gid).await);
}

#[tokio::test]
async fn test_owner_join_cancels_timeout() {
    let (engine, _status) = engine();
    let gid = Gid(2);
    engine.open_room(gid, "ann", rules(4)).await.unwrap();

    let (slot, _inbox) = join(&engine, gid, "ann").await;
    assert_eq!(slot.unwrap(), 0);

    tokio::time::sleep(TIMEOUT * 3).await;
    let info = engine.room_info(gid).await.unwrap();
    assert_eq!(info.phase, RoomPhase::Populating);
    assert_eq!(info.humans, 1);
}

#[tokio::test]
async fn test_join_errors_are_readable() {
    let (engine, _status) = engine();
    let gid = Gid(3);

    let (missing, _) = join(&engine, gid, "ann").await;
    assert_eq!(missing.unwrap_err().to_string(), "room G-3 not found");

    engine.open_room(gid, "ann", rules(1)).await.unwrap();
    let (early, _) = join(&engine, gid, "bob").await;
    assert_eq!(early.unwrap_err().to_string(), "owner hasn't joined yet");

    let (_, _ann) = join(&engine, gid, "ann").await;
    // A single-seat room starts immediately; later joins can't get in.
    let (late, _) = join(&engine, gid, "bob").await;
    assert!(late.is_err());
}

#[tokio::test]
async fn test_full_room_rejects_join() {
    let (engine, _status) = engine();
    let gid = Gid(4);
    engine.open_room(gid, "ann", rules(2)).await.unwrap();
    let (_, _a) = join(&engine, gid, "ann").await;
    let (_, _b) = join(&engine, gid, "bob").await;
    let (full, _) = join(&engine, gid, "cat").await;
    assert!(matches!(full, Err(RoomError::RoomFull(g)) if g == gid));
}

#[tokio::test]
async fn test_duplicate_gid_is_rejected() {
    let (engine, _status) = engine();
    engine.open_room(Gid(5), "ann", rules(4)).await.unwrap();
    assert!(matches!(
        engine.open_room(Gid(5), "bob", rules(4)).await,
        Err(RoomError::AlreadyExists(_))
    ));
}

#[tokio::test]
async fn test_begin_game_backfills_and_assigns_turn_order() {
    let (engine, mut status) = engine();
    let gid = Gid(6);
    engine.open_room(gid, "ann", rules(4)).await.unwrap();
    let (_, mut ann) = join(&engine, gid, "ann").await;
    let (_, mut bob) = join(&engine, gid, "bob").await;
    engine.admit_player(gid, "ann", 1).await.unwrap();

    assert!(matches!(
        engine.begin_game(gid, "bob").await,
        Err(RoomError::NotOwner)
    ));
    engine.begin_game(gid, "ann").await.unwrap();

    let order = next_turn_order(&mut ann).await;
    assert_eq!(next_turn_order(&mut bob).await, order);
    let mut sorted = order.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![0, 1, 2, 3]);

    assert_eq!(status.recv().await, Some((gid, RoomStatus::InProgress)));
    let info = engine.room_info(gid).await.unwrap();
    assert_eq!(info.phase, RoomPhase::InProgress);
    assert_eq!(info.humans + info.computers, SLOT_COUNT);
}

#[tokio::test]
async fn test_last_player_leaving_closes_room() {
    let (engine, mut status) = engine();
    let gid = Gid(7);
    engine.open_room(gid, "ann", rules(1)).await.unwrap();
    let (_, mut ann) = join(&engine, gid, "ann").await;
    next_turn_order(&mut ann).await;
    assert_eq!(status.recv().await, Some((gid, RoomStatus::InProgress)));

    assert_eq!(engine.remove_player_from_room(gid, "ann").await, Some(0));
    assert_eq!(status.recv().await, Some((gid, RoomStatus::Closed)));
    assert!(!engine.contains(gid).await);
}

#[tokio::test]
async fn test_finish_room_closes_it() {
    let (engine, mut status) = engine();
    let gid = Gid(8);
    engine.open_room(gid, "ann", rules(1)).await.unwrap();
    let (_, mut ann) = join(&engine, gid, "ann").await;
    next_turn_order(&mut ann).await;
    assert_eq!(status.recv().await, Some((gid, RoomStatus::InProgress)));

    engine.finish_room(gid).await.unwrap();
    assert_eq!(status.recv().await, Some((gid, RoomStatus::Closed)));
    assert_eq!(engine.room_count().await, 0);
}

#[tokio::test]
async fn test_close_room_is_safe_after_worker_exit() {
    let (engine, mut status) = engine();
    let gid = Gid(9);
    engine.open_room(gid, "ann", rules(4)).await.unwrap();
    assert!(engine.close_room(gid).await);
    assert_eq!(status.recv().await, Some((gid, RoomStatus::Closed)));
    assert!(!engine.close_room(gid).await);
}

#[tokio::test]
async fn test_player_count_spans_rooms() {
    let (engine, _status) = engine();
    engine.open_room(Gid(10), "ann", rules(4)).await.unwrap();
    engine.open_room(Gid(11), "bob", rules(4)).await.unwrap();
    let (_, _a) = join(&engine, Gid(10), "ann").await;
    let (_, _c) = join(&engine, Gid(10), "cat").await;
    let (_, _b) = join(&engine, Gid(11), "bob").await;
    assert_eq!(engine.player_count().await, 3);
    assert_eq!(engine.room_count().await, 2);
}
