//! Recording on one peer, persisting, and replaying into a session.

use std::sync::Arc;
use std::time::Duration;

use cardsync_command::{Command, CommandLog, ManualClock, ReplayState};
use cardsync_integration_tests::Table;
use cardsync_node::markers::SyntheticMarkers;
use cardsync_node::{Peer, PeerConfig};
use cardsync_protocol::FrameData;
use cardsync_transport::{LinkConditions, LoopbackHub};

fn recording_table(n: usize, replay_tick: Duration) -> Table {
    Table::with(n, LinkConditions::perfect(), |i| {
        PeerConfig::default()
            .with_recording(i == 0)
            .with_replay_tick(replay_tick)
    })
    .unwrap()
}

#[test]
fn only_the_recording_peer_logs_and_inbound_is_not_recorded() {
    let mut table = recording_table(2, Duration::from_millis(20));
    for peer in &mut table.peers {
        peer.sync_frame().unwrap();
    }
    table.pump().unwrap();

    assert_eq!(table.peers[0].log().count(), 1);
    assert_eq!(table.peers[1].log().count(), 0);
}

#[test]
fn saved_log_replays_into_a_new_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.cslg");

    let clock = ManualClock::new();
    let hub = LoopbackHub::new();
    let (link, inbox) = hub.connect("Player1000");
    link.create_session("Recording", 5).unwrap();
    let mut recorder = Peer::new(
        link,
        inbox,
        PeerConfig::default()
            .with_recording(true)
            .with_clock(Arc::new(clock.clone())),
    )
    .with_markers(SyntheticMarkers::new(9, vec![4, 8]));
    for _ in 0..3 {
        recorder.sync_frame().unwrap();
        clock.advance(Duration::from_millis(200));
    }
    recorder.log().save(&path).unwrap();

    let mut table = recording_table(2, Duration::from_millis(100));
    table.peers[0].log_mut().load(&path).unwrap();
    assert_eq!(table.peers[0].log().entries(), recorder.log().entries());

    assert!(table.peers[0].begin_replay());
    let mut ticks = 0;
    while table.peers[0].replay_state() == ReplayState::Replaying {
        table.peers[0].replay_tick().unwrap();
        ticks += 1;
    }
    // Entries at 0.0, 0.2 and 0.4 s with a 0.1 s tick.
    assert_eq!(ticks, 4);

    table.pump().unwrap();
    let seen = table.peers[1].board().latest(0).unwrap();
    assert_eq!(seen.player_nick, "Player1000");
    assert_eq!(seen.markers.ids, vec![4, 8]);
    assert_eq!(table.peers[1].board().received(), 3);
}

#[test]
fn equal_timestamps_fire_together_in_recorded_order() {
    let mut table = recording_table(1, Duration::from_millis(100));
    let peer = &mut table.peers[0];

    let sync = |id: i32| Command::SyncFrame {
        frame: FrameData {
            player_id: id,
            ..FrameData::default()
        },
    };
    peer.issue(sync(1)).unwrap();
    table.clock.advance(Duration::from_millis(500));
    let peer = &mut table.peers[0];
    peer.issue(sync(2)).unwrap();
    peer.issue(sync(3)).unwrap();

    let mut log = CommandLog::new();
    let mut blob = Vec::new();
    peer.log().write_to(&mut blob).unwrap();
    log.read_from(blob.as_slice()).unwrap();
    let stamps: Vec<f64> = log.entries().iter().map(|e| e.timestamp).collect();
    assert_eq!(stamps, vec![0.0, 0.5, 0.5]);

    assert!(peer.begin_replay());
    let mut per_tick = Vec::new();
    while peer.replay_state() == ReplayState::Replaying {
        per_tick.push(peer.replay_tick().unwrap());
    }
    assert_eq!(per_tick, vec![1, 0, 0, 0, 2]);
    assert_eq!(peer.board().latest(3).unwrap().player_id, 3);
}

#[test]
fn clear_restarts_the_timeline() {
    let mut table = recording_table(1, Duration::from_millis(20));
    table.peers[0].sync_frame().unwrap();
    table.clock.advance(Duration::from_secs(4));
    table.peers[0].log_mut().clear();
    table.peers[0].sync_frame().unwrap();

    let entries = table.peers[0].log().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].timestamp, 0.0);
}
