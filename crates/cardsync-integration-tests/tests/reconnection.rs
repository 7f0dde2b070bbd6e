//! Losing the connection and coming back with the same seat.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cardsync_integration_tests::{Table, TABLE_SESSION};
use cardsync_node::{Intervals, PeerEvent};
use cardsync_roles::{Role, RoleEvent, WatchdogAction};
use cardsync_transport::ConnectionState;
use tokio::sync::watch;

#[test]
fn severed_seat_holder_returns_to_its_seat() {
    let mut table = Table::new(2).unwrap();
    table.rounds(8).unwrap();
    let roles = table.roles();
    let nicknames = table.nicknames().unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    table.peers[1].subscribe(move |e| sink.lock().unwrap().push(e.clone()));

    let id = table.peers[1].id();
    table.hub.sever(id).unwrap();
    table.rounds(2).unwrap();
    assert_eq!(table.roles(), roles, "role kept while disconnected");

    table.watch();
    assert_eq!(
        table.peers[1].link().state(),
        ConnectionState::InSession(TABLE_SESSION.into())
    );
    assert_eq!(table.peers[1].link().nickname().unwrap(), "Player1001");

    table.rounds(1).unwrap();
    assert_eq!(table.nicknames().unwrap(), nicknames);
    assert_eq!(table.roles(), roles);

    let events = events.lock().unwrap();
    assert!(events.contains(&PeerEvent::Watchdog(WatchdogAction::Reconnected)));
    assert!(events.contains(&PeerEvent::Watchdog(WatchdogAction::Rejoined)));
    assert!(events.contains(&PeerEvent::Role(RoleEvent::Redeclared(roles[1]))));
    assert!(!events
        .iter()
        .any(|e| matches!(e, PeerEvent::Role(RoleEvent::Claimed(_)))));
}

#[test]
fn unassigned_peer_is_not_reconnected() {
    let mut table = Table::new(1).unwrap();
    let id = table.peers[0].id();
    table.hub.sever(id).unwrap();

    table.watch();
    assert_eq!(table.peers[0].link().state(), ConnectionState::Disconnected);
    assert_eq!(table.peers[0].role(), Role::Unassigned);
}

#[tokio::test(start_paused = true)]
async fn running_peers_recover_from_a_drop() {
    let table = Table::new(2).unwrap();
    let hub = table.hub.clone();
    let severed = table.peers[0].id();
    let (tx, rx) = watch::channel(false);

    let handles: Vec<_> = table
        .peers
        .into_iter()
        .map(|peer| tokio::spawn(peer.run(Intervals::default(), rx.clone())))
        .collect();

    tokio::time::sleep(Duration::from_secs(5)).await;
    hub.sever(severed).unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    tx.send(true).unwrap();

    let mut peers = Vec::new();
    for handle in handles {
        peers.push(handle.await.unwrap());
    }

    let mut roles: Vec<String> = peers.iter().map(|p| p.role().to_string()).collect();
    roles.sort();
    assert_eq!(roles, vec!["Player 1A", "Player 1B"]);
    for peer in &peers {
        assert!(peer.link().state().in_session());
        assert_eq!(
            Some(peer.link().nickname().unwrap()),
            peer.role().nickname()
        );
    }
}
