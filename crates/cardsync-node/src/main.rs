//! cardsync-node: run a table of in-process peers over the loopback hub,
//! save the recording peer's command log, then replay it.

use cardsync_command::ReplayState;
use cardsync_node::lobby::{auto_join, random_nickname};
use cardsync_node::markers::SyntheticMarkers;
use cardsync_node::{NodeConfig, Peer, PeerConfig};
use cardsync_roles::{AssignmentConfig, Role};
use cardsync_transport::{LoopbackHub, TransportError};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Serialize)]
struct PeerSummary {
    peer: u32,
    nickname: String,
    role: Role,
    frames_seen: u64,
    recorded: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    cardsync_logging::init("cardsync=info,cardsync_node=info");

    let config = NodeConfig::from_env()?;
    tracing::info!(
        peers = config.peers,
        spectators = config.spectators,
        run_for = ?config.run_for,
        "Starting cardsync table"
    );

    let hub = LoopbackHub::with_conditions(config.conditions);
    let mut rng = rand::thread_rng();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(config.peers);
    for index in 0..config.peers {
        let (link, inbox) = hub.connect(random_nickname(&mut rng));
        let session = auto_join(&link, config.session.as_deref(), &mut rng)?;
        tracing::info!(peer = %link.id(), %session, "peer seated in session");

        let spectator = index >= config.peers - config.spectators;
        let peer_config = PeerConfig::default()
            .with_assignment(AssignmentConfig::default().with_spectator(spectator))
            .with_recording(index == 0)
            .with_replay_tick(config.intervals.replay_tick);
        let peer = Peer::new(link, inbox, peer_config)
            .with_markers(SyntheticMarkers::new(index as u64, vec![index as i32 * 10]));

        handles.push(tokio::spawn(peer.run(config.intervals, shutdown_rx.clone())));
    }

    tokio::time::sleep(config.run_for).await;
    shutdown_tx.send(true)?;

    let mut peers = Vec::with_capacity(handles.len());
    for handle in handles {
        peers.push(handle.await?);
    }

    let summary = peers
        .iter()
        .map(|p| -> Result<PeerSummary, TransportError> {
            Ok(PeerSummary {
                peer: p.id().0,
                nickname: p.link().nickname()?,
                role: p.role(),
                frames_seen: p.board().received(),
                recorded: p.log().count(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    let Some(recorder) = peers.first_mut() else {
        return Ok(());
    };
    recorder.log().save(&config.log_path)?;

    // Replay from the persisted copy.
    recorder.log_mut().clear();
    recorder.log_mut().load(&config.log_path)?;
    tracing::info!(entries = recorder.log().count(), "replaying saved log");

    if recorder.begin_replay() {
        let mut ticker = tokio::time::interval(config.intervals.replay_tick);
        let mut fired = 0;
        while recorder.replay_state() == ReplayState::Replaying {
            ticker.tick().await;
            fired += recorder.replay_tick()?;
        }
        let echoed = recorder.pump_inbox()?;
        tracing::info!(fired, echoed, "replay finished");
    }

    Ok(())
}
