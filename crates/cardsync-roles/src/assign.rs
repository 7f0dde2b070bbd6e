//! Decentralized seat assignment.
//!
//! Each peer runs [`RoleAssigner::tick`] periodically against its own
//! [`RosterCache`]. Nobody coordinates: a peer scans the cached roster, picks
//! the first free label and publishes it as its nickname. The claim stays
//! pending until `confirm_ticks` fresh roster snapshots show no rival with the
//! same label. When two pending claims collide, the one with the lower
//! [`claim_priority`] keeps the label and the other rescans. A rival that was
//! absent from the roster when the claim was made and now shows the label is
//! a holder returning from a reconnect; it wins outright.
//!
//! Once committed a role is sticky: it is never given up, and the assigner
//! only re-declares it when the published nickname drifts (the server resets
//! nicknames on reconnect).

use std::collections::BTreeSet;

use cardsync_protocol::PeerId;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::roster::{RosterCache, RosterService};
use crate::types::{Endpoint, Role, Seat, SeatLabel};

/// Assignment tuning.
#[derive(Debug, Clone)]
pub struct AssignmentConfig {
    /// Declare as spectator instead of competing for a seat.
    pub spectator: bool,
    /// Fresh roster snapshots a claim must survive before it is committed.
    pub confirm_ticks: u32,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            spectator: false,
            confirm_ticks: 3,
        }
    }
}

impl AssignmentConfig {
    #[must_use]
    pub fn with_spectator(mut self, spectator: bool) -> Self {
        self.spectator = spectator;
        self
    }

    #[must_use]
    pub fn with_confirm_ticks(mut self, ticks: u32) -> Self {
        self.confirm_ticks = ticks;
        self
    }
}

/// Claim priority for `peer` contending for `label`. Lower wins.
///
/// `blake3(blake3(peer) XOR blake3("seat_claim:<label>"))`, so the winner of
/// one label says nothing about the winner of another.
pub fn claim_priority(peer: PeerId, label: SeatLabel) -> [u8; 32] {
    let peer_hash = blake3::hash(&peer.to_le_bytes());
    let claim = format!("seat_claim:{}", label);
    let claim_hash = blake3::hash(claim.as_bytes());

    let mut xored = [0u8; 32];
    for (out, (a, b)) in xored
        .iter_mut()
        .zip(peer_hash.as_bytes().iter().zip(claim_hash.as_bytes()))
    {
        *out = a ^ b;
    }
    *blake3::hash(&xored).as_bytes()
}

/// Whether `rival` beats `me` for `label`.
fn rival_wins(rival: PeerId, me: PeerId, label: SeatLabel) -> bool {
    claim_priority(rival, label) < claim_priority(me, label)
}

/// Label to claim given the labels already taken.
///
/// Seat 1 before seat 2. A seat whose primary is present gets its secondary
/// filled before a new seat is opened. `None` when every label is taken.
pub fn choose_label(taken: &[SeatLabel]) -> Option<SeatLabel> {
    let is_taken = |seat, endpoint| taken.contains(&SeatLabel::new(seat, endpoint));

    Seat::ALL
        .into_iter()
        .find(|&seat| is_taken(seat, Endpoint::Primary) && !is_taken(seat, Endpoint::Secondary))
        .map(|seat| SeatLabel::new(seat, Endpoint::Secondary))
        .or_else(|| {
            Seat::ALL
                .into_iter()
                .find(|&seat| !is_taken(seat, Endpoint::Primary))
                .map(|seat| SeatLabel::new(seat, Endpoint::Primary))
        })
}

/// Something the assigner did this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleEvent {
    /// A label was declared and awaits confirmation.
    Claimed(SeatLabel),
    /// A pending claim lost to a rival.
    Yielded(SeatLabel),
    /// The role is committed.
    Assigned(Role),
    /// The committed role's nickname had drifted and was published again.
    Redeclared(Role),
}

#[derive(Debug, Clone)]
struct PendingClaim {
    label: SeatLabel,
    /// Cache generation at the time of the claim.
    generation: u64,
    confirmations: u32,
    /// Peers in the roster when the claim was made.
    seen: BTreeSet<PeerId>,
}

impl PendingClaim {
    /// Whether `rival`, showing the claimed label, takes it from `me`.
    fn loses_to(&self, rival: PeerId, me: PeerId) -> bool {
        !self.seen.contains(&rival) || rival_wins(rival, me, self.label)
    }
}

/// Per-peer assignment state machine.
#[derive(Debug)]
pub struct RoleAssigner {
    config: AssignmentConfig,
    role: Role,
    pending: Option<PendingClaim>,
    /// Assignment steps taken while in a session.
    ticks: u64,
    last_assigned_tick: Option<u64>,
}

impl RoleAssigner {
    pub fn new(config: AssignmentConfig) -> Self {
        Self {
            config,
            role: Role::Unassigned,
            pending: None,
            ticks: 0,
            last_assigned_tick: None,
        }
    }

    /// Committed role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Label currently claimed but not yet committed.
    pub fn pending(&self) -> Option<SeatLabel> {
        self.pending.as_ref().map(|p| p.label)
    }

    /// Step at which the current role was committed.
    pub fn last_assigned_tick(&self) -> Option<u64> {
        self.last_assigned_tick
    }

    /// Whether a label is held or claimed. The reconnect watchdogs only act
    /// for peers that have one.
    pub fn has_claim(&self) -> bool {
        self.role.is_assigned() || self.pending.is_some()
    }

    /// Role to advertise in outgoing frames: committed, else pending.
    pub fn effective_role(&self) -> Role {
        match (self.role, &self.pending) {
            (Role::Unassigned, Some(p)) => Role::Seat(p.label),
            (role, _) => role,
        }
    }

    /// Run one assignment step. Does nothing outside a session.
    ///
    /// Every event of the tick is appended to `events`.
    pub fn tick(
        &mut self,
        cache: &RosterCache,
        roster: &dyn RosterService,
        events: &mut Vec<RoleEvent>,
    ) -> Result<()> {
        if !roster.is_connected() {
            return Ok(());
        }
        self.ticks += 1;

        if self.role.is_assigned() {
            return self.verify_nickname(roster, events);
        }

        if self.config.spectator {
            return self.commit(Role::Spectator, roster, events);
        }

        let Some(others) = cache.others() else {
            debug!("waiting for first roster snapshot");
            return Ok(());
        };
        let me = roster.local_id();

        if let Some(mut claim) = self.pending.take() {
            if cache.generation() <= claim.generation {
                self.pending = Some(claim);
                return Ok(());
            }

            let rival = others.iter().find(|p| {
                SeatLabel::parse(&p.nickname) == Some(claim.label) && claim.loses_to(p.id, me)
            });
            if let Some(rival) = rival {
                info!(label = %claim.label, rival = %rival.id, "claim lost to rival, rescanning");
                events.push(RoleEvent::Yielded(claim.label));
            } else {
                claim.confirmations += 1;
                if claim.confirmations >= self.config.confirm_ticks {
                    self.role = Role::Seat(claim.label);
                    self.last_assigned_tick = Some(self.ticks);
                    info!(role = %self.role, tick = self.ticks, "role assigned");
                    events.push(RoleEvent::Assigned(self.role));
                } else {
                    self.pending = Some(claim);
                }
                return Ok(());
            }
        }

        let taken: Vec<SeatLabel> = others
            .iter()
            .filter_map(|p| SeatLabel::parse(&p.nickname))
            .collect();
        match choose_label(&taken) {
            Some(label) => {
                roster.declare(&label.nickname())?;
                self.pending = Some(PendingClaim {
                    label,
                    generation: cache.generation(),
                    confirmations: 0,
                    seen: others.iter().map(|p| p.id).collect(),
                });
                info!(%label, "label claimed");
                events.push(RoleEvent::Claimed(label));
                Ok(())
            }
            None => {
                warn!("every seat is taken, joining as spectator");
                self.commit(Role::Spectator, roster, events)
            }
        }
    }

    fn commit(
        &mut self,
        role: Role,
        roster: &dyn RosterService,
        events: &mut Vec<RoleEvent>,
    ) -> Result<()> {
        if let Some(nickname) = role.nickname() {
            roster.declare(&nickname)?;
        }
        self.pending = None;
        self.role = role;
        self.last_assigned_tick = Some(self.ticks);
        info!(%role, tick = self.ticks, "role assigned");
        events.push(RoleEvent::Assigned(role));
        Ok(())
    }

    fn verify_nickname(&self, roster: &dyn RosterService, events: &mut Vec<RoleEvent>) -> Result<()> {
        let current = roster.local_nickname()?;
        if self.role.matches_nickname(&current) {
            return Ok(());
        }
        if let Some(nickname) = self.role.nickname() {
            warn!(%current, expected = %nickname, "nickname drifted, re-declaring");
            roster.declare(&nickname)?;
            events.push(RoleEvent::Redeclared(self.role));
        }
        Ok(())
    }
}
