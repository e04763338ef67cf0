//! Match creation and the fixed-interval loops that drive simulation writes

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::store::{KeyValueStore, StateStore, StoreError};
use crate::util::time::unix_millis;

use super::archery::ArcheryState;
use super::authority::{TickAuthority, TurnAuthority};
use super::cards::CardsState;
use super::observer::ResolvedShot;
use super::skirmish::SkirmishState;
use super::{ActionError, GameKind, MatchRecord, Participant, ParticipantId};

/// Kind of background loop a session may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    SkirmishAuthority,
    Bow,
}

/// Registry of running loops, so one participant never runs two copies
/// of the same loop for a match, plus the results being finalized right now
pub struct MatchRegistry {
    running: DashMap<String, LoopKind>,
    finalizing: DashMap<String, ()>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            running: DashMap::new(),
            finalizing: DashMap::new(),
        }
    }

    /// Exclusive right to record one participant's result; `None` while
    /// another session of that participant holds it
    pub fn begin_finalize(
        self: &Arc<Self>,
        game: GameKind,
        match_id: &str,
        participant: ParticipantId,
    ) -> Option<FinalizeGuard> {
        let key = format!("{game}/{match_id}/{participant}");
        match self.finalizing.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Some(FinalizeGuard {
                    registry: self.clone(),
                    key,
                })
            }
        }
    }

    #[cfg(test)]
    pub fn finalizing(&self) -> usize {
        self.finalizing.len()
    }

    /// Claim the loop slot; `None` if it is already running
    pub fn claim(
        self: &Arc<Self>,
        kind: LoopKind,
        game: GameKind,
        match_id: &str,
        participant: ParticipantId,
    ) -> Option<LoopGuard> {
        let key = format!("{game}/{match_id}/{participant}/{kind:?}");
        match self.running.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(kind);
                Some(LoopGuard {
                    registry: self.clone(),
                    key,
                })
            }
        }
    }

    pub fn running_loops(&self) -> usize {
        self.running.len()
    }

    pub fn running_of(&self, kind: LoopKind) -> usize {
        self.running.iter().filter(|e| *e.value() == kind).count()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Frees the registry slot when the loop ends
pub struct LoopGuard {
    registry: Arc<MatchRegistry>,
    key: String,
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.registry.running.remove(&self.key);
    }
}

/// Releases a finalize claim
pub struct FinalizeGuard {
    registry: Arc<MatchRegistry>,
    key: String,
}

impl Drop for FinalizeGuard {
    fn drop(&mut self) {
        self.registry.finalizing.remove(&self.key);
    }
}

/// Sub-path of a match record set once a participant's rating is applied
pub fn rating_marker(participant: ParticipantId) -> String {
    format!("ratingsApplied/{participant}")
}

/// Match creation errors
#[derive(Debug, thiserror::Error)]
pub enum CreateMatchError {
    #[error("Match already exists")]
    AlreadyExists,

    #[error(transparent)]
    Invalid(#[from] ActionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Write the initial record for a match handed off by the lobby
pub async fn create_match(
    backend: Arc<dyn KeyValueStore>,
    game: GameKind,
    match_id: &str,
    participants: Vec<Participant>,
    rng: &mut ChaCha8Rng,
) -> Result<(), CreateMatchError> {
    let path = game.match_path(match_id)?;

    match game {
        GameKind::Cards => {
            let record = CardsState::deal(participants, rng)?;
            create_record(StateStore::new(backend, path), &record).await
        }
        GameKind::Skirmish => {
            let record = SkirmishState::new_match(participants)?;
            create_record(StateStore::new(backend, path), &record).await
        }
        GameKind::Archery => {
            let record = ArcheryState::new_match(participants, rng)?;
            create_record(StateStore::new(backend, path), &record).await
        }
    }
}

async fn create_record<T: MatchRecord>(
    store: StateStore<T>,
    record: &T,
) -> Result<(), CreateMatchError> {
    if store.get().await?.is_some() {
        return Err(CreateMatchError::AlreadyExists);
    }
    store.set(record).await?;

    info!(
        path = %store.path(),
        game = %T::KIND,
        participants = record.participants().len(),
        "Match created"
    );
    Ok(())
}

/// Skirmish simulation on the seat-0 session.
///
/// Each tick reads the record, steps it and writes the snapshot back. The
/// write is awaited before the next tick, so ticks never overlap. If this
/// session goes away the match stalls.
pub async fn run_skirmish_authority(
    store: StateStore<SkirmishState>,
    participant: ParticipantId,
    tick: Duration,
    _guard: LoopGuard,
) {
    info!(path = %store.path(), participant = %participant, "Skirmish authority started");

    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let state = match store.get().await {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!(path = %store.path(), "No record yet");
                continue;
            }
            Err(e) => {
                warn!(path = %store.path(), error = %e, "Failed to read match");
                continue;
            }
        };

        if state.is_over() {
            info!(path = %store.path(), winner = ?state.winner, "Match over, authority stopping");
            break;
        }

        let auth = match TickAuthority::claim(&state.players, participant) {
            Ok(auth) => auth,
            Err(e) => {
                warn!(participant = %participant, error = %e, "Lost tick authority");
                break;
            }
        };

        let next = state.step(&auth, unix_millis());
        let patch = match next.snapshot_patch(&auth) {
            Ok(patch) => patch,
            Err(e) => {
                warn!(error = %e, "Failed to encode tick");
                continue;
            }
        };

        if let Err(e) = store.patch(&patch).await {
            warn!(path = %store.path(), tick = next.tick, error = %e, "Tick write failed");
        } else if next.is_over() {
            info!(
                path = %store.path(),
                authority = %auth.participant(),
                winner = ?next.winner,
                "Skirmish decided"
            );
        }
    }
}

/// Bow sweep/charge ticking on an archery session; writes only on its turn
pub async fn run_bow_loop(
    store: StateStore<ArcheryState>,
    participant: ParticipantId,
    tick: Duration,
    _guard: LoopGuard,
) {
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let state = match store.get().await {
            Ok(Some(state)) => state,
            Ok(None) => continue,
            Err(e) => {
                warn!(path = %store.path(), error = %e, "Failed to read match");
                continue;
            }
        };

        if state.is_over() {
            debug!(path = %store.path(), participant = %participant, "Bow loop stopping");
            break;
        }

        let Ok(auth) = TurnAuthority::claim(&state.players, state.current_player, participant)
        else {
            continue;
        };

        // Paused while a shot is in flight
        let Ok(patch) = state.bow_tick(&auth) else {
            continue;
        };

        if let Err(e) = store.patch(&patch).await {
            warn!(path = %store.path(), error = %e, "Bow write failed");
        }
    }
}

/// Shooter side of a shot: wait out the replay, then commit score and turn
pub async fn commit_resolved_shot(
    store: StateStore<ArcheryState>,
    participant: ParticipantId,
    resolved: ResolvedShot,
    delay: Duration,
    mut rng: ChaCha8Rng,
) -> Result<(), CommitShotError> {
    tokio::time::sleep(delay).await;

    let state = store.get().await?.ok_or(CommitShotError::Gone)?;
    if state.shot_data != Some(resolved.shot) {
        return Err(CommitShotError::Stale);
    }

    let auth = TurnAuthority::claim(&state.players, state.current_player, participant)?;
    let patch = state.commit_shot(&auth, &resolved.outcome, &mut rng)?;
    store.patch(&patch).await?;

    info!(
        path = %store.path(),
        participant = %participant,
        points = resolved.outcome.points,
        "Shot committed"
    );
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum CommitShotError {
    #[error("Match record is gone")]
    Gone,

    #[error("Shot was superseded")]
    Stale,

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
