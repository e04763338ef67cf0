//! Observer reconciliation: every session keeps a local view that is
//! replaced wholesale by each store notification.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::archery::{ArcheryState, ShotEvent};
use super::physics::ShotOutcome;
use super::ParticipantId;
use crate::store::{StateStore, StoreError, TypedSubscription};

/// Latest-snapshot view of one match record
pub struct Observer<T> {
    subscription: TypedSubscription<T>,
    view: Option<T>,
}

impl<T> Observer<T>
where
    T: Serialize + DeserializeOwned,
{
    pub async fn open(store: &StateStore<T>) -> Result<Self, StoreError> {
        Ok(Self {
            subscription: store.subscribe().await?,
            view: None,
        })
    }

    /// Wait for the next snapshot and replace the view with it.
    /// Returns false once the store has gone away.
    pub async fn next_view(&mut self) -> bool {
        match self.subscription.next().await {
            Some(snapshot) => {
                self.view = snapshot;
                true
            }
            None => false,
        }
    }

    pub fn view(&self) -> Option<&T> {
        self.view.as_ref()
    }
}

/// A shot replayed locally from its shot event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedShot {
    pub shot: ShotEvent,
    pub outcome: ShotOutcome,
}

impl ResolvedShot {
    pub fn shooter(&self) -> ParticipantId {
        self.shot.player_id
    }
}

/// Replays each new shot event exactly once per session
#[derive(Debug, Default)]
pub struct ShotReplayer {
    last: Option<(u64, ParticipantId)>,
}

impl ShotReplayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay the pending shot if this snapshot carries one not seen before
    pub fn observe(&mut self, state: &ArcheryState) -> Option<ResolvedShot> {
        let shot = state.shot_data?;
        let key = (shot.timestamp, shot.player_id);
        if self.last == Some(key) {
            return None;
        }
        self.last = Some(key);

        Some(ResolvedShot {
            shot,
            outcome: shot.replay(&state.target),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::archery::Target;
    use crate::game::physics::ArrowFlight;
    use crate::store::{KeyValueStore, MemoryStore, Patch, StorePath};
    use std::sync::Arc;
    use uuid::Uuid;

    fn shot(timestamp: u64) -> ShotEvent {
        ShotEvent {
            angle: 45.0,
            power: 100.0,
            timestamp,
            player_id: Uuid::nil(),
        }
    }

    #[tokio::test]
    async fn view_is_replaced_by_every_snapshot() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let store: StateStore<ArcheryState> = StateStore::new(
            backend,
            StorePath::parse("games/shoot_the_target/m1").unwrap(),
        );

        let mut observer = Observer::open(&store).await.unwrap();
        assert!(observer.next_view().await);
        assert!(observer.view().is_none());

        store.set(&ArcheryState::default()).await.unwrap();
        assert!(observer.next_view().await);
        assert_eq!(observer.view().unwrap().turn_count, 0);

        let mut patch = Patch::new();
        patch.put("turnCount", &3).unwrap();
        store.patch(&patch).await.unwrap();
        assert!(observer.next_view().await);
        assert_eq!(observer.view().unwrap().turn_count, 3);
    }

    #[test]
    fn each_shot_is_replayed_once() {
        let (x, y) = ArrowFlight::from_shot(45.0, 100.0, 0.0, 0.0).position_at(20);
        let mut state = ArcheryState {
            target: Target { x, y },
            ..Default::default()
        };
        let mut replayer = ShotReplayer::new();
        assert_eq!(replayer.observe(&state), None);

        state.shot_data = Some(shot(10));
        let resolved = replayer.observe(&state).unwrap();
        assert_eq!(resolved.outcome.points, 10);
        assert_eq!(resolved.shooter(), Uuid::nil());

        // Same event in a later snapshot (e.g. a bow write) is not replayed again
        assert_eq!(replayer.observe(&state), None);

        state.shot_data = Some(shot(11));
        assert!(replayer.observe(&state).is_some());
    }
}
