//! Participant sessions.
//!
//! A session applies its participant's actions through the writer tokens,
//! forwards every store snapshot to the socket and runs the background
//! loops its seat owns: the skirmish tick on seat 0, the bow loop and shot
//! commit on archery seats.

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::game::archery::ArcheryState;
use crate::game::authority::{SeatToken, TickAuthority, TurnAuthority};
use crate::game::cards::{CardColor, CardsState, PendingWild, PlayDecision};
use crate::game::combat::UnitKind;
use crate::game::observer::{Observer, ShotReplayer};
use crate::game::physics::commit_delay;
use crate::game::runner::{
    commit_resolved_shot, rating_marker, run_bow_loop, run_skirmish_authority, CommitShotError,
    LoopGuard, LoopKind,
};
use crate::game::skirmish::SkirmishState;
use crate::game::{ActionError, GameKind, MatchRecord, ParticipantId};
use crate::store::{StateStore, StoreError};
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Why a session could not serve a message
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("Match not found")]
    NoMatch,

    #[error("This match does not accept {0} actions")]
    WrongGame(GameKind),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Action(e) => e.code(),
            SessionError::NoMatch => "no_match",
            SessionError::WrongGame(_) => "wrong_game",
            SessionError::Store(_) => "store_error",
        }
    }
}

/// One participant connected to one match
pub struct Session {
    ctx: SessionContext,
    /// Wild card waiting for `choose_color`; never written to the store
    pending_wild: Option<PendingWild>,
}

/// The parts of a session shared with its spawned tasks
#[derive(Clone)]
struct SessionContext {
    app: AppState,
    participant: ParticipantId,
    game: GameKind,
    match_id: String,
    out: mpsc::Sender<ServerMsg>,
}

impl Session {
    pub fn new(
        app: AppState,
        participant: ParticipantId,
        game: GameKind,
        match_id: String,
        out: mpsc::Sender<ServerMsg>,
    ) -> Self {
        Self {
            ctx: SessionContext {
                app,
                participant,
                game,
                match_id,
                out,
            },
            pending_wild: None,
        }
    }

    /// Turn-order position of this participant; `None` for spectators
    pub async fn seat(&self) -> Result<Option<usize>, SessionError> {
        let participant = self.ctx.participant;
        Ok(match self.ctx.game {
            GameKind::Cards => self.ctx.record::<CardsState>().await?.1.seat_of(participant),
            GameKind::Skirmish => self.ctx.record::<SkirmishState>().await?.1.seat_of(participant),
            GameKind::Archery => self.ctx.record::<ArcheryState>().await?.1.seat_of(participant),
        })
    }

    /// Spawn the snapshot forwarder and the loops this seat owns.
    /// The caller aborts the returned tasks on teardown.
    pub fn start(&self, seat: Option<usize>) -> Result<Vec<JoinHandle<()>>, StoreError> {
        let ctx = &self.ctx;
        let mut tasks = Vec::new();

        match ctx.game {
            GameKind::Cards => {
                let store = ctx.store::<CardsState>()?;
                tasks.push(tokio::spawn(watch(store, ctx.clone(), |_, _| {})));
            }
            GameKind::Skirmish => {
                let store = ctx.store::<SkirmishState>()?;
                tasks.push(tokio::spawn(watch(store.clone(), ctx.clone(), |_, _| {})));

                if seat == Some(TickAuthority::SEAT) {
                    match ctx.claim(LoopKind::SkirmishAuthority) {
                        Some(guard) => tasks.push(tokio::spawn(run_skirmish_authority(
                            store,
                            ctx.participant,
                            ctx.app.config.tick_interval,
                            guard,
                        ))),
                        None => debug!(match_id = %ctx.match_id, "Skirmish authority already running"),
                    }
                }
            }
            GameKind::Archery => {
                let store = ctx.store::<ArcheryState>()?;
                tasks.push(tokio::spawn(watch(
                    store.clone(),
                    ctx.clone(),
                    shot_committer(store.clone(), ctx.clone()),
                )));

                if seat.is_some() {
                    match ctx.claim(LoopKind::Bow) {
                        Some(guard) => tasks.push(tokio::spawn(run_bow_loop(
                            store,
                            ctx.participant,
                            ctx.app.config.tick_interval,
                            guard,
                        ))),
                        None => debug!(match_id = %ctx.match_id, "Bow loop already running"),
                    }
                }
            }
        }

        Ok(tasks)
    }

    /// Serve one client message. Refusals go back to this client only.
    pub async fn handle(&mut self, msg: ClientMsg) {
        if let ClientMsg::Ping { t } = msg {
            self.ctx
                .send(ServerMsg::Pong {
                    t,
                    server_time: unix_millis(),
                })
                .await;
            return;
        }

        if let Err(e) = self.apply(msg).await {
            let reply = match &e {
                SessionError::Store(err) => {
                    warn!(
                        match_id = %self.ctx.match_id,
                        participant = %self.ctx.participant,
                        error = %err,
                        "Action write failed"
                    );
                    ServerMsg::Error {
                        message: e.to_string(),
                    }
                }
                _ => {
                    debug!(
                        participant = %self.ctx.participant,
                        code = e.code(),
                        "Action rejected"
                    );
                    ServerMsg::rejected(e.code(), &e)
                }
            };
            self.ctx.send(reply).await;
        }
    }

    async fn apply(&mut self, msg: ClientMsg) -> Result<(), SessionError> {
        if let Some(game) = msg.game() {
            if game != self.ctx.game {
                return Err(SessionError::WrongGame(game));
            }
        }

        match msg {
            ClientMsg::PlayCard { index } => self.play_card(index).await,
            ClientMsg::ChooseColor { color } => self.choose_color(color).await,
            ClientMsg::DrawCard => self.draw_card().await,
            ClientMsg::Deploy { unit } => self.deploy(unit).await,
            ClientMsg::StartCharge => self.start_charge().await,
            ClientMsg::Release => self.release().await,
            ClientMsg::Ping { .. } => Ok(()),
        }
    }

    async fn play_card(&mut self, index: usize) -> Result<(), SessionError> {
        let (store, state) = self.ctx.record::<CardsState>().await?;
        let auth = TurnAuthority::claim(&state.players, state.current_player, self.ctx.participant)?;

        match state.play_card(&auth, index)? {
            PlayDecision::Write(patch) => {
                self.pending_wild = None;
                store.patch(&patch).await?;
            }
            PlayDecision::ChooseColor(pending) => {
                self.pending_wild = Some(pending);
                self.ctx
                    .send(ServerMsg::ChooseColor {
                        hand_index: pending.hand_index,
                    })
                    .await;
            }
        }
        Ok(())
    }

    async fn choose_color(&mut self, color: CardColor) -> Result<(), SessionError> {
        let pending = self.pending_wild.ok_or(ActionError::NotAWildCard)?;
        let (store, state) = self.ctx.record::<CardsState>().await?;
        let auth = TurnAuthority::claim(&state.players, state.current_player, self.ctx.participant)?;

        let patch = state.choose_wild_color(&auth, pending, color)?;
        self.pending_wild = None;
        store.patch(&patch).await?;
        Ok(())
    }

    async fn draw_card(&mut self) -> Result<(), SessionError> {
        let (store, state) = self.ctx.record::<CardsState>().await?;
        let auth = TurnAuthority::claim(&state.players, state.current_player, self.ctx.participant)?;

        let patch = state.draw_card(&auth)?;
        self.pending_wild = None;
        store.patch(&patch).await?;
        Ok(())
    }

    async fn deploy(&mut self, unit: UnitKind) -> Result<(), SessionError> {
        let (store, state) = self.ctx.record::<SkirmishState>().await?;
        let seat = SeatToken::claim(&state.players, self.ctx.participant)?;

        let patch = state.deploy(&seat, unit, unix_millis())?;
        store.patch(&patch).await?;
        Ok(())
    }

    async fn start_charge(&mut self) -> Result<(), SessionError> {
        let (store, state) = self.ctx.record::<ArcheryState>().await?;
        let auth = TurnAuthority::claim(&state.players, state.current_player, self.ctx.participant)?;

        let patch = state.start_charge(&auth)?;
        store.patch(&patch).await?;
        Ok(())
    }

    async fn release(&mut self) -> Result<(), SessionError> {
        let (store, state) = self.ctx.record::<ArcheryState>().await?;
        let auth = TurnAuthority::claim(&state.players, state.current_player, self.ctx.participant)?;

        let patch = state.release(&auth, unix_millis())?;
        store.patch(&patch).await?;
        Ok(())
    }
}

impl SessionContext {
    fn store<T: MatchRecord>(&self) -> Result<StateStore<T>, StoreError> {
        Ok(StateStore::new(
            self.app.store.clone(),
            self.game.match_path(&self.match_id)?,
        ))
    }

    async fn record<T: MatchRecord>(&self) -> Result<(StateStore<T>, T), SessionError> {
        let store = self.store::<T>()?;
        let record = store.get().await?.ok_or(SessionError::NoMatch)?;
        Ok((store, record))
    }

    fn claim(&self, kind: LoopKind) -> Option<LoopGuard> {
        self.app
            .match_registry
            .claim(kind, self.game, &self.match_id, self.participant)
    }

    async fn send(&self, msg: ServerMsg) {
        if self.out.send(msg).await.is_err() {
            debug!(participant = %self.participant, "Session output closed");
        }
    }

    /// Note on the match record that this participant was rated.
    /// `false` if an earlier session already did.
    async fn mark_rated(&self) -> Result<bool, StoreError> {
        let marker = self
            .game
            .match_path(&self.match_id)?
            .join(&rating_marker(self.participant))?;
        if self.app.store.get(&marker).await?.is_some() {
            return Ok(false);
        }
        self.app.store.set(&marker, serde_json::Value::Bool(true)).await?;
        Ok(true)
    }

    /// Write this participant's rating change, once per match result
    async fn finalize<T: MatchRecord>(&self, record: &T) {
        let Some(change) = record.rating_change(self.participant) else {
            return;
        };
        let Some(_claim) = self
            .app
            .match_registry
            .begin_finalize(T::KIND, &self.match_id, self.participant)
        else {
            return;
        };
        match self.mark_rated().await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                warn!(
                    match_id = %self.match_id,
                    participant = %self.participant,
                    error = %e,
                    "Failed to record result"
                );
                return;
            }
        }

        let rating = match &self.app.profile_store {
            Some(profiles) => match profiles
                .apply_rating_change(self.participant, T::KIND, change)
                .await
            {
                Ok(rating) => Some(rating),
                Err(e) => {
                    warn!(
                        participant = %self.participant,
                        game = %T::KIND,
                        error = %e,
                        "Failed to write rating"
                    );
                    None
                }
            },
            None => None,
        };

        info!(
            match_id = %self.match_id,
            participant = %self.participant,
            change,
            "Match result finalized"
        );
        self.send(ServerMsg::RatingUpdated { change, rating }).await;
    }
}

/// Forward every snapshot of the record to the socket until the store or
/// the socket goes away. `on_view` may spawn follow-up work into the
/// `JoinSet`, which is aborted together with this task.
async fn watch<T, F>(store: StateStore<T>, ctx: SessionContext, mut on_view: F)
where
    T: MatchRecord,
    F: FnMut(&T, &mut JoinSet<()>) + Send + 'static,
{
    let mut observer = match Observer::open(&store).await {
        Ok(observer) => observer,
        Err(e) => {
            warn!(path = %store.path(), error = %e, "Failed to subscribe");
            ctx.send(ServerMsg::Error {
                message: e.to_string(),
            })
            .await;
            return;
        }
    };
    let mut follow_ups = JoinSet::new();

    while observer.next_view().await {
        let view = observer.view();
        let state = match view.map(serde_json::to_value).transpose() {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %store.path(), error = %e, "Failed to encode snapshot");
                continue;
            }
        };
        if ctx.out.send(ServerMsg::Snapshot { state }).await.is_err() {
            break;
        }

        let Some(view) = view else {
            continue;
        };
        on_view(view, &mut follow_ups);

        if view.is_over() {
            ctx.finalize(view).await;
        }
    }
}

/// Replays each new shot and, on the shooter's session, commits it once the
/// replay has played out
fn shot_committer(
    store: StateStore<ArcheryState>,
    ctx: SessionContext,
) -> impl FnMut(&ArcheryState, &mut JoinSet<()>) + Send + 'static {
    let mut replayer = ShotReplayer::new();

    move |view: &ArcheryState, follow_ups: &mut JoinSet<()>| {
        let Some(resolved) = replayer.observe(view) else {
            return;
        };
        if ctx.out.try_send(ServerMsg::shot_resolved(&resolved)).is_err() {
            debug!(participant = %ctx.participant, "Dropped shot replay message");
        }
        if resolved.shooter() != ctx.participant {
            return;
        }

        // Salted by the upcoming round so each new target is reproducible
        let rng = ctx
            .app
            .match_rng(GameKind::Archery, &ctx.match_id, u64::from(view.turn_count) + 1);
        let store = store.clone();
        let participant = ctx.participant;
        follow_ups.spawn(async move {
            let delay = commit_delay(&resolved.outcome);
            match commit_resolved_shot(store, participant, resolved, delay, rng).await {
                Ok(()) => {}
                Err(CommitShotError::Stale) => debug!(participant = %participant, "Shot already committed"),
                Err(e) => warn!(participant = %participant, error = %e, "Shot commit failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::cards::{Card, Face};
    use crate::game::runner::create_match;
    use crate::game::{MatchStatus, Participant, Winner};
    use crate::store::Patch;
    use std::collections::HashMap;
    use std::time::Duration;
    use uuid::Uuid;

    struct Harness {
        app: AppState,
        players: Vec<Participant>,
    }

    async fn harness(game: GameKind, n: usize) -> Harness {
        let app = AppState::new(Config::for_tests());
        let players: Vec<Participant> = (0..n)
            .map(|i| Participant::new(Uuid::new_v4(), format!("p{i}"), i))
            .collect();
        let mut rng = app.match_rng(game, "m1", 0);
        create_match(app.store.clone(), game, "m1", players.clone(), &mut rng)
            .await
            .unwrap();
        Harness { app, players }
    }

    impl Harness {
        fn session(&self, seat: usize, game: GameKind) -> (Session, mpsc::Receiver<ServerMsg>) {
            let (tx, rx) = mpsc::channel(64);
            let session = Session::new(
                self.app.clone(),
                self.players[seat].id,
                game,
                "m1".to_string(),
                tx,
            );
            (session, rx)
        }

        fn store<T: MatchRecord>(&self, game: GameKind) -> StateStore<T> {
            StateStore::new(self.app.store.clone(), game.match_path("m1").unwrap())
        }
    }

    /// Give seat 0 a known hand on top of a known card
    async fn rig_cards(h: &Harness, hand: Vec<Card>, top: Card) {
        let store = h.store::<CardsState>(GameKind::Cards);
        let mut state = store.get().await.unwrap().unwrap();
        state.player_hands = HashMap::from([
            (h.players[0].id, hand),
            (h.players[1].id, vec![Card::new(CardColor::Green, Face::Number(1)); 3]),
        ]);
        state.top_card = Some(top);
        state.wild_color = None;
        store.set(&state).await.unwrap();
    }

    #[tokio::test]
    async fn seats_are_resolved_from_the_record() {
        let h = harness(GameKind::Cards, 3).await;
        let (session, _rx) = h.session(2, GameKind::Cards);
        assert_eq!(session.seat().await.unwrap(), Some(2));

        let (tx, _rx) = mpsc::channel(1);
        let spectator = Session::new(h.app.clone(), Uuid::new_v4(), GameKind::Cards, "m1".to_string(), tx);
        assert_eq!(spectator.seat().await.unwrap(), None);

        let (tx, _rx) = mpsc::channel(1);
        let lost = Session::new(h.app.clone(), Uuid::new_v4(), GameKind::Cards, "nope".to_string(), tx);
        assert!(matches!(lost.seat().await, Err(SessionError::NoMatch)));
    }

    #[tokio::test]
    async fn wild_card_waits_for_its_color() {
        let h = harness(GameKind::Cards, 2).await;
        let wild = Card::new(CardColor::Wild, Face::Wild);
        rig_cards(
            &h,
            vec![wild, Card::new(CardColor::Red, Face::Number(3))],
            Card::new(CardColor::Blue, Face::Number(5)),
        )
        .await;
        let (mut session, mut rx) = h.session(0, GameKind::Cards);

        session.handle(ClientMsg::PlayCard { index: 0 }).await;
        assert!(matches!(rx.recv().await, Some(ServerMsg::ChooseColor { hand_index: 0 })));

        // Nothing written yet
        let store = h.store::<CardsState>(GameKind::Cards);
        assert_eq!(store.get().await.unwrap().unwrap().hand(h.players[0].id).len(), 2);

        session
            .handle(ClientMsg::ChooseColor {
                color: CardColor::Green,
            })
            .await;
        let state = store.get().await.unwrap().unwrap();
        assert_eq!(state.wild_color, Some(CardColor::Green));
        assert_eq!(state.top_card, Some(wild));
        assert_eq!(state.hand(h.players[0].id).len(), 1);
        assert_eq!(state.current_player, 1);
    }

    #[tokio::test]
    async fn color_without_a_pending_wild_is_rejected() {
        let h = harness(GameKind::Cards, 2).await;
        let (mut session, mut rx) = h.session(0, GameKind::Cards);

        session.handle(ClientMsg::ChooseColor { color: CardColor::Red }).await;
        match rx.recv().await {
            Some(ServerMsg::Rejected { code, .. }) => assert_eq!(code, "not_a_wild_card"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn out_of_turn_actions_are_rejected_without_a_write() {
        let h = harness(GameKind::Cards, 2).await;
        let store = h.store::<CardsState>(GameKind::Cards);
        let before = store.get().await.unwrap().unwrap();
        let (mut session, mut rx) = h.session(1, GameKind::Cards);

        session.handle(ClientMsg::DrawCard).await;
        match rx.recv().await {
            Some(ServerMsg::Rejected { code, .. }) => assert_eq!(code, "not_your_turn"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.get().await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn actions_for_another_game_are_rejected() {
        let h = harness(GameKind::Cards, 2).await;
        let (mut session, mut rx) = h.session(0, GameKind::Cards);

        session.handle(ClientMsg::Deploy { unit: UnitKind::Knight }).await;
        match rx.recv().await {
            Some(ServerMsg::Rejected { code, .. }) => assert_eq!(code, "wrong_game"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn ping_is_answered() {
        let h = harness(GameKind::Archery, 2).await;
        let (mut session, mut rx) = h.session(1, GameKind::Archery);
        session.handle(ClientMsg::Ping { t: 42 }).await;
        assert!(matches!(rx.recv().await, Some(ServerMsg::Pong { t: 42, .. })));
    }

    #[tokio::test]
    async fn deploy_spends_resources() {
        let h = harness(GameKind::Skirmish, 2).await;
        let (mut session, _rx) = h.session(1, GameKind::Skirmish);

        session.handle(ClientMsg::Deploy { unit: UnitKind::Hooligan }).await;
        let state = h
            .store::<SkirmishState>(GameKind::Skirmish)
            .get()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.units.len(), 1);
        assert!(state.resources(h.players[1].id) < 100);
    }

    #[tokio::test]
    async fn snapshots_are_forwarded_and_results_finalized_once() {
        let h = harness(GameKind::Cards, 2).await;
        let (session, mut rx) = h.session(0, GameKind::Cards);
        let tasks = session.start(Some(0)).unwrap();

        assert!(matches!(rx.recv().await, Some(ServerMsg::Snapshot { state: Some(_) })));

        let mut patch = Patch::new();
        patch.put("gameOver", &true).unwrap();
        patch.put("status", &MatchStatus::GameOver).unwrap();
        patch.put("winner", &Winner::Participant(h.players[0].id)).unwrap();
        patch.put(format!("playerHands/{}", h.players[0].id), &Vec::<Card>::new()).unwrap();
        h.store::<CardsState>(GameKind::Cards).patch(&patch).await.unwrap();

        assert!(matches!(rx.recv().await, Some(ServerMsg::Snapshot { .. })));
        match rx.recv().await {
            Some(ServerMsg::RatingUpdated { change, rating }) => {
                assert!(change > 0);
                assert_eq!(rating, None);
            }
            other => panic!("unexpected {other:?}"),
        }
        let marker = GameKind::Cards
            .match_path("m1")
            .unwrap()
            .join(&rating_marker(h.players[0].id))
            .unwrap();
        assert_eq!(h.app.store.get(&marker).await.unwrap(), Some(serde_json::json!(true)));
        assert_eq!(h.app.match_registry.finalizing(), 0);

        for task in tasks {
            task.abort();
        }

        // A reconnect after every session left is not rated again
        let (again, mut again_rx) = h.session(0, GameKind::Cards);
        let tasks = again.start(Some(0)).unwrap();
        assert!(matches!(again_rx.recv().await, Some(ServerMsg::Snapshot { .. })));
        let quiet = tokio::time::timeout(Duration::from_millis(50), again_rx.recv()).await;
        assert!(quiet.is_err(), "unexpected {quiet:?}");

        for task in tasks {
            task.abort();
        }
    }

    #[tokio::test]
    async fn skirmish_draws_are_not_rated() {
        let h = harness(GameKind::Skirmish, 2).await;
        let (session, mut rx) = h.session(1, GameKind::Skirmish);
        let tasks = session.start(Some(1)).unwrap();
        assert!(matches!(rx.recv().await, Some(ServerMsg::Snapshot { .. })));

        let mut patch = Patch::new();
        patch.put("gameOver", &true).unwrap();
        patch.put("status", &MatchStatus::GameOver).unwrap();
        patch.put("winner", &Winner::Draw).unwrap();
        h.store::<SkirmishState>(GameKind::Skirmish).patch(&patch).await.unwrap();

        assert!(matches!(rx.recv().await, Some(ServerMsg::Snapshot { .. })));
        let quiet = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(quiet.is_err(), "unexpected {quiet:?}");

        let marker = GameKind::Skirmish
            .match_path("m1")
            .unwrap()
            .join(&rating_marker(h.players[1].id))
            .unwrap();
        assert_eq!(h.app.store.get(&marker).await.unwrap(), None);

        for task in tasks {
            task.abort();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn only_seat_zero_runs_the_skirmish_authority() {
        let h = harness(GameKind::Skirmish, 2).await;
        let (host, _host_rx) = h.session(0, GameKind::Skirmish);
        let (guest, _guest_rx) = h.session(1, GameKind::Skirmish);

        let guest_tasks = guest.start(Some(1)).unwrap();
        assert_eq!(h.app.match_registry.running_of(LoopKind::SkirmishAuthority), 0);

        let host_tasks = host.start(Some(0)).unwrap();
        assert_eq!(h.app.match_registry.running_of(LoopKind::SkirmishAuthority), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let state = h
            .store::<SkirmishState>(GameKind::Skirmish)
            .get()
            .await
            .unwrap()
            .unwrap();
        assert!(state.tick > 0);

        for task in host_tasks.into_iter().chain(guest_tasks) {
            task.abort();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shooter_session_replays_and_commits_its_shot() {
        let h = harness(GameKind::Archery, 2).await;
        let shooter = h.players[0].id;
        let (mut session, mut rx) = h.session(0, GameKind::Archery);
        let tasks = session.start(Some(0)).unwrap();

        session.handle(ClientMsg::StartCharge).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        session.handle(ClientMsg::Release).await;

        let resolved = loop {
            match rx.recv().await {
                Some(ServerMsg::ShotResolved { shooter: who, frames, .. }) => break (who, frames),
                Some(_) => continue,
                None => panic!("session closed"),
            }
        };
        assert_eq!(resolved.0, shooter);

        tokio::time::sleep(Duration::from_secs(60)).await;
        let state = h
            .store::<ArcheryState>(GameKind::Archery)
            .get()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.shot_data, None);
        assert_eq!(state.current_player, 1);

        for task in tasks {
            task.abort();
        }
    }
}
