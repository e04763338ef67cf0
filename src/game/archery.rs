//! Turn-based shoot-the-target.
//!
//! The current shooter owns the bow and commits its own shot result; every
//! other session only replays the shot.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::action::{require_playing, ActionError};
use super::authority::TurnAuthority;
use super::physics::{ArrowFlight, ShotOutcome};
use super::rating;
use super::turn::{Direction, TurnRing};
use super::{GameKind, MatchRecord, MatchStatus, Participant, ParticipantId, Winner};
use crate::store::Patch;

pub const DEFAULT_MAX_TURNS: u32 = 5;

/// Bow sweep per tick (degrees) and the arc it wraps at
pub const ANGLE_STEP: f64 = 0.5;
pub const ANGLE_WRAP: f64 = 91.0;

pub const POWER_STEP: f64 = 2.0;
pub const MAX_POWER: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub x: f64,
    pub y: f64,
}

impl Default for Target {
    fn default() -> Self {
        Self { x: 400.0, y: 300.0 }
    }
}

/// Fresh target somewhere in the right half of the field
pub fn random_target(rng: &mut impl Rng) -> Target {
    Target {
        x: rng.gen_range(350.0..500.0),
        y: rng.gen_range(250.0..350.0),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bow {
    pub angle: f64,
    pub power: f64,
    pub charging: bool,
}

impl Bow {
    /// Sweep the angle, or ramp power while charging
    pub fn ticked(self) -> Self {
        if self.charging {
            Self {
                power: (self.power + POWER_STEP).min(MAX_POWER),
                ..self
            }
        } else {
            Self {
                angle: (self.angle + ANGLE_STEP) % ANGLE_WRAP,
                ..self
            }
        }
    }
}

/// The one shared trigger every session replays
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotEvent {
    pub angle: f64,
    pub power: f64,
    pub timestamp: u64,
    pub player_id: ParticipantId,
}

impl ShotEvent {
    pub fn replay(&self, target: &Target) -> ShotOutcome {
        ArrowFlight::from_shot(self.angle, self.power, target.x, target.y).run_to_end()
    }
}

/// Replicated archery record at `games/shoot_the_target/<matchId>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArcheryState {
    pub players: Vec<Participant>,
    pub current_player: usize,
    pub target: Target,
    pub bow: Bow,
    pub shot_data: Option<ShotEvent>,
    pub scores: HashMap<ParticipantId, u32>,
    pub turn_count: u32,
    pub max_turns: u32,
    pub game_over: bool,
    pub winner: Option<Winner>,
    pub status: MatchStatus,
}

impl Default for ArcheryState {
    fn default() -> Self {
        Self {
            players: Vec::new(),
            current_player: 0,
            target: Target::default(),
            bow: Bow::default(),
            shot_data: None,
            scores: HashMap::new(),
            turn_count: 0,
            max_turns: DEFAULT_MAX_TURNS,
            game_over: false,
            winner: None,
            status: MatchStatus::Waiting,
        }
    }
}

impl ArcheryState {
    pub fn new_match(players: Vec<Participant>, rng: &mut impl Rng) -> Result<Self, ActionError> {
        if players.len() < 2 {
            return Err(ActionError::WrongParticipantCount {
                needed: "at least 2",
                got: players.len(),
            });
        }

        let players: Vec<Participant> = players
            .into_iter()
            .enumerate()
            .map(|(number, p)| Participant { number, ..p })
            .collect();
        let scores = players.iter().map(|p| (p.id, 0)).collect();

        Ok(Self {
            players,
            target: random_target(rng),
            scores,
            status: MatchStatus::Playing,
            ..Default::default()
        })
    }

    pub fn score(&self, participant: ParticipantId) -> u32 {
        self.scores.get(&participant).copied().unwrap_or(0)
    }

    /// Current shooter may touch the bow only while no shot is pending
    fn check_bow(&self, auth: &TurnAuthority) -> Result<(), ActionError> {
        require_playing(self.status)?;
        if self.game_over {
            return Err(ActionError::NotPlaying);
        }
        auth.still_current(self.current_player)?;
        if self.shot_data.is_some() {
            return Err(ActionError::ShotInFlight);
        }
        Ok(())
    }

    /// One bow-loop tick
    pub fn bow_tick(&self, auth: &TurnAuthority) -> Result<Patch, ActionError> {
        self.check_bow(auth)?;
        let mut patch = Patch::new();
        patch.put("bow", &self.bow.ticked())?;
        Ok(patch)
    }

    /// Freeze the angle and start ramping power from zero
    pub fn start_charge(&self, auth: &TurnAuthority) -> Result<Patch, ActionError> {
        self.check_bow(auth)?;
        if self.bow.charging {
            return Err(ActionError::AlreadyCharging);
        }

        let bow = Bow {
            angle: self.bow.angle,
            power: 0.0,
            charging: true,
        };
        let mut patch = Patch::new();
        patch.put("bow", &bow)?;
        Ok(patch)
    }

    /// Emit the shot event and reset the bow
    pub fn release(&self, auth: &TurnAuthority, now: u64) -> Result<Patch, ActionError> {
        self.check_bow(auth)?;
        if !self.bow.charging {
            return Err(ActionError::NotCharging);
        }

        let shot = ShotEvent {
            angle: self.bow.angle,
            power: self.bow.power,
            timestamp: now,
            player_id: auth.participant(),
        };
        let mut patch = Patch::new();
        patch.put("shotData", &shot)?;
        patch.put("bow", &Bow::default())?;
        Ok(patch)
    }

    /// Record the shooter's replayed result and pass the turn.
    ///
    /// `rng` only draws the next round's target.
    pub fn commit_shot(
        &self,
        auth: &TurnAuthority,
        outcome: &ShotOutcome,
        rng: &mut impl Rng,
    ) -> Result<Patch, ActionError> {
        require_playing(self.status)?;
        if self.game_over {
            return Err(ActionError::NotPlaying);
        }
        auth.still_current(self.current_player)?;

        let shot = self.shot_data.ok_or(ActionError::NoShot)?;
        if shot.player_id != auth.participant() {
            return Err(ActionError::NotShooter);
        }

        let shooter = auth.participant();
        let mut scores = self.scores.clone();
        *scores.entry(shooter).or_insert(0) += outcome.points;

        let ring = TurnRing::new(self.players.len(), self.current_player, Direction::Forward)
            .ok_or(ActionError::NotPlaying)?;
        let next = ring.peek(1);
        let round_complete = next == 0;
        let turn_count = self.turn_count + u32::from(round_complete);

        let mut patch = Patch::new();
        patch.put(format!("scores/{shooter}"), &scores[&shooter])?;
        patch.put("currentPlayer", &next)?;
        patch.put("turnCount", &turn_count)?;
        patch.put("bow", &Bow::default())?;
        patch.remove("shotData");

        if turn_count >= self.max_turns {
            patch.put("gameOver", &true)?;
            patch.put("status", &MatchStatus::GameOver)?;
            patch.put("winner", &top_scorer(&self.players, &scores))?;
        } else if round_complete {
            patch.put("target", &random_target(rng))?;
        }

        Ok(patch)
    }
}

/// Highest score wins; a shared top score is a draw
fn top_scorer(players: &[Participant], scores: &HashMap<ParticipantId, u32>) -> Winner {
    let score = |p: &Participant| scores.get(&p.id).copied().unwrap_or(0);
    let best = players.iter().map(score).max().unwrap_or(0);
    let mut leaders = players.iter().filter(|p| score(p) == best);

    match (leaders.next(), leaders.next()) {
        (Some(leader), None) => Winner::Participant(leader.id),
        _ => Winner::Draw,
    }
}

impl MatchRecord for ArcheryState {
    const KIND: GameKind = GameKind::Archery;

    fn participants(&self) -> &[Participant] {
        &self.players
    }

    fn status(&self) -> MatchStatus {
        if self.game_over {
            MatchStatus::GameOver
        } else {
            self.status
        }
    }

    fn winner(&self) -> Option<Winner> {
        self.winner
    }

    /// Higher score = better placement
    fn rating_change(&self, participant: ParticipantId) -> Option<i32> {
        if !self.is_over() {
            return None;
        }
        let mut order: Vec<&Participant> = self.players.iter().collect();
        order.sort_by_key(|p| std::cmp::Reverse(self.score(p.id)));
        let position = order.iter().position(|p| p.id == participant)? + 1;
        Some(rating::placement_change(position, order.len()))
    }
}
