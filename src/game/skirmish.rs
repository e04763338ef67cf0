//! Two-sided lane skirmish.
//!
//! Seat 0 runs [`SkirmishState::step`] every tick and writes the whole
//! snapshot back; every seat may deploy its own units.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::action::{require_playing, ActionError};
use super::authority::{SeatToken, TickAuthority};
use super::combat::{
    apply_damage, Projectile, Side, Unit, UnitKind, UnitState, UnitStats, BASE_ATTACK_COOLDOWN_MS,
    BASE_HP, BASE_WIDTH, BASE_Y, MELEE_BASE_REACH, RANGED_BASE_REACH, UNIT_ATTACK_COOLDOWN_MS,
};
use super::rating;
use super::{GameKind, MatchRecord, MatchStatus, Participant, ParticipantId, Winner};
use crate::store::Patch;

pub const STARTING_RESOURCES: u32 = 100;
pub const MAX_RESOURCES: u32 = 999;

/// Passive income is paid every this many ticks
pub const INCOME_EVERY_TICKS: u64 = 3;

/// Battle length before it is called a draw (ms)
pub const DRAW_AFTER_MS: u64 = 210_000;

/// How long a dead unit stays on the lane (ms)
pub const CORPSE_LINGER_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Base {
    pub hp: f64,
    pub max_hp: f64,
    pub x: f64,
    pub y: f64,
    pub side: Side,
}

impl Base {
    pub fn for_side(side: Side) -> Self {
        Self {
            hp: BASE_HP,
            max_hp: BASE_HP,
            x: side.base_x(),
            y: BASE_Y,
            side,
        }
    }

    pub fn center_x(&self) -> f64 {
        self.x + BASE_WIDTH / 2.0
    }
}

/// Replicated skirmish record at `games/age_of_wars/<matchId>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkirmishState {
    pub players: Vec<Participant>,
    pub player_resources: HashMap<ParticipantId, u32>,
    pub player_bases: HashMap<ParticipantId, Base>,
    pub units: Vec<Unit>,
    pub projectiles: Vec<Projectile>,
    /// Ms since the first deploy
    pub game_time: u64,
    pub game_start_time: Option<u64>,
    pub battle_started: bool,
    pub game_over: bool,
    pub winner: Option<Winner>,
    pub status: MatchStatus,
    pub tick: u64,
    pub next_entity_id: u64,
}

impl SkirmishState {
    /// Fresh lane for exactly two participants; seat 0 plays left
    pub fn new_match(players: Vec<Participant>) -> Result<Self, ActionError> {
        if players.len() != 2 {
            return Err(ActionError::WrongParticipantCount {
                needed: "exactly 2",
                got: players.len(),
            });
        }

        let players: Vec<Participant> = players
            .into_iter()
            .enumerate()
            .map(|(number, p)| Participant { number, ..p })
            .collect();

        let player_resources = players
            .iter()
            .map(|p| (p.id, STARTING_RESOURCES))
            .collect();
        let player_bases = players
            .iter()
            .map(|p| (p.id, Base::for_side(Side::for_seat(p.number))))
            .collect();

        Ok(Self {
            players,
            player_resources,
            player_bases,
            status: MatchStatus::Playing,
            ..Default::default()
        })
    }

    pub fn resources(&self, participant: ParticipantId) -> u32 {
        self.player_resources
            .get(&participant)
            .copied()
            .unwrap_or(0)
    }

    pub fn base(&self, participant: ParticipantId) -> Option<&Base> {
        self.player_bases.get(&participant)
    }

    /// Spend resources on a unit of `kind`; the first deploy starts the clock
    pub fn deploy(&self, seat: &SeatToken, kind: UnitKind, now: u64) -> Result<Patch, ActionError> {
        require_playing(self.status)?;
        if self.game_over {
            return Err(ActionError::NotPlaying);
        }

        let owner = seat.participant();
        let cost = UnitStats::for_kind(kind).cost;
        let have = self.resources(owner);
        if have < cost {
            return Err(ActionError::InsufficientResources { have, need: cost });
        }

        let mut units = self.units.clone();
        units.push(Unit::spawn(
            self.next_entity_id,
            owner,
            kind,
            Side::for_seat(seat.seat()),
        ));

        let mut patch = Patch::new();
        patch.put("units", &units)?;
        patch.put(format!("playerResources/{owner}"), &(have - cost))?;
        patch.put("nextEntityId", &(self.next_entity_id + 1))?;
        if !self.battle_started {
            patch.put("battleStarted", &true)?;
            patch.put("gameStartTime", &now)?;
        }
        Ok(patch)
    }

    /// One authoritative simulation tick at wall-clock `now` (unix ms)
    pub fn step(&self, _auth: &TickAuthority, now: u64) -> SkirmishState {
        let mut next = self.clone();
        if next.status != MatchStatus::Playing || next.game_over {
            return next;
        }

        next.tick += 1;
        if let Some(start) = next.game_start_time {
            next.game_time = now.saturating_sub(start);
        }

        if next.battle_started && next.game_time >= DRAW_AFTER_MS {
            next.finish(Winner::Draw);
            return next;
        }

        // Decisions read pre-tick positions and hp from `self.units`
        let mut melee_hits: Vec<(u64, f64)> = Vec::new();
        let mut fired: Vec<Projectile> = Vec::new();

        for unit in next.units.iter_mut() {
            if !unit.is_alive() {
                unit.state = UnitState::Dead;
                unit.death_time.get_or_insert(now);
                continue;
            }

            let target = self
                .units
                .iter()
                .filter(|other| other.side != unit.side && other.is_alive())
                .map(|other| (other.id, (other.x - unit.x).abs()))
                .filter(|(_, dx)| *dx <= unit.range)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(id, _)| id);

            if let Some(target_id) = target {
                unit.state = UnitState::Attack;
                if unit.ready(now, UNIT_ATTACK_COOLDOWN_MS) {
                    unit.last_attack = now;
                    if unit.is_ranged() {
                        fired.push(Projectile::fire(next.next_entity_id, unit, false));
                        next.next_entity_id += 1;
                    } else {
                        melee_hits.push((target_id, unit.damage));
                    }
                }
                continue;
            }

            let reach = unit.range
                + if unit.is_ranged() {
                    RANGED_BASE_REACH
                } else {
                    MELEE_BASE_REACH
                };
            let enemy_base = next
                .player_bases
                .iter_mut()
                .find(|(owner, _)| **owner != unit.owner)
                .map(|(_, base)| base)
                .filter(|base| (base.center_x() - unit.x).abs() <= reach);

            if let Some(base) = enemy_base {
                unit.state = UnitState::Attack;
                if unit.ready(now, BASE_ATTACK_COOLDOWN_MS) {
                    unit.last_attack = now;
                    if unit.is_ranged() {
                        fired.push(Projectile::fire(next.next_entity_id, unit, true));
                        next.next_entity_id += 1;
                    } else {
                        base.hp = apply_damage(base.hp, unit.damage).0;
                    }
                }
                continue;
            }

            unit.state = UnitState::Walk;
            unit.x += unit.speed * unit.side.direction();
        }

        // Queued melee lands only after every unit has decided
        for (target_id, damage) in melee_hits {
            if let Some(target) = next
                .units
                .iter_mut()
                .find(|u| u.id == target_id && u.is_alive())
            {
                target.hp = apply_damage(target.hp, damage).0;
            }
        }

        let mut projectiles = std::mem::take(&mut next.projectiles);
        projectiles.extend(fired);
        projectiles.retain_mut(|p| {
            if !p.advance() {
                return false;
            }

            if p.targets_base {
                let hit = next
                    .player_bases
                    .iter_mut()
                    .find(|(owner, base)| **owner != p.owner && p.hits_base(base.x, base.y));
                return match hit {
                    Some((_, base)) => {
                        base.hp = apply_damage(base.hp, p.damage).0;
                        false
                    }
                    None => true,
                };
            }

            match next
                .units
                .iter_mut()
                .find(|u| u.owner != p.owner && u.is_alive() && p.hits_unit(u.x, u.y))
            {
                Some(target) => {
                    target.hp = apply_damage(target.hp, p.damage).0;
                    false
                }
                None => true,
            }
        });
        next.projectiles = projectiles;

        next.units.retain(|u| {
            u.death_time
                .map_or(true, |died| now.saturating_sub(died) <= CORPSE_LINGER_MS)
        });

        if next.tick % INCOME_EVERY_TICKS == 0 {
            for resources in next.player_resources.values_mut() {
                *resources = (*resources + 1).min(MAX_RESOURCES);
            }
        }

        let fallen: Vec<ParticipantId> = next
            .players
            .iter()
            .filter(|p| next.player_bases.get(&p.id).is_some_and(|b| b.hp <= 0.0))
            .map(|p| p.id)
            .collect();
        match fallen.as_slice() {
            [] => {}
            [loser] => {
                if let Some(survivor) = next.players.iter().find(|p| p.id != *loser) {
                    let winner = Winner::Participant(survivor.id);
                    next.finish(winner);
                }
            }
            _ => next.finish(Winner::Draw),
        }

        next
    }

    /// Whole-snapshot write produced by the tick authority
    pub fn snapshot_patch(&self, _auth: &TickAuthority) -> Result<Patch, ActionError> {
        let mut patch = Patch::new();
        patch.put("units", &self.units)?;
        patch.put("projectiles", &self.projectiles)?;
        patch.put("playerBases", &self.player_bases)?;
        patch.put("playerResources", &self.player_resources)?;
        patch.put("gameTime", &self.game_time)?;
        patch.put("tick", &self.tick)?;
        patch.put("nextEntityId", &self.next_entity_id)?;
        patch.put("status", &self.status)?;
        patch.put("gameOver", &self.game_over)?;
        patch.put("winner", &self.winner)?;
        Ok(patch)
    }

    fn finish(&mut self, winner: Winner) {
        self.game_over = true;
        self.status = MatchStatus::GameOver;
        self.winner = Some(winner);
    }
}

impl MatchRecord for SkirmishState {
    const KIND: GameKind = GameKind::Skirmish;

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

    fn rating_change(&self, participant: ParticipantId) -> Option<i32> {
        if !self.is_over() {
            return None;
        }
        self.seat_of(participant)?;
        rating::win_loss_change(self.winner, participant)
    }
}
