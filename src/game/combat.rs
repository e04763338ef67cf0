//! Skirmish combat - unit stats, projectiles, hit detection

use serde::{Deserialize, Serialize};

use super::ParticipantId;

/// Battlefield geometry
pub const GROUND_Y: f64 = 480.0;
pub const UNIT_SIZE: f64 = 128.0;
pub const BASE_WIDTH: f64 = 200.0;
pub const BASE_HEIGHT: f64 = 400.0;
pub const BASE_Y: f64 = 80.0;
pub const BASE_HP: f64 = 2000.0;

/// Units with a longer reach than this fire projectiles
pub const RANGED_THRESHOLD: f64 = 50.0;

/// Extra reach towards the enemy base
pub const RANGED_BASE_REACH: f64 = 100.0;
pub const MELEE_BASE_REACH: f64 = 60.0;

/// Attack cooldowns (ms)
pub const UNIT_ATTACK_COOLDOWN_MS: u64 = 1500;
pub const BASE_ATTACK_COOLDOWN_MS: u64 = 1000;

pub const PROJECTILE_SPEED: f64 = 8.0;
const MUZZLE_OFFSET_X: f64 = 30.0;
const UNIT_AIM_OFFSET_Y: f64 = 25.0;
const BASE_AIM_OFFSET_Y: f64 = 40.0;
const UNIT_TRAVEL_SLACK: f64 = 50.0;
const BASE_TRAVEL_SLACK: f64 = 120.0;

/// Projectile vs unit hit box (half extents around the unit's centre line)
const UNIT_HIT_DX: f64 = 40.0;
const UNIT_HIT_DY: f64 = 30.0;
const BASE_HIT_MARGIN: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Hooligan,
    Shooter,
    Knight,
}

/// Unit stats per kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitStats {
    pub cost: u32,
    pub hp: f64,
    pub damage: f64,
    /// Pixels per tick
    pub speed: f64,
    pub range: f64,
}

impl UnitStats {
    pub fn for_kind(kind: UnitKind) -> Self {
        match kind {
            UnitKind::Hooligan => Self {
                cost: 50,
                hp: 100.0,
                damage: 20.0,
                speed: 2.0,
                range: 20.0,
            },
            UnitKind::Shooter => Self {
                cost: 75,
                hp: 60.0,
                damage: 15.0,
                speed: 1.7,
                range: 150.0,
            },
            UnitKind::Knight => Self {
                cost: 120,
                hp: 200.0,
                damage: 40.0,
                speed: 1.2,
                range: 25.0,
            },
        }
    }
}

/// Whether a reach fires projectiles
pub fn is_ranged(range: f64) -> bool {
    range > RANGED_THRESHOLD
}

/// Side of the lane. Seat 0 plays left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn for_seat(seat: usize) -> Self {
        if seat == 0 {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// +1 towards the right edge, -1 towards the left
    pub fn direction(self) -> f64 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }

    pub fn base_x(self) -> f64 {
        match self {
            Side::Left => 50.0,
            Side::Right => 750.0,
        }
    }

    pub fn spawn_x(self) -> f64 {
        match self {
            Side::Left => 150.0,
            Side::Right => 850.0,
        }
    }
}

/// Y coordinate units stand at
pub fn spawn_y() -> f64 {
    GROUND_Y - UNIT_SIZE
}

/// What a unit did on its last tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    #[default]
    Walk,
    Attack,
    Dead,
}

/// Live (or dying) unit on the lane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: u64,
    pub owner: ParticipantId,
    pub kind: UnitKind,
    pub side: Side,
    pub x: f64,
    pub y: f64,
    pub hp: f64,
    pub max_hp: f64,
    pub damage: f64,
    pub speed: f64,
    pub range: f64,
    #[serde(default)]
    pub state: UnitState,
    /// Unix ms of the last attack, 0 if never attacked
    #[serde(default)]
    pub last_attack: u64,
    #[serde(default)]
    pub death_time: Option<u64>,
}

impl Unit {
    pub fn spawn(id: u64, owner: ParticipantId, kind: UnitKind, side: Side) -> Self {
        let stats = UnitStats::for_kind(kind);
        Self {
            id,
            owner,
            kind,
            side,
            x: side.spawn_x(),
            y: spawn_y(),
            hp: stats.hp,
            max_hp: stats.hp,
            damage: stats.damage,
            speed: stats.speed,
            range: stats.range,
            state: UnitState::Walk,
            last_attack: 0,
            death_time: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    pub fn is_ranged(&self) -> bool {
        is_ranged(self.range)
    }

    /// Attack cooldown has elapsed at `now`
    pub fn ready(&self, now: u64, cooldown_ms: u64) -> bool {
        now.saturating_sub(self.last_attack) > cooldown_ms
    }
}

/// In-flight projectile. Only travels horizontally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projectile {
    pub id: u64,
    pub owner: ParticipantId,
    pub x: f64,
    pub y: f64,
    pub direction: f64,
    pub damage: f64,
    pub speed: f64,
    pub remaining_range: f64,
    #[serde(default)]
    pub targets_base: bool,
}

impl Projectile {
    /// Shot fired by `shooter` at a unit or at the enemy base
    pub fn fire(id: u64, shooter: &Unit, targets_base: bool) -> Self {
        let direction = shooter.side.direction();
        let (aim_y, slack) = if targets_base {
            (BASE_AIM_OFFSET_Y, BASE_TRAVEL_SLACK)
        } else {
            (UNIT_AIM_OFFSET_Y, UNIT_TRAVEL_SLACK)
        };

        Self {
            id,
            owner: shooter.owner,
            x: shooter.x + MUZZLE_OFFSET_X * direction,
            y: shooter.y + UNIT_SIZE / 2.0 + aim_y,
            direction,
            damage: shooter.damage,
            speed: PROJECTILE_SPEED,
            remaining_range: shooter.range + slack,
            targets_base,
        }
    }

    /// Move one tick, returns false once the travel budget is spent
    pub fn advance(&mut self) -> bool {
        self.x += self.speed * self.direction;
        self.remaining_range -= self.speed;
        self.remaining_range > 0.0
    }

    /// Check collision with a unit standing at `(unit_x, unit_y)`
    pub fn hits_unit(&self, unit_x: f64, unit_y: f64) -> bool {
        (unit_x - self.x).abs() < UNIT_HIT_DX
            && (unit_y + UNIT_SIZE / 2.0 - self.y).abs() < UNIT_HIT_DY
    }

    /// Check collision with a base whose top-left corner is `(base_x, base_y)`
    pub fn hits_base(&self, base_x: f64, base_y: f64) -> bool {
        self.x >= base_x - BASE_HIT_MARGIN
            && self.x <= base_x + BASE_WIDTH + BASE_HIT_MARGIN
            && self.y >= base_y
            && self.y <= base_y + BASE_HEIGHT
    }
}

/// Apply damage to hp, returns (new_hp, is_dead)
pub fn apply_damage(current_hp: f64, damage: f64) -> (f64, bool) {
    let new_hp = (current_hp - damage).max(0.0);
    (new_hp, new_hp <= 0.0)
}
