//! Arrow flight replay.
//!
//! Every session replays a shot from the shared shot event alone, so the
//! trajectory must be a pure function of `(angle, power, target)`.

use std::time::Duration;

use serde::Serialize;

use crate::util::time::ARROW_FRAME_MS;

/// Field geometry
pub const FIELD_WIDTH: f64 = 800.0;
pub const FIELD_HEIGHT: f64 = 600.0;
pub const BOW_X: f64 = 100.0;
pub const BOW_Y: f64 = 400.0;

/// Per frame squared
pub const GRAVITY: f64 = 0.3;
pub const TARGET_RADIUS: f64 = 35.0;

const VELOCITY_SCALE: f64 = 0.12;
const DRAW_OFFSET: f64 = 0.2;

/// Hard stop for a replay that never leaves the field
const MAX_FRAMES: u32 = 2000;

/// Pause after a scoring arrow lands before the turn passes
const HIT_SETTLE: Duration = Duration::from_millis(2000);
const MISS_SETTLE: Duration = Duration::from_millis(500);

/// Points for a closest approach of `distance` from the target centre
pub fn ring_points(distance: f64) -> u32 {
    match distance {
        d if d < 7.0 => 10,
        d if d < 14.0 => 8,
        d if d < 21.0 => 6,
        d if d < 28.0 => 4,
        d if d < TARGET_RADIUS => 2,
        _ => 0,
    }
}

/// Result of a finished replay
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotOutcome {
    pub points: u32,
    /// Closest approach while inside the target radius
    pub best_distance: Option<f64>,
    /// Frames until the arrow left the target or the field
    pub frames: u32,
}

impl ShotOutcome {
    pub fn is_hit(&self) -> bool {
        self.points > 0
    }
}

/// How long the shooter waits before committing: the replay's own
/// duration plus a settle pause
pub fn commit_delay(outcome: &ShotOutcome) -> Duration {
    let flight = Duration::from_millis(u64::from(outcome.frames) * ARROW_FRAME_MS);
    flight + if outcome.is_hit() { HIT_SETTLE } else { MISS_SETTLE }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlightStatus {
    InFlight,
    Finished(ShotOutcome),
}

/// Deterministic arrow trajectory against one target
#[derive(Debug, Clone)]
pub struct ArrowFlight {
    x0: f64,
    y0: f64,
    vx: f64,
    vy: f64,
    target_x: f64,
    target_y: f64,
    frame: u32,
    best: Option<f64>,
}

impl ArrowFlight {
    /// `angle` in degrees above the horizon, `power` in 0..=100
    pub fn from_shot(angle: f64, power: f64, target_x: f64, target_y: f64) -> Self {
        let theta = angle.to_radians();
        Self {
            x0: BOW_X + power * DRAW_OFFSET,
            y0: BOW_Y,
            vx: power * theta.cos() * VELOCITY_SCALE,
            vy: -power * theta.sin() * VELOCITY_SCALE,
            target_x,
            target_y,
            frame: 0,
            best: None,
        }
    }

    /// Closed-form position at `frame`
    pub fn position_at(&self, frame: u32) -> (f64, f64) {
        let n = f64::from(frame);
        (
            self.x0 + self.vx * n,
            self.y0 + self.vy * n + 0.5 * GRAVITY * n * n,
        )
    }

    /// Advance one frame
    pub fn step(&mut self) -> FlightStatus {
        self.frame += 1;
        let (x, y) = self.position_at(self.frame);

        if x > FIELD_WIDTH || y > FIELD_HEIGHT || self.frame >= MAX_FRAMES {
            return FlightStatus::Finished(self.outcome(0));
        }

        let distance = (x - self.target_x).hypot(y - self.target_y);
        if distance < TARGET_RADIUS {
            self.best = Some(self.best.map_or(distance, |best| best.min(distance)));
            return FlightStatus::InFlight;
        }

        // Left the target after passing through it: score the closest approach
        match self.best {
            Some(best) => FlightStatus::Finished(self.outcome(ring_points(best))),
            None => FlightStatus::InFlight,
        }
    }

    pub fn run_to_end(mut self) -> ShotOutcome {
        loop {
            if let FlightStatus::Finished(outcome) = self.step() {
                return outcome;
            }
        }
    }

    fn outcome(&self, points: u32) -> ShotOutcome {
        ShotOutcome {
            points,
            best_distance: self.best,
            frames: self.frame,
        }
    }
}
