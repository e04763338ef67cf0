//! WebSocket protocol message definitions
//! These are the wire types for participant sessions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::game::cards::CardColor;
use crate::game::combat::UnitKind;
use crate::game::observer::ResolvedShot;
use crate::game::GameKind;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Play the card at `index` in the caller's hand
    PlayCard { index: usize },

    /// Declare the color for the wild card held back by `play_card`
    ChooseColor { color: CardColor },

    DrawCard,

    /// Spawn a unit in the caller's lane
    Deploy { unit: UnitKind },

    /// Freeze the bow angle and start charging power
    StartCharge,

    /// Fire at the current angle and power
    Release,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

impl ClientMsg {
    /// Game this message belongs to; `None` for game-independent messages
    pub fn game(&self) -> Option<GameKind> {
        match self {
            ClientMsg::PlayCard { .. } | ClientMsg::ChooseColor { .. } | ClientMsg::DrawCard => {
                Some(GameKind::Cards)
            }
            ClientMsg::Deploy { .. } => Some(GameKind::Skirmish),
            ClientMsg::StartCharge | ClientMsg::Release => Some(GameKind::Archery),
            ClientMsg::Ping { .. } => None,
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// First message after the upgrade
    Welcome {
        user_id: Uuid,
        game: GameKind,
        match_id: String,
        /// Turn-order position; `None` for spectators
        seat: Option<usize>,
        server_time: u64,
    },

    /// Full match record after every store write (`None` once removed)
    Snapshot { state: Option<Value> },

    /// A wild card was accepted and is waiting for its color
    ChooseColor { hand_index: usize },

    /// Local replay of the latest shot
    ShotResolved {
        shooter: Uuid,
        points: u32,
        best_distance: Option<f64>,
        frames: u32,
    },

    /// Action refused; nothing was written
    Rejected { code: String, message: String },

    /// Rating written once the match ended (`rating` is absent without a profile store)
    RatingUpdated { change: i32, rating: Option<i32> },

    Pong {
        /// Echoed client timestamp
        t: u64,
        server_time: u64,
    },

    /// Session-level failure
    Error { message: String },
}

impl ServerMsg {
    pub fn shot_resolved(resolved: &ResolvedShot) -> Self {
        ServerMsg::ShotResolved {
            shooter: resolved.shooter(),
            points: resolved.outcome.points,
            best_distance: resolved.outcome.best_distance,
            frames: resolved.outcome.frames,
        }
    }

    pub fn rejected(code: &str, message: impl ToString) -> Self {
        ServerMsg::Rejected {
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}
