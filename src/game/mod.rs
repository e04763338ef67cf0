//! Game simulation modules

pub mod action;
pub mod archery;
pub mod authority;
pub mod cards;
pub mod combat;
pub mod observer;
pub mod physics;
pub mod rating;
pub mod runner;
pub mod skirmish;
pub mod turn;

pub use action::ActionError;
pub use runner::MatchRegistry;

use std::fmt;
use std::str::FromStr;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{StorePath, StoreError};

/// Participant identifier (the authenticated user id)
pub type ParticipantId = Uuid;

/// Placeholder shown when a profile cannot be resolved
pub const UNKNOWN_PLAYER: &str = "Unknown Player";

/// The three hosted games
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameKind {
    /// Shedding card game
    #[serde(rename = "uno")]
    Cards,
    /// Two-sided lane strategy game
    #[serde(rename = "age_of_wars")]
    Skirmish,
    /// Turn-based shoot-the-target game
    #[serde(rename = "shoot_the_target")]
    Archery,
}

impl GameKind {
    /// Key under `games/` in the replicated store
    pub fn store_key(self) -> &'static str {
        match self {
            GameKind::Cards => "uno",
            GameKind::Skirmish => "age_of_wars",
            GameKind::Archery => "shoot_the_target",
        }
    }

    /// `games/<kind>/<match_id>`
    pub fn match_path(self, match_id: &str) -> Result<StorePath, StoreError> {
        if match_id.is_empty() || match_id.contains('/') {
            return Err(StoreError::InvalidPath(match_id.to_string()));
        }
        StorePath::parse(&format!("games/{}/{}", self.store_key(), match_id))
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.store_key())
    }
}

impl FromStr for GameKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uno" => Ok(GameKind::Cards),
            "age_of_wars" => Ok(GameKind::Skirmish),
            "shoot_the_target" => Ok(GameKind::Archery),
            other => Err(format!("unknown game: {other}")),
        }
    }
}

/// Match lifecycle. Only ever moves forward.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum MatchStatus {
    #[default]
    Waiting,
    Playing,
    GameOver,
}

/// Terminal match result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Winner {
    Participant(ParticipantId),
    Draw,
}

impl From<Winner> for String {
    fn from(winner: Winner) -> Self {
        match winner {
            Winner::Participant(id) => id.to_string(),
            Winner::Draw => "draw".to_string(),
        }
    }
}

impl TryFrom<String> for Winner {
    type Error = uuid::Error;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        if raw == "draw" {
            return Ok(Winner::Draw);
        }
        Uuid::parse_str(&raw).map(Winner::Participant)
    }
}

/// Seat in a match; `number` is the turn-order position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    #[serde(default = "unknown_player")]
    pub username: String,
    #[serde(default)]
    pub number: usize,
}

impl Participant {
    pub fn new(id: ParticipantId, username: impl Into<String>, number: usize) -> Self {
        Self {
            id,
            username: username.into(),
            number,
        }
    }
}

fn unknown_player() -> String {
    UNKNOWN_PLAYER.to_string()
}

/// Common view over the three match payloads
pub trait MatchRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: GameKind;

    /// Participants in turn order
    fn participants(&self) -> &[Participant];

    fn status(&self) -> MatchStatus;

    fn winner(&self) -> Option<Winner>;

    /// Rating delta for `participant` once the match is over
    fn rating_change(&self, participant: ParticipantId) -> Option<i32>;

    fn seat_of(&self, participant: ParticipantId) -> Option<usize> {
        authority::seat_of(self.participants(), participant)
    }

    fn is_over(&self) -> bool {
        self.status() == MatchStatus::GameOver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_store_spelling() {
        let json = serde_json::to_string(&MatchStatus::GameOver).unwrap();
        assert_eq!(json, "\"gameOver\"");
    }

    #[test]
    fn winner_encodes_as_id_or_draw() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(Winner::Participant(id)).unwrap();
        assert_eq!(json, serde_json::json!(id.to_string()));
        let draw: Winner = serde_json::from_str("\"draw\"").unwrap();
        assert_eq!(draw, Winner::Draw);
        assert!(serde_json::from_str::<Winner>("\"nobody\"").is_err());
    }

    #[test]
    fn match_paths_follow_game_keys() {
        let path = GameKind::Skirmish.match_path("lobby-1").unwrap();
        assert_eq!(path.to_string(), "games/age_of_wars/lobby-1");
        assert!(GameKind::Cards.match_path("a/b").is_err());
        assert_eq!("shoot_the_target".parse::<GameKind>(), Ok(GameKind::Archery));
    }

    #[test]
    fn participant_defaults_missing_username() {
        let p: Participant =
            serde_json::from_str(&format!("{{\"id\":\"{}\"}}", Uuid::nil())).unwrap();
        assert_eq!(p.username, UNKNOWN_PLAYER);
    }
}
