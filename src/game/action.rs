//! Player action validation errors and shared gates

use super::MatchStatus;

/// Reasons an action is refused before anything is written
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Match is not in progress")]
    NotPlaying,

    #[error("Participant is not seated in this match")]
    NotSeated,

    #[error("It is not your turn")]
    NotYourTurn,

    #[error("Only the simulation authority may advance this match")]
    NotAuthority,

    #[error("Card does not match the top card")]
    CardMismatch,

    #[error("No card at hand position {0}")]
    NoSuchCard(usize),

    #[error("Draw pile is empty")]
    EmptyDrawPile,

    #[error("Wild cards need a color choice")]
    NotAWildCard,

    #[error("Wild color must be red, yellow, green or blue")]
    InvalidColor,

    #[error("Not enough resources: have {have}, need {need}")]
    InsufficientResources { have: u32, need: u32 },

    #[error("Bow is already charging")]
    AlreadyCharging,

    #[error("Bow is not charging")]
    NotCharging,

    #[error("A shot is already in flight")]
    ShotInFlight,

    #[error("Shot was not taken by this participant")]
    NotShooter,

    #[error("No shot to resolve")]
    NoShot,

    #[error("Match needs {needed} participants, got {got}")]
    WrongParticipantCount { needed: &'static str, got: usize },

    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ActionError {
    /// Stable code sent to the acting client
    pub fn code(&self) -> &'static str {
        match self {
            ActionError::NotPlaying => "not_playing",
            ActionError::NotSeated => "not_seated",
            ActionError::NotYourTurn => "not_your_turn",
            ActionError::NotAuthority => "not_authority",
            ActionError::CardMismatch => "card_mismatch",
            ActionError::NoSuchCard(_) => "no_such_card",
            ActionError::EmptyDrawPile => "empty_draw_pile",
            ActionError::NotAWildCard => "not_a_wild_card",
            ActionError::InvalidColor => "invalid_color",
            ActionError::InsufficientResources { .. } => "insufficient_resources",
            ActionError::AlreadyCharging => "already_charging",
            ActionError::NotCharging => "not_charging",
            ActionError::ShotInFlight => "shot_in_flight",
            ActionError::NotShooter => "not_shooter",
            ActionError::NoShot => "no_shot",
            ActionError::WrongParticipantCount { .. } => "wrong_participant_count",
            ActionError::Encode(_) => "internal",
        }
    }
}

/// Actions are only accepted while the match is playing
pub fn require_playing(status: MatchStatus) -> Result<(), ActionError> {
    if status == MatchStatus::Playing {
        Ok(())
    } else {
        Err(ActionError::NotPlaying)
    }
}
