//! Writer capabilities: who may write which field group of a match.
//!
//! Tokens can only be obtained through `claim`, and every function that
//! builds a simulation write takes the matching token by reference.

use super::{ActionError, Participant, ParticipantId};

/// Seat index of `participant`, if seated
pub fn seat_of(participants: &[Participant], participant: ParticipantId) -> Option<usize> {
    participants.iter().position(|p| p.id == participant)
}

/// Fixed simulation authority of a skirmish match (turn-order position 0).
///
/// There is no handover: if this participant goes away the simulation stalls.
#[derive(Debug)]
pub struct TickAuthority {
    participant: ParticipantId,
}

impl TickAuthority {
    pub const SEAT: usize = 0;

    pub fn claim(
        participants: &[Participant],
        participant: ParticipantId,
    ) -> Result<Self, ActionError> {
        match seat_of(participants, participant) {
            Some(Self::SEAT) => Ok(Self { participant }),
            Some(_) => Err(ActionError::NotAuthority),
            None => Err(ActionError::NotSeated),
        }
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }
}

/// Authority of the participant whose turn it currently is
#[derive(Debug)]
pub struct TurnAuthority {
    participant: ParticipantId,
    seat: usize,
}

impl TurnAuthority {
    pub fn claim(
        participants: &[Participant],
        current: usize,
        participant: ParticipantId,
    ) -> Result<Self, ActionError> {
        let seat = seat_of(participants, participant).ok_or(ActionError::NotSeated)?;
        if seat != current {
            return Err(ActionError::NotYourTurn);
        }
        Ok(Self { participant, seat })
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    /// Re-check against a possibly newer snapshot
    pub fn still_current(&self, current: usize) -> Result<(), ActionError> {
        if self.seat == current {
            Ok(())
        } else {
            Err(ActionError::NotYourTurn)
        }
    }
}

/// Any seated participant: may write the fields it owns exclusively
#[derive(Debug)]
pub struct SeatToken {
    participant: ParticipantId,
    seat: usize,
}

impl SeatToken {
    pub fn claim(
        participants: &[Participant],
        participant: ParticipantId,
    ) -> Result<Self, ActionError> {
        let seat = seat_of(participants, participant).ok_or(ActionError::NotSeated)?;
        Ok(Self { participant, seat })
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    pub fn seat(&self) -> usize {
        self.seat
    }
}
