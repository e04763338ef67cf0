//! Rating finalization formulas

use super::{GameKind, ParticipantId, Winner};

/// Rating of a participant who never played a game
pub const DEFAULT_RATING: i32 = 1000;

/// Largest single-match change
pub const BASE_RATING_CHANGE: i32 = 20;

/// Placement-based change for `position` (1 = best) out of `total`.
///
/// The top half gains, the rest loses, scaled down linearly by position.
pub fn placement_change(position: usize, total: usize) -> i32 {
    if position == 0 || total == 0 || position > total {
        return 0;
    }

    let multiplier = 1.0 - (position - 1) as f64 / total as f64;
    let magnitude = (BASE_RATING_CHANGE as f64 * multiplier).round() as i32;

    if position <= total / 2 {
        magnitude
    } else {
        -magnitude
    }
}

/// Win/loss change for two-sided games; draws are not rated
pub fn win_loss_change(winner: Option<Winner>, participant: ParticipantId) -> Option<i32> {
    match winner? {
        Winner::Participant(id) if id == participant => Some(BASE_RATING_CHANGE),
        Winner::Participant(_) => Some(-BASE_RATING_CHANGE),
        Winner::Draw => None,
    }
}

/// New stored rating after `change`
pub fn apply_change(game: GameKind, current: i32, change: i32) -> i32 {
    match game {
        GameKind::Skirmish => (current + change).max(0),
        GameKind::Cards | GameKind::Archery => current + change,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn two_player_placements_favour_the_winner() {
        assert_eq!(placement_change(1, 2), 20);
        assert_eq!(placement_change(2, 2), -10);
    }

    #[test]
    fn four_player_placements() {
        let changes: Vec<i32> = (1..=4).map(|p| placement_change(p, 4)).collect();
        assert_eq!(changes, vec![20, 15, -10, -5]);
    }

    #[test]
    fn out_of_range_positions_change_nothing() {
        assert_eq!(placement_change(0, 3), 0);
        assert_eq!(placement_change(4, 3), 0);
        assert_eq!(placement_change(1, 0), 0);
    }

    #[test]
    fn win_loss_and_draw() {
        let me = Uuid::new_v4();
        let them = Uuid::new_v4();
        assert_eq!(win_loss_change(Some(Winner::Participant(me)), me), Some(20));
        assert_eq!(win_loss_change(Some(Winner::Participant(them)), me), Some(-20));
        assert_eq!(win_loss_change(Some(Winner::Draw), me), None);
        assert_eq!(win_loss_change(None, me), None);
    }

    #[test]
    fn skirmish_rating_never_goes_negative() {
        assert_eq!(apply_change(GameKind::Skirmish, 10, -20), 0);
        assert_eq!(apply_change(GameKind::Cards, 10, -20), -10);
        assert_eq!(apply_change(GameKind::Archery, 1000, 20), 1020);
    }
}
