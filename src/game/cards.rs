//! Card game: deck, dealing and the turn loop.
//!
//! The participant whose turn it is performs every write for its own action.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::action::{require_playing, ActionError};
use super::authority::TurnAuthority;
use super::rating;
use super::turn::{Direction, TurnRing};
use super::{GameKind, MatchRecord, MatchStatus, Participant, ParticipantId, Winner};
use crate::store::Patch;

/// Cards dealt to each participant
pub const HAND_SIZE: usize = 7;

/// Most participants a single deck can deal to
pub const MAX_PLAYERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardColor {
    Red,
    Yellow,
    Green,
    Blue,
    Wild,
}

impl CardColor {
    /// Colors a wild card may be declared as
    pub const SUITS: [CardColor; 4] = [
        CardColor::Red,
        CardColor::Yellow,
        CardColor::Green,
        CardColor::Blue,
    ];

    pub fn is_suit(self) -> bool {
        self != CardColor::Wild
    }
}

/// Face value, stored with the portal's spelling (`"7"`, `"Rev"`, `"+2"`...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Face {
    Number(u8),
    Skip,
    Reverse,
    DrawTwo,
    Wild,
    WildDrawFour,
}

impl Face {
    /// Colored action cards
    pub fn is_action(self) -> bool {
        matches!(self, Face::Skip | Face::Reverse | Face::DrawTwo)
    }

    /// Cards the next participant must take
    pub fn penalty(self) -> usize {
        match self {
            Face::DrawTwo => 2,
            Face::WildDrawFour => 4,
            _ => 0,
        }
    }
}

impl From<Face> for String {
    fn from(face: Face) -> Self {
        match face {
            Face::Number(n) => n.to_string(),
            Face::Skip => "Skip".to_string(),
            Face::Reverse => "Rev".to_string(),
            Face::DrawTwo => "+2".to_string(),
            Face::Wild => "Wild".to_string(),
            Face::WildDrawFour => "+4".to_string(),
        }
    }
}

impl TryFrom<String> for Face {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.as_str() {
            "Skip" => Ok(Face::Skip),
            "Rev" => Ok(Face::Reverse),
            "+2" => Ok(Face::DrawTwo),
            "Wild" => Ok(Face::Wild),
            "+4" => Ok(Face::WildDrawFour),
            digits => match digits.parse::<u8>() {
                Ok(n) if n <= 9 => Ok(Face::Number(n)),
                _ => Err(format!("unknown card value {raw}")),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub color: CardColor,
    pub value: Face,
}

impl Card {
    pub fn new(color: CardColor, value: Face) -> Self {
        Self { color, value }
    }

    pub fn is_wild(&self) -> bool {
        self.color == CardColor::Wild
    }
}

/// Unshuffled 108-card deck
pub fn new_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(108);

    for color in CardColor::SUITS {
        for n in 0..=9u8 {
            deck.push(Card::new(color, Face::Number(n)));
            if n != 0 {
                deck.push(Card::new(color, Face::Number(n)));
            }
        }
        for action in [Face::Skip, Face::Reverse, Face::DrawTwo] {
            deck.push(Card::new(color, action));
            deck.push(Card::new(color, action));
        }
    }

    for _ in 0..4 {
        deck.push(Card::new(CardColor::Wild, Face::Wild));
        deck.push(Card::new(CardColor::Wild, Face::WildDrawFour));
    }

    deck
}

/// Matching rule, honouring a declared wild color on the top card
pub fn can_play(card: &Card, top: &Card, wild_color: Option<CardColor>) -> bool {
    if card.is_wild() {
        return true;
    }

    if let (true, Some(declared)) = (top.is_wild(), wild_color) {
        return card.color == declared || card.value == top.value;
    }

    card.color == top.color || card.value == top.value
}

/// Replicated card-game record at `games/uno/<matchId>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardsState {
    pub players: Vec<Participant>,
    pub current_player: usize,
    pub direction: Direction,
    pub top_card: Option<Card>,
    pub deck: Vec<Card>,
    pub player_hands: HashMap<ParticipantId, Vec<Card>>,
    pub game_over: bool,
    pub winner: Option<Winner>,
    pub wild_color: Option<CardColor>,
    pub status: MatchStatus,
}

/// Outcome of a play request
#[derive(Debug, Clone, PartialEq)]
pub enum PlayDecision {
    /// Ready to write
    Write(Patch),
    /// Wild card: nothing is written until a color is chosen
    ChooseColor(PendingWild),
}

/// Wild card held back while its player picks a color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWild {
    pub hand_index: usize,
    pub card: Card,
}

impl CardsState {
    /// Shuffle, deal and turn up the first plain number card
    pub fn deal(players: Vec<Participant>, rng: &mut impl Rng) -> Result<Self, ActionError> {
        if !(2..=MAX_PLAYERS).contains(&players.len()) {
            return Err(ActionError::WrongParticipantCount {
                needed: "2 to 10",
                got: players.len(),
            });
        }

        let mut deck = new_deck();
        deck.shuffle(rng);

        let mut player_hands = HashMap::with_capacity(players.len());
        for player in &players {
            player_hands.insert(player.id, deck.drain(..HAND_SIZE).collect());
        }

        // Wild and action cards in front of the first number card go to the bottom
        let first_plain = deck
            .iter()
            .position(|c| !c.is_wild() && !c.value.is_action())
            .unwrap_or(0);
        deck.rotate_left(first_plain);
        let top_card = if deck.is_empty() {
            None
        } else {
            Some(deck.remove(0))
        };

        let players = players
            .into_iter()
            .enumerate()
            .map(|(number, p)| Participant { number, ..p })
            .collect();

        Ok(Self {
            players,
            current_player: 0,
            direction: Direction::Forward,
            top_card,
            deck,
            player_hands,
            game_over: false,
            winner: None,
            wild_color: None,
            status: MatchStatus::Playing,
        })
    }

    pub fn hand(&self, participant: ParticipantId) -> &[Card] {
        self.player_hands
            .get(&participant)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Cards in pile, hands and on top
    #[cfg(test)]
    pub fn card_total(&self) -> usize {
        self.deck.len()
            + self.player_hands.values().map(Vec::len).sum::<usize>()
            + usize::from(self.top_card.is_some())
    }

    fn ring(&self) -> Result<TurnRing, ActionError> {
        TurnRing::new(self.players.len(), self.current_player, self.direction)
            .ok_or(ActionError::NotPlaying)
    }

    fn check_turn(&self, auth: &TurnAuthority) -> Result<(), ActionError> {
        require_playing(self.status)?;
        if self.game_over {
            return Err(ActionError::NotPlaying);
        }
        auth.still_current(self.current_player)
    }

    /// Play the card at `hand_index` from the acting participant's hand
    pub fn play_card(
        &self,
        auth: &TurnAuthority,
        hand_index: usize,
    ) -> Result<PlayDecision, ActionError> {
        self.check_turn(auth)?;

        let card = *self
            .hand(auth.participant())
            .get(hand_index)
            .ok_or(ActionError::NoSuchCard(hand_index))?;

        if let Some(top) = &self.top_card {
            if !can_play(&card, top, self.wild_color) {
                return Err(ActionError::CardMismatch);
            }
        }

        if card.is_wild() {
            return Ok(PlayDecision::ChooseColor(PendingWild { hand_index, card }));
        }

        self.resolve(auth, hand_index, card, None).map(PlayDecision::Write)
    }

    /// Finish a pending wild play with the declared color
    pub fn choose_wild_color(
        &self,
        auth: &TurnAuthority,
        pending: PendingWild,
        color: CardColor,
    ) -> Result<Patch, ActionError> {
        self.check_turn(auth)?;

        if !color.is_suit() {
            return Err(ActionError::InvalidColor);
        }

        let card = *self
            .hand(auth.participant())
            .get(pending.hand_index)
            .ok_or(ActionError::NoSuchCard(pending.hand_index))?;
        if card != pending.card || !card.is_wild() {
            return Err(ActionError::NotAWildCard);
        }

        self.resolve(auth, pending.hand_index, card, Some(color))
    }

    /// Take one card from the pile and pass the turn
    pub fn draw_card(&self, auth: &TurnAuthority) -> Result<Patch, ActionError> {
        self.check_turn(auth)?;

        let mut deck = self.deck.clone();
        if deck.is_empty() {
            return Err(ActionError::EmptyDrawPile);
        }
        let drawn = deck.remove(0);

        let actor = auth.participant();
        let mut hand = self.hand(actor).to_vec();
        hand.push(drawn);

        let next = self.ring()?.peek(1);

        let mut patch = Patch::new();
        patch.put("deck", &deck)?;
        patch.put(format!("playerHands/{actor}"), &hand)?;
        patch.put("currentPlayer", &next)?;
        Ok(patch)
    }

    fn resolve(
        &self,
        auth: &TurnAuthority,
        hand_index: usize,
        card: Card,
        wild_color: Option<CardColor>,
    ) -> Result<Patch, ActionError> {
        let actor = auth.participant();
        let mut hand = self.hand(actor).to_vec();
        hand.remove(hand_index);
        let mut deck = self.deck.clone();
        let mut ring = self.ring()?;

        let mut patch = Patch::new();
        patch.put("topCard", &card)?;
        patch.put("wildColor", &wild_color)?;
        patch.put(format!("playerHands/{actor}"), &hand)?;

        if hand.is_empty() {
            patch.put("deck", &deck)?;
            patch.put("gameOver", &true)?;
            patch.put("status", &MatchStatus::GameOver)?;
            patch.put("winner", &Winner::Participant(actor))?;
            return Ok(patch);
        }

        let next = match card.value {
            Face::Skip => ring.peek(2),
            Face::Reverse => {
                ring.reverse();
                patch.put("direction", &ring.direction())?;
                ring.peek(1)
            }
            Face::DrawTwo | Face::WildDrawFour => {
                let victim = self.players[ring.peek(1)].id;
                let mut victim_hand = self.hand(victim).to_vec();
                let count = card.value.penalty().min(deck.len());
                victim_hand.extend(deck.drain(..count));
                patch.put(format!("playerHands/{victim}"), &victim_hand)?;
                // The victim loses the turn as well
                ring.peek(2)
            }
            Face::Number(_) | Face::Wild => ring.peek(1),
        };

        patch.put("deck", &deck)?;
        patch.put("currentPlayer", &next)?;
        Ok(patch)
    }
}

impl MatchRecord for CardsState {
    const KIND: GameKind = GameKind::Cards;

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

    /// Fewer cards left = better placement
    fn rating_change(&self, participant: ParticipantId) -> Option<i32> {
        if !self.is_over() {
            return None;
        }
        let mut order: Vec<&Participant> = self.players.iter().collect();
        order.sort_by_key(|p| self.hand(p.id).len());
        let position = order.iter().position(|p| p.id == participant)? + 1;
        Some(rating::placement_change(position, order.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn red(n: u8) -> Card {
        Card::new(CardColor::Red, Face::Number(n))
    }

    fn blue(n: u8) -> Card {
        Card::new(CardColor::Blue, Face::Number(n))
    }

    fn seats(n: usize) -> Vec<Participant> {
        (0..n)
            .map(|i| Participant::new(Uuid::new_v4(), format!("p{i}"), i))
            .collect()
    }

    /// Table where every player holds `hand`, red 5 on top, 20 blue cards in the pile
    fn table(n: usize, hand: Vec<Card>) -> CardsState {
        let players = seats(n);
        let player_hands = players.iter().map(|p| (p.id, hand.clone())).collect();
        CardsState {
            players,
            top_card: Some(red(5)),
            deck: (0..20).map(|i| blue(i % 10)).collect(),
            player_hands,
            status: MatchStatus::Playing,
            ..Default::default()
        }
    }

    fn turn(state: &CardsState) -> TurnAuthority {
        let id = state.players[state.current_player].id;
        TurnAuthority::claim(&state.players, state.current_player, id).unwrap()
    }

    fn apply(state: &CardsState, patch: &Patch) -> CardsState {
        let mut value = serde_json::to_value(state).unwrap();
        patch.apply_to(&mut value).unwrap();
        serde_json::from_value(value).unwrap()
    }

    fn play(state: &CardsState, index: usize) -> CardsState {
        match state.play_card(&turn(state), index).unwrap() {
            PlayDecision::Write(patch) => apply(state, &patch),
            PlayDecision::ChooseColor(_) => panic!("unexpected color prompt"),
        }
    }

    fn play_wild(state: &CardsState, index: usize, color: CardColor) -> CardsState {
        let auth = turn(state);
        let PlayDecision::ChooseColor(pending) = state.play_card(&auth, index).unwrap() else {
            panic!("wild card should prompt for a color");
        };
        apply(state, &state.choose_wild_color(&auth, pending, color).unwrap())
    }

    #[test]
    fn deck_has_108_cards() {
        let deck = new_deck();
        assert_eq!(deck.len(), 108);
        assert_eq!(deck.iter().filter(|c| c.is_wild()).count(), 8);
        assert_eq!(
            deck.iter()
                .filter(|c| c.color == CardColor::Green)
                .count(),
            25
        );
    }

    #[test]
    fn deal_conserves_cards_and_turns_up_a_number() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let state = CardsState::deal(seats(4), &mut rng).unwrap();

        assert_eq!(state.card_total(), 108);
        assert!(state.players.iter().all(|p| state.hand(p.id).len() == HAND_SIZE));
        let top = state.top_card.unwrap();
        assert!(matches!(top.value, Face::Number(_)) && !top.is_wild());
        assert_eq!(state.status, MatchStatus::Playing);
        assert_eq!(state.players[3].number, 3);
    }

    #[test]
    fn deal_rejects_a_lone_player() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(CardsState::deal(seats(1), &mut rng).is_err());
    }

    #[test]
    fn number_cards_advance_one_seat_in_direction() {
        for n in 2..=5 {
            for direction in [Direction::Forward, Direction::Backward] {
                let mut state = table(n, vec![red(1); 8]);
                state.direction = direction;
                state.current_player = 1 % n;
                let initial = state.current_player as i64;

                for played in 1..=6i64 {
                    state = play(&state, 0);
                    let expected =
                        (initial + played * direction.step()).rem_euclid(n as i64) as usize;
                    assert_eq!(state.current_player, expected);
                }
            }
        }
    }

    #[test]
    fn skip_advances_two_seats() {
        for n in 2..=5 {
            let state = table(n, vec![Card::new(CardColor::Red, Face::Skip), red(2)]);
            let next = play(&state, 0);
            assert_eq!(next.current_player, 2 % n);
        }
    }

    #[test]
    fn reverse_flips_direction_and_moves_the_other_way() {
        let state = table(4, vec![Card::new(CardColor::Red, Face::Reverse), red(2)]);
        let next = play(&state, 0);
        assert_eq!(next.direction, Direction::Backward);
        assert_eq!(next.current_player, 3);
    }

    #[test]
    fn draw_two_feeds_and_skips_the_next_player() {
        for n in 2..=5 {
            let state = table(n, vec![Card::new(CardColor::Red, Face::DrawTwo), red(2)]);
            let victim = state.players[1].id;
            let before = state.hand(victim).len();

            let next = play(&state, 0);
            assert_eq!(next.hand(victim).len(), before + 2);
            assert_eq!(next.deck.len(), state.deck.len() - 2);
            assert_eq!(next.current_player, 2 % n);
            assert_eq!(next.card_total(), state.card_total());
        }
    }

    #[test]
    fn two_player_draw_two_returns_the_turn() {
        let state = table(2, vec![Card::new(CardColor::Red, Face::DrawTwo), red(3), red(4)]);
        let opponent = state.players[1].id;

        let next = play(&state, 0);
        assert_eq!(next.hand(opponent).len(), 5);
        assert_eq!(next.current_player, 0);
        assert!(!next.game_over);
    }

    #[test]
    fn wild_defers_the_write_until_a_color_is_chosen() {
        let state = table(3, vec![Card::new(CardColor::Wild, Face::Wild), red(2)]);
        let auth = turn(&state);
        let decision = state.play_card(&auth, 0).unwrap();
        let PlayDecision::ChooseColor(pending) = decision else {
            panic!("expected color prompt");
        };
        assert_eq!(pending.hand_index, 0);

        assert!(matches!(
            state.choose_wild_color(&auth, pending, CardColor::Wild),
            Err(ActionError::InvalidColor)
        ));

        let next = play_wild(&state, 0, CardColor::Green);
        assert_eq!(next.wild_color, Some(CardColor::Green));
        assert_eq!(next.current_player, 1);

        // Declared color now governs matching
        assert!(can_play(&Card::new(CardColor::Green, Face::Number(3)), &next.top_card.unwrap(), next.wild_color));
        assert!(!can_play(&red(3), &next.top_card.unwrap(), next.wild_color));
    }

    #[test]
    fn wild_draw_four_feeds_and_skips() {
        let state = table(3, vec![Card::new(CardColor::Wild, Face::WildDrawFour), red(2)]);
        let victim = state.players[1].id;
        let next = play_wild(&state, 0, CardColor::Blue);
        assert_eq!(next.hand(victim).len(), 6);
        assert_eq!(next.current_player, 2);
    }

    #[test]
    fn plain_card_clears_wild_color() {
        let mut state = table(2, vec![blue(4), blue(5)]);
        state.top_card = Some(Card::new(CardColor::Wild, Face::Wild));
        state.wild_color = Some(CardColor::Blue);
        let next = play(&state, 0);
        assert_eq!(next.wild_color, None);
    }

    #[test]
    fn emptying_the_hand_wins_for_every_card_type() {
        let finishers = [
            red(5),
            Card::new(CardColor::Red, Face::Skip),
            Card::new(CardColor::Red, Face::Reverse),
            Card::new(CardColor::Red, Face::DrawTwo),
            Card::new(CardColor::Wild, Face::Wild),
            Card::new(CardColor::Wild, Face::WildDrawFour),
        ];

        for card in finishers {
            let state = table(3, vec![card]);
            let actor = state.players[0].id;
            let next = if card.is_wild() {
                play_wild(&state, 0, CardColor::Red)
            } else {
                play(&state, 0)
            };
            assert!(next.game_over, "{card:?} should end the match");
            assert_eq!(next.status, MatchStatus::GameOver);
            assert_eq!(next.winner, Some(Winner::Participant(actor)));
        }
    }

    #[test]
    fn non_final_plays_never_end_the_match() {
        let state = table(3, vec![red(5), red(6)]);
        let next = play(&state, 0);
        assert!(!next.game_over);
        assert_eq!(next.winner, None);
    }

    #[test]
    fn invalid_plays_are_rejected_without_a_write() {
        let state = table(2, vec![blue(3)]);
        let auth = turn(&state);
        assert!(matches!(state.play_card(&auth, 0), Err(ActionError::CardMismatch)));
        assert!(matches!(state.play_card(&auth, 4), Err(ActionError::NoSuchCard(4))));

        let other = state.players[1].id;
        assert!(TurnAuthority::claim(&state.players, state.current_player, other).is_err());

        let mut finished = state.clone();
        finished.game_over = true;
        assert!(matches!(finished.draw_card(&auth), Err(ActionError::NotPlaying)));
    }

    #[test]
    fn drawing_passes_the_turn() {
        let state = table(3, vec![blue(3)]);
        let actor = state.players[0].id;
        let next = apply(&state, &state.draw_card(&turn(&state)).unwrap());
        assert_eq!(next.hand(actor).len(), 2);
        assert_eq!(next.deck.len(), 19);
        assert_eq!(next.current_player, 1);
        assert_eq!(next.card_total(), state.card_total());

        let mut empty = state.clone();
        empty.deck.clear();
        assert!(matches!(empty.draw_card(&turn(&empty)), Err(ActionError::EmptyDrawPile)));
    }

    #[test]
    fn placements_rank_by_cards_left() {
        let mut state = table(3, vec![red(1)]);
        let ids: Vec<_> = state.players.iter().map(|p| p.id).collect();
        state.player_hands.insert(ids[0], vec![]);
        state.player_hands.insert(ids[2], vec![red(1), red(2), red(3)]);
        assert_eq!(state.rating_change(ids[0]), None);

        state.game_over = true;
        assert_eq!(state.rating_change(ids[0]), Some(20));
        assert_eq!(state.rating_change(ids[1]), Some(-13));
        assert_eq!(state.rating_change(ids[2]), Some(-7));
    }

    #[test]
    fn wire_format_matches_portal_spelling() {
        let card = Card::new(CardColor::Yellow, Face::Reverse);
        let json = serde_json::to_value(card).unwrap();
        assert_eq!(json, serde_json::json!({ "color": "Yellow", "value": "Rev" }));
        let parsed: Card =
            serde_json::from_value(serde_json::json!({ "color": "Wild", "value": "+4" })).unwrap();
        assert_eq!(parsed.value, Face::WildDrawFour);
    }
}
