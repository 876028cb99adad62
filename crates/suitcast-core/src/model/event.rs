use crate::model::card::Card;
use crate::model::suit::Suit;
use serde::{Deserialize, Serialize};

/// Number of leading cards inspected when checking a result for a suit.
pub const RESULT_INSPECT_CARDS: usize = 3;

/// How the source feed delivered a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    #[default]
    Fresh,
    /// A provisional post the feed later finalized in place.
    Edited,
}

/// Normalized game result as produced by the message parser.
///
/// `cards` holds the first card group only, in the order it was dealt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    pub game_number: Option<u64>,
    pub cards: Vec<Card>,
    pub is_final_result: bool,
    #[serde(default)]
    pub delivery: Delivery,
}

impl GameEvent {
    /// Fresh event; treated as final once three or more cards are known.
    pub fn new(game_number: u64, cards: Vec<Card>) -> Self {
        let is_final_result = cards.len() >= RESULT_INSPECT_CARDS;
        Self {
            game_number: Some(game_number),
            cards,
            is_final_result,
            delivery: Delivery::Fresh,
        }
    }

    pub fn edited(mut self) -> Self {
        self.delivery = Delivery::Edited;
        self
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self.delivery, Delivery::Fresh)
    }

    pub fn trigger_card(&self) -> Option<Card> {
        self.cards.first().copied()
    }

    pub fn result_suit(&self) -> Option<Suit> {
        self.trigger_card().map(|card| card.suit)
    }

    /// Whether `suit` shows among the leading cards of the first group.
    pub fn shows_suit(&self, suit: Suit) -> bool {
        self.cards
            .iter()
            .take(RESULT_INSPECT_CARDS)
            .any(|card| card.suit == suit)
    }
}
