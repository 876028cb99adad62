use crate::model::rank::Rank;
use crate::model::suit::Suit;
use core::fmt;
use core::str::FromStr;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCardError {
    #[error("empty card text")]
    Empty,
    #[error("unknown suit in card '{0}'")]
    Suit(String),
    #[error("unknown rank in card '{0}'")]
    Rank(String),
}

impl FromStr for Card {
    type Err = ParseCardError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().trim_end_matches('\u{fe0f}');
        let suit_char = trimmed.chars().last().ok_or(ParseCardError::Empty)?;
        let split = trimmed.len() - suit_char.len_utf8();
        let (rank_text, suit_text) = trimmed.split_at(split);
        let suit =
            Suit::from_symbol(suit_text).ok_or_else(|| ParseCardError::Suit(value.to_string()))?;
        let rank =
            Rank::from_symbol(rank_text).ok_or_else(|| ParseCardError::Rank(value.to_string()))?;
        Ok(Card::new(rank, suit))
    }
}

impl Serialize for Card {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::{Card, ParseCardError, Rank, Suit};

    #[test]
    fn parses_plain_and_emoji_forms() {
        assert_eq!("10♦".parse::<Card>(), Ok(Card::new(Rank::Ten, Suit::Diamonds)));
        assert_eq!("10♦️".parse::<Card>(), Ok(Card::new(Rank::Ten, Suit::Diamonds)));
        assert_eq!("A❤️".parse::<Card>(), Ok(Card::new(Rank::Ace, Suit::Hearts)));
        assert_eq!("K♣".parse::<Card>(), Ok(Card::new(Rank::King, Suit::Clubs)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!("".parse::<Card>(), Err(ParseCardError::Empty));
        assert!(matches!("1♠".parse::<Card>(), Err(ParseCardError::Rank(_))));
        assert!(matches!("Qx".parse::<Card>(), Err(ParseCardError::Suit(_))));
    }

    #[test]
    fn display_uses_rank_then_suit() {
        assert_eq!(Card::new(Rank::Nine, Suit::Clubs).to_string(), "9♣");
    }

    #[test]
    fn serde_uses_text_form() {
        let card = Card::new(Rank::Five, Suit::Spades);
        let json = serde_json::to_string(&card).unwrap();
        assert_eq!(json, "\"5♠\"");
        assert_eq!(serde_json::from_str::<Card>(&json).unwrap(), card);
    }
}
