use crate::model::card::Card;
use crate::model::rank::Rank;
use crate::model::suit::Suit;

/// Fallback trigger → suit table used when no adaptive rule applies.
pub const STATIC_RULES: [(Card, Suit); 13] = [
    (Card::new(Rank::Ten, Suit::Diamonds), Suit::Spades),
    (Card::new(Rank::Ten, Suit::Spades), Suit::Hearts),
    (Card::new(Rank::Nine, Suit::Clubs), Suit::Hearts),
    (Card::new(Rank::Nine, Suit::Diamonds), Suit::Spades),
    (Card::new(Rank::Eight, Suit::Clubs), Suit::Spades),
    (Card::new(Rank::Eight, Suit::Spades), Suit::Clubs),
    (Card::new(Rank::Seven, Suit::Spades), Suit::Spades),
    (Card::new(Rank::Seven, Suit::Clubs), Suit::Clubs),
    (Card::new(Rank::Six, Suit::Diamonds), Suit::Clubs),
    (Card::new(Rank::Six, Suit::Clubs), Suit::Diamonds),
    (Card::new(Rank::Ace, Suit::Hearts), Suit::Hearts),
    (Card::new(Rank::Five, Suit::Hearts), Suit::Hearts),
    (Card::new(Rank::Five, Suit::Spades), Suit::Spades),
];

pub fn static_suit_for(trigger: Card) -> Option<Suit> {
    STATIC_RULES
        .iter()
        .find(|(card, _)| *card == trigger)
        .map(|(_, suit)| *suit)
}

#[cfg(test)]
mod tests {
    use super::{STATIC_RULES, static_suit_for};
    use crate::model::suit::Suit;
    use std::collections::HashSet;

    #[test]
    fn triggers_are_unique() {
        let triggers: HashSet<_> = STATIC_RULES.iter().map(|(card, _)| *card).collect();
        assert_eq!(triggers.len(), STATIC_RULES.len());
    }

    #[test]
    fn lookup_matches_table() {
        assert_eq!(static_suit_for("10♦".parse().unwrap()), Some(Suit::Spades));
        assert_eq!(static_suit_for("6♣".parse().unwrap()), Some(Suit::Diamonds));
        assert_eq!(static_suit_for("K♠".parse().unwrap()), None);
    }
}
