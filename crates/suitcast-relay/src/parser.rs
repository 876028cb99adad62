//! Raw channel posts to [`GameEvent`]s.
//!
//! A post looks like `#N142. ✅3(10♦️5♠️8♣️) - 7(K♥️7♦️)`. The game number
//! comes from `#N`, `#T`, `#R` or a `🔵n🔵` marker; the first parenthesized
//! group holds the cards the engine reads.

use once_cell::sync::Lazy;
use regex::Regex;
use suitcast_core::{Card, Delivery, GameEvent};

/// Markers the feed uses while a game is still being dealt.
pub const PENDING_INDICATORS: [&str; 4] = ["⏰", "▶", "🕐", "➡️"];

/// Markers the feed adds once a game's result is settled.
pub const COMPLETION_INDICATORS: [&str; 2] = ["✅", "🔰"];

const FINAL_CARD_COUNT: usize = 3;

static GAME_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"#[NTR](\d+)|🔵(\d+)🔵").expect("game number pattern is valid")
});

static FIRST_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^)]*)\)").expect("group pattern is valid"));

static CARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(10|[2-9]|[AKQJ])\s*(♠|♣|♦|♥|❤)\x{FE0F}?").expect("card pattern is valid")
});

pub fn game_number(text: &str) -> Option<u64> {
    let captures = GAME_NUMBER.captures(text)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

fn cards_in(text: &str) -> impl Iterator<Item = Card> + '_ {
    CARD.captures_iter(text).filter_map(|captures| {
        let rank = captures.get(1)?.as_str();
        let suit = captures.get(2)?.as_str();
        format!("{rank}{suit}").parse().ok()
    })
}

/// Cards of the first parenthesized group, in order.
pub fn first_group_cards(text: &str) -> Vec<Card> {
    FIRST_GROUP
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|group| cards_in(group.as_str()).collect())
        .unwrap_or_default()
}

pub fn has_pending_indicator(text: &str) -> bool {
    PENDING_INDICATORS
        .iter()
        .any(|indicator| text.contains(indicator))
}

pub fn has_completion_indicator(text: &str) -> bool {
    COMPLETION_INDICATORS
        .iter()
        .any(|indicator| text.contains(indicator))
}

/// A post is final once it carries a completion marker, shows three cards
/// overall and nothing marks it as still in progress.
pub fn is_final(text: &str) -> bool {
    has_completion_indicator(text)
        && !has_pending_indicator(text)
        && cards_in(text).take(FINAL_CARD_COUNT).count() >= FINAL_CARD_COUNT
}

pub fn parse_message(text: &str, delivery: Delivery) -> GameEvent {
    GameEvent {
        game_number: game_number(text),
        cards: first_group_cards(text),
        is_final_result: is_final(text),
        delivery,
    }
}
