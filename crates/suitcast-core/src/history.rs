use crate::model::card::Card;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub game_number: u64,
    pub trigger: Card,
}

/// Bounded store of the first card seen for each recent game.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: BTreeMap<u64, Card>,
    window: usize,
}

impl HistoryBuffer {
    pub fn new(window: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            window: window.max(1),
        }
    }

    /// Returns `false` when the game was already recorded; the first
    /// observation of a game number is kept.
    pub fn record(&mut self, game_number: u64, trigger: Card) -> bool {
        if self.entries.contains_key(&game_number) {
            return false;
        }
        self.entries.insert(game_number, trigger);
        self.evict();
        true
    }

    pub fn lookup(&self, game_number: u64) -> Option<Card> {
        self.entries.get(&game_number).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> impl Iterator<Item = HistoryEntry> + '_ {
        self.entries
            .iter()
            .map(|(&game_number, &trigger)| HistoryEntry {
                game_number,
                trigger,
            })
    }

    pub fn restore(&mut self, entries: impl IntoIterator<Item = HistoryEntry>) {
        for entry in entries {
            self.entries.entry(entry.game_number).or_insert(entry.trigger);
        }
        self.evict();
    }

    fn evict(&mut self) {
        let Some(&newest) = self.entries.keys().next_back() else {
            return;
        };
        let floor = newest.saturating_sub(self.window as u64);
        self.entries.retain(|&game, _| game >= floor);
        while self.entries.len() > self.window {
            self.entries.pop_first();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HistoryBuffer;
    use crate::model::card::Card;

    fn card(text: &str) -> Card {
        text.parse().unwrap()
    }

    #[test]
    fn record_is_idempotent_per_game() {
        let mut history = HistoryBuffer::new(30);
        assert!(history.record(10, card("10♦")));
        assert!(!history.record(10, card("K♣")));
        assert_eq!(history.lookup(10), Some(card("10♦")));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn evicts_games_older_than_window() {
        let mut history = HistoryBuffer::new(5);
        history.record(1, card("2♠"));
        history.record(4, card("3♠"));
        history.record(7, card("4♠"));
        assert_eq!(history.lookup(1), None);
        assert_eq!(history.lookup(4), Some(card("3♠")));
        assert_eq!(history.lookup(7), Some(card("4♠")));
    }

    #[test]
    fn never_exceeds_window_entries() {
        let mut history = HistoryBuffer::new(3);
        for game in 1..=10 {
            history.record(game, card("5♥"));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.lookup(7), None);
        assert_eq!(history.lookup(8), Some(card("5♥")));
    }

    #[test]
    fn late_arrival_does_not_evict_newer_games() {
        let mut history = HistoryBuffer::new(10);
        history.record(50, card("9♣"));
        history.record(45, card("9♦"));
        assert_eq!(history.lookup(50), Some(card("9♣")));
        assert_eq!(history.lookup(45), Some(card("9♦")));
    }
}
