use crate::history::HistoryBuffer;
use crate::model::card::Card;
use crate::model::event::GameEvent;
use crate::model::suit::Suit;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Distance between a trigger game and the game whose suit it predicts.
pub const LAG: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationSample {
    pub game_number: u64,
    pub trigger: Card,
    pub result_suit: Suit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TriggerCount {
    pub trigger: Card,
    pub count: u32,
}

/// Top triggers per result suit, strongest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LearnedTable {
    by_suit: BTreeMap<Suit, Vec<TriggerCount>>,
}

impl LearnedTable {
    pub fn push(&mut self, suit: Suit, entry: TriggerCount) {
        self.by_suit.entry(suit).or_default().push(entry);
    }

    pub fn get(&self, suit: Suit) -> &[TriggerCount] {
        self.by_suit.get(&suit).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Suit, &TriggerCount)> + '_ {
        self.by_suit
            .iter()
            .flat_map(|(suit, entries)| entries.iter().map(move |entry| (*suit, entry)))
    }

    pub fn len(&self) -> usize {
        self.by_suit.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Accumulates lag-2 (trigger, result suit) samples over a bounded window of
/// game numbers.
#[derive(Debug, Clone)]
pub struct CorrelationLearner {
    samples: Vec<CorrelationSample>,
    collected: BTreeSet<u64>,
    window: usize,
}

impl CorrelationLearner {
    pub fn new(window: usize) -> Self {
        Self {
            samples: Vec::new(),
            collected: BTreeSet::new(),
            window: window.max(1),
        }
    }

    /// Pairs the event with the trigger recorded two games earlier. Each game
    /// number contributes at most one sample.
    pub fn observe(
        &mut self,
        history: &HistoryBuffer,
        event: &GameEvent,
    ) -> Option<CorrelationSample> {
        let game_number = event.game_number?;
        if self.collected.contains(&game_number) {
            return None;
        }
        let result_suit = event.result_suit()?;
        let trigger = history.lookup(game_number.checked_sub(LAG)?)?;

        let sample = CorrelationSample {
            game_number,
            trigger,
            result_suit,
        };
        self.samples.push(sample);
        self.collected.insert(game_number);
        self.prune();
        Some(sample)
    }

    /// Counts triggers per result suit and keeps the `per_suit` strongest.
    /// Pairs for which `covered` answers true are left out. Ties keep the
    /// trigger that was seen first.
    pub fn rebuild(&self, per_suit: usize, covered: impl Fn(Card, Suit) -> bool) -> LearnedTable {
        let mut counts: BTreeMap<Suit, Vec<TriggerCount>> = BTreeMap::new();
        for sample in &self.samples {
            if covered(sample.trigger, sample.result_suit) {
                continue;
            }
            let slots = counts.entry(sample.result_suit).or_default();
            match slots.iter_mut().find(|slot| slot.trigger == sample.trigger) {
                Some(slot) => slot.count += 1,
                None => slots.push(TriggerCount {
                    trigger: sample.trigger,
                    count: 1,
                }),
            }
        }

        let mut table = LearnedTable::default();
        for (suit, mut slots) in counts {
            slots.sort_by(|a, b| b.count.cmp(&a.count));
            for entry in slots.into_iter().take(per_suit) {
                table.push(suit, entry);
            }
        }
        table
    }

    pub fn samples(&self) -> &[CorrelationSample] {
        &self.samples
    }

    pub fn collected_games(&self) -> impl Iterator<Item = u64> + '_ {
        self.collected.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.collected.clear();
    }

    pub(crate) fn restore(
        &mut self,
        samples: impl IntoIterator<Item = CorrelationSample>,
        collected: impl IntoIterator<Item = u64>,
    ) {
        self.collected.extend(collected);
        for sample in samples {
            if self.samples.iter().any(|s| s.game_number == sample.game_number) {
                continue;
            }
            self.collected.insert(sample.game_number);
            self.samples.push(sample);
        }
        self.prune();
    }

    fn prune(&mut self) {
        let Some(&newest) = self.collected.last() else {
            return;
        };
        let floor = newest.saturating_sub(self.window as u64);
        self.samples.retain(|sample| sample.game_number >= floor);
        self.collected.retain(|&game| game >= floor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(text: &str) -> Card {
        text.parse().unwrap()
    }

    fn event(game: u64, first: &str) -> GameEvent {
        GameEvent::new(game, vec![card(first), card("2♣"), card("3♣")])
    }

    fn learner_with(samples: &[(&str, Suit, usize)]) -> CorrelationLearner {
        let mut learner = CorrelationLearner::new(1_000);
        let mut game = 0;
        for (trigger, suit, times) in samples {
            for _ in 0..*times {
                game += 1;
                learner.samples.push(CorrelationSample {
                    game_number: game,
                    trigger: card(trigger),
                    result_suit: *suit,
                });
                learner.collected.insert(game);
            }
        }
        learner
    }

    #[test]
    fn observe_pairs_with_game_two_back() {
        let mut history = HistoryBuffer::new(30);
        let mut learner = CorrelationLearner::new(30);
        history.record(10, card("10♦"));
        history.record(12, card("5♥"));

        let sample = learner.observe(&history, &event(12, "5♥")).unwrap();
        assert_eq!(sample.trigger, card("10♦"));
        assert_eq!(sample.result_suit, Suit::Hearts);
    }

    #[test]
    fn observe_consumes_each_game_once() {
        let mut history = HistoryBuffer::new(30);
        let mut learner = CorrelationLearner::new(30);
        history.record(10, card("10♦"));
        assert!(learner.observe(&history, &event(12, "5♥")).is_some());
        assert!(learner.observe(&history, &event(12, "5♥").edited()).is_none());
        assert_eq!(learner.len(), 1);
    }

    #[test]
    fn observe_needs_history_and_a_card() {
        let history = HistoryBuffer::new(30);
        let mut learner = CorrelationLearner::new(30);
        assert!(learner.observe(&history, &event(12, "5♥")).is_none());
        assert!(learner.observe(&history, &GameEvent::new(1, Vec::new())).is_none());
        assert!(learner.is_empty());
    }

    #[test]
    fn rebuild_keeps_top_two_per_suit() {
        let learner = learner_with(&[
            ("J♦", Suit::Spades, 5),
            ("Q♦", Suit::Spades, 3),
            ("K♦", Suit::Spades, 1),
        ]);
        let table = learner.rebuild(2, |_, _| false);
        let spades = table.get(Suit::Spades);
        assert_eq!(
            spades,
            &[
                TriggerCount {
                    trigger: card("J♦"),
                    count: 5
                },
                TriggerCount {
                    trigger: card("Q♦"),
                    count: 3
                },
            ]
        );
    }

    #[test]
    fn rebuild_breaks_ties_by_first_seen() {
        let learner = learner_with(&[
            ("9♣", Suit::Hearts, 2),
            ("4♣", Suit::Hearts, 2),
            ("8♣", Suit::Hearts, 2),
        ]);
        let table = learner.rebuild(2, |_, _| false);
        let triggers: Vec<_> = table.get(Suit::Hearts).iter().map(|e| e.trigger).collect();
        assert_eq!(triggers, vec![card("9♣"), card("4♣")]);
    }

    #[test]
    fn rebuild_skips_covered_pairs() {
        let learner = learner_with(&[("J♦", Suit::Spades, 5), ("Q♦", Suit::Spades, 3)]);
        let table = learner.rebuild(2, |trigger, _| trigger == card("J♦"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(Suit::Spades)[0].trigger, card("Q♦"));
    }

    #[test]
    fn rebuild_without_samples_is_empty() {
        let learner = CorrelationLearner::new(30);
        assert!(learner.rebuild(2, |_, _| false).is_empty());
    }

    #[test]
    fn samples_outside_window_are_pruned() {
        let mut history = HistoryBuffer::new(100);
        let mut learner = CorrelationLearner::new(5);
        for game in 1..=20 {
            history.record(game, card("7♠"));
            learner.observe(&history, &event(game, "7♠"));
        }
        assert!(learner.samples().iter().all(|s| s.game_number >= 15));
        assert!(learner.collected_games().all(|g| g >= 15));
    }
}
