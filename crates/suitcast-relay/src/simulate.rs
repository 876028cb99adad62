//! Seeded synthetic source feed.
//!
//! Each game deals from a freshly shuffled deck: two cards per side, a third
//! when the side totals five or less. Some games are first posted while
//! still being dealt and then edited into their final form.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use suitcast_core::{Card, Deck, Rank};

use crate::feed::FeedRecord;

const DRAW_LIMIT: u8 = 5;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub chat_id: i64,
    pub first_game: u64,
    pub games: usize,
    pub seed: u64,
    pub start_at: DateTime<Utc>,
    pub interval_secs: i64,
    /// Chance that a game is first posted with a pending marker.
    pub provisional_ratio: f64,
}

impl SimulationConfig {
    pub fn new(chat_id: i64, games: usize, seed: u64, start_at: DateTime<Utc>) -> Self {
        Self {
            chat_id,
            first_game: 1,
            games,
            seed,
            start_at,
            interval_secs: 60,
            provisional_ratio: 0.2,
        }
    }
}

/// Scoring value of a card: aces count one, tens and faces count zero.
pub fn point_value(card: Card) -> u8 {
    match card.rank {
        Rank::Ace => 1,
        Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 0,
        other => other.value(),
    }
}

pub fn hand_score(cards: &[Card]) -> u8 {
    cards.iter().map(|card| point_value(*card)).sum::<u8>() % 10
}

fn render(cards: &[Card]) -> String {
    cards.iter().map(Card::to_string).collect()
}

struct Deal {
    player: Vec<Card>,
    banker: Vec<Card>,
}

impl Deal {
    fn from_deck(deck: &mut Deck) -> Self {
        let mut player = deck.draw(2);
        if hand_score(&player) <= DRAW_LIMIT {
            player.extend(deck.draw(1));
        }
        let mut banker = deck.draw(2);
        if hand_score(&banker) <= DRAW_LIMIT {
            banker.extend(deck.draw(1));
        }
        Self { player, banker }
    }

    fn final_text(&self, game: u64) -> String {
        format!(
            "#N{game}. ✅{}({}) - {}({})",
            hand_score(&self.player),
            render(&self.player),
            hand_score(&self.banker),
            render(&self.banker)
        )
    }

    fn provisional_text(&self, game: u64) -> String {
        format!(
            "#N{game}. ⏰({}) - ({})",
            render(&self.player[..2]),
            render(&self.banker[..2])
        )
    }
}

/// Builds the feed; the same config always yields the same records.
pub fn generate(config: &SimulationConfig) -> Vec<FeedRecord> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let ratio = config.provisional_ratio.clamp(0.0, 1.0);
    let mut records = Vec::with_capacity(config.games + config.games / 4);

    for index in 0..config.games {
        let game = config.first_game + index as u64;
        let posted_at = config.start_at + Duration::seconds(config.interval_secs * index as i64);
        let mut deck = Deck::shuffled(&mut rng);
        let deal = Deal::from_deck(&mut deck);

        if rng.gen_bool(ratio) {
            records.push(FeedRecord {
                chat_id: config.chat_id,
                text: deal.provisional_text(game),
                edited: false,
                at: posted_at,
            });
            records.push(FeedRecord {
                chat_id: config.chat_id,
                text: deal.final_text(game),
                edited: true,
                at: posted_at + Duration::seconds(config.interval_secs / 2),
            });
        } else {
            records.push(FeedRecord {
                chat_id: config.chat_id,
                text: deal.final_text(game),
                edited: false,
                at: posted_at,
            });
        }
    }
    records
}
