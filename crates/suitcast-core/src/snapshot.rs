use crate::config::EngineConfig;
use crate::engine::{Engine, EngineError, prune_window};
use crate::history::HistoryEntry;
use crate::learner::CorrelationSample;
use crate::mode::ModeState;
use crate::predict::{Prediction, SchedulerState};
use crate::reset::ResetState;
use crate::rules::Rule;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Durable image of an [`Engine`]. Collections are keyed the same way the
/// engine keys them: history and samples by game number, predictions by
/// target game, rules by (tier, trigger, suit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version: u32,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub samples: Vec<CorrelationSample>,
    #[serde(default)]
    pub collected_games: Vec<u64>,
    #[serde(default)]
    pub processed_games: Vec<u64>,
    #[serde(default)]
    pub manual_rules: Vec<Rule>,
    #[serde(default)]
    pub learned_rules: Vec<Rule>,
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    #[serde(default)]
    pub last_predicted_game: u64,
    #[serde(default)]
    pub scheduler: SchedulerState,
    /// Absent in snapshots that predate mode persistence.
    #[serde(default)]
    pub mode: Option<ModeState>,
    #[serde(default)]
    pub reset: ResetState,
}

impl EngineSnapshot {
    pub fn capture(engine: &Engine) -> Self {
        EngineSnapshot {
            version: SNAPSHOT_VERSION,
            history: engine.history.entries().collect(),
            samples: engine.learner.samples().to_vec(),
            collected_games: engine.learner.collected_games().collect(),
            processed_games: engine.processed.iter().copied().collect(),
            manual_rules: engine.rules.manual_rules().to_vec(),
            learned_rules: engine.rules.learned_rules().to_vec(),
            predictions: engine.ledger.iter().cloned().collect(),
            last_predicted_game: engine.ledger.last_predicted_game(),
            scheduler: engine.scheduler.state(),
            mode: Some(engine.mode.state()),
            reset: engine.reset.state(),
        }
    }

    /// Rebuilds an engine from this snapshot. A persisted mode is taken as
    /// is, so an operator's INTER deactivation survives restarts. Without
    /// one, INTER is switched on when manual or learned rules exist.
    pub fn restore(self, config: EngineConfig) -> Result<Engine, EngineError> {
        let mut engine = Engine::new(config)?;
        engine.history.restore(self.history);
        engine.learner.restore(self.samples, self.collected_games);
        engine.processed.extend(self.processed_games);
        prune_window(&mut engine.processed, engine.config.history_window);
        engine.rules.restore(self.manual_rules, self.learned_rules);
        engine
            .ledger
            .restore(self.predictions, self.last_predicted_game);
        engine.scheduler.restore(self.scheduler);
        engine.reset.restore(self.reset);
        match self.mode {
            Some(mode) => engine.mode.restore(mode),
            None => {
                engine.activate_if_rules_available();
            }
        }
        Ok(engine)
    }

    pub fn to_json(engine: &Engine) -> serde_json::Result<String> {
        let snapshot = Self::capture(engine);
        serde_json::to_string_pretty(&snapshot)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot i/o failed")]
    Io(#[from] std::io::Error),
    #[error("snapshot is not valid json")]
    Json(#[from] serde_json::Error),
    #[error("snapshot version {found} is newer than supported {supported}")]
    Version { found: u32, supported: u32 },
}

/// Persistence collaborator for engine snapshots.
pub trait SnapshotStore {
    fn load(&self) -> Result<Option<EngineSnapshot>, StoreError>;

    fn save(&self, snapshot: &EngineSnapshot) -> Result<(), StoreError>;
}

/// Keeps the latest snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<EngineSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<EngineSnapshot> {
        self.slot.lock().clone()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<EngineSnapshot>, StoreError> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, snapshot: &EngineSnapshot) -> Result<(), StoreError> {
        *self.slot.lock() = Some(snapshot.clone());
        Ok(())
    }
}

/// Rejects snapshots written by a newer format.
pub fn check_version(snapshot: &EngineSnapshot) -> Result<(), StoreError> {
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(StoreError::Version {
            found: snapshot.version,
            supported: SNAPSHOT_VERSION,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::card::Card;
    use crate::model::event::GameEvent;
    use crate::model::suit::Suit;
    use crate::rules::ManualRule;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap() + TimeDelta::seconds(secs)
    }

    fn event(game: u64, cards: &[&str]) -> GameEvent {
        GameEvent::new(game, cards.iter().map(|c| c.parse::<Card>().unwrap()).collect())
    }

    fn card(text: &str) -> Card {
        text.parse().unwrap()
    }

    fn manual_batch() -> Vec<ManualRule> {
        vec![
            ManualRule::new(card("K♣"), Suit::Hearts, 2),
            ManualRule::new(card("K♦"), Suit::Hearts, 1),
            ManualRule::new(card("K♠"), Suit::Spades, 1),
            ManualRule::new(card("Q♠"), Suit::Spades, 1),
            ManualRule::new(card("Q♦"), Suit::Diamonds, 1),
            ManualRule::new(card("J♦"), Suit::Diamonds, 1),
            ManualRule::new(card("Q♣"), Suit::Clubs, 1),
            ManualRule::new(card("J♣"), Suit::Clubs, 1),
        ]
    }

    fn busy_engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.process(&event(10, &["10♦", "2♣", "3♣"]), at(0));
        engine.process(&event(12, &["5♥", "3♣", "4♣"]), at(60));
        engine
    }

    #[test]
    fn snapshot_round_trip_preserves_state() {
        let engine = busy_engine();
        let json = EngineSnapshot::to_json(&engine).unwrap();
        assert!(json.contains("\"version\": 1"));

        let restored = EngineSnapshot::from_json(&json)
            .unwrap()
            .restore(EngineConfig::default())
            .unwrap();
        assert_eq!(EngineSnapshot::capture(&restored), EngineSnapshot::capture(&engine));
    }

    #[test]
    fn restore_keeps_operator_deactivation() {
        let mut engine = busy_engine();
        engine.submit_manual_rules(&manual_batch()).unwrap();
        engine.deactivate_inter();
        let restored = EngineSnapshot::capture(&engine)
            .restore(EngineConfig::default())
            .unwrap();
        assert!(!restored.inter_active());
        assert_eq!(restored.rules().manual_rules().len(), 8);
    }

    #[test]
    fn restore_without_mode_turns_on_inter_when_rules_exist() {
        let mut engine = busy_engine();
        engine.submit_manual_rules(&manual_batch()).unwrap();
        let mut snapshot = EngineSnapshot::capture(&engine);
        snapshot.mode = None;
        let restored = snapshot.restore(EngineConfig::default()).unwrap();
        assert!(restored.inter_active());
    }

    #[test]
    fn sparse_json_restores_defaults() {
        let snapshot = EngineSnapshot::from_json(r#"{"version": 1}"#).unwrap();
        let engine = snapshot.restore(EngineConfig::default()).unwrap();
        assert!(engine.ledger().is_empty());
        assert!(!engine.inter_active());
    }

    #[test]
    fn memory_store_keeps_latest() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());
        let snapshot = EngineSnapshot::capture(&busy_engine());
        store.save(&snapshot).unwrap();
        assert_eq!(store.latest(), Some(snapshot));
    }

    #[test]
    fn newer_versions_are_rejected() {
        let mut snapshot = EngineSnapshot::capture(&busy_engine());
        snapshot.version = SNAPSHOT_VERSION + 1;
        assert!(matches!(
            check_version(&snapshot),
            Err(StoreError::Version { .. })
        ));
    }
}
