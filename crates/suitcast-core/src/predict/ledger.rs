use crate::learner::LAG;
use crate::model::card::Card;
use crate::model::suit::Suit;
use crate::rules::Tier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Identifier the messaging platform assigned to a published prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PredictionStatus {
    Pending,
    Won { offset: u8 },
    Lost,
}

impl PredictionStatus {
    pub const fn is_pending(self) -> bool {
        matches!(self, PredictionStatus::Pending)
    }

    /// Status marker shown in the published message.
    pub const fn marker(self) -> &'static str {
        match self {
            PredictionStatus::Pending => "⏳",
            PredictionStatus::Won { offset: 0 } => "✅0️⃣",
            PredictionStatus::Won { offset: 1 } => "✅1️⃣",
            PredictionStatus::Won { offset: 2 } => "✅2️⃣",
            PredictionStatus::Won { .. } => "✅",
            PredictionStatus::Lost => "❌",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won { offset: u8 },
    Lost,
}

impl From<Outcome> for PredictionStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Won { offset } => PredictionStatus::Won { offset },
            Outcome::Lost => PredictionStatus::Lost,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub target_game: u64,
    pub source_game: u64,
    pub trigger: Card,
    pub predicted_suit: Suit,
    pub tier: Tier,
    pub status: PredictionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub external_id: Option<MessageId>,
    #[serde(default)]
    pub resolved_by: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("game {target} already has a prediction")]
    AlreadyPredicted { target: u64 },
    #[error("game {target} is not past the last predicted game {last}")]
    Stale { target: u64, last: u64 },
    #[error("game {target} is not two games after source {source_game}")]
    SourceMismatch { target: u64, source_game: u64 },
    #[error("no prediction for game {target}")]
    Unknown { target: u64 },
    #[error("prediction for game {target} already resolved")]
    AlreadyResolved { target: u64, status: PredictionStatus },
}

/// Predictions keyed by the game they target.
#[derive(Debug, Clone, Default)]
pub struct PredictionLedger {
    entries: BTreeMap<u64, Prediction>,
    last_predicted_game: u64,
}

impl PredictionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        target_game: u64,
        source_game: u64,
        trigger: Card,
        predicted_suit: Suit,
        tier: Tier,
        now: DateTime<Utc>,
    ) -> Result<&Prediction, LedgerError> {
        if source_game.checked_add(LAG) != Some(target_game) {
            return Err(LedgerError::SourceMismatch {
                target: target_game,
                source_game,
            });
        }
        if self.entries.contains_key(&target_game) {
            return Err(LedgerError::AlreadyPredicted {
                target: target_game,
            });
        }
        if target_game <= self.last_predicted_game {
            return Err(LedgerError::Stale {
                target: target_game,
                last: self.last_predicted_game,
            });
        }

        self.last_predicted_game = target_game;
        let prediction = Prediction {
            target_game,
            source_game,
            trigger,
            predicted_suit,
            tier,
            status: PredictionStatus::Pending,
            created_at: now,
            external_id: None,
            resolved_by: None,
        };
        Ok(self.entries.entry(target_game).or_insert(prediction))
    }

    pub fn attach_external_id(&mut self, target_game: u64, id: MessageId) -> Result<(), LedgerError> {
        let prediction = self
            .entries
            .get_mut(&target_game)
            .ok_or(LedgerError::Unknown {
                target: target_game,
            })?;
        prediction.external_id = Some(id);
        Ok(())
    }

    /// Moves a pending prediction to its terminal state. Resolving twice is
    /// refused and leaves the first verdict in place.
    pub fn resolve(
        &mut self,
        target_game: u64,
        outcome: Outcome,
        resolved_by: u64,
    ) -> Result<&Prediction, LedgerError> {
        let prediction = self
            .entries
            .get_mut(&target_game)
            .ok_or(LedgerError::Unknown {
                target: target_game,
            })?;
        if !prediction.status.is_pending() {
            return Err(LedgerError::AlreadyResolved {
                target: target_game,
                status: prediction.status,
            });
        }
        prediction.status = outcome.into();
        prediction.resolved_by = Some(resolved_by);
        Ok(prediction)
    }

    pub fn get(&self, target_game: u64) -> Option<&Prediction> {
        self.entries.get(&target_game)
    }

    pub fn contains(&self, target_game: u64) -> bool {
        self.entries.contains_key(&target_game)
    }

    /// Pending predictions in ascending target order.
    pub fn pending(&self) -> impl Iterator<Item = &Prediction> + '_ {
        self.entries.values().filter(|p| p.status.is_pending())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Prediction> + '_ {
        self.entries.values()
    }

    pub fn last_predicted_game(&self) -> u64 {
        self.last_predicted_game
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_predicted_game = 0;
    }

    pub(crate) fn restore(
        &mut self,
        predictions: impl IntoIterator<Item = Prediction>,
        last_predicted_game: u64,
    ) {
        for prediction in predictions {
            self.entries.entry(prediction.target_game).or_insert(prediction);
        }
        let newest = self.entries.keys().next_back().copied().unwrap_or(0);
        self.last_predicted_game = last_predicted_game.max(newest);
    }
}
