use super::ledger::PredictionLedger;
use crate::learner::LAG;
use crate::model::card::Card;
use crate::model::event::GameEvent;
use crate::model::suit::Suit;
use crate::rules::{RuleRepository, Tier};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Persisted throttle state of the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerState {
    pub last_prediction_at: Option<DateTime<Utc>>,
    pub last_source_game: Option<u64>,
}

/// A prediction the scheduler is willing to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionPlan {
    pub source_game: u64,
    pub target_game: u64,
    pub trigger: Card,
    pub suit: Suit,
    pub tier: Tier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoGameNumber,
    NoTrigger,
    AlreadyPredicted { target: u64 },
    Spacing { last_source: u64, min_spacing: u64 },
    Cooldown { remaining_secs: i64 },
    NoRule { trigger: Card },
}

#[derive(Debug, Clone)]
pub struct PredictionScheduler {
    min_spacing: u64,
    cooldown: TimeDelta,
    state: SchedulerState,
}

impl PredictionScheduler {
    pub fn new(min_spacing: u64, cooldown_secs: u64) -> Self {
        let cooldown_secs = i64::try_from(cooldown_secs).unwrap_or(i64::MAX);
        Self {
            min_spacing,
            cooldown: TimeDelta::try_seconds(cooldown_secs).unwrap_or(TimeDelta::MAX),
            state: SchedulerState::default(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Decides whether `event` should produce a prediction two games ahead.
    /// Nothing is mutated; see [`PredictionScheduler::commit`].
    pub fn evaluate(
        &self,
        event: &GameEvent,
        now: DateTime<Utc>,
        ledger: &PredictionLedger,
        rules: &RuleRepository,
        inter_active: bool,
    ) -> Result<PredictionPlan, SkipReason> {
        let source_game = event.game_number.ok_or(SkipReason::NoGameNumber)?;
        let trigger = event.trigger_card().ok_or(SkipReason::NoTrigger)?;
        let target_game = source_game.saturating_add(LAG);
        if ledger.contains(target_game) {
            return Err(SkipReason::AlreadyPredicted {
                target: target_game,
            });
        }

        if let Some(last_source) = self.state.last_source_game {
            if source_game < last_source.saturating_add(self.min_spacing) {
                return Err(SkipReason::Spacing {
                    last_source,
                    min_spacing: self.min_spacing,
                });
            }
        }

        if let Some(last_at) = self.state.last_prediction_at {
            let elapsed = now.signed_duration_since(last_at);
            if elapsed < self.cooldown {
                return Err(SkipReason::Cooldown {
                    remaining_secs: (self.cooldown - elapsed).num_seconds(),
                });
            }
        }

        let rule = rules
            .resolve(trigger, inter_active)
            .ok_or(SkipReason::NoRule { trigger })?;
        Ok(PredictionPlan {
            source_game,
            target_game,
            trigger,
            suit: rule.predict_suit,
            tier: rule.tier,
        })
    }

    /// Records a plan the ledger accepted.
    pub fn commit(&mut self, plan: &PredictionPlan, now: DateTime<Utc>) {
        self.state = SchedulerState {
            last_prediction_at: Some(now),
            last_source_game: Some(plan.source_game),
        };
    }

    pub fn reset(&mut self) {
        self.state = SchedulerState::default();
    }

    pub(crate) fn restore(&mut self, state: SchedulerState) {
        self.state = state;
    }
}
