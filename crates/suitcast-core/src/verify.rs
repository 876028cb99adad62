//! Offset-tolerant verification of pending predictions.
//!
//! A prediction for game T is checked against every later event G with
//! `0 <= G - T <= lookahead`. The predicted suit must show among the leading
//! cards of the event within `win_window` games of the target.

use crate::mode::{ModeController, ModeTransition, ModeTrigger};
use crate::model::card::Card;
use crate::model::event::GameEvent;
use crate::model::suit::Suit;
use crate::predict::{MessageId, Outcome, Prediction, PredictionLedger};
use crate::rules::{RuleRepository, Tier};
use serde::{Deserialize, Serialize};
use tracing::{Level, event};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationPolicy {
    pub lookahead: u64,
    pub win_window: u64,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            lookahead: 5,
            win_window: 2,
        }
    }
}

impl VerificationPolicy {
    /// Verdict for `prediction` given the event for game `game`, or `None`
    /// while the prediction stays pending.
    pub fn judge(&self, prediction: &Prediction, event: &GameEvent, game: u64) -> Option<Outcome> {
        let offset = game.checked_sub(prediction.target_game)?;
        if offset > self.lookahead {
            return None;
        }
        let found = event.shows_suit(prediction.predicted_suit);
        if found && offset <= self.win_window {
            let offset = u8::try_from(offset).unwrap_or(u8::MAX);
            return Some(Outcome::Won { offset });
        }
        if offset > self.win_window
            || (!found && (offset >= self.win_window || event.is_final_result))
        {
            return Some(Outcome::Lost);
        }
        None
    }

    /// Resolves the first pending prediction, in ascending target order,
    /// that reaches a verdict on `event`. At most one prediction changes.
    pub fn try_resolve(
        &self,
        ledger: &mut PredictionLedger,
        event: &GameEvent,
    ) -> Option<Verification> {
        let game = event.game_number?;
        let (target, outcome) = ledger
            .pending()
            .find_map(|p| self.judge(p, event, game).map(|o| (p.target_game, o)))?;

        match ledger.resolve(target, outcome, game) {
            Ok(prediction) => {
                let verification = Verification::from_resolved(prediction, outcome);
                event!(
                    target: "suitcast_core::verify",
                    Level::INFO,
                    target_game = verification.target_game,
                    resolved_by = game,
                    tier = %verification.tier,
                    outcome = ?outcome,
                    "prediction resolved"
                );
                Some(verification)
            }
            Err(err) => {
                event!(
                    target: "suitcast_core::verify",
                    Level::WARN,
                    target_game = target,
                    error = %err,
                    "resolution refused"
                );
                None
            }
        }
    }
}

/// A prediction that just reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub target_game: u64,
    pub source_game: u64,
    pub trigger: Card,
    pub predicted_suit: Suit,
    pub tier: Tier,
    pub outcome: Outcome,
    pub resolved_by: u64,
    pub external_id: Option<MessageId>,
}

impl Verification {
    fn from_resolved(prediction: &Prediction, outcome: Outcome) -> Self {
        Self {
            target_game: prediction.target_game,
            source_game: prediction.source_game,
            trigger: prediction.trigger,
            predicted_suit: prediction.predicted_suit,
            tier: prediction.tier,
            outcome,
            resolved_by: prediction.resolved_by.unwrap_or(prediction.target_game),
            external_id: prediction.external_id,
        }
    }
}

/// Effect a verdict had on mode and rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Won { reinforced: Option<u32> },
    InterLoss { transition: Option<ModeTransition> },
    StaticLoss { streak: u32 },
    /// The static streak hit its threshold; a learning pass is owed.
    StaticStreakExhausted,
}

pub fn apply_feedback(
    verification: &Verification,
    mode: &mut ModeController,
    rules: &mut RuleRepository,
) -> Feedback {
    match (verification.outcome, verification.tier) {
        (Outcome::Won { .. }, _) => {
            mode.clear_static_failures();
            let reinforced = rules.reinforce(verification.trigger, verification.predicted_suit);
            Feedback::Won { reinforced }
        }
        (Outcome::Lost, Tier::Manual | Tier::Learned) => Feedback::InterLoss {
            transition: mode.deactivate(ModeTrigger::InterLoss),
        },
        (Outcome::Lost, Tier::Static) => {
            if mode.record_static_failure() {
                Feedback::StaticStreakExhausted
            } else {
                Feedback::StaticLoss {
                    streak: mode.static_failures(),
                }
            }
        }
    }
}
