//! The prediction engine: one state machine driven by game events.
//!
//! Every event runs the same pass: the daily reset check, history and
//! correlation bookkeeping, scheduling of a prediction two games ahead,
//! verification of pending predictions, and the periodic learning pass.
//! Side effects toward the messaging transport are returned as
//! [`Outbound`] values instead of being performed here.

use crate::config::EngineConfig;
use crate::history::HistoryBuffer;
use crate::learner::{CorrelationLearner, CorrelationSample};
use crate::mode::{ModeController, ModeState, ModeTransition, ModeTrigger, Regime};
use crate::model::event::GameEvent;
use crate::notify::{AdminNotice, EditRequest, Outbound, PublishRequest};
use crate::predict::{
    LedgerError, MessageId, Prediction, PredictionLedger, PredictionScheduler,
    PredictionStatus, SkipReason,
};
use crate::reset::{ResetCoordinator, ResetError};
use crate::rules::{ManualRule, MergeReport, Rule, RuleError, RuleRepository};
use crate::verify::{Feedback, Verification, VerificationPolicy, apply_feedback};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{Level, event};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid reset schedule")]
    Reset(#[from] ResetError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningCause {
    Periodic,
    Operator,
    StaticFailures,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LearningReport {
    pub cause: LearningCause,
    pub samples: usize,
    pub learned_rules: usize,
    /// False when there were no samples and the previous learned tier stayed.
    pub replaced: bool,
    pub transition: Option<ModeTransition>,
}

/// Everything one event changed.
#[derive(Debug, Clone, Default)]
pub struct EventReport {
    pub game_number: Option<u64>,
    pub reset: Option<NaiveDate>,
    pub duplicate: bool,
    pub recorded: bool,
    pub sample: Option<CorrelationSample>,
    pub prediction: Option<Prediction>,
    pub skipped: Option<SkipReason>,
    pub verification: Option<Verification>,
    pub feedback: Option<Feedback>,
    pub learning: Option<LearningReport>,
    pub outbound: Vec<Outbound>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerCounts {
    pub total: usize,
    pub pending: usize,
    pub won: usize,
    pub lost: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub regime: Regime,
    pub mode: ModeState,
    pub last_reset_date: Option<NaiveDate>,
    pub manual_rules: Vec<Rule>,
    pub learned_rules: Vec<Rule>,
    pub static_rules: usize,
    pub ledger: LedgerCounts,
    pub last_predicted_game: u64,
    pub history_len: usize,
    pub samples: usize,
}

#[derive(Debug)]
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) history: HistoryBuffer,
    pub(crate) learner: CorrelationLearner,
    pub(crate) rules: RuleRepository,
    pub(crate) scheduler: PredictionScheduler,
    pub(crate) ledger: PredictionLedger,
    pub(crate) mode: ModeController,
    pub(crate) reset: ResetCoordinator,
    pub(crate) processed: BTreeSet<u64>,
    verifier: VerificationPolicy,
    learning_interval: TimeDelta,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let reset = ResetCoordinator::new(config.reset)?;
        let interval_secs = i64::try_from(config.learning_interval_secs).unwrap_or(i64::MAX);
        Ok(Self {
            history: HistoryBuffer::new(config.history_window),
            learner: CorrelationLearner::new(config.history_window),
            rules: RuleRepository::new(),
            scheduler: PredictionScheduler::new(config.min_spacing, config.cooldown_secs),
            ledger: PredictionLedger::new(),
            mode: ModeController::new(config.static_failure_threshold),
            reset,
            processed: BTreeSet::new(),
            verifier: config.verification(),
            learning_interval: TimeDelta::try_seconds(interval_secs).unwrap_or(TimeDelta::MAX),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PredictionLedger {
        &self.ledger
    }

    pub fn rules(&self) -> &RuleRepository {
        &self.rules
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn learner(&self) -> &CorrelationLearner {
        &self.learner
    }

    pub fn mode(&self) -> &ModeController {
        &self.mode
    }

    pub fn inter_active(&self) -> bool {
        self.mode.inter_active()
    }

    pub fn process(&mut self, event: &GameEvent, now: DateTime<Utc>) -> EventReport {
        let mut report = EventReport {
            game_number: event.game_number,
            ..EventReport::default()
        };

        if let Some(date) = self.reset.due(now) {
            if self.reset.state().last_reset_date.is_none() {
                // First day seen: adopt it without clearing anything.
                self.reset.mark(date);
            } else {
                let notice = self.daily_reset(date);
                report.reset = Some(date);
                report.outbound.push(Outbound::Admin(notice));
            }
        }

        let (Some(game), Some(trigger)) = (event.game_number, event.trigger_card()) else {
            event!(
                target: "suitcast_core::predict",
                Level::TRACE,
                game = ?event.game_number,
                "ignoring event without game number or cards"
            );
            return report;
        };

        if event.is_fresh() && !self.mark_processed(game) {
            report.duplicate = true;
            return report;
        }

        report.recorded = self.history.record(game, trigger);
        report.sample = self.learner.observe(&self.history, event);
        if let Some(sample) = report.sample {
            event!(
                target: "suitcast_core::learn",
                Level::DEBUG,
                game = sample.game_number,
                trigger = %sample.trigger,
                result = %sample.result_suit,
                "sample collected"
            );
        }

        if event.is_fresh() {
            self.schedule(event, now, &mut report);
        }

        if let Some(verification) = self.verifier.try_resolve(&mut self.ledger, event) {
            self.settle(verification, now, &mut report);
        }

        if self.mode.inter_active() && self.mode.learning_due(now, self.learning_interval) {
            let learning = self.learning_pass(now, LearningCause::Periodic);
            record_learning(learning, &mut report);
        }

        report
    }

    fn schedule(&mut self, event: &GameEvent, now: DateTime<Utc>, report: &mut EventReport) {
        let inter_active = self.mode.inter_active();
        let plan = match self
            .scheduler
            .evaluate(event, now, &self.ledger, &self.rules, inter_active)
        {
            Ok(plan) => plan,
            Err(reason) => {
                event!(
                    target: "suitcast_core::predict",
                    Level::DEBUG,
                    game = ?event.game_number,
                    reason = ?reason,
                    "prediction skipped"
                );
                report.skipped = Some(reason);
                return;
            }
        };

        let created = self.ledger.create(
            plan.target_game,
            plan.source_game,
            plan.trigger,
            plan.suit,
            plan.tier,
            now,
        );
        match created {
            Ok(prediction) => {
                let prediction = prediction.clone();
                self.scheduler.commit(&plan, now);
                self.mode.clear_static_failures();
                event!(
                    target: "suitcast_core::predict",
                    Level::INFO,
                    source_game = plan.source_game,
                    target_game = plan.target_game,
                    trigger = %plan.trigger,
                    suit = %plan.suit,
                    tier = %plan.tier,
                    "prediction created"
                );
                report
                    .outbound
                    .push(Outbound::Publish(PublishRequest::for_prediction(&prediction)));
                report.prediction = Some(prediction);
            }
            Err(err) => {
                event!(
                    target: "suitcast_core::predict",
                    Level::WARN,
                    target_game = plan.target_game,
                    error = %err,
                    "ledger refused prediction"
                );
            }
        }
    }

    fn settle(&mut self, verification: Verification, now: DateTime<Utc>, report: &mut EventReport) {
        let status = PredictionStatus::from(verification.outcome);
        report.outbound.push(Outbound::Edit {
            request: EditRequest::for_status(
                verification.target_game,
                verification.predicted_suit,
                status,
            ),
            message: verification.external_id,
        });

        let feedback = apply_feedback(&verification, &mut self.mode, &mut self.rules);
        match feedback {
            Feedback::InterLoss {
                transition: Some(transition),
            } => {
                report.outbound.push(Outbound::Admin(AdminNotice::RegimeChanged {
                    transition,
                }));
            }
            Feedback::StaticStreakExhausted => {
                event!(
                    target: "suitcast_core::mode",
                    Level::WARN,
                    streak = self.mode.static_failures(),
                    "static rules keep failing, forcing a learning pass"
                );
                let learning = self.learning_pass(now, LearningCause::StaticFailures);
                self.mode.clear_static_failures();
                record_learning(learning, report);
            }
            Feedback::Won { .. }
            | Feedback::InterLoss { transition: None }
            | Feedback::StaticLoss { .. } => {}
        }
        report.feedback = Some(feedback);
        report.verification = Some(verification);
    }

    /// Rebuilds the learned tier from the collected samples.
    fn learning_pass(&mut self, now: DateTime<Utc>, cause: LearningCause) -> LearningReport {
        let rules = &self.rules;
        let table = self
            .learner
            .rebuild(self.config.learned_per_suit, |trigger, suit| {
                rules.manual_covers(trigger, suit)
            });
        self.mode.note_learning_pass(now);

        let replaced = !table.is_empty();
        let learned_rules = if replaced {
            self.rules.replace_learned(&table)
        } else {
            self.rules.learned_rules().len()
        };

        let transition = match cause {
            LearningCause::StaticFailures => self.mode.activate(ModeTrigger::StaticFailures),
            LearningCause::Periodic | LearningCause::Operator if self.rules.has_adaptive_rules() => {
                self.mode.activate(ModeTrigger::RulesAvailable)
            }
            LearningCause::Periodic | LearningCause::Operator => None,
        };

        event!(
            target: "suitcast_core::learn",
            Level::INFO,
            cause = ?cause,
            samples = self.learner.len(),
            learned_rules,
            replaced,
            "learning pass finished"
        );
        LearningReport {
            cause,
            samples: self.learner.len(),
            learned_rules,
            replaced,
            transition,
        }
    }

    fn mark_processed(&mut self, game: u64) -> bool {
        if !self.processed.insert(game) {
            return false;
        }
        prune_window(&mut self.processed, self.config.history_window);
        true
    }

    /// Clears transient state for a new local day. Rules are kept.
    pub fn daily_reset(&mut self, date: NaiveDate) -> AdminNotice {
        let cleared_predictions = self.ledger.len();
        self.ledger.clear();
        self.history.clear();
        self.learner.clear();
        self.processed.clear();
        self.scheduler.reset();
        self.mode.clear_static_failures();
        self.reset.mark(date);
        event!(
            target: "suitcast_core::reset",
            Level::INFO,
            %date,
            cleared_predictions,
            "daily reset"
        );
        AdminNotice::DailyReset {
            date,
            cleared_predictions,
        }
    }

    pub fn activate_inter(&mut self) -> Option<ModeTransition> {
        self.mode.activate(ModeTrigger::Operator)
    }

    pub fn deactivate_inter(&mut self) -> Option<ModeTransition> {
        self.mode.deactivate(ModeTrigger::Operator)
    }

    pub fn toggle_inter(&mut self) -> ModeTransition {
        self.mode.toggle()
    }

    pub fn force_learning(&mut self, now: DateTime<Utc>) -> LearningReport {
        self.learning_pass(now, LearningCause::Operator)
    }

    /// Merges an operator batch, then switches to INTER with a clean streak.
    pub fn submit_manual_rules(&mut self, batch: &[ManualRule]) -> Result<MergeReport, RuleError> {
        let report = self.rules.merge_manual(batch)?;
        self.mode.activate(ModeTrigger::Operator);
        self.mode.clear_static_failures();
        event!(
            target: "suitcast_core::mode",
            Level::INFO,
            merged = report.merged,
            added = report.added,
            replaced = report.replaced,
            discarded = report.discarded,
            "manual rules merged"
        );
        Ok(report)
    }

    /// Drops every prediction and the throttle state. History and
    /// learning are untouched.
    pub fn reset_predictions(&mut self) -> usize {
        let cleared = self.ledger.len();
        self.ledger.clear();
        self.scheduler.reset();
        self.mode.clear_static_failures();
        event!(
            target: "suitcast_core::reset",
            Level::INFO,
            cleared,
            "prediction stock reset"
        );
        cleared
    }

    pub fn attach_external_id(&mut self, target_game: u64, id: MessageId) -> Result<(), LedgerError> {
        self.ledger.attach_external_id(target_game, id)
    }

    pub fn status(&self) -> EngineStatus {
        let mut ledger = LedgerCounts::default();
        for prediction in self.ledger.iter() {
            ledger.total += 1;
            match prediction.status {
                PredictionStatus::Pending => ledger.pending += 1,
                PredictionStatus::Won { .. } => ledger.won += 1,
                PredictionStatus::Lost => ledger.lost += 1,
            }
        }
        EngineStatus {
            regime: self.mode.regime(),
            mode: self.mode.state(),
            last_reset_date: self.reset.state().last_reset_date,
            manual_rules: self.rules.manual_rules().to_vec(),
            learned_rules: self.rules.learned_rules().to_vec(),
            static_rules: self.rules.static_rules().count(),
            ledger,
            last_predicted_game: self.ledger.last_predicted_game(),
            history_len: self.history.len(),
            samples: self.learner.len(),
        }
    }

    /// Turns INTER on when adaptive rules exist, as at startup.
    pub(crate) fn activate_if_rules_available(&mut self) -> Option<ModeTransition> {
        if self.rules.has_adaptive_rules() {
            self.mode.activate(ModeTrigger::RulesAvailable)
        } else {
            None
        }
    }
}

fn record_learning(learning: LearningReport, report: &mut EventReport) {
    if let Some(transition) = learning.transition {
        report
            .outbound
            .push(Outbound::Admin(AdminNotice::RegimeChanged { transition }));
    }
    report.outbound.push(Outbound::Admin(AdminNotice::LearningPass {
        samples: learning.samples,
        learned_rules: learning.learned_rules,
    }));
    report.learning = Some(learning);
}

pub(crate) fn prune_window(games: &mut BTreeSet<u64>, window: usize) {
    let Some(&newest) = games.last() else {
        return;
    };
    let floor = newest.saturating_sub(window as u64);
    games.retain(|&game| game >= floor);
}
