use super::{Rule, RuleTier, Tier, strongest};
use crate::model::card::Card;
use crate::model::suit::Suit;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Size of an operator batch: two rules for each of the four suits.
pub const MANUAL_BATCH_LEN: usize = 8;
pub const MANUAL_PER_SUIT: usize = 2;

/// Operator-supplied rule as it appears in a submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualRule {
    pub trigger: Card,
    pub suit: Suit,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

impl ManualRule {
    pub const fn new(trigger: Card, suit: Suit, weight: u32) -> Self {
        Self {
            trigger,
            suit,
            weight,
        }
    }

    fn to_rule(self) -> Rule {
        Rule::new(self.trigger, self.suit, self.weight, Tier::Manual)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("manual batch must hold exactly 8 rules, got {found}")]
    BatchSize { found: usize },
    #[error("manual batch must hold 2 rules for {suit}, got {found}")]
    SuitQuota { suit: Suit, found: usize },
    #[error("manual batch repeats {trigger} -> {suit}")]
    DuplicatePair { trigger: Card, suit: Suit },
    #[error("manual rule {trigger} -> {suit} has zero weight")]
    ZeroWeight { trigger: Card, suit: Suit },
}

/// Outcome counts of a manual merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub merged: usize,
    pub added: usize,
    pub replaced: usize,
    pub discarded: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ManualTier {
    rules: Vec<Rule>,
}

impl ManualTier {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn covers(&self, trigger: Card, suit: Suit) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.trigger == trigger && rule.predict_suit == suit)
    }

    pub(crate) fn restore(&mut self, rules: impl IntoIterator<Item = Rule>) {
        self.rules.clear();
        for rule in rules {
            if rule.weight == 0 || self.covers(rule.trigger, rule.predict_suit) {
                continue;
            }
            self.rules.push(Rule {
                tier: Tier::Manual,
                ..rule
            });
        }
    }

    /// Folds a validated batch into the tier, keeping at most two rules per
    /// suit. A full rule slot is only taken over by a strictly heavier rule.
    pub fn merge(&mut self, batch: &[ManualRule]) -> Result<MergeReport, RuleError> {
        validate_batch(batch)?;

        let mut report = MergeReport::default();
        for incoming in batch.iter().copied() {
            if let Some(existing) = self
                .rules
                .iter_mut()
                .find(|rule| rule.trigger == incoming.trigger && rule.predict_suit == incoming.suit)
            {
                existing.weight = existing.weight.saturating_add(incoming.weight);
                report.merged += 1;
                continue;
            }

            let held = self
                .rules
                .iter()
                .filter(|rule| rule.predict_suit == incoming.suit)
                .count();
            if held < MANUAL_PER_SUIT {
                self.rules.push(incoming.to_rule());
                report.added += 1;
                continue;
            }

            let weakest = self
                .rules
                .iter()
                .enumerate()
                .filter(|(_, rule)| rule.predict_suit == incoming.suit)
                .min_by_key(|(_, rule)| rule.weight)
                .map(|(index, rule)| (index, rule.weight));
            match weakest {
                Some((index, weight)) if incoming.weight > weight => {
                    self.rules[index] = incoming.to_rule();
                    report.replaced += 1;
                }
                _ => report.discarded += 1,
            }
        }
        Ok(report)
    }
}

impl RuleTier for ManualTier {
    fn tier(&self) -> Tier {
        Tier::Manual
    }

    fn find(&self, trigger: Card) -> Option<Rule> {
        strongest(&self.rules, trigger)
    }
}

fn validate_batch(batch: &[ManualRule]) -> Result<(), RuleError> {
    if batch.len() != MANUAL_BATCH_LEN {
        return Err(RuleError::BatchSize { found: batch.len() });
    }

    for suit in Suit::ALL {
        let found = batch.iter().filter(|rule| rule.suit == suit).count();
        if found != MANUAL_PER_SUIT {
            return Err(RuleError::SuitQuota { suit, found });
        }
    }

    let mut seen = HashSet::new();
    for rule in batch {
        if rule.weight == 0 {
            return Err(RuleError::ZeroWeight {
                trigger: rule.trigger,
                suit: rule.suit,
            });
        }
        if !seen.insert((rule.trigger, rule.suit)) {
            return Err(RuleError::DuplicatePair {
                trigger: rule.trigger,
                suit: rule.suit,
            });
        }
    }
    Ok(())
}
