//! Three-tier rule repository.
//!
//! Lookups walk the tiers in priority order (manual, learned, static) and the
//! first tier holding a rule for the trigger card answers. Rules from
//! different tiers are never blended.

mod manual;
pub mod table;

pub use manual::{MANUAL_BATCH_LEN, MANUAL_PER_SUIT, ManualRule, ManualTier, MergeReport, RuleError};
pub use table::{STATIC_RULES, static_suit_for};

use crate::learner::LearnedTable;
use crate::model::card::Card;
use crate::model::suit::Suit;
use core::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Manual,
    Learned,
    Static,
}

impl Tier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Tier::Manual => "MANUAL",
            Tier::Learned => "LEARNED",
            Tier::Static => "STATIC",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub trigger: Card,
    pub predict_suit: Suit,
    pub weight: u32,
    pub tier: Tier,
}

impl Rule {
    pub const fn new(trigger: Card, predict_suit: Suit, weight: u32, tier: Tier) -> Self {
        Self {
            trigger,
            predict_suit,
            weight,
            tier,
        }
    }
}

/// One link of the lookup chain.
pub trait RuleTier {
    fn tier(&self) -> Tier;

    fn find(&self, trigger: Card) -> Option<Rule>;

    fn consulted(&self, _inter_active: bool) -> bool {
        true
    }
}

/// Heaviest rule for `trigger`; the earliest rule wins ties.
fn strongest(rules: &[Rule], trigger: Card) -> Option<Rule> {
    rules
        .iter()
        .filter(|rule| rule.trigger == trigger)
        .fold(None, |best: Option<&Rule>, rule| match best {
            Some(current) if current.weight >= rule.weight => Some(current),
            _ => Some(rule),
        })
        .copied()
}

#[derive(Debug, Clone, Default)]
pub struct LearnedTier {
    rules: Vec<Rule>,
}

impl LearnedTier {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    fn replace(&mut self, table: &LearnedTable) {
        self.rules = table
            .iter()
            .map(|(suit, entry)| Rule::new(entry.trigger, suit, entry.count.max(1), Tier::Learned))
            .collect();
    }

    fn reinforce(&mut self, trigger: Card, suit: Suit) -> Option<u32> {
        let rule = self
            .rules
            .iter_mut()
            .find(|rule| rule.trigger == trigger && rule.predict_suit == suit)?;
        rule.weight = rule.weight.saturating_add(1);
        Some(rule.weight)
    }
}

impl RuleTier for LearnedTier {
    fn tier(&self) -> Tier {
        Tier::Learned
    }

    fn find(&self, trigger: Card) -> Option<Rule> {
        strongest(&self.rules, trigger)
    }

    fn consulted(&self, inter_active: bool) -> bool {
        inter_active
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticTier;

impl RuleTier for StaticTier {
    fn tier(&self) -> Tier {
        Tier::Static
    }

    fn find(&self, trigger: Card) -> Option<Rule> {
        static_suit_for(trigger).map(|suit| Rule::new(trigger, suit, 1, Tier::Static))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleRepository {
    manual: ManualTier,
    learned: LearnedTier,
    fixed: StaticTier,
}

impl RuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn chain(&self) -> [&dyn RuleTier; 3] {
        [&self.manual, &self.learned, &self.fixed]
    }

    pub fn resolve(&self, trigger: Card, inter_active: bool) -> Option<Rule> {
        self.chain()
            .into_iter()
            .filter(|tier| tier.consulted(inter_active))
            .find_map(|tier| tier.find(trigger))
    }

    pub fn merge_manual(&mut self, batch: &[ManualRule]) -> Result<MergeReport, RuleError> {
        self.manual.merge(batch)
    }

    /// Swaps in a freshly mined learned tier and returns its size.
    pub fn replace_learned(&mut self, table: &LearnedTable) -> usize {
        self.learned.replace(table);
        self.learned.rules.len()
    }

    pub fn reinforce(&mut self, trigger: Card, suit: Suit) -> Option<u32> {
        self.learned.reinforce(trigger, suit)
    }

    pub fn manual_covers(&self, trigger: Card, suit: Suit) -> bool {
        self.manual.covers(trigger, suit)
    }

    pub fn manual_rules(&self) -> &[Rule] {
        self.manual.rules()
    }

    pub fn learned_rules(&self) -> &[Rule] {
        self.learned.rules()
    }

    pub fn static_rules(&self) -> impl Iterator<Item = Rule> + '_ {
        STATIC_RULES
            .iter()
            .map(|(trigger, suit)| Rule::new(*trigger, *suit, 1, self.fixed.tier()))
    }

    pub fn has_adaptive_rules(&self) -> bool {
        !self.manual.rules().is_empty() || !self.learned.rules().is_empty()
    }

    pub(crate) fn restore(&mut self, manual: Vec<Rule>, learned: Vec<Rule>) {
        self.manual.restore(manual);
        self.learned.rules = learned
            .into_iter()
            .filter(|rule| rule.weight > 0)
            .map(|rule| Rule {
                tier: Tier::Learned,
                ..rule
            })
            .collect();
    }
}
