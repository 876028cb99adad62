use chrono::{DateTime, TimeDelta, Utc};
use core::fmt;
use serde::{Deserialize, Serialize};
use tracing::{Level, event};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// Manual and learned rules are consulted before the static table.
    Inter,
    Static,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::Inter => f.write_str("INTER"),
            Regime::Static => f.write_str("STATIC"),
        }
    }
}

/// Why the regime changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeTrigger {
    Operator,
    RulesAvailable,
    StaticFailures,
    InterLoss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeTransition {
    pub from: Regime,
    pub to: Regime,
    pub trigger: ModeTrigger,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeState {
    pub inter_active: bool,
    pub consecutive_static_failures: u32,
    pub last_learning_pass_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ModeController {
    state: ModeState,
    static_failure_threshold: u32,
}

impl ModeController {
    pub fn new(static_failure_threshold: u32) -> Self {
        Self {
            state: ModeState::default(),
            static_failure_threshold: static_failure_threshold.max(1),
        }
    }

    pub fn state(&self) -> ModeState {
        self.state
    }

    pub fn regime(&self) -> Regime {
        if self.state.inter_active {
            Regime::Inter
        } else {
            Regime::Static
        }
    }

    pub fn inter_active(&self) -> bool {
        self.state.inter_active
    }

    pub fn activate(&mut self, trigger: ModeTrigger) -> Option<ModeTransition> {
        self.switch(Regime::Inter, trigger)
    }

    pub fn deactivate(&mut self, trigger: ModeTrigger) -> Option<ModeTransition> {
        self.switch(Regime::Static, trigger)
    }

    pub fn toggle(&mut self) -> ModeTransition {
        let target = match self.regime() {
            Regime::Inter => Regime::Static,
            Regime::Static => Regime::Inter,
        };
        let from = self.regime();
        self.switch(target, ModeTrigger::Operator)
            .unwrap_or(ModeTransition {
                from,
                to: target,
                trigger: ModeTrigger::Operator,
            })
    }

    /// Counts a static-tier loss; true once the streak reaches the threshold.
    pub fn record_static_failure(&mut self) -> bool {
        self.state.consecutive_static_failures =
            self.state.consecutive_static_failures.saturating_add(1);
        self.state.consecutive_static_failures >= self.static_failure_threshold
    }

    pub fn static_failures(&self) -> u32 {
        self.state.consecutive_static_failures
    }

    pub fn clear_static_failures(&mut self) {
        self.state.consecutive_static_failures = 0;
    }

    pub fn note_learning_pass(&mut self, now: DateTime<Utc>) {
        self.state.last_learning_pass_at = Some(now);
    }

    pub fn learning_due(&self, now: DateTime<Utc>, interval: TimeDelta) -> bool {
        match self.state.last_learning_pass_at {
            Some(last) => now.signed_duration_since(last) > interval,
            None => true,
        }
    }

    pub(crate) fn restore(&mut self, state: ModeState) {
        self.state = state;
    }

    fn switch(&mut self, to: Regime, trigger: ModeTrigger) -> Option<ModeTransition> {
        let from = self.regime();
        if from == to {
            return None;
        }
        self.state.inter_active = matches!(to, Regime::Inter);
        event!(
            target: "suitcast_core::mode",
            Level::INFO,
            from = %from,
            to = %to,
            trigger = ?trigger,
            "regime switched"
        );
        Some(ModeTransition { from, to, trigger })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn activation_is_reported_once() {
        let mut mode = ModeController::new(2);
        assert_eq!(mode.regime(), Regime::Static);
        let transition = mode.activate(ModeTrigger::Operator).unwrap();
        assert_eq!(transition.from, Regime::Static);
        assert_eq!(transition.to, Regime::Inter);
        assert!(mode.activate(ModeTrigger::RulesAvailable).is_none());
        assert!(mode.inter_active());
    }

    #[test]
    fn toggle_flips_regime() {
        let mut mode = ModeController::new(2);
        assert_eq!(mode.toggle().to, Regime::Inter);
        assert_eq!(mode.toggle().to, Regime::Static);
    }

    #[test]
    fn static_failures_reach_threshold() {
        let mut mode = ModeController::new(2);
        assert!(!mode.record_static_failure());
        assert!(mode.record_static_failure());
        mode.clear_static_failures();
        assert_eq!(mode.static_failures(), 0);
    }

    #[test]
    fn learning_due_after_interval() {
        let mut mode = ModeController::new(2);
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let interval = TimeDelta::minutes(30);
        assert!(mode.learning_due(start, interval));
        mode.note_learning_pass(start);
        assert!(!mode.learning_due(start + TimeDelta::minutes(30), interval));
        assert!(mode.learning_due(start + TimeDelta::minutes(31), interval));
    }
}
