use crate::reset::ResetSchedule;
use crate::verify::VerificationPolicy;
use serde::{Deserialize, Serialize};

/// Tunables of the prediction engine. Every field has a default, so a
/// partial YAML/JSON section deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub history_window: usize,
    pub min_spacing: u64,
    pub cooldown_secs: u64,
    pub learning_interval_secs: u64,
    pub lookahead: u64,
    pub win_window: u64,
    pub static_failure_threshold: u32,
    pub learned_per_suit: usize,
    pub reset: ResetSchedule,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_window: 30,
            min_spacing: 3,
            cooldown_secs: 30,
            learning_interval_secs: 30 * 60,
            lookahead: 5,
            win_window: 2,
            static_failure_threshold: 2,
            learned_per_suit: 2,
            reset: ResetSchedule::default(),
        }
    }
}

impl EngineConfig {
    pub fn verification(&self) -> VerificationPolicy {
        VerificationPolicy {
            lookahead: self.lookahead,
            win_window: self.win_window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EngineConfig;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"history_window": 50, "reset": {"hour": 2}}"#).unwrap();
        assert_eq!(config.history_window, 50);
        assert_eq!(config.min_spacing, 3);
        assert_eq!(config.reset.hour, 2);
        assert_eq!(config.reset.minute, 59);
        assert_eq!(config.verification().win_window, 2);
    }
}
