pub mod config;
pub mod engine;
pub mod history;
pub mod learner;
pub mod mode;
pub mod model;
pub mod notify;
pub mod predict;
pub mod reset;
pub mod rules;
pub mod service;
pub mod snapshot;
pub mod verify;

pub use config::EngineConfig;
pub use engine::{
    Engine, EngineError, EngineStatus, EventReport, LearningCause, LearningReport, LedgerCounts,
};
pub use mode::{ModeState, ModeTransition, ModeTrigger, Regime};
pub use model::{Card, Deck, Delivery, GameEvent, Rank, Suit};
pub use notify::{AdminNotice, EditRequest, Notifier, NotifyError, Outbound, PublishRequest};
pub use predict::{MessageId, Prediction, PredictionStatus};
pub use rules::{ManualRule, MergeReport, Rule, RuleError, Tier};
pub use service::PredictionService;
pub use snapshot::{EngineSnapshot, MemoryStore, SnapshotStore, StoreError};

pub struct AppInfo;

impl AppInfo {
    pub const fn name() -> &'static str {
        "suitcast"
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}
