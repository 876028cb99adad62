use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use suitcast_core::predict::Outcome;
use suitcast_core::{
    EngineError, EngineSnapshot, EngineStatus, EventReport, LearningReport, ManualRule,
    MergeReport, ModeTransition, NotifyError, PredictionService, RuleError,
};
use thiserror::Error;
use tracing::{Level, event};

use crate::config::{RelayConfig, ResolvedPaths};
use crate::feed::{FeedError, FeedRecord, read_feed};
use crate::outbox::JsonlOutbox;
use crate::parser::parse_message;
use crate::store::JsonFileStore;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to open outbox")]
    Outbox(#[from] NotifyError),
    #[error("failed to start engine")]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Feed(#[from] FeedError),
}

/// Totals of a feed replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub posts: usize,
    pub foreign_posts: usize,
    pub duplicates: usize,
    pub predictions: usize,
    pub won: usize,
    pub lost: usize,
    pub learning_passes: usize,
    pub resets: usize,
}

impl ReplaySummary {
    fn absorb(&mut self, report: &EventReport) {
        if report.duplicate {
            self.duplicates += 1;
        }
        if report.prediction.is_some() {
            self.predictions += 1;
        }
        match report.verification.as_ref().map(|v| v.outcome) {
            Some(Outcome::Won { .. }) => self.won += 1,
            Some(Outcome::Lost) => self.lost += 1,
            None => {}
        }
        if report.learning.is_some() {
            self.learning_passes += 1;
        }
        if report.reset.is_some() {
            self.resets += 1;
        }
    }
}

/// Connects the source channel to the prediction service.
pub struct Relay {
    source_chat: i64,
    paths: ResolvedPaths,
    service: PredictionService<JsonlOutbox, JsonFileStore>,
}

impl Relay {
    pub fn open(config: &RelayConfig) -> Result<Self, RelayError> {
        let paths = config.resolved_paths();
        let outbox = JsonlOutbox::open(
            &paths.outbox,
            config.channels.prediction,
            config.channels.admin,
        )?;
        let store = JsonFileStore::new(&paths.snapshot);
        let service = PredictionService::open(config.engine.clone(), outbox, store)?;
        event!(
            target: "suitcast_relay::relay",
            Level::INFO,
            instance = %config.instance,
            snapshot = %paths.snapshot.display(),
            outbox = %paths.outbox.display(),
            "relay opened"
        );
        Ok(Self {
            source_chat: config.channels.source,
            paths,
            service,
        })
    }

    pub fn paths(&self) -> &ResolvedPaths {
        &self.paths
    }

    pub fn service(&self) -> &PredictionService<JsonlOutbox, JsonFileStore> {
        &self.service
    }

    /// Feeds one post to the engine. Posts from other chats return `None`.
    pub fn handle(&self, record: &FeedRecord) -> Option<EventReport> {
        if record.chat_id != self.source_chat {
            event!(
                target: "suitcast_relay::relay",
                Level::TRACE,
                chat_id = record.chat_id,
                "ignoring post from foreign chat"
            );
            return None;
        }
        let game = parse_message(&record.text, record.delivery());
        Some(self.service.ingest(&game, record.at))
    }

    pub fn replay(&self, records: &[FeedRecord]) -> ReplaySummary {
        let mut summary = ReplaySummary::default();
        for record in records {
            summary.posts += 1;
            match self.handle(record) {
                Some(report) => summary.absorb(&report),
                None => summary.foreign_posts += 1,
            }
        }
        event!(
            target: "suitcast_relay::relay",
            Level::INFO,
            posts = summary.posts,
            predictions = summary.predictions,
            won = summary.won,
            lost = summary.lost,
            "replay finished"
        );
        summary
    }

    pub fn replay_file(&self, path: &Path) -> Result<ReplaySummary, RelayError> {
        let records = read_feed(path)?;
        Ok(self.replay(&records))
    }

    pub fn status(&self) -> EngineStatus {
        self.service.status()
    }

    pub fn activate_inter(&self) -> Option<ModeTransition> {
        self.service.activate_inter()
    }

    pub fn deactivate_inter(&self) -> Option<ModeTransition> {
        self.service.deactivate_inter()
    }

    pub fn toggle_inter(&self) -> ModeTransition {
        self.service.toggle_inter()
    }

    pub fn force_learning(&self, now: DateTime<Utc>) -> LearningReport {
        self.service.force_learning(now)
    }

    pub fn submit_manual_rules(&self, batch: &[ManualRule]) -> Result<MergeReport, RuleError> {
        self.service.submit_manual_rules(batch)
    }

    pub fn reset_predictions(&self) -> usize {
        self.service.reset_predictions()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.service.snapshot()
    }
}
