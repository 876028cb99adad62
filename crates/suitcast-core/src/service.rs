//! Thread-safe front of the engine.
//!
//! One mutex guards the engine for a full event pass plus the snapshot
//! write. Transport calls happen after the lock is released.

use crate::config::EngineConfig;
use crate::engine::{Engine, EngineError, EngineStatus, EventReport, LearningReport};
use crate::mode::ModeTransition;
use crate::model::event::GameEvent;
use crate::notify::{Notifier, Outbound};
use crate::rules::{ManualRule, MergeReport, RuleError};
use crate::snapshot::{EngineSnapshot, SnapshotStore, check_version};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{Level, event};

pub struct PredictionService<N, S> {
    engine: Mutex<Engine>,
    notifier: N,
    store: S,
}

impl<N: Notifier, S: SnapshotStore> PredictionService<N, S> {
    /// Restores from `store` when it holds a usable snapshot, otherwise
    /// starts from an empty engine.
    pub fn open(config: EngineConfig, notifier: N, store: S) -> Result<Self, EngineError> {
        let loaded = match store.load() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                event!(
                    target: "suitcast_core::service",
                    Level::WARN,
                    error = %err,
                    "snapshot unreadable, starting empty"
                );
                None
            }
        };
        let engine = match loaded {
            Some(snapshot) => match check_version(&snapshot) {
                Ok(()) => snapshot.restore(config)?,
                Err(err) => {
                    event!(
                        target: "suitcast_core::service",
                        Level::WARN,
                        error = %err,
                        "snapshot rejected, starting empty"
                    );
                    Engine::new(config)?
                }
            },
            None => Engine::new(config)?,
        };
        Ok(Self::with_engine(engine, notifier, store))
    }

    pub fn with_engine(engine: Engine, notifier: N, store: S) -> Self {
        Self {
            engine: Mutex::new(engine),
            notifier,
            store,
        }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ingest(&self, event: &GameEvent, now: DateTime<Utc>) -> EventReport {
        let report = {
            let mut engine = self.engine.lock();
            let report = engine.process(event, now);
            self.persist(&engine);
            report
        };
        self.dispatch(&report.outbound);
        report
    }

    pub fn status(&self) -> EngineStatus {
        self.engine.lock().status()
    }

    pub fn activate_inter(&self) -> Option<ModeTransition> {
        self.mutate(Engine::activate_inter)
    }

    pub fn deactivate_inter(&self) -> Option<ModeTransition> {
        self.mutate(Engine::deactivate_inter)
    }

    pub fn toggle_inter(&self) -> ModeTransition {
        self.mutate(Engine::toggle_inter)
    }

    pub fn force_learning(&self, now: DateTime<Utc>) -> LearningReport {
        self.mutate(|engine| engine.force_learning(now))
    }

    pub fn submit_manual_rules(&self, batch: &[ManualRule]) -> Result<MergeReport, RuleError> {
        self.mutate(|engine| engine.submit_manual_rules(batch))
    }

    pub fn reset_predictions(&self) -> usize {
        self.mutate(Engine::reset_predictions)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot::capture(&self.engine.lock())
    }

    pub fn into_engine(self) -> Engine {
        self.engine.into_inner()
    }

    fn mutate<T>(&self, op: impl FnOnce(&mut Engine) -> T) -> T {
        let mut engine = self.engine.lock();
        let result = op(&mut *engine);
        self.persist(&engine);
        result
    }

    fn persist(&self, engine: &Engine) {
        if let Err(err) = self.store.save(&EngineSnapshot::capture(engine)) {
            event!(
                target: "suitcast_core::service",
                Level::WARN,
                error = %err,
                "snapshot save failed"
            );
        }
    }

    fn dispatch(&self, outbound: &[Outbound]) {
        for item in outbound {
            match item {
                Outbound::Publish(request) => match self.notifier.publish(request) {
                    Ok(id) => {
                        let target = request.target_game;
                        self.mutate(|engine| {
                            if let Err(err) = engine.attach_external_id(target, id) {
                                event!(
                                    target: "suitcast_core::service",
                                    Level::WARN,
                                    target_game = target,
                                    error = %err,
                                    "could not attach message id"
                                );
                            }
                        });
                    }
                    Err(err) => event!(
                        target: "suitcast_core::service",
                        Level::WARN,
                        target_game = request.target_game,
                        error = %err,
                        "publish failed"
                    ),
                },
                Outbound::Edit {
                    request,
                    message: Some(id),
                } => {
                    if let Err(err) = self.notifier.edit(request, *id) {
                        event!(
                            target: "suitcast_core::service",
                            Level::WARN,
                            target_game = request.target_game,
                            error = %err,
                            "edit failed"
                        );
                    }
                }
                Outbound::Edit {
                    request,
                    message: None,
                } => event!(
                    target: "suitcast_core::service",
                    Level::DEBUG,
                    target_game = request.target_game,
                    "no message to edit"
                ),
                Outbound::Admin(notice) => {
                    if let Err(err) = self.notifier.notify_admin(notice) {
                        event!(
                            target: "suitcast_core::service",
                            Level::WARN,
                            error = %err,
                            "admin notice failed"
                        );
                    }
                }
            }
        }
    }
}
