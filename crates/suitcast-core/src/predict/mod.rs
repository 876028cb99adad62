//! Prediction scheduling and the ledger of published predictions.

pub mod ledger;
pub mod scheduler;

pub use ledger::{LedgerError, MessageId, Outcome, Prediction, PredictionLedger, PredictionStatus};
pub use scheduler::{PredictionPlan, PredictionScheduler, SchedulerState, SkipReason};
