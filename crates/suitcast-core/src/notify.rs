use crate::mode::{ModeTransition, Regime};
use crate::model::suit::Suit;
use crate::predict::{MessageId, Prediction, PredictionStatus};
use chrono::NaiveDate;
use core::fmt;
use serde::Serialize;
use thiserror::Error;

/// Text of a prediction message: `🔵<target>🔵:<suit> statut :<marker>`.
pub fn prediction_text(target_game: u64, suit: Suit, status: PredictionStatus) -> String {
    format!(
        "🔵{target_game}🔵:{} statut :{}",
        suit.emoji(),
        status.marker()
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishRequest {
    pub target_game: u64,
    pub suit: Suit,
    pub text: String,
}

impl PublishRequest {
    pub fn for_prediction(prediction: &Prediction) -> Self {
        Self {
            target_game: prediction.target_game,
            suit: prediction.predicted_suit,
            text: prediction_text(
                prediction.target_game,
                prediction.predicted_suit,
                prediction.status,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditRequest {
    pub target_game: u64,
    pub status: PredictionStatus,
    pub text: String,
}

impl EditRequest {
    pub fn for_status(target_game: u64, suit: Suit, status: PredictionStatus) -> Self {
        Self {
            target_game,
            status,
            text: prediction_text(target_game, suit, status),
        }
    }
}

/// Messages for the operator channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdminNotice {
    DailyReset {
        date: NaiveDate,
        cleared_predictions: usize,
    },
    RegimeChanged {
        transition: ModeTransition,
    },
    LearningPass {
        samples: usize,
        learned_rules: usize,
    },
}

impl fmt::Display for AdminNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminNotice::DailyReset {
                date,
                cleared_predictions,
            } => write!(
                f,
                "daily reset for {date}: {cleared_predictions} predictions cleared, rules kept"
            ),
            AdminNotice::RegimeChanged { transition } => match transition.to {
                Regime::Inter => write!(f, "INTER mode on ({:?})", transition.trigger),
                Regime::Static => write!(f, "INTER mode off, static rules only ({:?})", transition.trigger),
            },
            AdminNotice::LearningPass {
                samples,
                learned_rules,
            } => write!(
                f,
                "learning pass over {samples} samples kept {learned_rules} rules"
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to write outbound message")]
    Io(#[from] std::io::Error),
    #[error("failed to encode outbound message")]
    Encode(#[from] serde_json::Error),
    #[error("transport rejected message: {0}")]
    Rejected(String),
}

/// Delivery side of the engine: the messaging transport.
pub trait Notifier {
    fn publish(&self, request: &PublishRequest) -> Result<MessageId, NotifyError>;

    fn edit(&self, request: &EditRequest, message: MessageId) -> Result<(), NotifyError>;

    fn notify_admin(&self, notice: &AdminNotice) -> Result<(), NotifyError>;
}

/// Side effect produced by the engine, dispatched once state is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Publish(PublishRequest),
    Edit {
        request: EditRequest,
        message: Option<MessageId>,
    },
    Admin(AdminNotice),
}

/// Discards everything; hands out increasing message ids.
#[derive(Debug, Default)]
pub struct NullNotifier {
    next: std::sync::atomic::AtomicI64,
}

impl Notifier for NullNotifier {
    fn publish(&self, _request: &PublishRequest) -> Result<MessageId, NotifyError> {
        let id = self
            .next
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(MessageId(id + 1))
    }

    fn edit(&self, _request: &EditRequest, _message: MessageId) -> Result<(), NotifyError> {
        Ok(())
    }

    fn notify_admin(&self, _notice: &AdminNotice) -> Result<(), NotifyError> {
        Ok(())
    }
}
