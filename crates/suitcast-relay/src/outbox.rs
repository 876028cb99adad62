use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use suitcast_core::notify::{AdminNotice, EditRequest, Notifier, NotifyError, PublishRequest};
use suitcast_core::MessageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxKind {
    Publish,
    Edit,
    Admin,
}

/// One message the relay would have sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub kind: OutboxKind,
    pub chat_id: i64,
    pub message_id: Option<i64>,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Append-only JSONL stand-in for the messaging transport. Message ids keep
/// counting from the highest id already in the file.
pub struct JsonlOutbox {
    path: PathBuf,
    prediction_chat: i64,
    admin_chat: Option<i64>,
    state: Mutex<OutboxState>,
}

struct OutboxState {
    file: File,
    last_id: i64,
}

impl JsonlOutbox {
    pub fn open(
        path: impl Into<PathBuf>,
        prediction_chat: i64,
        admin_chat: Option<i64>,
    ) -> Result<Self, NotifyError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let last_id = if path.exists() {
            read_outbox(&path)?
                .iter()
                .filter_map(|record| record.message_id)
                .max()
                .unwrap_or(0)
        } else {
            0
        };
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            prediction_chat,
            admin_chat,
            state: Mutex::new(OutboxState { file, last_id }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, state: &mut OutboxState, record: &OutboxRecord) -> Result<(), NotifyError> {
        let line = serde_json::to_string(record)?;
        writeln!(state.file, "{line}")?;
        state.file.flush()?;
        Ok(())
    }
}

impl Notifier for JsonlOutbox {
    fn publish(&self, request: &PublishRequest) -> Result<MessageId, NotifyError> {
        let mut state = self.state.lock();
        let id = state.last_id + 1;
        let record = OutboxRecord {
            kind: OutboxKind::Publish,
            chat_id: self.prediction_chat,
            message_id: Some(id),
            text: request.text.clone(),
            at: Utc::now(),
        };
        self.append(&mut state, &record)?;
        state.last_id = id;
        Ok(MessageId(id))
    }

    fn edit(&self, request: &EditRequest, message: MessageId) -> Result<(), NotifyError> {
        let mut state = self.state.lock();
        let record = OutboxRecord {
            kind: OutboxKind::Edit,
            chat_id: self.prediction_chat,
            message_id: Some(message.0),
            text: request.text.clone(),
            at: Utc::now(),
        };
        self.append(&mut state, &record)
    }

    fn notify_admin(&self, notice: &AdminNotice) -> Result<(), NotifyError> {
        let Some(chat_id) = self.admin_chat else {
            return Ok(());
        };
        let mut state = self.state.lock();
        let record = OutboxRecord {
            kind: OutboxKind::Admin,
            chat_id,
            message_id: None,
            text: notice.to_string(),
            at: Utc::now(),
        };
        self.append(&mut state, &record)
    }
}

pub fn read_outbox(path: &Path) -> Result<Vec<OutboxRecord>, NotifyError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}
