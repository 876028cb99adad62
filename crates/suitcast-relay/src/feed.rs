use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use suitcast_core::Delivery;
use thiserror::Error;

/// One channel post as captured from the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRecord {
    pub chat_id: i64,
    pub text: String,
    #[serde(default)]
    pub edited: bool,
    pub at: DateTime<Utc>,
}

impl FeedRecord {
    pub fn delivery(&self) -> Delivery {
        if self.edited {
            Delivery::Edited
        } else {
            Delivery::Fresh
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to access feed {path:?}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("feed {path:?} line {line} is not a valid record")]
    Record {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
        line: usize,
    },
}

/// Reads a JSONL feed. Blank lines are skipped.
pub fn read_feed(path: &Path) -> Result<Vec<FeedRecord>, FeedError> {
    let io_error = |source| FeedError::Io {
        source,
        path: path.to_path_buf(),
    };
    let reader = BufReader::new(File::open(path).map_err(io_error)?);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error)?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| FeedError::Record {
            source,
            path: path.to_path_buf(),
            line: index + 1,
        })?;
        records.push(record);
    }
    Ok(records)
}

pub fn write_feed(path: &Path, records: &[FeedRecord]) -> Result<(), FeedError> {
    let io_error = |source| FeedError::Io {
        source,
        path: path.to_path_buf(),
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
    for (index, record) in records.iter().enumerate() {
        let line = serde_json::to_string(record).map_err(|source| FeedError::Record {
            source,
            path: path.to_path_buf(),
            line: index + 1,
        })?;
        writeln!(writer, "{line}").map_err(io_error)?;
    }
    writer.flush().map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn feed_survives_a_write_read_cycle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.jsonl");
        let records = vec![
            FeedRecord {
                chat_id: -1001,
                text: "#N1. ✅3(10♦5♠8♣) - 7(K♥7♦)".into(),
                edited: false,
                at: Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
            },
            FeedRecord {
                chat_id: -1001,
                text: "#N2. ⏰(2♠3♠) - (4♦)".into(),
                edited: true,
                at: Utc.with_ymd_and_hms(2024, 3, 10, 12, 1, 0).unwrap(),
            },
        ];
        write_feed(&path, &records).unwrap();
        assert_eq!(read_feed(&path).unwrap(), records);
        assert_eq!(records[1].delivery(), Delivery::Edited);
    }

    #[test]
    fn bad_lines_report_their_position() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.jsonl");
        std::fs::write(
            &path,
            "{\"chat_id\":1,\"text\":\"x\",\"at\":\"2024-03-10T12:00:00Z\"}\n\nnot json\n",
        )
        .unwrap();
        let err = read_feed(&path).unwrap_err();
        assert!(matches!(err, FeedError::Record { line: 3, .. }));
    }
}
