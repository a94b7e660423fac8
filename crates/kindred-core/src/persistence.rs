use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::outcome::ContactHistory;
use crate::outcome::NotificationInbox;
use crate::outcome::QuotaBook;
use crate::outcome::QuotaKey;
use crate::outcome::QuotaLedger;
use crate::profile::ContactedUser;
use crate::profile::FriendRequest;
use crate::profile::ProfileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactSource {
    Swipe,
    WhisperBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeEvent {
    Contacted {
        source: ContactSource,
        contact: ContactedUser,
    },
    FriendRequestReceived {
        request: FriendRequest,
    },
    FriendRequestResolved {
        request_id: ProfileId,
    },
    Reported {
        profile_id: ProfileId,
        reason: String,
        attachment_count: usize,
    },
    Gifted {
        profile_id: ProfileId,
        amount: u32,
        receives_left: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub seq: u64,
    pub ts_ms: i64,
    #[serde(flatten)]
    pub event: OutcomeEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub version: u8,
    pub seq: u64,
    pub whispers: u32,
    pub credits: u32,
    #[serde(default)]
    pub receives: BTreeMap<ProfileId, u32>,
}

impl QuotaSnapshot {
    pub const VERSION: u8 = 1;

    pub fn capture(seq: u64, book: &QuotaBook) -> Self {
        let receives = book
            .entries()
            .filter_map(|(key, balance)| match key {
                QuotaKey::Receives(id) => Some((id.clone(), balance)),
                _ => None,
            })
            .collect();
        Self {
            version: Self::VERSION,
            seq,
            whispers: book.balance(&QuotaKey::Whispers),
            credits: book.balance(&QuotaKey::Credits),
            receives,
        }
    }

    pub fn restore(&self) -> QuotaBook {
        let mut book = QuotaBook::with_allowances(self.whispers, self.credits);
        for (id, balance) in &self.receives {
            book.set(QuotaKey::Receives(id.clone()), *balance);
        }
        book
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encode outcome record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("quota snapshot {} is unreadable: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// `outcomes.jsonl` keeps its balances in `outcomes.snapshot.json`.
pub fn snapshot_path_for(log_path: &Path) -> PathBuf {
    let stem = log_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("outcomes");
    log_path.with_file_name(format!("{stem}.snapshot.json"))
}

/// Append-only JSONL log of committed outcomes. Each log keeps its quota
/// snapshot in a sibling file named after it.
#[derive(Debug)]
pub struct OutcomeEventStore {
    log_path: PathBuf,
    snapshot_path: PathBuf,
    last_seq: u64,
}

impl OutcomeEventStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let log_path = path.as_ref().to_path_buf();
        if let Some(dir) = log_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_error(dir))?;
        }
        let last_seq = read_log(&log_path)?
            .iter()
            .fold(0, |last, record| last.max(record.seq));
        Ok(Self {
            snapshot_path: snapshot_path_for(&log_path),
            log_path,
            last_seq,
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Writes one record and returns its sequence number. A failed write
    /// does not consume a number.
    pub fn append(&mut self, event: OutcomeEvent) -> Result<u64, StoreError> {
        let record = OutcomeRecord {
            seq: self.last_seq + 1,
            ts_ms: chrono::Utc::now().timestamp_millis(),
            event,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(io_error(&self.log_path))?;
        log.write_all(&line).map_err(io_error(&self.log_path))?;
        self.last_seq = record.seq;
        Ok(record.seq)
    }

    pub fn load(&self) -> Result<Vec<OutcomeRecord>, StoreError> {
        read_log(&self.log_path)
    }

    /// Replaces the snapshot through a temporary file so a crash never
    /// leaves a half-written one behind.
    pub fn save_snapshot(&self, snapshot: &QuotaSnapshot) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec_pretty(snapshot)?;
        let staging = self.snapshot_path.with_extension("json.tmp");
        fs::write(&staging, encoded).map_err(io_error(&staging))?;
        fs::rename(&staging, &self.snapshot_path).map_err(io_error(&self.snapshot_path))
    }

    pub fn load_snapshot(&self) -> Result<Option<QuotaSnapshot>, StoreError> {
        let bytes = match fs::read(&self.snapshot_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&self.snapshot_path)(err)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Snapshot {
                path: self.snapshot_path.clone(),
                source,
            })
    }
}

pub fn replay_contacted_ids(records: &[OutcomeRecord]) -> BTreeSet<ProfileId> {
    records
        .iter()
        .filter_map(|record| match &record.event {
            OutcomeEvent::Contacted { contact, .. } => Some(contact.id().clone()),
            _ => None,
        })
        .collect()
}

pub fn replay_history(records: &[OutcomeRecord]) -> ContactHistory {
    let mut history = ContactHistory::default();
    for record in records {
        match &record.event {
            OutcomeEvent::Contacted { contact, .. } => history.upsert(contact.clone()),
            OutcomeEvent::Reported {
                profile_id, reason, ..
            } => history.mark_reported(profile_id, reason),
            OutcomeEvent::Gifted {
                profile_id,
                amount,
                receives_left,
            } => history.record_gift(profile_id, *amount, *receives_left),
            OutcomeEvent::FriendRequestReceived { .. }
            | OutcomeEvent::FriendRequestResolved { .. } => {}
        }
    }
    history
}

/// Friend requests that were received and never resolved.
pub fn replay_inbox(records: &[OutcomeRecord]) -> NotificationInbox {
    let mut inbox = NotificationInbox::default();
    for record in records {
        match &record.event {
            OutcomeEvent::FriendRequestReceived { request } => {
                inbox.receive(request.clone());
            }
            OutcomeEvent::FriendRequestResolved { request_id } => {
                inbox.remove(request_id);
            }
            _ => {}
        }
    }
    inbox
}

fn read_log(path: &Path) -> Result<Vec<OutcomeRecord>, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_error(path)(err)),
    };
    let records: Vec<OutcomeRecord> = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str::<OutcomeRecord>(line) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(line = index + 1, "skipping unreadable outcome record: {err}");
                None
            }
        })
        .collect();
    Ok(records)
}
