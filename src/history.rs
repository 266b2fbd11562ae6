//! History of accepted submissions, backing the notifications query.
//!
//! The file is a single JSON document `{"history": [...]}`, oldest entry
//! first, rewritten atomically on every record.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::rules::RuleText;
use crate::store::path_lock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub received_at: DateTime<Utc>,
    /// The payload as it was submitted.
    pub payload: Value,
    pub rule: RuleText,
    /// SHA-256 of the rule text, hex encoded.
    pub fingerprint: String,
}

impl HistoryEntry {
    pub fn new(payload: Value, rule: &RuleText) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            payload,
            rule: rule.clone(),
            fingerprint: fingerprint(rule),
        }
    }
}

pub fn fingerprint(rule: &RuleText) -> String {
    hex::encode(Sha256::digest(rule.as_str().as_bytes()))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryDocument {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Most recent entry split from the rest (newest first).
#[derive(Debug, Clone, Serialize)]
pub struct Notifications {
    pub latest: HistoryEntry,
    pub previous: Vec<HistoryEntry>,
    pub total: usize,
}

impl Notifications {
    fn from_document(doc: HistoryDocument) -> Option<Self> {
        let mut history = doc.history;
        let total = history.len();
        let latest = history.pop()?;
        history.reverse();
        Some(Self {
            latest,
            previous: history,
            total,
        })
    }
}

pub struct HistoryLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock = path_lock(&path);
        Self { path, lock }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole document. A missing or empty file is an empty history.
    pub fn load(&self) -> Result<HistoryDocument> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HistoryDocument::default()),
            Err(e) => return Err(AgentError::storage(&self.path)(e)),
        };
        if raw.trim().is_empty() {
            return Ok(HistoryDocument::default());
        }
        serde_json::from_str(&raw).map_err(|e| {
            AgentError::storage(&self.path)(std::io::Error::new(ErrorKind::InvalidData, e))
        })
    }

    pub fn record(&self, entry: HistoryEntry) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut doc = self.load()?;
        doc.history.push(entry);
        let raw = serde_json::to_string_pretty(&doc)?;
        write_atomic(&self.path, &raw)
    }

    /// Read-only view for dashboards. `None` when nothing was recorded yet.
    pub fn notifications(&self) -> Result<Option<Notifications>> {
        Ok(Notifications::from_document(self.load()?))
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(AgentError::storage(parent))?;

    let tmp = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));
    fs::write(&tmp, contents).map_err(AgentError::storage(&tmp))?;
    fs::rename(&tmp, path).map_err(AgentError::storage(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::templates;
    use serde_json::json;

    #[test]
    fn missing_history_has_no_notifications() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("history.json"));
        assert!(log.notifications().unwrap().is_none());
        assert!(log.load().unwrap().history.is_empty());
    }

    #[test]
    fn latest_is_split_from_previous() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("state/history.json"));

        for ip in ["192.0.2.1", "192.0.2.2", "192.0.2.3"] {
            let rule = templates::block_ip(ip, None);
            let payload = json!({"command": "block_ip", "target": ip});
            log.record(HistoryEntry::new(payload, &rule)).unwrap();
        }

        let notes = log.notifications().unwrap().unwrap();
        assert_eq!(notes.total, 3);
        assert_eq!(notes.latest.payload["target"], "192.0.2.3");
        let previous: Vec<&str> = notes
            .previous
            .iter()
            .map(|e| e.payload["target"].as_str().unwrap())
            .collect();
        assert_eq!(previous, ["192.0.2.2", "192.0.2.1"]);
    }

    #[test]
    fn document_shape_has_history_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let log = HistoryLog::new(&path);
        let rule = templates::alert_ip("1.2.3.4", None);
        log.record(HistoryEntry::new(json!({"x": 1}), &rule)).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let history = raw["history"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["rule"], rule.as_str());
        assert_eq!(history[0]["fingerprint"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn corrupt_history_is_storage_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json").unwrap();
        let err = HistoryLog::new(&path).notifications().unwrap_err();
        assert!(matches!(err, AgentError::Storage { .. }));
    }

    #[test]
    fn fingerprint_is_stable() {
        let rule = templates::block_icmp("10.45.0.3", None);
        assert_eq!(fingerprint(&rule), fingerprint(&rule.clone()));
        assert_ne!(
            fingerprint(&rule),
            fingerprint(&templates::block_icmp("10.45.0.4", None))
        );
    }
}
