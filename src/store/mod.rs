//! Append-only rule file with backup-before-write.
//!
//! Every append runs under a mutex shared by all stores in the process that
//! point at the same rule file, so the duplicate check and the write are one
//! step from the point of view of concurrent submitters.

pub mod backup;

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::{AgentError, Result};
use crate::rules::RuleText;

static PATH_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Process-wide lock for one file path.
pub(crate) fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = lock_key(path);
    let mut locks = PATH_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
    locks.entry(key).or_default().clone()
}

/// Same key for every spelling of a path, whether or not the file exists yet.
fn lock_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match (fs::canonicalize(parent), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

/// What an append did to the rule file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum AppendOutcome {
    /// Rule written; `backup` holds the file as it was before the write.
    Appended { backup: PathBuf },
    /// An existing line already contains the rule. Nothing written.
    Duplicate,
    /// No rule to write. Nothing touched.
    Skipped,
}

impl AppendOutcome {
    pub fn is_appended(&self) -> bool {
        matches!(self, Self::Appended { .. })
    }
}

impl std::fmt::Display for AppendOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Appended { .. } => write!(f, "appended"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

pub struct RuleStore {
    rules_file: PathBuf,
    backup_dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl RuleStore {
    /// The rule file must already exist; the backup directory is created on
    /// first use.
    pub fn new(rules_file: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        let rules_file = rules_file.into();
        let lock = path_lock(&rules_file);
        Self {
            rules_file,
            backup_dir: backup_dir.into(),
            lock,
        }
    }

    pub fn rules_file(&self) -> &Path {
        &self.rules_file
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Append `rule` unless it is absent or already present.
    pub fn append(&self, rule: Option<&RuleText>) -> Result<AppendOutcome> {
        self.append_and(rule, |_| {})
    }

    /// Like [`append`](Self::append), running `on_appended` after a
    /// successful write while the file lock is still held.
    pub fn append_and(
        &self,
        rule: Option<&RuleText>,
        on_appended: impl FnOnce(&RuleText),
    ) -> Result<AppendOutcome> {
        let Some(rule) = rule else {
            return Ok(AppendOutcome::Skipped);
        };

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.read()?;
        if contains_rule(&current, rule) {
            tracing::debug!(rule = %rule, "rule already present, not appending");
            return Ok(AppendOutcome::Duplicate);
        }

        let backup = backup::write_backup(
            &self.rules_file,
            &self.backup_dir,
            current.as_bytes(),
            &Local::now(),
        )?;

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.rules_file)
            .map_err(AgentError::storage(&self.rules_file))?;
        file.write_all(format!("\n{rule}\n").as_bytes())
            .and_then(|_| file.flush())
            .map_err(AgentError::storage(&self.rules_file))?;

        tracing::info!(
            rule = %rule,
            file = %self.rules_file.display(),
            backup = %backup.display(),
            "rule appended"
        );
        on_appended(rule);
        Ok(AppendOutcome::Appended { backup })
    }

    /// Whether any line of the rule file contains `rule`.
    pub fn contains(&self, rule: &RuleText) -> Result<bool> {
        Ok(contains_rule(&self.read()?, rule))
    }

    fn read(&self) -> Result<String> {
        fs::read_to_string(&self.rules_file).map_err(AgentError::storage(&self.rules_file))
    }
}

// Substring containment, not line equality: a line that embeds the rule text
// counts as a duplicate.
fn contains_rule(contents: &str, rule: &RuleText) -> bool {
    contents.lines().any(|line| line.contains(rule.as_str()))
}
