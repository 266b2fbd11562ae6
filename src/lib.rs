//! FileAgent: turns threat indicators into Snort rules.
//!
//! Submissions (explicit `command` payloads, or raw text/JSON uploads) are
//! translated into at most one rule line, which is appended to an
//! append-only rule file after a timestamped backup. Duplicates and misses
//! never touch the file.
//!
//! # Quick Start
//!
//! ```no_run
//! use fileagent::{FileAgent, RuleStore, RuleTranslator};
//! use serde_json::json;
//!
//! let agent = FileAgent::new(
//!     RuleTranslator::new(),
//!     RuleStore::new("local.rules", "backup"),
//!     None,
//! );
//! let submission = agent
//!     .submit_value(&json!({"command": "block_ip", "target": "198.51.100.7"}))
//!     .unwrap();
//! println!("{}", submission.outcome);
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod indicator;
pub mod output;
pub mod rules;
pub mod store;
pub mod translator;

use serde::Serialize;
use serde_json::Value;

use config::StorePaths;
use error::{AgentError, Result};
use history::{HistoryEntry, HistoryLog, Notifications};
use rules::RuleText;

pub use indicator::{Indicator, IndicatorKind};
pub use store::{AppendOutcome, RuleStore};
pub use translator::{Payload, RuleIntent, RuleTranslator};

/// Result of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    #[serde(flatten)]
    pub outcome: AppendOutcome,
    pub rule: Option<RuleText>,
}

/// Translator, store and optional history wired together.
pub struct FileAgent {
    translator: RuleTranslator,
    store: RuleStore,
    history: Option<HistoryLog>,
}

impl FileAgent {
    pub fn new(translator: RuleTranslator, store: RuleStore, history: Option<HistoryLog>) -> Self {
        Self {
            translator,
            store,
            history,
        }
    }

    pub fn from_paths(paths: &StorePaths) -> Self {
        Self::new(
            RuleTranslator::new(),
            RuleStore::new(&paths.rules_file, &paths.backup_dir),
            paths.history_file.as_ref().map(HistoryLog::new),
        )
    }

    pub fn translator(&self) -> &RuleTranslator {
        &self.translator
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    /// Translate a payload and append the resulting rule.
    pub fn submit(&self, payload: &Payload) -> Result<Submission> {
        let rule = self.translator.translate(payload).map_err(|e| {
            tracing::warn!(error = %e, "submission rejected");
            e
        })?;
        self.commit(rule, || Value::Object(payload.clone()))
    }

    pub fn submit_value(&self, value: &Value) -> Result<Submission> {
        match value {
            Value::Object(payload) => self.submit(payload),
            _ => Err(AgentError::InvalidPayload("payload must be a JSON object".into())),
        }
    }

    /// Handle an uploaded document the way the upload endpoint does.
    ///
    /// A JSON upload that is itself a command payload is submitted as such;
    /// anything else is wrapped as `{content_type, content}`.
    pub fn upload(&self, content_type: &str, body: &str) -> Result<Submission> {
        if content_type == translator::CONTENT_TYPE_JSON {
            if let Ok(Value::Object(payload)) = serde_json::from_str::<Value>(body) {
                if payload.contains_key("command") {
                    return self.submit(&payload);
                }
            }
        }
        self.submit(&translator::content_payload(content_type, body))
    }

    /// Append a rule built outside the template registry.
    pub fn submit_rule(&self, rule: RuleText) -> Result<Submission> {
        let record = Value::String(rule.as_str().to_string());
        self.commit(Some(rule), || record)
    }

    /// `None` when history is disabled or empty.
    pub fn notifications(&self) -> Result<Option<Notifications>> {
        match &self.history {
            Some(history) => history.notifications(),
            None => Ok(None),
        }
    }

    // History is recorded under the rule file lock so its order matches the
    // file. The rule is already durable at that point, so a history failure
    // is logged and the submission still reports `Appended`.
    fn commit(&self, rule: Option<RuleText>, record: impl FnOnce() -> Value) -> Result<Submission> {
        let outcome = self.store.append_and(rule.as_ref(), |rule| {
            let Some(history) = &self.history else {
                return;
            };
            if let Err(e) = history.record(HistoryEntry::new(record(), rule)) {
                tracing::warn!(
                    error = %e,
                    history = %history.path().display(),
                    "rule appended but history record failed"
                );
            }
        })?;
        Ok(Submission { outcome, rule })
    }
}
