//! Payload to rule translation.
//!
//! Two payload shapes are accepted:
//!
//! - explicit command: `{"command": "block_ip", "target": "1.2.3.4", "message": "..."}`
//! - content upload: `{"content_type": "text/plain" | "application/json", "content": ...}`
//!
//! Misses (unknown command, no indicator found) translate to `Ok(None)`.
//! Structurally broken input is an error.

use serde::Serialize;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::indicator::{self, Indicator, IndicatorKind};
use crate::rules::{RuleText, TemplateId, TemplateRegistry};

/// A decoded inbound payload.
pub type Payload = serde_json::Map<String, Value>;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Wrap an uploaded body as a content payload.
pub fn content_payload(content_type: &str, content: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert("content_type".into(), Value::String(content_type.into()));
    payload.insert("content".into(), Value::String(content.into()));
    payload
}

/// Structured form of a request once its template is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleIntent {
    pub template: TemplateId,
    pub target: String,
    pub message: Option<String>,
}

impl RuleIntent {
    pub fn new(template: TemplateId, target: impl Into<String>) -> Self {
        Self {
            template,
            target: target.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    /// Synthesize an intent from an indicator found in free text.
    ///
    /// Addresses get the indicator alert; URLs are reduced to their host and
    /// blocked as a domain.
    pub fn from_indicator(found: &Indicator) -> Option<Self> {
        match found.kind {
            IndicatorKind::Ipv4 | IndicatorKind::Ipv6 => {
                Some(Self::new(TemplateId::IndicatorAlert, &found.value))
            }
            IndicatorKind::Domain => Some(Self::new(TemplateId::BlockDomain, &found.value)),
            IndicatorKind::Url => found.to_domain().and_then(|d| Self::from_indicator(&d)),
        }
    }
}

/// Turns payloads into at most one rule line.
pub struct RuleTranslator {
    registry: TemplateRegistry,
}

impl RuleTranslator {
    pub fn new() -> Self {
        Self::with_registry(TemplateRegistry::new())
    }

    pub fn with_registry(registry: TemplateRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Translate a payload into a rule, or `None` when there is nothing to
    /// write.
    pub fn translate(&self, payload: &Payload) -> Result<Option<RuleText>> {
        Ok(self.intent(payload)?.map(|intent| self.render(&intent)))
    }

    /// Same as [`translate`](Self::translate) for an arbitrary JSON value.
    pub fn translate_value(&self, value: &Value) -> Result<Option<RuleText>> {
        match value {
            Value::Object(payload) => self.translate(payload),
            _ => Err(AgentError::InvalidPayload("payload must be a JSON object".into())),
        }
    }

    pub fn render(&self, intent: &RuleIntent) -> RuleText {
        self.registry.render(intent.template, &intent.target, intent.message.as_deref())
    }

    /// Resolve the payload into a rule intent.
    pub fn intent(&self, payload: &Payload) -> Result<Option<RuleIntent>> {
        if let Some(command) = payload.get("command") {
            return self.command_intent(command, payload);
        }

        let content_type = payload.get("content_type").and_then(Value::as_str);
        match content_type {
            Some(CONTENT_TYPE_JSON) => json_content_intent(payload.get("content")),
            Some(CONTENT_TYPE_TEXT) => text_content_intent(payload.get("content")),
            Some(other) => Err(AgentError::UnsupportedContentType(other.to_string())),
            None => Err(AgentError::UnsupportedContentType(
                "payload carries neither a command nor a content_type".into(),
            )),
        }
    }

    fn command_intent(&self, command: &Value, payload: &Payload) -> Result<Option<RuleIntent>> {
        let Some(template) = command.as_str().and_then(|c| self.registry.lookup(c)) else {
            tracing::debug!(command = %command, "unknown command, skipping");
            return Ok(None);
        };

        let target = payload
            .get("target")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AgentError::InvalidPayload(format!("command '{template}' requires a string target"))
            })?;
        let message = match payload.get("message") {
            None | Some(Value::Null) => None,
            Some(Value::String(m)) => Some(check_message(m)?.to_string()),
            Some(_) => {
                return Err(AgentError::InvalidPayload("message must be a string".into()));
            }
        };

        Ok(Some(RuleIntent::new(template, check_target(target)?).with_message(message)))
    }
}

impl Default for RuleTranslator {
    fn default() -> Self {
        Self::new()
    }
}

fn json_content_intent(content: Option<&Value>) -> Result<Option<RuleIntent>> {
    let parsed = match content {
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
            .map_err(|e| AgentError::MalformedContent(e.to_string()))?,
        Some(value @ Value::Object(_)) => value.clone(),
        _ => {
            return Err(AgentError::MalformedContent(
                "application/json content must be a JSON document".into(),
            ))
        }
    };

    let Value::Object(fields) = parsed else {
        return Err(AgentError::MalformedContent(
            "application/json content must be a JSON object".into(),
        ));
    };

    match fields.get("ip").and_then(Value::as_str) {
        Some(ip) => Ok(Some(RuleIntent::new(TemplateId::BlockIp, check_target(ip)?))),
        None => {
            tracing::debug!("json content has no ip field, skipping");
            Ok(None)
        }
    }
}

fn text_content_intent(content: Option<&Value>) -> Result<Option<RuleIntent>> {
    let text = content.and_then(Value::as_str).ok_or_else(|| {
        AgentError::InvalidPayload("text/plain content must be a string".into())
    })?;

    match indicator::extract(text) {
        Some(found) => {
            tracing::debug!(kind = %found.kind, value = %found.value, "indicator extracted");
            Ok(RuleIntent::from_indicator(&found))
        }
        None => {
            tracing::debug!("no indicator in text content, skipping");
            Ok(None)
        }
    }
}

/// Targets land in the rule header verbatim, so they must be a single token.
fn check_target(target: &str) -> Result<&str> {
    let target = target.trim();
    if target.is_empty() {
        return Err(AgentError::InvalidPayload("target is empty".into()));
    }
    let breaks_token =
        |c: char| c.is_whitespace() || c.is_control() || matches!(c, '(' | ')' | ';' | '"');
    if target.chars().any(breaks_token) {
        return Err(AgentError::InvalidPayload(format!(
            "target '{target}' is not a single address or name"
        )));
    }
    Ok(target)
}

/// A rule is exactly one line; a message may not carry line breaks or other
/// control characters into it.
fn check_message(message: &str) -> Result<&str> {
    if message.chars().any(char::is_control) {
        return Err(AgentError::InvalidPayload(
            "message must not contain control characters".into(),
        ));
    }
    Ok(message)
}
