pub mod builder;
pub mod templates;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use builder::{Action, ContentMatch, FileMeta, RuleType, SnortRule};

/// One fully rendered rule line, written to the rule file verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleText(String);

impl RuleText {
    pub(crate) fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RuleText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RuleText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Renders a rule line from a target and an optional custom message.
pub type RuleBuilder = fn(&str, Option<&str>) -> RuleText;

/// The fixed set of rule templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateId {
    BlockIp,
    BlockIcmp,
    AlertIcmp,
    AlertIp,
    BlockDomain,
    /// Alert synthesized from an address found in plain-text content.
    /// Not reachable through a `command`.
    IndicatorAlert,
}

impl TemplateId {
    pub const ALL: [TemplateId; 6] = [
        Self::BlockIp,
        Self::BlockIcmp,
        Self::AlertIcmp,
        Self::AlertIp,
        Self::BlockDomain,
        Self::IndicatorAlert,
    ];

    /// The `command` value that selects this template, if any.
    pub fn command(self) -> Option<&'static str> {
        match self {
            Self::BlockIp => Some("block_ip"),
            Self::BlockIcmp => Some("block_icmp"),
            Self::AlertIcmp => Some("alert_icmp"),
            Self::AlertIp => Some("alert_ip"),
            Self::BlockDomain => Some("block_domain"),
            Self::IndicatorAlert => None,
        }
    }

    pub fn builder(self) -> RuleBuilder {
        match self {
            Self::BlockIp => templates::block_ip,
            Self::BlockIcmp => templates::block_icmp,
            Self::AlertIcmp => templates::alert_icmp,
            Self::AlertIp => templates::alert_ip,
            Self::BlockDomain => templates::block_domain,
            Self::IndicatorAlert => templates::indicator_alert,
        }
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.command() {
            Some(command) => write!(f, "{command}"),
            None => write!(f, "indicator_alert"),
        }
    }
}

/// Metadata about a template, used for `list-templates` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub id: TemplateId,
    pub command: Option<String>,
    pub action: String,
    pub protocol: String,
    pub dst_port: String,
    pub default_message: String,
}

/// Maps `command` strings to templates. Built once, then read-only.
pub struct TemplateRegistry {
    by_command: HashMap<&'static str, TemplateId>,
}

impl TemplateRegistry {
    /// Create a registry with every command-addressable template registered.
    pub fn new() -> Self {
        let by_command = TemplateId::ALL
            .iter()
            .filter_map(|&id| id.command().map(|command| (command, id)))
            .collect();
        Self { by_command }
    }

    pub fn lookup(&self, command: &str) -> Option<TemplateId> {
        self.by_command.get(command).copied()
    }

    pub fn render(&self, id: TemplateId, target: &str, message: Option<&str>) -> RuleText {
        (id.builder())(target, message)
    }

    /// Render through a command name. Unknown commands yield `None`.
    pub fn render_command(
        &self,
        command: &str,
        target: &str,
        message: Option<&str>,
    ) -> Option<RuleText> {
        self.lookup(command).map(|id| self.render(id, target, message))
    }

    /// List metadata for all templates.
    pub fn list_templates(&self) -> Vec<TemplateMetadata> {
        TemplateId::ALL.into_iter().map(templates::metadata).collect()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_resolves() {
        let registry = TemplateRegistry::new();
        for command in ["block_ip", "block_icmp", "alert_icmp", "alert_ip", "block_domain"] {
            let id = registry.lookup(command).unwrap();
            assert_eq!(id.command(), Some(command));
        }
    }

    #[test]
    fn unknown_command_is_none() {
        let registry = TemplateRegistry::new();
        assert!(registry.lookup("noop").is_none());
        assert!(registry.lookup("indicator_alert").is_none());
        assert!(registry.render_command("noop", "x", None).is_none());
    }

    #[test]
    fn render_command_uses_builder() {
        let registry = TemplateRegistry::new();
        let rule = registry.render_command("block_icmp", "10.45.0.3", None).unwrap();
        assert!(rule.as_str().starts_with("block icmp 10.45.0.3 any -> $HOME_NET any"));
    }

    #[test]
    fn listing_covers_all_templates() {
        let listed = TemplateRegistry::new().list_templates();
        assert_eq!(listed.len(), TemplateId::ALL.len());
        assert_eq!(listed[0].id, TemplateId::BlockIp);
        assert_eq!(listed.last().map(|m| m.id), Some(TemplateId::IndicatorAlert));
    }
}
