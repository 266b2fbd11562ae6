//! Generic rule builder for callers that need more than the fixed templates.
//!
//! A [`SnortRule`] is either a traditional rule, whose header needs the full
//! protocol/address/port group, or a keyword-only rule (`service`, `file`,
//! `file_id`) that takes no addresses at all.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::templates::escape_msg;
use super::RuleText;
use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Alert,
    Drop,
    Log,
    Pass,
    Block,
    React,
    Reject,
    Rewrite,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Drop => write!(f, "drop"),
            Self::Log => write!(f, "log"),
            Self::Pass => write!(f, "pass"),
            Self::Block => write!(f, "block"),
            Self::React => write!(f, "react"),
            Self::Reject => write!(f, "reject"),
            Self::Rewrite => write!(f, "rewrite"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    #[default]
    Traditional,
    Service,
    File,
    FileId,
}

impl RuleType {
    fn keyword(self) -> Option<&'static str> {
        match self {
            Self::Traditional => None,
            Self::Service => Some("service"),
            Self::File => Some("file"),
            Self::FileId => Some("file_id"),
        }
    }
}

/// One `content` match with its modifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentMatch {
    pub value: String,
    pub fast_pattern: bool,
    pub nocase: bool,
    pub offset: Option<i64>,
    pub depth: Option<u32>,
    pub distance: Option<i64>,
    pub within: Option<u32>,
    pub width: Option<u8>,
    pub endian: Option<String>,
}

impl ContentMatch {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    fn render(&self) -> String {
        let mut segs = vec![format!("content:\"{}\"", escape_msg(&self.value))];
        if self.fast_pattern {
            segs.push("fast_pattern".into());
        }
        if self.nocase {
            segs.push("nocase".into());
        }
        let numeric = [
            ("offset", self.offset),
            ("depth", self.depth.map(i64::from)),
            ("distance", self.distance),
            ("within", self.within.map(i64::from)),
            ("width", self.width.map(i64::from)),
        ];
        for (name, value) in numeric {
            if let Some(v) = value {
                segs.push(format!("{name} {v}"));
            }
        }
        if let Some(endian) = &self.endian {
            segs.push(format!("endian {endian}"));
        }
        segs.join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    #[serde(rename = "type")]
    pub file_type: String,
    pub id: u32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl FileMeta {
    fn render(&self) -> String {
        let mut parts = vec![format!("type {}", self.file_type), format!("id {}", self.id)];
        let optional = [
            ("category", &self.category),
            ("group", &self.group),
            ("version", &self.version),
        ];
        for (name, value) in optional {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                parts.push(format!("{name} \"{}\"", escape_msg(v)));
            }
        }
        format!("file_meta:{}", parts.join(","))
    }
}

/// An open header/option set rendered into a single rule line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnortRule {
    // header
    pub action: Option<Action>,
    pub rule_type: RuleType,
    pub protocol: Option<String>,
    pub src_ip: Option<String>,
    pub src_port: Option<String>,
    pub direction: Option<String>,
    pub dst_ip: Option<String>,
    pub dst_port: Option<String>,

    // general options
    pub msg: Option<String>,
    pub reference: Vec<(String, String)>,
    pub gid: Option<u32>,
    pub sid: Option<u32>,
    pub rev: Option<u32>,
    pub classtype: Option<String>,
    pub priority: Option<u32>,
    pub metadata: BTreeMap<String, String>,
    pub service: Vec<String>,
    pub rem: Option<String>,
    pub file_meta: Option<FileMeta>,

    // payload options
    pub content: Vec<ContentMatch>,
    pub pcre: Vec<String>,
    pub regex: Vec<String>,

    // non-payload options
    pub flow: Vec<String>,
}

impl SnortRule {
    /// A traditional rule with the full header group filled in.
    pub fn traditional(
        action: Action,
        protocol: &str,
        (src_ip, src_port): (&str, &str),
        (dst_ip, dst_port): (&str, &str),
    ) -> Self {
        Self {
            action: Some(action),
            protocol: Some(protocol.into()),
            src_ip: Some(src_ip.into()),
            src_port: Some(src_port.into()),
            dst_ip: Some(dst_ip.into()),
            dst_port: Some(dst_port.into()),
            ..Default::default()
        }
    }

    /// A keyword-only rule (`service`, `file`, `file_id`).
    pub fn keyword(action: Action, rule_type: RuleType) -> Self {
        Self {
            action: Some(action),
            rule_type,
            ..Default::default()
        }
    }

    pub fn build(&self) -> Result<RuleText> {
        self.check_single_line()?;
        let header = self.header()?;
        let opts = self.options();
        let rule = if opts.is_empty() {
            format!("{header} ()")
        } else {
            format!("{header} ({})", opts.join(" "))
        };
        Ok(RuleText::new(rule))
    }

    /// Every text field ends up inside one rule line, so none may carry a
    /// line break or other control character.
    fn check_single_line(&self) -> Result<()> {
        let mut fields: Vec<(&str, &str)> = Vec::new();
        let optional = [
            ("protocol", &self.protocol),
            ("src_ip", &self.src_ip),
            ("src_port", &self.src_port),
            ("direction", &self.direction),
            ("dst_ip", &self.dst_ip),
            ("dst_port", &self.dst_port),
            ("msg", &self.msg),
            ("classtype", &self.classtype),
            ("rem", &self.rem),
        ];
        for (name, value) in optional {
            if let Some(v) = value.as_deref() {
                fields.push((name, v));
            }
        }
        for (scheme, id) in &self.reference {
            fields.extend([("reference", scheme.as_str()), ("reference", id.as_str())]);
        }
        for (key, value) in &self.metadata {
            fields.extend([("metadata", key.as_str()), ("metadata", value.as_str())]);
        }
        for (name, values) in [
            ("service", &self.service),
            ("pcre", &self.pcre),
            ("regex", &self.regex),
            ("flow", &self.flow),
        ] {
            fields.extend(values.iter().map(|v| (name, v.as_str())));
        }
        for content in &self.content {
            fields.push(("content", content.value.as_str()));
            if let Some(endian) = content.endian.as_deref() {
                fields.push(("content", endian));
            }
        }
        if let Some(meta) = &self.file_meta {
            fields.push(("file_meta", meta.file_type.as_str()));
            for v in [&meta.category, &meta.group, &meta.version].into_iter().flatten() {
                fields.push(("file_meta", v.as_str()));
            }
        }

        match fields
            .iter()
            .find(|(_, value)| value.chars().any(char::is_control))
        {
            Some((name, _)) => Err(AgentError::InvalidRule(format!(
                "{name} must not contain line breaks or control characters"
            ))),
            None => Ok(()),
        }
    }

    fn header(&self) -> Result<String> {
        let mut parts: Vec<String> = Vec::new();
        if let Some(action) = self.action {
            parts.push(action.to_string());
        }

        if let Some(keyword) = self.rule_type.keyword() {
            parts.push(keyword.into());
            return Ok(parts.join(" "));
        }

        let field = |name: &'static str, value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .ok_or(name)
        };

        let group = [
            field("protocol", &self.protocol),
            field("src_ip", &self.src_ip),
            field("src_port", &self.src_port),
            field("dst_ip", &self.dst_ip),
            field("dst_port", &self.dst_port),
        ];
        let missing: Vec<&str> = group.iter().filter_map(|f| f.as_ref().err().copied()).collect();
        if !missing.is_empty() {
            return Err(AgentError::InvalidRule(format!(
                "traditional rule is missing header fields: {}",
                missing.join(", ")
            )));
        }
        let [protocol, src_ip, src_port, dst_ip, dst_port] = group.map(|f| f.unwrap_or_default());

        let direction = self.direction.as_deref().unwrap_or("->");
        if direction != "->" && direction != "<>" {
            return Err(AgentError::InvalidRule(format!(
                "direction must be '->' or '<>', got '{direction}'"
            )));
        }

        parts.extend([
            protocol,
            src_ip,
            src_port,
            direction.to_string(),
            dst_ip,
            dst_port,
        ]);
        Ok(parts.join(" "))
    }

    fn options(&self) -> Vec<String> {
        let mut opts: Vec<String> = Vec::new();
        let mut push = |opt: String| opts.push(format!("{opt};"));

        if let Some(msg) = &self.msg {
            push(format!("msg:\"{}\"", escape_msg(msg)));
        }
        for (scheme, id) in &self.reference {
            push(format!("reference:{scheme},{id}"));
        }
        for (name, value) in [("gid", self.gid), ("sid", self.sid), ("rev", self.rev)] {
            if let Some(v) = value {
                push(format!("{name}:{v}"));
            }
        }
        if let Some(classtype) = &self.classtype {
            push(format!("classtype:{classtype}"));
        }
        if let Some(priority) = self.priority {
            push(format!("priority:{priority}"));
        }
        if !self.metadata.is_empty() {
            let pairs: Vec<String> = self
                .metadata
                .iter()
                .map(|(k, v)| format!("{k} {v}"))
                .collect();
            push(format!("metadata:{}", pairs.join(",")));
        }
        if !self.service.is_empty() {
            push(format!("service:{}", self.service.join(",")));
        }
        if let Some(rem) = &self.rem {
            push(format!("rem:\"{}\"", escape_msg(rem)));
        }
        if let Some(file_meta) = &self.file_meta {
            push(file_meta.render());
        }
        for content in &self.content {
            push(content.render());
        }
        for pcre in &self.pcre {
            push(format!("pcre:\"{pcre}\""));
        }
        for regex in &self.regex {
            push(format!("regex:\"{regex}\""));
        }
        if !self.flow.is_empty() {
            push(format!("flow:{}", self.flow.join(",")));
        }

        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn traditional_rule_renders_header_and_options() {
        let mut rule = SnortRule::traditional(
            Action::Alert,
            "tcp",
            ("$EXTERNAL_NET", "any"),
            ("$HOME_NET", "80"),
        );
        rule.msg = Some("Suspicious GET".into());
        rule.sid = Some(1000001);
        rule.rev = Some(2);
        rule.flow = vec!["to_server".into(), "established".into()];
        rule.content = vec![ContentMatch {
            nocase: true,
            offset: Some(0),
            depth: Some(4),
            ..ContentMatch::new("GET ")
        }];

        assert_eq!(
            rule.build().unwrap().as_str(),
            "alert tcp $EXTERNAL_NET any -> $HOME_NET 80 (msg:\"Suspicious GET\"; sid:1000001; rev:2; \
             content:\"GET \",nocase,offset 0,depth 4; flow:to_server,established;)"
        );
    }

    #[test]
    fn missing_header_field_is_rejected() {
        let mut rule =
            SnortRule::traditional(Action::Drop, "udp", ("any", "any"), ("$HOME_NET", "53"));
        rule.dst_port = None;
        rule.src_ip = Some("  ".into());

        let err = rule.build().unwrap_err();
        assert!(matches!(err, AgentError::InvalidRule(_)));
        let text = err.to_string();
        assert!(text.contains("src_ip"));
        assert!(text.contains("dst_port"));
        assert!(!text.contains("protocol"));
    }

    #[test]
    fn line_breaks_are_rejected_in_header_and_options() {
        let base = SnortRule::traditional(Action::Alert, "tcp", ("any", "any"), ("$HOME_NET", "80"));

        let mut header = base.clone();
        header.src_ip = Some("a\nb".into());
        let err = header.build().unwrap_err();
        assert!(matches!(err, AgentError::InvalidRule(_)));
        assert!(err.to_string().contains("src_ip"));

        let mut msg = base.clone();
        msg.msg = Some("x\"; )\nalert ip any any -> any any (sid:1".into());
        assert!(msg.build().is_err());

        let mut content = base.clone();
        content.content = vec![ContentMatch::new("GET\r\n")];
        assert!(content.build().unwrap_err().to_string().contains("content"));

        let mut metadata = base;
        metadata.metadata.insert("policy".into(), "security\nips".into());
        assert!(metadata.build().is_err());
    }

    #[test]
    fn keyword_rule_needs_no_addresses() {
        let mut rule = SnortRule::keyword(Action::Alert, RuleType::Service);
        rule.service = vec!["http".into(), "ssl".into()];
        rule.msg = Some("svc".into());
        assert_eq!(
            rule.build().unwrap().as_str(),
            "alert service (msg:\"svc\"; service:http,ssl;)"
        );
    }

    #[test]
    fn bidirectional_and_invalid_direction() {
        let mut rule = SnortRule::traditional(Action::Log, "ip", ("any", "any"), ("any", "any"));
        rule.direction = Some("<>".into());
        assert_eq!(rule.build().unwrap().as_str(), "log ip any any <> any any ()");

        rule.direction = Some("<-".into());
        assert!(rule.build().is_err());
    }

    #[test]
    fn general_options_in_order() {
        let mut rule = SnortRule::keyword(Action::Alert, RuleType::File);
        rule.reference = vec![("url".into(), "example.com".into())];
        rule.gid = Some(1);
        rule.classtype = Some("trojan-activity".into());
        rule.priority = Some(1);
        rule.metadata.insert("policy".into(), "balanced-ips drop".into());
        rule.rem = Some("internal note".into());
        rule.file_meta = Some(FileMeta {
            file_type: "PE".into(),
            id: 21,
            category: Some("Executables".into()),
            group: None,
            version: None,
        });
        rule.pcre = vec!["/evil\\d+/i".into()];

        assert_eq!(
            rule.build().unwrap().as_str(),
            "alert file (reference:url,example.com; gid:1; classtype:trojan-activity; priority:1; \
             metadata:policy balanced-ips drop; rem:\"internal note\"; \
             file_meta:type PE,id 21,category \"Executables\"; pcre:\"/evil\\d+/i\";)"
        );
    }

    #[test]
    fn deserializes_from_json() {
        let raw = r#"{
            "action": "block",
            "protocol": "tcp",
            "src_ip": "198.51.100.4",
            "src_port": "any",
            "dst_ip": "$HOME_NET",
            "dst_port": "22",
            "msg": "ssh brute force source",
            "reference": [["url", "intel.example/4"]],
            "sid": 9000001
        }"#;
        let rule: SnortRule = serde_json::from_str(raw).unwrap();
        assert_eq!(
            rule.build().unwrap().as_str(),
            "block tcp 198.51.100.4 any -> $HOME_NET 22 (msg:\"ssh brute force source\"; \
             reference:url,intel.example/4; sid:9000001;)"
        );
    }
}
