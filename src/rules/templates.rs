//! Fixed rule templates.
//!
//! Every template renders one line of the shape
//! `<action> <protocol> <src> any -> $HOME_NET <dst> (msg:"<msg>"; <opt>; ... )`.
//! A custom message replaces the default text; every other field is fixed.

use super::{RuleText, TemplateId, TemplateMetadata};

pub const HOME_NET: &str = "$HOME_NET";

/// Signature ID shared by the IP alert templates.
pub const ALERT_IP_SID: u32 = 28154103;

/// Reference attached to the IP alert templates.
pub const REFERENCE_URL: &str = "https://misp.gsma.com/events/view/19270";

struct Header<'a> {
    action: &'static str,
    protocol: &'static str,
    src: &'a str,
    dst_port: &'static str,
}

fn render(header: Header<'_>, msg: &str, options: &[String]) -> RuleText {
    let mut rule = format!(
        "{} {} {} any -> {} {} (",
        header.action, header.protocol, header.src, HOME_NET, header.dst_port
    );
    rule.push_str(&format!("msg:\"{}\"; ", escape_msg(msg)));
    for opt in options {
        rule.push_str(opt);
        rule.push_str("; ");
    }
    rule.push(')');
    RuleText::new(rule)
}

fn alert_ip_options() -> Vec<String> {
    vec![
        "classtype:tcp-connection".into(),
        format!("sid:{ALERT_IP_SID}"),
        "rev:1".into(),
        format!("reference:url,{REFERENCE_URL}"),
    ]
}

/// Escape characters that would terminate the `msg` option early.
pub fn escape_msg(msg: &str) -> String {
    let mut out = String::with_capacity(msg.len());
    for c in msg.chars() {
        if matches!(c, '\\' | '"' | ';') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Hex-encode a domain as space-separated byte pairs, e.g. `ab` -> `61 62`.
pub fn to_hex(domain: &str) -> String {
    domain
        .bytes()
        .map(|b| hex::encode([b]))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn block_ip(target: &str, msg: Option<&str>) -> RuleText {
    let default = format!("Block traffic From IP {target}");
    render(
        Header {
            action: "block",
            protocol: "http",
            src: target,
            dst_port: "any",
        },
        msg.unwrap_or(&default),
        &[],
    )
}

pub fn block_icmp(target: &str, msg: Option<&str>) -> RuleText {
    let default = format!("Block icmp From IP {target}");
    render(
        Header {
            action: "block",
            protocol: "icmp",
            src: target,
            dst_port: "any",
        },
        msg.unwrap_or(&default),
        &[],
    )
}

pub fn alert_icmp(target: &str, msg: Option<&str>) -> RuleText {
    let default = format!("Alert icmp From IP {target}");
    render(
        Header {
            action: "alert",
            protocol: "icmp",
            src: target,
            dst_port: "any",
        },
        msg.unwrap_or(&default),
        &[],
    )
}

pub fn alert_ip(target: &str, msg: Option<&str>) -> RuleText {
    let default = format!("IP Alert Incoming From IP {target}");
    render(
        Header {
            action: "alert",
            protocol: "ip",
            src: target,
            dst_port: "any",
        },
        msg.unwrap_or(&default),
        &alert_ip_options(),
    )
}

/// Matches the domain as raw bytes in the TLS handshake (SNI).
pub fn block_domain(domain: &str, msg: Option<&str>) -> RuleText {
    let default = format!("Block domain {domain}");
    render(
        Header {
            action: "block",
            protocol: "ssl",
            src: "any",
            dst_port: "443",
        },
        msg.unwrap_or(&default),
        &[format!("content:\"|{}|\"", to_hex(domain))],
    )
}

/// Alert line produced for addresses found in plain-text submissions.
///
/// Byte-compatible with rule files written by earlier agents: `msg: "` with a
/// space, and a closing `;)`.
pub fn indicator_alert(target: &str, msg: Option<&str>) -> RuleText {
    let default = format!("IP Alert Incoming From IP: {target}");
    let msg = escape_msg(msg.unwrap_or(&default));
    RuleText::new(format!(
        "alert ip {target} any -> {HOME_NET} any (msg: \"{msg}\"; {};)",
        alert_ip_options().join("; ")
    ))
}

pub fn metadata(id: TemplateId) -> TemplateMetadata {
    let (action, protocol, dst_port, default_message) = match id {
        TemplateId::BlockIp => ("block", "http", "any", "Block traffic From IP <target>"),
        TemplateId::BlockIcmp => ("block", "icmp", "any", "Block icmp From IP <target>"),
        TemplateId::AlertIcmp => ("alert", "icmp", "any", "Alert icmp From IP <target>"),
        TemplateId::AlertIp => ("alert", "ip", "any", "IP Alert Incoming From IP <target>"),
        TemplateId::BlockDomain => ("block", "ssl", "443", "Block domain <target>"),
        TemplateId::IndicatorAlert => ("alert", "ip", "any", "IP Alert Incoming From IP: <target>"),
    };
    TemplateMetadata {
        id,
        command: id.command().map(String::from),
        action: action.into(),
        protocol: protocol.into(),
        dst_port: dst_port.into(),
        default_message: default_message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn block_ip_default_message() {
        assert_eq!(
            block_ip("1.2.3.4", None).as_str(),
            "block http 1.2.3.4 any -> $HOME_NET any (msg:\"Block traffic From IP 1.2.3.4\"; )"
        );
    }

    #[test]
    fn block_icmp_and_alert_icmp() {
        assert_eq!(
            block_icmp("10.45.0.3", None).as_str(),
            "block icmp 10.45.0.3 any -> $HOME_NET any (msg:\"Block icmp From IP 10.45.0.3\"; )"
        );
        assert_eq!(
            alert_icmp("10.45.0.3", None).as_str(),
            "alert icmp 10.45.0.3 any -> $HOME_NET any (msg:\"Alert icmp From IP 10.45.0.3\"; )"
        );
    }

    #[test]
    fn alert_ip_carries_fixed_options() {
        let rule = alert_ip("1.2.3.4", None);
        assert_eq!(
            rule.as_str(),
            "alert ip 1.2.3.4 any -> $HOME_NET any (msg:\"IP Alert Incoming From IP 1.2.3.4\"; \
             classtype:tcp-connection; sid:28154103; rev:1; \
             reference:url,https://misp.gsma.com/events/view/19270; )"
        );
    }

    #[test]
    fn alert_ip_custom_message_keeps_options() {
        let rule = alert_ip("1.2.3.4", Some("seen in campaign 7"));
        let text = rule.as_str();
        assert!(text.contains("msg:\"seen in campaign 7\";"));
        assert!(text.contains("sid:28154103;"));
        assert!(text.contains("rev:1;"));
        assert!(text.contains(REFERENCE_URL));
        assert!(!text.contains("IP Alert Incoming"));
    }

    #[test]
    fn block_domain_hex_content() {
        let rule = block_domain("evil.example", None);
        assert!(rule
            .as_str()
            .contains("content:\"|65 76 69 6c 2e 65 78 61 6d 70 6c 65|\""));
        assert!(rule.as_str().starts_with("block ssl any any -> $HOME_NET 443 ("));
        assert!(rule.as_str().contains("msg:\"Block domain evil.example\";"));
    }

    #[test]
    fn to_hex_matches_reference_domain() {
        assert_eq!(
            to_hex("training.testserver.gr"),
            "74 72 61 69 6e 69 6e 67 2e 74 65 73 74 73 65 72 76 65 72 2e 67 72"
        );
        assert_eq!(to_hex(""), "");
    }

    #[test]
    fn indicator_alert_line() {
        assert_eq!(
            indicator_alert("203.0.113.7", None).as_str(),
            "alert ip 203.0.113.7 any -> $HOME_NET any (msg: \"IP Alert Incoming From IP: 203.0.113.7\"; \
             classtype:tcp-connection; sid:28154103; rev:1; \
             reference:url,https://misp.gsma.com/events/view/19270;)"
        );
    }

    #[test]
    fn message_cannot_break_out_of_msg() {
        let rule = block_ip("1.2.3.4", Some("x\"; sid:1; msg:\"y"));
        assert!(rule.as_str().contains("msg:\"x\\\"\\; sid:1\\; msg:\\\"y\";"));
    }

    #[test]
    fn metadata_matches_commands() {
        let meta = metadata(TemplateId::BlockDomain);
        assert_eq!(meta.command.as_deref(), Some("block_domain"));
        assert_eq!(meta.dst_port, "443");
        assert!(metadata(TemplateId::IndicatorAlert).command.is_none());
    }
}
