use crate::history::Notifications;
use crate::rules::TemplateMetadata;
use crate::store::AppendOutcome;
use crate::Submission;

/// Render a submission result as plain console text.
pub fn render_submission(submission: &Submission) -> String {
    let mut output = String::new();

    match &submission.outcome {
        AppendOutcome::Appended { backup } => {
            output.push_str("  [APPENDED]  ");
            output.push_str(rule_or_dash(submission));
            output.push('\n');
            output.push_str(&format!("              backup: {}\n", backup.display()));
        }
        AppendOutcome::Duplicate => {
            output.push_str("  [DUPLICATE] ");
            output.push_str(rule_or_dash(submission));
            output.push('\n');
        }
        AppendOutcome::Skipped => {
            output.push_str("  [SKIPPED]   no rule produced for this submission\n");
        }
    }

    output
}

fn rule_or_dash(submission: &Submission) -> &str {
    submission.rule.as_ref().map(|r| r.as_str()).unwrap_or("-")
}

/// Render the notifications view, newest first.
pub fn render_notifications(notifications: Option<&Notifications>) -> String {
    let Some(notes) = notifications else {
        return "\n  No notifications found.\n\n".into();
    };

    let mut output = format!("\n  {} accepted submission(s)\n\n", notes.total);
    output.push_str("  Latest:\n");
    output.push_str(&format!(
        "    {}  {}\n",
        notes.latest.received_at.format("%Y-%m-%d %H:%M:%S UTC"),
        notes.latest.rule
    ));

    if !notes.previous.is_empty() {
        output.push_str("\n  Earlier:\n");
        for entry in &notes.previous {
            output.push_str(&format!(
                "    {}  {}\n",
                entry.received_at.format("%Y-%m-%d %H:%M:%S UTC"),
                entry.rule
            ));
        }
    }
    output.push('\n');
    output
}

/// Render the template table.
pub fn render_templates(templates: &[TemplateMetadata]) -> String {
    let mut output = format!(
        "{:<16} {:<7} {:<9} {:<5} DEFAULT MESSAGE\n",
        "COMMAND", "ACTION", "PROTOCOL", "DST"
    );
    output.push_str(&format!("{}\n", "-".repeat(80)));
    for t in templates {
        output.push_str(&format!(
            "{:<16} {:<7} {:<9} {:<5} {}\n",
            t.command.as_deref().unwrap_or("(text/plain)"),
            t.action,
            t.protocol,
            t.dst_port,
            t.default_message,
        ));
    }
    output
}
