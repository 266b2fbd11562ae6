pub mod console;
pub mod json;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::history::Notifications;
use crate::rules::TemplateMetadata;
use crate::Submission;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Console,
    Json,
}

impl OutputFormat {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "console" | "text" | "table" => Some(Self::Console),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Render the result of one submission.
pub fn render_submission(submission: &Submission, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Console => Ok(console::render_submission(submission)),
        OutputFormat::Json => json::render(submission),
    }
}

/// Render the notifications view. `None` means nothing was recorded yet.
pub fn render_notifications(
    notifications: Option<&Notifications>,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Console => Ok(console::render_notifications(notifications)),
        OutputFormat::Json => json::render_notifications(notifications),
    }
}

pub fn render_templates(templates: &[TemplateMetadata], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Console => Ok(console::render_templates(templates)),
        OutputFormat::Json => json::render(templates),
    }
}
