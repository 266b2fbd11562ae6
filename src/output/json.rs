use serde::Serialize;

use crate::error::Result;
use crate::history::Notifications;

pub fn render<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_string_pretty(value)?;
    Ok(json)
}

#[derive(Serialize)]
struct Dashboard<'a> {
    message: &'static str,
    notifications: Option<&'a Notifications>,
}

/// Render the notifications view as a dashboard document.
pub fn render_notifications(notifications: Option<&Notifications>) -> Result<String> {
    let message = if notifications.is_some() {
        "Dashboard is ready"
    } else {
        "No notifications found"
    };
    render(&Dashboard {
        message,
        notifications,
    })
}
