use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::{AgentError, Result};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// `<stem>-<timestamp>.bak`, or `<stem>-<timestamp>-<n>.bak` when that name
/// was already taken within the same second.
pub fn backup_name(stem: &str, at: &DateTime<Local>, attempt: u32) -> String {
    let ts = at.format(TIMESTAMP_FORMAT);
    if attempt == 0 {
        format!("{stem}-{ts}.bak")
    } else {
        format!("{stem}-{ts}-{attempt}.bak")
    }
}

/// Write `contents` as a new backup of `rules_file` into `backup_dir`.
///
/// Never overwrites an existing backup.
pub fn write_backup(
    rules_file: &Path,
    backup_dir: &Path,
    contents: &[u8],
    at: &DateTime<Local>,
) -> Result<PathBuf> {
    fs::create_dir_all(backup_dir).map_err(AgentError::storage(backup_dir))?;

    let stem = rules_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rules".into());

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let path = backup_dir.join(backup_name(&stem, at, attempt));
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(AgentError::storage(&path)(e)),
        };
        file.write_all(contents)
            .and_then(|_| file.sync_all())
            .map_err(AgentError::storage(&path))?;
        return Ok(path);
    }

    Err(AgentError::storage(backup_dir)(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free backup name for {stem} after {MAX_NAME_ATTEMPTS} attempts"),
    )))
}
