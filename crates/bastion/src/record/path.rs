//! Where recordings go.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

use crate::error::{BastionError, Result};

/// Prefix of every recording file name.
pub const FILE_PREFIX: &str = "ttyrecord-";

/// Timestamp layout of recording file names (local time, second granularity).
pub const FILE_TIME_FORMAT: &str = "%FT%T%z";

/// Permission bits of new recording files.
pub const FILE_MODE: u32 = 0o644;

/// Recording path for a session started at `started`.
///
/// Two sessions started within the same second map to the same path.
#[must_use]
pub fn recording_path<Tz>(dir: &Path, started: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    dir.join(format!("{FILE_PREFIX}{}", started.format(FILE_TIME_FORMAT)))
}

/// Open a recording for writing, creating or truncating it.
pub fn open_recording(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(FILE_MODE)
        .open(path)
        .map_err(|source| BastionError::RecordingOpen {
            path: path.to_path_buf(),
            source,
        })
}
