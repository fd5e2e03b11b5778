//! Offline replay of recordings.
//!
//! A [`Timeline`] turns a recording into [`ReplayItem`]s, skipping
//! heartbeats and stopping at the first malformed entry. [`render`] writes
//! a timeline as banner lines followed by the raw payload, optionally
//! coloured by direction.

use std::io::{self, Read, Write};

use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};

use crate::error::RecordError;
use crate::record::path::FILE_TIME_FORMAT;
use crate::record::{EntryKind, RecordReader, Timestamp};

/// Which banner introduces an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    /// Shell output.
    ServerToClient,
    /// Client input.
    ClientToServer,
    /// Session metadata.
    SessionStart,
    /// Exit status and counters.
    SessionEnd,
}

impl Banner {
    /// Banner for an entry kind; `None` for kinds with no banner.
    #[must_use]
    pub const fn for_kind(kind: EntryKind) -> Option<Self> {
        match kind {
            EntryKind::ServerToClient => Some(Self::ServerToClient),
            EntryKind::ClientToServer => Some(Self::ClientToServer),
            EntryKind::SessionStart => Some(Self::SessionStart),
            EntryKind::SessionExit => Some(Self::SessionEnd),
            _ => None,
        }
    }

    /// Banner text before the timestamp.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ServerToClient => "server->client",
            Self::ClientToServer => "client->server",
            Self::SessionStart => "session start",
            Self::SessionEnd => "session end",
        }
    }

    /// Background colour of the banner line.
    #[must_use]
    pub const fn background(self) -> Color {
        match self {
            Self::ServerToClient => Color::DarkRed,
            Self::ClientToServer => Color::DarkBlue,
            Self::SessionStart | Self::SessionEnd => Color::DarkGreen,
        }
    }
}

/// One displayable event of a recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayItem {
    /// An entry shown as a banner plus its payload.
    Entry {
        /// Banner style.
        banner: Banner,
        /// When the event was recorded.
        timestamp: Timestamp,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
    /// An entry whose kind has no rendering.
    Unknown {
        /// The wire code.
        code: i32,
        /// When the event was recorded.
        timestamp: Timestamp,
    },
}

/// Replay events of a recording, in order.
#[derive(Debug)]
pub struct Timeline<R> {
    reader: RecordReader<R>,
    heartbeats: u64,
    stopped: Option<RecordError>,
}

impl<R: Read> Timeline<R> {
    /// Build a timeline over a reader.
    pub const fn new(reader: RecordReader<R>) -> Self {
        Self {
            reader,
            heartbeats: 0,
            stopped: None,
        }
    }

    /// Heartbeats skipped so far.
    #[must_use]
    pub const fn heartbeats(&self) -> u64 {
        self.heartbeats
    }

    /// The error that ended the timeline early, if any.
    #[must_use]
    pub const fn stopped_by(&self) -> Option<&RecordError> {
        self.stopped.as_ref()
    }

    /// Take the error that ended the timeline early.
    pub fn take_error(&mut self) -> Option<RecordError> {
        self.stopped.take()
    }
}

impl<R: Read> Iterator for Timeline<R> {
    type Item = ReplayItem;

    fn next(&mut self) -> Option<ReplayItem> {
        loop {
            let entry = match self.reader.next_entry() {
                Ok(Some(entry)) => entry,
                Ok(None) => return None,
                Err(e) => {
                    tracing::debug!(error = %e, offset = self.reader.offset(), "replay stopped");
                    self.stopped = Some(e);
                    return None;
                }
            };

            if entry.kind == EntryKind::None {
                self.heartbeats += 1;
                continue;
            }

            return Some(match Banner::for_kind(entry.kind) {
                Some(banner) => ReplayItem::Entry {
                    banner,
                    timestamp: entry.timestamp,
                    payload: entry.payload,
                },
                None => ReplayItem::Unknown {
                    code: entry.kind.code(),
                    timestamp: entry.timestamp,
                },
            });
        }
    }
}

/// Counts from a finished replay.
#[derive(Debug, Default)]
pub struct ReplaySummary {
    /// Entries rendered with a banner.
    pub rendered: u64,
    /// Entries reported as unknown.
    pub unknown: u64,
    /// Heartbeats skipped.
    pub heartbeats: u64,
    /// Why the replay ended before the end of the log, if it did.
    pub malformed: Option<RecordError>,
}

/// Format a timestamp the way banners show it: local time, second
/// granularity. Out-of-range values fall back to raw seconds.
#[must_use]
pub fn format_timestamp(timestamp: Timestamp) -> String {
    timestamp.to_local().map_or_else(
        || timestamp.secs.to_string(),
        |local| local.format(FILE_TIME_FORMAT).to_string(),
    )
}

fn write_banner<W: Write>(out: &mut W, banner: Banner, title: &str, colored: bool) -> io::Result<()> {
    if colored {
        queue!(
            out,
            SetForegroundColor(Color::White),
            SetBackgroundColor(banner.background()),
            Print(title),
            Clear(ClearType::UntilNewLine),
            ResetColor,
            Print("\n"),
        )
    } else {
        writeln!(out, "{title}")
    }
}

/// Render every item of `timeline` to `out`.
///
/// Malformed data ends the replay without an error; it is reported in the
/// summary only. Errors writing to `out` are returned.
pub fn render<R: Read, W: Write>(
    mut timeline: Timeline<R>,
    out: &mut W,
    colored: bool,
) -> io::Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for item in timeline.by_ref() {
        match item {
            ReplayItem::Entry {
                banner,
                timestamp,
                payload,
            } => {
                let title = format!("{} {}", banner.label(), format_timestamp(timestamp));
                write_banner(out, banner, &title, colored)?;
                out.write_all(&payload)?;
                out.write_all(b"\n")?;
                summary.rendered += 1;
            }
            ReplayItem::Unknown { code, .. } => {
                writeln!(out, "unknown entry type {code}")?;
                summary.unknown += 1;
            }
        }
    }

    out.flush()?;
    summary.heartbeats = timeline.heartbeats();
    summary.malformed = timeline.take_error();
    Ok(summary)
}
