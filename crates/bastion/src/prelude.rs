//! Convenient imports.
//!
//! ```ignore
//! use bastion::prelude::*;
//! ```

pub use crate::config::BastionConfig;
pub use crate::error::{BastionError, RecordError, Result};
pub use crate::record::{Entry, EntryKind, RecordReader, Recorder, SessionMetadata, Timestamp};
pub use crate::replay::{ReplayItem, Timeline, render};
pub use crate::session::{SessionOutcome, SessionRequest};
