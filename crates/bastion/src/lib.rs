//! bastion: transparent recording relay for interactive SSH sessions
//!
//! The bastion runs as the login shell `sshd` starts. It launches the real
//! shell on a fresh pseudo-terminal, relays every byte between the client
//! and that shell, and appends each chunk to a binary recording with its
//! direction and timestamp. `ttyreplay` renders a recording afterwards.
//!
//! # Features
//!
//! - **Single-threaded relay** on a current-thread Tokio runtime
//! - **Window size propagation** from the client's terminal to the shell
//! - **Interrupt forwarding** to the shell's foreground process group
//! - **Binary recording format** with a length-checked sequential reader
//! - **Replay timeline** rendered with direction-coloured banners
//!
//! # Example
//!
//! ```ignore
//! use bastion::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), BastionError> {
//!     let config = BastionConfig::from_env();
//!     let request = SessionRequest::from_args(&config, std::env::args_os());
//!     let outcome = bastion::session::run(&config, &request).await?;
//!     std::process::exit(outcome.exit_code());
//! }
//! ```

#![cfg(unix)]

pub mod config;
pub mod error;
pub mod interrupt;
pub mod logging;
pub mod prelude;
pub mod record;
pub mod replay;
pub mod resize;
pub mod session;
pub mod terminal;

pub use config::BastionConfig;
pub use error::{BastionError, RecordError, Result};
pub use record::{Entry, EntryKind, RecordReader, Recorder, SessionMetadata, Timestamp};
pub use replay::{ReplayItem, Timeline};
pub use session::{SessionOutcome, SessionRequest};
