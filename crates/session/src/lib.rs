//! Player Session: everything one connected player does to the world.
//!
//! # Invariants
//! - Single writer: every mutation goes through `&mut Session`.
//! - At most one purchase/build is in flight.
//! - World state changes only after a confirmed receipt matches the pending
//!   intent that produced the transaction.
//! - Every failed action leaves the world untouched and emits an error notice.

pub mod config;
pub mod error;
pub mod intent;
pub mod notify;
pub mod selection;
pub mod session;

pub use config::{ConfigError, FundingSource, WorldBuilderConfig};
pub use error::ActionError;
pub use intent::{IntentAction, PendingIntent};
pub use notify::{Notice, NoticeKind, Notifier, RecordingNotifier, TracingNotifier};
pub use selection::Selection;
pub use session::{Accounts, PollOutcome, Session};
