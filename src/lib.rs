//! Time-based rollover triggering for rolling log files.
//!
//! This crate decides *when* a rolling log file's current time period has
//! elapsed and *what* the elapsed period's file identity is, exactly once per
//! boundary and without locking the logging hot path. Many appender threads
//! may ask the question concurrently on every log event; a single atomic
//! compare-and-set on the deadline arbitrates the crossing, so exactly one
//! caller performs the rollover and the rest continue untouched.
//!
//! The crate does not write log content and does not delete or compress
//! archives. Those belong to the owning writer and its retention
//! collaborator, which consumes the elapsed period's rendered file name
//! after each crossing.
//!
//! # Examples
//!
//! ```
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use rollover::diagnostics::FacadeDiagnostics;
//! use rollover::pattern::Pattern;
//! use rollover::trigger::time::{PathProbe, TimeBasedState, TimeBasedTrigger};
//! use rollover::trigger::{LogFile, Trigger};
//!
//! # fn main() -> anyhow::Result<()> {
//! let pattern = Pattern::new("app-{d(%Y-%m-%d)}.log.gz")?;
//! let state = Arc::new(TimeBasedState::new(
//!     Arc::new(pattern),
//!     Box::new(PathProbe::new("app.log")),
//!     Box::new(FacadeDiagnostics),
//! ));
//! let trigger = TimeBasedTrigger::new(state);
//! trigger.activate()?;
//!
//! let file = LogFile::new(Path::new("app.log"), 0);
//! if trigger.trigger(&file)? {
//!     // roll the active file, then hand
//!     // trigger.elapsed_periods_file_name() to the retention sweep
//! }
//! # Ok(())
//! # }
//! ```

pub mod calendar;
pub mod clock;
pub mod diagnostics;
pub mod pattern;
pub mod retention;
pub mod trigger;

pub use crate::calendar::{CalendarError, Periodicity, RollingCalendar};
pub use crate::clock::Clock;
pub use crate::diagnostics::{Diagnostics, FacadeDiagnostics};
pub use crate::pattern::{DateToken, FileNamePattern, Pattern, PatternError};
pub use crate::retention::RetentionSweep;
pub use crate::trigger::time::{
    ActivationError, ActiveFileProbe, PathProbe, TimeBasedState, TimeBasedTrigger,
};
pub use crate::trigger::{LogFile, Trigger};
