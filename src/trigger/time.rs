//! The time-based trigger.
//!
//! Decides when the active log file's time period has elapsed, exactly once
//! per period boundary, under concurrent appenders. The shared state lives
//! in [`TimeBasedState`]; [`TimeBasedTrigger`] layers the per-event decision
//! on top of it. Alternate policies (such as one that also honors a size
//! cap) can compose the same state.

use std::convert::TryFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use arc_swap::ArcSwapOption;
use chrono::{LocalResult, TimeZone, Utc};
use derivative::Derivative;
use parking_lot::RwLock;
use thiserror::Error;

use crate::calendar::{CalendarError, RollingCalendar};
use crate::clock::Clock;
use crate::diagnostics::Diagnostics;
use crate::pattern::FileNamePattern;
use crate::trigger::{LogFile, Trigger};

/// A configuration problem detected while activating a time-based trigger.
///
/// All of these are fatal to the instance: it stays not ready and its
/// trigger check keeps returning `false`. None of them abort the host
/// process; the owning writer must decline to roll files over instead.
#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("file name pattern [{pattern}] does not contain a date token")]
    MissingDateToken { pattern: String },
    #[error("date format [{format}] will produce colliding archive file names")]
    CollidingDateFormat { format: String },
    #[error("date format [{format}] has no usable period granularity")]
    UnsupportedGranularity { format: String },
    #[error(
        "file name pattern [{pattern}] contains an integer token, \
         incompatible with time-based triggering"
    )]
    IntegerTokenIncompatible { pattern: String },
}

/// Activation-time view of the active log file, used to recover the
/// in-progress period after a restart.
pub trait ActiveFileProbe: Send + Sync {
    /// True when the file exists and is readable.
    fn exists(&self) -> bool;

    /// The file's last-modified time in epoch milliseconds.
    fn last_modified_millis(&self) -> Option<i64>;
}

/// Probes a file on the local filesystem.
#[derive(Clone, Debug)]
pub struct PathProbe {
    path: PathBuf,
}

impl PathProbe {
    pub fn new<P: AsRef<Path>>(path: P) -> PathProbe {
        PathProbe {
            path: path.as_ref().to_owned(),
        }
    }
}

impl ActiveFileProbe for PathProbe {
    fn exists(&self) -> bool {
        std::fs::metadata(&self.path)
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    fn last_modified_millis(&self) -> Option<i64> {
        let modified = std::fs::metadata(&self.path).ok()?.modified().ok()?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
        i64::try_from(since_epoch.as_millis()).ok()
    }
}

/// Shared state of the time-based triggering policies.
///
/// Holds the period the system believes is current, the deadline that
/// arbitrates crossings, the clock, and the calendar derived at activation.
/// `next_check` is the single field requiring atomic discipline; the
/// crossing-local fields are written only by the caller that wins a
/// crossing's compare-and-set.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TimeBasedState {
    #[derivative(Debug = "ignore")]
    pattern: Arc<dyn FileNamePattern>,
    #[derivative(Debug = "ignore")]
    active_file: Box<dyn ActiveFileProbe>,
    #[derivative(Debug = "ignore")]
    diagnostics: Box<dyn Diagnostics>,
    clock: Clock,
    calendar: RwLock<Option<RollingCalendar>>,
    next_check: AtomicI64,
    current_period_start: AtomicI64,
    elapsed_periods_file_name: ArcSwapOption<String>,
    ready: AtomicBool,
}

impl TimeBasedState {
    pub fn new(
        pattern: Arc<dyn FileNamePattern>,
        active_file: Box<dyn ActiveFileProbe>,
        diagnostics: Box<dyn Diagnostics>,
    ) -> TimeBasedState {
        TimeBasedState {
            pattern,
            active_file,
            diagnostics,
            clock: Clock::new(),
            calendar: RwLock::new(None),
            next_check: AtomicI64::new(0),
            current_period_start: AtomicI64::new(0),
            elapsed_periods_file_name: ArcSwapOption::const_empty(),
            ready: AtomicBool::new(false),
        }
    }

    /// Validates the naming pattern, recovers the in-progress period, and
    /// computes the first deadline.
    ///
    /// When the active file already exists, its last-modified time seeds the
    /// current period, so a writer restarted mid-period resumes that period
    /// instead of opening a fresh one. Any failure is reported through the
    /// diagnostics sink and leaves the state permanently not ready; there is
    /// no retry, the configuration must be fixed and the writer restarted.
    pub fn activate(&self) -> Result<(), ActivationError> {
        let token = match self.pattern.primary_date_token() {
            Some(token) => token,
            None => {
                return Err(self.refuse(ActivationError::MissingDateToken {
                    pattern: self.pattern.text().to_owned(),
                }))
            }
        };

        let calendar = match RollingCalendar::new(&token) {
            Ok(calendar) => calendar,
            Err(CalendarError::UnsupportedGranularity { format }) => {
                return Err(self.refuse(ActivationError::UnsupportedGranularity { format }))
            }
        };
        self.diagnostics.info(&format!(
            "date format '{}' from file name pattern '{}' rolls over {}",
            token.date_format,
            self.pattern.text(),
            calendar.periodicity().describe(),
        ));

        if !calendar.is_collision_free() {
            return Err(self.refuse(ActivationError::CollidingDateFormat {
                format: token.date_format,
            }));
        }

        let mut timestamp = self.clock.now_millis();
        if self.active_file.exists() {
            if let Some(modified) = self.active_file.last_modified_millis() {
                timestamp = modified;
            }
        }
        self.current_period_start.store(timestamp, Ordering::SeqCst);
        self.diagnostics.info(&format!(
            "initial period starts at {}",
            describe_instant(timestamp)
        ));

        self.next_check
            .store(calendar.next_period_start(timestamp), Ordering::SeqCst);
        *self.calendar.write() = Some(calendar);
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Marks the state not ready; safe to call repeatedly.
    pub fn deactivate(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// The start of the period following `millis`, or `None` before
    /// activation. Pure delegation to the calendar; no state changes.
    pub fn compute_next_check(&self, millis: i64) -> Option<i64> {
        self.calendar
            .read()
            .as_ref()
            .map(|calendar| calendar.next_period_start(millis))
    }

    /// The in-progress file name, rendered without any compression suffix.
    pub fn current_period_name(&self) -> Option<String> {
        if !self.is_ready() {
            return None;
        }
        let start = self.current_period_start.load(Ordering::SeqCst);
        Some(self.pattern.render_without_compression_suffix(start))
    }

    /// The rendered name of the most recently elapsed period, if a crossing
    /// has occurred. The owning writer hands it to the retention sweep
    /// before the next crossing overwrites it.
    pub fn elapsed_periods_file_name(&self) -> Option<String> {
        self.elapsed_periods_file_name
            .load_full()
            .map(|name| (*name).clone())
    }

    /// Forces the clock to report `millis` until cleared. Test hook.
    pub fn set_simulated_time(&self, millis: i64) {
        self.clock.set_simulated(millis);
    }

    /// Returns authority to the wall clock.
    pub fn clear_simulated_time(&self) {
        self.clock.clear_simulated();
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    fn refuse(&self, err: ActivationError) -> ActivationError {
        self.diagnostics.error(&err.to_string());
        err
    }
}

/// A trigger which rolls the log once the active file's time period
/// elapses.
///
/// The per-append check is a clock read and one atomic load. The deadline
/// advances by compare-and-set, so exactly one caller claims each period
/// crossing and captures the elapsed period's file name; every other
/// concurrent caller returns `false` with no side effects. A system clock
/// that jumps backward is not detected: it only delays the next crossing
/// until the wall clock passes the stored deadline again.
#[derive(Debug)]
pub struct TimeBasedTrigger {
    state: Arc<TimeBasedState>,
}

impl TimeBasedTrigger {
    /// Returns a new trigger over `state`. The trigger is inert until
    /// [`activate`](TimeBasedTrigger::activate) succeeds.
    pub fn new(state: Arc<TimeBasedState>) -> TimeBasedTrigger {
        TimeBasedTrigger { state }
    }

    /// Runs the shared activation sequence plus this policy's own
    /// precondition: a pattern carrying an `{i}` token belongs to the
    /// size-and-index policy family and cannot drive purely time-based
    /// rollover.
    pub fn activate(&self) -> Result<(), ActivationError> {
        if self.state.pattern.has_integer_token() {
            return Err(self
                .state
                .refuse(ActivationError::IntegerTokenIncompatible {
                    pattern: self.state.pattern.text().to_owned(),
                }));
        }
        self.state.activate()
    }

    /// Marks the trigger not ready; safe to call repeatedly.
    pub fn deactivate(&self) {
        self.state.deactivate();
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// The in-progress file name, rendered without any compression suffix.
    pub fn current_period_name(&self) -> Option<String> {
        self.state.current_period_name()
    }

    /// The rendered name of the most recently elapsed period, if any.
    pub fn elapsed_periods_file_name(&self) -> Option<String> {
        self.state.elapsed_periods_file_name()
    }

    /// Forces the clock to report `millis` until cleared. Test hook.
    pub fn set_simulated_time(&self, millis: i64) {
        self.state.set_simulated_time(millis);
    }

    /// Returns authority to the wall clock.
    pub fn clear_simulated_time(&self) {
        self.state.clear_simulated_time();
    }
}

impl Trigger for TimeBasedTrigger {
    fn trigger(&self, _file: &LogFile) -> anyhow::Result<bool> {
        let state = &*self.state;
        if !state.is_ready() {
            return Ok(false);
        }
        let now = state.clock.now_millis();
        let next_check = state.next_check.load(Ordering::SeqCst);
        if now < next_check {
            return Ok(false);
        }
        let candidate = match state.compute_next_check(now) {
            Some(candidate) => candidate,
            None => return Ok(false),
        };
        if state
            .next_check
            .compare_exchange(next_check, candidate, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // another appender thread claimed this crossing
            return Ok(false);
        }
        let elapsed = state.current_period_start.load(Ordering::SeqCst);
        state.diagnostics.info(&format!(
            "elapsed period started at {}",
            describe_instant(elapsed)
        ));
        state.elapsed_periods_file_name.store(Some(Arc::new(
            state.pattern.render_without_compression_suffix(elapsed),
        )));
        state.current_period_start.store(now, Ordering::SeqCst);
        Ok(true)
    }
}

fn describe_instant(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis) {
        LocalResult::Single(ts) => ts.to_rfc3339(),
        _ => millis.to_string(),
    }
}
