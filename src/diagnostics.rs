//! Diagnostics reporting.

use std::sync::Arc;

/// A sink for status messages emitted by the rolling machinery.
///
/// Messages are fire-and-forget; nothing in the rolling logic consults a
/// result. Each component receives its own sink reference at construction
/// rather than reporting through a process-wide channel.
pub trait Diagnostics: Send + Sync {
    fn info(&self, msg: &str);
    fn error(&self, msg: &str);
}

impl<T: Diagnostics + ?Sized> Diagnostics for Arc<T> {
    fn info(&self, msg: &str) {
        (**self).info(msg)
    }

    fn error(&self, msg: &str) {
        (**self).error(msg)
    }
}

/// Forwards diagnostics to the `log` facade under the `rollover` target.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct FacadeDiagnostics;

impl Diagnostics for FacadeDiagnostics {
    fn info(&self, msg: &str) {
        log::info!(target: "rollover", "{}", msg);
    }

    fn error(&self, msg: &str) {
        log::error!(target: "rollover", "{}", msg);
    }
}
