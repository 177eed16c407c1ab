//! Retention of elapsed log files.

/// A collaborator that archives, compresses, or deletes log files whose
/// period has elapsed.
///
/// The owning writer calls [`invoke`](RetentionSweep::invoke) with the
/// elapsed period's rendered file name immediately after a trigger reports
/// a crossing, on the thread that won the crossing and before that thread
/// appends again. Retention policy parameters (count, size, or age based)
/// are the implementor's concern.
pub trait RetentionSweep: Send + Sync {
    fn invoke(&self, elapsed_file_name: &str);
}
