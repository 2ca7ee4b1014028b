//! Run status & exit codes.

use confsync::ReplicationReport;

/// The final status of a successful CLI invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// Every requested operation succeeded.
    Complete,
    /// The run completed, but at least one target worker group was skipped.
    Partial,
}

impl RunStatus {
    /// The status of a completed replication run.
    ///
    /// A run where every worker group was skipped is still `Partial`, as it completed without a
    /// fatal error.
    pub fn from_report(report: &ReplicationReport) -> Self {
        if report.all_succeeded() {
            Self::Complete
        } else {
            Self::Partial
        }
    }

    /// The process exit code for this status.
    ///
    /// Fatal errors exit with `1` when returned from `main`, so partial runs use `2`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Complete => 0,
            Self::Partial => 2,
        }
    }
}
