//! Message types for the check-in actor

use tokio::sync::oneshot;

/// Summary of one check-in cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Timestamp (unix seconds) carried by every point of the cycle
    pub timestamp: i64,

    /// Number of submission tasks spawned
    pub dispatched: usize,

    /// Size of the fleet snapshot the cycle iterated over
    pub hosts: usize,
}

/// Commands that can be sent to a CheckInActor
#[derive(Debug)]
pub enum CheckInCommand {
    /// Run a cycle right away, independent of the interval timer
    CheckInNow {
        respond_to: oneshot::Sender<CycleReport>,
    },

    /// Stop between cycles and wait for in-flight submissions to finish
    Shutdown { respond_to: oneshot::Sender<()> },
}
