//! Actor-based check-in scheduling
//!
//! The scheduler runs as an independent async task and is controlled through a
//! cloneable handle over an mpsc command channel.
//!
//! ```text
//!   CheckInHandle ── CheckInNow / Shutdown ──→ CheckInActor
//!                                                  │ every interval
//!                                                  ▼
//!                               one submission task per host (throttled)
//!                                                  │
//!                                                  ▼
//!                                            Dispatch (HTTP)
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: the actor owns an mpsc receiver for control messages
//! 2. **Request/Response**: oneshot channels carry cycle reports and shutdown acknowledgements

pub mod check_in;
pub mod messages;
