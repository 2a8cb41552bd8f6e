//! CheckInActor - Periodically submits synthetic metrics for every host
//!
//! ## Message Flow
//!
//! ```text
//! Timer → timestamp → per host: encode → acquire permit → spawn submit → pace
//!   ↑                                                                      │
//!   └──────────────────── sleep interval ←─────────────────────────────────┘
//!   ↑
//!   └─── Commands (CheckInNow, Shutdown)
//! ```
//!
//! Submissions are fire-and-forget: a failed request is logged and dropped,
//! it never affects other hosts or the cycle. Payloads are encoded on the
//! coordinating loop so a seeded generator yields reproducible values.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use tokio::sync::{OwnedSemaphorePermit, mpsc, oneshot};
use tokio::time::{Instant, sleep};
use tracing::{Instrument, debug, error, info, info_span, instrument, trace, warn};

use crate::config::{CheckInConfig, GaugeBounds};
use crate::dispatch::Dispatch;
use crate::fleet::Fleet;
use crate::metrics::{SeriesPayload, ServiceCheck, encode_metrics, encode_service_check};
use crate::throttle::Throttle;

use super::messages::{CheckInCommand, CycleReport};

/// Actor that drives the check-in cycles of one fleet
pub struct CheckInActor {
    fleet: Fleet,

    dispatcher: Arc<dyn Dispatch>,

    /// Shared with the fleet initializer so both respect the same bound
    throttle: Throttle,

    config: CheckInConfig,

    bounds: GaugeBounds,

    rng: StdRng,

    command_rx: mpsc::Receiver<CheckInCommand>,

    /// Completed cycles, for logging
    cycles: u64,
}

impl CheckInActor {
    pub fn new(
        fleet: Fleet,
        dispatcher: Arc<dyn Dispatch>,
        throttle: Throttle,
        config: CheckInConfig,
        bounds: GaugeBounds,
        rng: StdRng,
        command_rx: mpsc::Receiver<CheckInCommand>,
    ) -> Self {
        Self {
            fleet,
            dispatcher,
            throttle,
            config,
            bounds,
            rng,
            command_rx,
            cycles: 0,
        }
    }

    /// Run the actor's main loop
    ///
    /// The first cycle starts immediately; each following cycle starts one
    /// interval after the previous fan-out finished. Runs until:
    /// - A Shutdown command is received
    /// - The command channel is closed
    #[instrument(skip(self), fields(hosts = self.fleet.len()))]
    pub async fn run(mut self) {
        debug!("starting check-in actor");

        let next_cycle = sleep(Duration::ZERO);
        tokio::pin!(next_cycle);

        loop {
            tokio::select! {
                _ = &mut next_cycle => {
                    self.check_in().await;
                    next_cycle.as_mut().reset(Instant::now() + self.config.interval);
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(CheckInCommand::CheckInNow { respond_to }) => {
                            debug!("received CheckInNow command");
                            let report = self.check_in().await;
                            let _ = respond_to.send(report);
                        }

                        Some(CheckInCommand::Shutdown { respond_to }) => {
                            debug!("received shutdown command");
                            self.drain().await;
                            let _ = respond_to.send(());
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("check-in actor stopped");
    }

    /// One fan-out over the fleet snapshot.
    #[instrument(skip(self), fields(cycle = self.cycles))]
    async fn check_in(&mut self) -> CycleReport {
        let timestamp = Utc::now().timestamp();
        let fleet = self.fleet.clone();
        info!("host check in for {} hosts", fleet.len());

        let mut dispatched = 0;
        for host in fleet.hosts() {
            let payload = encode_metrics(host, timestamp, &self.bounds, &mut self.rng);
            let check = self
                .config
                .service_checks
                .then(|| encode_service_check(host, timestamp));

            let permit = match self.throttle.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("throttle closed, abandoning cycle: {e}");
                    break;
                }
            };

            let span = info_span!("submit", host = %host.name());
            tokio::spawn(
                submit(self.dispatcher.clone(), payload, check, permit).instrument(span),
            );
            dispatched += 1;

            self.throttle.pace(dispatched).await;
        }

        self.cycles += 1;
        trace!("dispatched {dispatched} submissions");

        CycleReport {
            timestamp,
            dispatched,
            hosts: fleet.len(),
        }
    }

    async fn drain(&self) {
        debug!("waiting for {} in-flight requests", self.throttle.in_flight());
        if let Err(e) = self.throttle.drain().await {
            error!("failed to drain in-flight requests: {e}");
        }
    }
}

async fn submit(
    dispatcher: Arc<dyn Dispatch>,
    payload: SeriesPayload,
    check: Option<ServiceCheck>,
    _permit: OwnedSemaphorePermit,
) {
    debug!("submitting metrics");
    if let Err(e) = dispatcher.submit_series(&payload).await {
        debug!("failed to submit metrics: {e}");
        return;
    }

    if let Some(check) = check
        && let Err(e) = dispatcher.submit_service_check(&check).await
    {
        debug!("failed to submit service check: {e}");
    }
}

/// Handle for controlling a CheckInActor
///
/// Dropping every clone of the handle stops the actor after its current cycle.
#[derive(Clone)]
pub struct CheckInHandle {
    sender: mpsc::Sender<CheckInCommand>,

    /// Number of hosts the actor checks in
    pub hosts: usize,
}

impl CheckInHandle {
    /// Spawn a new check-in actor on the current runtime
    pub fn spawn(
        fleet: Fleet,
        dispatcher: Arc<dyn Dispatch>,
        throttle: Throttle,
        config: CheckInConfig,
        bounds: GaugeBounds,
        rng: StdRng,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let hosts = fleet.len();

        let actor = CheckInActor::new(fleet, dispatcher, throttle, config, bounds, rng, cmd_rx);
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            hosts,
        }
    }

    /// Run a cycle immediately and report what was dispatched
    pub async fn check_in_now(&self) -> Result<CycleReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CheckInCommand::CheckInNow { respond_to: tx })
            .await
            .context("failed to send CheckInNow command")?;

        rx.await.context("failed to receive cycle report")
    }

    /// Stop the actor and wait until its in-flight submissions are done
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CheckInCommand::Shutdown { respond_to: tx })
            .await
            .context("failed to send Shutdown command")?;

        rx.await.context("failed to receive shutdown acknowledgement")
    }
}
