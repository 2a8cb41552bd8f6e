//! The simulated fleet and its one-shot initialization.
//!
//! ```text
//! sizing query → build hosts (frozen Fleet) → per host: DELETE tags → POST tags
//!                      │
//!                      └──→ handed to the check-in scheduler
//! ```
//!
//! The registry is complete before anyone can read it. Tag registration is
//! admitted through the shared throttle by a background task, so
//! initialization returns without waiting on the tagging endpoint.

use std::sync::Arc;

use futures::future::join_all;
use rand::Rng;
use rand::seq::IndexedRandom;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{FleetConfig, TagVocabulary};
use crate::dispatch::{Dispatch, TagsPayload};
use crate::throttle::Throttle;
use crate::{Host, Tag};

/// Immutable, cheaply cloneable snapshot of every simulated host.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    hosts: Arc<[Arc<Host>]>,
}

impl Fleet {
    pub fn new(hosts: Vec<Host>) -> Self {
        Self {
            hosts: hosts.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn hosts(&self) -> &[Arc<Host>] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Host>> {
        self.hosts.iter().find(|host| host.name() == name)
    }

    pub fn registered(&self) -> usize {
        self.hosts.iter().filter(|host| host.is_registered()).count()
    }
}

/// Name of the `index`-th host.
///
/// The sizing offset shifts the numbering by whole fleets, so processes that
/// receive distinct offsets never collide.
pub fn host_name(prefix: &str, host_count: usize, offset: i64, index: usize) -> String {
    let base = i128::from(offset) * host_count as i128;
    format!("{prefix}{}", base + index as i128)
}

/// Draw one tag per vocabulary category, in vocabulary order.
pub fn draw_tags<R: Rng>(vocabulary: &TagVocabulary, rng: &mut R) -> Vec<Tag> {
    vocabulary
        .categories()
        .iter()
        .filter_map(|category| {
            let value = category.values.choose(rng);
            if value.is_none() {
                warn!("tag category {} has no values, skipping", category.name);
            }
            value.map(|value| Tag::new(category.name.clone(), value.clone()))
        })
        .collect()
}

pub fn build_hosts<R: Rng>(
    config: &FleetConfig,
    offset: i64,
    vocabulary: &TagVocabulary,
    rng: &mut R,
) -> Vec<Host> {
    (0..config.host_count)
        .map(|index| {
            let name = host_name(&config.host_prefix, config.host_count, offset, index);
            Host::new(name, draw_tags(vocabulary, rng))
        })
        .collect()
}

/// Outcome of the background tag registrations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationSummary {
    pub attempted: usize,
    pub succeeded: usize,
}

/// Handle on the background tag registrations.
///
/// A driver task admits one registration per host through the throttle and
/// hands back the per-host task handles. Dropping this detaches everything;
/// the tasks keep running.
#[derive(Debug)]
pub struct Registration {
    hosts: usize,
    driver: JoinHandle<Vec<JoinHandle<bool>>>,
}

impl Registration {
    /// Number of hosts queued for registration.
    pub fn len(&self) -> usize {
        self.hosts
    }

    pub fn is_empty(&self) -> bool {
        self.hosts == 0
    }

    /// Wait for every registration task to finish.
    pub async fn wait(self) -> RegistrationSummary {
        let handles = match self.driver.await {
            Ok(handles) => handles,
            Err(e) => {
                error!("tag registration driver failed: {e}");
                Vec::new()
            }
        };

        let attempted = handles.len();
        let succeeded = join_all(handles)
            .await
            .into_iter()
            .filter(|result| match result {
                Ok(succeeded) => *succeeded,
                Err(e) => {
                    error!("tag registration task failed: {e}");
                    false
                }
            })
            .count();

        RegistrationSummary {
            attempted,
            succeeded,
        }
    }
}

async fn sizing_offset(dispatcher: &dyn Dispatch) -> i64 {
    match dispatcher.container_count().await {
        Ok(Some(count)) => {
            debug!("sizing collaborator reported {count}");
            count
        }
        Ok(None) => 0,
        Err(e) => {
            warn!("sizing query failed, numbering hosts from zero: {e}");
            0
        }
    }
}

/// Replace the remote tag set of `host`. Both steps are best-effort.
///
/// Returns `true` when the new tag set was accepted.
#[instrument(skip_all, fields(host = %host.name()))]
pub async fn register_host(dispatcher: &dyn Dispatch, host: &Host) -> bool {
    debug!("deleting host tags");
    if let Err(e) = dispatcher.clear_tags(host.name()).await {
        warn!("failed to delete host tags: {e}");
    }

    debug!("submitting host tags");
    let tags = TagsPayload {
        tags: host.rendered_tags(),
    };
    let accepted = match dispatcher.register_tags(host.name(), &tags).await {
        Ok(response) => response.is_success(),
        Err(e) => {
            warn!("failed to submit host tags: {e}");
            false
        }
    };

    host.mark_registered();
    accepted
}

/// Admit one registration per host, pacing between dispatches.
async fn register_fleet(
    fleet: Fleet,
    dispatcher: Arc<dyn Dispatch>,
    throttle: Throttle,
) -> Vec<JoinHandle<bool>> {
    let mut handles = Vec::with_capacity(fleet.len());
    for (index, host) in fleet.hosts().iter().enumerate() {
        let permit = match throttle.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("throttle closed, abandoning remaining tag registrations: {e}");
                break;
            }
        };

        let dispatcher = dispatcher.clone();
        let host = host.clone();
        handles.push(tokio::spawn(async move {
            let accepted = register_host(dispatcher.as_ref(), &host).await;
            drop(permit);
            accepted
        }));

        throttle.pace(index + 1).await;
    }

    debug!("all {} tag registrations dispatched", handles.len());
    handles
}

/// Build the fleet and start registering its tags.
///
/// Returns as soon as every host exists. Registrations are admitted through
/// `throttle` by a background task and can be awaited through the returned
/// [`Registration`].
#[instrument(skip_all, fields(hosts = config.host_count))]
pub async fn initialize_fleet<R: Rng>(
    config: &FleetConfig,
    vocabulary: &TagVocabulary,
    dispatcher: Arc<dyn Dispatch>,
    throttle: &Throttle,
    rng: &mut R,
) -> (Fleet, Registration) {
    info!("building hosts...");

    let offset = sizing_offset(dispatcher.as_ref()).await;
    let fleet = Fleet::new(build_hosts(config, offset, vocabulary, rng));

    let driver = tokio::spawn(register_fleet(fleet.clone(), dispatcher, throttle.clone()));
    let registration = Registration {
        hosts: fleet.len(),
        driver,
    };

    info!(
        "built {} hosts, {} tag registrations queued",
        fleet.len(),
        registration.len()
    );

    (fleet, registration)
}
