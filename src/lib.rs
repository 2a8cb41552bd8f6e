pub mod actors;
pub mod config;
pub mod dispatch;
pub mod fleet;
pub mod metrics;
pub mod throttle;
pub mod util;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// A single `name:value` pair attached to a simulated host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.value)
    }
}

/// A simulated host of the fleet.
///
/// The name and tags are fixed at creation. Hosts are shared between the
/// tagging tasks and the check-in scheduler as `Arc<Host>`, so the
/// registration marker is atomic.
#[derive(Debug)]
pub struct Host {
    name: String,
    tags: Vec<Tag>,
    registered: AtomicBool,
}

impl Host {
    pub fn new(name: impl Into<String>, tags: Vec<Tag>) -> Self {
        Self {
            name: name.into(),
            tags,
            registered: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Tags rendered as `name:value`, in the order they were assigned.
    pub fn rendered_tags(&self) -> Vec<String> {
        self.tags.iter().map(Tag::to_string).collect()
    }

    /// Whether tag registration has been attempted for this host.
    ///
    /// Advisory only; nothing gates metric submission on it.
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub(crate) fn mark_registered(&self) {
        self.registered.store(true, Ordering::Release);
    }
}
