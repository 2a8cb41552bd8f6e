//! Synthetic gauge payloads for the series and service-check endpoints.

use rand::Rng;
use serde::Serialize;

use crate::Host;
use crate::config::{GaugeBounds, GaugeRange};

pub const CPU_STOLEN: &str = "system.cpu.stolen";
pub const CPU_USER: &str = "system.cpu.user";
pub const DISK_USED: &str = "system.disk.used";
pub const MEM_USED: &str = "system.mem.used";

/// Metric names in the order they appear in every payload.
pub const SERIES_ORDER: [&str; 4] = [CPU_STOLEN, CPU_USER, DISK_USED, MEM_USED];

pub const HOST_CHECK: &str = "bigdog.is_ok";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Gauge,
}

/// A single `[timestamp, value]` pair.
pub type Point = (i64, i64);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub metric: &'static str,
    pub points: Vec<Point>,
    #[serde(rename = "type")]
    pub kind: MetricType,
    pub host: String,
    pub tags: Vec<String>,
}

impl Series {
    fn gauge(metric: &'static str, timestamp: i64, value: i64, host: &Host) -> Self {
        Self {
            metric,
            points: vec![(timestamp, value)],
            kind: MetricType::Gauge,
            host: host.name().to_string(),
            tags: host.rendered_tags(),
        }
    }

    pub fn value(&self) -> Option<i64> {
        self.points.first().map(|(_, value)| *value)
    }
}

/// Body of one submission to the series endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPayload {
    pub series: Vec<Series>,
}

impl SeriesPayload {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn get(&self, metric: &str) -> Option<&Series> {
        self.series.iter().find(|series| series.metric == metric)
    }
}

fn draw<R: Rng>(rng: &mut R, range: GaugeRange) -> i64 {
    rng.random_range(range.min..range.max)
}

/// Build the four gauge series for `host` at `timestamp`.
///
/// The stolen CPU series is always zero; the other three are drawn uniformly
/// from their configured half-open ranges.
pub fn encode_metrics<R: Rng>(
    host: &Host,
    timestamp: i64,
    bounds: &GaugeBounds,
    rng: &mut R,
) -> SeriesPayload {
    let cpu = draw(rng, bounds.cpu_user);
    let disk = draw(rng, bounds.disk_used);
    let mem = draw(rng, bounds.mem_used);

    SeriesPayload {
        series: vec![
            Series::gauge(CPU_STOLEN, timestamp, 0, host),
            Series::gauge(CPU_USER, timestamp, cpu, host),
            Series::gauge(DISK_USED, timestamp, disk, host),
            Series::gauge(MEM_USED, timestamp, mem, host),
        ],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum CheckStatus {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl From<CheckStatus> for u8 {
    fn from(status: CheckStatus) -> Self {
        match status {
            CheckStatus::Ok => 0,
            CheckStatus::Warning => 1,
            CheckStatus::Critical => 2,
            CheckStatus::Unknown => 3,
        }
    }
}

/// Body of one submission to the check-run endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceCheck {
    pub check: &'static str,
    pub host_name: String,
    pub status: CheckStatus,
    pub timestamp: i64,
    pub tags: Vec<String>,
}

/// Simulated hosts are always healthy.
pub fn encode_service_check(host: &Host, timestamp: i64) -> ServiceCheck {
    ServiceCheck {
        check: HOST_CHECK,
        host_name: host.name().to_string(),
        status: CheckStatus::Ok,
        timestamp,
        tags: host.rendered_tags(),
    }
}
