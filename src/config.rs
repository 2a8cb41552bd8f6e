use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::util::{self, get_parsed, get_parsed_or, get_string, get_string_or};

pub const DEFAULT_METRICS_URL: &str = "https://app.datadoghq.com/api/v1/series";
pub const DEFAULT_TAGS_URL: &str = "https://app.datadoghq.com/api/v1/tags/hosts";
pub const DEFAULT_CHECK_RUN_URL: &str = "https://app.datadoghq.com/api/v1/check_run";
pub const DEFAULT_HOST_PREFIX: &str = "bigdog_";

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub endpoints: Endpoints,
    pub fleet: FleetConfig,
    pub check_in: CheckInConfig,
    pub throttle: ThrottleConfig,
    pub http_timeout: Duration,
    /// Seed for the process-wide random source. `None` seeds from the clock.
    pub seed: Option<u64>,
    pub vocabulary: TagVocabulary,
    pub bounds: GaugeBounds,
}

/// Opaque credentials, passed through as query parameters.
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub app_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("app_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub metrics: String,
    pub tags: String,
    pub check_run: String,
    pub sizing: Option<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            metrics: DEFAULT_METRICS_URL.to_string(),
            tags: DEFAULT_TAGS_URL.to_string(),
            check_run: DEFAULT_CHECK_RUN_URL.to_string(),
            sizing: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub host_count: usize,
    pub host_prefix: String,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            host_count: 0,
            host_prefix: DEFAULT_HOST_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckInConfig {
    /// Sleep between the end of one fan-out and the start of the next
    pub interval: Duration,
    /// Also submit a `bigdog.is_ok` service check per host and cycle
    pub service_checks: bool,
}

impl Default for CheckInConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(default_interval()),
            service_checks: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Pause after this many dispatches within one fan-out (0 disables)
    pub batch_size: usize,
    pub batch_pause: Duration,
    /// Upper bound on concurrently in-flight requests
    pub max_in_flight: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_pause: Duration::from_millis(100),
            max_in_flight: 256,
        }
    }
}

fn default_interval() -> u64 {
    60
}

fn default_http_timeout() -> u64 {
    10
}

/// One tag category and the values a host may draw from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagCategory {
    pub name: String,
    pub values: Vec<String>,
}

impl TagCategory {
    pub fn new<V: Into<String>>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered tag categories. Every host receives exactly one tag per
/// category, in this order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct TagVocabulary(Vec<TagCategory>);

impl TagVocabulary {
    pub fn new(categories: Vec<TagCategory>) -> Self {
        Self(categories)
    }

    pub fn categories(&self) -> &[TagCategory] {
        &self.0
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for category in &self.0 {
            if category.values.is_empty() {
                bail!("tag category {:?} has no values", category.name);
            }
        }
        Ok(())
    }
}

impl Default for TagVocabulary {
    fn default() -> Self {
        Self(vec![
            TagCategory::new(
                "os",
                ["tinyOS", "rtos", "lynxOS", "RTLinux", "VxWorks", "OSE", "QNX"],
            ),
            TagCategory::new("os_version", ["1.1.0", "1.1.1", "1.2.0"]),
            TagCategory::new(
                "country",
                [
                    "USA", "France", "Germany", "Japan", "China", "Sweden", "Canada", "Brazil",
                ],
            ),
        ])
    }
}

/// Half-open `[min, max)` range for a gauge reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GaugeRange {
    pub min: i64,
    pub max: i64,
}

impl GaugeRange {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.min..self.max).contains(&value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GaugeBounds {
    #[serde(default = "default_cpu_user")]
    pub cpu_user: GaugeRange,
    #[serde(default = "default_disk_used")]
    pub disk_used: GaugeRange,
    #[serde(default = "default_mem_used")]
    pub mem_used: GaugeRange,
}

fn default_cpu_user() -> GaugeRange {
    GaugeRange::new(5, 90)
}

fn default_disk_used() -> GaugeRange {
    GaugeRange::new(1000, 30000)
}

fn default_mem_used() -> GaugeRange {
    GaugeRange::new(20, 99)
}

impl Default for GaugeBounds {
    fn default() -> Self {
        Self {
            cpu_user: default_cpu_user(),
            disk_used: default_disk_used(),
            mem_used: default_mem_used(),
        }
    }
}

impl GaugeBounds {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, range) in [
            ("cpu_user", self.cpu_user),
            ("disk_used", self.disk_used),
            ("mem_used", self.mem_used),
        ] {
            if range.min >= range.max {
                bail!("gauge range {name} is empty: [{}, {})", range.min, range.max);
            }
        }
        Ok(())
    }
}

/// Optional JSON overlay for the parts of the configuration that do not fit
/// into environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub vocabulary: Option<TagVocabulary>,
    pub bounds: Option<GaugeBounds>,
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<FileConfig> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided! ({e})"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            endpoints: Endpoints::default(),
            fleet: FleetConfig::default(),
            check_in: CheckInConfig::default(),
            throttle: ThrottleConfig::default(),
            http_timeout: Duration::from_secs(default_http_timeout()),
            seed: None,
            vocabulary: TagVocabulary::default(),
            bounds: GaugeBounds::default(),
        }
    }
}

impl Config {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Only an explicitly requested but unreadable or invalid overlay file is
    /// fatal. Everything else falls back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let throttle_defaults = ThrottleConfig::default();

        let mut config = Self {
            credentials: Credentials {
                api_key: get_string(util::API_KEY).unwrap_or_default(),
                app_key: get_string(util::APP_KEY).unwrap_or_default(),
            },
            endpoints: Endpoints {
                metrics: get_string_or(util::METRICS_URL, DEFAULT_METRICS_URL),
                tags: get_string_or(util::TAGS_URL, DEFAULT_TAGS_URL),
                check_run: get_string_or(util::CHECK_RUN_URL, DEFAULT_CHECK_RUN_URL),
                sizing: get_string(util::SIZING_URL),
            },
            fleet: FleetConfig {
                host_count: util::parse_host_count(get_string(util::HOST_COUNT).as_deref()),
                host_prefix: get_string_or(util::HOST_PREFIX, DEFAULT_HOST_PREFIX),
            },
            check_in: CheckInConfig {
                interval: Duration::from_secs(get_parsed_or(
                    util::CHECK_IN_INTERVAL,
                    default_interval(),
                )),
                service_checks: get_parsed_or(util::SERVICE_CHECKS, false),
            },
            throttle: ThrottleConfig {
                batch_size: get_parsed_or(util::THROTTLE_BATCH, throttle_defaults.batch_size),
                batch_pause: get_parsed(util::THROTTLE_PAUSE_MS)
                    .map(Duration::from_millis)
                    .unwrap_or(throttle_defaults.batch_pause),
                max_in_flight: get_parsed_or(util::MAX_IN_FLIGHT, throttle_defaults.max_in_flight)
                    .max(1),
            },
            http_timeout: Duration::from_secs(get_parsed_or(
                util::HTTP_TIMEOUT,
                default_http_timeout(),
            )),
            seed: get_parsed(util::SEED),
            vocabulary: TagVocabulary::default(),
            bounds: GaugeBounds::default(),
        };

        if let Some(path) = get_string(util::CONFIG_FILE) {
            config.apply_file(read_config_file(&path)?)?;
        }

        debug!("resolved config: {config:?}");
        Ok(config)
    }

    /// Overlay values from a config file and validate the result.
    pub fn apply_file(&mut self, file: FileConfig) -> anyhow::Result<()> {
        if let Some(vocabulary) = file.vocabulary {
            vocabulary.validate().context("invalid tag vocabulary")?;
            self.vocabulary = vocabulary;
        }

        if let Some(bounds) = file.bounds {
            bounds.validate().context("invalid gauge bounds")?;
            self.bounds = bounds;
        }

        Ok(())
    }
}
