//! Configuration types for docshift

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

const MB: u64 = 1024 * 1024;

/// Storage roots for uploads and produced artifacts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Upload directory (default: "./uploads")
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Output directory (default: "./outputs")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
        }
    }
}

/// Upload quotas
///
/// Checked before anything is written, so a rejected request leaves no file behind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum size of a single file in bytes (default: 20 MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,

    /// Maximum number of files in one batch submission (default: 20)
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Maximum aggregate size of one batch in bytes (default: 100 MB)
    #[serde(default = "default_max_total_size")]
    pub max_total_size_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
            max_files: default_max_files(),
            max_total_size_bytes: default_max_total_size(),
        }
    }
}

/// Retention window and sweep cadence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// How long a task and its files are kept after creation (default: 24 hours)
    #[serde(default = "default_retention", with = "duration_serde")]
    pub retention: Duration,

    /// Interval between retention sweeps (default: 10 minutes)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    pub sweep_interval: Duration,

    /// Also remove unreferenced files older than the retention window (default: true)
    ///
    /// Catches leftovers from a previous process, since task state does not
    /// survive a restart.
    #[serde(default = "default_true")]
    pub sweep_orphans: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            sweep_interval: default_sweep_interval(),
            sweep_orphans: true,
        }
    }
}

/// Worker pool sizing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum conversions running at once (default: 2)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_conversions: usize,

    /// Maximum submissions waiting for a worker (default: 64)
    ///
    /// When full, new submissions are rejected with `QueueFull`.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long shutdown waits for in-flight conversions (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_conversions: default_max_concurrent(),
            queue_capacity: default_queue_capacity(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// External converter tool paths
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Path to pandoc executable (auto-detected if None)
    #[serde(default)]
    pub pandoc_path: Option<PathBuf>,

    /// Path to marker_single executable (auto-detected if None)
    #[serde(default)]
    pub marker_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// LaTeX engine pandoc uses for PDF output (default: "xelatex")
    #[serde(default = "default_pdf_engine")]
    pub pdf_engine: String,

    /// Main font passed to pandoc, for non-Latin scripts
    #[serde(default)]
    pub pdf_font: Option<String>,

    /// Run marker on the GPU (default: false)
    #[serde(default)]
    pub marker_use_gpu: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            pandoc_path: None,
            marker_path: None,
            search_path: true,
            pdf_engine: default_pdf_engine(),
            pdf_font: None,
            marker_use_gpu: false,
        }
    }
}

/// Deployment environment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development: internal error details are exposed
    #[default]
    Development,
    /// Production: internal error details are hidden from callers
    Production,
    /// Test runs
    Testing,
}

impl std::str::FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "testing" | "test" => Ok(Environment::Testing),
            other => Err(Error::Config {
                message: format!("unknown environment '{}'", other),
                key: Some("DOCSHIFT_ENV".into()),
            }),
        }
    }
}

/// Settings for the host service embedding the orchestrator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,

    /// Origins allowed to call the host API (default: ["http://localhost:5173"])
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Main configuration for the Orchestrator
///
/// Sub-configs are flattened, so the serialized form is a single flat object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upload and output roots
    #[serde(flatten)]
    pub storage: StorageConfig,

    /// Upload quotas
    #[serde(flatten)]
    pub limits: LimitsConfig,

    /// Retention and sweep cadence
    #[serde(flatten)]
    pub retention: RetentionConfig,

    /// Worker pool sizing
    #[serde(flatten)]
    pub workers: WorkerConfig,

    /// External converter tools
    #[serde(flatten)]
    pub converters: ConverterConfig,

    /// Host integration settings
    #[serde(flatten)]
    pub server: ServerConfig,
}

impl Config {
    /// Build a configuration from defaults, `.env`, and `DOCSHIFT_*` variables
    ///
    /// Environment variables take precedence over `.env` entries, which take
    /// precedence over defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Config::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - DOCSHIFT_ENV: development | production | testing
    /// - DOCSHIFT_UPLOAD_DIR / DOCSHIFT_OUTPUT_DIR: storage roots
    /// - DOCSHIFT_MAX_FILE_SIZE_MB / DOCSHIFT_MAX_FILES / DOCSHIFT_MAX_TOTAL_SIZE_MB: quotas
    /// - DOCSHIFT_RETENTION_HOURS / DOCSHIFT_SWEEP_INTERVAL_SECS: retention
    /// - DOCSHIFT_MAX_CONCURRENT / DOCSHIFT_QUEUE_CAPACITY: worker pool
    /// - DOCSHIFT_PANDOC_PATH / DOCSHIFT_MARKER_PATH / DOCSHIFT_PDF_ENGINE / DOCSHIFT_PDF_FONT: tools
    /// - DOCSHIFT_ALLOWED_ORIGINS: comma separated origin list
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        use std::env;

        if let Ok(value) = env::var("DOCSHIFT_ENV") {
            self.server.environment = value.parse()?;
        }

        if let Ok(path) = env::var("DOCSHIFT_UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(path);
        }
        if let Ok(path) = env::var("DOCSHIFT_OUTPUT_DIR") {
            self.storage.output_dir = PathBuf::from(path);
        }

        if let Some(bytes) = parse_env_scaled("DOCSHIFT_MAX_FILE_SIZE_MB", MB)? {
            self.limits.max_file_size_bytes = bytes;
        }
        if let Some(count) = parse_env::<usize>("DOCSHIFT_MAX_FILES")? {
            self.limits.max_files = count;
        }
        if let Some(bytes) = parse_env_scaled("DOCSHIFT_MAX_TOTAL_SIZE_MB", MB)? {
            self.limits.max_total_size_bytes = bytes;
        }

        if let Some(secs) = parse_env_scaled("DOCSHIFT_RETENTION_HOURS", 3600)? {
            self.retention.retention = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env::<u64>("DOCSHIFT_SWEEP_INTERVAL_SECS")? {
            self.retention.sweep_interval = Duration::from_secs(secs);
        }

        if let Some(n) = parse_env::<usize>("DOCSHIFT_MAX_CONCURRENT")? {
            self.workers.max_concurrent_conversions = n;
        }
        if let Some(n) = parse_env::<usize>("DOCSHIFT_QUEUE_CAPACITY")? {
            self.workers.queue_capacity = n;
        }

        if let Ok(path) = env::var("DOCSHIFT_PANDOC_PATH") {
            self.converters.pandoc_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = env::var("DOCSHIFT_MARKER_PATH") {
            self.converters.marker_path = Some(PathBuf::from(path));
        }
        if let Ok(engine) = env::var("DOCSHIFT_PDF_ENGINE") {
            self.converters.pdf_engine = engine;
        }
        if let Ok(font) = env::var("DOCSHIFT_PDF_FONT") {
            self.converters.pdf_font = Some(font);
        }

        if let Ok(origins) = env::var("DOCSHIFT_ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(())
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_file_size_bytes == 0 {
            return Err(config_error(
                "per-file size limit must be greater than zero",
                "max_file_size_bytes",
            ));
        }
        if self.limits.max_files == 0 {
            return Err(config_error(
                "max file count must be greater than zero",
                "max_files",
            ));
        }
        if self.limits.max_total_size_bytes < self.limits.max_file_size_bytes {
            return Err(config_error(
                "aggregate size limit cannot be smaller than the per-file limit",
                "max_total_size_bytes",
            ));
        }
        if self.retention.retention.is_zero() {
            return Err(config_error(
                "retention window must be greater than zero",
                "retention",
            ));
        }
        if self.retention.sweep_interval.is_zero() {
            return Err(config_error(
                "sweep interval must be greater than zero",
                "sweep_interval",
            ));
        }
        if self.workers.max_concurrent_conversions == 0 {
            return Err(config_error(
                "at least one conversion worker is required",
                "max_concurrent_conversions",
            ));
        }
        if self.workers.queue_capacity == 0 {
            return Err(config_error(
                "queue capacity must be greater than zero",
                "queue_capacity",
            ));
        }
        if self.storage.upload_dir == self.storage.output_dir {
            return Err(config_error(
                "upload and output directories must differ",
                "output_dir",
            ));
        }
        Ok(())
    }

    /// Whether internal error details may be shown to callers
    pub fn exposes_internal_errors(&self) -> bool {
        self.server.environment != Environment::Production
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| Error::Config {
            message: format!("invalid {} value: {}", key, raw),
            key: Some(key.to_string()),
        }),
        Err(_) => Ok(None),
    }
}

/// Parse `key` as a count of `unit`s, rejecting values that overflow `u64`
fn parse_env_scaled(key: &str, unit: u64) -> Result<Option<u64>> {
    let Some(value) = parse_env::<u64>(key)? else {
        return Ok(None);
    };
    value.checked_mul(unit).map(Some).ok_or_else(|| Error::Config {
        message: format!("{} value {} is too large", key, value),
        key: Some(key.to_string()),
    })
}

// Default value functions
fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_max_file_size() -> u64 {
    20 * MB
}

fn default_max_files() -> usize {
    20
}

fn default_max_total_size() -> u64 {
    100 * MB
}

fn default_retention() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_max_concurrent() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    64
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_pdf_engine() -> String {
    "xelatex".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".into()]
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_KEYS: &[&str] = &[
        "DOCSHIFT_ENV",
        "DOCSHIFT_UPLOAD_DIR",
        "DOCSHIFT_OUTPUT_DIR",
        "DOCSHIFT_MAX_FILE_SIZE_MB",
        "DOCSHIFT_MAX_FILES",
        "DOCSHIFT_MAX_TOTAL_SIZE_MB",
        "DOCSHIFT_RETENTION_HOURS",
        "DOCSHIFT_SWEEP_INTERVAL_SECS",
        "DOCSHIFT_MAX_CONCURRENT",
        "DOCSHIFT_QUEUE_CAPACITY",
        "DOCSHIFT_PANDOC_PATH",
        "DOCSHIFT_MARKER_PATH",
        "DOCSHIFT_PDF_ENGINE",
        "DOCSHIFT_PDF_FONT",
        "DOCSHIFT_ALLOWED_ORIGINS",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            // SAFETY: env tests are serialized with #[serial]
            unsafe { env::remove_var(key) };
        }
    }

    fn set_env(key: &str, value: &str) {
        // SAFETY: env tests are serialized with #[serial]
        unsafe { env::set_var(key, value) };
    }

    #[test]
    fn test_defaults_match_service_limits() {
        let config = Config::default();
        assert_eq!(config.limits.max_file_size_bytes, 20 * MB);
        assert_eq!(config.limits.max_files, 20);
        assert_eq!(config.limits.max_total_size_bytes, 100 * MB);
        assert_eq!(config.retention.retention, Duration::from_secs(86_400));
        assert_eq!(config.retention.sweep_interval, Duration::from_secs(600));
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.storage.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.server.allowed_origins, vec!["http://localhost:5173"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.workers.max_concurrent_conversions = 0;
        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("max_concurrent_conversions"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_total_smaller_than_file_limit() {
        let mut config = Config::default();
        config.limits.max_total_size_bytes = MB;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_shared_roots() {
        let mut config = Config::default();
        config.storage.output_dir = config.storage.upload_dir.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_flat_serialization_with_duration_seconds() {
        let config = Config::default();
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["retention"], 86_400);
        assert_eq!(value["sweep_interval"], 600);
        assert_eq!(value["max_files"], 20);
        assert_eq!(value["environment"], "development");

        let parsed: Config =
            serde_json::from_str(r#"{"retention": 60, "upload_dir": "/tmp/in"}"#).unwrap();
        assert_eq!(parsed.retention.retention, Duration::from_secs(60));
        assert_eq!(parsed.storage.upload_dir, PathBuf::from("/tmp/in"));
        assert_eq!(parsed.limits.max_files, 20);
    }

    #[test]
    #[serial]
    fn test_env_overrides_limits_and_paths() {
        clear_env();
        set_env("DOCSHIFT_MAX_FILE_SIZE_MB", "5");
        set_env("DOCSHIFT_MAX_FILES", "3");
        set_env("DOCSHIFT_RETENTION_HOURS", "2");
        set_env("DOCSHIFT_UPLOAD_DIR", "/srv/in");
        set_env("DOCSHIFT_OUTPUT_DIR", "/srv/out");

        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        clear_env();

        assert_eq!(config.limits.max_file_size_bytes, 5 * MB);
        assert_eq!(config.limits.max_files, 3);
        assert_eq!(config.retention.retention, Duration::from_secs(7200));
        assert_eq!(config.storage.upload_dir, PathBuf::from("/srv/in"));
        assert_eq!(config.storage.output_dir, PathBuf::from("/srv/out"));
    }

    #[test]
    #[serial]
    fn test_env_override_allowed_origins_list() {
        clear_env();
        set_env(
            "DOCSHIFT_ALLOWED_ORIGINS",
            "https://a.example, https://b.example,,",
        );

        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        clear_env();

        assert_eq!(
            config.server.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_number_names_key() {
        clear_env();
        set_env("DOCSHIFT_QUEUE_CAPACITY", "lots");

        let mut config = Config::default();
        let result = config.apply_env_overrides();
        clear_env();

        match result {
            Err(Error::Config { key, message }) => {
                assert_eq!(key.as_deref(), Some("DOCSHIFT_QUEUE_CAPACITY"));
                assert!(message.contains("lots"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn test_env_override_overflowing_size_names_key() {
        for key in ["DOCSHIFT_MAX_FILE_SIZE_MB", "DOCSHIFT_MAX_TOTAL_SIZE_MB", "DOCSHIFT_RETENTION_HOURS"] {
            clear_env();
            set_env(key, &u64::MAX.to_string());

            let mut config = Config::default();
            let result = config.apply_env_overrides();
            clear_env();

            match result {
                Err(Error::Config { key: Some(reported), message }) => {
                    assert_eq!(reported, key);
                    assert!(message.contains("too large"));
                }
                other => panic!("expected config error for {key}, got {other:?}"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_env_override_production_hides_internal_errors() {
        clear_env();
        set_env("DOCSHIFT_ENV", "production");

        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        clear_env();

        assert_eq!(config.server.environment, Environment::Production);
        assert!(!config.exposes_internal_errors());
    }
}
