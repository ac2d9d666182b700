use crate::error::IntakeError;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for the intake pipeline, read from the environment.
/// Store URL and key are required; everything else has a sane default.
#[derive(Debug, Clone)]
pub struct Settings {
    pub store_url: String,
    pub store_key: String,
    pub storage_bucket: Option<String>,
    pub watch_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub worker_concurrency: usize,
    pub poll_interval: Duration,
    pub pull_interval: Duration,
    pub pull_max_retries: u32,
    pub ocr_command: String,
    pub ocr_timeout_secs: u64,
    /// When true, a resume whose extraction produced no usable fields marks
    /// the document failed instead of persisting a near-empty record.
    pub strict_extraction: bool,
}

fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let value = value.trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_trimmed(name)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Result<Self, IntakeError> {
        let store_url = env_trimmed("RESUME_STORE_URL")
            .ok_or_else(|| IntakeError::MissingConfig("RESUME_STORE_URL".to_string()))?;
        let store_key = env_trimmed("RESUME_STORE_KEY")
            .ok_or_else(|| IntakeError::MissingConfig("RESUME_STORE_KEY".to_string()))?;

        Ok(Self {
            store_url,
            store_key,
            storage_bucket: env_trimmed("RESUME_STORAGE_BUCKET"),
            watch_dir: PathBuf::from(
                env_trimmed("WATCH_DIR").unwrap_or_else(|| "uploads/processing".to_string()),
            ),
            archive_dir: PathBuf::from(
                env_trimmed("ARCHIVE_DIR").unwrap_or_else(|| "uploads/completed".to_string()),
            ),
            worker_concurrency: env_parsed("WATCHER_CONCURRENCY", 3usize).max(1),
            poll_interval: Duration::from_secs(env_parsed("POLL_INTERVAL_SECS", 3u64).max(1)),
            pull_interval: Duration::from_secs(env_parsed("PULL_INTERVAL_SECS", 10u64).max(1)),
            pull_max_retries: env_parsed("PULL_MAX_RETRIES", 3u32).max(1),
            ocr_command: env_trimmed("OCR_COMMAND").unwrap_or_else(|| "mineru".to_string()),
            ocr_timeout_secs: env_parsed("OCR_TIMEOUT_SECS", 300u64).max(1),
            strict_extraction: env_parsed("STRICT_EXTRACTION", false),
        })
    }
}
