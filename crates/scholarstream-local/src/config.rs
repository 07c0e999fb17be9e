use scholarstream_core::{Error, Result};
use std::time::Duration;
use url::Url;

/// Flask's development server default.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
/// Backend LLM calls are slow; match the backend's own per-call budget.
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_YEAR_FILTER: &str = "2020-";

pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env(key).and_then(|s| s.parse::<u64>().ok())
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    /// Applies to request/response calls, not to the long-lived streams.
    pub timeout_ms: u64,
    pub year_filter: String,
}

impl BackendConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            year_filter: DEFAULT_YEAR_FILTER.to_string(),
        })
    }

    /// `SCHOLARSTREAM_BASE_URL`, `SCHOLARSTREAM_TIMEOUT_MS`, `SCHOLARSTREAM_YEAR_FILTER`.
    pub fn from_env() -> Result<Self> {
        Self::resolve(None)
    }

    /// Like [`Self::from_env`], but an explicit base URL wins over the env.
    pub fn resolve(base_url: Option<&str>) -> Result<Self> {
        let base = match base_url.map(str::trim).filter(|s| !s.is_empty()) {
            Some(b) => b.to_string(),
            None => env("SCHOLARSTREAM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        };
        let mut cfg = Self::new(&base)?;
        if let Some(ms) = env_u64("SCHOLARSTREAM_TIMEOUT_MS") {
            cfg.timeout_ms = ms;
        }
        if let Some(y) = env("SCHOLARSTREAM_YEAR_FILTER") {
            cfg.year_filter = y;
        }
        Ok(cfg)
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn with_year_filter(mut self, year_filter: impl Into<String>) -> Self {
        self.year_filter = year_filter.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidInput(format!("bad endpoint {path:?}: {e}")))
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut u = Url::parse(raw.trim())
        .map_err(|e| Error::NotConfigured(format!("invalid base url {raw:?}: {e}")))?;
    if !matches!(u.scheme(), "http" | "https") {
        return Err(Error::NotConfigured(format!(
            "base url must be http(s), got {raw:?}"
        )));
    }
    // Url::join replaces the last segment unless the path ends with '/'.
    if !u.path().ends_with('/') {
        let p = format!("{}/", u.path());
        u.set_path(&p);
    }
    Ok(u)
}
