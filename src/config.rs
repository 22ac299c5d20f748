use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Breed shown first once the catalog is ready.
    pub default_breed: String,
    /// How many breeds may be initializing at the same time.
    pub max_concurrent_initializations: usize,
    /// Remote image catalog settings.
    pub source: SourceOptions,
    /// Per-breed prefetch buffer sizing.
    pub buffer: BufferOptions,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Like [`Configuration::from_yaml_file`], but a missing file yields defaults.
    pub fn from_yaml_file_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        Self::from_yaml_file(path)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.default_breed.trim().is_empty(),
            "default-breed must not be empty"
        );
        ensure!(
            self.max_concurrent_initializations > 0,
            "max-concurrent-initializations must be greater than zero"
        );
        self.source.validate().context("invalid source configuration")?;
        self.buffer.validate()?;
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            default_breed: "shiba".to_string(),
            max_concurrent_initializations: 16,
            source: SourceOptions::default(),
            buffer: BufferOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SourceOptions {
    /// Base URL of the image catalog API.
    pub api_base_url: String,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Optional per-request timeout; the transport default applies when unset.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
}

impl SourceOptions {
    fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.api_base_url)
            .with_context(|| format!("api-base-url {:?} is not a URL", self.api_base_url))?;
        ensure!(
            matches!(url.scheme(), "http" | "https"),
            "api-base-url must be http or https"
        );
        if let Some(timeout) = self.request_timeout {
            ensure!(!timeout.is_zero(), "request-timeout must be positive");
        }
        Ok(())
    }
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            api_base_url: "https://dog.ceo/api".to_string(),
            user_agent: concat!("breed-gallery/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BufferOptions {
    /// Images requested per fetch, both at startup and on refill.
    pub batch_size: usize,
    /// A refill starts once fewer than this many unseen images remain.
    pub minimum_buffer_size: usize,
}

impl BufferOptions {
    const fn default_batch_size() -> usize {
        10
    }

    const fn default_minimum_buffer_size() -> usize {
        5
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "buffer.batch-size must be greater than zero");
        Ok(())
    }
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            batch_size: Self::default_batch_size(),
            minimum_buffer_size: Self::default_minimum_buffer_size(),
        }
    }
}
