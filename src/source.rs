//! The external image catalog.
//!
//! The gallery only talks to [`ImageSource`]; [`HttpImageSource`] is the
//! implementation backed by the public dog image API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::SourceOptions;

/// Breed name to sub-breed names (empty when the breed has none).
pub type BreedTaxonomy = BTreeMap<String, Vec<String>>;

/// Failures of a single catalog call.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure (connect, TLS, body read).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response whose body was not a catalog envelope.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The envelope's status was anything but `success`.
    #[error("catalog reported {status}: {message}")]
    Unsuccessful { status: String, message: String },

    /// The body did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Every breed with its sub-breeds.
    async fn list_breeds(&self) -> Result<BreedTaxonomy, SourceError>;

    /// Up to `count` random image URLs for a breed or `breed-sub` composite.
    async fn random_images(&self, breed: &str, count: usize) -> Result<Vec<String>, SourceError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    message: serde_json::Value,
}

pub(crate) fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<T, SourceError> {
    let envelope: Envelope = serde_json::from_str(body)?;
    if envelope.status != "success" {
        let message = match envelope.message {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        return Err(SourceError::Unsuccessful {
            status: envelope.status,
            message,
        });
    }
    Ok(serde_json::from_value(envelope.message)?)
}

/// URL path segment for a breed name: `hound-afghan` becomes `hound/afghan`.
#[must_use]
pub fn breed_path(name: &str) -> String {
    name.split('-').collect::<Vec<_>>().join("/")
}

/// [`ImageSource`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpImageSource {
    pub fn new(options: &SourceOptions) -> Result<Self, SourceError> {
        let mut builder = reqwest::Client::builder().user_agent(options.user_agent.clone());
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: options.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        debug!(url, "catalog request");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        match parse_envelope(&body) {
            Err(SourceError::Decode(_)) if !status.is_success() => Err(SourceError::Http {
                status: status.as_u16(),
                body,
            }),
            other => other,
        }
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn list_breeds(&self) -> Result<BreedTaxonomy, SourceError> {
        let url = format!("{}/breeds/list/all", self.base_url);
        self.get(&url).await
    }

    async fn random_images(&self, breed: &str, count: usize) -> Result<Vec<String>, SourceError> {
        let url = format!(
            "{}/breed/{}/images/random/{}",
            self.base_url,
            breed_path(breed),
            count
        );
        self.get(&url).await
    }
}
