use thiserror::Error;

use crate::source::SourceError;

/// Library error type for gallery operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The breed taxonomy could not be fetched. Fatal for the whole gallery.
    #[error("breed catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// A single breed failed to initialize and was left out of the catalog.
    #[error("failed to initialize breed {breed}")]
    BreedInitFailed {
        breed: String,
        #[source]
        source: Box<Error>,
    },

    /// Neither fresh nor previously shown images exist for a breed.
    #[error("no images available for {breed}")]
    NoImagesAvailable {
        breed: String,
        #[source]
        cause: Option<SourceError>,
    },

    /// The requested breed is not in the catalog.
    #[error("unknown breed: {0}")]
    UnknownBreed(String),

    /// The catalog has not finished loading (or failed to load).
    #[error("gallery is not ready")]
    NotReady,
}

impl Error {
    pub(crate) fn no_images(breed: &str) -> Self {
        Self::NoImagesAvailable {
            breed: breed.to_string(),
            cause: None,
        }
    }
}
