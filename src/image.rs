//! Image records handed out by the breed buffers.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one fetched image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(u64);

impl ImageId {
    fn fresh() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One fetched image for a breed.
///
/// Two records compare equal only when they come from the same fetch; the same
/// URL fetched twice yields two distinct records.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    id: ImageId,
    breed: Arc<str>,
    url: Arc<str>,
}

impl ImageRecord {
    pub fn new(breed: impl Into<Arc<str>>, url: impl Into<Arc<str>>) -> Self {
        Self {
            id: ImageId::fresh(),
            breed: breed.into(),
            url: url.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> ImageId {
        self.id
    }

    #[must_use]
    pub fn breed(&self) -> &str {
        &self.breed
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Alt text / caption shown next to the image.
    #[must_use]
    pub fn caption(&self) -> String {
        format!("an adorable {}", self.breed)
    }
}

impl PartialEq for ImageRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ImageRecord {}

impl Hash for ImageRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
