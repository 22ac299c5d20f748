//! Prefetch buffer for a single breed.
//!
//! Each breed keeps a queue of fetched-but-unseen images and an archive of the
//! ones already shown. Serving an image pops from the queue; when the queue runs
//! low a detached refill task tops it up. Once the queue is empty the archive is
//! replayed round-robin so the viewer never stalls on a slow or failing source.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::BufferOptions;
use crate::error::Error;
use crate::image::{ImageId, ImageRecord};
use crate::source::{ImageSource, SourceError};

/// Buffer manager for one breed. Cloning shares the same state.
#[derive(Clone)]
pub struct BreedImages {
    inner: Arc<Inner>,
}

struct Inner {
    name: Arc<str>,
    source: Arc<dyn ImageSource>,
    options: BufferOptions,
    state: Mutex<BreedState>,
    refills: TaskTracker,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct BreedState {
    buffer: VecDeque<ImageRecord>,
    archive: Vec<ImageRecord>,
    archived: HashSet<ImageId>,
    active: Option<ImageRecord>,
    exemplar: Option<ImageRecord>,
    repeat_cursor: usize,
}

enum Pick {
    Fresh(ImageRecord),
    Repeat(ImageRecord),
}

impl BreedState {
    /// Queue records that are neither archived, active, nor already queued.
    fn admit(&mut self, batch: impl IntoIterator<Item = ImageRecord>) -> usize {
        let mut added = 0;
        for record in batch {
            if self.archived.contains(&record.id())
                || self.active.as_ref() == Some(&record)
                || self.buffer.contains(&record)
            {
                continue;
            }
            self.buffer.push_back(record);
            added += 1;
        }
        added
    }

    fn take_next(&mut self) -> Option<Pick> {
        let pick = match self.buffer.pop_front() {
            Some(record) => Pick::Fresh(record),
            None => Pick::Repeat(self.next_repeat()?),
        };
        let record = match &pick {
            Pick::Fresh(r) | Pick::Repeat(r) => r.clone(),
        };
        self.active = Some(record);
        Some(pick)
    }

    // Round-robin over the archive, skipping the active record while another exists.
    fn next_repeat(&mut self) -> Option<ImageRecord> {
        let len = self.archive.len();
        if len == 0 {
            return None;
        }
        for offset in 0..len {
            let idx = (self.repeat_cursor + offset) % len;
            if self.active.as_ref() != Some(&self.archive[idx]) {
                self.repeat_cursor = (idx + 1) % len;
                return Some(self.archive[idx].clone());
            }
        }
        self.archive.first().cloned()
    }

    fn archive_active(&mut self) -> bool {
        let Some(active) = self.active.clone() else {
            return false;
        };
        if self.archived.insert(active.id()) {
            self.archive.push(active);
            true
        } else {
            false
        }
    }
}

impl BreedImages {
    /// Fetch the first batch and pick the breed's first active image.
    ///
    /// # Errors
    /// [`Error::NoImagesAvailable`] when the fetch fails or returns nothing usable.
    pub async fn initialize(
        name: impl Into<Arc<str>>,
        source: Arc<dyn ImageSource>,
        options: BufferOptions,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let images = Self {
            inner: Arc::new(Inner {
                name: name.into(),
                source,
                options,
                state: Mutex::new(BreedState::default()),
                refills: TaskTracker::new(),
                cancel,
            }),
        };

        let batch = images
            .fetch_batch()
            .await
            .map_err(|cause| Error::NoImagesAvailable {
                breed: images.name().to_string(),
                cause: Some(cause),
            })?;

        let added = {
            let mut state = images.inner.state.lock();
            let added = state.admit(batch);
            state.exemplar = state.buffer.front().cloned();
            added
        };
        if added == 0 {
            return Err(Error::no_images(images.name()));
        }
        debug!(breed = %images.inner.name, added, "breed initialized");

        images.next_image()?;
        Ok(images)
    }

    async fn fetch_batch(&self) -> Result<Vec<ImageRecord>, SourceError> {
        let urls = self
            .inner
            .source
            .random_images(&self.inner.name, self.inner.options.batch_size)
            .await?;
        Ok(urls
            .into_iter()
            .map(|url| ImageRecord::new(self.inner.name.clone(), url))
            .collect())
    }

    /// Serve the next image and make it active.
    ///
    /// Falls back to replaying archived images when nothing fresh is queued.
    /// Starts a background refill whenever the queue is below the minimum, even
    /// when this call fails, so a later call can succeed.
    ///
    /// # Errors
    /// [`Error::NoImagesAvailable`] when both the queue and the archive are empty.
    pub fn next_image(&self) -> Result<ImageRecord, Error> {
        let (pick, remaining) = {
            let mut state = self.inner.state.lock();
            let pick = state.take_next();
            (pick, state.buffer.len())
        };
        if remaining < self.inner.options.minimum_buffer_size {
            self.spawn_refill();
        }

        let record = match pick.ok_or_else(|| Error::no_images(&self.inner.name))? {
            Pick::Fresh(record) => record,
            Pick::Repeat(record) => {
                info!(breed = %self.inner.name, image = %record.id(), "repeating an archived image");
                record
            }
        };
        Ok(record)
    }

    // Detached; completion is unordered relative to later `next_image` calls.
    fn spawn_refill(&self) {
        if tokio::runtime::Handle::try_current().is_err() {
            warn!(breed = %self.inner.name, "no async runtime; refill skipped");
            return;
        }
        let images = self.clone();
        let cancel = self.inner.cancel.clone();
        debug!(
            breed = %self.inner.name,
            in_flight = self.inner.refills.len() + 1,
            "refill started"
        );
        self.inner.refills.spawn(async move {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(breed = %images.inner.name, "refill abandoned on shutdown");
                    return;
                }
                res = images.fetch_batch() => res,
            };
            match batch {
                Ok(batch) => {
                    let (added, buffered) = {
                        let mut state = images.inner.state.lock();
                        let added = state.admit(batch);
                        (added, state.buffer.len())
                    };
                    debug!(breed = %images.inner.name, added, buffered, "refill complete");
                }
                Err(err) => {
                    warn!(breed = %images.inner.name, error = %err, "refill failed");
                }
            }
        });
    }

    /// Move the active image into the archive. Returns whether it was newly archived.
    pub fn archive_active(&self) -> bool {
        self.inner.state.lock().archive_active()
    }

    /// Wait for every refill started so far (and any they race with) to finish.
    pub async fn settle(&self) {
        let refills = &self.inner.refills;
        refills.close();
        refills.wait().await;
        refills.reopen();
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn active(&self) -> Option<ImageRecord> {
        self.inner.state.lock().active.clone()
    }

    /// Representative thumbnail, fixed at initialization.
    #[must_use]
    pub fn exemplar(&self) -> Option<ImageRecord> {
        self.inner.state.lock().exemplar.clone()
    }

    /// Previously shown images in the order they were archived.
    #[must_use]
    pub fn archive(&self) -> Vec<ImageRecord> {
        self.inner.state.lock().archive.clone()
    }

    /// Fetched images not yet shown.
    #[must_use]
    pub fn buffered(&self) -> Vec<ImageRecord> {
        self.inner.state.lock().buffer.iter().cloned().collect()
    }

    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    #[must_use]
    pub fn pending_refills(&self) -> usize {
        self.inner.refills.len()
    }
}

impl fmt::Debug for BreedImages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("BreedImages")
            .field("name", &self.inner.name)
            .field("buffered", &state.buffer.len())
            .field("archived", &state.archive.len())
            .field("active", &state.active.as_ref().map(ImageRecord::id))
            .finish()
    }
}
