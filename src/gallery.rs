//! Application controller: which breed is active, and the views handed to the
//! presentation layer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{BufferOptions, Configuration};
use crate::error::Error;
use crate::events::{CatalogEvent, LoadProgress};
use crate::image::ImageRecord;
use crate::source::ImageSource;
use crate::tasks::breed::BreedImages;
use crate::tasks::catalog::{self, Catalog};

/// Hooks the presentation layer implements.
pub trait Presenter: Send {
    /// Catalog load advanced.
    fn loading(&mut self, _progress: LoadProgress) {}

    /// Catalog is ready and the default breed's image is up.
    fn ready(&mut self, _view: &ImageView) {}

    /// Fatal failure; nothing more will happen.
    fn error(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryState {
    Loading { percent: u8 },
    Ready,
    Error(String),
}

/// An image as the presentation layer shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageView {
    pub breed: String,
    pub url: String,
    pub caption: String,
}

impl From<&ImageRecord> for ImageView {
    fn from(record: &ImageRecord) -> Self {
        Self {
            breed: record.breed().to_string(),
            url: record.url().to_string(),
            caption: record.caption(),
        }
    }
}

/// One row of the breed browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserEntry {
    pub name: String,
    pub thumbnail: Option<ImageView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum History {
    Empty,
    Images(Vec<ImageRecord>),
}

impl History {
    fn from_archive(archive: Vec<ImageRecord>) -> Self {
        if archive.is_empty() {
            Self::Empty
        } else {
            Self::Images(archive)
        }
    }
}

pub struct Gallery<P: Presenter> {
    default_breed: String,
    buffer: BufferOptions,
    max_concurrent_initializations: usize,
    presenter: P,
    state: GalleryState,
    progress: LoadProgress,
    catalog: Catalog,
    active: Option<String>,
}

impl<P: Presenter> Gallery<P> {
    pub fn new(cfg: &Configuration, presenter: P) -> Self {
        Self {
            default_breed: cfg.default_breed.clone(),
            buffer: cfg.buffer,
            max_concurrent_initializations: cfg.max_concurrent_initializations,
            presenter,
            state: GalleryState::Loading { percent: 0 },
            progress: LoadProgress::new(0, 0),
            catalog: Catalog::default(),
            active: None,
        }
    }

    /// Run the catalog loader until the gallery is ready or has failed.
    ///
    /// # Errors
    /// [`Error::CatalogUnavailable`] on fatal load failure, [`Error::NotReady`]
    /// when cancelled before the catalog finished.
    pub async fn load(
        &mut self,
        source: Arc<dyn ImageSource>,
        cancel: CancellationToken,
    ) -> Result<(), Error> {
        let (events_tx, mut events_rx) = mpsc::channel::<CatalogEvent>(64);
        let loader = tokio::spawn(catalog::run(
            source,
            self.buffer,
            self.max_concurrent_initializations,
            events_tx,
            cancel,
        ));

        while let Some(event) = events_rx.recv().await {
            self.apply(event);
            if !self.is_loading() {
                break;
            }
        }
        drop(events_rx);

        match loader.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!("catalog loader finished with error: {err}"),
            Err(err) => error!("catalog loader task failed: {err}"),
        }

        match &self.state {
            GalleryState::Ready => Ok(()),
            GalleryState::Error(message) => Err(Error::CatalogUnavailable(message.clone())),
            GalleryState::Loading { .. } => Err(Error::NotReady),
        }
    }

    /// Fold one loader event into the gallery state. Events after loading ends are ignored.
    pub fn apply(&mut self, event: CatalogEvent) {
        if !self.is_loading() {
            debug!(?event, "ignoring catalog event outside loading");
            return;
        }
        match event {
            CatalogEvent::Progress(progress) => {
                let GalleryState::Loading { percent } = self.state else {
                    return;
                };
                if progress.percent < percent {
                    return;
                }
                self.progress = progress;
                self.state = GalleryState::Loading {
                    percent: progress.percent,
                };
                self.presenter.loading(progress);
            }
            CatalogEvent::BreedDropped { breed, reason } => {
                debug!(breed = %breed, reason = %reason, "breed left out of gallery");
            }
            CatalogEvent::Ready(catalog) => self.on_catalog_ready(catalog),
            CatalogEvent::Unavailable(message) => self.fail(message),
        }
    }

    fn on_catalog_ready(&mut self, catalog: Catalog) {
        self.catalog = catalog;
        let chosen = if self.catalog.contains(&self.default_breed) {
            Some(self.default_breed.clone())
        } else {
            let fallback = self.catalog.names().next().map(str::to_string);
            if let Some(name) = &fallback {
                warn!(
                    default = %self.default_breed,
                    fallback = %name,
                    "default breed not in catalog"
                );
            }
            fallback
        };
        let Some(name) = chosen else {
            self.fail("no breeds available".to_string());
            return;
        };

        self.active = Some(name);
        self.state = GalleryState::Ready;
        info!(
            breeds = self.catalog.len(),
            active = self.active.as_deref().unwrap_or_default(),
            "gallery ready"
        );
        match self.current() {
            Some(view) => self.presenter.ready(&view),
            None => warn!("active breed has no image yet"),
        }
    }

    fn fail(&mut self, message: String) {
        error!(error = %message, "gallery failed");
        self.presenter.error(&message);
        self.state = GalleryState::Error(message);
    }

    fn is_loading(&self) -> bool {
        matches!(self.state, GalleryState::Loading { .. })
    }

    fn ensure_ready(&self) -> Result<(), Error> {
        match self.state {
            GalleryState::Ready => Ok(()),
            _ => Err(Error::NotReady),
        }
    }

    fn breed(&self, name: &str) -> Result<&BreedImages, Error> {
        self.catalog
            .get(name)
            .ok_or_else(|| Error::UnknownBreed(name.to_string()))
    }

    fn active_images(&self) -> Result<&BreedImages, Error> {
        self.ensure_ready()?;
        let name = self.active.as_deref().ok_or(Error::NotReady)?;
        self.breed(name)
    }

    /// Make `name` the active breed and return its current image.
    pub fn select_breed(&mut self, name: &str) -> Result<ImageView, Error> {
        self.ensure_ready()?;
        let images = self.breed(name)?;
        let active = images.active().ok_or_else(|| Error::no_images(name))?;
        self.active = Some(name.to_string());
        debug!(breed = %name, "breed selected");
        Ok(ImageView::from(&active))
    }

    /// Archive the active image of the active breed and move on to the next one.
    pub fn advance(&mut self) -> Result<ImageView, Error> {
        let images = self.active_images()?;
        images.archive_active();
        let next = images.next_image()?;
        Ok(ImageView::from(&next))
    }

    /// Previously shown images of a breed.
    pub fn history(&self, name: &str) -> Result<History, Error> {
        Ok(History::from_archive(self.breed(name)?.archive()))
    }

    pub fn active_history(&self) -> Result<History, Error> {
        Ok(History::from_archive(self.active_images()?.archive()))
    }

    /// Image currently shown for the active breed.
    #[must_use]
    pub fn current(&self) -> Option<ImageView> {
        let record = self.active_images().ok()?.active()?;
        Some(ImageView::from(&record))
    }

    /// Breed names with one thumbnail each, sorted by name.
    #[must_use]
    pub fn browser(&self) -> Vec<BrowserEntry> {
        self.catalog
            .iter()
            .map(|(name, images)| BrowserEntry {
                name: name.to_string(),
                thumbnail: images.exemplar().as_ref().map(ImageView::from),
            })
            .collect()
    }

    /// Sorted breed names.
    #[must_use]
    pub fn picker(&self) -> Vec<String> {
        self.catalog.names().map(str::to_string).collect()
    }

    #[must_use]
    pub fn active_breed(&self) -> Option<&str> {
        self.active.as_deref()
    }

    #[must_use]
    pub fn state(&self) -> &GalleryState {
        &self.state
    }

    #[must_use]
    pub fn progress(&self) -> LoadProgress {
        self.progress
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Wait for in-flight refills; call after cancelling on shutdown.
    pub async fn settle(&self) {
        self.catalog.settle().await;
    }
}
