use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BufferOptions;
use crate::error::Error;
use crate::events::{CatalogEvent, LoadProgress};
use crate::source::{BreedTaxonomy, ImageSource};
use crate::tasks::breed::BreedImages;

/// Every successfully initialized breed, keyed and ordered by name.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    breeds: BTreeMap<String, BreedImages>,
}

impl Catalog {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BreedImages> {
        self.breeds.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.breeds.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.breeds.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BreedImages)> {
        self.breeds.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.breeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breeds.is_empty()
    }

    /// Wait for outstanding refills across all breeds.
    pub async fn settle(&self) {
        for images in self.breeds.values() {
            images.settle().await;
        }
    }
}

/// Flatten the taxonomy into breed names: `breed` when it has no sub-breeds,
/// otherwise one `breed-sub` per sub-breed.
pub fn registered_names(taxonomy: &BreedTaxonomy) -> Vec<String> {
    let mut names: Vec<String> = taxonomy
        .iter()
        .flat_map(|(breed, subs)| {
            if subs.is_empty() {
                vec![breed.clone()]
            } else {
                subs.iter().map(|sub| format!("{breed}-{sub}")).collect()
            }
        })
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Loads the breed catalog and reports progress to the gallery.
///
/// Rules:
/// - The taxonomy is fetched once; failure is fatal and reported as `Unavailable`.
/// - Breeds initialize concurrently, at most `max_in_flight` at a time.
/// - A breed that fails to initialize is dropped and leaves the expected total.
/// - `Ready` is sent exactly once, when every remaining breed is initialized.
pub async fn run(
    source: Arc<dyn ImageSource>,
    buffer: BufferOptions,
    max_in_flight: usize,
    events: Sender<CatalogEvent>,
    cancel: CancellationToken,
) -> Result<(), Error> {
    let taxonomy = select! {
        biased;
        _ = cancel.cancelled() => return Ok(()),
        res = source.list_breeds() => res,
    };
    let taxonomy = match taxonomy {
        Ok(taxonomy) => taxonomy,
        Err(err) => {
            let message = err.to_string();
            error!(error = %message, "breed catalog unavailable");
            let _ = events.send(CatalogEvent::Unavailable(message.clone())).await;
            return Err(Error::CatalogUnavailable(message));
        }
    };

    let mut pending: VecDeque<String> = registered_names(&taxonomy).into();
    let mut expected = pending.len();
    info!(breeds = taxonomy.len(), expected, "breed catalog fetched");

    let mut breeds: BTreeMap<String, BreedImages> = BTreeMap::new();
    let mut tasks: JoinSet<Result<BreedImages, Error>> = JoinSet::new();
    let mut in_flight: HashMap<Id, String> = HashMap::new();
    let mut last_percent: Option<u8> = None;
    let max_in_flight = max_in_flight.max(1);

    loop {
        let progress = LoadProgress::new(breeds.len(), expected);
        if last_percent != Some(progress.percent) {
            last_percent = Some(progress.percent);
            debug!(
                initialized = progress.initialized,
                expected = progress.expected,
                percent = progress.percent,
                "catalog progress"
            );
            let _ = events.send(CatalogEvent::Progress(progress)).await;
        }
        if progress.is_complete() {
            break;
        }

        while tasks.len() < max_in_flight {
            let Some(name) = pending.pop_front() else {
                break;
            };
            let source = Arc::clone(&source);
            let cancel = cancel.clone();
            let breed = name.clone();
            let handle = tasks.spawn(async move {
                BreedImages::initialize(breed, source, buffer, cancel).await
            });
            in_flight.insert(handle.id(), name);
        }

        select! {
            biased;
            _ = cancel.cancelled() => {
                info!("cancel received; abandoning catalog load");
                return Ok(());
            }

            joined = tasks.join_next_with_id() => {
                let Some(joined) = joined else {
                    warn!(
                        initialized = breeds.len(),
                        expected,
                        "no breed initializations left; stopping catalog load"
                    );
                    return Ok(());
                };
                let (id, outcome) = match joined {
                    Ok((id, outcome)) => (id, outcome.map_err(Some)),
                    Err(join_err) => (join_err.id(), Err(None)),
                };
                let name = in_flight.remove(&id).unwrap_or_default();
                match outcome {
                    Ok(images) => {
                        debug!(breed = %name, "breed ready");
                        breeds.insert(name, images);
                    }
                    Err(err) => {
                        expected = expected.saturating_sub(1);
                        let reason = match err {
                            Some(err) => format!(
                                "{:#}",
                                anyhow::Error::from(Error::BreedInitFailed {
                                    breed: name.clone(),
                                    source: Box::new(err),
                                })
                            ),
                            None => format!("initialization of {name} aborted"),
                        };
                        warn!(breed = %name, "{reason}; dropping from catalog");
                        let _ = events
                            .send(CatalogEvent::BreedDropped { breed: name, reason })
                            .await;
                    }
                }
            }
        }
    }

    info!(breeds = breeds.len(), "breed catalog ready");
    if events
        .send(CatalogEvent::Ready(Catalog { breeds }))
        .await
        .is_err()
    {
        debug!("gallery gone before catalog became ready");
    }
    Ok(())
}
