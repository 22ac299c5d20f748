#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use breed_gallery::source::{BreedTaxonomy, ImageSource, SourceError};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// What one `random_images` call returns.
#[derive(Debug, Clone)]
pub enum Batch {
    Images(usize),
    Empty,
    Fail,
    /// Waits for a permit on the semaphore, then returns that many images.
    Gated(Arc<Semaphore>, usize),
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Batch>,
    then: Option<Batch>,
}

/// In-memory catalog. Unscripted breeds get `count` fresh URLs per call.
pub struct ScriptedSource {
    taxonomy: Option<BreedTaxonomy>,
    scripts: Mutex<HashMap<String, Script>>,
    serial: AtomicUsize,
    list_calls: AtomicUsize,
    image_calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            taxonomy: Some(BreedTaxonomy::new()),
            scripts: Mutex::new(HashMap::new()),
            serial: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            image_calls: Mutex::new(HashMap::new()),
        }
    }

    /// A source whose breed list call reports `status: error`.
    pub fn unavailable() -> Self {
        Self {
            taxonomy: None,
            ..Self::new()
        }
    }

    /// Add a breed (with its sub-breeds) to the taxonomy.
    pub fn breed(mut self, name: &str, subs: &[&str]) -> Self {
        if let Some(taxonomy) = self.taxonomy.as_mut() {
            taxonomy.insert(name.to_string(), subs.iter().map(|s| s.to_string()).collect());
        }
        self
    }

    /// Queue batches for a breed; `then` answers every call after the queue runs dry.
    pub fn script(
        self,
        breed: &str,
        batches: impl IntoIterator<Item = Batch>,
        then: Option<Batch>,
    ) -> Self {
        self.scripts.lock().insert(
            breed.to_string(),
            Script {
                queue: batches.into_iter().collect(),
                then,
            },
        );
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.lock().values().sum()
    }

    pub fn image_calls_for(&self, breed: &str) -> usize {
        self.image_calls.lock().get(breed).copied().unwrap_or(0)
    }

    fn urls(&self, breed: &str, n: usize) -> Vec<String> {
        (0..n)
            .map(|_| {
                let serial = self.serial.fetch_add(1, Ordering::SeqCst);
                format!("https://images.test/{breed}/{serial}.jpg")
            })
            .collect()
    }

    fn next_batch(&self, breed: &str, count: usize) -> Batch {
        let mut scripts = self.scripts.lock();
        match scripts.get_mut(breed) {
            Some(script) => script
                .queue
                .pop_front()
                .or_else(|| script.then.clone())
                .unwrap_or(Batch::Images(count)),
            None => Batch::Images(count),
        }
    }
}

#[async_trait]
impl ImageSource for ScriptedSource {
    async fn list_breeds(&self) -> Result<BreedTaxonomy, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.taxonomy.clone().ok_or_else(|| SourceError::Unsuccessful {
            status: "error".into(),
            message: "catalog offline".into(),
        })
    }

    async fn random_images(&self, breed: &str, count: usize) -> Result<Vec<String>, SourceError> {
        *self.image_calls.lock().entry(breed.to_string()).or_default() += 1;
        match self.next_batch(breed, count) {
            Batch::Images(n) => Ok(self.urls(breed, n)),
            Batch::Empty => Ok(Vec::new()),
            Batch::Fail => Err(SourceError::Unsuccessful {
                status: "error".into(),
                message: "Breed not found".into(),
            }),
            Batch::Gated(gate, n) => {
                let permit = gate.acquire().await.expect("gate closed");
                permit.forget();
                Ok(self.urls(breed, n))
            }
        }
    }
}
