use crate::tasks::catalog::Catalog;

/// How far the catalog load has come.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub initialized: usize,
    pub expected: usize,
    pub percent: u8,
}

impl LoadProgress {
    pub fn new(initialized: usize, expected: usize) -> Self {
        let percent = if expected == 0 {
            100
        } else {
            ((initialized as f64 / expected as f64) * 100.0).round() as u8
        };
        Self {
            initialized,
            expected,
            percent: percent.min(100),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.initialized == self.expected
    }
}

/// Emitted by the catalog loader task, consumed by the gallery.
#[derive(Debug)]
pub enum CatalogEvent {
    Progress(LoadProgress),
    BreedDropped { breed: String, reason: String },
    Ready(Catalog),
    Unavailable(String),
}
