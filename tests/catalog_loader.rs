mod common;

use std::sync::Arc;

use breed_gallery::Error;
use breed_gallery::config::BufferOptions;
use breed_gallery::events::CatalogEvent;
use breed_gallery::source::ImageSource;
use breed_gallery::tasks::catalog::{self, Catalog};
use common::{Batch, ScriptedSource};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct Outcome {
    result: Result<(), Error>,
    events: Vec<CatalogEvent>,
}

impl Outcome {
    fn percents(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|ev| match ev {
                CatalogEvent::Progress(p) => Some(p.percent),
                _ => None,
            })
            .collect()
    }

    fn ready(&self) -> Vec<&Catalog> {
        self.events
            .iter()
            .filter_map(|ev| match ev {
                CatalogEvent::Ready(catalog) => Some(catalog),
                _ => None,
            })
            .collect()
    }

    fn dropped(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|ev| match ev {
                CatalogEvent::BreedDropped { breed, .. } => Some(breed.as_str()),
                _ => None,
            })
            .collect()
    }
}

async fn load(source: &Arc<ScriptedSource>, max_in_flight: usize) -> Outcome {
    let (tx, mut rx) = mpsc::channel(256);
    let source: Arc<dyn ImageSource> = source.clone();
    let result = catalog::run(
        source,
        BufferOptions::default(),
        max_in_flight,
        tx,
        CancellationToken::new(),
    )
    .await;
    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    Outcome { result, events }
}

fn assert_monotonic(percents: &[u8]) {
    assert!(
        percents.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {percents:?}"
    );
}

#[tokio::test]
async fn registers_plain_breeds_and_sub_breed_composites() {
    let source = ScriptedSource::new()
        .breed("shiba", &[])
        .breed("hound", &["afghan"])
        .into_arc();
    let outcome = load(&source, 16).await;
    outcome.result.as_ref().unwrap();

    let first = match outcome.events.first() {
        Some(CatalogEvent::Progress(p)) => *p,
        other => panic!("expected initial progress, got {other:?}"),
    };
    assert_eq!(first.expected, 2);
    assert_eq!(first.initialized, 0);

    let ready = outcome.ready();
    assert_eq!(ready.len(), 1, "ready exactly once");
    let names: Vec<&str> = ready[0].names().collect();
    assert_eq!(names, vec!["hound-afghan", "shiba"]);
    assert_eq!(outcome.percents(), vec![0, 50, 100]);
    assert_eq!(source.image_calls_for("hound-afghan"), 1);
    assert_eq!(source.image_calls_for("hound"), 0);
}

#[tokio::test]
async fn unsuccessful_taxonomy_is_fatal_and_initializes_nothing() {
    let source = ScriptedSource::unavailable().into_arc();
    let outcome = load(&source, 16).await;

    assert!(matches!(outcome.result, Err(Error::CatalogUnavailable(_))));
    assert!(matches!(
        outcome.events.as_slice(),
        [CatalogEvent::Unavailable(_)]
    ));
    assert_eq!(source.list_calls(), 1, "no retry");
    assert_eq!(source.image_calls(), 0);
}

#[tokio::test]
async fn failed_breed_is_dropped_without_blocking_readiness() {
    let source = ScriptedSource::new()
        .breed("shiba", &[])
        .breed("hound", &["afghan", "basset"])
        .script("hound-basset", [Batch::Fail], None)
        .into_arc();
    let outcome = load(&source, 16).await;
    outcome.result.as_ref().unwrap();

    assert_eq!(outcome.dropped(), vec!["hound-basset"]);
    let ready = outcome.ready();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].len(), 2);
    assert!(!ready[0].contains("hound-basset"));

    let percents = outcome.percents();
    assert_monotonic(&percents);
    assert_eq!(percents.last(), Some(&100));
}

#[tokio::test]
async fn empty_taxonomy_is_immediately_ready() {
    let source = ScriptedSource::new().into_arc();
    let outcome = load(&source, 16).await;
    outcome.result.as_ref().unwrap();

    assert_eq!(outcome.percents(), vec![100]);
    let ready = outcome.ready();
    assert_eq!(ready.len(), 1);
    assert!(ready[0].is_empty());
}

#[tokio::test]
async fn bounded_initialization_still_loads_every_breed() {
    let source = ScriptedSource::new()
        .breed("akita", &[])
        .breed("beagle", &[])
        .breed("corgi", &["cardigan"])
        .breed("husky", &[])
        .breed("shiba", &[])
        .into_arc();
    let outcome = load(&source, 1).await;
    outcome.result.as_ref().unwrap();

    let ready = outcome.ready();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].len(), 5);
    let percents = outcome.percents();
    assert_monotonic(&percents);
    assert_eq!(percents, vec![0, 20, 40, 60, 80, 100]);

    for (_, images) in ready[0].iter() {
        assert!(images.active().is_some());
        assert!(images.exemplar().is_some());
    }
}

#[tokio::test]
async fn cancelled_load_never_becomes_ready() {
    let source = ScriptedSource::new()
        .breed("shiba", &[])
        .into_arc();
    let (tx, mut rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let dyn_source: Arc<dyn ImageSource> = source.clone();
    catalog::run(dyn_source, BufferOptions::default(), 4, tx, cancel)
        .await
        .unwrap();
    while let Some(ev) = rx.recv().await {
        assert!(!matches!(ev, CatalogEvent::Ready(_)));
    }
}
