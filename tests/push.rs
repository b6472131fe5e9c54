use async_trait::async_trait;
use porter::copy::{CopyRequest, Copier};
use porter::events::{EventKind, MemorySink};
use porter::push::{PushOptions, Pusher};
use porter::storage::images::{ImageStore, StorageReference};
use porter::storage::paths::PorterPaths;
use porter::transport::{Transport, TransportReference, TransportRegistry};
use porter::{PorterError, Result};
use std::sync::Mutex;
use tempfile::TempDir;

const IMAGE_ID: &str = "4f1e2d3c4b5a69788796a5b4c3d2e1f0";

#[derive(Debug, Clone)]
struct Call {
    source: StorageReference,
    destination: String,
    archive_tags: Vec<String>,
}

/// Copy engine that records every call and refuses one destination
#[derive(Default)]
struct RecordingCopier {
    calls: Mutex<Vec<Call>>,
    fail_on: Option<String>,
}

impl RecordingCopier {
    fn failing_on(destination: &str) -> Self {
        Self {
            fail_on: Some(destination.to_string()),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn destinations(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.destination).collect()
    }
}

#[async_trait]
impl Copier for RecordingCopier {
    async fn copy(
        &self,
        source: &StorageReference,
        destination: &TransportReference,
        request: &CopyRequest<'_>,
    ) -> Result<Vec<u8>> {
        let destination = destination.to_string();
        self.calls.lock().unwrap().push(Call {
            source: source.clone(),
            destination: destination.clone(),
            archive_tags: request.archive_tags.iter().map(|t| t.tag().to_string()).collect(),
        });

        if self.fail_on.as_deref() == Some(destination.as_str()) {
            return Err(PorterError::Copy(format!("refused {destination}")));
        }
        Ok(format!("manifest for {destination}").into_bytes())
    }
}

struct Fixture {
    _tmp: TempDir,
    store: ImageStore,
    transports: TransportRegistry,
    events: MemorySink,
}

impl Fixture {
    fn with_tags(tags: &[&str]) -> Self {
        let tmp = TempDir::new().unwrap();
        let paths = PorterPaths::with_root(tmp.path());
        paths.ensure_directories().unwrap();

        let store = ImageStore::new(&paths).unwrap();
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        store.store(IMAGE_ID, &tags, None, &[], 0).unwrap();

        Self {
            _tmp: tmp,
            store,
            transports: TransportRegistry::default(),
            events: MemorySink::new(),
        }
    }

    fn pusher<'a>(&'a self, copier: &'a RecordingCopier) -> Pusher<'a> {
        Pusher::new(&self.store, &self.transports, copier, Some(&self.events))
    }
}

fn all_tags() -> PushOptions {
    PushOptions {
        all_tags: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn empty_destination_defaults_to_resolved_source_name() {
    let fixture = Fixture::with_tags(&["docker.io/library/app:latest"]);
    let copier = RecordingCopier::default();

    let manifest = fixture.pusher(&copier).push("app", "", None).await.unwrap();

    assert_eq!(
        manifest.as_deref(),
        Some(&b"manifest for docker://docker.io/library/app:latest"[..])
    );
    assert_eq!(copier.calls()[0].source.id, IMAGE_ID);
    assert_eq!(fixture.events.events()[0].name, "docker.io/library/app:latest");
}

#[tokio::test]
async fn unknown_source_is_not_found() {
    let fixture = Fixture::with_tags(&["quay.io/org/app:v1"]);
    let copier = RecordingCopier::default();

    let err = fixture
        .pusher(&copier)
        .push("quay.io/org/other:v1", "quay.io/org/other:v1", None)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(copier.calls().is_empty());
    assert!(fixture.events.events().is_empty());
}

#[tokio::test]
async fn bare_destination_falls_back_to_registry() {
    let fixture = Fixture::with_tags(&["quay.io/org/app:v1"]);
    let copier = RecordingCopier::default();

    fixture
        .pusher(&copier)
        .push("quay.io/org/app:v1", "localhost:5000/app:v2", None)
        .await
        .unwrap();

    assert_eq!(copier.destinations(), ["docker://localhost:5000/app:v2"]);
}

#[tokio::test]
async fn unparseable_destination_fails_without_event() {
    let fixture = Fixture::with_tags(&["quay.io/org/app:v1"]);
    let copier = RecordingCopier::default();

    let err = fixture
        .pusher(&copier)
        .push("quay.io/org/app:v1", "Not A Destination", None)
        .await
        .unwrap_err();

    assert!(matches!(err, PorterError::TransportResolution { .. }));
    assert!(copier.calls().is_empty());
    assert!(fixture.events.events().is_empty());
}

#[tokio::test]
async fn successful_push_emits_one_event() {
    let fixture = Fixture::with_tags(&["quay.io/org/app:v1"]);
    let copier = RecordingCopier::default();

    fixture
        .pusher(&copier)
        .push("quay.io/org/app:v1", "quay.io/mirror/app:v1", None)
        .await
        .unwrap();

    let events = fixture.events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::ImagePush);
    assert_eq!(events[0].id, IMAGE_ID);
    assert_eq!(events[0].name, "quay.io/mirror/app:v1");
}

#[tokio::test]
async fn failed_copy_still_records_event() {
    let fixture = Fixture::with_tags(&["quay.io/org/app:v1"]);
    let copier = RecordingCopier::failing_on("docker://quay.io/mirror/app:v1");

    let err = fixture
        .pusher(&copier)
        .push("quay.io/org/app:v1", "quay.io/mirror/app:v1", None)
        .await
        .unwrap_err();

    assert!(matches!(err, PorterError::Copy(_)));
    assert_eq!(fixture.events.events().len(), 1);
}

#[tokio::test]
async fn all_tags_rejects_explicit_tag() {
    let fixture = Fixture::with_tags(&["quay.io/org/app:v1"]);
    let copier = RecordingCopier::default();
    let pusher = fixture.pusher(&copier);

    for destination in ["quay.io/mirror/app:v1", "docker://quay.io/mirror/app:v1", "localhost:5000/app"] {
        let err = pusher
            .push("quay.io/org/app:v1", destination, Some(&all_tags()))
            .await
            .unwrap_err();
        assert!(matches!(err, PorterError::ConflictingTag(_)), "{destination}");
    }

    assert!(copier.calls().is_empty());
    assert!(fixture.events.events().is_empty());
}

#[tokio::test]
async fn all_tags_requires_registry_transport() {
    let fixture = Fixture::with_tags(&["quay.io/org/app:v1"]);
    let copier = RecordingCopier::default();
    let pusher = fixture.pusher(&copier).with_default_transport(Transport::Dir);

    let err = pusher
        .push("quay.io/org/app:v1", "/tmp/porter-out", Some(&all_tags()))
        .await
        .unwrap_err();

    assert!(matches!(err, PorterError::UnsupportedMode(_)));
    assert!(copier.calls().is_empty());
    assert!(fixture.events.events().is_empty());
}

#[tokio::test]
async fn all_tags_pushes_each_tag_in_order() {
    let fixture = Fixture::with_tags(&["quay.io/org/app:v1", "quay.io/org/app:v2"]);
    let copier = RecordingCopier::default();

    let result = fixture
        .pusher(&copier)
        .push("quay.io/org/app:v1", "docker://quay.io/mirror/app", Some(&all_tags()))
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(
        copier.destinations(),
        ["docker://quay.io/mirror/app:v1", "docker://quay.io/mirror/app:v2"]
    );

    let names: Vec<String> = fixture.events.events().into_iter().map(|e| e.name).collect();
    assert_eq!(names, ["docker://quay.io/mirror/app:v1", "docker://quay.io/mirror/app:v2"]);
}

#[tokio::test]
async fn all_tags_stops_at_first_failure() {
    let fixture = Fixture::with_tags(&["quay.io/org/app:v1", "quay.io/org/app:v2"]);
    let copier = RecordingCopier::failing_on("docker://quay.io/mirror/app:v1");

    let err = fixture
        .pusher(&copier)
        .push("quay.io/org/app:v1", "quay.io/mirror/app", Some(&all_tags()))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Copy error: refused docker://quay.io/mirror/app:v1");
    assert_eq!(copier.destinations(), ["docker://quay.io/mirror/app:v1"]);
}

#[tokio::test]
async fn all_tags_without_tags_pushes_nothing() {
    let fixture = Fixture::with_tags(&[]);
    let copier = RecordingCopier::default();

    let result = fixture
        .pusher(&copier)
        .push(IMAGE_ID, "quay.io/mirror/app", Some(&all_tags()))
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(copier.calls().is_empty());
}

#[tokio::test]
async fn archive_destination_preserves_explicit_tag() {
    let fixture = Fixture::with_tags(&["quay.io/org/app:v1"]);
    let copier = RecordingCopier::default();
    let pusher = fixture
        .pusher(&copier)
        .with_default_transport(Transport::DockerArchive);

    pusher.push("quay.io/org/app:v1", "app:v7", None).await.unwrap();
    pusher
        .push("quay.io/org/app:v1", "docker-archive:/tmp/app.tar", None)
        .await
        .unwrap();

    let calls = copier.calls();
    assert_eq!(calls[0].archive_tags, ["v7"]);
    assert!(calls[1].archive_tags.is_empty());
}

#[tokio::test]
async fn registry_destination_has_no_archive_tags() {
    let fixture = Fixture::with_tags(&["quay.io/org/app:v1", "quay.io/org/app:v2"]);
    let copier = RecordingCopier::default();

    fixture
        .pusher(&copier)
        .push("quay.io/org/app:v1", "quay.io/mirror/app", Some(&all_tags()))
        .await
        .unwrap();

    assert!(copier.calls().iter().all(|c| c.archive_tags.is_empty()));
}
