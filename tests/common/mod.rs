use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use klaxon::archive::{ArchiveEndpoints, CaptureClient, SnapshotResolver};
use klaxon::fetch::Fetcher;
use klaxon::monitor::{Monitor, PersistedState, WatchTarget};
use klaxon::notify::{ArtifactSink, StatusReporter};
use klaxon::store::EventStore;
use klaxon::Result;

/// In-memory event store that counts writes, so tests can assert the
/// at-most-one-watermark-write rule.
#[derive(Default)]
pub struct CountingStore {
    state: Mutex<PersistedState>,
    saves: AtomicUsize,
}

impl CountingStore {
    pub fn seeded(timestamp: &str) -> Self {
        Self {
            state: Mutex::new(PersistedState {
                last_timestamp: Some(timestamp.parse().expect("seed timestamp")),
            }),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> PersistedState {
        self.state.lock().expect("store lock").clone()
    }
}

#[async_trait]
impl EventStore for CountingStore {
    async fn load(&self) -> Result<PersistedState> {
        Ok(self.current())
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        *self.state.lock().expect("store lock") = state.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Artifact sink that keeps uploads in memory.
#[derive(Default)]
pub struct MemoryArtifactSink {
    uploads: Mutex<Vec<Vec<u8>>>,
}

impl MemoryArtifactSink {
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().expect("sink lock").len()
    }

    pub fn last_upload(&self) -> Option<Vec<u8>> {
        self.uploads.lock().expect("sink lock").last().cloned()
    }
}

#[async_trait]
impl ArtifactSink for MemoryArtifactSink {
    async fn upload(&self, artifact: &[u8]) -> Result<String> {
        let mut uploads = self.uploads.lock().expect("sink lock");
        uploads.push(artifact.to_vec());
        Ok(format!("memory://artifact/{}", uploads.len()))
    }
}

/// Status reporter that swallows progress lines.
pub struct NullStatus;

impl StatusReporter for NullStatus {
    fn set_message(&self, _text: &str) {}
}

/// Everything a monitor scenario needs: a mock archive server, counting
/// fakes for the collaborators, and a monitor pointed at all of them.
pub struct Harness {
    pub server: MockServer,
    pub store: Arc<CountingStore>,
    pub artifacts: Arc<MemoryArtifactSink>,
    pub monitor: Monitor,
}

impl Harness {
    pub async fn new(store: CountingStore) -> Self {
        let server = MockServer::start().await;
        let endpoints = ArchiveEndpoints {
            availability_base: server.uri(),
            web_base: server.uri(),
        };

        // Two attempts with a near-zero backoff keep retry scenarios fast
        let fetcher = Fetcher::new(Duration::from_secs(5), 2)
            .expect("fetcher")
            .with_initial_backoff(Duration::from_millis(10));

        let store = Arc::new(store);
        let artifacts = Arc::new(MemoryArtifactSink::default());
        let monitor = Monitor::new(
            fetcher.clone(),
            SnapshotResolver::new(fetcher.clone(), endpoints.clone()),
            CaptureClient::new(fetcher, endpoints, Vec::new()),
            store.clone(),
            artifacts.clone(),
            Arc::new(NullStatus),
        );

        Self {
            server,
            store,
            artifacts,
            monitor,
        }
    }

    /// A watch target whose live page is served by the mock server
    pub fn target(&self, selector: &str, exclude: Option<&str>) -> WatchTarget {
        WatchTarget {
            url: format!("{}/live", self.server.uri()),
            selector: selector.to_string(),
            exclude_selector: exclude.map(String::from),
        }
    }

    /// Mount the availability endpoint
    pub async fn mount_availability(&self, available: bool, expect: impl Into<wiremock::Times>) {
        let body = if available {
            serde_json::json!({
                "archived_snapshots": {
                    "closest": {
                        "available": true,
                        "status": "200",
                        "timestamp": "20240101000000"
                    }
                }
            })
        } else {
            serde_json::json!({ "archived_snapshots": {} })
        };

        Mock::given(method("GET"))
            .and(path("/wayback/available"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(expect)
            .mount(&self.server)
            .await;
    }

    /// Mount the CDX index endpoint with raw rows (header row included)
    pub async fn mount_index(&self, rows: serde_json::Value, expect: impl Into<wiremock::Times>) {
        Mock::given(method("GET"))
            .and(path("/cdx/search/cdx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .expect(expect)
            .mount(&self.server)
            .await;
    }

    /// Mount the raw-snapshot endpoint for any timestamp
    pub async fn mount_archived_page(&self, html: &str, expect: impl Into<wiremock::Times>) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/web/\d{14}id_/.*$"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .expect(expect)
            .mount(&self.server)
            .await;
    }

    /// Mount the live page
    pub async fn mount_live_page(&self, html: &str, expect: impl Into<wiremock::Times>) {
        Mock::given(method("GET"))
            .and(path("/live"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .expect(expect)
            .mount(&self.server)
            .await;
    }

    /// Mount the save-page endpoint answering with a fresh capture
    pub async fn mount_capture_success(&self, timestamp: &str, expect: impl Into<wiremock::Times>) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/save/.*$"))
            .respond_with(ResponseTemplate::new(200).insert_header(
                "content-location",
                format!("/web/{}/https://example.com", timestamp).as_str(),
            ))
            .expect(expect)
            .mount(&self.server)
            .await;
    }

    /// Mount the save-page endpoint answering from its debounce cache
    pub async fn mount_capture_cached(&self, expect: impl Into<wiremock::Times>) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/save/.*$"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-page-cache", "HIT")
                    .set_body_string("cached"),
            )
            .expect(expect)
            .mount(&self.server)
            .await;
    }

    /// Mount the save-page endpoint answering without any capture address
    pub async fn mount_capture_broken(&self, expect: impl Into<wiremock::Times>) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/save/.*$"))
            .respond_with(ResponseTemplate::new(200).set_body_string("capture pending"))
            .expect(expect)
            .mount(&self.server)
            .await;
    }
}

/// Standard CDX index body: header row plus captures
pub fn index_rows(rows: &[(&str, &str)]) -> serde_json::Value {
    let mut body = vec![vec![
        "urlkey".to_string(),
        "timestamp".to_string(),
        "original".to_string(),
        "mimetype".to_string(),
        "statuscode".to_string(),
        "digest".to_string(),
        "length".to_string(),
    ]];
    for (timestamp, status) in rows {
        body.push(vec![
            "com,example)/live".to_string(),
            timestamp.to_string(),
            "https://example.com/live".to_string(),
            "text/html".to_string(),
            status.to_string(),
            "ABCDEF".to_string(),
            "1024".to_string(),
        ]);
    }
    serde_json::json!(body)
}
