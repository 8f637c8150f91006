use std::collections::BTreeMap;

use smartcow_sync::{
    config::AssetCacheConfig,
    sw::{
        cache::{AssetResponse, CacheStorage},
        manifest::{MANIFEST_CONTENT_TYPE, MANIFEST_PATH, WebManifest},
        policy::{AssetRequest, Method},
        worker::{AssetNetwork, AssetWorker, NetworkError, Served, ServedFrom, SwError, WorkerState},
    },
};

const ORIGIN: &str = "https://app.smartcow.com.br";

#[derive(Default)]
struct FakeNetwork {
    offline: bool,
    pages: BTreeMap<String, AssetResponse>,
    requested: Vec<String>,
}

impl FakeNetwork {
    fn serve(&mut self, path: &str, body: &str) {
        let content_type = if path.ends_with(".js") {
            "text/javascript"
        } else {
            "text/html"
        };
        self.pages
            .insert(format!("{ORIGIN}{path}"), AssetResponse::ok(content_type, body));
    }
}

impl AssetNetwork for FakeNetwork {
    fn fetch(&mut self, request: &AssetRequest) -> Result<AssetResponse, NetworkError> {
        self.requested.push(request.path.clone());
        if self.offline {
            return Err(NetworkError::Offline);
        }
        Ok(self
            .pages
            .get(&request.url())
            .cloned()
            .unwrap_or_else(|| AssetResponse::with_status(404)))
    }
}

fn config(version: &str) -> AssetCacheConfig {
    AssetCacheConfig {
        version: version.to_string(),
        origin: ORIGIN.to_string(),
        precache: vec!["/".to_string(), "/index.html".to_string(), "/app.js".to_string()],
        ..AssetCacheConfig::default()
    }
}

fn network() -> FakeNetwork {
    let mut net = FakeNetwork::default();
    net.serve("/", "<html>shell</html>");
    net.serve("/index.html", "<html>shell</html>");
    net.serve("/app.js", "console.log(1)");
    net
}

fn body(served: &Served) -> &str {
    std::str::from_utf8(&served.response.body).expect("utf8")
}

fn activated(version: &str, storage: &mut CacheStorage, net: &mut FakeNetwork) -> AssetWorker {
    let mut worker = AssetWorker::new(config(version));
    worker.install(storage, net).expect("install");
    worker.activate(storage).expect("activate");
    worker
}

#[test]
fn install_precaches_and_skips_waiting() {
    let mut storage = CacheStorage::new();
    let mut net = network();
    let mut worker = AssetWorker::new(config("smartcow-v1"));

    worker.install(&mut storage, &mut net).expect("install");
    assert_eq!(worker.state(), WorkerState::Installed);
    assert!(worker.skip_waiting_requested());
    assert_eq!(storage.get("smartcow-v1").map(|c| c.len()), Some(3));
}

#[test]
fn failed_precache_leaves_worker_redundant() {
    let mut storage = CacheStorage::new();
    let mut net = network();
    net.pages.remove(&format!("{ORIGIN}/app.js"));
    let mut worker = AssetWorker::new(config("smartcow-v1"));

    let err = worker.install(&mut storage, &mut net).expect_err("404 precache");
    assert!(matches!(err, SwError::PrecacheStatus { status: 404, .. }));
    assert_eq!(worker.state(), WorkerState::Redundant);
    assert!(storage.get("smartcow-v1").is_none());
    assert!(matches!(
        worker.activate(&mut storage),
        Err(SwError::InvalidState { .. })
    ));
}

#[test]
fn activate_evicts_older_versions_and_claims_clients() {
    let mut storage = CacheStorage::new();
    let mut net = network();
    activated("smartcow-v1", &mut storage, &mut net);

    let mut next = AssetWorker::new(config("smartcow-v2"));
    next.install(&mut storage, &mut net).expect("install v2");
    assert_eq!(storage.names(), vec!["smartcow-v1".to_string(), "smartcow-v2".to_string()]);

    let evicted = next.activate(&mut storage).expect("activate v2");
    assert_eq!(evicted, vec!["smartcow-v1".to_string()]);
    assert_eq!(storage.names(), vec!["smartcow-v2".to_string()]);
    assert!(next.clients_claimed());
    assert_eq!(next.state(), WorkerState::Activated);
}

#[test]
fn inactive_worker_does_not_intercept() {
    let mut storage = CacheStorage::new();
    let mut net = network();
    let mut worker = AssetWorker::new(config("smartcow-v1"));
    let req = AssetRequest::get(ORIGIN, "/app.js");
    assert_eq!(worker.fetch(&mut storage, &mut net, &req).expect("fetch"), None);
}

#[test]
fn static_assets_are_cache_first_with_background_refresh() {
    let mut storage = CacheStorage::new();
    let mut net = network();
    let mut worker = activated("smartcow-v1", &mut storage, &mut net);
    net.requested.clear();
    net.serve("/app.js", "console.log(2)");

    let req = AssetRequest::get(ORIGIN, "/app.js");
    let served = worker.fetch(&mut storage, &mut net, &req).expect("fetch").expect("handled");
    assert_eq!(served.from, ServedFrom::Cache);
    assert_eq!(body(&served), "console.log(1)");
    assert!(net.requested.is_empty());

    // A second hit does not queue a duplicate refresh.
    worker.fetch(&mut storage, &mut net, &req).expect("fetch");
    assert_eq!(worker.pending_revalidations(), 1);

    let report = worker.revalidate(&mut storage, &mut net);
    assert_eq!(report.refreshed, 1);
    let served = worker.fetch(&mut storage, &mut net, &req).expect("fetch").expect("handled");
    assert_eq!(body(&served), "console.log(2)");
}

#[test]
fn static_miss_goes_to_network_and_fills_cache() {
    let mut storage = CacheStorage::new();
    let mut net = network();
    let mut worker = activated("smartcow-v1", &mut storage, &mut net);
    net.serve("/assets/logo.js", "logo");

    let req = AssetRequest::get(ORIGIN, "/assets/logo.js");
    let served = worker.fetch(&mut storage, &mut net, &req).expect("fetch").expect("handled");
    assert_eq!(served.from, ServedFrom::Network);

    net.offline = true;
    let again = worker.fetch(&mut storage, &mut net, &req).expect("fetch").expect("handled");
    assert_eq!(again.from, ServedFrom::Cache);
    let report = worker.revalidate(&mut storage, &mut net);
    assert_eq!(report.failed, 1);
}

#[test]
fn documents_fall_back_to_cache_then_shell_offline() {
    let mut storage = CacheStorage::new();
    let mut net = network();
    net.serve("/animais", "<html>animais</html>");
    let mut worker = activated("smartcow-v1", &mut storage, &mut net);

    let visited = AssetRequest::navigate(ORIGIN, "/animais");
    let online = worker.fetch(&mut storage, &mut net, &visited).expect("fetch").expect("handled");
    assert_eq!(online.from, ServedFrom::Network);

    net.offline = true;
    let cached = worker.fetch(&mut storage, &mut net, &visited).expect("fetch").expect("handled");
    assert_eq!(cached.from, ServedFrom::CacheFallback);
    assert_eq!(body(&cached), "<html>animais</html>");

    let never_seen = AssetRequest::navigate(ORIGIN, "/financeiro");
    let shell = worker.fetch(&mut storage, &mut net, &never_seen).expect("fetch").expect("handled");
    assert_eq!(shell.from, ServedFrom::CacheFallback);
    assert_eq!(body(&shell), "<html>shell</html>");
}

#[test]
fn passthrough_caches_opportunistically_but_not_errors() {
    let mut storage = CacheStorage::new();
    let mut net = network();
    let mut worker = activated("smartcow-v1", &mut storage, &mut net);
    net.serve("/config.json", "{}");

    let ok = AssetRequest::get(ORIGIN, "/config.json");
    let missing = AssetRequest::get(ORIGIN, "/nada.json");
    worker.fetch(&mut storage, &mut net, &ok).expect("fetch");
    let not_found = worker.fetch(&mut storage, &mut net, &missing).expect("fetch").expect("handled");
    assert_eq!(not_found.response.status, 404);

    net.offline = true;
    let fallback = worker.fetch(&mut storage, &mut net, &ok).expect("fetch").expect("handled");
    assert_eq!(fallback.from, ServedFrom::CacheFallback);
    assert!(matches!(
        worker.fetch(&mut storage, &mut net, &missing),
        Err(SwError::Network(NetworkError::Offline))
    ));
}

#[test]
fn foreign_and_non_get_requests_are_ignored() {
    let mut storage = CacheStorage::new();
    let mut net = network();
    let mut worker = activated("smartcow-v1", &mut storage, &mut net);
    net.requested.clear();

    let post = AssetRequest::get(ORIGIN, "/rest/v1/animais").with_method(Method::Post);
    let api = AssetRequest::get("https://xyz.supabase.co", "/rest/v1/animais");
    assert_eq!(worker.fetch(&mut storage, &mut net, &post).expect("fetch"), None);
    assert_eq!(worker.fetch(&mut storage, &mut net, &api).expect("fetch"), None);
    assert!(net.requested.is_empty());
}

#[test]
fn bundled_manifest_is_served_from_cache() {
    let mut storage = CacheStorage::new();
    let mut net = network();
    let mut cfg = config("smartcow-v1");
    cfg.precache.push(MANIFEST_PATH.to_string());
    let mut worker = AssetWorker::new(cfg).with_manifest(WebManifest::default());
    worker.install(&mut storage, &mut net).expect("install");
    worker.activate(&mut storage).expect("activate");
    assert!(!net.requested.iter().any(|p| p == MANIFEST_PATH));

    net.offline = true;
    let req = AssetRequest::get(ORIGIN, MANIFEST_PATH);
    let served = worker.fetch(&mut storage, &mut net, &req).expect("fetch").expect("handled");
    assert_eq!(served.from, ServedFrom::Cache);
    assert_eq!(served.response.content_type.as_deref(), Some(MANIFEST_CONTENT_TYPE));
    let manifest: WebManifest = serde_json::from_slice(&served.response.body).expect("manifest json");
    assert_eq!(manifest, WebManifest::default());
}
