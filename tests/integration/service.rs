//! Facade routing, interceptor fan-out and config merging.

use super::support::{service_with, CountingExecutor, RecordingStore};
use fait_api::store::StoreError;
use fait_api::{
    interceptor_fn, ApiError, ApiService, CachePolicy, InterceptorHandle, RawResponse,
    RequestConfig, TransportKind,
};
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn fake_service() -> (ApiService, Arc<CountingExecutor>, RecordingStore) {
    let exec = Arc::new(CountingExecutor::new(json!({"ok": true})));
    let store = RecordingStore::new();
    (service_with(exec.clone(), store.clone()), exec, store)
}

#[test]
fn test_routing_table() {
    let (api, _, _) = fake_service();
    let route = |c: RequestConfig| api.route(&c);

    assert_eq!(route(RequestConfig::get("bookings")), TransportKind::Store);
    assert_eq!(route(RequestConfig::get("/bookings")), TransportKind::Http);
    assert_eq!(route(RequestConfig::get("https://x.test/bookings")), TransportKind::Http);
    assert_eq!(
        route(RequestConfig::get("/bookings").with_header("X-Client", "store")),
        TransportKind::Store
    );
    assert_eq!(
        route(RequestConfig::get("bookings").with_header("x-client", "http")),
        TransportKind::Http
    );
    assert_eq!(
        route(
            RequestConfig::get("/bookings")
                .with_header("x-client", "store")
                .with_client(TransportKind::Http)
        ),
        TransportKind::Http
    );
}

#[tokio::test]
async fn test_client_header_reaches_store() {
    let (api, exec, store) = fake_service();
    let config = RequestConfig::default().with_header("x-client", "store");
    assert_ok!(api.get::<Value>("/bookings", config).await);
    assert_eq!(store.calls()[0], "from(bookings)");
    assert_eq!(exec.calls(), 0);
}

#[tokio::test]
async fn test_request_interceptor_applies_to_both_transports() {
    let (api, _, _) = fake_service();
    let handle = api.add_request_interceptor(interceptor_fn(|c: RequestConfig| {
        Ok(c.with_header("x-tenant", "acme"))
    }));

    let http = assert_ok!(api.get::<Value>("/invoices", RequestConfig::default().without_cache()).await);
    let store = assert_ok!(api.get::<Value>("invoices", RequestConfig::default().without_cache()).await);
    assert_eq!(http.config.header("x-tenant"), Some("acme"));
    assert_eq!(store.config.header("x-tenant"), Some("acme"));

    assert!(handle.remove());
    let after = assert_ok!(api.get::<Value>("invoices", RequestConfig::default().without_cache()).await);
    assert!(after.config.header("x-tenant").is_none());
}

#[tokio::test]
async fn test_removal_during_stage_takes_effect_next_call() {
    let (api, _, _) = fake_service();
    let later: Arc<Mutex<Option<InterceptorHandle>>> = Arc::new(Mutex::new(None));
    let later_runs = Arc::new(AtomicUsize::new(0));

    let slot = later.clone();
    api.add_request_interceptor(interceptor_fn(move |c: RequestConfig| {
        if let Some(h) = slot.lock().unwrap().as_ref() {
            h.remove();
        }
        Ok(c)
    }));
    let runs = later_runs.clone();
    let handle = api.add_request_interceptor(interceptor_fn(move |c: RequestConfig| {
        runs.fetch_add(1, Ordering::SeqCst);
        Ok(c)
    }));
    *later.lock().unwrap() = Some(handle);

    let config = RequestConfig::default().without_cache();
    assert_ok!(api.get::<Value>("/a", config.clone()).await);
    assert_eq!(later_runs.load(Ordering::SeqCst), 1);
    assert_ok!(api.get::<Value>("/a", config).await);
    assert_eq!(later_runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_error_interceptor_transforms_once() {
    let store = RecordingStore::replying(Err(StoreError::new("boom").with_status(500)));
    let api = service_with(Arc::new(CountingExecutor::new(json!(null))), store);
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    api.add_error_interceptor(interceptor_fn(move |e: ApiError| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(e.with_code("WRAPPED").with_message_context("Could not load bookings"))
    }));

    let err = assert_err!(api.get::<Value>("bookings", RequestConfig::default()).await);
    assert_eq!(err.code.as_deref(), Some("WRAPPED"));
    assert_eq!(err.message, "Could not load bookings");
    assert_eq!(err.status, Some(500));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_response_interceptor_reaches_error_chain() {
    let (api, _, _) = fake_service();
    api.add_response_interceptor(interceptor_fn(|r: RawResponse| {
        if r.status == 200 {
            Err(ApiError::new("rejected by policy"))
        } else {
            Ok(r)
        }
    }));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    api.add_error_interceptor(interceptor_fn(move |e: ApiError| {
        log.lock().unwrap().push(e.message.clone());
        Ok(e)
    }));

    let err = assert_err!(api.get::<Value>("/a", RequestConfig::default()).await);
    assert_eq!(err.message, "rejected by policy");
    assert_eq!(err.config.unwrap().url, "/a");
    assert_eq!(*seen.lock().unwrap(), vec!["rejected by policy".to_string()]);
}

#[tokio::test]
async fn test_cache_hit_still_runs_response_interceptors() {
    let (api, exec, _) = fake_service();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    api.add_response_interceptor(interceptor_fn(move |r: RawResponse| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(r)
    }));

    assert_ok!(api.get::<Value>("/a", RequestConfig::default()).await);
    let hit = assert_ok!(api.get::<Value>("/a", RequestConfig::default()).await);
    assert!(hit.cached);
    assert_eq!(exec.calls(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_merge_keeps_caller_config_untouched() {
    let api = ApiService::builder()
        .base_url("https://api.test")
        .default_header("X-App", "fait")
        .default_header("accept", "application/json")
        .timeout(Duration::from_secs(30))
        .executor(Arc::new(CountingExecutor::new(json!(null))))
        .build()
        .unwrap();

    let caller = RequestConfig::get("/a").with_header("x-app", "override");
    let merged = api.merge_config(&caller);

    assert_eq!(merged.header("x-app"), Some("override"));
    assert_eq!(merged.header("accept"), Some("application/json"));
    assert_eq!(merged.timeout, Some(Duration::from_secs(30)));
    assert_eq!(caller.headers.len(), 1);
    assert!(caller.timeout.is_none());

    let short = api.merge_config(&caller.clone().with_timeout(Duration::from_millis(50)));
    assert_eq!(short.timeout, Some(Duration::from_millis(50)));
}

#[tokio::test]
async fn test_invalidate_path_drops_prefix() {
    let (api, exec, _) = fake_service();
    for url in ["/invoices", "/invoices/1", "/estimates"] {
        assert_ok!(api.get::<Value>(url, RequestConfig::default()).await);
    }
    assert_eq!(api.cache().len(), 3);

    assert_eq!(api.invalidate_path("/invoices"), 2);
    assert_eq!(
        api.cache().keys(),
        vec!["GET:https://api.test/estimates:{}".to_string()]
    );

    assert_ok!(api.get::<Value>("/invoices/1", RequestConfig::default()).await);
    assert_eq!(exec.calls(), 4);
}

#[tokio::test]
async fn test_pattern_invalidation_and_clear() {
    let (api, _, _) = fake_service();
    for url in ["/invoices", "/estimates", "bookings"] {
        assert_ok!(api.get::<Value>(url, RequestConfig::default()).await);
    }
    assert_eq!(assert_ok!(api.invalidate_cache_matching("^GET:https://")), 2);
    assert_eq!(api.cache().keys(), vec!["GET:bookings:{}".to_string()]);

    let bad = assert_err!(api.invalidate_cache_matching("("));
    assert_eq!(bad.code.as_deref(), Some("ERR_CONFIGURATION"));

    api.clear_cache();
    assert!(api.cache().is_empty());
}

#[tokio::test]
async fn test_concurrent_reads_all_resolve() {
    let exec = Arc::new(CountingExecutor::new(json!([1, 2, 3])).with_delay(Duration::from_millis(10)));
    let api = Arc::new(service_with(exec.clone(), RecordingStore::new()));

    let calls = (0..8).map(|_| {
        let api = api.clone();
        async move { api.get::<Vec<u32>>("/numbers", RequestConfig::default()).await }
    });
    let results = join_all(calls).await;

    for r in results {
        assert_eq!(assert_ok!(r).data, vec![1, 2, 3]);
    }
    let after = assert_ok!(api.get::<Vec<u32>>("/numbers", RequestConfig::default()).await);
    assert!(after.cached);
    assert!(exec.calls() >= 1 && exec.calls() <= 8);
}

#[tokio::test]
async fn test_mixed_case_caller_header_beats_default() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/me")
        .match_header("authorization", "Bearer caller")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 1}"#)
        .create_async()
        .await;

    let api = ApiService::builder()
        .base_url(server.url())
        .default_header("Authorization", "Bearer default")
        .build()
        .unwrap();
    let mut config = RequestConfig::default();
    config.headers.insert("Authorization".into(), "Bearer caller".into());

    let merged = api.merge_config(&config);
    assert_eq!(merged.headers.len(), 1);
    assert_eq!(merged.headers["authorization"], "Bearer caller");

    let resp = assert_ok!(api.get::<Value>("/me", config).await);
    mock.assert_async().await;
    assert_eq!(resp.config.header("authorization"), Some("Bearer caller"));
}

#[tokio::test]
async fn test_default_cache_policy_applies_to_every_call() {
    let exec = Arc::new(CountingExecutor::new(json!({"ok": true})));
    let api = ApiService::builder()
        .base_url("https://api.test")
        .default_cache_policy(CachePolicy::disabled())
        .executor(exec.clone())
        .store(Arc::new(RecordingStore::new()))
        .build()
        .unwrap();

    assert_ok!(api.get::<Value>("/a", RequestConfig::default()).await);
    assert_ok!(api.get::<Value>("/a", RequestConfig::default()).await);
    assert_eq!(exec.calls(), 2);
    assert!(api.cache().is_empty());

    let mut opt_in = RequestConfig::default();
    opt_in.cache = CachePolicy::with_ttl(Duration::from_secs(60));
    assert_eq!(api.merge_config(&opt_in).cache.enabled, Some(true));
    assert_ok!(api.get::<Value>("/a", opt_in.clone()).await);
    let hit = assert_ok!(api.get::<Value>("/a", opt_in).await);
    assert!(hit.cached);
    assert_eq!(exec.calls(), 3);
}

#[tokio::test]
async fn test_decode_failure_runs_error_chain() {
    let (api, _, _) = fake_service();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    api.add_error_interceptor(interceptor_fn(move |e: ApiError| {
        log.lock().unwrap().push(e.code.clone().unwrap_or_default());
        Ok(e.with_message_context("Could not read invoices"))
    }));

    let err = assert_err!(api.get::<Vec<u32>>("/invoices", RequestConfig::default()).await);
    assert_eq!(err.code.as_deref(), Some("ERR_DECODE"));
    assert_eq!(err.message, "Could not read invoices");
    assert_eq!(err.status, Some(200));
    assert_eq!(*seen.lock().unwrap(), vec!["ERR_DECODE".to_string()]);
}
