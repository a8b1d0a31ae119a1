//! Query-store transport: builder translation and PostgREST wire format.

use super::mock_server::MockServerFixture;
use super::support::{service_with, CountingExecutor, RecordingStore};
use fait_api::store::{StoreError, StoreResponse};
use fait_api::types::{FilterOperator, FilterParam, Pagination, SortParam};
use fait_api::{HttpMethod, RequestConfig};
use mockito::Matcher;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

fn api(store: &RecordingStore) -> fait_api::ApiService {
    service_with(Arc::new(CountingExecutor::new(json!(null))), store.clone())
}

#[derive(Debug, Deserialize, PartialEq)]
struct Booking {
    id: u32,
}

#[tokio::test]
async fn test_get_translates_to_builder_calls_in_order() {
    let store = RecordingStore::new();
    let config = RequestConfig::default()
        .select("id,status")
        .filter(FilterParam::new("status", FilterOperator::Eq, "confirmed"))
        .filter(FilterParam::new("total", FilterOperator::Gte, 100))
        .sort(SortParam::desc("created_at"))
        .sort(SortParam::asc("id"))
        .paginate(Pagination::page(2, 10));

    api(&store).get::<Vec<Value>>("bookings", config).await.unwrap();

    assert_eq!(
        store.calls(),
        vec![
            "from(bookings)",
            "select(id,status)",
            r#"eq(status, "confirmed")"#,
            "gte(total, 100)",
            "order(created_at, false)",
            "order(id, true)",
            "range(10, 19)",
        ]
    );
}

#[tokio::test]
async fn test_default_projection_and_limit_only() {
    let store = RecordingStore::new();
    let config = RequestConfig::default().with_param("pagination", json!({"limit": 5}));
    api(&store).get::<Vec<Value>>("bookings", config).await.unwrap();
    assert_eq!(store.calls(), vec!["from(bookings)", "select(*)", "limit(5)"]);
}

#[tokio::test]
async fn test_prefix_and_suffix_filters_become_like() {
    let store = RecordingStore::new();
    let config = RequestConfig::default()
        .filter(FilterParam::new("name", FilterOperator::StartsWith, "Jo"))
        .filter(FilterParam::new("email", FilterOperator::EndsWith, "Jo"));
    api(&store).get::<Vec<Value>>("contractors", config).await.unwrap();
    assert_eq!(
        store.calls()[2..],
        ["like(name, Jo%)".to_string(), "like(email, %Jo)".to_string()]
    );
}

#[tokio::test]
async fn test_unknown_operator_fails_before_any_builder_call() {
    let store = RecordingStore::new();
    let config = RequestConfig::default().with_param(
        "filters",
        json!([{"field": "total", "operator": "between", "value": [1, 5]}]),
    );
    let err = api(&store).get::<Value>("invoices", config).await.unwrap_err();
    assert_eq!(err.code.as_deref(), Some("INVALID_FILTER_OPERATOR"));
    assert!(store.calls().is_empty());
    assert_eq!(store.executions(), 0);
}

#[tokio::test]
async fn test_single_row_modes() {
    let store = RecordingStore::replying(Ok(StoreResponse::ok(json!({"id": 3}))));
    let one = api(&store)
        .get::<Booking>("bookings", RequestConfig::default().single())
        .await
        .unwrap();
    assert_eq!(one.data, Booking { id: 3 });
    assert_eq!(store.calls().last().map(String::as_str), Some("single()"));

    let store = RecordingStore::replying(Ok(StoreResponse::ok(Value::Null)));
    let none = api(&store)
        .get::<Option<Booking>>("bookings", RequestConfig::default().maybe_single())
        .await
        .unwrap();
    assert!(none.data.is_none());
    assert_eq!(store.calls().last().map(String::as_str), Some("maybe_single()"));
}

#[tokio::test]
async fn test_writes_dispatch_by_method() {
    let store = RecordingStore::new();
    let svc = api(&store);
    let by_id = || RequestConfig::default().filter(FilterParam::new("id", FilterOperator::Eq, 9));

    svc.post::<Value>("bookings", json!({"slot": "am"}), RequestConfig::default()).await.unwrap();
    svc.put::<Value>("bookings", json!({"id": 9, "slot": "pm"}), RequestConfig::default()).await.unwrap();
    svc.patch::<Value>("bookings", json!({"slot": "eve"}), by_id()).await.unwrap();
    svc.delete::<Value>("bookings", by_id()).await.unwrap();

    assert_eq!(
        store.calls(),
        vec![
            "from(bookings)",
            r#"insert({"slot":"am"})"#,
            "from(bookings)",
            r#"upsert({"id":9,"slot":"pm"})"#,
            "from(bookings)",
            r#"update({"slot":"eve"})"#,
            "eq(id, 9)",
            "from(bookings)",
            "delete()",
            "eq(id, 9)",
        ]
    );
}

#[tokio::test]
async fn test_write_without_body_is_invalid() {
    let store = RecordingStore::new();
    let config = RequestConfig::new(HttpMethod::Post, "bookings");
    let err = api(&store).request_raw(&config).await.unwrap_err();
    assert_eq!(err.code.as_deref(), Some("ERR_INVALID_REQUEST"));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_no_rows_maps_to_not_found() {
    let store = RecordingStore::replying(Err(StoreError::no_rows()));
    let err = api(&store)
        .get::<Value>("bookings", RequestConfig::default().single())
        .await
        .unwrap_err();
    assert_eq!(err.status, Some(404));
    assert_eq!(err.code.as_deref(), Some("PGRST116"));
}

#[tokio::test]
async fn test_store_reads_are_cached() {
    let store = RecordingStore::replying(Ok(StoreResponse::ok(json!([{"id": 1}]))));
    let svc = api(&store);
    svc.get::<Vec<Booking>>("bookings", RequestConfig::default()).await.unwrap();
    let second = svc.get::<Vec<Booking>>("bookings", RequestConfig::default()).await.unwrap();
    assert!(second.cached);
    assert_eq!(store.executions(), 1);
    assert_eq!(svc.invalidate_path("bookings"), 1);
    svc.get::<Vec<Booking>>("bookings", RequestConfig::default()).await.unwrap();
    assert_eq!(store.executions(), 2);
}

#[tokio::test]
async fn test_postgrest_select_wire_format() {
    let mut fx = MockServerFixture::new().await;
    let mock = fx
        .server
        .mock("GET", "/rest/v1/invoices")
        .match_header("apikey", "anon-key")
        .match_header("authorization", "Bearer anon-key")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("select".into(), "*".into()),
            Matcher::UrlEncoded("status".into(), "eq.sent".into()),
            Matcher::UrlEncoded("order".into(), "created_at.desc".into()),
            Matcher::UrlEncoded("limit".into(), "10".into()),
            Matcher::UrlEncoded("offset".into(), "20".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("content-range", "20-29/57")
        .with_body(r#"[{"id": 21}]"#)
        .create_async()
        .await;

    let config = RequestConfig::default()
        .filter(FilterParam::new("status", FilterOperator::Eq, "sent"))
        .sort(SortParam::desc("created_at"))
        .paginate(Pagination::limit_offset(10, 20));
    let resp = fx.store_api("anon-key").get::<Vec<Value>>("invoices", config).await.unwrap();

    mock.assert_async().await;
    assert_eq!(resp.data, vec![json!({"id": 21})]);
    assert_eq!(resp.header("x-total-count"), Some("57"));
}

#[tokio::test]
async fn test_postgrest_single_and_upsert_headers() {
    let mut fx = MockServerFixture::new().await;
    let single = fx
        .server
        .mock("GET", "/rest/v1/bookings")
        .match_query(Matcher::UrlEncoded("id".into(), "eq.4".into()))
        .match_header("accept", "application/vnd.pgrst.object+json")
        .with_status(406)
        .with_header("content-type", "application/json")
        .with_body(r#"{"code": "PGRST116", "message": "JSON object requested, multiple (or no) rows returned", "details": "The result contains 0 rows", "hint": null}"#)
        .create_async()
        .await;
    let upsert = fx
        .server
        .mock("POST", "/rest/v1/bookings")
        .match_query(Matcher::Any)
        .match_header("prefer", "return=representation,resolution=merge-duplicates")
        .match_body(Matcher::Json(json!({"id": 4, "slot": "am"})))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": 4, "slot": "am"}]"#)
        .create_async()
        .await;

    let api = fx.store_api("k");
    let err = api
        .get::<Value>(
            "bookings",
            RequestConfig::default()
                .filter(FilterParam::new("id", FilterOperator::Eq, 4))
                .single(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status, Some(404));
    assert_eq!(err.code.as_deref(), Some("PGRST116"));
    assert_eq!(err.details, Some(json!("The result contains 0 rows")));

    let resp = api
        .put::<Vec<Value>>("bookings", json!({"id": 4, "slot": "am"}), RequestConfig::default())
        .await
        .unwrap();
    assert_eq!(resp.status, 201);
    single.assert_async().await;
    upsert.assert_async().await;
}

#[tokio::test]
async fn test_postgrest_error_body_passes_through() {
    let mut fx = MockServerFixture::new().await;
    let _m = fx
        .mock_json(
            "POST",
            "/rest/v1/bookings",
            409,
            r#"{"code": "23505", "message": "duplicate key value violates unique constraint", "details": "Key (id)=(4) already exists.", "hint": null}"#,
        )
        .await;

    let err = fx
        .store_api("k")
        .post::<Value>("bookings", json!({"id": 4}), RequestConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.status, Some(409));
    assert_eq!(err.code.as_deref(), Some("23505"));
    assert_eq!(err.message, "duplicate key value violates unique constraint");
}
