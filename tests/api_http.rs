// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /signals (happy path, invalid config, invalid record)
// - POST /signals/feed (raw posts attributed by cashtag / name)
// - GET /signals/history
// - GET /config, POST /admin/reload-config
// - GET /metrics (detached recorder)

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use std::sync::Arc;
use tower::ServiceExt as _; // for `oneshot`

use crypto_trend_signals::api::{create_router, AppState};
use crypto_trend_signals::config::{EngineConfig, HotReloadConfig};
use crypto_trend_signals::metrics::Metrics;

const BODY_LIMIT: usize = 1024 * 1024;

fn app_with(cfg: EngineConfig) -> (Router, AppState) {
    let state = AppState::new(Arc::new(HotReloadConfig::fixed(cfg)));
    (create_router(state.clone()), state)
}

fn batch_payload() -> Json {
    json!({
        "as_of": "2025-03-01T12:00:00Z",
        "assets": [
            {
                "asset_symbol": "btc",
                "texts": [
                    {"asset_symbol": "BTC", "body": "very bullish breakout", "timestamp": "2025-03-01T11:58:00Z", "source": "post"}
                ],
                "engagement": [
                    {"asset_symbol": "BTC", "mentions": 40, "reactions": 90, "reposts": 12, "timestamp": "2025-03-01T11:59:00Z"}
                ],
                "market": {"asset_symbol": "BTC", "price": 61000.0, "volume_24h": 1.0e9, "price_change_pct": 3.5, "timestamp": "2025-03-01T11:55:00Z"}
            },
            { "asset_symbol": "XYZ" }
        ]
    })
}

fn post_json(uri: &str, body: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build POST")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET")
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _) = app_with(EngineConfig::default());
    let resp = app.oneshot(get("/health")).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap().trim(), "OK");
}

#[tokio::test]
async fn signals_endpoint_returns_outcome_and_records_history() {
    let (app, state) = app_with(EngineConfig::default());

    let resp = app
        .clone()
        .oneshot(post_json("/signals", &batch_payload()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;

    let signals = v["signals"].as_array().expect("signals array");
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0]["asset_symbol"], json!("BTC"));
    assert!(signals[0]["category"].is_string());
    assert!(signals[0]["contributing_factors"]["market"].as_f64().unwrap() > 0.0);
    assert_eq!(signals[0]["generated_at"], json!("2025-03-01T12:00:00Z"));
    assert_eq!(v["stats"]["assets_skipped"], json!(1));
    assert_eq!(v["stats"]["skipped"][0]["reason"], json!("missing_input"));

    assert_eq!(state.history.len(), 1);
    let resp = app.oneshot(get("/signals/history?limit=5")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let h = read_json(resp).await;
    assert_eq!(h.as_array().unwrap().len(), 1);
    assert_eq!(h[0]["asset_symbol"], json!("BTC"));
}

#[tokio::test]
async fn feed_posts_are_attributed_to_assets() {
    let (app, state) = app_with(EngineConfig::default());
    let feed = json!({
        "as_of": "2025-03-01T12:00:00Z",
        "assets": ["eth"],
        "posts": [
            {"body": "Bitcoin breakout, very bullish", "timestamp": "2025-03-01T11:58:00Z"},
            {"body": "$ETH dump incoming, bearish", "timestamp": "2025-03-01T11:57:00Z", "source": "trend"},
            {"body": "nothing about coins here", "timestamp": "2025-03-01T11:57:00Z"}
        ],
        "engagement": [
            {"asset_symbol": "BTC", "mentions": 60, "reactions": 100, "timestamp": "2025-03-01T11:59:00Z"}
        ],
        "market": [
            {"asset_symbol": "BTC", "price": 61000.0, "price_change_pct": 4.0, "timestamp": "2025-03-01T11:55:00Z"}
        ]
    });

    let resp = app.oneshot(post_json("/signals/feed", &feed)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;

    let signals = v["signals"].as_array().expect("signals array");
    let syms: Vec<_> = signals.iter().map(|s| s["asset_symbol"].as_str().unwrap()).collect();
    assert_eq!(syms, vec!["ETH", "BTC"]);
    assert!(signals[0]["composite_score"].as_f64().unwrap() < 0.0);
    assert!(signals[1]["contributing_factors"]["market"].as_f64().unwrap() > 0.0);
    assert_eq!(state.history.len(), 2);
}

#[tokio::test]
async fn invalid_config_is_unprocessable() {
    let mut cfg = EngineConfig::default();
    cfg.weights.market = 0.9;
    let (app, state) = app_with(cfg);

    let resp = app.oneshot(post_json("/signals", &batch_payload())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let v = read_json(resp).await;
    assert!(v["error"].as_str().unwrap().contains("weights"));
    assert!(state.history.is_empty());
}

#[tokio::test]
async fn invalid_record_is_rejected() {
    let (app, _) = app_with(EngineConfig::default());
    let bad = json!({
        "as_of": "2025-03-01T12:00:00Z",
        "assets": [{
            "asset_symbol": "ETH",
            "market": {"asset_symbol": "ETH", "price": -5.0, "timestamp": "2025-03-01T12:00:00Z"}
        }]
    });
    let resp = app.oneshot(post_json("/signals", &bad)).await.unwrap();
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn config_endpoint_shows_active_config() {
    let (app, _) = app_with(EngineConfig::default());
    let resp = app.oneshot(get("/config")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(v["weights"]["sentiment"], json!(0.5));
    assert_eq!(v["engagement"]["reference"], json!("batch_max"));
}

#[tokio::test]
async fn reload_without_file_is_bad_request() {
    let (app, _) = app_with(EngineConfig::default());
    let req = Request::builder()
        .method("POST")
        .uri("/admin/reload-config")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reload_picks_up_file_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, "[batch]\nlatency_budget_ms = 20\n").unwrap();

    let hot = HotReloadConfig::with_initial(Some(&path), EngineConfig::load_from(&path).unwrap());
    let state = AppState::new(Arc::new(hot));
    let app = create_router(state);

    std::fs::write(&path, "[batch]\nlatency_budget_ms = 75\n").unwrap();
    let req = Request::builder()
        .method("POST")
        .uri("/admin/reload-config")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await["batch"]["latency_budget_ms"], json!(75));

    std::fs::write(&path, "[weights]\nsentiment = 2.0\n").unwrap();
    let req = Request::builder()
        .method("POST")
        .uri("/admin/reload-config")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app.oneshot(get("/config")).await.unwrap();
    assert_eq!(read_json(resp).await["batch"]["latency_budget_ms"], json!(75));
}

#[tokio::test]
async fn metrics_router_serves_text() {
    let metrics = Metrics::detached();
    let (app, _) = app_with(EngineConfig::default());
    let app = app.merge(metrics.router());
    let resp = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
