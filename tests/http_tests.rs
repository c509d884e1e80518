mod support;

use axum::http::{Method, StatusCode};
use open_car_diagnostics::ServerConfig;
use open_car_diagnostics::shell::reload_prompt::NEED_REFRESH_MESSAGE;
use open_car_diagnostics::shell::{BUILD_STAMP_PLACEHOLDER, BuildStamp, UpdateState};
use serde_json::json;
use support::{STAMP, config, get, router, send};

#[tokio::test]
async fn index_renders_the_shell() {
    let (router, _state) = router(config());

    let page = get(router, "/").await;

    assert_eq!(page.status, StatusCode::OK);
    assert!(page.content_type.unwrap_or_default().starts_with("text/html"));
    assert!(page.body.contains("Open Car Diagnostics!"));
    assert!(page.body.contains(r#"alt="Open Car Diagnostics Logo""#));
    assert!(page.body.contains(r#"src="/favicon.svg""#));
    assert_eq!(page.body.matches(STAMP).count(), 1);
    assert!(page.body.contains(r#"<section class="App-content"></section>"#));
    assert!(page.body.contains(r#"<div class="ReloadPrompt-container"></div>"#));
}

#[tokio::test]
async fn known_route_fills_content_slot() {
    let (router, _state) = router(config());

    let page = get(router, "/connect?from=qr").await;

    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Connect to your device"));
    assert!(page.body.contains("Open Car Diagnostics!"));
}

#[tokio::test]
async fn unknown_route_is_404_inside_the_shell() {
    let (router, _state) = router(config());

    let page = get(router, "/no/such/page").await;

    assert_eq!(page.status, StatusCode::NOT_FOUND);
    assert!(page.body.contains("Page not found"));
    assert!(page.body.contains("/no/such/page"));
    assert!(page.body.contains("Open Car Diagnostics!"));
    assert!(page.body.contains(STAMP));
}

#[tokio::test]
async fn pages_only_answer_get() {
    let (router, _state) = router(config());

    let response = send(router, Method::DELETE, "/anything", None).await;

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn placeholder_stamp_is_shown_verbatim() {
    let (router, _state) = router(ServerConfig {
        build_stamp: BuildStamp::placeholder(),
        ..ServerConfig::default()
    });

    let page = get(router, "/").await;

    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains(&format!("Built at: {BUILD_STAMP_PLACEHOLDER}")));
}

#[tokio::test]
async fn favicon_is_svg() {
    let (router, _state) = router(config());

    let asset = get(router, "/favicon.svg").await;

    assert_eq!(asset.status, StatusCode::OK);
    assert_eq!(asset.content_type.as_deref(), Some("image/svg+xml"));
    assert!(asset.body.contains("<svg"));
}

#[tokio::test]
async fn version_reports_stamp() {
    let (router, _state) = router(config());

    let json = get(router, "/api/version").await.json();

    assert_eq!(json["build_stamp"], STAMP);
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["placeholder"], false);
}

#[tokio::test]
async fn device_profile_hides_password() {
    let (router, _state) = router(config());

    let response = get(router, "/api/device").await;
    let json = response.json();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(json["ssid"], "OpenCarDiagnostics");
    assert_eq!(json["hostname"], "ocd-device.local");
    assert_eq!(json["auth_mode"], "wpa_wpa2_psk");
    assert!(json.get("password").is_none());
    assert!(!response.body.contains("PASSWORD"));
}

#[tokio::test]
async fn update_state_drives_reload_prompt() {
    let (router, state) = router(config());

    let set = send(
        router.clone(),
        Method::POST,
        "/api/update",
        Some(json!({ "state": "need-refresh" })),
    )
    .await;
    assert_eq!(set.status, StatusCode::OK);
    assert_eq!(set.json()["state"], "need-refresh");
    assert_eq!(state.prompt().state(), UpdateState::NeedRefresh);

    let page = get(router.clone(), "/").await;
    assert!(page.body.contains("New content available, click on reload button to update."));
    assert!(page.body.contains(r#"data-action="reload""#));

    send(
        router.clone(),
        Method::POST,
        "/api/update",
        Some(json!({ "state": "idle" })),
    )
    .await;
    let current = get(router, "/api/update").await.json();
    assert_eq!(current["state"], "idle");
}

#[tokio::test]
async fn page_script_targets_update_endpoint_and_device_channel() {
    let (router, _state) = router(config());

    let page = get(router, "/").await;

    assert!(page.body.contains(r#"fetch("/api/update""#));
    assert!(page.body.contains(r#""/ws""#));
    assert!(!page.body.contains("&#x2F;"));
}

#[tokio::test]
async fn reload_clears_need_refresh_for_the_next_load() {
    let (router, state) = router(config());
    state.prompt().need_refresh();

    let before = get(router.clone(), "/").await;
    assert!(before.body.contains(NEED_REFRESH_MESSAGE));
    assert!(before.body.contains("markIdle().finally(function () { window.location.reload(); });"));

    // what the reload button sends before reloading
    let idle = send(
        router.clone(),
        Method::POST,
        "/api/update",
        Some(json!({ "state": "idle" })),
    )
    .await;
    assert_eq!(idle.status, StatusCode::OK);

    let after = get(router, "/").await;
    assert!(!after.body.contains(NEED_REFRESH_MESSAGE));
    assert!(after.body.contains(r#"<div class="ReloadPrompt-container"></div>"#));
}

#[tokio::test]
async fn unknown_update_state_is_rejected() {
    let (router, _state) = router(config());

    let response = send(
        router,
        Method::POST,
        "/api/update",
        Some(json!({ "state": "rebooting" })),
    )
    .await;

    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn health_endpoints() {
    let (router, _state) = router(config());

    let live = get(router.clone(), "/health").await;
    assert_eq!(live.status, StatusCode::OK);
    assert_eq!(live.json()["status"], "healthy");

    let ready = get(router.clone(), "/ready").await;
    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.json()["ready"], true);

    let components = get(router, "/health/components").await.json();
    assert_eq!(components["components"]["build_stamp"]["status"], "healthy");
    assert_eq!(components["components"]["mdns"]["status"], "healthy");
    assert_eq!(
        components["components"]["websocket"]["details"]["active_sessions"],
        0
    );
}

#[tokio::test]
async fn readiness_drops_during_shutdown() {
    let (router, state) = router(config());
    state.coordinator().token().cancel();

    let ready = get(router, "/ready").await;

    assert_eq!(ready.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(ready.json()["ready"], false);
}

#[tokio::test]
async fn metrics_count_page_outcomes() {
    let (router, _state) = router(config());
    get(router.clone(), "/").await;
    get(router.clone(), "/missing").await;

    let metrics = get(router, "/metrics").await;

    assert_eq!(metrics.status, StatusCode::OK);
    assert!(metrics.body.contains("ocd_page_requests_total{outcome=\"found\"}"));
    assert!(metrics.body.contains("ocd_page_requests_total{outcome=\"not_found\"}"));
    assert!(metrics.body.contains("# EOF"));
}

#[tokio::test]
async fn served_over_a_real_listener() {
    let state = support::state(config());
    let (addr, server) = support::serve(state.clone()).await;

    let version: serde_json::Value = reqwest::get(format!("http://{addr}/api/version"))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(version["build_stamp"], STAMP);

    let page = reqwest::get(format!("http://{addr}/missing")).await.expect("request");
    assert_eq!(page.status().as_u16(), 404);

    state.coordinator().token().cancel();
    tokio::time::timeout(std::time::Duration::from_secs(5), server)
        .await
        .expect("server stopped")
        .expect("server task");
}
