//! HTTP and WebSocket API

pub mod apps;
pub mod portal;
pub mod sessions;
pub mod stream;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::AppState;

/// Full application router
pub fn app(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();
    Router::new()
        // Portal routes
        .route("/", get(portal::index))
        .route("/a/{app}", get(portal::launch))
        .route("/s/{id}", get(portal::session_view))
        // API routes
        .nest("/api/v1", sessions::router().route("/apps", get(apps::list_apps)))
        // WebSocket route
        .route("/ws/v1/sessions/{id}", get(stream::ws_handler))
        // Static files
        .nest_service("/static", ServeDir::new(static_dir))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use clap::Parser;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::lifecycle::run_cleanup;
    use crate::models::ServerMessage;
    use crate::storage::SessionStore;
    use distboard::controls::Control;
    use distboard::dash::UiAction;

    fn state(args: &[&str]) -> Arc<AppState> {
        let mut argv = vec!["distboard-server", "--seed", "17"];
        argv.extend_from_slice(args);
        let config = Config::parse_from(argv);
        let catalog = config.load_catalog().unwrap();
        Arc::new(AppState::new(config, catalog))
    }

    async fn call(state: &Arc<AppState>, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();
        let response = app(Arc::clone(state)).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn open(state: &Arc<AppState>, app: &str) -> Value {
        let (status, body) = call(state, Method::POST, "/api/v1/sessions", Some(json!({ "app": app }))).await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    fn control_id(record: &Value, title: &str) -> u64 {
        record["controls"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["title"] == title)
            .and_then(|c| c["id"].as_u64())
            .unwrap()
    }

    #[tokio::test]
    async fn lists_the_catalog() {
        let state = state(&[]);
        let (status, body) = call(&state, Method::GET, "/api/v1/apps", None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body.as_array().unwrap().iter().map(|a| a["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["normal", "beta", "normal-basic", "beta-basic"]);
    }

    #[tokio::test]
    async fn creates_and_reads_a_session() {
        let state = state(&[]);
        let record = open(&state, "normal").await;
        let id = record["meta"]["id"].as_str().unwrap().to_string();
        assert_eq!(record["dashboard"]["figure"]["hist"]["source"]["top"].as_array().unwrap().len(), 50);

        let (status, fetched) = call(&state, Method::GET, &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["meta"]["app"], "normal");

        let (_, list) = call(&state, Method::GET, "/api/v1/sessions", None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_app_is_not_found() {
        let state = state(&[]);
        let (status, body) = call(&state, Method::POST, "/api/v1/sessions", Some(json!({ "app": "cauchy" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("cauchy"));
    }

    #[tokio::test]
    async fn actions_update_the_view() {
        let state = state(&[]);
        let record = open(&state, "normal").await;
        let id = record["meta"]["id"].as_str().unwrap();
        let bins = control_id(&record["dashboard"], "Number of bins");

        let (status, view) = call(
            &state,
            Method::POST,
            &format!("/api/v1/sessions/{id}/actions"),
            Some(json!({ "type": "set_value", "control": bins, "value": 20 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["figure"]["hist"]["source"]["top"].as_array().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn invalid_parameter_is_unprocessable() {
        let state = state(&[]);
        let record = open(&state, "normal").await;
        let id = record["meta"]["id"].as_str().unwrap();
        let scale = control_id(&record["dashboard"], "scale");
        let before = record["dashboard"]["figure"]["pdf"].clone();

        let (status, body) = call(
            &state,
            Method::POST,
            &format!("/api/v1/sessions/{id}/actions"),
            Some(json!({ "type": "set_value", "control": scale, "value": -1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "domain");

        let (_, fetched) = call(&state, Method::GET, &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(fetched["dashboard"]["figure"]["pdf"], before);
    }

    #[tokio::test]
    async fn malformed_action_is_a_bad_request() {
        let state = state(&[]);
        let record = open(&state, "normal").await;
        let id = record["meta"]["id"].as_str().unwrap();
        let (status, body) = call(
            &state,
            Method::POST,
            &format!("/api/v1/sessions/{id}/actions"),
            Some(json!({ "type": "spin" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "server");
    }

    #[tokio::test]
    async fn launch_redirects_to_a_new_session() {
        let state = state(&[]);
        let request = Request::builder().uri("/a/beta").body(Body::empty()).unwrap();
        let response = app(Arc::clone(&state)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
        assert!(location.starts_with("/s/"));

        let request = Request::builder().uri(&location).body(Body::empty()).unwrap();
        let response = app(Arc::clone(&state)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn delete_then_missing() {
        let state = state(&[]);
        let record = open(&state, "beta-basic").await;
        let uri = format!("/api/v1/sessions/{}", record["meta"]["id"].as_str().unwrap());

        let (status, _) = call(&state, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&state, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&state, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn zero_ttl_sessions_are_cleaned_up() {
        let state = state(&["--session-ttl", "0"]);
        let record = open(&state, "normal").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        assert_eq!(run_cleanup(&state).await, 1);
        let id = record["meta"]["id"].as_str().unwrap().parse().unwrap();
        assert!(state.store.get(id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_actions_broadcast_in_state_order() {
        let state = state(&[]);
        let session = sessions::open_session(&state, "normal").await.unwrap();
        let id = session.meta.id;
        let mut rx = state.broadcast_hub.subscribe(id);
        let loc = session.dashboard.lock().control_named("loc").unwrap();

        let tasks = (1..=8_i32).map(|i| {
            let state = Arc::clone(&state);
            let session = session.clone();
            tokio::spawn(async move {
                let action = UiAction::SetValue {
                    control: loc,
                    value: f64::from(i),
                };
                sessions::run_action(&state, &session, action).await
            })
        });
        for task in futures::future::join_all(tasks).await {
            task.unwrap().unwrap();
        }

        let mut last_seq = 0;
        let mut last_view = None;
        for _ in 0..8 {
            match rx.recv().await.unwrap() {
                ServerMessage::Snapshot { seq, dashboard } => {
                    assert!(seq > last_seq);
                    last_seq = seq;
                    last_view = Some(dashboard);
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        let shown = last_view
            .unwrap()
            .controls
            .into_iter()
            .find(|c| c.id == loc)
            .map(|c| c.control)
            .unwrap();
        let current = session.dashboard.lock().controls().number(loc).unwrap();
        match shown {
            Control::Slider(slider) => assert_eq!(slider.value, current),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn portal_page_is_served() {
        let state = state(&[]);
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
