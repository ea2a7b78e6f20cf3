//! Webhook listener for door and motion sensors.
//!
//! `GET|POST /door/<room>/<command>` and `/motion/<room>/<command>` are
//! turned into retained MQTT publishes. Only the percent-decoded path is
//! read; request bodies are ignored and successful responses are empty.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use percent_encoding::percent_decode_str;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::BridgeError;
use crate::mqtt::Publisher;

use super::{SensorEvent, SensorKind};

/// Shared state for the webhook handlers.
pub struct AppState<P> {
    pub publisher: Arc<P>,
    pub topic_prefix: Arc<str>,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            publisher: Arc::clone(&self.publisher),
            topic_prefix: Arc::clone(&self.topic_prefix),
        }
    }
}

impl<P: Publisher> AppState<P> {
    pub fn new(publisher: P, topic_prefix: &str) -> Self {
        Self {
            publisher: Arc::new(publisher),
            topic_prefix: Arc::from(topic_prefix),
        }
    }
}

/// Maps a payload failure to a plaintext 500.
struct WebhookError(BridgeError);

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        error!("{}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

pub fn build<P: Publisher>(state: AppState<P>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/door/", get(door::<P>).post(door::<P>))
        .route("/door/{*rest}", get(door::<P>).post(door::<P>))
        .route("/motion/", get(motion::<P>).post(motion::<P>))
        .route("/motion/{*rest}", get(motion::<P>).post(motion::<P>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn door<P: Publisher>(State(state): State<AppState<P>>, uri: Uri) -> Response {
    let path = percent_decode_str(uri.path()).decode_utf8_lossy();
    handle(&state, SensorKind::Door, &path).await
}

async fn motion<P: Publisher>(State(state): State<AppState<P>>, uri: Uri) -> Response {
    let path = percent_decode_str(uri.path()).decode_utf8_lossy();
    handle(&state, SensorKind::Motion, &path).await
}

async fn handle<P: Publisher>(state: &AppState<P>, kind: SensorKind, path: &str) -> Response {
    info!("{} http: {}", kind.category().as_str(), path);

    // Malformed paths are dropped without an error response.
    let event = match SensorEvent::from_path(kind, path) {
        Ok(event) => event,
        Err(e) => {
            warn!("{}", e);
            return StatusCode::OK.into_response();
        }
    };
    info!(
        "{} in room {:?}, command {:?}",
        kind.category().as_str(),
        event.room,
        event.command
    );

    match event.publish(state.publisher.as_ref(), &state.topic_prefix).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => WebhookError(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    use super::*;
    use crate::sensor::tests::RecordingPublisher;

    fn app() -> (Router, Arc<RecordingPublisher>) {
        let state = AppState::new(RecordingPublisher::default(), "home/");
        let publisher = Arc::clone(&state.publisher);
        (build(state), publisher)
    }

    async fn call(app: Router, method: Method, uri: &str) -> StatusCode {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn health_check_is_ok() {
        let (app, _) = app();
        assert_eq!(call(app, Method::GET, "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn door_off_publishes_open() {
        let (app, publisher) = app();
        assert_eq!(call(app, Method::GET, "/door/bathroom/off").await, StatusCode::OK);
        assert_eq!(
            *publisher.published.lock().unwrap(),
            vec![("home/door/bathroom".to_string(), r#"{"onoff":true}"#.to_string())]
        );
    }

    #[tokio::test]
    async fn motion_on_publishes_command() {
        let (app, publisher) = app();
        assert_eq!(call(app, Method::POST, "/motion/kitchen/on").await, StatusCode::OK);
        assert_eq!(
            *publisher.published.lock().unwrap(),
            vec![("home/motion/kitchen".to_string(), r#"{"command":"on"}"#.to_string())]
        );
    }

    #[tokio::test]
    async fn malformed_paths_publish_nothing() {
        for uri in [
            "/door/",
            "/motion/",
            "/door/bathroom",
            "/door/bathroom/off/extra",
            "/motion/kitchen/",
            "/door/living%2Froom/off",
        ] {
            let (app, publisher) = app();
            assert_eq!(call(app, Method::GET, uri).await, StatusCode::OK, "{uri}");
            assert!(publisher.published.lock().unwrap().is_empty(), "{uri}");
        }
    }

    #[tokio::test]
    async fn encoded_room_is_decoded() {
        let (app, publisher) = app();
        assert_eq!(
            call(app, Method::GET, "/door/living%20room/off").await,
            StatusCode::OK
        );
        assert_eq!(
            *publisher.published.lock().unwrap(),
            vec![("home/door/living room".to_string(), r#"{"onoff":true}"#.to_string())]
        );
    }

    #[tokio::test]
    async fn unknown_category_is_not_found() {
        let (app, publisher) = app();
        assert_eq!(
            call(app, Method::GET, "/window/bathroom/off").await,
            StatusCode::NOT_FOUND
        );
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[test]
    fn webhook_error_is_plaintext_500() {
        let json_err = serde_json::from_str::<serde_json::Value>("{{bad").unwrap_err();
        let response = WebhookError(BridgeError::Serialization(json_err)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
