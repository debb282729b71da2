//! HTTP surface of the engine.
//!
//! * `POST /track` - runs a [`TrackRequest`]
//! * `GET /health` - liveness check
//!
//! Invalid requests are answered with `400`, every other failure with `500`.
//! Error bodies are `{"error": "<message>"}`.

use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;

use crate::{
    engine::{Engine, Outcome, TrackInfo, TrackRequest},
    error::{Error, ErrorKind, Result},
    signal,
};

/// Cache policy for streamed audio.
const STREAM_CACHE_CONTROL: HeaderValue = HeaderValue::from_static("public, max-age=3600");

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse<'a> {
    success: bool,
    track_info: &'a TrackInfo,
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::Info(info) => (
                StatusCode::OK,
                Json(InfoResponse {
                    success: true,
                    track_info: &info,
                }),
            )
                .into_response(),
            Outcome::Stream { format, bytes } => (
                StatusCode::OK,
                [
                    (CONTENT_TYPE, HeaderValue::from_static(format.mime_type())),
                    (CONTENT_LENGTH, HeaderValue::from(bytes.len())),
                    (ACCEPT_RANGES, HeaderValue::from_static("bytes")),
                    (CACHE_CONTROL, STREAM_CACHE_CONTROL),
                ],
                bytes,
            )
                .into_response(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.kind {
            ErrorKind::InvalidArgument => {
                debug!("rejected request: {self}");
                error_response(StatusCode::BAD_REQUEST, &self.error.to_string())
            }
            _ => {
                error!("{self}");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, &self.to_string())
            }
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Builds the router for an engine.
pub fn router(engine: Engine) -> Router {
    Router::new()
        .route("/track", post(track))
        .route("/health", get(health))
        .with_state(engine)
}

async fn track(State(engine): State<Engine>, body: Bytes) -> Response {
    let request = match serde_json::from_slice::<TrackRequest>(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!("malformed request body: {e}");
            return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    match engine.handle(&request).await {
        Ok(outcome) => outcome.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Serves the engine on `listener` until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be registered or the server
/// fails.
pub async fn serve(listener: TcpListener, engine: Engine) -> Result<()> {
    let mut signals = signal::Handler::new()?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(engine))
        .with_graceful_shutdown(async move {
            let signal = signals.recv().await;
            info!("received {signal}, shutting down");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;
    use wiremock::MockServer;

    use super::*;
    use crate::engine::tests::{
        encrypt_audio, engine_for, expect_no_calls, mount_list_data, mount_login, mount_metadata,
        plain_audio, TRACK_ID,
    };

    fn post_track(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/track")
            .header(CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health() {
        let server = MockServer::start().await;
        let app = router(engine_for(&server, None));

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn bad_requests() {
        let server = MockServer::start().await;
        expect_no_calls(&server).await;

        for (body, message) in [
            ("not json", "Invalid request body"),
            ("{}", "trackId required"),
            (r#"{"trackId": "x1"}"#, "Invalid trackId"),
            (r#"{"trackId": "1", "quality": 7}"#, "Invalid quality"),
            (r#"{"trackId": "1", "action": "delete"}"#, "Invalid action"),
        ] {
            let app = router(engine_for(&server, Some("test-arl")));
            let response = app.oneshot(post_track(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(
                json_body(response).await,
                serde_json::json!({ "error": message }),
                "{body}"
            );
        }
    }

    #[tokio::test]
    async fn missing_credential_is_server_error() {
        let server = MockServer::start().await;
        expect_no_calls(&server).await;

        let app = router(engine_for(&server, None));
        let response = app
            .oneshot(post_track(format!(r#"{{"trackId": "{TRACK_ID}"}}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = json_body(response).await;
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("credential not configured"), "{message}");
    }

    #[tokio::test]
    async fn info_response() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_metadata(&server, [0, 0, 25_731_462]).await;
        mount_list_data(&server, None).await;

        let app = router(engine_for(&server, Some("test-arl")));
        let response = app
            .oneshot(post_track(format!(
                r#"{{"trackId": "{TRACK_ID}", "quality": 2, "action": "info"}}"#
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        let info = &body["trackInfo"];
        assert_eq!(info["quality"], 2);
        assert_eq!(info["format"], "FLAC");
        assert_eq!(info["isEncrypted"], true);
        assert_eq!(info["title"], "Harder, Better, Faster, Stronger");
        assert_eq!(info["artist"], "Daft Punk");
        assert_eq!(info["album"], "Discovery");
        assert_eq!(info["id"], 3_135_556);
        assert!(info["url"]
            .as_str()
            .unwrap()
            .starts_with("https://e-cdns-proxy-5.dzcdn.net/mobile/1/"));
    }

    #[tokio::test]
    async fn stream_response() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_metadata(&server, [0, 0, 25_731_462]).await;
        mount_list_data(&server, Some(format!("{}/media/1/track.flac", server.uri()))).await;

        let plain = plain_audio(3 * 2048 + 2048);
        wiremock::Mock::given(wiremock::matchers::path("/media/1/track.flac"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_bytes(encrypt_audio(&plain, TRACK_ID.parse().unwrap())),
            )
            .mount(&server)
            .await;

        let app = router(engine_for(&server, Some("test-arl")));
        let response = app
            .oneshot(post_track(format!(
                r#"{{"trackId": "{TRACK_ID}", "action": "stream"}}"#
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers[CONTENT_TYPE], "audio/flac");
        assert_eq!(headers[CONTENT_LENGTH], plain.len().to_string().as_str());
        assert_eq!(headers[ACCEPT_RANGES], "bytes");
        assert_eq!(headers[CACHE_CONTROL], "public, max-age=3600");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.as_ref(), plain.as_slice());
    }
}
