use crate::server::config::{minutes, seconds};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use eventgen_core::{Error, GeneratorState, GeneratorSupervisor, MessageFactory, StartRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: GeneratorSupervisor,
    pub factory: Arc<dyn MessageFactory>,
    /// Applied to start requests that omit a parameter.
    pub defaults: StartRequest,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/msg/random", post(start))
        .route("/api/msg/shutdown", post(shutdown))
        .route("/api/msg/scale", post(scale))
        .route("/api/msg/status", get(status))
        .with_state(state)
}

/// Optional overrides of a start request.
#[derive(Debug, Default, Deserialize)]
pub struct GeneratorParams {
    pub threads: Option<usize>,
    /// Minutes.
    pub runtime: Option<f64>,
    pub times: Option<u64>,
    /// Seconds.
    pub sleep: Option<f64>,
}

impl GeneratorParams {
    fn into_request(self, defaults: StartRequest) -> Result<StartRequest, ApiError> {
        let mut request = defaults;
        if let Some(threads) = self.threads {
            request.workers = threads;
        }
        if let Some(runtime) = self.runtime {
            request.timeout = minutes(runtime).ok_or_else(|| {
                ApiError::BadRequest(format!("invalid runtime {runtime}: expected minutes >= 0"))
            })?;
        }
        if let Some(times) = self.times {
            request.max_count = times;
        }
        if let Some(sleep) = self.sleep {
            request.delay = seconds(sleep).ok_or_else(|| {
                ApiError::BadRequest(format!("invalid sleep {sleep}: expected seconds >= 0"))
            })?;
        }
        Ok(request)
    }
}

#[derive(Debug, Deserialize)]
pub struct ScaleParams {
    pub delta: isize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScaleBody {
    pub workers: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub state: GeneratorState,
    pub workers: usize,
}

async fn start(
    State(state): State<AppState>,
    Query(params): Query<GeneratorParams>,
) -> Result<StatusCode, ApiError> {
    let request = params.into_request(state.defaults)?;
    state
        .supervisor
        .start(Arc::clone(&state.factory), request)
        .await?;
    Ok(StatusCode::OK)
}

async fn shutdown(State(state): State<AppState>) -> StatusCode {
    state.supervisor.stop();
    StatusCode::OK
}

async fn scale(
    State(state): State<AppState>,
    Query(params): Query<ScaleParams>,
) -> Result<Json<ScaleBody>, ApiError> {
    let workers = state.supervisor.scale(params.delta)?;
    tracing::info!(delta = params.delta, workers, "Scaled event generator");
    Ok(Json(ScaleBody { workers }))
}

async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    Json(StatusBody {
        state: state.supervisor.state(),
        workers: state.supervisor.worker_count(),
    })
}

/// Failure of a control request. The body carries the error text.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Generator(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Generator(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Generator(err @ Error::NotRunning) => (StatusCode::CONFLICT, err.to_string()),
            Self::Generator(err) => (StatusCode::BAD_REQUEST, err.to_string()),
        };
        tracing::warn!(%status, %message, "Control request failed");
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::sink::LogConnector;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request},
    };
    use core::time::Duration;
    use eventgen_core::{Message, SinkSettings};
    use tower::ServiceExt;

    fn app() -> (Router, GeneratorSupervisor) {
        let supervisor =
            GeneratorSupervisor::new(Arc::new(LogConnector), SinkSettings::new("TestTopic"));
        let factory: Arc<dyn MessageFactory> = Arc::new(Message::new);
        let state = AppState {
            supervisor: supervisor.clone(),
            factory,
            defaults: StartRequest::new(2).with_delay(Duration::from_millis(10)),
        };
        (router(state), supervisor)
    }

    async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn start_scale_and_shutdown() {
        let (app, supervisor) = app();

        let (status, _) = call(&app, Method::POST, "/api/msg/random?threads=3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(supervisor.worker_count(), 3);

        let (status, body) = call(&app, Method::GET, "/api/msg/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"state":"running","workers":3}"#);

        let (status, body) = call(&app, Method::POST, "/api/msg/scale?delta=-1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_str::<ScaleBody>(&body).unwrap(),
            ScaleBody { workers: 2 }
        );

        let (status, _) = call(&app, Method::POST, "/api/msg/shutdown").await;
        assert_eq!(status, StatusCode::OK);
        tokio::time::timeout(Duration::from_secs(5), supervisor.wait_until_idle())
            .await
            .unwrap();

        let (_, body) = call(&app, Method::GET, "/api/msg/status").await;
        assert_eq!(body, r#"{"state":"idle","workers":0}"#);
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let (app, supervisor) = app();

        let (status, _) = call(&app, Method::POST, "/api/msg/random").await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, Method::POST, "/api/msg/random?threads=9").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, Error::AlreadyRunning.to_string());
        assert_eq!(supervisor.worker_count(), 2);

        supervisor.stop();
        supervisor.wait_until_idle().await;
    }

    #[tokio::test]
    async fn invalid_parameters_are_rejected() {
        let (app, supervisor) = app();

        let (status, body) = call(&app, Method::POST, "/api/msg/random?runtime=-1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("runtime"), "{body}");

        let (status, body) = call(&app, Method::POST, "/api/msg/random?sleep=-0.5").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("sleep"), "{body}");

        let (status, _) = call(&app, Method::POST, "/api/msg/random?threads=many").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(supervisor.state(), GeneratorState::Idle);
    }

    #[tokio::test]
    async fn unaddressable_thread_count_is_rejected() {
        let (app, supervisor) = app();
        let uri = format!("/api/msg/random?threads={}", usize::MAX);

        let (status, body) = call(&app, Method::POST, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.starts_with("Invalid request"), "{body}");
        assert_eq!(supervisor.state(), GeneratorState::Idle);
    }

    #[tokio::test]
    async fn scaling_without_a_generator_conflicts() {
        let (app, _) = app();
        let (status, body) = call(&app, Method::POST, "/api/msg/scale?delta=2").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, Error::NotRunning.to_string());
    }

    #[tokio::test]
    async fn shutdown_when_idle_is_ok() {
        let (app, supervisor) = app();
        let (status, _) = call(&app, Method::POST, "/api/msg/shutdown").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(supervisor.state(), GeneratorState::Idle);
    }

    #[test]
    fn missing_parameters_fall_back_to_defaults() {
        let defaults = StartRequest::new(5)
            .with_timeout(Duration::from_secs(60))
            .with_max_count(7);
        let params = GeneratorParams {
            times: Some(1),
            sleep: Some(0.5),
            ..GeneratorParams::default()
        };

        let request = params.into_request(defaults).unwrap();
        assert_eq!(request.workers, 5);
        assert_eq!(request.timeout, Duration::from_secs(60));
        assert_eq!(request.max_count, 1);
        assert_eq!(request.delay, Duration::from_millis(500));
    }
}
