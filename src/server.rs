//! HTTP front end.
//!
//! `POST /run` takes `{"language": ..., "code": ...}` and answers
//! `{"output": ...}` or `{"error": ...}`. The engine is synchronous, so each
//! job runs on the blocking pool.

use crate::config::types::{ExecutionRequest, Result, SandboxError, DEFAULT_LANGUAGE};
use crate::exec::Engine;
use crate::judge::registry::LanguageRegistry;
use crate::observability::audit;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;

/// Request bodies above this are not buffered; they are answered as
/// `Code too long` since no valid request comes close.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

static INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunResponse {
    pub output: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/run", post(run_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(engine)
}

/// Bind and serve until Ctrl-C or SIGTERM.
pub async fn serve(engine: Arc<Engine>, bind: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server stopped");
    Ok(())
}

/// Decode a `/run` body.
///
/// Checks run in a fixed order: JSON shape, language, code type. Length is
/// left to the engine. Missing fields default to `python` and `""`; the
/// body is parsed as JSON whatever the content type says.
pub fn parse_run_request(body: &[u8], registry: &LanguageRegistry) -> Result<ExecutionRequest> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| SandboxError::InvalidRequest(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| SandboxError::InvalidRequest("body is not a JSON object".to_string()))?;

    let language = match object.get("language") {
        None => DEFAULT_LANGUAGE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(SandboxError::InvalidLanguage {
                language: other.to_string(),
            })
        }
    };
    registry.validate(&language)?;

    let code = match object.get("code") {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(SandboxError::CodeNotText),
    };

    Ok(ExecutionRequest::new(language, code))
}

/// 400 with the bare message for request errors, 500 otherwise.
pub fn error_response(error: &SandboxError) -> Response {
    if error.is_client_error() {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: error.to_string(),
            }),
        )
            .into_response()
    } else {
        sandbox_failure(error.to_string())
    }
}

fn sandbox_failure(details: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: format!("Sandbox failure: {}", details),
        }),
    )
        .into_response()
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn run_handler(
    State(engine): State<Arc<Engine>>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            let error = SandboxError::CodeTooLong {
                length: MAX_BODY_BYTES,
                max: engine.config().limits.max_code_chars,
            };
            audit::events::request_rejected(None, "body exceeds buffer limit");
            return error_response(&error);
        }
        Err(rejection) => return rejection.into_response(),
    };

    let request = match parse_run_request(&body, engine.registry()) {
        Ok(request) => request,
        Err(e) => {
            log::debug!("Rejected /run body: {:?}", e);
            audit::events::request_rejected(None, &e.to_string());
            return error_response(&e);
        }
    };

    let worker = engine.clone();
    match tokio::task::spawn_blocking(move || worker.execute(&request)).await {
        Ok(Ok(result)) => (
            StatusCode::OK,
            Json(RunResponse {
                output: result.output,
            }),
        )
            .into_response(),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            log::error!("Execution worker panicked: {}", e);
            sandbox_failure("execution worker panicked".to_string())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("Shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<ExecutionRequest> {
        parse_run_request(body.as_bytes(), &LanguageRegistry::new())
    }

    #[test]
    fn test_parse_full_request() {
        let request = parse(r#"{"language": "js", "code": "console.log(1)"}"#).unwrap();
        assert_eq!(request, ExecutionRequest::new("js", "console.log(1)"));
    }

    #[test]
    fn test_parse_defaults() {
        assert_eq!(parse("{}").unwrap(), ExecutionRequest::new("python", ""));
        assert_eq!(
            parse(r#"{"code": "print(2)"}"#).unwrap(),
            ExecutionRequest::new("python", "print(2)")
        );
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(matches!(parse("not json"), Err(SandboxError::InvalidRequest(_))));
        assert!(matches!(parse("[1, 2]"), Err(SandboxError::InvalidRequest(_))));
        assert!(matches!(parse(""), Err(SandboxError::InvalidRequest(_))));
    }

    #[test]
    fn test_parse_language_checked_before_code() {
        let err = parse(r#"{"language": "ruby", "code": 5}"#).unwrap_err();
        assert!(matches!(err, SandboxError::InvalidLanguage { .. }));

        let err = parse(r#"{"language": null}"#).unwrap_err();
        assert!(matches!(err, SandboxError::InvalidLanguage { .. }));
    }

    #[test]
    fn test_parse_non_string_code() {
        for body in [
            r#"{"code": 42}"#,
            r#"{"code": null}"#,
            r#"{"code": ["print(1)"]}"#,
        ] {
            assert!(matches!(parse(body), Err(SandboxError::CodeNotText)), "{}", body);
        }
    }

    #[test]
    fn test_parse_leaves_length_to_engine() {
        let long = format!(r#"{{"code": "{}"}}"#, "x".repeat(6000));
        assert_eq!(parse(&long).unwrap().code_chars(), 6000);
    }

    #[test]
    fn test_error_response_status() {
        let client = error_response(&SandboxError::CodeNotText);
        assert_eq!(client.status(), StatusCode::BAD_REQUEST);

        let infra = error_response(&SandboxError::RuntimeUnavailable("docker".into()));
        assert_eq!(infra.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
