use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use http_body_util::{BodyExt, Limited};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::state::AppState;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Routes whose bodies carry credentials; never logged.
const REDACTED_PATHS: [&str; 2] = ["/v1/images/generations", "/image"];

/// Largest JSON body that is written to the log.
const MAX_LOGGED_BODY: usize = 1024;

/// Trace id of the current request, as set by [`trace_middleware`].
pub fn trace_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

pub async fn trace_middleware(
    State(_state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();

    // Reuse a well-formed incoming id so callers can cancel by it.
    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let redact = REDACTED_PATHS.contains(&path.as_str());

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %method,
        path = %path,
    );

    async move {
        info!("→ request started");
        let header_value = HeaderValue::from_str(&trace_id.to_string()).ok();

        let (parts, body) = req.into_parts();
        let body = buffer_and_log("request", &parts.headers, body, redact).await;
        let mut req = Request::from_parts(parts, body);
        if let Some(v) = &header_value {
            req.headers_mut().insert(X_TRACE_ID, v.clone());
        }

        let response = next.run(req).await;

        let (parts, body) = response.into_parts();
        let body = buffer_and_log("response", &parts.headers, body, redact).await;
        let mut response = Response::from_parts(parts, body);
        if let Some(v) = header_value {
            response.headers_mut().insert(X_TRACE_ID, v);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis() as u64,
            "← response finished"
        );

        response
    }
    .instrument(span)
    .await
}

/// Log a body when it is small, unredacted JSON of known length.
///
/// Only such bodies are buffered, and never past [`MAX_LOGGED_BODY`];
/// everything else is passed through untouched so the extractors' own
/// limits apply to it.
async fn buffer_and_log(direction: &str, headers: &HeaderMap, body: Body, redact: bool) -> Body {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let is_json = content_type.contains("application/json");
    let size = body.size_hint().exact().or_else(|| content_length(headers));

    let loggable = is_json && !redact && size.is_some_and(|n| n < MAX_LOGGED_BODY as u64);
    if !loggable {
        if size != Some(0) {
            info!(
                "{direction} body: [skipped: type={content_type}, size={}, redacted={redact}]",
                size.map_or_else(|| "unknown".to_owned(), |n| n.to_string())
            );
        }
        return body;
    }

    let bytes = match Limited::new(body, MAX_LOGGED_BODY).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(direction, error = %e, "failed to buffer body");
            return Body::empty();
        }
    };

    if let Ok(text) = std::str::from_utf8(&bytes) {
        info!("{direction} body: {text}");
    }
    Body::from(bytes)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    fn headers(content_type: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        h
    }

    #[tokio::test]
    #[traced_test]
    async fn small_json_is_logged_and_forwarded() {
        let body = Body::from(r#"{"text":"hello"}"#);
        let out = buffer_and_log("request", &headers("application/json"), body, false).await;

        let bytes = out.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"text":"hello"}"#);
        assert!(logs_contain(r#"request body: {"text":"hello"}"#));
    }

    #[tokio::test]
    #[traced_test]
    async fn large_upload_passes_through_unbuffered() {
        let payload = vec![b'a'; 4 * MAX_LOGGED_BODY];
        let body = Body::from(payload.clone());
        let out = buffer_and_log("request", &headers("multipart/form-data; boundary=x"), body, false).await;

        assert_eq!(out.size_hint().exact(), Some(payload.len() as u64));
        let bytes = out.collect().await.unwrap().to_bytes();
        assert_eq!(bytes.len(), payload.len());
        assert!(logs_contain("skipped: type=multipart/form-data"));
    }

    #[tokio::test]
    #[traced_test]
    async fn redacted_json_is_never_logged() {
        let body = Body::from(r#"{"api_key":"sk-secret"}"#);
        let out = buffer_and_log("request", &headers("application/json"), body, true).await;

        let bytes = out.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"api_key":"sk-secret"}"#);
        assert!(!logs_contain("sk-secret"));
        assert!(logs_contain("redacted=true"));
    }
}
