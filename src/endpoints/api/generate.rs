use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    response::{IntoResponse, Response},
    Json
};
use hyper::StatusCode;
use tracing::{debug, error, info};

use crate::{response::ProxyError, SharedState};

/// Never copied onto the upstream request.
const HOP_BY_HOP: [&str; 5] = [
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "content-encoding"
];

pub const PLATFORM_HEADER: &str = "x-platform";

/// Same-origin stand-in for the upstream generation endpoint. The body is
/// relayed as raw bytes in both directions.
pub async fn generate(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    headers: HeaderMap,
    body: Bytes
) -> Response {
    if method != Method::POST {
        info!("[{}] Rejected {} request on /api/generate", addr, method);
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "POST")],
            format!("Method {} Not Allowed", method)
        ).into_response()
    }

    info!("[{}] Forwarding {} bytes to {}", addr, body.len(), state.config().proxy.upstream_url);
    match forward(&state, headers, body).await {
        Ok(response) => {
            info!("[{}] Relayed upstream response with status {}", addr, response.status());
            response
        },
        Err(err) => {
            error!("[{}] Proxy error: {:#}", addr, err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ProxyError {
                    success: false,
                    message: "Internal Proxy Error".into(),
                    error: err.to_string()
                })
            ).into_response()
        }
    }
}

async fn forward(state: &SharedState, headers: HeaderMap, body: Bytes) -> Result<Response> {
    let proxy = &state.config().proxy;

    let mut forwarded = forwarded_headers(&headers);
    forwarded.insert(
        HeaderName::from_static(PLATFORM_HEADER),
        HeaderValue::from_str(&proxy.platform)?
    );

    let upstream = state.http()
        .post(proxy.upstream_url.clone())
        .headers(forwarded)
        .body(body)
        .send()
        .await?;

    let status = upstream.status();
    let content_type = upstream.headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    let disposition = upstream.headers()
        .get(header::CONTENT_DISPOSITION)
        .cloned();
    debug!("Upstream answered {} with content type {:?}", status, content_type);

    let bytes = upstream.bytes().await?;

    let mut response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type);
    if let Some(disposition) = disposition {
        response = response.header(header::CONTENT_DISPOSITION, disposition);
    }

    Ok(response.body(Body::from(bytes))?)
}

/// Request headers minus hop-by-hop ones, and minus `accept-encoding`.
///
/// reqwest is built without its `gzip`/`brotli` features, so it would hand a
/// compressed upstream body over untouched, and the relay does not copy the
/// upstream `content-encoding` back. Asking for an identity body keeps the
/// relayed bytes readable by the caller.
pub fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in headers {
        if HOP_BY_HOP.contains(&name.as_str()) || *name == header::ACCEPT_ENCODING {
            continue;
        }

        forwarded.append(name.clone(), value.clone());
    }

    forwarded
}
