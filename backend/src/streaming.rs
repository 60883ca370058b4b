use axum::body::Body;
use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use tracing::{debug, warn};

use crate::error::AppError;

/// Parsed single-range `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=a-b`
    Bounded(u64, u64),
    /// `bytes=a-`
    From(u64),
    /// `bytes=-n`
    Suffix(u64),
}

impl ByteRange {
    pub fn parse(value: &str) -> Result<Self, AppError> {
        let spec = value
            .trim()
            .strip_prefix("bytes=")
            .ok_or(AppError::RangeNotSatisfiable)?;
        // Multi-range requests are not supported.
        if spec.contains(',') {
            return Err(AppError::RangeNotSatisfiable);
        }

        let (start, end) = spec.split_once('-').ok_or(AppError::RangeNotSatisfiable)?;
        let (start, end) = (start.trim(), end.trim());

        let num = |s: &str| s.parse::<u64>().map_err(|_| AppError::RangeNotSatisfiable);

        match (start.is_empty(), end.is_empty()) {
            (true, true) => Err(AppError::RangeNotSatisfiable),
            (true, false) => match num(end)? {
                0 => Err(AppError::RangeNotSatisfiable),
                n => Ok(ByteRange::Suffix(n)),
            },
            (false, true) => Ok(ByteRange::From(num(start)?)),
            (false, false) => {
                let (a, b) = (num(start)?, num(end)?);
                if a > b {
                    return Err(AppError::RangeNotSatisfiable);
                }
                Ok(ByteRange::Bounded(a, b))
            }
        }
    }

    pub fn header_value(&self) -> String {
        match self {
            ByteRange::Bounded(a, b) => format!("bytes={}-{}", a, b),
            ByteRange::From(a) => format!("bytes={}-", a),
            ByteRange::Suffix(n) => format!("bytes=-{}", n),
        }
    }
}

/// Fetches `video_url`, forwarding the caller's range, and streams the
/// upstream body back with its status and content headers.
pub async fn proxy_video(
    client: &reqwest::Client,
    video_url: &str,
    request_headers: &HeaderMap,
) -> Result<Response, AppError> {
    let range = request_headers
        .get(RANGE)
        .map(|v| {
            v.to_str()
                .map_err(|_| AppError::RangeNotSatisfiable)
                .and_then(ByteRange::parse)
        })
        .transpose()?;

    let mut upstream = client.get(video_url);
    if let Some(range) = &range {
        upstream = upstream.header(RANGE, range.header_value());
    }

    let upstream = upstream.send().await.map_err(|e| {
        warn!("video fetch failed for {}: {}", video_url, e);
        AppError::Gateway(format!("video source unreachable: {}", e))
    })?;

    let status = upstream.status();
    debug!("video upstream answered {} for range {:?}", status, range);

    match status {
        StatusCode::OK | StatusCode::PARTIAL_CONTENT => {}
        StatusCode::RANGE_NOT_SATISFIABLE => return Err(AppError::RangeNotSatisfiable),
        StatusCode::NOT_FOUND => return Err(AppError::not_found("Video")),
        other => {
            return Err(AppError::Gateway(format!("video source returned {}", other)));
        }
    }

    let mut response = Response::builder().status(status);
    if let Some(headers) = response.headers_mut() {
        for name in [CONTENT_TYPE, CONTENT_LENGTH, CONTENT_RANGE, ACCEPT_RANGES] {
            if let Some(value) = upstream.headers().get(&name) {
                headers.insert(name, value.clone());
            }
        }
        headers
            .entry(ACCEPT_RANGES)
            .or_insert(HeaderValue::from_static("bytes"));
    }

    response
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| AppError::internal(format!("Failed to build stream response: {}", e)))
}
