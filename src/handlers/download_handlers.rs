//! HTTP handlers for artifact retrieval with byte-range support.
//!
//! Streams bodies through `ReaderStream` so a window of any size downloads
//! under fixed memory, and frames responses per the Range contract:
//! 200 + `Accept-Ranges` for full reads, 206 + `Content-Range` for windows,
//! 416 for unsatisfiable or multi-range requests.

use crate::{
    errors::AppError,
    services::{
        artifact_store::ArtifactStore,
        range_planner::{self, RangePlan, RangeRejection},
    },
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

/// GET `/download/{*artifact}` — full or partial artifact body.
pub async fn download_artifact(
    State(store): State<ArtifactStore>,
    Path(artifact): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let (file, length) = store.open(&artifact).await?;

    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    match range_planner::plan(range_header, length) {
        Ok(RangePlan::Full) => {
            tracing::info!("full download: {}, size={}", artifact, length);
            let body = Body::from_stream(ArtifactStore::full_stream(file));
            let mut response = Response::new(body);
            set_artifact_headers(response.headers_mut(), &artifact, length);
            Ok(response)
        }
        Ok(RangePlan::Window { start, end }) => {
            tracing::info!(
                "partial download: {}, range={}-{}, size={}",
                artifact,
                start,
                end,
                end - start + 1
            );
            let stream = ArtifactStore::window_stream(file, start, end)
                .await
                .map_err(|err| AppError::internal(err.to_string()))?;
            let mut response = Response::new(Body::from_stream(stream));
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
            set_artifact_headers(response.headers_mut(), &artifact, end - start + 1);
            insert_header(
                response.headers_mut(),
                header::CONTENT_RANGE,
                &format!("bytes {}-{}/{}", start, end, length),
            );
            Ok(response)
        }
        Err(rejection) => Ok(range_rejection_response(rejection, length)),
    }
}

/// HEAD `/download/{*artifact}` — framing headers only, no body.
pub async fn head_artifact(
    State(store): State<ArtifactStore>,
    Path(artifact): Path<String>,
) -> Result<Response, AppError> {
    let length = store.length(&artifact).await?;
    let mut response = Response::new(Body::empty());
    set_artifact_headers(response.headers_mut(), &artifact, length);
    Ok(response)
}

fn set_artifact_headers(headers: &mut HeaderMap, artifact: &str, content_length: u64) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    insert_header(headers, header::CONTENT_LENGTH, &content_length.to_string());
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    insert_header(
        headers,
        header::CONTENT_DISPOSITION,
        &content_disposition(artifact),
    );
}

fn insert_header(headers: &mut HeaderMap, name: header::HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

/// Bad syntax is the client's mistake (400); unsatisfiable and multi-range
/// specs answer 416 with the artifact's actual extent.
fn range_rejection_response(rejection: RangeRejection, length: u64) -> Response {
    use axum::response::IntoResponse;

    let status = match rejection {
        RangeRejection::BadSyntax => StatusCode::BAD_REQUEST,
        RangeRejection::Unsupported | RangeRejection::Unsatisfiable => {
            StatusCode::RANGE_NOT_SATISFIABLE
        }
    };
    let mut response = AppError::new(status, rejection.to_string()).into_response();
    if status == StatusCode::RANGE_NOT_SATISFIABLE {
        insert_header(
            response.headers_mut(),
            header::CONTENT_RANGE,
            &format!("bytes */{}", length),
        );
    }
    response
}

/// Build a `Content-Disposition` value. Names that fit in a quoted string
/// go in plainly; anything else uses the RFC 5987 extended form.
fn content_disposition(name: &str) -> String {
    let header_safe = name
        .bytes()
        .all(|b| (b' '..=b'~').contains(&b) && b != b'"' && b != b'\\');
    if header_safe {
        format!("attachment; filename=\"{}\"", name)
    } else {
        let encoded = utf8_percent_encode(name, NON_ALPHANUMERIC);
        format!("attachment; filename*=UTF-8''{}", encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_use_the_quoted_form() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\""
        );
    }

    #[test]
    fn binary_names_use_the_extended_form() {
        let value = content_disposition("r\u{00e9}sum\u{00e9}.pdf");
        assert!(value.starts_with("attachment; filename*=UTF-8''"));
        assert!(value.is_ascii());
        assert!(!value.contains('\u{00e9}'));
    }

    #[test]
    fn quotes_force_the_extended_form() {
        let value = content_disposition("a\"b.txt");
        assert!(value.starts_with("attachment; filename*=UTF-8''"));
    }
}
