//! HTTP framing for synthetic files: download listing and streamed bodies.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{BoxStream, Stream};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::OwnedSemaphorePermit;

use super::catalog::{list_files, FileSpec};
use super::stream;

/// Path prefix the files are served under.
pub const FILES_PATH: &str = "/speedtest";

#[derive(Debug, Serialize)]
pub struct FileLink {
    #[serde(flatten)]
    pub spec: &'static FileSpec,
    pub url: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadExamples {
    pub wget: String,
    pub curl: String,
}

#[derive(Debug, Serialize)]
pub struct ListingInstructions {
    pub usage: &'static str,
    pub examples: DownloadExamples,
}

#[derive(Debug, Serialize)]
pub struct FileListing {
    pub files: Vec<FileLink>,
    pub instructions: ListingInstructions,
}

/// Scheme and authority the client used to reach us.
///
/// Honors `X-Forwarded-Proto` from a reverse proxy, otherwise assumes
/// plain HTTP. `fallback_host` is used when the request has no `Host`.
pub fn base_url(headers: &HeaderMap, fallback_host: &str) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(fallback_host);
    format!("{}://{}", scheme, host)
}

/// Every catalog file with an absolute download URL.
pub fn file_listing(base_url: &str) -> FileListing {
    let files = list_files()
        .iter()
        .map(|spec| FileLink {
            spec,
            url: format!("{}{}/{}", base_url, FILES_PATH, spec.filename),
            description: format!("Download {} test file", spec.size_label),
        })
        .collect::<Vec<_>>();

    let example = list_files()
        .first()
        .map(|spec| format!("{}{}/{}", base_url, FILES_PATH, spec.filename))
        .unwrap_or_default();

    FileListing {
        files,
        instructions: ListingInstructions {
            usage: "Right-click and 'Save As' or use wget/curl to download",
            examples: DownloadExamples {
                wget: format!("wget {}", example),
                curl: format!("curl -O {}", example),
            },
        },
    }
}

/// Synthetic body that owns a stream admission permit for as long as the
/// body itself is alive.
pub struct PermitStream {
    inner: BoxStream<'static, Result<Bytes, Infallible>>,
    permit: Option<OwnedSemaphorePermit>,
}

impl PermitStream {
    pub fn new(size_bytes: u64, permit: Option<OwnedSemaphorePermit>) -> Self {
        Self {
            inner: stream::generate(size_bytes).boxed(),
            permit,
        }
    }

    pub fn holds_permit(&self) -> bool {
        self.permit.is_some()
    }
}

impl Stream for PermitStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let next = self.inner.poll_next_unpin(cx);
        if let Poll::Ready(None) = next {
            // Exhausted: free the slot without waiting for hyper to drop us.
            self.permit = None;
        }
        next
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Stream `spec` as an attachment.
///
/// `permit`, when given, is released once the body is finished or dropped by
/// a disconnecting client.
pub fn file_response(spec: &FileSpec, permit: Option<OwnedSemaphorePermit>) -> Response {
    let body = PermitStream::new(spec.size_bytes, permit);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(spec.size_bytes));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", spec.filename))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );

    (StatusCode::OK, headers, Body::from_stream(body)).into_response()
}
