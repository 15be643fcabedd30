// src/fetch/http.rs
//! HTTP retrieval with per-kind body decoding.

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use serde_json::Value;

use super::{Fetch, FetchError};
use crate::parse::RawDescriptor;
use crate::sources::{Source, SourceKind};

/// Production fetcher: one GET per source, bounded by the source timeout,
/// body decoded according to the source kind.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<RawDescriptor>, FetchError> {
        let response = self
            .client
            .get(&source.url)
            .timeout(source.timeout())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Remote {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;

        decode_body(source, &body)
    }
}

type DecodeFn = fn(&str, &str) -> Result<Vec<RawDescriptor>, FetchError>;

/// Kind → decode function, resolved once per fetch instead of branching the
/// whole path.
fn decoder_for(kind: SourceKind) -> DecodeFn {
    match kind {
        SourceKind::Plain => decode_plain,
        SourceKind::Base64 => decode_base64,
        SourceKind::Json => decode_json,
    }
}

/// Decode a response body into raw descriptors per the source kind.
pub fn decode_body(source: &Source, body: &str) -> Result<Vec<RawDescriptor>, FetchError> {
    decoder_for(source.kind)(&source.name, body)
}

/// Split on line boundaries, trim, drop blanks.
fn decode_plain(source: &str, body: &str) -> Result<Vec<RawDescriptor>, FetchError> {
    Ok(body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| RawDescriptor::line(source, line))
        .collect())
}

/// The whole body is one base64 blob wrapping a plain list. Subscription
/// endpoints are sloppy about padding, so an unpadded decode is retried.
fn decode_base64(source: &str, body: &str) -> Result<Vec<RawDescriptor>, FetchError> {
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .or_else(|_| STANDARD_NO_PAD.decode(compact.as_bytes()))
        .map_err(|e| FetchError::Decode(format!("base64: {e}")))?;
    let text =
        String::from_utf8(bytes).map_err(|e| FetchError::Decode(format!("utf-8: {e}")))?;
    decode_plain(source, &text)
}

/// JSON body: a top-level array flattens to one descriptor per element, a
/// single object stays one descriptor.
fn decode_json(source: &str, body: &str) -> Result<Vec<RawDescriptor>, FetchError> {
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(format!("json: {e}")))?;
    Ok(match parsed {
        Value::Array(items) => items
            .into_iter()
            .map(|item| RawDescriptor::object(source, item))
            .collect(),
        other => vec![RawDescriptor::object(source, other)],
    })
}
