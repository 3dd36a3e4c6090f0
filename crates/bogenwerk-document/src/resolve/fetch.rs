// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Network fetch capability for remote asset references.
//
// The resolver only sees the `Fetcher` trait; `HttpFetcher` is the production
// implementation on top of `reqwest`, bounded by the configured timeout.

use std::time::Duration;

use async_trait::async_trait;
use bogenwerk_core::config::ResolverConfig;
use bogenwerk_core::error::{BogenwerkError, Result};
use tracing::{debug, error};

/// Body and declared media type of a fetched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAsset {
    pub bytes: Vec<u8>,
    /// `Content-Type` essence (lowercase, parameters stripped), if sent.
    pub content_type: Option<String>,
}

/// Something that can retrieve the bytes behind an absolute URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset>;
}

/// HTTP(S) fetcher backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| BogenwerkError::Fetch(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset> {
        debug!(url, "fetching remote asset");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BogenwerkError::Fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            error!(url, %status, "remote asset request failed");
            return Err(BogenwerkError::Fetch(format!("{url} returned {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(content_type_essence);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BogenwerkError::Fetch(format!("{url}: reading body: {e}")))?
            .to_vec();

        debug!(url, bytes = bytes.len(), ?content_type, "remote asset fetched");
        Ok(FetchedAsset {
            bytes,
            content_type,
        })
    }
}

fn content_type_essence(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or(value)
        .trim()
        .to_ascii_lowercase()
}

/// File extension for a fetched payload: the declared media type first, then
/// the leading magic bytes.
pub fn sniff_extension(bytes: &[u8], content_type: Option<&str>) -> Option<&'static str> {
    content_type
        .and_then(extension_for_mime)
        .or_else(|| extension_for_magic(bytes))
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let ext = match mime {
        "font/woff2" | "application/font-woff2" => "woff2",
        "font/woff" | "application/font-woff" | "application/x-font-woff" => "woff",
        "font/ttf" | "font/sfnt" | "application/x-font-ttf" | "application/font-sfnt" => "ttf",
        "font/otf" | "application/x-font-otf" | "application/x-font-opentype" => "otf",
        "application/vnd.ms-fontobject" => "eot",
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => return None,
    };
    Some(ext)
}

fn extension_for_magic(bytes: &[u8]) -> Option<&'static str> {
    let ext = if bytes.starts_with(b"wOF2") {
        "woff2"
    } else if bytes.starts_with(b"wOFF") {
        "woff"
    } else if bytes.starts_with(b"OTTO") {
        "otf"
    } else if bytes.starts_with(&[0x00, 0x01, 0x00, 0x00]) || bytes.starts_with(b"true") {
        "ttf"
    } else if bytes.len() > 35 && &bytes[34..36] == b"LP" {
        "eot"
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "jpg"
    } else if bytes.starts_with(b"GIF8") {
        "gif"
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        "webp"
    } else if bytes.starts_with(b"<svg") || bytes.starts_with(b"<?xml") {
        "svg"
    } else {
        return None;
    };
    Some(ext)
}
