//! Turn MCP document sources into PDF bytes

use crate::error::{Error, Result};
use crate::pdf::check_pdf_header;
use base64::Engine;
use futures_util::StreamExt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_REDIRECTS: usize = 10;

/// A source resolved to bytes that start with a PDF header
#[derive(Debug)]
pub struct ResolvedDocument {
    pub data: Vec<u8>,
    pub source_name: String,
}

impl ResolvedDocument {
    fn checked(data: Vec<u8>, source_name: String) -> Result<Self> {
        check_pdf_header(&data)?;
        Ok(Self { data, source_name })
    }
}

/// Where file paths may be read from and how URL downloads are bounded
#[derive(Debug, Clone)]
pub struct SourcePolicy {
    /// Allowed directories for path sources; empty allows any path
    pub resource_dirs: Vec<PathBuf>,
    /// Allow URLs that resolve to private/reserved IPs
    pub allow_private_urls: bool,
    /// Maximum download size in bytes for URL sources
    pub max_download_bytes: u64,
}

impl Default for SourcePolicy {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            allow_private_urls: false,
            max_download_bytes: 100 * 1024 * 1024,
        }
    }
}

impl SourcePolicy {
    /// Canonicalize `path` and require it to sit under a resource directory.
    /// With no resource directories configured every path is allowed.
    pub fn check_path(&self, path: &str) -> Result<PathBuf> {
        if self.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let denied = || Error::PathAccessDenied {
            path: path.to_string(),
        };
        let canonical = std::fs::canonicalize(path).map_err(|_| denied())?;

        let allowed = self.resource_dirs.iter().any(|dir| {
            std::fs::canonicalize(dir)
                .map(|dir| canonical.starts_with(dir))
                .unwrap_or(false)
        });

        if allowed {
            Ok(canonical)
        } else {
            Err(denied())
        }
    }
}

/// Read a PDF from disk
pub fn resolve_path(path: &Path) -> Result<ResolvedDocument> {
    if !path.is_file() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }
    let data = std::fs::read(path)?;
    ResolvedDocument::checked(data, path.display().to_string())
}

/// Decode a standard-alphabet base64 PDF
pub fn resolve_base64(encoded: &str) -> Result<ResolvedDocument> {
    let data = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
    ResolvedDocument::checked(data, "<base64>".to_string())
}

/// Loopback, private, link-local, CGNAT and other non-routable addresses
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || (a == 100 && (b & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xFE00) == 0xFC00
                || (first & 0xFFC0) == 0xFE80
        }
    }
}

/// Parse a source URL and require an http(s) scheme with a host
fn parse_source_url(raw: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(raw).map_err(|e| Error::SourceResolution {
        reason: format!("Invalid URL: {}", e),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::SourceResolution {
            reason: format!("Unsupported URL scheme: {}", parsed.scheme()),
        });
    }
    if parsed.host_str().is_none() {
        return Err(Error::SourceResolution {
            reason: "URL has no host".to_string(),
        });
    }
    Ok(parsed)
}

/// Resolve the URL host and refuse it if any address is private.
///
/// Returns the checked addresses so the request can be pinned to them.
async fn check_ssrf(url: &url::Url) -> Result<Vec<SocketAddr>> {
    let host = url.host_str().ok_or_else(|| Error::SourceResolution {
        reason: "URL has no host".to_string(),
    })?;
    let port = url.port_or_known_default().unwrap_or(443);

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Error::SourceResolution {
            reason: format!("DNS resolution failed for {}: {}", host, e),
        })?
        .collect();

    if addrs.iter().any(|addr| is_private_ip(&addr.ip())) {
        return Err(Error::SsrfBlocked {
            url: url.to_string(),
        });
    }
    Ok(addrs)
}

/// Absolute target of a redirect response
fn redirect_target(current: &url::Url, location: Option<&str>) -> Result<url::Url> {
    let location = location.ok_or_else(|| Error::SourceResolution {
        reason: "Redirect without a Location header".to_string(),
    })?;
    let next = current.join(location).map_err(|e| Error::SourceResolution {
        reason: format!("Invalid redirect location: {}", e),
    })?;
    parse_source_url(next.as_str())
}

/// Send one GET without following redirects. Unless private addresses are
/// allowed, the host is checked first and the connection pinned to the
/// checked addresses.
async fn fetch_hop(url: &url::Url, policy: &SourcePolicy) -> Result<reqwest::Response> {
    let mut builder = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none());

    if !policy.allow_private_urls {
        let addrs = check_ssrf(url).await?;
        if let Some(url::Host::Domain(domain)) = url.host() {
            builder = builder.resolve_to_addrs(domain, &addrs);
        }
    }

    Ok(builder.build()?.get(url.clone()).send().await?)
}

/// Download a PDF, enforcing the SSRF check on every redirect hop and the
/// size cap
pub async fn resolve_url(url: &str, policy: &SourcePolicy) -> Result<ResolvedDocument> {
    let mut current = parse_source_url(url)?;
    let mut redirects = 0;

    let response = loop {
        let response = fetch_hop(&current, policy).await?;
        if !response.status().is_redirection() {
            break response;
        }

        redirects += 1;
        if redirects > MAX_REDIRECTS {
            return Err(Error::SourceResolution {
                reason: format!("Too many redirects (max {})", MAX_REDIRECTS),
            });
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok());
        let next = redirect_target(&current, location)?;
        tracing::debug!(from = %current, to = %next, "Following redirect");
        current = next;
    };

    let max = policy.max_download_bytes;
    if !response.status().is_success() {
        return Err(Error::SourceResolution {
            reason: format!("HTTP request failed with status: {}", response.status()),
        });
    }

    if let Some(size) = response.content_length().filter(|&len| len > max) {
        return Err(Error::DownloadTooLarge {
            size,
            max_size: max,
        });
    }

    // Content-Length can lie or be absent; count while streaming
    let mut data = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        data.extend_from_slice(&chunk?);
        if data.len() as u64 > max {
            return Err(Error::DownloadTooLarge {
                size: data.len() as u64,
                max_size: max,
            });
        }
    }

    tracing::debug!(url, bytes = data.len(), "Downloaded document");
    ResolvedDocument::checked(data, url.to_string())
}
