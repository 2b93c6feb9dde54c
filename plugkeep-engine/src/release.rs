//! Release-hosting API client.
//!
//! `GET {api}/repos/{owner}/{repo}/releases/latest` → tag + first asset with a
//! recognized extension. Everything that goes wrong here is "no release":
//! it is logged and returned as `None`, never raised.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use plugkeep_core::{AutoUpdateConfig, ComponentVersion, ReleaseDescriptor, RepoRef};

use crate::error::{io_err, EngineError};

/// Single-binary asset extension.
pub const BINARY_ASSET_EXTENSION: &str = ".dll";
/// Archive asset extension.
pub const ARCHIVE_ASSET_EXTENSION: &str = ".zip";

const USER_AGENT: &str = concat!("plugkeep/", env!("CARGO_PKG_VERSION"));

/// Shape of an asset URL, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Archive,
    Binary,
}

impl AssetKind {
    /// `.zip` (case-insensitive, query string ignored) is an archive;
    /// anything else is treated as the binary itself.
    pub fn of_url(url: &str) -> Self {
        let path = reqwest::Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or(url).to_string());
        if path.to_ascii_lowercase().ends_with(ARCHIVE_ASSET_EXTENSION) {
            AssetKind::Archive
        } else {
            AssetKind::Binary
        }
    }
}

fn is_recognized_asset(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(BINARY_ASSET_EXTENSION) || lower.ends_with(ARCHIVE_ASSET_EXTENSION)
}

/// HTTP client for release lookups and asset downloads.
///
/// `timeout` bounds the whole release lookup. Downloads may take as long as
/// they need, but fail once the server sends nothing for `timeout`.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http: reqwest::Client,
    api_base: String,
    timeout: Duration,
}

impl ReleaseClient {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &AutoUpdateConfig) -> Result<Self, EngineError> {
        Self::new(config.api_base_url(), config.http_timeout())
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Resolve the latest published release of `repo`.
    pub async fn latest_release(&self, repo: &RepoRef) -> Option<ReleaseDescriptor> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base, repo.owner, repo.repo
        );
        tracing::debug!(url = %url, "fetching latest release");

        let response = match self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(repo = %repo, error = %err, "release lookup failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                repo = %repo,
                status = response.status().as_u16(),
                "release API returned non-success status",
            );
            return None;
        }

        let body = match response.json::<Value>().await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(repo = %repo, error = %err, "release response is not JSON");
                return None;
            }
        };

        Some(parse_release(&body))
    }

    /// Stream `url` into `dest`. Non-2xx is an error, and so is a server that
    /// goes quiet for longer than the client timeout.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, EngineError> {
        let stalled = || EngineError::DownloadStalled {
            url: url.to_string(),
            secs: self.timeout.as_secs_f64(),
        };

        let response = tokio::time::timeout(self.timeout, self.http.get(url).send())
            .await
            .map_err(|_| stalled())??;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(dest)
            .await
            .map_err(|e| io_err(dest, e))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = tokio::time::timeout(self.timeout, stream.next())
            .await
            .map_err(|_| stalled())?
        {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(|e| io_err(dest, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| io_err(dest, e))?;
        file.sync_all().await.map_err(|e| io_err(dest, e))?;

        tracing::debug!(url = %url, bytes = written, "asset downloaded");
        Ok(written)
    }
}

/// Extract the descriptor from a release document.
///
/// Missing or mistyped fields are treated as absent.
pub fn parse_release(body: &Value) -> ReleaseDescriptor {
    let version = body
        .get("tag_name")
        .and_then(Value::as_str)
        .and_then(ComponentVersion::from_tag);

    let asset_url = body
        .get("assets")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|asset| {
            asset
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(is_recognized_asset)
        })
        .find_map(|asset| {
            asset
                .get("browser_download_url")
                .and_then(Value::as_str)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
        });

    ReleaseDescriptor { version, asset_url }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_first_recognized_asset_in_order() {
        let body = json!({
            "tag_name": "v1.1.0",
            "assets": [
                {"name": "notes.txt", "browser_download_url": "https://x/notes.txt"},
                {"name": "Foo.ZIP", "browser_download_url": "https://x/Foo.ZIP"},
                {"name": "Foo.dll", "browser_download_url": "https://x/Foo.dll"}
            ]
        });
        let release = parse_release(&body);
        assert_eq!(release.version, "1.1.0".parse().ok());
        assert_eq!(release.asset_url.as_deref(), Some("https://x/Foo.ZIP"));
    }

    #[test]
    fn unparsable_tag_gives_no_version() {
        let release = parse_release(&json!({"tag_name": "nightly", "assets": []}));
        assert_eq!(release.version, None);
        assert_eq!(release.asset_url, None);
    }

    #[test]
    fn malformed_fields_degrade_to_absent() {
        let release = parse_release(&json!({
            "tag_name": 42,
            "assets": [
                {"name": "Foo.dll"},
                {"name": null, "browser_download_url": "https://x/a.dll"},
                {"name": "Bar.dll", "browser_download_url": "https://x/Bar.dll"}
            ]
        }));
        assert_eq!(release.version, None);
        assert_eq!(release.asset_url.as_deref(), Some("https://x/Bar.dll"));

        assert_eq!(parse_release(&json!("not an object")), ReleaseDescriptor::default());
        assert_eq!(
            parse_release(&json!({"assets": "nope"})),
            ReleaseDescriptor::default()
        );
    }

    #[test]
    fn asset_kind_follows_url_path() {
        assert_eq!(AssetKind::of_url("https://x/Foo.zip"), AssetKind::Archive);
        assert_eq!(AssetKind::of_url("https://x/Foo.Zip?raw=1"), AssetKind::Archive);
        assert_eq!(AssetKind::of_url("https://x/Foo.dll"), AssetKind::Binary);
        assert_eq!(AssetKind::of_url("not a url.zip"), AssetKind::Archive);
    }

    #[tokio::test]
    async fn silent_download_server_is_reported_as_stalled() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download/Foo.dll"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = ReleaseClient::new(server.uri(), Duration::from_millis(200)).unwrap();
        let dest = tempfile::NamedTempFile::new().unwrap();
        let url = format!("{}/download/Foo.dll", server.uri());

        let started = std::time::Instant::now();
        let err = client.download(&url, dest.path()).await.unwrap_err();
        assert!(matches!(err, EngineError::DownloadStalled { .. }), "{err}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
