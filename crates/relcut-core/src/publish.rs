//! Remote release publication.
//!
//! Publication is a capability handed to the sequencer: [`NoopPublisher`]
//! for tag-only releases, [`GitHubPublisher`] to also create a release
//! record through the GitHub REST API.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT_VALUE: &str = concat!("relcut/", env!("CARGO_PKG_VERSION"));

/// Errors from publishing a release record.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// No usable credential was supplied.
    #[error("a non-empty API token is required to publish releases")]
    MissingCredential,

    /// The credential was rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Repository not found (or not visible to the token).
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned some other non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Network, TLS, or timeout failure.
    #[error("network error: {0}")]
    Network(String),
}

/// Result alias for publish operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// An opaque API token.
///
/// `Debug` never prints the value.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token, rejecting empty or whitespace-only strings.
    pub fn new(token: impl Into<String>) -> PublishResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(PublishError::MissingCredential);
        }
        Ok(Self(token))
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// The release record sent to the remote host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseRecord {
    /// Tag the release points at.
    pub tag: String,
    /// Release title.
    pub title: String,
    /// Release body text.
    pub body: String,
    /// Create as an unpublished draft.
    pub draft: bool,
    /// Mark as a prerelease.
    pub prerelease: bool,
}

/// A release the remote host accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedRelease {
    /// Host-assigned identifier.
    pub id: u64,
    /// Browser URL, when the host returned one.
    #[serde(default, rename = "html_url")]
    pub url: Option<String>,
}

/// Something that can publish a release record for a pushed tag.
pub trait ReleasePublisher {
    /// Publish `record`. Returns `None` when this publisher does nothing.
    fn publish(&self, record: &ReleaseRecord) -> PublishResult<Option<PublishedRelease>>;

    /// Short label for progress output and logs.
    fn name(&self) -> &'static str;
}

/// Publisher for tag-only releases.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl ReleasePublisher for NoopPublisher {
    fn publish(&self, record: &ReleaseRecord) -> PublishResult<Option<PublishedRelease>> {
        debug!(tag = %record.tag, "remote publication disabled");
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Creates releases through `POST /repos/{owner}/{repo}/releases`.
pub struct GitHubPublisher {
    client: Client,
    credential: Credential,
    owner: String,
    repo: String,
    api_base: String,
}

// Hand-written so the client internals stay out of logs
impl std::fmt::Debug for GitHubPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubPublisher")
            .field("credential", &self.credential)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CreateReleaseBody<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
}

#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

impl GitHubPublisher {
    /// Build a publisher with an explicit API base (GitHub Enterprise, tests)
    /// and request timeout.
    pub fn with_options(
        credential: Credential,
        owner: impl Into<String>,
        repo: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> PublishResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT_VALUE)
            .build()
            .map_err(|e| PublishError::Network(e.to_string()))?;

        Ok(Self {
            client,
            credential,
            owner: owner.into(),
            repo: repo.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// The `owner/repo` this publisher targets.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn headers(&self) -> PublishResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.credential.expose()))
            .map_err(|_| PublishError::AuthFailed("token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    fn handle_response(response: Response) -> PublishResult<PublishedRelease> {
        let status = response.status();
        if status.is_success() {
            return response.json().map_err(|e| PublishError::Api {
                status: status.as_u16(),
                message: format!("failed to parse response: {e}"),
            });
        }

        let message = response
            .json::<GitHubErrorResponse>()
            .map(|e| e.message)
            .unwrap_or_else(|_| "unknown error".to_string());

        Err(match status {
            StatusCode::UNAUTHORIZED => PublishError::AuthFailed("invalid or expired token".into()),
            StatusCode::FORBIDDEN => PublishError::AuthFailed(format!("permission denied: {message}")),
            StatusCode::NOT_FOUND => PublishError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => PublishError::RateLimited,
            _ if status.is_server_error() => PublishError::Api {
                status: status.as_u16(),
                message: format!("GitHub server error: {message}"),
            },
            _ => PublishError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }
}

impl ReleasePublisher for GitHubPublisher {
    #[instrument(skip(self, record), fields(repo = %self.slug(), tag = %record.tag))]
    fn publish(&self, record: &ReleaseRecord) -> PublishResult<Option<PublishedRelease>> {
        let url = format!(
            "{}/repos/{}/{}/releases",
            self.api_base, self.owner, self.repo
        );
        let body = CreateReleaseBody {
            tag_name: &record.tag,
            name: &record.title,
            body: &record.body,
            draft: record.draft,
            prerelease: record.prerelease,
        };

        debug!(%url, draft = record.draft, prerelease = record.prerelease, "creating release");

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .map_err(|e| PublishError::Network(e.to_string()))?;

        let release = Self::handle_response(response)?;
        info!(id = release.id, url = ?release.url, "release published");
        Ok(Some(release))
    }

    fn name(&self) -> &'static str {
        "github"
    }
}
