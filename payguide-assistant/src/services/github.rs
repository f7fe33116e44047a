//! GitHub contents API client used to publish the Pay Guide.
//!
//! A publish is a single `PUT /repos/{owner}/{repo}/contents/{path}`; the
//! blob sha of the existing file is fetched first so the PUT updates rather
//! than conflicts.

use crate::config::GitHubSettings;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub publishing is not configured: {0}")]
    NotConfigured(String),

    /// Publishing was switched off at startup; carries the original reason.
    #[error("{0}")]
    Disabled(String),

    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for GitHubError {
    fn from(e: reqwest::Error) -> Self {
        GitHubError::Network(e.to_string())
    }
}

/// Outcome of a successful push.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedCommit {
    pub commit_sha: String,
    pub html_url: Option<String>,
    pub path: String,
    pub branch: String,
}

#[derive(Debug, Serialize)]
struct PutContentRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentFile {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PutContentResponse {
    commit: CommitInfo,
}

#[derive(Debug, Deserialize)]
struct CommitInfo {
    sha: String,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    token: Secret<String>,
    /// `{base}/repos/{owner}/{repo}/contents/{path}` with every segment encoded.
    contents_url: Url,
    owner: String,
    repo: String,
    branch: String,
    path: String,
    commit_message: String,
}

impl GitHubClient {
    /// Build a client, or explain why publishing is unavailable.
    pub fn from_settings(settings: &GitHubSettings) -> Result<Self, GitHubError> {
        let token = match &settings.token {
            Some(token) if !token.expose_secret().is_empty() => token.clone(),
            _ => {
                return Err(GitHubError::NotConfigured(
                    "GITHUB_TOKEN is not set".to_string(),
                ))
            }
        };

        if settings.owner.is_empty() || settings.repo.is_empty() {
            return Err(GitHubError::NotConfigured(
                "github.owner and github.repo must be set".to_string(),
            ));
        }

        let path = settings.path.trim_start_matches('/').to_string();
        let contents_url = contents_url(
            &settings.api_base_url,
            &settings.owner,
            &settings.repo,
            &path,
        )?;

        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            token,
            contents_url,
            owner: settings.owner.clone(),
            repo: settings.repo.clone(),
            branch: settings.branch.clone(),
            path,
            commit_message: settings.commit_message.clone(),
        })
    }

    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(self.token.expose_secret())
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    /// Blob sha of the file on the configured branch, `None` if it does not exist yet.
    pub async fn fetch_sha(&self) -> Result<Option<String>, GitHubError> {
        let response = self
            .authorized(self.client.get(self.contents_url.clone()))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        let file: ContentFile = serde_json::from_str(&body).map_err(|e| GitHubError::Api {
            status: status.as_u16(),
            message: format!("Unexpected contents response: {}", e),
        })?;

        Ok(Some(file.sha))
    }

    /// Create or update the file with `bytes` in a single commit.
    pub async fn put_file(&self, bytes: &[u8]) -> Result<PublishedCommit, GitHubError> {
        let sha = self.fetch_sha().await?;
        let request = PutContentRequest {
            message: &self.commit_message,
            content: BASE64.encode(bytes),
            branch: &self.branch,
            sha,
        };

        let response = self
            .authorized(self.client.put(self.contents_url.clone()))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = api_error(status, &body);
            tracing::error!(
                repository = %self.repository(),
                path = %self.path,
                error = %err,
                "GitHub publish failed"
            );
            return Err(err);
        }

        let parsed: PutContentResponse =
            serde_json::from_str(&body).map_err(|e| GitHubError::Api {
                status: status.as_u16(),
                message: format!("Unexpected publish response: {}", e),
            })?;

        tracing::info!(
            repository = %self.repository(),
            path = %self.path,
            branch = %self.branch,
            commit = %parsed.commit.sha,
            "Published Pay Guide to GitHub"
        );

        Ok(PublishedCommit {
            commit_sha: parsed.commit.sha,
            html_url: parsed.commit.html_url,
            path: self.path.clone(),
            branch: self.branch.clone(),
        })
    }
}

fn api_error(status: StatusCode, body: &str) -> GitHubError {
    let message = serde_json::from_str::<GitHubErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.to_string());
    GitHubError::Api {
        status: status.as_u16(),
        message,
    }
}

fn contents_url(base: &str, owner: &str, repo: &str, path: &str) -> Result<Url, GitHubError> {
    let mut url = Url::parse(base).map_err(|e| {
        GitHubError::NotConfigured(format!("github.api_base_url is invalid: {}", e))
    })?;

    url.path_segments_mut()
        .map_err(|_| {
            GitHubError::NotConfigured(format!(
                "github.api_base_url cannot hold a path: {}",
                base
            ))
        })?
        .pop_if_empty()
        .extend(["repos", owner, repo, "contents"])
        .extend(path.split('/').filter(|segment| !segment.is_empty()));

    Ok(url)
}
