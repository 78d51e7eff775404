//! Read-only access to the GitLab REST API.

use crate::types::{Environment, Page, Project};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const NEXT_PAGE_HEADER: &str = "x-next-page";
const MAX_DETAIL_CHARS: usize = 200;

/// The three GitLab operations the drift report needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitLabApi: Send + Sync {
    /// Private projects whose name or namespace matches `search`.
    async fn search_projects(&self, search: &str) -> Result<Vec<Project>>;

    /// One page of the project's available environments matching `search`.
    async fn list_environments(
        &self,
        project_id: u64,
        search: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Environment>>;

    async fn get_environment(&self, project_id: u64, environment_id: u64) -> Result<Environment>;
}

#[derive(Clone)]
pub struct GitLabClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitLabClient {
    pub fn new(base_url: &str, token: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("creating client")?;

        Ok(Self {
            client,
            api_url: format!("{}/api/v4", base_url.trim_end_matches('/')),
            token: token.to_string(),
        })
    }

    fn request(&self, path: &str) -> RequestBuilder {
        self.client
            .request(Method::GET, format!("{}{}", self.api_url, path))
            .header(TOKEN_HEADER, &self.token)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<(T, HeaderMap)> {
        let request = request.build()?;
        let url = request.url().clone();
        tracing::debug!(%url, "GET");

        let response = self.client.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match error_detail(&body) {
                Some(detail) => anyhow!("GET {url}: {status}: {detail}"),
                None => anyhow!("GET {url}: {status}"),
            });
        }

        let headers = response.headers().clone();
        let body = response
            .json()
            .await
            .with_context(|| format!("decoding response from {url}"))?;
        Ok((body, headers))
    }
}

#[async_trait]
impl GitLabApi for GitLabClient {
    async fn search_projects(&self, search: &str) -> Result<Vec<Project>> {
        let request = self.request("/projects").query(&[
            ("search", search),
            ("search_namespaces", "true"),
            ("visibility", "private"),
        ]);
        let (projects, _) = self.fetch(request).await?;
        Ok(projects)
    }

    async fn list_environments(
        &self,
        project_id: u64,
        search: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Environment>> {
        let request = self
            .request(&format!("/projects/{project_id}/environments"))
            .query(&[
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
                ("states", "available".to_string()),
                ("search", search.to_string()),
            ]);
        let (items, headers) = self.fetch(request).await?;
        Ok(Page {
            items,
            next_page: next_page(&headers),
        })
    }

    async fn get_environment(&self, project_id: u64, environment_id: u64) -> Result<Environment> {
        let request = self.request(&format!(
            "/projects/{project_id}/environments/{environment_id}"
        ));
        let (environment, _) = self.fetch(request).await?;
        Ok(environment)
    }
}

/// GitLab leaves `X-Next-Page` empty on the last page.
pub(crate) fn next_page(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(NEXT_PAGE_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
        .filter(|page| *page > 0)
}

/// A one-line summary of an error response body. GitLab answers with
/// `{"message": ...}`; anything else (proxy pages, plain text) has its
/// whitespace collapsed.
pub(crate) fn error_detail(body: &str) -> Option<String> {
    let detail = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(mut fields)) => match fields.remove("message") {
            Some(serde_json::Value::String(message)) => message,
            Some(message) => message.to_string(),
            None => serde_json::Value::Object(fields).to_string(),
        },
        _ => body.to_string(),
    };

    let detail = detail.split_whitespace().collect::<Vec<_>>().join(" ");
    if detail.is_empty() {
        None
    } else if detail.chars().count() > MAX_DETAIL_CHARS {
        let truncated: String = detail.chars().take(MAX_DETAIL_CHARS).collect();
        Some(format!("{truncated}..."))
    } else {
        Some(detail)
    }
}
