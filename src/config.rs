use anyhow::{anyhow, Context, Result};
use std::fmt;
use std::time::Duration;

pub const TOKEN_VAR: &str = "GITLAB_TOKEN";
pub const URL_VAR: &str = "GITLAB_URL";
pub const TIMEOUT_VAR: &str = "GITLAB_TIMEOUT";

pub const DEFAULT_BASE_URL: &str = "https://gitlab.com";
pub const DEFAULT_ENVIRONMENT_MARKER: &str = "prod/";
pub const DEFAULT_PER_PAGE: u32 = 20;

#[derive(Clone)]
pub struct Config {
    /// Fragment matched against project names and namespaces.
    pub project: String,
    pub token: String,
    pub base_url: String,
    /// Substring an environment name must contain to be reported.
    pub environment_marker: String,
    pub per_page: u32,
    pub timeout: Option<Duration>,
}

impl Config {
    pub fn from_env(project: impl Into<String>) -> Result<Self> {
        Self::from_lookup(project, |key| std::env::var(key).ok())
    }

    /// Builds the config from `project` and whatever `lookup` returns for the
    /// `GITLAB_*` variables.
    pub fn from_lookup<F>(project: impl Into<String>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project = project.into();
        if project.trim().is_empty() {
            return Err(anyhow!("project not set"));
        }

        let token = lookup(TOKEN_VAR).ok_or_else(|| anyhow!("token not set"))?;

        let base_url = lookup(URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout = lookup(TIMEOUT_VAR)
            .map(|raw| {
                humantime::parse_duration(raw.trim())
                    .with_context(|| format!("invalid {TIMEOUT_VAR} value {raw:?}"))
            })
            .transpose()?;

        Ok(Self {
            project,
            token,
            base_url,
            environment_marker: DEFAULT_ENVIRONMENT_MARKER.to_string(),
            per_page: DEFAULT_PER_PAGE,
            timeout,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("project", &self.project)
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("environment_marker", &self.environment_marker)
            .field("per_page", &self.per_page)
            .field("timeout", &self.timeout)
            .finish()
    }
}
