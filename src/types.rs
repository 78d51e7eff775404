use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path_with_namespace: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Environment {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub last_deployment: Option<Deployment>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Deployment {
    pub id: u64,
    #[serde(default)]
    pub deployable: Option<Deployable>,
}

/// The CI job that carried out a deployment.
#[derive(Debug, Deserialize, Clone)]
pub struct Deployable {
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub commit: Commit,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Commit {
    pub short_id: String,
}

/// One page of a paginated listing. `next_page` is `None` on the last page.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page: Option<u32>,
}

/// A production environment of a single service, e.g. `prod/api` becomes
/// `api`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEnvironment {
    pub display_name: String,
    pub environment_id: u64,
}

impl ServiceEnvironment {
    /// Splits `"<prefix>/<service>"` into a service environment. Names that
    /// do not have exactly two non-empty segments yield `None`.
    pub fn from_environment(env: &Environment) -> Option<Self> {
        let mut parts = env.name.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(prefix), Some(service), None) if !prefix.is_empty() && !service.is_empty() => {
                Some(Self {
                    display_name: service.to_string(),
                    environment_id: env.id,
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeploymentDrift {
    pub service_name: String,
    pub short_sha: String,
    pub elapsed: Duration,
}

/// Outcome counts of a drift report.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriftSummary {
    pub reported: usize,
    pub skipped: usize,
    pub failed: usize,
}
