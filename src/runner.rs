use crate::api::{GitLabApi, GitLabClient};
use crate::config::Config;
use crate::humanize::format_elapsed;
use crate::types::{DeploymentDrift, DriftSummary, ServiceEnvironment};
use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use futures::future::join_all;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::Instrument;

pub const HEADER: &str = "SERVICE           | SHORT SHA | LAST DEPLOY";

/// Number of units kept when printing the time since a deploy.
const ELAPSED_UNITS: usize = 2;

enum RowOutcome {
    Reported,
    Skipped,
    Failed,
}

pub struct DriftChecker {
    config: Config,
    api: Arc<dyn GitLabApi>,
}

impl DriftChecker {
    pub fn new(config: Config, api: Arc<dyn GitLabApi>) -> Self {
        Self { config, api }
    }

    /// Creates a checker talking to the GitLab instance named in `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let client = GitLabClient::new(&config.base_url, &config.token, config.timeout)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    /// Resolves the project, lists its production environments and prints
    /// the drift report to `out`.
    pub async fn run<W>(&self, out: Arc<Mutex<W>>) -> Result<DriftSummary>
    where
        W: Write + Send + 'static,
    {
        let project_id = self.resolve_project().await.context("get project id")?;
        let environments = self
            .service_environments(project_id)
            .await
            .context("get envs")?;
        self.report_drifts(project_id, environments, out)
            .await
            .context("get drifts")
    }

    #[tracing::instrument(skip(self), fields(search = %self.config.project))]
    pub async fn resolve_project(&self) -> Result<u64> {
        tracing::debug!("asking gitlab for project id");
        let projects = self
            .api
            .search_projects(&self.config.project)
            .await
            .context("listing projects")?;

        match projects.as_slice() {
            [] => bail!("no projects matched {:?}", self.config.project),
            [project] => {
                tracing::debug!(project_id = project.id, name = %project.name, "resolved project");
                Ok(project.id)
            }
            many => {
                let names: Vec<&str> = many
                    .iter()
                    .map(|p| p.path_with_namespace.as_str())
                    .collect();
                bail!(
                    "too many projects matched {:?}: {}",
                    self.config.project,
                    names.join(", ")
                )
            }
        }
    }

    /// All available environments of the project named `<prefix>/<service>`
    /// that contain the configured marker.
    #[tracing::instrument(skip(self))]
    pub async fn service_environments(&self, project_id: u64) -> Result<Vec<ServiceEnvironment>> {
        let marker = &self.config.environment_marker;
        let mut environments = Vec::new();
        let mut page = Some(1);

        while let Some(current) = page {
            let listing = self
                .api
                .list_environments(project_id, marker, current, self.config.per_page)
                .await
                .context("list environments")?;
            tracing::debug!(page = current, count = listing.items.len(), "listed environments");
            environments.extend(listing.items);

            page = match listing.next_page {
                Some(next) if next <= current => {
                    bail!("list environments: page {current} points back to page {next}")
                }
                next => next,
            };
        }

        let services: Vec<ServiceEnvironment> = environments
            .iter()
            .filter(|env| env.name.contains(marker.as_str()))
            .filter_map(ServiceEnvironment::from_environment)
            .collect();
        tracing::info!(
            listed = environments.len(),
            services = services.len(),
            "collected service environments"
        );
        Ok(services)
    }

    /// Fetches every environment's last deployment concurrently and writes
    /// one row per deployed service, in completion order. A failure for one
    /// service is logged and does not affect the others.
    #[tracing::instrument(skip(self, environments, out), fields(count = environments.len()))]
    pub async fn report_drifts<W>(
        &self,
        project_id: u64,
        environments: Vec<ServiceEnvironment>,
        out: Arc<Mutex<W>>,
    ) -> Result<DriftSummary>
    where
        W: Write + Send + 'static,
    {
        writeln!(lock(&out), "{HEADER}")?;

        let tasks: Vec<JoinHandle<RowOutcome>> = environments
            .into_iter()
            .map(|env| {
                let api = Arc::clone(&self.api);
                let out = Arc::clone(&out);
                let span = tracing::info_span!("get_drift", service = %env.display_name);

                tokio::spawn(
                    async move {
                        match fetch_drift(api.as_ref(), project_id, &env).await {
                            Ok(Some(drift)) => {
                                let row = format_row(&drift);
                                let written = writeln!(lock(&out), "{row}");
                                match written {
                                    Ok(()) => RowOutcome::Reported,
                                    Err(err) => {
                                        tracing::error!("get drift {}: writing row: {err}", env.display_name);
                                        RowOutcome::Failed
                                    }
                                }
                            }
                            Ok(None) => {
                                tracing::debug!("no deployment recorded");
                                RowOutcome::Skipped
                            }
                            Err(err) => {
                                tracing::error!("get drift {}: {err:#}", env.display_name);
                                RowOutcome::Failed
                            }
                        }
                    }
                    .instrument(span),
                )
            })
            .collect();

        let mut summary = DriftSummary::default();
        for result in join_all(tasks).await {
            match result {
                Ok(RowOutcome::Reported) => summary.reported += 1,
                Ok(RowOutcome::Skipped) => summary.skipped += 1,
                Ok(RowOutcome::Failed) => summary.failed += 1,
                Err(err) => {
                    tracing::error!("drift task failed: {err}");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// The drift of one service, or `None` if it has never been deployed.
pub async fn fetch_drift(
    api: &dyn GitLabApi,
    project_id: u64,
    env: &ServiceEnvironment,
) -> Result<Option<DeploymentDrift>> {
    let environment = api
        .get_environment(project_id, env.environment_id)
        .await
        .context("get prod environment")?;

    let Some(deployment) = environment.last_deployment else {
        return Ok(None);
    };
    let deployable = deployment
        .deployable
        .ok_or_else(|| anyhow!("deployment {} has no deployable job", deployment.id))?;
    let finished_at = deployable
        .finished_at
        .ok_or_else(|| anyhow!("deployment {} has not finished", deployment.id))?;

    Ok(Some(DeploymentDrift {
        service_name: env.display_name.clone(),
        short_sha: deployable.commit.short_id,
        elapsed: Utc::now().signed_duration_since(finished_at),
    }))
}

pub fn format_row(drift: &DeploymentDrift) -> String {
    format!(
        "{:<18}| {}  | {}",
        drift.service_name,
        drift.short_sha,
        format_elapsed(drift.elapsed, ELAPSED_UNITS)
    )
}

/// Reports the outcome of a whole run: a fatal error is written to `stderr`
/// as one line and turns into a failure status. Per-row failures never reach
/// here, so a run that reported only some rows still exits with 0.
pub fn exit_status(result: Result<()>, stderr: &mut impl Write) -> u8 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            let rendered = format!("{err:#}");
            let line = rendered
                .lines()
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            // Nothing left to report to if stderr itself is gone.
            let _ = writeln!(stderr, "{line}");
            1
        }
    }
}

fn lock<W>(out: &Mutex<W>) -> MutexGuard<'_, W> {
    out.lock().unwrap_or_else(PoisonError::into_inner)
}
