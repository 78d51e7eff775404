use clap::builder::NonEmptyStringValueParser;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use time_since_deploy::{
    config::Config,
    runner::{exit_status, DriftChecker},
    telemetry,
};

#[derive(Parser)]
#[command(name = "time-since-deploy")]
#[command(about = "Show how long ago each prod/* environment of a GitLab project was deployed")]
struct Cli {
    /// Selects the project to be used
    #[arg(short, long, value_parser = NonEmptyStringValueParser::new())]
    project: String,

    /// File to write an execution trace to
    #[arg(short, long, value_name = "FILE")]
    trace: Option<PathBuf>,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    telemetry::init(cli.trace.as_deref())?;

    let config = Config::from_env(cli.project)?;
    tracing::debug!(?config, "loaded configuration");

    let checker = DriftChecker::from_config(config)?;
    let summary = checker.run(Arc::new(Mutex::new(std::io::stdout()))).await?;
    tracing::info!(
        reported = summary.reported,
        skipped = summary.skipped,
        failed = summary.failed,
        "drift report finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = tokio::select! {
        result = run(cli) => result,
        Ok(()) = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("interrupted")),
    };

    ExitCode::from(exit_status(result, &mut std::io::stderr()))
}
