use anyhow::{Context, Result};
use std::fs::File;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_FILTER: &str = "warn";
const TRACE_FILTER: &str = "debug";

/// Installs the global subscriber. Warnings and errors go to stderr
/// (overridable with `RUST_LOG`, coloured only on a terminal); with
/// `trace_file` set, spans with their timings and debug events are also
/// written to that file.
pub fn init(trace_file: Option<&Path>) -> Result<()> {
    let ansi = std::io::stderr().is_terminal();
    subscriber(std::io::stderr, ansi, trace_file)?
        .try_init()
        .context("couldn't start trace")?;
    Ok(())
}

/// Builds the subscriber `init` installs, logging to `log_writer`.
pub fn subscriber<W>(
    log_writer: W,
    ansi: bool,
    trace_file: Option<&Path>,
) -> Result<impl Subscriber + Send + Sync + 'static>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let log_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_writer)
        .with_ansi(ansi)
        .with_target(false)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        );

    let trace_layer = trace_file
        .map(|path| -> Result<_> {
            let file = File::create(path)
                .with_context(|| format!("couldn't open trace file {}", path.display()))?;
            Ok(tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .with_thread_ids(true)
                .with_filter(EnvFilter::new(TRACE_FILTER)))
        })
        .transpose()?;

    Ok(tracing_subscriber::registry()
        .with(log_layer)
        .with(trace_layer))
}
