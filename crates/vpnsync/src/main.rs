mod cli;
mod platform;
mod settings;
mod wiring;

use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use vpnsync_core::{CycleReport, Reconciler};

use cli::Cli;
use settings::Settings;

/// Maximum time to wait for the running cycle after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(20);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_new(cli.log_filter())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Hold the non-blocking guards for the lifetime of main so logs flush on exit.
    let _log_guards = init_logging(env_filter, cli.log_file.as_deref())?;

    let settings = match Settings::load(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async_main(cli, settings))
}

async fn async_main(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    startup_diagnostics(&cli, &settings);

    let reconciler = wiring::build_reconciler(&settings, &cli.environment).await?;

    if cli.once {
        return run_once(reconciler, cli.json).await;
    }

    let cancel = CancellationToken::new();
    let task = tokio::spawn(vpnsync_core::run_loop(
        reconciler,
        settings.request_interval(),
        cancel.clone(),
    ));

    if let Err(e) = platform::notify_ready() {
        tracing::warn!(error = %e, "systemd notification failed");
    }
    tracing::info!("Ready.");

    let signal = platform::shutdown_signal().await;
    tracing::info!("Shutting down...");
    cancel.cancel();

    let stopped = loop_outcome(tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await);

    signal?;
    stopped
}

/// Log how the reconciliation loop ended. A loop that panicked or was
/// aborted fails the process; one still busy at the deadline does not.
fn loop_outcome(
    outcome: Result<Result<(), tokio::task::JoinError>, tokio::time::error::Elapsed>,
) -> anyhow::Result<()> {
    match outcome {
        Ok(Ok(())) => {
            tracing::debug!("Reconciliation loop stopped");
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, panicked = e.is_panic(), "Reconciliation loop failed");
            Err(anyhow::anyhow!("reconciliation loop failed: {e}"))
        }
        Err(_) => {
            tracing::warn!(
                "Cycle still running after {:?}, forcing exit",
                SHUTDOWN_TIMEOUT
            );
            Ok(())
        }
    }
}

async fn run_once(mut reconciler: Reconciler, json: bool) -> anyhow::Result<()> {
    let report = reconciler.run_cycle().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.is_clean() {
        anyhow::bail!("{} reconciliation step(s) failed", report.failures.len());
    }
    Ok(())
}

fn print_report(report: &CycleReport) {
    if report.plan.is_empty() {
        println!("Certificates match group membership.");
        return;
    }
    let line = |label: &str, names: &[String]| {
        if !names.is_empty() {
            println!("{label:<10} {}", names.join(", "));
        }
    };
    line("created", &report.created);
    line("delivered", &report.delivered);
    line("revoked", &report.revoked);
    line("dry-run", &report.dry_run);
    for failure in &report.failures {
        println!(
            "{:<10} {} ({}): {}",
            "failed", failure.name, failure.operation, failure.error
        );
    }
}

// ── Startup diagnostics ─────────────────────────────────────────────

fn startup_diagnostics(cli: &Cli, settings: &Settings) {
    tracing::info!("vpnsync v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = %cli.environment,
        config = %cli.config.display(),
        "Settings loaded"
    );

    let layout = settings.layout();
    tracing::info!("easy-rsa: {}", layout.easy_rsa_dir.display());
    if !layout.easyrsa_program().exists() {
        tracing::warn!(
            path = %layout.easyrsa_program().display(),
            "easyrsa script not found"
        );
    }
    if !layout.index_path().exists() {
        tracing::warn!(path = %layout.index_path().display(), "Certificate index not found");
    }

    tracing::info!(
        group = settings.aws.vpn_group.as_deref().unwrap_or_default(),
        region = %settings.aws.region,
        interval_secs = settings.sync.request_interval,
        "Membership source"
    );

    if settings.sync.dry_run {
        tracing::warn!("Dry-run mode: certificates will not be issued or revoked");
    }
    if !settings.sync.s3_upload {
        tracing::info!("Profile upload: disabled");
    }
    if !settings.sync.send_mail {
        tracing::info!("Mail notification: disabled");
    }
    match &settings.sync.audit_log {
        Some(path) => tracing::info!("Audit log: {}", path.display()),
        None => tracing::debug!("Audit log: disabled"),
    }
}

// ── Logging setup ───────────────────────────────────────────────────

/// Initialize tracing with stderr + optional file output.
/// Returns guards that must be held for the lifetime of the program
/// to ensure the non-blocking writers flush on shutdown.
fn init_logging(
    env_filter: tracing_subscriber::EnvFilter,
    log_file: Option<&std::path::Path>,
) -> anyhow::Result<Vec<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::prelude::*;

    let (nb_stderr, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(nb_stderr);

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        return Ok(vec![stderr_guard]);
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let (nb_file, file_guard) = tracing_appender::non_blocking(file);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(nb_file);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(vec![stderr_guard, file_guard])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finished_loop_is_clean() {
        let task = tokio::spawn(async {});
        assert!(loop_outcome(tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await).is_ok());
    }

    #[tokio::test]
    async fn panicked_loop_is_an_error() {
        let task = tokio::spawn(async { panic!("cycle blew up") });
        let err = loop_outcome(tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await).unwrap_err();
        assert!(err.to_string().contains("reconciliation loop failed"));
    }

    #[tokio::test]
    async fn busy_loop_at_deadline_is_not_an_error() {
        let task = tokio::spawn(std::future::pending::<()>());
        let outcome = tokio::time::timeout(Duration::from_millis(10), task).await;
        assert!(outcome.is_err());
        assert!(loop_outcome(outcome).is_ok());
    }
}
