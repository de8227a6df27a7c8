//! Bulk App Installer
//!
//! Installs (or uninstalls) a GitHub App on every organization the operator
//! can reach, driving the web UI with the operator's own credentials.
//!
//! # Usage
//! ```bash
//! # Install on every organization that does not have the App yet
//! BLU_GITHUB_APP_NAME=checks-app BLU_USERNAME=octo BLU_PASSWORD=... bulk-app-installer
//!
//! # Uninstall everywhere, keeping every fetched page under debug-data/
//! BLU_DEBUG=1 bulk-app-installer --uninstall
//!
//! # Stop after 10 successful installs, login through SSO
//! bulk-app-installer --max-organizations 10 --login-mode sso
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use bulk_app_installer::artifacts::{ArtifactSink, DirectorySink, NoopSink};
use bulk_app_installer::{
    establish_session, HttpTransport, InstallContext, Mode, Orchestrator, RunState, RunSummary, Session,
    SettingsArgs, TargetCursor, TerminalPrompt, UiSchema, BROWSER_USER_AGENT,
};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "bulk-app-installer")]
#[command(about = "Bulk install or uninstall a GitHub App across organizations", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Uninstall the App instead of installing it
    #[arg(short, long)]
    uninstall: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bulk_app_installer={},warn", level)));

    let builder = FmtSubscriber::builder().with_env_filter(filter).with_target(false);
    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Per-target results, cleanup warnings and outcome counts
fn report(summary: &RunSummary, cursor: &TargetCursor) {
    for record in &summary.records {
        info!(account = %record.target.name, outcome = record.outcome.label(), "Result");
    }
    for record in summary.needs_cleanup() {
        warn!(
            account = %record.target.name,
            "⚠️ Install and rollback both failed, check this target manually"
        );
    }

    info!(
        processed = summary.records.len(),
        succeeded = summary.state.targets_succeeded,
        outcomes = ?summary.counts(),
        already_done = cursor.skipped(),
        pages = cursor.pages_fetched(),
        stopped_at_cap = summary.stopped_at_cap,
        "✅ Run complete"
    );
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real environment variables win
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    init_logging(cli.verbose || cli.settings.debug, cli.json_logs)?;

    let settings = cli.settings.into_settings().context("Invalid configuration")?;
    let mode = if cli.uninstall { Mode::Uninstall } else { Mode::Install };
    let schema = UiSchema::current();

    info!(
        started = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        host = %settings.base_url,
        app = %settings.app_name,
        %mode,
        schema = schema.version,
        "🚀 Bulk App Installer starting..."
    );
    match settings.max_successes {
        Some(max) => info!(max, "Stopping after {} successful targets", max),
        None => info!("No limit on successful targets"),
    }

    // Session
    let transport = HttpTransport::new(BROWSER_USER_AGENT, settings.timeout)?;
    let sink: Box<dyn ArtifactSink> = match &settings.debug_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "📁 Saving fetched pages");
            Box::new(DirectorySink::new(dir.clone()))
        }
        None => Box::new(NoopSink),
    };
    let mut session = Session::new(transport, settings.base_url.clone(), sink);

    // Login; failure ends the run
    info!("🔐 Authenticating as {}", settings.credentials.username);
    establish_session(
        &mut session,
        &settings.credentials,
        settings.login_mode,
        &schema,
        &TerminalPrompt,
    )
    .await
    .context("Login failed, not continuing with an unauthenticated session")?;

    // Discovery + per-target workflow
    let ctx = InstallContext {
        app_name: &settings.app_name,
        version_id: &settings.version_id,
        schema: &schema,
    };
    let mut cursor = TargetCursor::new(&settings.app_name, mode, &schema);
    let orchestrator = Orchestrator::new(ctx, mode, settings.delay);

    match orchestrator
        .run(&mut session, &mut cursor, RunState::new(settings.max_successes))
        .await
    {
        Ok(summary) => {
            report(&summary, &cursor);
            Ok(())
        }
        Err(aborted) => {
            // Targets handled before the failure still need reporting
            report(&aborted.summary, &cursor);
            Err(anyhow::Error::new(aborted.source).context("Target discovery failed"))
        }
    }
}
