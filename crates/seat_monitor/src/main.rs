//! Main entry point for the course seat monitor.
//! Logs into the registration portal, watches the configured courses and
//! sends notifications when seats open up.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use course_watch::MonitorLoop;
use flex_portal::PortalSession;
use notification_services::NotificationService;

mod config;
mod logging;

use config::{ConfigError, Settings};

/// Watch course registration for open seats.
#[derive(Debug, Parser)]
#[command(name = "seat-monitor", version)]
struct Args {
    /// JSON settings file; environment variables are used when it is missing
    #[arg(long, env = "MONITOR_CONFIG", default_value = "monitor_config.json")]
    config: PathBuf,

    /// File that log lines are appended to, alongside stdout
    #[arg(long, default_value = "course_monitor.log")]
    log_file: PathBuf,

    /// Log in, check every course once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if let Err(e) = logging::init(&args.log_file) {
        logging::init_stdout();
        log::warn!("Could not open log file {}: {}", args.log_file.display(), e);
    }

    log::info!("🚀 Starting course seat monitor...");

    let (settings, source) = match Settings::load(&args.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            log::error!("❌ {}", e);
            if matches!(e, ConfigError::Missing(_)) {
                log::error!(
                    "💡 Create {} with your credentials, or set REGISTRATION_USERNAME and REGISTRATION_PASSWORD",
                    args.config.display()
                );
            }
            std::process::exit(1);
        }
    };
    log::info!("📄 Configuration loaded from {}", source);

    let notifier = Arc::new(NotificationService::from_config(&settings.notifications));

    let session = match PortalSession::launch(settings.portal_config()).await {
        Ok(session) => session,
        Err(e) => {
            log::error!("❌ Failed to initialize Chrome: {}", e);
            std::process::exit(1);
        }
    };

    let mut monitor = MonitorLoop::new(
        session,
        settings.courses.clone(),
        notifier,
        settings.monitor_config(),
    );

    if args.once {
        let report = monitor.run_once().await.context("Single check failed")?;
        log::info!(
            "✅ Checked {} course(s): {} opening(s), {} error(s)",
            report.checked,
            report.transitions.len(),
            report.errors
        );
    } else {
        monitor
            .run(shutdown_signal())
            .await
            .context("Monitor could not start")?;
    }

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
