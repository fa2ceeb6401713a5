use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use notification_services::Notifier;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::availability::AvailabilityChecker;
use crate::session::{BrowserSession, SessionError};
use crate::state::StateTracker;
use crate::watch_types::{AvailabilityVerdict, TargetKey, TransitionEvent, WatchTarget};

/// Lifecycle of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Session acquired, not yet authenticated
    Init,
    /// Authenticated, registration page not yet opened
    LoggedIn,
    /// Running poll cycles
    Polling,
    /// Handling a failed cycle
    Recovering,
    /// Stopped; the session has been or is being released
    Terminated,
}

/// Which recovery step brought the session back, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// A page refresh was enough
    Refreshed,
    /// A fresh login and navigation were needed
    Relogged,
    /// Nothing worked; the monitor waited one check interval
    Failed,
}

/// Summary of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Targets checked
    pub checked: usize,
    /// Targets whose row could not be evaluated
    pub errors: usize,
    /// Targets that opened up during this cycle
    pub transitions: Vec<TargetKey>,
    /// Auto-registration attempts made
    pub registrations_attempted: usize,
}

/// Fatal monitor failures.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Login or initial navigation failed
    #[error("Setup failed during {stage}: {source}")]
    Setup {
        /// Step that failed
        stage: &'static str,
        /// Underlying session error
        #[source]
        source: SessionError,
    },

    /// A single-shot cycle failed
    #[error("Poll cycle failed: {0}")]
    Cycle(#[source] SessionError),
}

/// Timing and navigation settings for the monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Pause between poll cycles (default: 60 seconds)
    pub check_interval: Duration,

    /// Wait after each page refresh before reading rows (default: 3 seconds)
    pub refresh_settle: Duration,

    /// Wait after a recovery refresh (default: 5 seconds)
    pub recovery_settle: Duration,

    /// Course registration page
    pub registration_url: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            refresh_settle: Duration::from_secs(3),
            recovery_settle: Duration::from_secs(5),
            registration_url: "https://flexstudent.nu.edu.pk/Student/CourseRegistrationBS"
                .to_string(),
        }
    }
}

/// Polls the registration page and announces seats as they open.
pub struct MonitorLoop<S: BrowserSession> {
    session: S,
    targets: Vec<WatchTarget>,
    checker: AvailabilityChecker,
    tracker: StateTracker,
    notifier: Arc<dyn Notifier>,
    config: MonitorConfig,
    state: MonitorState,
    released: bool,
}

impl<S: BrowserSession> MonitorLoop<S> {
    /// Create a monitor over an acquired session.
    pub fn new(
        session: S,
        targets: Vec<WatchTarget>,
        notifier: Arc<dyn Notifier>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            session,
            targets,
            checker: AvailabilityChecker::new(),
            tracker: StateTracker::new(),
            notifier,
            config,
            state: MonitorState::Init,
            released: false,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Availability history gathered so far.
    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    /// The underlying session.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Run until `shutdown` resolves. The session is released on every exit
    /// path.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), MonitorError>
    where
        F: Future<Output = ()>,
    {
        let outcome = tokio::select! {
            result = self.monitor() => result,
            _ = shutdown => {
                info!("Monitoring stopped by user");
                Ok(())
            }
        };

        self.release().await;
        outcome
    }

    /// Log in, run exactly one poll cycle and release the session.
    pub async fn run_once(&mut self) -> Result<CycleReport, MonitorError> {
        let outcome = match self.start().await {
            Ok(()) => self.poll_cycle().await.map_err(MonitorError::Cycle),
            Err(e) => Err(e),
        };

        self.release().await;
        outcome
    }

    /// Authenticate and open the registration page. Failures are fatal.
    pub async fn start(&mut self) -> Result<(), MonitorError> {
        info!("Starting course availability monitor...");
        self.state = MonitorState::Init;

        if let Err(e) = self.session.login().await {
            error!("Failed to login. Exiting. ({})", e);
            self.state = MonitorState::Terminated;
            return Err(MonitorError::Setup {
                stage: "login",
                source: e,
            });
        }
        self.state = MonitorState::LoggedIn;

        if let Err(e) = self.session.navigate(&self.config.registration_url).await {
            error!("Failed to navigate to registration page. Exiting. ({})", e);
            self.state = MonitorState::Terminated;
            return Err(MonitorError::Setup {
                stage: "navigation",
                source: e,
            });
        }

        info!("Navigated to course registration page");
        self.state = MonitorState::Polling;
        Ok(())
    }

    /// Check every target once, in declaration order.
    ///
    /// A missing row is an error verdict, not a failure; session errors abort
    /// the cycle and are left to [`MonitorLoop::recover`].
    pub async fn poll_cycle(&mut self) -> Result<CycleReport, SessionError> {
        let mut report = CycleReport::default();
        let targets = self.targets.clone();

        for target in &targets {
            self.session.refresh().await?;
            sleep(self.config.refresh_settle).await;

            let row = self.session.find_course_row(&target.course_code).await?;
            let verdict = self.checker.check(target, row.as_ref());
            report.checked += 1;

            if verdict.is_error() {
                warn!("Course {} not found on page", target.course_code);
                report.errors += 1;
            }

            log_status(target, &verdict);

            let key = target.key();
            if let Some(event) = self.tracker.update(&key, verdict) {
                if self.announce(target, &event).await {
                    report.registrations_attempted += 1;
                }
                report.transitions.push(key);
            }
        }

        Ok(report)
    }

    /// Escalating recovery after a failed cycle: refresh, then re-login, then
    /// wait a full check interval. Always returns to polling.
    pub async fn recover(&mut self, error: &SessionError) -> RecoveryOutcome {
        self.state = MonitorState::Recovering;

        let outcome = if !error.is_connection_lost() {
            match self.session.refresh().await {
                Ok(()) => {
                    sleep(self.config.recovery_settle).await;
                    debug!("Recovered with a page refresh");
                    Some(RecoveryOutcome::Refreshed)
                }
                Err(e) => {
                    warn!("Refresh during recovery failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let outcome = match outcome {
            Some(outcome) => outcome,
            None => {
                warn!("Attempting to recover by re-logging in...");
                match self.relogin().await {
                    Ok(()) => {
                        info!("Recovery successful");
                        RecoveryOutcome::Relogged
                    }
                    Err(e) => {
                        error!("Recovery failed ({}), waiting before retry...", e);
                        sleep(self.config.check_interval).await;
                        RecoveryOutcome::Failed
                    }
                }
            }
        };

        self.state = MonitorState::Polling;
        outcome
    }

    /// Release the session. Safe to call more than once.
    pub async fn release(&mut self) {
        self.state = MonitorState::Terminated;
        if self.released {
            return;
        }

        self.session.close().await;
        self.released = true;
        info!("Browser closed");
    }

    async fn monitor(&mut self) -> Result<(), MonitorError> {
        self.start().await?;
        info!("Monitoring {} course target(s)", self.targets.len());

        loop {
            match self.poll_cycle().await {
                Ok(report) => {
                    debug!(
                        checked = report.checked,
                        errors = report.errors,
                        transitions = report.transitions.len(),
                        "poll cycle complete"
                    );
                    info!(
                        "Waiting {} seconds before next check...",
                        self.config.check_interval.as_secs()
                    );
                    sleep(self.config.check_interval).await;
                }
                Err(e) => {
                    error!("Error in monitoring loop: {}", e);
                    self.recover(&e).await;
                }
            }
        }
    }

    async fn relogin(&mut self) -> Result<(), SessionError> {
        self.session.login().await?;
        self.session.navigate(&self.config.registration_url).await
    }

    /// Notify about a transition and trigger auto-registration when enabled.
    /// Returns whether a registration attempt was made.
    async fn announce(&mut self, target: &WatchTarget, event: &TransitionEvent) -> bool {
        let message = target.availability_message();
        info!("{}", message);

        let report = self
            .notifier
            .notify(&message, &event.verdict.raw_detail)
            .await;
        if !report.failed.is_empty() {
            warn!(
                "Notification failed on channel(s): {}",
                report.failed.join(", ")
            );
        }

        if !target.auto_register {
            return false;
        }

        info!(
            "Attempting auto-registration for {} {}",
            target.course_code,
            target.section.as_deref().unwrap_or("")
        );
        match self
            .session
            .attempt_registration(&target.course_code, target.section.as_deref())
            .await
        {
            Ok(true) => info!("Registration attempted for {}", target.course_code),
            Ok(false) => warn!(
                "Registration for {} could not be confirmed",
                target.course_code
            ),
            Err(e) => error!("Registration attempt failed: {}", e),
        }
        true
    }
}

fn log_status(target: &WatchTarget, verdict: &AvailabilityVerdict) {
    let status = match verdict.error {
        Some(ref error) => format!("UNKNOWN ({})", error),
        None if verdict.available => "AVAILABLE".to_string(),
        None => "FULL".to_string(),
    };

    let mut line = format!("{} ({}): {}", target.display_name(), target.course_code, status);
    if let Some(ref section) = target.section {
        line.push_str(&format!(" [Section {}]", section));
    }
    info!("{}", line);
}
