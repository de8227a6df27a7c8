//! Install/Uninstall Orchestrator
//!
//! Consumes the target stream one target at a time and drives each through
//! an explicit state machine:
//!
//! ```text
//! FetchPermissions -> { Done(no_permission), Done(parse_error), SubmitInstall }
//! SubmitInstall    -> { FollowRedirect, Compensate }
//! FollowRedirect   -> { Done(installed), Compensate }
//! Compensate       -> { Done(rolled_back), Done(rollback_failed) }
//! ```
//!
//! Step errors are scored as the target's outcome and never end the run.
//! The run ends when discovery is exhausted or the success cap is reached.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::discovery::TargetCursor;
use crate::error::{DiscoveryError, StepError};
use crate::install::{self, InstallContext, UninstallAddress};
use crate::session::Session;
use crate::transport::{Page, Transport};
use crate::types::{
    InstallResult, Mode, Outcome, OutcomeRecord, RollbackResult, TargetDescriptor, UninstallResult,
};

// ============================================================
// Run state
// ============================================================

/// Success count and cap, threaded through the run by value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunState {
    pub targets_succeeded: u32,
    /// `None` means unlimited
    pub max_allowed: Option<u32>,
}

impl RunState {
    pub fn new(max_allowed: Option<u32>) -> Self {
        Self {
            targets_succeeded: 0,
            max_allowed,
        }
    }

    /// State after scoring `outcome`
    pub fn record(self, outcome: &Outcome) -> Self {
        if outcome.is_success() {
            Self {
                targets_succeeded: self.targets_succeeded + 1,
                ..self
            }
        } else {
            self
        }
    }

    pub fn limit_reached(&self) -> bool {
        matches!(self.max_allowed, Some(max) if self.targets_succeeded >= max)
    }
}

/// End-of-run report
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub records: Vec<OutcomeRecord>,
    pub state: RunState,
    /// The run stopped on the success cap with targets possibly left
    pub stopped_at_cap: bool,
}

impl RunSummary {
    /// Number of records with the given outcome label
    pub fn count(&self, label: &str) -> usize {
        self.records.iter().filter(|r| r.outcome.label() == label).count()
    }

    /// Record count per outcome label
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        self.records.iter().fold(BTreeMap::new(), |mut counts, r| {
            *counts.entry(r.outcome.label()).or_insert(0) += 1;
            counts
        })
    }

    /// Targets whose install and rollback both failed
    pub fn needs_cleanup(&self) -> impl Iterator<Item = &OutcomeRecord> {
        self.records.iter().filter(|r| {
            matches!(
                r.outcome,
                Outcome::Install {
                    rollback_result: Some(RollbackResult::Failed),
                    ..
                }
            )
        })
    }
}

/// Discovery failed mid-run; carries the targets processed before it
#[derive(Debug, Error)]
#[error("Run aborted after {} targets: {source}", .summary.records.len())]
pub struct RunAborted {
    pub summary: RunSummary,
    #[source]
    pub source: DiscoveryError,
}

/// Per-target install states
enum InstallStep {
    FetchPermissions,
    SubmitInstall(Page),
    FollowRedirect(Page),
    Compensate,
    Done(InstallResult),
}

// ============================================================
// Orchestrator
// ============================================================

pub struct Orchestrator<'a> {
    ctx: InstallContext<'a>,
    mode: Mode,
    delay: Duration,
}

impl<'a> Orchestrator<'a> {
    pub fn new(ctx: InstallContext<'a>, mode: Mode, delay: Duration) -> Self {
        Self { ctx, mode, delay }
    }

    /// Process every target the cursor yields until it is exhausted or
    /// `state` reaches its cap.
    ///
    /// Discovery errors end the run, returning what was processed so far;
    /// per-target errors do not.
    pub async fn run<T: Transport>(
        &self,
        session: &mut Session<T>,
        cursor: &mut TargetCursor,
        mut state: RunState,
    ) -> Result<RunSummary, RunAborted> {
        let mut records = Vec::new();
        let mut stopped_at_cap = false;

        loop {
            let target = match cursor.next(session).await {
                Ok(Some(target)) => target,
                Ok(None) => break,
                Err(source) => {
                    let summary = RunSummary {
                        records,
                        state,
                        stopped_at_cap,
                    };
                    return Err(RunAborted { summary, source });
                }
            };

            let outcome = self.process(session, &target).await;
            info!(account = %target.name, outcome = outcome.label(), "Target processed");

            state = state.record(&outcome);
            records.push(OutcomeRecord { target, outcome });

            if state.limit_reached() {
                info!(
                    succeeded = state.targets_succeeded,
                    "🛑 Maximum number of successful targets reached, stopping"
                );
                stopped_at_cap = true;
                break;
            }

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        Ok(RunSummary {
            records,
            state,
            stopped_at_cap,
        })
    }

    /// Drive one target to a terminal outcome
    pub async fn process<T: Transport>(&self, session: &mut Session<T>, target: &TargetDescriptor) -> Outcome {
        match self.mode {
            Mode::Install => self.install_target(session, target).await,
            Mode::Uninstall => {
                let address = UninstallAddress::InstallationPath(target.reference.clone());
                let uninstall_result = if self.uninstall(session, &target.name, &address).await {
                    UninstallResult::Succeeded
                } else {
                    UninstallResult::Failed
                };
                Outcome::Uninstall { uninstall_result }
            }
        }
    }

    async fn install_target<T: Transport>(&self, session: &mut Session<T>, target: &TargetDescriptor) -> Outcome {
        let account = target.name.as_str();

        let target_id = match install::target_id(&target.reference) {
            Ok(id) => id,
            Err(e) => {
                warn!(account, error = %e, "Cannot address target, skipping");
                return Outcome::Install {
                    install_result: InstallResult::SkippedParseError,
                    rollback_result: None,
                };
            }
        };

        let mut step = InstallStep::FetchPermissions;
        loop {
            step = match step {
                InstallStep::FetchPermissions => {
                    match install::fetch_permissions(session, &self.ctx, account, &target_id).await {
                        Ok(page) => InstallStep::SubmitInstall(page),
                        Err(StepError::PermissionDenied) => {
                            warn!(account, "Operator can only request the App here, skipping");
                            InstallStep::Done(InstallResult::SkippedNoPermission)
                        }
                        Err(StepError::Parse(e)) => {
                            warn!(account, error = %e, "Unexpected permissions page, skipping");
                            InstallStep::Done(InstallResult::SkippedParseError)
                        }
                        Err(e @ StepError::Transport(_)) => {
                            warn!(account, error = %e, "Failed to load permissions page");
                            InstallStep::Compensate
                        }
                    }
                }
                InstallStep::SubmitInstall(page) => {
                    match install::submit_install(session, &self.ctx, &target_id, page).await {
                        Ok(installed) => InstallStep::FollowRedirect(installed),
                        Err(e) => {
                            warn!(account, error = %e, "Install submission failed");
                            InstallStep::Compensate
                        }
                    }
                }
                InstallStep::FollowRedirect(page) => match install::follow_redirect(session, &self.ctx, page).await {
                    Ok(true) => InstallStep::Done(InstallResult::Succeeded),
                    Ok(false) => {
                        warn!(account, "Install did not report success");
                        InstallStep::Compensate
                    }
                    Err(e) => {
                        warn!(account, error = %e, "Failed to follow install redirect");
                        InstallStep::Compensate
                    }
                },
                InstallStep::Compensate => {
                    let rollback_result = self.compensate(session, account, &target_id).await;
                    return Outcome::Install {
                        install_result: InstallResult::Failed,
                        rollback_result: Some(rollback_result),
                    };
                }
                InstallStep::Done(install_result) => {
                    if install_result == InstallResult::Succeeded {
                        info!(account, "✅ Installed");
                    }
                    return Outcome::Install {
                        install_result,
                        rollback_result: None,
                    };
                }
            };
        }
    }

    /// Uninstall after a failed install so no partial install is left behind
    async fn compensate<T: Transport>(&self, session: &mut Session<T>, account: &str, target_id: &str) -> RollbackResult {
        warn!(account, "Install failed, uninstalling");
        let address = UninstallAddress::TargetId(target_id.to_string());

        if self.uninstall(session, account, &address).await {
            warn!(account, "Install failed and was rolled back; re-run to retry this target");
            RollbackResult::Succeeded
        } else {
            error!(
                account,
                "Install failed and the rollback uninstall failed too; remove the installation manually"
            );
            RollbackResult::Failed
        }
    }

    async fn uninstall<T: Transport>(&self, session: &mut Session<T>, account: &str, address: &UninstallAddress) -> bool {
        match install::uninstall(session, &self.ctx, account, address).await {
            Ok(true) => {
                info!(account, "Uninstall queued");
                true
            }
            Ok(false) => {
                warn!(account, "Host did not confirm the uninstall");
                false
            }
            Err(e) => {
                warn!(account, error = %e, "Uninstall failed");
                false
            }
        }
    }
}
