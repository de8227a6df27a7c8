//! Bulk Install Types
//!
//! Target descriptors produced by discovery and per-target outcome records
//! produced by the orchestrator. Nothing here is persisted across runs.

use serde::Serialize;

/// Run mode selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Install,
    Uninstall,
}

impl Mode {
    /// Target state the run drives toward
    pub fn desired_state(&self) -> TargetState {
        match self {
            Mode::Install => TargetState::Installed,
            Mode::Uninstall => TargetState::NotInstalled,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Install => write!(f, "install"),
            Mode::Uninstall => write!(f, "uninstall"),
        }
    }
}

/// Whether the App is currently installed on a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    NotInstalled,
    Installed,
}

/// An organization or user account listed by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetDescriptor {
    /// Login of the organization/user, without the leading `@`
    pub name: String,
    /// Row link: the permissions page (with `target_id`) for uninstalled
    /// targets, the installation settings path for installed ones
    pub reference: String,
    pub current_state: TargetState,
}

/// Result of the install attempt on one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallResult {
    Succeeded,
    Failed,
    SkippedNoPermission,
    SkippedParseError,
}

/// Result of the compensating uninstall after a failed install
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackResult {
    Succeeded,
    Failed,
}

/// Result of a direct uninstall in uninstall mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UninstallResult {
    Succeeded,
    Failed,
}

/// What happened to one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Outcome {
    Install {
        install_result: InstallResult,
        rollback_result: Option<RollbackResult>,
    },
    Uninstall {
        uninstall_result: UninstallResult,
    },
}

impl Outcome {
    /// Counts toward the run's success cap
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Outcome::Install {
                install_result: InstallResult::Succeeded,
                ..
            } | Outcome::Uninstall {
                uninstall_result: UninstallResult::Succeeded
            }
        )
    }

    /// Short label for logs and summaries
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Install {
                install_result,
                rollback_result,
            } => match (install_result, rollback_result) {
                (InstallResult::Succeeded, _) => "installed",
                (InstallResult::SkippedNoPermission, _) => "no_permission",
                (InstallResult::SkippedParseError, _) => "parse_error",
                (InstallResult::Failed, Some(RollbackResult::Succeeded)) => "rolled_back",
                (InstallResult::Failed, Some(RollbackResult::Failed)) => "rollback_failed",
                (InstallResult::Failed, None) => "failed",
            },
            Outcome::Uninstall { uninstall_result } => match uninstall_result {
                UninstallResult::Succeeded => "uninstalled",
                UninstallResult::Failed => "uninstall_failed",
            },
        }
    }
}

/// Per-target record, used for end-of-run reporting only
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    pub target: TargetDescriptor,
    pub outcome: Outcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        let rolled_back = Outcome::Install {
            install_result: InstallResult::Failed,
            rollback_result: Some(RollbackResult::Succeeded),
        };
        assert_eq!(rolled_back.label(), "rolled_back");
        assert!(!rolled_back.is_success());

        let installed = Outcome::Install {
            install_result: InstallResult::Succeeded,
            rollback_result: None,
        };
        assert_eq!(installed.label(), "installed");
        assert!(installed.is_success());

        let uninstalled = Outcome::Uninstall {
            uninstall_result: UninstallResult::Succeeded,
        };
        assert!(uninstalled.is_success());
    }

    #[test]
    fn test_outcome_serializes_with_action_tag() {
        let outcome = Outcome::Install {
            install_result: InstallResult::SkippedNoPermission,
            rollback_result: None,
        };
        let json = serde_json::to_value(outcome).unwrap();
        assert_eq!(json["action"], "install");
        assert_eq!(json["install_result"], "skipped_no_permission");
    }

    #[test]
    fn test_mode_desired_state() {
        assert_eq!(Mode::Install.desired_state(), TargetState::Installed);
        assert_eq!(Mode::Uninstall.desired_state(), TargetState::NotInstalled);
    }
}
