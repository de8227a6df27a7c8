//! Bulk App Installer Library
//!
//! Installs or uninstalls a GitHub App across every organization an operator
//! can reach by driving the host's web UI: authenticate, walk the paginated
//! target listing, then run each target through the install workflow with a
//! compensating uninstall on partial failure.

pub mod artifacts;
pub mod auth;
pub mod config;
pub mod discovery;
pub mod document;
pub mod error;
pub mod install;
pub mod orchestrator;
pub mod schema;
pub mod session;
pub mod transport;
pub mod types;

pub use auth::{establish_session, OtpPrompt, TerminalPrompt};
pub use config::{Credentials, LoginMode, Settings, SettingsArgs};
pub use discovery::TargetCursor;
pub use install::InstallContext;
pub use orchestrator::{Orchestrator, RunAborted, RunState, RunSummary};
pub use schema::UiSchema;
pub use session::Session;
pub use transport::{HttpTransport, Transport, BROWSER_USER_AGENT};
pub use types::{Mode, Outcome, OutcomeRecord, TargetDescriptor};
