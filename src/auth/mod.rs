//! Authenticator
//!
//! Turns a fresh [`Session`] into an authenticated one. Two strategies share
//! the second-factor step:
//!
//! - **Direct**: host login form, credentials posted to `/session`
//! - **Federated (SSO)**: redirect chain to an external identity provider,
//!   credentials posted there, redirect back
//!
//! Any failure is an [`AuthError`] and is fatal for the run.

mod direct;
mod federated;
mod second_factor;

use tracing::{error, info};

use crate::config::{Credentials, LoginMode};
use crate::error::AuthError;
use crate::schema::UiSchema;
use crate::session::Session;
use crate::transport::Transport;

pub use second_factor::{challenge_present, OtpPrompt, TerminalPrompt};

/// Authenticate `session` with the selected strategy
pub async fn establish_session<T: Transport>(
    session: &mut Session<T>,
    credentials: &Credentials,
    mode: LoginMode,
    schema: &UiSchema,
    prompt: &dyn OtpPrompt,
) -> Result<(), AuthError> {
    info!(user = %credentials.username, %mode, "Logging in");

    let result = match mode {
        LoginMode::Direct => direct::login(session, credentials, schema, prompt).await,
        LoginMode::Sso => federated::login(session, credentials, schema, prompt).await,
    };

    match &result {
        Ok(()) => info!(user = %credentials.username, "✅ Login succeeded"),
        Err(e) => error!(user = %credentials.username, error = %e, "Login failed"),
    }

    result
}
