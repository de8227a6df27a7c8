//! Direct credential login

use tracing::debug;

use super::second_factor::{self, OtpPrompt};
use crate::config::Credentials;
use crate::document::{element_text, first_within, require, Document};
use crate::error::{AuthError, ParseError};
use crate::schema::{LoginSchema, UiSchema};
use crate::session::Session;
use crate::transport::Transport;

const FOLDER: &str = "login-data";

/// Hidden values of the login form
#[derive(Debug, PartialEq, Eq)]
struct LoginTokens {
    authenticity_token: String,
    timestamp: String,
    timestamp_secret: String,
}

fn login_tokens(body: &str, schema: &LoginSchema) -> Result<LoginTokens, ParseError> {
    let doc = Document::parse(body);
    let form = require(
        doc.form_with_action(schema.step, schema.form_action)?,
        schema.step,
        "login form",
    )?;

    Ok(LoginTokens {
        authenticity_token: form.require_input(schema.token_field)?,
        timestamp: form.require_input(schema.timestamp_field)?,
        timestamp_secret: form.require_input(schema.timestamp_secret_field)?,
    })
}

/// The host answered with the sign-in page again
fn still_on_sign_in(body: &str, schema: &LoginSchema) -> Result<bool, ParseError> {
    let doc = Document::parse(body);
    let main = require(
        doc.first(schema.step, schema.main_container)?,
        schema.step,
        "main container",
    )?;

    Ok(first_within(main, schema.step, schema.header)?
        .map(|h| element_text(h).to_lowercase().contains(schema.failure_marker))
        .unwrap_or(false))
}

pub(super) async fn login<T: Transport>(
    session: &mut Session<T>,
    credentials: &Credentials,
    schema: &UiSchema,
    prompt: &dyn OtpPrompt,
) -> Result<(), AuthError> {
    let login = &schema.login;

    let start = session.get(FOLDER, "login-start", login.path).await?;
    let tokens = login_tokens(&start.body, login)?;
    debug!("Extracted login form tokens");

    let mut form: Vec<(&'static str, String)> = login
        .browser_fields
        .iter()
        .map(|(k, v)| (*k, v.to_string()))
        .collect();
    form.extend([
        (login.token_field, tokens.authenticity_token),
        (login.username_field, credentials.username.clone()),
        (login.password_field, credentials.password().to_string()),
        (login.timestamp_field, tokens.timestamp),
        (login.timestamp_secret_field, tokens.timestamp_secret),
    ]);

    let page = session
        .post_form(FOLDER, "login-complete", login.form_action, &form, &[])
        .await?;

    if still_on_sign_in(&page.body, login)? {
        return Err(AuthError::Rejected(credentials.username.clone()));
    }

    second_factor::complete(session, &page, credentials, &schema.second_factor, prompt, FOLDER).await
}
