//! Federated (SSO) login through an external identity provider

use tracing::{debug, info};

use super::second_factor::{self, OtpPrompt};
use crate::config::Credentials;
use crate::document::{require, Document};
use crate::error::{AuthError, ParseError};
use crate::schema::{FederatedSchema, UiSchema};
use crate::session::Session;
use crate::transport::Transport;

const FOLDER: &str = "sso-login-data";

/// Legacy desktop browser headers the identity provider accepts
const PROVIDER_HEADERS: [(&str, &str); 6] = [
    (
        "User-Agent",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.11 (KHTML, like Gecko) Chrome/23.0.1271.64 Safari/537.11",
    ),
    ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    ("Accept-Charset", "ISO-8859-1,utf-8;q=0.7,*;q=0.3"),
    ("Accept-Encoding", "none"),
    ("Accept-Language", "en-US,en;q=0.8"),
    ("Connection", "keep-alive"),
];

/// Provider URL from the meta refresh on the login-initiation page
fn provider_url(body: &str, schema: &FederatedSchema) -> Result<String, ParseError> {
    let doc = Document::parse(body);
    let content = require(
        doc.all(schema.step, schema.redirect_meta)?
            .into_iter()
            .filter_map(|meta| meta.value().attr("content"))
            .find(|content| content.contains(schema.provider_marker)),
        schema.step,
        "identity provider redirect",
    )?;

    let url = match content.to_lowercase().find(schema.refresh_prefix) {
        Some(idx) => content
            .get(idx + schema.refresh_prefix.len()..)
            .unwrap_or(content),
        None => content,
    };
    Ok(url.trim().to_string())
}

fn rejected(body: &str, schema: &FederatedSchema) -> bool {
    Document::parse(body).text().contains(schema.failure_marker)
}

/// Path that triggers the external redirect and returns to the host login
fn initiation_path(session_base: &reqwest::Url) -> String {
    let return_to = format!("{}login", session_base);
    format!(
        "/login?force_external=true&return_to={}",
        urlencoding::encode(&return_to)
    )
}

pub(super) async fn login<T: Transport>(
    session: &mut Session<T>,
    credentials: &Credentials,
    schema: &UiSchema,
    prompt: &dyn OtpPrompt,
) -> Result<(), AuthError> {
    let federated = &schema.federated;

    let initiation = initiation_path(session.base());
    let pre_login = session.get(FOLDER, "pre-login", &initiation).await?;
    let redirect = provider_url(&pre_login.body, federated)?;
    debug!(%redirect, "Following identity provider redirect");

    let provider_page = session.get(FOLDER, "login-start", &redirect).await?;
    let submit_url = provider_page.url.to_string();
    info!(provider = %submit_url, "Submitting credentials to identity provider");

    let mut form: Vec<(&'static str, String)> = vec![
        (federated.username_field, credentials.username.clone()),
        (federated.password_field, credentials.password().to_string()),
    ];
    form.extend(federated.browser_fields.iter().map(|(k, v)| (*k, v.to_string())));

    let headers: Vec<(&'static str, String)> = PROVIDER_HEADERS
        .iter()
        .map(|(k, v)| (*k, v.to_string()))
        .collect();

    let page = session
        .post_form(FOLDER, "login-complete", &submit_url, &form, &headers)
        .await?;

    if rejected(&page.body, federated) {
        return Err(AuthError::Rejected(credentials.username.clone()));
    }

    second_factor::complete(session, &page, credentials, &schema.second_factor, prompt, FOLDER).await
}
