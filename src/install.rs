//! Install / Uninstall Workflow Steps
//!
//! Each step fetches or submits exactly one page and returns an explicit
//! [`StepError`] on failure. Form tokens are read from the page the step was
//! handed and that page is consumed by the submission, so a token set can
//! never be submitted twice.

use regex::Regex;
use reqwest::Url;
use tracing::{debug, info};

use crate::document::{element_text, require, Document};
use crate::error::{ParseError, StepError, TransportError};
use crate::schema::{InstallSchema, UiSchema, UninstallSchema};
use crate::session::Session;
use crate::transport::{Page, Transport, BROWSER_USER_AGENT};

const INSTALL_FOLDER: &str = "install-data";
const UNINSTALL_FOLDER: &str = "uninstall-data";

/// Everything the steps need besides the session
#[derive(Debug, Clone, Copy)]
pub struct InstallContext<'a> {
    pub app_name: &'a str,
    /// Used when the install form carries no `version_id`
    pub version_id: &'a str,
    pub schema: &'a UiSchema,
}

/// Authority the operator holds on a target, read from the install button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Can install directly
    Full,
    /// Can only request the App from an owner
    RequestOnly,
}

/// Hidden values of the install form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTokens {
    pub authenticity_token: String,
    pub target_type: String,
    pub integration_fingerprint: String,
    pub version_id: Option<String>,
}

/// How an uninstall locates the installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallAddress {
    /// Start from the permissions page of this target id
    TargetId(String),
    /// Start from an installation settings path returned by discovery
    InstallationPath(String),
}

// ============================================================
// Page extraction
// ============================================================

/// `target_id` query parameter of a permissions URL or path
pub fn target_id(reference: &str) -> Result<String, ParseError> {
    let base = Url::parse("https://host.invalid/").map_err(|_| ParseError::Invalid {
        step: "install.target",
        marker: "reference",
        value: reference.to_string(),
    })?;
    let url = base.join(reference).map_err(|_| ParseError::Invalid {
        step: "install.target",
        marker: "reference",
        value: reference.to_string(),
    })?;

    let id = url
        .query_pairs()
        .find(|(k, _)| k == "target_id")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty());

    require(id, "install.target", "target_id")
}

/// Classify the primary action button of the permissions page
pub fn classify_permission(body: &str, schema: &InstallSchema) -> Result<Permission, ParseError> {
    let doc = Document::parse(body);
    let step = schema.permissions_step;
    let button = require(doc.first(step, schema.button)?, step, "install button")?;
    let label = element_text(button).to_lowercase();

    if label.contains(schema.install_label) {
        Ok(Permission::Full)
    } else if label.contains(schema.request_label) {
        Ok(Permission::RequestOnly)
    } else {
        Err(ParseError::Unrecognized {
            step,
            marker: "install button label",
            value: label,
        })
    }
}

/// Install form tokens of a permissions page
pub fn install_tokens(body: &str, app_name: &str, schema: &InstallSchema) -> Result<InstallTokens, ParseError> {
    let doc = Document::parse(body);
    let step = schema.submit_step;
    let form = require(
        doc.form_with_action(step, &UiSchema::installations_path(app_name))?,
        step,
        "install form",
    )?;

    Ok(InstallTokens {
        authenticity_token: form.require_input(schema.token_field)?,
        target_type: form.require_input(schema.target_type_field)?,
        integration_fingerprint: form.require_input(schema.fingerprint_field)?,
        version_id: form.input_value(schema.version_field).filter(|v| !v.is_empty()),
    })
}

/// Destination of the post-install redirect anchor, if any
pub fn redirect_target(body: &str, schema: &InstallSchema) -> Result<Option<String>, ParseError> {
    let doc = Document::parse(body);
    Ok(doc
        .first(schema.redirect_step, schema.redirect_anchor)?
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string))
}

/// Uninstall form action and token
pub fn uninstall_form(body: &str, schema: &UninstallSchema) -> Result<(String, String), ParseError> {
    let step = schema.start_step;
    let pattern = Regex::new(schema.form_action_pattern).map_err(|_| ParseError::Invalid {
        step,
        marker: "form action pattern",
        value: schema.form_action_pattern.to_string(),
    })?;

    let doc = Document::parse(body);
    let form = require(doc.form_matching(step, &pattern)?, step, "uninstall form")?;
    let action = require(form.action(), step, "uninstall form action")?.to_string();
    let token = form.require_input(schema.token_field)?;
    Ok((action, token))
}

/// Whether the host confirmed the uninstall job
pub fn uninstall_queued(body: &str, schema: &UninstallSchema) -> Result<bool, ParseError> {
    let doc = Document::parse(body);
    let step = schema.complete_step;
    let container = require(doc.first(step, schema.result_container)?, step, "result container")?;
    Ok(element_text(container).contains(schema.queued_marker))
}

/// Navigation headers a browser sends with the install form
fn install_headers(base: &Url, referer: &Url) -> Vec<(&'static str, String)> {
    let origin = base.origin().ascii_serialization();
    vec![
        ("authority", base.host_str().unwrap_or_default().to_string()),
        ("cache-control", "max-age=0".to_string()),
        ("upgrade-insecure-requests", "1".to_string()),
        ("origin", origin),
        ("user-agent", BROWSER_USER_AGENT.to_string()),
        (
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"
                .to_string(),
        ),
        ("sec-fetch-site", "same-origin".to_string()),
        ("sec-fetch-mode", "navigate".to_string()),
        ("sec-fetch-user", "?1".to_string()),
        ("sec-fetch-dest", "document".to_string()),
        ("referer", referer.to_string()),
        ("accept-language", "en-US,en;q=0.9".to_string()),
    ]
}

// ============================================================
// Steps
// ============================================================

/// Load the permissions page and check install authority.
///
/// Returns the page for [`submit_install`] only when the operator can
/// install; no mutating request is made here.
pub async fn fetch_permissions<T: Transport>(
    session: &mut Session<T>,
    ctx: &InstallContext<'_>,
    account: &str,
    target_id: &str,
) -> Result<Page, StepError> {
    let path = UiSchema::permissions_path(ctx.app_name, target_id);
    let page = session.get(INSTALL_FOLDER, "install", &path).await?;

    match classify_permission(&page.body, &ctx.schema.install)? {
        Permission::Full => {
            info!(account, "Operator can install, installing");
            Ok(page)
        }
        Permission::RequestOnly => Err(StepError::PermissionDenied),
    }
}

/// Submit the install form found on `permissions_page`
pub async fn submit_install<T: Transport>(
    session: &mut Session<T>,
    ctx: &InstallContext<'_>,
    target_id: &str,
    permissions_page: Page,
) -> Result<Page, StepError> {
    let schema = &ctx.schema.install;
    let tokens = install_tokens(&permissions_page.body, ctx.app_name, schema)?;
    debug!(target_type = %tokens.target_type, "Extracted install form tokens");

    let form = [
        (schema.token_field, tokens.authenticity_token),
        ("target_id", target_id.to_string()),
        (schema.target_type_field, tokens.target_type),
        (
            schema.version_field,
            tokens.version_id.unwrap_or_else(|| ctx.version_id.to_string()),
        ),
        (schema.fingerprint_field, tokens.integration_fingerprint),
        ("install_target", schema.install_scope.to_string()),
    ];
    let headers = install_headers(session.base(), &permissions_page.url);

    let installed = session
        .post_form(
            INSTALL_FOLDER,
            "installed",
            &UiSchema::installations_path(ctx.app_name),
            &form,
            &headers,
        )
        .await?;
    Ok(installed)
}

/// Follow the post-install redirect and look for the success marker.
///
/// A missing anchor or marker is `Ok(false)`: the install did not complete.
pub async fn follow_redirect<T: Transport>(
    session: &mut Session<T>,
    ctx: &InstallContext<'_>,
    installed_page: Page,
) -> Result<bool, StepError> {
    let schema = &ctx.schema.install;
    let Some(href) = redirect_target(&installed_page.body, schema)? else {
        debug!("No redirect anchor on install response");
        return Ok(false);
    };

    let target = installed_page
        .url
        .join(&href)
        .map_err(|_| TransportError::InvalidUrl(href.clone()))?;
    let destination = session.get(INSTALL_FOLDER, "redirect", target.as_str()).await?;

    Ok(destination.body.to_lowercase().contains(schema.success_marker))
}

/// Uninstall the App from one target.
///
/// `Ok(false)` when the host answered but did not confirm the uninstall job.
pub async fn uninstall<T: Transport>(
    session: &mut Session<T>,
    ctx: &InstallContext<'_>,
    account: &str,
    address: &UninstallAddress,
) -> Result<bool, StepError> {
    let schema = &ctx.schema.uninstall;
    let start_path = match address {
        UninstallAddress::TargetId(id) => UiSchema::permissions_path(ctx.app_name, id),
        UninstallAddress::InstallationPath(path) => path.clone(),
    };

    let start = session
        .get(UNINSTALL_FOLDER, &format!("uninstall-{}-start", account), &start_path)
        .await?;
    let (action, token) = uninstall_form(&start.body, schema)?;
    debug!(account, %action, "Submitting uninstall form");

    let form = [
        (schema.token_field, token),
        (schema.method_field, schema.method_value.to_string()),
    ];
    let complete = session
        .post_form(
            UNINSTALL_FOLDER,
            &format!("uninstall-{}-complete", account),
            &action,
            &form,
            &[],
        )
        .await?;

    Ok(uninstall_queued(&complete.body, schema)?)
}
