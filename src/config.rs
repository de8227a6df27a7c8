//! Configuration
//!
//! Settings come from CLI flags backed by `BLU_*` environment variables (a
//! `.env` file is loaded by the binary first). They are validated once into
//! an immutable [`Settings`] before any network activity.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use reqwest::Url;

use crate::error::ConfigError;

/// Login strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LoginMode {
    /// Username/password form on the host
    Direct,
    /// Redirect through an external identity provider
    Sso,
}

impl std::fmt::Display for LoginMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoginMode::Direct => write!(f, "direct"),
            LoginMode::Sso => write!(f, "sso"),
        }
    }
}

/// Raw settings as parsed from flags and environment
#[derive(Debug, Clone, Args)]
pub struct SettingsArgs {
    /// Host domain, optionally with scheme (e.g. github.example.com)
    #[arg(long, env = "BLU_DOMAIN", default_value = "github.com")]
    pub domain: String,

    /// Slug of the App to install
    #[arg(long, env = "BLU_GITHUB_APP_NAME")]
    pub app_name: Option<String>,

    /// Operator username
    #[arg(long, env = "BLU_USERNAME")]
    pub username: Option<String>,

    /// Operator password
    #[arg(long, env = "BLU_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Stop after this many successful targets (0 = no limit)
    #[arg(long, env = "BLU_MAX_ORGANIZATIONS")]
    pub max_organizations: Option<u32>,

    /// Save every fetched page for offline inspection
    #[arg(long, env = "BLU_DEBUG", value_parser = clap::builder::BoolishValueParser::new())]
    pub debug: bool,

    /// Directory for debug artifacts
    #[arg(long, env = "BLU_DEBUG_DIR", default_value = "debug-data")]
    pub debug_dir: PathBuf,

    /// Pause between targets, in seconds
    #[arg(long, env = "BLU_DELAY_SECS", default_value = "2")]
    pub delay_secs: u64,

    /// Login strategy
    #[arg(long, env = "BLU_LOGIN_MODE", value_enum, default_value = "direct")]
    pub login_mode: LoginMode,

    /// App version id used when the install form does not carry one
    #[arg(long, env = "BLU_VERSION_ID", default_value = "147771")]
    pub version_id: String,

    /// HTTP request timeout, in seconds
    #[arg(long, env = "BLU_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,
}

/// Operator credentials
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validated, immutable run settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: Url,
    pub app_name: String,
    pub credentials: Credentials,
    pub max_successes: Option<u32>,
    pub delay: Duration,
    pub debug_dir: Option<PathBuf>,
    pub login_mode: LoginMode,
    pub version_id: String,
    pub timeout: Duration,
}

impl SettingsArgs {
    /// Validate into [`Settings`]; any missing required value is fatal
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let base_url = base_url(&self.domain)?;

        let app_name = non_empty(self.app_name, "BLU_GITHUB_APP_NAME")?;
        if app_name.contains('/') {
            return Err(ConfigError::Invalid {
                name: "BLU_GITHUB_APP_NAME",
                reason: format!("{:?} is not an App slug", app_name),
            });
        }

        let username = non_empty(self.username, "BLU_USERNAME")?;
        let password = non_empty(self.password, "BLU_PASSWORD")?;

        Ok(Settings {
            base_url,
            app_name,
            credentials: Credentials::new(username, password),
            max_successes: self.max_organizations.filter(|&n| n > 0),
            delay: Duration::from_secs(self.delay_secs),
            debug_dir: self.debug.then_some(self.debug_dir),
            login_mode: self.login_mode,
            version_id: self.version_id,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

fn non_empty(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// `github.com` -> `https://github.com/`; explicit schemes are kept
fn base_url(domain: &str) -> Result<Url, ConfigError> {
    let domain = domain.trim().trim_end_matches('/');
    if domain.is_empty() {
        return Err(ConfigError::Missing("BLU_DOMAIN"));
    }

    let with_scheme = if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{}", domain)
    };

    Url::parse(&with_scheme).map_err(|e| ConfigError::Invalid {
        name: "BLU_DOMAIN",
        reason: e.to_string(),
    })
}
