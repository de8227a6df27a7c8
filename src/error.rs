//! Error Taxonomy
//!
//! Run-scoped errors (configuration, authentication, discovery) propagate and
//! end the run. Target-scoped errors (`StepError`) are caught by the
//! orchestrator and scored as that target's outcome.

use thiserror::Error;

/// Missing or invalid setting, reported before any network call
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was not provided
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    /// A setting was provided but could not be used
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// HTTP-level failure
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request could not be sent or its body could not be read
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A URL or path could not be resolved against the base URL
    #[error("Invalid URL {0}")]
    InvalidUrl(String),

    /// Transport could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

/// The fetched page did not have the structure the UI schema expects.
///
/// Every variant names the workflow step and the marker that failed so a UI
/// change surfaces as one named lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// An element or attribute the step depends on is absent
    #[error("[{step}] expected {marker} was not found")]
    Missing {
        step: &'static str,
        marker: &'static str,
    },

    /// A label was found but matches none of the known values
    #[error("[{step}] unrecognized {marker}: {value:?}")]
    Unrecognized {
        step: &'static str,
        marker: &'static str,
        value: String,
    },

    /// A value was found but is malformed
    #[error("[{step}] invalid {marker}: {value:?}")]
    Invalid {
        step: &'static str,
        marker: &'static str,
        value: String,
    },
}

/// Explicit result of a single install/uninstall workflow step
#[derive(Debug, Error)]
pub enum StepError {
    /// Operator can only request the App, not install it
    #[error("Operator lacks install permission")]
    PermissionDenied,

    /// Page structure error
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Network error
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Authentication failures; all are fatal for the run
#[derive(Debug, Error)]
pub enum AuthError {
    /// The host kept us on the sign-in page
    #[error("Credentials rejected for user {0}")]
    Rejected(String),

    /// The one-time code was not accepted
    #[error("Two-factor authentication failed for user {0}")]
    SecondFactorRejected(String),

    /// Reading the one-time code from the operator failed
    #[error("Failed to read two-factor code: {0}")]
    Prompt(#[from] std::io::Error),

    /// Login page structure error
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Network error
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Discovery failures; these end the run
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A listing page or row did not match the UI schema
    #[error("Listing page {page}: {source}")]
    Parse {
        page: u32,
        #[source]
        source: ParseError,
    },

    /// Network error while fetching a listing page
    #[error("Listing page {page}: {source}")]
    Transport {
        page: u32,
        #[source]
        source: TransportError,
    },
}
