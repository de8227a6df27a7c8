//! UI Schema
//!
//! The host's HTML is a semi-stable contract. Every field name, selector and
//! literal status string the workflows depend on lives in this table, grouped
//! by workflow step, so a UI change fails one named lookup.

/// Version tag of the marker table below
pub const SCHEMA_VERSION: &str = "2021.03";

// ============================================================
// Login
// ============================================================

/// Direct credential login (`/login` -> `/session`)
#[derive(Debug, Clone)]
pub struct LoginSchema {
    pub step: &'static str,
    pub path: &'static str,
    pub form_action: &'static str,
    pub token_field: &'static str,
    pub username_field: &'static str,
    pub password_field: &'static str,
    /// Fields a browser submits with fixed values
    pub browser_fields: &'static [(&'static str, &'static str)],
    pub timestamp_field: &'static str,
    pub timestamp_secret_field: &'static str,
    pub main_container: &'static str,
    pub header: &'static str,
    /// Still on the sign-in page when the header contains this (lowercase)
    pub failure_marker: &'static str,
}

/// Federated (SSO) login through an external identity provider
#[derive(Debug, Clone)]
pub struct FederatedSchema {
    pub step: &'static str,
    pub redirect_meta: &'static str,
    /// Substring of the meta refresh content that marks the provider URL
    pub provider_marker: &'static str,
    /// Marker in the meta refresh content preceding the URL
    pub refresh_prefix: &'static str,
    pub username_field: &'static str,
    pub password_field: &'static str,
    pub browser_fields: &'static [(&'static str, &'static str)],
    pub failure_marker: &'static str,
}

/// Second-factor challenge shared by both login strategies
#[derive(Debug, Clone)]
pub struct SecondFactorSchema {
    pub step: &'static str,
    pub challenge_container: &'static str,
    pub challenge_header: &'static str,
    pub challenge_marker: &'static str,
    pub form_action: &'static str,
    pub token_field: &'static str,
    pub code_field: &'static str,
}

// ============================================================
// Discovery
// ============================================================

/// Paginated "install on" listing
#[derive(Debug, Clone)]
pub struct ListingSchema {
    pub step: &'static str,
    pub pagination: &'static str,
    pub total_pages_attr: &'static str,
    pub container: &'static str,
    pub row: &'static str,
    pub row_avatar: &'static str,
    pub row_status: &'static str,
    pub status_attr: &'static str,
    pub installed_marker: &'static str,
}

// ============================================================
// Install / Uninstall
// ============================================================

/// Per-target permissions page and install form
#[derive(Debug, Clone)]
pub struct InstallSchema {
    pub permissions_step: &'static str,
    pub submit_step: &'static str,
    pub redirect_step: &'static str,
    pub button: &'static str,
    /// Label that grants full install authority (lowercase)
    pub install_label: &'static str,
    /// Label that only allows an access request (lowercase)
    pub request_label: &'static str,
    pub token_field: &'static str,
    pub target_type_field: &'static str,
    pub fingerprint_field: &'static str,
    pub version_field: &'static str,
    pub install_scope: &'static str,
    pub redirect_anchor: &'static str,
    pub success_marker: &'static str,
}

/// Uninstall form and confirmation page
#[derive(Debug, Clone)]
pub struct UninstallSchema {
    pub start_step: &'static str,
    pub complete_step: &'static str,
    pub form_action_pattern: &'static str,
    pub token_field: &'static str,
    pub method_field: &'static str,
    pub method_value: &'static str,
    pub result_container: &'static str,
    pub queued_marker: &'static str,
}

/// The full marker table
#[derive(Debug, Clone)]
pub struct UiSchema {
    pub version: &'static str,
    pub login: LoginSchema,
    pub federated: FederatedSchema,
    pub second_factor: SecondFactorSchema,
    pub listing: ListingSchema,
    pub install: InstallSchema,
    pub uninstall: UninstallSchema,
}

impl UiSchema {
    /// Markers for the current host UI
    pub fn current() -> Self {
        Self {
            version: SCHEMA_VERSION,
            login: LoginSchema {
                step: "login.credentials",
                path: "/login",
                form_action: "/session",
                token_field: "authenticity_token",
                username_field: "login",
                password_field: "password",
                browser_fields: &[
                    ("commit", "Sign in"),
                    ("trusted_device", ""),
                    ("webauthn-support", "supported"),
                    ("webauthn-iuvpaa-support", "supported"),
                    ("return_to", ""),
                    ("allow_signup", ""),
                    ("client_id", ""),
                    ("integration", ""),
                    ("required_field_e106", ""),
                ],
                timestamp_field: "timestamp",
                timestamp_secret_field: "timestamp_secret",
                main_container: "div.application-main",
                header: "h1",
                failure_marker: "sign in to github",
            },
            federated: FederatedSchema {
                step: "login.federated",
                redirect_meta: "meta[content]",
                provider_marker: "/idp/",
                refresh_prefix: "url=",
                username_field: "pf.username",
                password_field: "pf.pass",
                browser_fields: &[
                    ("pf.ok", "clicked"),
                    ("pf.cancel", ""),
                    ("pf.adapterId", "HTMLLoginFormAdapter"),
                ],
                failure_marker: "didn't recognize the username or password",
            },
            second_factor: SecondFactorSchema {
                step: "login.second_factor",
                challenge_container: "div[class*=\"auth-form-header\"]",
                challenge_header: "h1",
                challenge_marker: "two-factor",
                form_action: "/sessions/two-factor",
                token_field: "authenticity_token",
                code_field: "otp",
            },
            listing: ListingSchema {
                step: "discovery.listing",
                pagination: "em.current",
                total_pages_attr: "data-total-pages",
                container: "div.application-main",
                row: "a[class*=\"Box-row\"]",
                row_avatar: "img",
                row_status: "span",
                status_attr: "aria-label",
                installed_marker: "is installed",
            },
            install: InstallSchema {
                permissions_step: "install.permissions",
                submit_step: "install.submit",
                redirect_step: "install.redirect",
                button: "button[data-octo-click=\"install_integration\"]",
                install_label: "install & authorize",
                request_label: "authorize & request",
                token_field: "authenticity_token",
                target_type_field: "target_type",
                fingerprint_field: "integration_fingerprint",
                version_field: "version_id",
                install_scope: "all",
                redirect_anchor: "a#redirect",
                success_marker: "success",
            },
            uninstall: UninstallSchema {
                start_step: "uninstall.start",
                complete_step: "uninstall.complete",
                form_action_pattern: r"/settings/installations/[0-9]*$",
                token_field: "authenticity_token",
                method_field: "_method",
                method_value: "delete",
                result_container: "div[class*=\"container-lg\"]",
                queued_marker: "job has been queued to uninstall",
            },
        }
    }

    /// Listing page of targets the App can be installed on
    pub fn listing_path(app: &str) -> String {
        format!("/apps/{}/installations/new", app)
    }

    /// Per-target permissions page
    pub fn permissions_path(app: &str, target_id: &str) -> String {
        format!(
            "/apps/{}/installations/new/permissions?target_id={}",
            app,
            urlencoding::encode(target_id)
        )
    }

    /// Action of the install form and target of the install POST
    pub fn installations_path(app: &str) -> String {
        format!("/apps/{}/installations", app)
    }
}

impl Default for UiSchema {
    fn default() -> Self {
        Self::current()
    }
}
