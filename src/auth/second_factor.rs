//! Second-factor challenge detection and submission

use std::io;

use async_trait::async_trait;
use tracing::info;

use crate::config::Credentials;
use crate::document::{element_text, first_within, require, Document};
use crate::error::{AuthError, ParseError, TransportError};
use crate::schema::SecondFactorSchema;
use crate::session::Session;
use crate::transport::{Page, Transport};

/// Source of one-time codes
#[async_trait]
pub trait OtpPrompt: Send + Sync {
    async fn read_code(&self) -> io::Result<String>;
}

/// Reads the code from the controlling terminal without echo.
///
/// Waits until the operator answers; the terminal read runs on the blocking
/// pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

#[async_trait]
impl OtpPrompt for TerminalPrompt {
    async fn read_code(&self) -> io::Result<String> {
        let code = tokio::task::spawn_blocking(|| {
            rpassword::prompt_password("Two-factor authentication required, input here: ")
        })
        .await
        .map_err(io::Error::other)??;
        Ok(code.trim().to_string())
    }
}

/// Whether `body` is a second-factor challenge page
pub fn challenge_present(body: &str, schema: &SecondFactorSchema) -> Result<bool, ParseError> {
    let doc = Document::parse(body);
    let Some(container) = doc.first(schema.step, schema.challenge_container)? else {
        return Ok(false);
    };

    let header = require(
        first_within(container, schema.step, schema.challenge_header)?,
        schema.step,
        "challenge header",
    )?;

    Ok(element_text(header).to_lowercase().contains(schema.challenge_marker))
}

fn challenge_token(body: &str, schema: &SecondFactorSchema) -> Result<String, ParseError> {
    let doc = Document::parse(body);
    let form = require(
        doc.form_with_action(schema.step, schema.form_action)?,
        schema.step,
        "two-factor form",
    )?;
    form.require_input(schema.token_field)
}

/// Answer a challenge on `page` if one is present.
///
/// Succeeds immediately when no challenge is shown.
pub(crate) async fn complete<T: Transport>(
    session: &mut Session<T>,
    page: &Page,
    credentials: &Credentials,
    schema: &SecondFactorSchema,
    prompt: &dyn OtpPrompt,
    folder: &str,
) -> Result<(), AuthError> {
    if !challenge_present(&page.body, schema)? {
        info!("Two-factor authentication not required");
        return Ok(());
    }

    let token = challenge_token(&page.body, schema)?;
    let code = prompt.read_code().await?;

    let target = page
        .url
        .join(schema.form_action)
        .map_err(|_| TransportError::InvalidUrl(schema.form_action.to_string()))?;

    let form = [(schema.token_field, token), (schema.code_field, code)];
    let response = session
        .post_form(folder, "tfa", target.as_str(), &form, &[])
        .await?;

    if challenge_present(&response.body, schema)? {
        return Err(AuthError::SecondFactorRejected(credentials.username.clone()));
    }

    info!("Two-factor authentication accepted");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::UiSchema;
    use crate::transport::testing::{ScriptedTransport, BASE};
    use crate::transport::Method;
    use reqwest::Url;

    pub const CHALLENGE_PAGE: &str = r#"
        <div class="application-main">
          <div class="auth-form-header p-0"><h1>Two-factor authentication</h1></div>
          <form action="/sessions/two-factor" method="post">
            <input type="hidden" name="authenticity_token" value="tfa-token">
            <input name="otp">
          </form>
        </div>"#;

    /// Always answers with the same code
    pub struct FixedCode(pub &'static str);

    #[async_trait]
    impl OtpPrompt for FixedCode {
        async fn read_code(&self) -> io::Result<String> {
            Ok(self.0.to_string())
        }
    }

    /// Fails the test if asked for a code
    pub struct NoPrompt;

    #[async_trait]
    impl OtpPrompt for NoPrompt {
        async fn read_code(&self) -> io::Result<String> {
            Err(io::Error::other("no code expected"))
        }
    }

    #[test]
    fn test_challenge_detection() {
        let schema = UiSchema::current().second_factor;
        assert!(challenge_present(CHALLENGE_PAGE, &schema).unwrap());
        assert!(!challenge_present("<div class=\"application-main\">Dashboard</div>", &schema).unwrap());

        let other_header = r#"<div class="auth-form-header"><h1>Device verification</h1></div>"#;
        assert!(!challenge_present(other_header, &schema).unwrap());
    }

    #[test]
    fn test_challenge_without_header_is_parse_error() {
        let schema = UiSchema::current().second_factor;
        let err = challenge_present(r#"<div class="auth-form-header"></div>"#, &schema).unwrap_err();
        assert!(matches!(err, ParseError::Missing { marker: "challenge header", .. }));
    }

    #[test]
    fn test_challenge_token() {
        let schema = UiSchema::current().second_factor;
        assert_eq!(challenge_token(CHALLENGE_PAGE, &schema).unwrap(), "tfa-token");
    }

    /// Answers from the blocking pool, the way the terminal prompt does
    struct BlockingCode(&'static str);

    #[async_trait]
    impl OtpPrompt for BlockingCode {
        async fn read_code(&self) -> io::Result<String> {
            let code = self.0;
            tokio::task::spawn_blocking(move || code.to_string())
                .await
                .map_err(io::Error::other)
        }
    }

    #[tokio::test]
    async fn test_code_read_on_blocking_pool() {
        let transport = ScriptedTransport::new().on(Method::Post, "/sessions/two-factor", "<html>ok</html>");
        let mut session = Session::without_artifacts(transport, Url::parse(BASE).unwrap());
        let page = Page {
            url: Url::parse("https://github.test/session").unwrap(),
            status: 200,
            body: CHALLENGE_PAGE.to_string(),
        };

        complete(
            &mut session,
            &page,
            &Credentials::new("octo", "pw"),
            &UiSchema::current().second_factor,
            &BlockingCode("246810"),
            "login-data",
        )
        .await
        .unwrap();

        let posts = session.transport().posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].field("otp"), Some("246810"));
    }
}
