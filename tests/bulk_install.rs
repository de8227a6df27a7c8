//! End-to-end runs against a mock host over real HTTP

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use mockito::{Matcher, Server};
use reqwest::Url;

use bulk_app_installer::artifacts::DirectorySink;
use bulk_app_installer::error::AuthError;
use bulk_app_installer::{
    establish_session, Credentials, HttpTransport, InstallContext, LoginMode, Mode, Orchestrator, OtpPrompt,
    RunState, Session, TargetCursor, UiSchema, BROWSER_USER_AGENT,
};

const LOGIN_PAGE: &str = r#"<html><body><div class="application-main">
    <h1>Sign in to GitHub</h1>
    <form action="/session" method="post">
      <input type="hidden" name="authenticity_token" value="login-token">
      <input type="hidden" name="timestamp" value="1616000000">
      <input type="hidden" name="timestamp_secret" value="ts-secret">
    </form></div></body></html>"#;

const DASHBOARD: &str = r#"<html><body><div class="application-main"><h1>Dashboard</h1></div></body></html>"#;

const LISTING: &str = r#"<html><body><div class="application-main"><div class="Box">
    <a class="Box-row" href="/organizations/acme/settings/installations/9001">
      <img alt="@acme" src="/a.png"><span aria-label="App is installed">acme</span></a>
    <a class="Box-row" href="/apps/checks-app/installations/new/permissions?target_id=2">
      <img alt="@globex" src="/b.png"><span aria-label="Install">globex</span></a>
    </div></div></body></html>"#;

const PERMISSIONS: &str = r#"<html><body><div class="application-main">
    <form action="/apps/checks-app/installations" method="post">
      <input type="hidden" name="authenticity_token" value="install-token">
      <input type="hidden" name="target_type" value="Organization">
      <input type="hidden" name="integration_fingerprint" value="fp-2">
      <input type="hidden" name="version_id" value="200001">
      <button type="submit" data-octo-click="install_integration">Install &amp; Authorize</button>
    </form></div></body></html>"#;

const INSTALLED: &str = r#"<html><body>You are being <a id="redirect" href="/apps/checks-app/installations/done">redirected</a>.</body></html>"#;

/// Fails the test if a second factor is requested
struct NoSecondFactor;

#[async_trait]
impl OtpPrompt for NoSecondFactor {
    async fn read_code(&self) -> io::Result<String> {
        Err(io::Error::other("unexpected two-factor prompt"))
    }
}

fn session(server: &Server) -> Session<HttpTransport> {
    let transport = HttpTransport::new(BROWSER_USER_AGENT, Duration::from_secs(5)).unwrap();
    Session::without_artifacts(transport, Url::parse(&server.url()).unwrap())
}

#[tokio::test]
async fn test_login_discover_and_install() {
    let mut server = Server::new_async().await;
    let schema = UiSchema::current();

    let _login = server.mock("GET", "/login").with_body(LOGIN_PAGE).create_async().await;
    let session_post = server
        .mock("POST", "/session")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("login".into(), "octo".into()),
            Matcher::UrlEncoded("authenticity_token".into(), "login-token".into()),
        ]))
        .with_body(DASHBOARD)
        .expect(1)
        .create_async()
        .await;
    let _listing = server
        .mock("GET", "/apps/checks-app/installations/new")
        .with_body(LISTING)
        .create_async()
        .await;
    let _permissions = server
        .mock("GET", "/apps/checks-app/installations/new/permissions?target_id=2")
        .with_body(PERMISSIONS)
        .create_async()
        .await;
    let install_post = server
        .mock("POST", "/apps/checks-app/installations")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("target_id".into(), "2".into()),
            Matcher::UrlEncoded("version_id".into(), "200001".into()),
            Matcher::UrlEncoded("install_target".into(), "all".into()),
        ]))
        .with_body(INSTALLED)
        .expect(1)
        .create_async()
        .await;
    let _done = server
        .mock("GET", "/apps/checks-app/installations/done")
        .with_body("<h1>Success</h1>")
        .create_async()
        .await;

    let mut session = session(&server);
    establish_session(
        &mut session,
        &Credentials::new("octo", "hunter2"),
        LoginMode::Direct,
        &schema,
        &NoSecondFactor,
    )
    .await
    .unwrap();

    let ctx = InstallContext {
        app_name: "checks-app",
        version_id: "147771",
        schema: &schema,
    };
    let mut cursor = TargetCursor::new("checks-app", Mode::Install, &schema);
    let summary = Orchestrator::new(ctx, Mode::Install, Duration::ZERO)
        .run(&mut session, &mut cursor, RunState::new(None))
        .await
        .unwrap();

    session_post.assert_async().await;
    install_post.assert_async().await;
    assert_eq!(cursor.skipped(), 1);
    assert_eq!(summary.records.len(), 1);
    assert_eq!(summary.records[0].target.name, "globex");
    assert_eq!(summary.count("installed"), 1);
}

#[tokio::test]
async fn test_rejected_login_stops_before_discovery() {
    let mut server = Server::new_async().await;
    let schema = UiSchema::current();

    let _login = server.mock("GET", "/login").with_body(LOGIN_PAGE).create_async().await;
    let _session_post = server.mock("POST", "/session").with_body(LOGIN_PAGE).create_async().await;

    let mut session = session(&server);
    let err = establish_session(
        &mut session,
        &Credentials::new("octo", "wrong"),
        LoginMode::Direct,
        &schema,
        &NoSecondFactor,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AuthError::Rejected(_)));
}

#[tokio::test]
async fn test_debug_artifacts_are_saved() {
    let mut server = Server::new_async().await;
    let schema = UiSchema::current();
    let dir = tempfile::tempdir().unwrap();

    let _login = server.mock("GET", "/login").with_body(LOGIN_PAGE).create_async().await;
    let _session_post = server.mock("POST", "/session").with_body(DASHBOARD).create_async().await;

    let transport = HttpTransport::new(BROWSER_USER_AGENT, Duration::from_secs(5)).unwrap();
    let mut session = Session::new(
        transport,
        Url::parse(&server.url()).unwrap(),
        Box::new(DirectorySink::new(dir.path())),
    );

    establish_session(
        &mut session,
        &Credentials::new("octo", "hunter2"),
        LoginMode::Direct,
        &schema,
        &NoSecondFactor,
    )
    .await
    .unwrap();

    let saved = std::fs::read_to_string(dir.path().join("login-data").join("login-start.html")).unwrap();
    assert!(saved.contains("login-token"));
    assert!(dir.path().join("login-data").join("login-complete.json").exists());
}
