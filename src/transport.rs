//! Session Transport
//!
//! HTTP seam used by every workflow. `HttpTransport` keeps cookies in a
//! reqwest cookie jar for the lifetime of the process; nothing is persisted
//! across runs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use crate::error::TransportError;

/// Browser user agent presented to the host
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/89.0.4389.90 Safari/537.36";

/// Form fields or headers as ordered name/value pairs
pub type Pairs = [(&'static str, String)];

/// A fetched response, after redirects
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after following redirects
    pub url: Url,
    pub status: u16,
    pub body: String,
}

/// HTTP method of a request, as recorded for tests and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// Stateful HTTP transport.
///
/// Takes `&mut self`: one request is in flight at a time and the cookie state
/// belongs to a single caller.
#[async_trait]
pub trait Transport: Send {
    /// GET `url`, following redirects
    async fn get(&mut self, url: &Url) -> Result<Page, TransportError>;

    /// POST an urlencoded form to `url`, following redirects
    async fn post_form(
        &mut self,
        url: &Url,
        form: &Pairs,
        headers: &Pairs,
    ) -> Result<Page, TransportError>;
}

// ============================================================
// reqwest implementation
// ============================================================

/// Cookie-keeping reqwest transport
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport with a fresh cookie jar
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self { client })
    }

    async fn into_page(url: &Url, response: reqwest::Response) -> Result<Page, TransportError> {
        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;

        debug!(url = %final_url, status, bytes = body.len(), "Fetched page");

        Ok(Page {
            url: final_url,
            status,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&mut self, url: &Url) -> Result<Page, TransportError> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;

        Self::into_page(url, response).await
    }

    async fn post_form(
        &mut self,
        url: &Url,
        form: &Pairs,
        headers: &Pairs,
    ) -> Result<Page, TransportError> {
        debug!(%url, fields = form.len(), "POST");
        let mut request = self.client.post(url.clone()).form(form);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = request.send().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;

        Self::into_page(url, response).await
    }
}

// ============================================================
// Scripted transport for unit tests
// ============================================================

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, VecDeque};

    use super::*;

    pub const BASE: &str = "https://github.test";

    /// A request as seen by the scripted transport
    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub method: Method,
        pub url: String,
        pub form: Vec<(String, String)>,
        pub headers: Vec<(String, String)>,
    }

    impl Recorded {
        pub fn field(&self, name: &str) -> Option<&str> {
            self.form
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }
    }

    #[derive(Debug, Clone)]
    struct Scripted {
        final_url: Option<String>,
        body: String,
    }

    /// Replays canned bodies keyed by method and path+query.
    ///
    /// Each route pops its queue; the last response repeats.
    #[derive(Default)]
    pub struct ScriptedTransport {
        routes: HashMap<(Method, String), VecDeque<Scripted>>,
        pub requests: Vec<Recorded>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(mut self, method: Method, path: &str, body: impl Into<String>) -> Self {
            self.push(method, path, None, body.into());
            self
        }

        /// Respond as if redirected to `final_url`
        pub fn on_redirect(
            mut self,
            method: Method,
            path: &str,
            final_url: &str,
            body: impl Into<String>,
        ) -> Self {
            self.push(method, path, Some(final_url.to_string()), body.into());
            self
        }

        fn push(&mut self, method: Method, path: &str, final_url: Option<String>, body: String) {
            self.routes
                .entry((method, path.to_string()))
                .or_default()
                .push_back(Scripted { final_url, body });
        }

        pub fn count(&self, method: Method) -> usize {
            self.requests.iter().filter(|r| r.method == method).count()
        }

        pub fn posts(&self) -> Vec<&Recorded> {
            self.requests
                .iter()
                .filter(|r| r.method == Method::Post)
                .collect()
        }

        fn respond(&mut self, method: Method, url: &Url) -> Result<Page, TransportError> {
            let key = match url.query() {
                Some(q) => format!("{}?{}", url.path(), q),
                None => url.path().to_string(),
            };
            let queue = self
                .routes
                .get_mut(&(method, key.clone()))
                .ok_or_else(|| TransportError::InvalidUrl(format!("no script for {} {}", method, key)))?;

            let scripted = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
            .ok_or_else(|| TransportError::InvalidUrl(format!("empty script for {}", key)))?;

            let final_url = match scripted.final_url {
                Some(u) => Url::parse(&u).map_err(|_| TransportError::InvalidUrl(u))?,
                None => url.clone(),
            };

            Ok(Page {
                url: final_url,
                status: 200,
                body: scripted.body,
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&mut self, url: &Url) -> Result<Page, TransportError> {
            self.requests.push(Recorded {
                method: Method::Get,
                url: url.to_string(),
                form: Vec::new(),
                headers: Vec::new(),
            });
            self.respond(Method::Get, url)
        }

        async fn post_form(
            &mut self,
            url: &Url,
            form: &Pairs,
            headers: &Pairs,
        ) -> Result<Page, TransportError> {
            let owned = |pairs: &Pairs| {
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect::<Vec<_>>()
            };
            self.requests.push(Recorded {
                method: Method::Post,
                url: url.to_string(),
                form: owned(form),
                headers: owned(headers),
            });
            self.respond(Method::Post, url)
        }
    }
}
