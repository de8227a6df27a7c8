//! Authenticated Session
//!
//! Owns the transport (and with it the cookie state), the host base URL and
//! the debug-artifact sink. Every page fetched through the session is handed
//! to the sink under its workflow folder.

use reqwest::Url;

use crate::artifacts::{ArtifactSink, NoopSink};
use crate::error::TransportError;
use crate::transport::{Page, Pairs, Transport};

pub struct Session<T> {
    transport: T,
    base: Url,
    sink: Box<dyn ArtifactSink>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, base: Url, sink: Box<dyn ArtifactSink>) -> Self {
        Self {
            transport,
            base,
            sink,
        }
    }

    /// Session without debug artifacts
    pub fn without_artifacts(transport: T, base: Url) -> Self {
        Self::new(transport, base, Box::new(NoopSink))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Resolve an absolute URL or a host-relative path against the base URL
    pub fn resolve(&self, target: &str) -> Result<Url, TransportError> {
        self.base
            .join(target)
            .map_err(|_| TransportError::InvalidUrl(target.to_string()))
    }

    /// GET and record under `folder/name`
    pub async fn get(&mut self, folder: &str, name: &str, target: &str) -> Result<Page, TransportError> {
        let url = self.resolve(target)?;
        let page = self.transport.get(&url).await?;
        self.sink.save(folder, name, &page);
        Ok(page)
    }

    /// POST a form and record under `folder/name`
    pub async fn post_form(
        &mut self,
        folder: &str,
        name: &str,
        target: &str,
        form: &Pairs,
        headers: &Pairs,
    ) -> Result<Page, TransportError> {
        let url = self.resolve(target)?;
        let page = self.transport.post_form(&url, form, headers).await?;
        self.sink.save(folder, name, &page);
        Ok(page)
    }
}
