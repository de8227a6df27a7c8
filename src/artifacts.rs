//! Debug Artifacts
//!
//! Side-effect hook that keeps fetched pages for offline inspection when the
//! host UI stops matching the schema. The workflows never read artifacts back.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::transport::Page;

/// Receives every fetched page, tagged with a category folder and a name
pub trait ArtifactSink {
    fn save(&self, folder: &str, name: &str, page: &Page);
}

/// Discards everything (debug off)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ArtifactSink for NoopSink {
    fn save(&self, _folder: &str, _name: &str, _page: &Page) {}
}

/// Writes `<root>/<folder>/<name>.html` plus a JSON metadata file
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

#[derive(Debug, Serialize)]
struct ArtifactMeta<'a> {
    url: &'a str,
    status: u16,
    saved_at: chrono::DateTime<chrono::Utc>,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write(&self, folder: &str, name: &str, page: &Page) -> std::io::Result<PathBuf> {
        let dir = self.root.join(sanitize(folder));
        fs::create_dir_all(&dir)?;

        let stem = sanitize(name);
        let html_path = dir.join(format!("{}.html", stem));
        fs::write(&html_path, &page.body)?;

        let meta = ArtifactMeta {
            url: page.url.as_str(),
            status: page.status,
            saved_at: chrono::Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&meta).map_err(std::io::Error::other)?;
        fs::write(dir.join(format!("{}.json", stem)), json)?;

        Ok(html_path)
    }
}

impl ArtifactSink for DirectorySink {
    fn save(&self, folder: &str, name: &str, page: &Page) {
        match self.write(folder, name, page) {
            Ok(path) => debug!(path = %path.display(), "Saved debug artifact"),
            Err(e) => warn!(folder, name, error = %e, "Failed to save debug artifact"),
        }
    }
}

/// Keep file names to a safe character set
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
