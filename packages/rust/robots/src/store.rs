//! Read-only access to robots.txt files saved by the crawl stage.
//!
//! Each crawl target's robots.txt lives at `<dir>/<id>.<extension>`. A missing
//! file is a normal outcome: the crawler never reached that host's policy.

use std::io::ErrorKind;
use std::ffi::OsString;
use std::path::{Component, MAIN_SEPARATOR_STR, Path, PathBuf};
use std::str::Utf8Error;

use tracing::{debug, warn};

use robotscheck_shared::{Result, RobotsCheckError};

/// Contents of one artifact slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// No file for this id.
    Missing,
    /// The file decoded as UTF-8.
    Text(String),
    /// The file exists but is not valid UTF-8.
    Undecodable(Utf8Error),
}

/// Directory of `<id>.<extension>` robots.txt files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    extension: String,
}

impl ArtifactStore {
    /// Open a store rooted at `dir`. A leading `.` on `extension` is ignored.
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic location of the artifact for `id`.
    ///
    /// The id is appended to the directory as text, so an id that looks like
    /// an absolute path still lands under the store.
    pub fn path_for(&self, id: &str) -> PathBuf {
        let mut path = OsString::from(self.dir.as_os_str());
        path.push(MAIN_SEPARATOR_STR);
        path.push(id);
        path.push(".");
        path.push(&self.extension);
        PathBuf::from(path)
    }

    /// Whether `id` stays inside the store once appended to its directory.
    fn contains(id: &str) -> bool {
        !Path::new(id)
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    }

    /// Load the artifact for `id`.
    ///
    /// Only a missing file maps to [`Artifact::Missing`]; every other read
    /// failure is fatal for the run. An id that would climb out of the store
    /// has no artifact.
    pub async fn load(&self, id: &str) -> Result<Artifact> {
        if !Self::contains(id) {
            warn!(id, "artifact id escapes the robots directory, treating as missing");
            return Ok(Artifact::Missing);
        }
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(id, path = %path.display(), "no robots.txt artifact");
                return Ok(Artifact::Missing);
            }
            Err(e) => return Err(RobotsCheckError::io(path, e)),
        };

        match String::from_utf8(bytes) {
            Ok(text) => Ok(Artifact::Text(text)),
            Err(e) => Ok(Artifact::Undecodable(e.utf8_error())),
        }
    }
}
