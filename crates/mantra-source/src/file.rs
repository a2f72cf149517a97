//! Sessions exported to a JSON lines file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mantra_core::{Clock, ExternalSource, NewExercise, SourceError, SystemClock};

use crate::session::{Session, SessionMapping};

/// Reads one [`Session`] per line from a local export.
///
/// Blank lines are ignored. A missing file means the export is not available
/// yet, which is reported as [`SourceError::Unavailable`].
#[derive(Clone)]
pub struct FileSource {
    path: PathBuf,
    mapping: SessionMapping,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("path", &self.path)
            .field("mapping", &self.mapping)
            .finish_non_exhaustive()
    }
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mapping: SessionMapping::default(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_mapping(mut self, mapping: SessionMapping) -> Self {
        self.mapping = mapping;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ExternalSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self) -> Result<Vec<NewExercise>, SourceError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(SourceError::Unavailable {
                    reason: format!("{} does not exist", self.path.display()),
                });
            }
            Err(err) => {
                return Err(SourceError::Unavailable {
                    reason: format!("failed to read {}: {err}", self.path.display()),
                });
            }
        };

        let sessions = parse_lines(&contents)?;
        let received = sessions.len();
        let candidates = self.mapping.map_all(sessions, self.clock.now());
        tracing::debug!(
            path = %self.path.display(),
            received,
            mapped = candidates.len(),
            "read exercise sessions"
        );
        Ok(candidates)
    }
}

fn parse_lines(contents: &str) -> Result<Vec<Session>, SourceError> {
    let mut sessions = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let session = serde_json::from_str(line).map_err(|err| {
            SourceError::InvalidPayload(format!("invalid JSON on line {}: {err}", index + 1))
        })?;
        sessions.push(session);
    }
    Ok(sessions)
}
