use super::library::{FragmentLibrary, FragmentLibraryError};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FragmentSourceError {
    #[error("Failed to load fragment library from '{source_name}': {source}")]
    Load {
        source_name: String,
        #[source]
        source: FragmentLibraryError,
    },
    #[error("Fragment source '{source_name}' did not respond within {timeout:?}")]
    Timeout {
        source_name: String,
        timeout: Duration,
    },
    #[error("Fragment source '{source_name}' stopped before delivering a library")]
    Disconnected { source_name: String },
    #[error("Fragment source '{source_name}' is unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },
}

/// Anything that can produce a fragment library, possibly slowly or unreliably.
pub trait FragmentSource: Send + Sync {
    fn name(&self) -> &str;

    fn fetch(&self) -> Result<FragmentLibrary, FragmentSourceError>;
}

#[derive(Debug, Clone)]
pub struct CsvFragmentSource {
    path: PathBuf,
    name: String,
}

impl CsvFragmentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.to_string_lossy().to_string();
        Self { path, name }
    }
}

impl FragmentSource for CsvFragmentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<FragmentLibrary, FragmentSourceError> {
        FragmentLibrary::load_csv(&self.path).map_err(|source| FragmentSourceError::Load {
            source_name: self.name.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryFragmentSource {
    name: String,
    library: FragmentLibrary,
}

impl InMemoryFragmentSource {
    pub fn new(name: impl Into<String>, library: FragmentLibrary) -> Self {
        Self {
            name: name.into(),
            library,
        }
    }
}

impl FragmentSource for InMemoryFragmentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<FragmentLibrary, FragmentSourceError> {
        Ok(self.library.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionPolicy {
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for AcquisitionPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcquiredLibrary {
    pub library: Arc<FragmentLibrary>,
    /// Set when the fallback library had to be used.
    pub degraded: bool,
    pub failures: Vec<String>,
}

fn fetch_with_timeout(
    source: &Arc<dyn FragmentSource>,
    timeout: Duration,
) -> Result<FragmentLibrary, FragmentSourceError> {
    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(source);
    // A worker that outlives the timeout is detached; its late result is dropped.
    thread::spawn(move || {
        let _ = tx.send(worker.fetch());
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(FragmentSourceError::Timeout {
            source_name: source.name().to_string(),
            timeout,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(FragmentSourceError::Disconnected {
            source_name: source.name().to_string(),
        }),
    }
}

/// Fetches the primary library within the policy's time bound, retrying as configured.
/// Never fails: when every attempt fails, the fallback is returned and marked degraded.
pub fn acquire_fragment_library(
    primary: Arc<dyn FragmentSource>,
    fallback: FragmentLibrary,
    policy: &AcquisitionPolicy,
) -> AcquiredLibrary {
    let mut failures = Vec::new();
    for attempt in 0..=policy.retries {
        let failure = match fetch_with_timeout(&primary, policy.timeout) {
            Ok(library) if !library.is_empty() => {
                debug!(
                    source = primary.name(),
                    attempt,
                    fragments = library.len(),
                    "Fragment library acquired"
                );
                return AcquiredLibrary {
                    library: Arc::new(library),
                    degraded: false,
                    failures,
                };
            }
            Ok(_) => format!("source '{}' returned an empty library", primary.name()),
            Err(e) => e.to_string(),
        };
        warn!(source = primary.name(), attempt, error = %failure, "Fragment library fetch failed");
        failures.push(failure);
    }

    warn!(source = primary.name(), "Using fallback fragment library");
    AcquiredLibrary {
        library: Arc::new(fallback),
        degraded: true,
        failures,
    }
}
