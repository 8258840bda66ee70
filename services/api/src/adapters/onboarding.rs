//! services/api/src/adapters/onboarding.rs
//!
//! Implements the `OnboardingStore` port with a marker file in the data directory.

use async_trait::async_trait;
use script_engine_core::ports::{OnboardingStore, PortError, PortResult};
use std::path::{Path, PathBuf};

const MARKER_FILE: &str = "onboarding_seen";

/// An adapter that records the dismissed onboarding screen as a marker file.
#[derive(Clone, Debug)]
pub struct FileOnboardingStore {
    marker: PathBuf,
}

impl FileOnboardingStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            marker: data_dir.as_ref().join(MARKER_FILE),
        }
    }
}

#[async_trait]
impl OnboardingStore for FileOnboardingStore {
    async fn has_seen(&self) -> PortResult<bool> {
        tokio::fs::try_exists(&self.marker)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn mark_seen(&self) -> PortResult<()> {
        if let Some(dir) = self.marker.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }
        tokio::fs::write(&self.marker, b"true")
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}
