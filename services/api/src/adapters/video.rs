//! services/api/src/adapters/video.rs
//!
//! This module contains the adapter for OpenAI's video generation jobs. Videos
//! render asynchronously: a job is created, then polled at a fixed interval until
//! it completes, fails, or the caller cancels. Completed clips are downloaded and
//! handed to the session as `data:video/mp4` URIs, since the content endpoint
//! needs the server's key. Jobs abandoned before they settle are deleted.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use script_engine_core::ports::{PortError, PortResult};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

pub(crate) fn videos_endpoint(base_url: &str) -> String {
    format!("{}/videos", base_url.trim_end_matches('/'))
}

pub(crate) fn video_prompt(prompt: &str) -> String {
    format!("Educational e-learning video style: {}", prompt)
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

//=========================================================================================
// Job Payloads
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct JobError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct VideoJob {
    id: String,
    status: JobStatus,
    #[serde(default)]
    error: Option<JobError>,
}

/// Deletes the remote job when dropped before it settles, so a cancelled or
/// dropped request does not leave a render running.
struct PendingJob {
    http: reqwest::Client,
    url: String,
    api_key: String,
    settled: bool,
}

impl Drop for PendingJob {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(url = %self.url, "No runtime left to delete the abandoned video job.");
            return;
        };
        let request = self.http.delete(&self.url).bearer_auth(&self.api_key);
        let url = std::mem::take(&mut self.url);
        runtime.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    info!(%url, "Abandoned video job deleted.");
                }
                Ok(response) => {
                    warn!(%url, status = %response.status(), "Could not delete abandoned video job.");
                }
                Err(e) => warn!(%url, "Could not delete abandoned video job: {}", e),
            }
        });
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that renders short 16:9 clips through the OpenAI Videos API.
#[derive(Clone)]
pub struct OpenAiVideoAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    poll_interval: Duration,
}

impl OpenAiVideoAdapter {
    /// Creates a new `OpenAiVideoAdapter`.
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        api_key: String,
        model: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
            poll_interval,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> PortResult<VideoJob> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| PortError::Service(e.to_string()))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| PortError::Service(e.to_string()))?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or(raw);
            return Err(PortError::Service(format!("Video API error ({status}): {message}")));
        }

        serde_json::from_str(&raw).map_err(|e| PortError::Malformed(e.to_string()))
    }

    async fn download(&self, url: &str) -> PortResult<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| PortError::Service(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = parse_error_message(&raw).unwrap_or(raw);
            return Err(PortError::Service(format!("Video download error ({status}): {message}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PortError::Service(e.to_string()))?;
        if bytes.is_empty() {
            return Err(PortError::Malformed("Video service returned no content.".to_string()));
        }
        Ok(bytes.to_vec())
    }

    /// Starts a job for `prompt`, waits for it and returns the clip as a
    /// `data:video/mp4` locator.
    pub async fn generate(&self, prompt: &str, cancel: &CancellationToken) -> PortResult<String> {
        let endpoint = videos_endpoint(&self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": video_prompt(prompt),
            "size": "1280x720",
        });

        let mut job = self.send(self.http.post(&endpoint).json(&body)).await?;
        info!(job = %job.id, "Video job created.");
        let job_url = format!("{}/{}", endpoint, job.id);
        let mut pending = PendingJob {
            http: self.http.clone(),
            url: job_url.clone(),
            api_key: self.api_key.clone(),
            settled: false,
        };

        loop {
            match job.status {
                JobStatus::Completed => {
                    info!(job = %job.id, "Video job completed.");
                    let clip = self.download(&format!("{}/content", job_url)).await?;
                    pending.settled = true;
                    return Ok(format!("data:video/mp4;base64,{}", STANDARD.encode(clip)));
                }
                JobStatus::Failed => {
                    pending.settled = true;
                    let message = job
                        .error
                        .map(|e| e.message)
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| "video generation failed".to_string());
                    return Err(PortError::Service(message));
                }
                JobStatus::Queued | JobStatus::InProgress | JobStatus::Unknown => {
                    debug!(job = %job.id, status = ?job.status, "Video job pending.");
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(job = %job.id, "Stopped polling cancelled video job.");
                    return Err(PortError::Cancelled);
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            job = self.send(self.http.get(&job_url)).await?;
        }
    }
}
