//! crates/script_engine_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core consumes.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! session independent of the AI provider and of where local state is kept.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{Audience, Block, Document, Language, Tone};
use crate::validation::ValidationIssue;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// Network, quota or provider failure.
    #[error("External service error: {0}")]
    Service(String),
    /// The service answered, but not with something usable.
    #[error("Malformed service response: {0}")]
    Malformed(String),
    #[error("Operation was cancelled")]
    Cancelled,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A freshly generated script together with what it cost to produce.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub document: Document,
    /// Issues found while decoding the service output (dropped fields).
    pub warnings: Vec<ValidationIssue>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The external AI service that produces and transforms scripts.
///
/// Implementations receive the caller's cancellation token and should stop
/// work early when it fires; callers still discard any result that arrives
/// after cancellation.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Segments raw source text into a complete script.
    async fn generate_document(
        &self,
        source_text: &str,
        audience: Audience,
        tone: Tone,
        language: Language,
        cancel: &CancellationToken,
    ) -> PortResult<GeneratedDocument>;

    /// Produces an improved block of the same type.
    async fn regenerate_block(
        &self,
        block: &Block,
        language: Language,
        cancel: &CancellationToken,
    ) -> PortResult<Block>;

    async fn rewrite_text(
        &self,
        text: &str,
        language: Language,
        cancel: &CancellationToken,
    ) -> PortResult<String>;

    /// Returns a formatted pedagogical audit of the whole script.
    async fn audit_document(
        &self,
        document: &Document,
        language: Language,
        cancel: &CancellationToken,
    ) -> PortResult<String>;

    async fn apply_audit_to_block(
        &self,
        block: &Block,
        report: &str,
        language: Language,
        cancel: &CancellationToken,
    ) -> PortResult<Block>;

    /// Returns a resource locator for the generated image.
    async fn synthesize_image(&self, prompt: &str, cancel: &CancellationToken)
        -> PortResult<String>;

    /// Returns a resource locator for the narrated audio.
    async fn synthesize_audio(
        &self,
        text: &str,
        language: Language,
        cancel: &CancellationToken,
    ) -> PortResult<String>;

    /// Returns a resource locator for the generated video.
    async fn synthesize_video(&self, prompt: &str, cancel: &CancellationToken)
        -> PortResult<String>;
}

/// Persists whether the onboarding screen has been shown.
#[async_trait]
pub trait OnboardingStore: Send + Sync {
    async fn has_seen(&self) -> PortResult<bool>;

    async fn mark_seen(&self) -> PortResult<()>;
}
