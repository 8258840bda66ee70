//! services/api/src/web/protocol.rs
//!
//! Request and response payloads of the REST API.
//!
//! Documents and blocks travel in their exported JSON shape, so the OpenAPI
//! schema describes them as plain objects.

use script_engine_core::{
    domain::{Audience, Block, Direction, Document, Language, Tone, UsageStats},
    validation::ValidationReport,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// Requests
//=========================================================================================

/// Source material and options for a new script.
#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub source_text: String,
    #[serde(default)]
    #[schema(value_type = String, example = "Beginner")]
    pub audience: Audience,
    #[serde(default)]
    #[schema(value_type = String, example = "Corporate")]
    pub tone: Tone,
    #[serde(default)]
    #[schema(value_type = String, example = "en")]
    pub language: Language,
}

/// Where to move a block.
#[derive(Deserialize, Debug, ToSchema)]
pub struct MoveRequest {
    #[schema(value_type = String, example = "up")]
    pub direction: Direction,
}

/// Output language for operations that produce text or narration.
#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LanguageParams {
    /// `en` (default) or `es`.
    #[param(value_type = Option<String>)]
    pub language: Option<Language>,
}

impl LanguageParams {
    pub fn language(&self) -> Language {
        self.language.unwrap_or_default()
    }
}

//=========================================================================================
// Responses
//=========================================================================================

/// The current script and what is running against it.
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScriptView {
    #[schema(value_type = Object)]
    pub document: Document,
    pub generating: bool,
    /// Block id to the operation running on it.
    pub block_operations: BTreeMap<String, String>,
}

/// A freshly generated script and the warnings found in it.
#[derive(Serialize, Debug, ToSchema)]
pub struct GeneratedView {
    #[schema(value_type = Object)]
    pub document: Document,
    #[schema(value_type = Object)]
    pub report: ValidationReport,
}

/// The result of a block-level operation.
#[derive(Serialize, Debug, ToSchema)]
pub struct BlockView {
    #[schema(value_type = Object)]
    pub block: Block,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct CancelView {
    pub cancelled: bool,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ChangedView {
    /// False when the operation had nothing to do.
    pub changed: bool,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct AuditView {
    pub report: Option<String>,
}

/// Usage counters and what they are estimated to cost.
#[derive(Serialize, Debug, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageView {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub images_generated: u64,
    pub audio_chars_generated: u64,
    pub videos_generated: u64,
    /// USD, rounded to four decimals.
    pub estimated_cost: f64,
}

impl UsageView {
    pub fn new(usage: UsageStats, estimated_cost: f64) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens(),
            images_generated: usage.images_generated,
            audio_chars_generated: usage.audio_chars_generated,
            videos_generated: usage.videos_generated,
            estimated_cost: (estimated_cost * 10_000.0).round() / 10_000.0,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct OnboardingView {
    pub seen: bool,
}
