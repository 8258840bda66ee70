//! services/api/src/adapters/script_llm.rs
//!
//! This module contains the adapter for the script-writing LLM. It produces whole
//! scripts and single blocks as JSON constrained by a schema, and free text for
//! rewrites and audits.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use script_engine_core::{
    domain::{Audience, Block, Document, Language, Tone},
    ports::{GeneratedDocument, PortError, PortResult},
    validation::ValidationIssue,
    wire::{RawBlock, RawScript},
};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::service_error;

const DESIGNER_ROLE: &str = "You are an expert Instructional Designer who writes modular e-learning scripts. Block content is HTML-bearing prose.";

//=========================================================================================
// Response Schemas
//=========================================================================================

fn block_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "type": {
                "type": "string",
                "enum": ["theory", "assessment", "media", "steps"],
                "description": "MUST BE strictly one of: theory, assessment, media, steps"
            },
            "title": { "type": "string" },
            "content": { "type": "string" },
            "competency": { "type": "string" },
            "tooltips": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "term": { "type": "string" },
                        "definition": { "type": "string" }
                    }
                }
            },
            "options": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "text": { "type": "string" },
                        "isCorrect": { "type": "boolean" },
                        "feedback": { "type": "string" }
                    }
                }
            },
            "visualPrompt": { "type": "string" },
            "steps": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["id", "type", "title", "content"]
    })
}

fn script_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string" },
            "description": { "type": "string" },
            "blocks": { "type": "array", "items": block_schema() }
        },
        "required": ["title", "description", "blocks"]
    })
}

//=========================================================================================
// Prompts
//=========================================================================================

pub(crate) fn script_prompt(
    source_text: &str,
    audience: Audience,
    tone: Tone,
    language: Language,
) -> String {
    format!(
        "Transform the content into modular blocks using Atomic Design.\n\
         IMPORTANT: Use ONLY the following block types: theory, assessment, media, steps.\n\
         Language: {}.\nTone: {}.\nAudience: {}.\nRAW CONTENT: {}",
        language.display_name(),
        tone,
        audience,
        source_text
    )
}

fn regenerate_prompt(block_json: &str, language: Language) -> String {
    format!(
        "Regenerate the following e-learning block to improve its clarity, engagement, and pedagogical value.\n\
         Maintain the same block type and core topic but refine the content and structure.\n\
         BLOCK TO REGENERATE: {}\nLanguage: {}.",
        block_json,
        language.display_name()
    )
}

fn apply_audit_prompt(block_json: &str, report: &str, language: Language) -> String {
    format!(
        "Improve this specific block based on the pedagogical audit provided.\n\
         Prioritize fixing items marked as 'Critical' (🔴) and 'Improvements' (🟡).\n\
         BLOCK TO IMPROVE: {}\nFULL AUDIT CONTEXT: {}\nLanguage: {}.\n\
         Return the IMPROVED block in JSON format following the original schema.",
        block_json,
        report,
        language.display_name()
    )
}

fn rewrite_prompt(text: &str, language: Language) -> String {
    format!(
        "Rewrite the following e-learning content to be more engaging, clear, and professional.\n\
         Language: {}.\nTEXT: {}\nReturn ONLY the rewritten text, no commentary.",
        language.display_name(),
        text
    )
}

fn audit_prompt(script_json: &str, language: Language) -> String {
    format!(
        "Audit this e-learning script from a pedagogical perspective.\n\
         Analyze: Learning objectives, cognitive load, assessment validity, and tone consistency.\n\
         Language: {}.\nSCRIPT: {}\n\
         Format the response in clean Markdown with sections: 🔴 Critical, 🟡 Improvements, 🟢 Strengths.",
        language.display_name(),
        script_json
    )
}

//=========================================================================================
// Response Parsing
//=========================================================================================

/// Decodes a generated script, giving every block without an id a fresh UUID.
pub(crate) fn parse_script(
    json: &str,
    audience: Audience,
    tone: Tone,
) -> PortResult<(Document, Vec<ValidationIssue>)> {
    let mut raw: RawScript = serde_json::from_str(json)
        .map_err(|e| PortError::Malformed(format!("script is not valid JSON: {}", e)))?;
    raw.fill_missing_ids(|| Uuid::new_v4().to_string());
    let decoded = raw
        .decode(audience, tone)
        .map_err(|e| PortError::Malformed(e.to_string()))?;
    Ok((decoded.document, decoded.warnings))
}

pub(crate) fn parse_block(json: &str) -> PortResult<Block> {
    let raw: RawBlock = serde_json::from_str(json)
        .map_err(|e| PortError::Malformed(format!("block is not valid JSON: {}", e)))?;
    let (block, dropped) = raw
        .into_block(None)
        .map_err(|e| PortError::Malformed(e.to_string()))?;
    for issue in dropped {
        debug!("Generated block: {}", issue);
    }
    Ok(block)
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

struct Completion {
    text: String,
    input_tokens: u64,
    output_tokens: u64,
}

/// An adapter that writes and reviews scripts using an OpenAI-compatible chat model.
#[derive(Clone)]
pub struct OpenAiScriptAdapter {
    client: Client<OpenAIConfig>,
    script_model: String,
    audit_model: String,
}

impl OpenAiScriptAdapter {
    /// Creates a new `OpenAiScriptAdapter`. Audits run on `audit_model`.
    pub fn new(client: Client<OpenAIConfig>, script_model: String, audit_model: String) -> Self {
        Self {
            client,
            script_model,
            audit_model,
        }
    }

    async fn complete(
        &self,
        model: &str,
        prompt: String,
        schema: Option<(&str, Value)>,
    ) -> PortResult<Completion> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(DESIGNER_ROLE)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(model).messages(messages).n(1);
        if let Some((name, schema)) = schema {
            request.response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    name: name.to_string(),
                    description: None,
                    schema: Some(schema),
                    strict: Some(false),
                },
            });
        }
        let request = request
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| service_error(e))?;

        let (input_tokens, output_tokens) = response
            .usage
            .as_ref()
            .map(|usage| (u64::from(usage.prompt_tokens), u64::from(usage.completion_tokens)))
            .unwrap_or_default();

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Malformed("LLM returned no text content in its response.".to_string())
            })?;

        Ok(Completion {
            text,
            input_tokens,
            output_tokens,
        })
    }

    pub async fn generate(
        &self,
        source_text: &str,
        audience: Audience,
        tone: Tone,
        language: Language,
    ) -> PortResult<GeneratedDocument> {
        let completion = self
            .complete(
                &self.script_model,
                script_prompt(source_text, audience, tone, language),
                Some(("elearning_script", script_schema())),
            )
            .await?;
        let (document, warnings) = parse_script(&completion.text, audience, tone)?;
        if !warnings.is_empty() {
            warn!("Generated script had {} dropped field(s).", warnings.len());
        }
        Ok(GeneratedDocument {
            document,
            warnings,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
        })
    }

    pub async fn regenerate(&self, block: &Block, language: Language) -> PortResult<Block> {
        let block_json = to_json(block)?;
        let completion = self
            .complete(
                &self.script_model,
                regenerate_prompt(&block_json, language),
                Some(("elearning_block", block_schema())),
            )
            .await?;
        parse_block(&completion.text)
    }

    pub async fn apply_audit(
        &self,
        block: &Block,
        report: &str,
        language: Language,
    ) -> PortResult<Block> {
        let block_json = to_json(block)?;
        let completion = self
            .complete(
                &self.script_model,
                apply_audit_prompt(&block_json, report, language),
                Some(("elearning_block", block_schema())),
            )
            .await?;
        parse_block(&completion.text)
    }

    /// Falls back to the input when the model answers with nothing.
    pub async fn rewrite(&self, text: &str, language: Language) -> PortResult<String> {
        let completion = self
            .complete(&self.script_model, rewrite_prompt(text, language), None)
            .await?;
        let rewritten = completion.text.trim();
        if rewritten.is_empty() {
            Ok(text.to_string())
        } else {
            Ok(rewritten.to_string())
        }
    }

    pub async fn audit(&self, document: &Document, language: Language) -> PortResult<String> {
        let script_json = to_json(document)?;
        let completion = self
            .complete(&self.audit_model, audit_prompt(&script_json, language), None)
            .await?;
        Ok(completion.text)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> PortResult<String> {
    serde_json::to_string(value).map_err(|e| PortError::Unexpected(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use script_engine_core::domain::BlockKind;

    #[test]
    fn script_prompt_names_language_tone_and_audience() {
        let prompt = script_prompt("Acids first.", Audience::Technical, Tone::Gamified, Language::Es);
        assert!(prompt.contains("Language: Spanish."));
        assert!(prompt.contains("Tone: Gamified."));
        assert!(prompt.contains("Audience: Technical."));
        assert!(prompt.ends_with("RAW CONTENT: Acids first."));
    }

    #[test]
    fn parsed_scripts_get_ids_for_blocks_without_one() {
        let json = r#"{
            "title": "Waste",
            "description": "Handling lab waste",
            "blocks": [
                { "id": "", "type": "theory", "title": "Intro", "content": "<p>Hi</p>" },
                { "id": "b2", "type": "steps", "title": "Do", "content": "", "steps": ["Seal"] }
            ]
        }"#;
        let (document, warnings) = parse_script(json, Audience::Beginner, Tone::Academic).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(document.blocks.len(), 2);
        assert!(Uuid::parse_str(document.blocks[0].id.as_str()).is_ok());
        assert_eq!(document.blocks[1].id.as_str(), "b2");
        assert_eq!(document.tone, Tone::Academic);
    }

    #[test]
    fn unknown_block_types_make_the_response_malformed() {
        let json = r#"{"title":"","description":"","blocks":[{"id":"a","type":"quiz","title":"","content":""}]}"#;
        let err = parse_script(json, Audience::Beginner, Tone::Academic).unwrap_err();
        assert!(matches!(err, PortError::Malformed(_)));

        assert!(matches!(parse_block("not json"), Err(PortError::Malformed(_))));
    }

    #[test]
    fn parsed_block_keeps_its_variant() {
        let block = parse_block(
            r#"{"id":"m","type":"media","title":"Look","content":"","visualPrompt":"a drum"}"#,
        )
        .unwrap();
        assert_eq!(block.kind(), BlockKind::Media);
        assert_eq!(block.visual_prompt(), Some("a drum"));
    }
}
