//! crates/script_engine_core/src/wire.rs
//!
//! The flat JSON record blocks travel as, both from the generation service and
//! in the JSON export, and its conversion to and from the typed [`Block`].

use serde::{Deserialize, Serialize};

use crate::domain::{
    Audience, Block, BlockBody, BlockId, BlockKind, Document, GeneratedAssets, QuizOption, Tone,
    Tooltip,
};
use crate::validation::{IssueKind, ValidationIssue};

/// A block as a loosely-typed record: a `type` string plus every optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltips: Option<Vec<Tooltip>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<QuizOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_video_url: Option<String>,
}

impl RawBlock {
    /// Converts into a typed block.
    ///
    /// Fails on an unknown `type`. Fields that do not belong to the declared
    /// variant are dropped and reported as warnings. `index` only locates the
    /// reported issues.
    pub fn into_block(
        self,
        index: Option<usize>,
    ) -> Result<(Block, Vec<ValidationIssue>), ValidationIssue> {
        let id = BlockId::new(self.id);
        let locate = |kind: IssueKind| {
            let issue = ValidationIssue::new(kind).on(&id);
            match index {
                Some(index) => issue.at(index),
                None => issue,
            }
        };

        let kind: BlockKind = self
            .kind
            .parse()
            .map_err(|found| locate(IssueKind::UnknownType { found }))?;

        let mut dropped = Vec::new();
        let mut drop_if = |present: bool, field: &'static str| {
            if present {
                dropped.push(locate(IssueKind::FieldDropped { field, kind }));
            }
        };

        let body = match kind {
            BlockKind::Theory | BlockKind::Media => {
                drop_if(self.options.is_some(), "options");
                drop_if(self.steps.is_some(), "steps");
                let visual_prompt = self.visual_prompt;
                if kind == BlockKind::Theory {
                    BlockBody::Theory { visual_prompt }
                } else {
                    BlockBody::Media { visual_prompt }
                }
            }
            BlockKind::Assessment => {
                drop_if(self.visual_prompt.is_some(), "visualPrompt");
                drop_if(self.steps.is_some(), "steps");
                BlockBody::Assessment {
                    options: self.options.unwrap_or_default(),
                }
            }
            BlockKind::Steps => {
                drop_if(self.visual_prompt.is_some(), "visualPrompt");
                drop_if(self.options.is_some(), "options");
                BlockBody::Steps {
                    steps: self.steps.unwrap_or_default(),
                }
            }
        };

        let block = Block {
            id,
            title: self.title,
            content: self.content,
            competency: self.competency,
            tooltips: self.tooltips.unwrap_or_default(),
            body,
            assets: GeneratedAssets {
                image_url: self.generated_image_url,
                audio_url: self.generated_audio_url,
                video_url: self.generated_video_url,
            },
        };
        Ok((block, dropped))
    }
}

impl TryFrom<RawBlock> for Block {
    type Error = ValidationIssue;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        raw.into_block(None).map(|(block, _)| block)
    }
}

impl From<Block> for RawBlock {
    fn from(block: Block) -> Self {
        let mut raw = RawBlock {
            id: block.id.to_string(),
            kind: block.kind().as_str().to_string(),
            title: block.title,
            content: block.content,
            competency: block.competency,
            tooltips: Some(block.tooltips).filter(|t| !t.is_empty()),
            generated_image_url: block.assets.image_url,
            generated_audio_url: block.assets.audio_url,
            generated_video_url: block.assets.video_url,
            ..Default::default()
        };
        match block.body {
            BlockBody::Theory { visual_prompt } | BlockBody::Media { visual_prompt } => {
                raw.visual_prompt = visual_prompt;
            }
            BlockBody::Assessment { options } => raw.options = Some(options),
            BlockBody::Steps { steps } => raw.steps = Some(steps),
        }
        raw
    }
}

//=========================================================================================
// Generated Scripts
//=========================================================================================

/// A full script as the generation service returns it. Audience and tone are
/// chosen by the caller and are not part of the generated payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawScript {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub blocks: Vec<RawBlock>,
}

/// A decoded document plus the warnings raised while decoding it.
#[derive(Debug, Clone)]
pub struct DecodedDocument {
    pub document: Document,
    pub warnings: Vec<ValidationIssue>,
}

/// Failure to turn service output into typed values.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid block: {0}")]
    Block(#[from] ValidationIssue),
}

impl RawScript {
    /// Gives every block with a blank id a fresh one from `next_id`.
    pub fn fill_missing_ids(&mut self, mut next_id: impl FnMut() -> String) {
        for block in &mut self.blocks {
            if block.id.trim().is_empty() {
                block.id = next_id();
            }
        }
    }

    pub fn decode(self, audience: Audience, tone: Tone) -> Result<DecodedDocument, WireError> {
        let mut warnings = Vec::new();
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for (index, raw) in self.blocks.into_iter().enumerate() {
            let (block, dropped) = raw.into_block(Some(index))?;
            warnings.extend(dropped);
            blocks.push(block);
        }
        let document = Document {
            title: self.title,
            description: self.description.filter(|d| !d.trim().is_empty()),
            audience,
            tone,
            blocks,
            usage: None,
        };
        Ok(DecodedDocument { document, warnings })
    }
}

/// Parses a full generated script.
pub fn decode_document(
    json: &str,
    audience: Audience,
    tone: Tone,
) -> Result<DecodedDocument, WireError> {
    let raw: RawScript = serde_json::from_str(json)?;
    raw.decode(audience, tone)
}

/// Parses one generated block.
pub fn decode_block(json: &str) -> Result<(Block, Vec<ValidationIssue>), WireError> {
    let raw: RawBlock = serde_json::from_str(json)?;
    Ok(raw.into_block(None)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn assessment_round_trips_in_the_flat_shape() {
        let value = json!({
            "id": "q1",
            "type": "assessment",
            "title": "Check",
            "content": "<p>Which one?</p>",
            "options": [
                { "text": "A", "isCorrect": true, "feedback": "Yes" },
                { "text": "B", "isCorrect": false, "feedback": "No" }
            ],
            "generatedAudioUrl": "data:audio/wav;base64,AAAA"
        });
        let block: Block = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(block.kind(), BlockKind::Assessment);
        assert_eq!(block.body.options().map(<[_]>::len), Some(2));
        assert_eq!(serde_json::to_value(&block).unwrap(), value);
    }

    #[test]
    fn foreign_fields_are_dropped_with_warnings() {
        let raw = RawBlock {
            id: "s".into(),
            kind: "steps".into(),
            steps: Some(vec!["one".into()]),
            options: Some(vec![QuizOption::default()]),
            visual_prompt: Some("a lab".into()),
            ..Default::default()
        };
        let (block, warnings) = raw.into_block(Some(3)).unwrap();

        assert_eq!(block.body, BlockBody::Steps { steps: vec!["one".into()] });
        let fields: Vec<_> = warnings
            .iter()
            .map(|w| match &w.kind {
                IssueKind::FieldDropped { field, .. } => *field,
                other => panic!("unexpected issue {other:?}"),
            })
            .collect();
        assert_eq!(fields, ["visualPrompt", "options"]);
        assert!(warnings.iter().all(|w| w.index == Some(3)));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = decode_block(r#"{"id":"x","type":"video","title":"","content":""}"#).unwrap_err();
        match err {
            WireError::Block(issue) => {
                assert_eq!(issue.kind, IssueKind::UnknownType { found: "video".into() })
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn script_decodes_with_caller_audience_and_tone() {
        let mut script: RawScript = serde_json::from_value(json!({
            "title": "Chemical waste",
            "description": "",
            "blocks": [
                { "type": "theory", "title": "Intro", "content": "..." },
                { "id": "b2", "type": "Media", "title": "Look", "content": "...", "visualPrompt": "drums" }
            ]
        }))
        .unwrap();
        let mut counter = 0;
        script.fill_missing_ids(|| {
            counter += 1;
            format!("gen-{counter}")
        });

        let decoded = script.decode(Audience::Executive, Tone::Gamified).unwrap();
        let doc = decoded.document;
        assert!(decoded.warnings.is_empty());
        assert_eq!(doc.audience, Audience::Executive);
        assert_eq!(doc.tone, Tone::Gamified);
        assert_eq!(doc.description, None);
        let ids: Vec<_> = doc.ids().map(BlockId::as_str).collect();
        assert_eq!(ids, ["gen-1", "b2"]);
        assert_eq!(doc.blocks[1].visual_prompt(), Some("drums"));
    }

    #[test]
    fn document_decoding_reports_dropped_fields() {
        let json = r#"{"title":"T","blocks":[{"id":"a","type":"theory","title":"","content":"","steps":["x"]}]}"#;
        let decoded = decode_document(json, Audience::Beginner, Tone::Academic).unwrap();
        assert_eq!(decoded.document.blocks.len(), 1);
        assert_eq!(decoded.warnings.len(), 1);
        assert!(!decoded.warnings[0].kind.is_error());
    }
}
