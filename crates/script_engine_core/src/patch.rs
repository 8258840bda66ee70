//! crates/script_engine_core/src/patch.rs
//!
//! Partial updates for blocks and document metadata.

use serde::{Deserialize, Deserializer};

use crate::domain::{
    Audience, Block, BlockBody, BlockId, BlockKind, Document, QuizOption, Tone, Tooltip,
};

/// Why a patch could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("Field '{0}' is immutable")]
    ImmutableField(&'static str),
    #[error("Field '{field}' does not apply to a {kind} block")]
    FieldNotApplicable { field: &'static str, kind: BlockKind },
}

/// Maps a present JSON value, including `null`, to `Some`, so an absent field
/// (`None`) can be told apart from an explicit clear (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A partial block update. Absent fields are left untouched.
///
/// `id` and `type` are accepted only when they repeat the block's current
/// value; any other value rejects the whole patch.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BlockPatch {
    pub id: Option<BlockId>,
    #[serde(rename = "type")]
    pub kind: Option<BlockKind>,
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub competency: Option<Option<String>>,
    pub tooltips: Option<Vec<Tooltip>>,
    #[serde(default, deserialize_with = "nullable")]
    pub visual_prompt: Option<Option<String>>,
    pub options: Option<Vec<QuizOption>>,
    pub steps: Option<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub generated_image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub generated_audio_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub generated_video_url: Option<Option<String>>,
}

impl BlockPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Checks the patch against `block` without modifying anything.
    pub fn check(&self, block: &Block) -> Result<(), PatchError> {
        if self.id.as_ref().is_some_and(|id| id != &block.id) {
            return Err(PatchError::ImmutableField("id"));
        }
        if self.kind.is_some_and(|kind| kind != block.kind()) {
            return Err(PatchError::ImmutableField("type"));
        }

        let kind = block.kind();
        let not_applicable = |field| PatchError::FieldNotApplicable { field, kind };
        if self.visual_prompt.is_some() && !matches!(kind, BlockKind::Theory | BlockKind::Media) {
            return Err(not_applicable("visualPrompt"));
        }
        if self.options.is_some() && kind != BlockKind::Assessment {
            return Err(not_applicable("options"));
        }
        if self.steps.is_some() && kind != BlockKind::Steps {
            return Err(not_applicable("steps"));
        }
        Ok(())
    }

    /// Applies the patch to `block`. Nothing is modified when it fails.
    pub fn apply(self, block: &mut Block) -> Result<(), PatchError> {
        self.check(block)?;

        if let Some(title) = self.title {
            block.title = title;
        }
        if let Some(content) = self.content {
            block.content = content;
        }
        if let Some(competency) = self.competency {
            block.competency = competency;
        }
        if let Some(tooltips) = self.tooltips {
            block.tooltips = tooltips;
        }
        match &mut block.body {
            BlockBody::Theory { visual_prompt } | BlockBody::Media { visual_prompt } => {
                if let Some(prompt) = self.visual_prompt {
                    *visual_prompt = prompt;
                }
            }
            BlockBody::Assessment { options } => {
                if let Some(new_options) = self.options {
                    *options = new_options;
                }
            }
            BlockBody::Steps { steps } => {
                if let Some(new_steps) = self.steps {
                    *steps = new_steps;
                }
            }
        }
        if let Some(url) = self.generated_image_url {
            block.assets.image_url = url;
        }
        if let Some(url) = self.generated_audio_url {
            block.assets.audio_url = url;
        }
        if let Some(url) = self.generated_video_url {
            block.assets.video_url = url;
        }
        Ok(())
    }
}

/// A partial update of the document's metadata. Never touches blocks.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DocumentMetaPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub audience: Option<Audience>,
    pub tone: Option<Tone>,
}

impl DocumentMetaPatch {
    pub fn apply(self, document: &mut Document) {
        if let Some(title) = self.title {
            document.title = title;
        }
        if let Some(description) = self.description {
            document.description = description;
        }
        if let Some(audience) = self.audience {
            document.audience = audience;
        }
        if let Some(tone) = self.tone {
            document.tone = tone;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn theory() -> Block {
        let mut block = Block::new(
            "t1",
            "Intro",
            "Old",
            BlockBody::Theory {
                visual_prompt: Some("lab".into()),
            },
        );
        block.competency = Some("safety".into());
        block
    }

    #[test]
    fn absent_fields_are_untouched_and_null_clears() {
        let patch: BlockPatch =
            serde_json::from_value(json!({ "content": "New", "competency": null })).unwrap();
        let mut block = theory();
        patch.apply(&mut block).unwrap();

        assert_eq!(block.content, "New");
        assert_eq!(block.title, "Intro");
        assert_eq!(block.competency, None);
        assert_eq!(block.visual_prompt(), Some("lab"));
    }

    #[test]
    fn differing_id_or_type_rejects_the_whole_patch() {
        let mut block = theory();
        let before = block.clone();

        let patch: BlockPatch =
            serde_json::from_value(json!({ "id": "other", "title": "Changed" })).unwrap();
        assert_eq!(patch.apply(&mut block), Err(PatchError::ImmutableField("id")));

        let patch: BlockPatch =
            serde_json::from_value(json!({ "type": "steps", "title": "Changed" })).unwrap();
        assert_eq!(patch.apply(&mut block), Err(PatchError::ImmutableField("type")));

        assert_eq!(block, before);
    }

    #[test]
    fn repeating_current_id_and_type_is_accepted() {
        let mut block = theory();
        let patch: BlockPatch =
            serde_json::from_value(json!({ "id": "t1", "type": "theory", "title": "Same" }))
                .unwrap();
        patch.apply(&mut block).unwrap();
        assert_eq!(block.title, "Same");
    }

    #[test]
    fn variant_fields_must_match_the_block() {
        let mut block = theory();
        let patch = BlockPatch {
            steps: Some(vec!["first".into()]),
            ..Default::default()
        };
        assert_eq!(
            patch.apply(&mut block),
            Err(PatchError::FieldNotApplicable {
                field: "steps",
                kind: BlockKind::Theory
            })
        );
    }

    #[test]
    fn meta_patch_leaves_blocks_alone() {
        let mut document = Document::default();
        document.blocks.push(theory());
        let patch: DocumentMetaPatch =
            serde_json::from_value(json!({ "title": "Waste", "tone": "Narrative" })).unwrap();
        patch.apply(&mut document);

        assert_eq!(document.title, "Waste");
        assert_eq!(document.tone, Tone::Narrative);
        assert_eq!(document.blocks, vec![theory()]);
    }
}
