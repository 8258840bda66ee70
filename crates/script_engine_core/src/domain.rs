//! crates/script_engine_core/src/domain.rs
//!
//! Defines the script document model: the document, its typed blocks, and the
//! enumerations and counters that travel with it.
//! These structs carry no behaviour beyond in-place structural edits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::wire::RawBlock;

//=========================================================================================
// Identifiers and Enumerations
//=========================================================================================

/// Opaque identifier of a block, unique within its document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the id is empty or whitespace only, which makes it unaddressable.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The reader the script is written for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Audience {
    #[default]
    Beginner,
    Technical,
    Executive,
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Audience::Beginner => "Beginner",
            Audience::Technical => "Technical",
            Audience::Executive => "Executive",
        };
        f.write_str(name)
    }
}

/// The narrative register of the script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tone {
    Academic,
    #[default]
    Corporate,
    Narrative,
    Gamified,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tone::Academic => "Academic",
            Tone::Corporate => "Corporate",
            Tone::Narrative => "Narrative",
            Tone::Gamified => "Gamified",
        };
        f.write_str(name)
    }
}

/// Output language for generated text and narration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
}

impl Language {
    /// The English name of the language, as it is spelled out in prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Es => "Spanish",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
        }
    }
}

/// Direction of a single-step reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// The four block variants, without their payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Theory,
    Assessment,
    Media,
    Steps,
}

impl BlockKind {
    pub const ALL: [BlockKind; 4] = [
        BlockKind::Theory,
        BlockKind::Assessment,
        BlockKind::Media,
        BlockKind::Steps,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Theory => "theory",
            BlockKind::Assessment => "assessment",
            BlockKind::Media => "media",
            BlockKind::Steps => "steps",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        BlockKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| s.to_string())
    }
}

/// Kinds of generated assets tracked by the usage counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Audio,
    Video,
}

//=========================================================================================
// Block
//=========================================================================================

/// A glossary term annotated inline in a block's content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tooltip {
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub definition: String,
}

/// One answer of an assessment block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub feedback: String,
}

/// The variant-specific payload of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockBody {
    Theory { visual_prompt: Option<String> },
    Assessment { options: Vec<QuizOption> },
    Media { visual_prompt: Option<String> },
    Steps { steps: Vec<String> },
}

impl BlockBody {
    /// An empty payload of the given kind.
    pub fn empty(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Theory => BlockBody::Theory { visual_prompt: None },
            BlockKind::Assessment => BlockBody::Assessment { options: Vec::new() },
            BlockKind::Media => BlockBody::Media { visual_prompt: None },
            BlockKind::Steps => BlockBody::Steps { steps: Vec::new() },
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            BlockBody::Theory { .. } => BlockKind::Theory,
            BlockBody::Assessment { .. } => BlockKind::Assessment,
            BlockBody::Media { .. } => BlockKind::Media,
            BlockBody::Steps { .. } => BlockKind::Steps,
        }
    }

    pub fn visual_prompt(&self) -> Option<&str> {
        match self {
            BlockBody::Theory { visual_prompt } | BlockBody::Media { visual_prompt } => {
                visual_prompt.as_deref()
            }
            _ => None,
        }
    }

    pub fn options(&self) -> Option<&[QuizOption]> {
        match self {
            BlockBody::Assessment { options } => Some(options),
            _ => None,
        }
    }

    pub fn steps(&self) -> Option<&[String]> {
        match self {
            BlockBody::Steps { steps } => Some(steps),
            _ => None,
        }
    }
}

/// Resource locators produced by earlier synthesis calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedAssets {
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
}

/// The visual a block shows; video wins over image when both exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMedia<'a> {
    Video(&'a str),
    Image(&'a str),
}

impl GeneratedAssets {
    pub fn display_media(&self) -> Option<DisplayMedia<'_>> {
        match (&self.video_url, &self.image_url) {
            (Some(video), _) => Some(DisplayMedia::Video(video)),
            (None, Some(image)) => Some(DisplayMedia::Image(image)),
            (None, None) => None,
        }
    }

    /// Fills every locator missing here from `previous`.
    pub fn inherit_missing(&mut self, previous: &GeneratedAssets) {
        if self.image_url.is_none() {
            self.image_url.clone_from(&previous.image_url);
        }
        if self.audio_url.is_none() {
            self.audio_url.clone_from(&previous.audio_url);
        }
        if self.video_url.is_none() {
            self.video_url.clone_from(&previous.video_url);
        }
    }
}

/// One pedagogical unit of a script.
///
/// On the wire a block is the flat record described by [`RawBlock`]; the typed
/// form keeps variant fields inside [`BlockBody`] so an assessment can never
/// carry steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock", into = "RawBlock")]
pub struct Block {
    pub id: BlockId,
    pub title: String,
    pub content: String,
    pub competency: Option<String>,
    pub tooltips: Vec<Tooltip>,
    pub body: BlockBody,
    pub assets: GeneratedAssets,
}

impl Block {
    pub fn new(
        id: impl Into<BlockId>,
        title: impl Into<String>,
        content: impl Into<String>,
        body: BlockBody,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            competency: None,
            tooltips: Vec::new(),
            body,
            assets: GeneratedAssets::default(),
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.body.kind()
    }

    pub fn visual_prompt(&self) -> Option<&str> {
        self.body.visual_prompt()
    }
}

//=========================================================================================
// Usage Stats
//=========================================================================================

/// Monotonic counters of external-service consumption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub images_generated: u64,
    pub audio_chars_generated: u64,
    pub videos_generated: u64,
}

impl UsageStats {
    pub fn record_tokens(&mut self, input: u64, output: u64) {
        self.input_tokens = self.input_tokens.saturating_add(input);
        self.output_tokens = self.output_tokens.saturating_add(output);
    }

    /// Counts one generated asset. `amount` is the narrated character count for
    /// audio and is ignored for images and videos, which count one per call.
    pub fn record_asset(&mut self, kind: AssetKind, amount: u64) {
        match kind {
            AssetKind::Image => self.images_generated = self.images_generated.saturating_add(1),
            AssetKind::Video => self.videos_generated = self.videos_generated.saturating_add(1),
            AssetKind::Audio => {
                self.audio_chars_generated = self.audio_chars_generated.saturating_add(amount)
            }
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

//=========================================================================================
// Document
//=========================================================================================

/// The full e-learning script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageStats>,
}

impl Default for Document {
    fn default() -> Self {
        Self::placeholder(Audience::default(), Tone::default())
    }
}

impl Document {
    /// An untitled document with no blocks.
    pub fn placeholder(audience: Audience, tone: Tone) -> Self {
        Self {
            title: String::new(),
            description: None,
            audience,
            tone,
            blocks: Vec::new(),
            usage: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn position(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|block| &block.id == id)
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|block| &block.id == id)
    }

    pub fn block_mut(&mut self, id: &BlockId) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|block| &block.id == id)
    }

    /// Removes the block with `id`, returning it if it was present.
    pub fn remove_block(&mut self, id: &BlockId) -> Option<Block> {
        let index = self.position(id)?;
        Some(self.blocks.remove(index))
    }

    /// Swaps the block with its neighbour in `direction`.
    ///
    /// Returns false, leaving the order untouched, when the block is absent or
    /// already at the boundary it is moving towards.
    pub fn reorder_block(&mut self, id: &BlockId, direction: Direction) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let target = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => Some(index + 1).filter(|&t| t < self.blocks.len()),
        };
        match target {
            Some(target) => {
                self.blocks.swap(index, target);
                true
            }
            None => false,
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &BlockId> {
        self.blocks.iter().map(|block| &block.id)
    }
}
