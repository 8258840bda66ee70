//! In-memory gateway and fixtures shared by the unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::domain::{Audience, Block, BlockBody, BlockKind, Document, Language, Tone};
use crate::ports::{GeneratedDocument, GenerationGateway, PortError, PortResult};

pub(crate) fn block(id: &str, kind: BlockKind) -> Block {
    Block::new(
        id,
        format!("Title {id}"),
        format!("content of {id}"),
        BlockBody::empty(kind),
    )
}

pub(crate) fn document(ids: &[&str]) -> Document {
    let mut document = Document::placeholder(Audience::Beginner, Tone::Corporate);
    document.title = "Generated".into();
    document.blocks = ids.iter().map(|id| block(id, BlockKind::Theory)).collect();
    document
}

/// A gateway that answers from fixed data and can hold responses back.
pub(crate) struct ScriptedGateway {
    document: Document,
    reply: Option<Block>,
    gate: Option<Arc<Notify>>,
    block_gate: Option<Arc<Notify>>,
    audit_gate: Option<Arc<Notify>>,
    fail_generation: AtomicBool,
    fail_media: AtomicBool,
    pub generate_calls: AtomicUsize,
    pub block_calls: AtomicUsize,
    pub media_calls: AtomicUsize,
    pub audit_calls: AtomicUsize,
    pub audits: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            reply: None,
            gate: None,
            block_gate: None,
            audit_gate: None,
            fail_generation: AtomicBool::new(false),
            fail_media: AtomicBool::new(false),
            generate_calls: AtomicUsize::new(0),
            block_calls: AtomicUsize::new(0),
            media_calls: AtomicUsize::new(0),
            audit_calls: AtomicUsize::new(0),
            audits: Mutex::new(Vec::new()),
        }
    }

    /// Regeneration and audit application answer with `reply` instead of echoing.
    pub fn replying(mut self, reply: Block) -> Self {
        self.reply = Some(reply);
        self
    }

    /// Full generation waits for `gate` before answering.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Block regeneration waits for `gate` before answering.
    pub fn gated_blocks(mut self, gate: Arc<Notify>) -> Self {
        self.block_gate = Some(gate);
        self
    }

    /// Audits wait for `gate` before answering.
    pub fn gated_audits(mut self, gate: Arc<Notify>) -> Self {
        self.audit_gate = Some(gate);
        self
    }

    pub fn fail_generation(&self) {
        self.fail_generation.store(true, Ordering::SeqCst);
    }

    pub fn fail_media(&self) {
        self.fail_media.store(true, Ordering::SeqCst);
    }

    fn block_reply(&self, block: &Block) -> Block {
        self.reply.clone().unwrap_or_else(|| block.clone())
    }

    fn media(&self, locator: String) -> PortResult<String> {
        self.media_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(PortError::Service("quota exceeded".into()));
        }
        Ok(locator)
    }
}

#[async_trait]
impl GenerationGateway for ScriptedGateway {
    async fn generate_document(
        &self,
        _source_text: &str,
        _audience: Audience,
        _tone: Tone,
        _language: Language,
        _cancel: &CancellationToken,
    ) -> PortResult<GeneratedDocument> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_generation.load(Ordering::SeqCst) {
            return Err(PortError::Service("network unreachable".into()));
        }
        Ok(GeneratedDocument {
            document: self.document.clone(),
            warnings: Vec::new(),
            input_tokens: 100,
            output_tokens: 50,
        })
    }

    async fn regenerate_block(
        &self,
        block: &Block,
        _language: Language,
        _cancel: &CancellationToken,
    ) -> PortResult<Block> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.block_gate {
            gate.notified().await;
        }
        Ok(self.block_reply(block))
    }

    async fn rewrite_text(
        &self,
        text: &str,
        _language: Language,
        _cancel: &CancellationToken,
    ) -> PortResult<String> {
        Ok(format!("rewritten: {text}"))
    }

    async fn audit_document(
        &self,
        document: &Document,
        _language: Language,
        _cancel: &CancellationToken,
    ) -> PortResult<String> {
        self.audit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.audit_gate {
            gate.notified().await;
        }
        let report = format!("🔴 Critical\n- {} blocks reviewed", document.blocks.len());
        if let Ok(mut audits) = self.audits.lock() {
            audits.push(report.clone());
        }
        Ok(report)
    }

    async fn apply_audit_to_block(
        &self,
        block: &Block,
        _report: &str,
        _language: Language,
        _cancel: &CancellationToken,
    ) -> PortResult<Block> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.block_reply(block))
    }

    async fn synthesize_image(
        &self,
        prompt: &str,
        _cancel: &CancellationToken,
    ) -> PortResult<String> {
        self.media(format!("image:{prompt}"))
    }

    async fn synthesize_audio(
        &self,
        text: &str,
        language: Language,
        _cancel: &CancellationToken,
    ) -> PortResult<String> {
        self.media(format!("audio:{}:{text}", language.code()))
    }

    async fn synthesize_video(
        &self,
        prompt: &str,
        _cancel: &CancellationToken,
    ) -> PortResult<String> {
        self.media(format!("video:{prompt}"))
    }
}
