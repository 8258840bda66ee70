//! services/api/src/adapters/gateway.rs
//!
//! Composes the OpenAI-backed adapters into the single `GenerationGateway` the
//! editing session talks to.

use async_trait::async_trait;
use script_engine_core::{
    domain::{Audience, Block, Document, Language, Tone},
    ports::{GeneratedDocument, GenerationGateway, PortResult},
};
use tokio_util::sync::CancellationToken;

use super::{
    cancellable, OpenAiImageAdapter, OpenAiScriptAdapter, OpenAiTtsAdapter, OpenAiVideoAdapter,
};

/// An adapter that implements the `GenerationGateway` port on top of OpenAI.
#[derive(Clone)]
pub struct OpenAiGateway {
    script: OpenAiScriptAdapter,
    image: OpenAiImageAdapter,
    tts: OpenAiTtsAdapter,
    video: OpenAiVideoAdapter,
}

impl OpenAiGateway {
    pub fn new(
        script: OpenAiScriptAdapter,
        image: OpenAiImageAdapter,
        tts: OpenAiTtsAdapter,
        video: OpenAiVideoAdapter,
    ) -> Self {
        Self {
            script,
            image,
            tts,
            video,
        }
    }
}

#[async_trait]
impl GenerationGateway for OpenAiGateway {
    async fn generate_document(
        &self,
        source_text: &str,
        audience: Audience,
        tone: Tone,
        language: Language,
        cancel: &CancellationToken,
    ) -> PortResult<GeneratedDocument> {
        cancellable(
            cancel,
            self.script.generate(source_text, audience, tone, language),
        )
        .await
    }

    async fn regenerate_block(
        &self,
        block: &Block,
        language: Language,
        cancel: &CancellationToken,
    ) -> PortResult<Block> {
        cancellable(cancel, self.script.regenerate(block, language)).await
    }

    async fn rewrite_text(
        &self,
        text: &str,
        language: Language,
        cancel: &CancellationToken,
    ) -> PortResult<String> {
        cancellable(cancel, self.script.rewrite(text, language)).await
    }

    async fn audit_document(
        &self,
        document: &Document,
        language: Language,
        cancel: &CancellationToken,
    ) -> PortResult<String> {
        cancellable(cancel, self.script.audit(document, language)).await
    }

    async fn apply_audit_to_block(
        &self,
        block: &Block,
        report: &str,
        language: Language,
        cancel: &CancellationToken,
    ) -> PortResult<Block> {
        cancellable(cancel, self.script.apply_audit(block, report, language)).await
    }

    async fn synthesize_image(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> PortResult<String> {
        cancellable(cancel, self.image.generate(prompt)).await
    }

    async fn synthesize_audio(
        &self,
        text: &str,
        language: Language,
        cancel: &CancellationToken,
    ) -> PortResult<String> {
        cancellable(cancel, self.tts.narrate(text, language)).await
    }

    async fn synthesize_video(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> PortResult<String> {
        // Polling observes the token itself between status checks.
        cancellable(cancel, self.video.generate(prompt, cancel)).await
    }
}
