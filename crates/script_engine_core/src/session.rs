//! crates/script_engine_core/src/session.rs
//!
//! The editing session: the single in-memory owner of the live script.
//!
//! State lives behind one mutex that is only ever held for synchronous
//! sections, never across a gateway call. Every gateway result is checked
//! against its cancellation token and against the document epoch (bumped on
//! each wholesale replacement) before it is committed.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cost::{estimate_cost, RateTable};
use crate::domain::{
    AssetKind, Audience, Block, BlockId, Direction, Document, Language, Tone, UsageStats,
};
use crate::error::{BusyReason, SessionError, SessionResult};
use crate::patch::{BlockPatch, DocumentMetaPatch};
use crate::ports::{GenerationGateway, PortResult};
use crate::validation::{self, IssueKind, ValidationIssue, ValidationReport};

/// The kinds of gateway work that can be in flight for a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockOperation {
    Regenerate,
    Rewrite,
    ApplyAudit,
    Image,
    Audio,
    Video,
}

impl fmt::Display for BlockOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockOperation::Regenerate => "regenerate",
            BlockOperation::Rewrite => "rewrite",
            BlockOperation::ApplyAudit => "apply_audit",
            BlockOperation::Image => "image",
            BlockOperation::Audio => "audio",
            BlockOperation::Video => "video",
        };
        f.write_str(name)
    }
}

/// A successfully generated script and the findings that came with it.
#[derive(Debug, Clone)]
pub struct Generated {
    pub document: Document,
    pub report: ValidationReport,
}

//=========================================================================================
// Session State
//=========================================================================================

struct InFlight {
    ticket: u64,
    token: CancellationToken,
}

struct BlockInFlight {
    ticket: u64,
    token: CancellationToken,
    operation: BlockOperation,
}

struct SessionState {
    document: Document,
    epoch: u64,
    next_ticket: u64,
    usage: UsageStats,
    generation: Option<InFlight>,
    audit: Option<InFlight>,
    block_ops: HashMap<BlockId, BlockInFlight>,
    audit_report: Option<String>,
}

impl SessionState {
    fn ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }
}

/// The single owner of the current document and its mutation operations.
pub struct EditingSession {
    gateway: Arc<dyn GenerationGateway>,
    state: Mutex<SessionState>,
}

impl EditingSession {
    pub fn new(gateway: Arc<dyn GenerationGateway>) -> Self {
        Self {
            gateway,
            state: Mutex::new(SessionState {
                document: Document::default(),
                epoch: 0,
                next_ticket: 0,
                usage: UsageStats::default(),
                generation: None,
                audit: None,
                block_ops: HashMap::new(),
                audit_report: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // Every critical section is total, so a poisoned lock still guards consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    //=====================================================================================
    // Read-only Views
    //=====================================================================================

    pub fn snapshot(&self) -> Document {
        self.lock().document.clone()
    }

    /// The current document with the session's usage counters attached.
    pub fn export_snapshot(&self) -> Document {
        let state = self.lock();
        let mut document = state.document.clone();
        document.usage = Some(state.usage);
        document
    }

    pub fn usage(&self) -> UsageStats {
        self.lock().usage
    }

    pub fn estimated_cost(&self, rates: &RateTable) -> f64 {
        estimate_cost(&self.usage(), rates)
    }

    pub fn validation_report(&self) -> ValidationReport {
        validation::validate(&self.lock().document)
    }

    pub fn audit_report(&self) -> Option<String> {
        self.lock().audit_report.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.lock().generation.is_some()
    }

    pub fn block_operation(&self, id: &BlockId) -> Option<BlockOperation> {
        self.lock().block_ops.get(id).map(|op| op.operation)
    }

    /// Every block with an operation in flight, in no particular order.
    pub fn block_operations(&self) -> Vec<(BlockId, BlockOperation)> {
        self.lock()
            .block_ops
            .iter()
            .map(|(id, op)| (id.clone(), op.operation))
            .collect()
    }

    //=====================================================================================
    // Full Generation
    //=====================================================================================

    /// Generates a new script from `source_text` and makes it the current document.
    ///
    /// Resets the document to an empty placeholder carrying `audience` and `tone`
    /// before calling the gateway; the placeholder stays if the call fails or is
    /// cancelled. Rejected while another generation is pending.
    pub async fn start_generation(
        &self,
        source_text: &str,
        audience: Audience,
        tone: Tone,
        language: Language,
    ) -> SessionResult<Generated> {
        if source_text.trim().is_empty() {
            return Err(SessionError::EmptySource);
        }

        let (token, ticket) = {
            let mut state = self.lock();
            if state.generation.is_some() {
                return Err(SessionError::Busy(BusyReason::Generation));
            }
            let ticket = state.ticket();
            let token = CancellationToken::new();
            state.generation = Some(InFlight {
                ticket,
                token: token.clone(),
            });
            state.epoch += 1;
            state.document = Document::placeholder(audience, tone);
            state.audit_report = None;
            // Results of older block operations and audits can no longer be committed.
            for op in state.block_ops.values() {
                op.token.cancel();
            }
            if let Some(audit) = &state.audit {
                audit.token.cancel();
            }
            (token, ticket)
        };
        let _slot = GenerationSlot {
            session: self,
            ticket,
        };

        info!(%audience, %tone, language = language.code(), "Script generation started.");
        let generated = await_gateway(
            &token,
            self.gateway
                .generate_document(source_text, audience, tone, language, &token),
        )
        .await
        .inspect_err(|e| warn!("Script generation did not complete: {}", e))?;

        let mut report = validation::validate(&generated.document);
        report.extend(generated.warnings);

        let mut state = self.lock();
        if token.is_cancelled() {
            info!("Discarding script generated after cancellation.");
            return Err(SessionError::Cancelled);
        }
        if !report.is_valid() {
            warn!("Generated script rejected: {}", report);
            return Err(SessionError::Validation(report));
        }

        let mut document = generated.document;
        document.audience = audience;
        document.tone = tone;
        document.usage = None;
        state.document = document.clone();
        state
            .usage
            .record_tokens(generated.input_tokens, generated.output_tokens);
        state.generation = None;
        info!(
            blocks = document.blocks.len(),
            warnings = report.warnings.len(),
            "Script generation committed."
        );
        Ok(Generated { document, report })
    }

    /// Cancels the pending generation, if any. Returns whether one was pending.
    pub fn cancel_generation(&self) -> bool {
        let state = self.lock();
        match &state.generation {
            Some(generation) => {
                info!("Cancelling script generation.");
                generation.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels the pending operation on block `id`, if any.
    pub fn cancel_block_operation(&self, id: &BlockId) -> bool {
        let state = self.lock();
        match state.block_ops.get(id) {
            Some(op) => {
                info!(block = %id, operation = %op.operation, "Cancelling block operation.");
                op.token.cancel();
                true
            }
            None => false,
        }
    }

    //=====================================================================================
    // Direct Edits
    //=====================================================================================

    /// Merges `patch` into block `id`. Fails without modifying anything when the
    /// block is absent or the patch is rejected.
    pub fn update_block_fields(&self, id: &BlockId, patch: BlockPatch) -> SessionResult<Block> {
        let mut state = self.lock();
        let block = state
            .document
            .block_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        patch.apply(block)?;
        debug!(block = %id, "Block fields updated.");
        Ok(block.clone())
    }

    pub fn update_document_meta(&self, patch: DocumentMetaPatch) -> Document {
        let mut state = self.lock();
        patch.apply(&mut state.document);
        state.document.clone()
    }

    /// Removes block `id`. Removing an absent block is a no-op.
    pub fn remove_block(&self, id: &BlockId) -> bool {
        let mut state = self.lock();
        let removed = state.document.remove_block(id).is_some();
        if removed {
            if let Some(op) = state.block_ops.get(id) {
                op.token.cancel();
            }
            debug!(block = %id, "Block removed.");
        }
        removed
    }

    /// Moves block `id` one position. A no-op when absent or at the boundary.
    pub fn reorder_block(&self, id: &BlockId, direction: Direction) -> bool {
        self.lock().document.reorder_block(id, direction)
    }

    /// Adds externally generated assets to the usage counters.
    pub fn record_asset_generated(&self, kind: AssetKind, amount: u64) {
        self.lock().usage.record_asset(kind, amount);
    }

    //=====================================================================================
    // Document-level Gateway Operations
    //=====================================================================================

    /// Audits the whole script and keeps the report for later per-block fixes.
    pub async fn audit_document(&self, language: Language) -> SessionResult<String> {
        let (document, epoch, token, ticket) = {
            let mut state = self.lock();
            if state.document.is_empty() {
                return Err(SessionError::EmptyDocument);
            }
            if let Some(audit) = &state.audit {
                audit.token.cancel();
            }
            let ticket = state.ticket();
            let token = CancellationToken::new();
            state.audit = Some(InFlight {
                ticket,
                token: token.clone(),
            });
            (state.document.clone(), state.epoch, token, ticket)
        };
        let _slot = AuditSlot {
            session: self,
            ticket,
        };

        info!(blocks = document.blocks.len(), "Script audit started.");
        let report = self.call_gateway(
            &token,
            epoch,
            self.gateway.audit_document(&document, language, &token),
        )
        .await?;

        let mut state = self.lock();
        if state.epoch != epoch {
            return Err(SessionError::DocumentReplaced);
        }
        if token.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        state.audit_report = Some(report.clone());
        Ok(report)
    }

    //=====================================================================================
    // Block-level Gateway Operations
    //=====================================================================================

    /// Replaces block `id` with a regenerated version at the same position.
    ///
    /// The replacement always keeps `id`, whatever the gateway returned; a
    /// replacement of a different type is rejected.
    pub async fn regenerate_block(&self, id: &BlockId, language: Language) -> SessionResult<Block> {
        let pending = self.begin_block_operation(id, BlockOperation::Regenerate)?;
        let result = self.call_gateway(
            &pending.token,
            pending.epoch,
            self.gateway
                .regenerate_block(&pending.block, language, &pending.token),
        )
        .await?;
        let replacement = accept_replacement(&pending.block, result)?;

        self.commit_block(&pending, None, |block| {
            *block = replacement;
            Ok(())
        })
    }

    /// Rewrites the block's content for clarity and engagement.
    pub async fn rewrite_block_content(
        &self,
        id: &BlockId,
        language: Language,
    ) -> SessionResult<Block> {
        let pending = self.begin_block_operation(id, BlockOperation::Rewrite)?;
        let content = self.call_gateway(
            &pending.token,
            pending.epoch,
            self.gateway
                .rewrite_text(&pending.block.content, language, &pending.token),
        )
        .await?;

        self.commit_block(&pending, None, |block| {
            block.content = content;
            Ok(())
        })
    }

    /// Improves block `id` using the stored audit report.
    ///
    /// The improved block is merged in: its id is pinned, its type must match,
    /// and generated assets it does not carry are kept from the current block.
    pub async fn apply_audit_to_block(
        &self,
        id: &BlockId,
        language: Language,
    ) -> SessionResult<Block> {
        let report = self.audit_report().ok_or(SessionError::NoAuditReport)?;
        let pending = self.begin_block_operation(id, BlockOperation::ApplyAudit)?;
        let result = self.call_gateway(
            &pending.token,
            pending.epoch,
            self.gateway
                .apply_audit_to_block(&pending.block, &report, language, &pending.token),
        )
        .await?;
        let mut improved = accept_replacement(&pending.block, result)?;

        self.commit_block(&pending, None, |block| {
            improved.assets.inherit_missing(&block.assets);
            *block = improved;
            Ok(())
        })
    }

    /// Generates an illustration from the block's visual prompt.
    pub async fn generate_block_image(&self, id: &BlockId) -> SessionResult<Block> {
        let pending = self.begin_block_operation(id, BlockOperation::Image)?;
        let prompt = required_visual_prompt(&pending.block)?;
        let url = self.call_gateway(
            &pending.token,
            pending.epoch,
            self.gateway.synthesize_image(&prompt, &pending.token),
        )
        .await?;

        self.commit_block(&pending, Some((AssetKind::Image, 1)), |block| {
            block.assets.image_url = Some(url);
            Ok(())
        })
    }

    /// Generates a video from the block's visual prompt.
    pub async fn generate_block_video(&self, id: &BlockId) -> SessionResult<Block> {
        let pending = self.begin_block_operation(id, BlockOperation::Video)?;
        let prompt = required_visual_prompt(&pending.block)?;
        let url = self.call_gateway(
            &pending.token,
            pending.epoch,
            self.gateway.synthesize_video(&prompt, &pending.token),
        )
        .await?;

        self.commit_block(&pending, Some((AssetKind::Video, 1)), |block| {
            block.assets.video_url = Some(url);
            Ok(())
        })
    }

    /// Narrates the block's content.
    pub async fn generate_block_audio(
        &self,
        id: &BlockId,
        language: Language,
    ) -> SessionResult<Block> {
        let pending = self.begin_block_operation(id, BlockOperation::Audio)?;
        let text = pending.block.content.clone();
        if text.trim().is_empty() {
            return Err(SessionError::EmptyContent(id.clone()));
        }
        let url = self.call_gateway(
            &pending.token,
            pending.epoch,
            self.gateway.synthesize_audio(&text, language, &pending.token),
        )
        .await?;

        let narrated = text.chars().count() as u64;
        self.commit_block(&pending, Some((AssetKind::Audio, narrated)), |block| {
            block.assets.audio_url = Some(url);
            Ok(())
        })
    }

    //=====================================================================================
    // Block Operation Bookkeeping
    //=====================================================================================

    /// Like `await_gateway`, but an interruption caused by a new script is
    /// reported as `DocumentReplaced`.
    async fn call_gateway<T>(
        &self,
        token: &CancellationToken,
        epoch: u64,
        call: impl Future<Output = PortResult<T>>,
    ) -> SessionResult<T> {
        match await_gateway(token, call).await {
            Err(SessionError::Cancelled) if self.lock().epoch != epoch => {
                Err(SessionError::DocumentReplaced)
            }
            other => other,
        }
    }

    fn begin_block_operation(
        &self,
        id: &BlockId,
        operation: BlockOperation,
    ) -> SessionResult<PendingBlockOp<'_>> {
        let mut state = self.lock();
        let block = state
            .document
            .block(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        if let Some(running) = state.block_ops.get(id) {
            return Err(SessionError::Busy(BusyReason::Block {
                id: id.clone(),
                operation: running.operation,
            }));
        }

        let ticket = state.ticket();
        let token = CancellationToken::new();
        state.block_ops.insert(
            id.clone(),
            BlockInFlight {
                ticket,
                token: token.clone(),
                operation,
            },
        );
        debug!(block = %id, %operation, "Block operation started.");

        Ok(PendingBlockOp {
            block,
            epoch: state.epoch,
            token,
            _lease: BlockLease {
                session: self,
                id: id.clone(),
                ticket,
            },
        })
    }

    /// Applies `apply` to the current version of the pending block, all or nothing.
    fn commit_block(
        &self,
        pending: &PendingBlockOp<'_>,
        usage: Option<(AssetKind, u64)>,
        apply: impl FnOnce(&mut Block) -> SessionResult<()>,
    ) -> SessionResult<Block> {
        let id = &pending.block.id;
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.epoch != pending.epoch {
            return Err(SessionError::DocumentReplaced);
        }
        if pending.token.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        let slot = state
            .document
            .block_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;

        let mut updated = slot.clone();
        apply(&mut updated)?;
        *slot = updated.clone();
        if let Some((kind, amount)) = usage {
            state.usage.record_asset(kind, amount);
        }
        debug!(block = %id, "Block operation committed.");
        Ok(updated)
    }
}

//=========================================================================================
// Helpers and Guards
//=========================================================================================

/// Awaits a gateway call, giving up as soon as `token` is cancelled.
async fn await_gateway<T>(
    token: &CancellationToken,
    call: impl Future<Output = PortResult<T>>,
) -> SessionResult<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(SessionError::Cancelled),
        result = call => result.map_err(SessionError::from),
    }
}

/// Pins the replacement to the original's id and checks it may take its place.
fn accept_replacement(original: &Block, mut replacement: Block) -> SessionResult<Block> {
    if replacement.id != original.id {
        debug!(block = %original.id, returned = %replacement.id, "Re-pinning block id.");
        replacement.id = original.id.clone();
    }
    if replacement.kind() != original.kind() {
        let issue = ValidationIssue::new(IssueKind::TypeChanged {
            expected: original.kind(),
            found: replacement.kind(),
        })
        .on(&original.id);
        return Err(SessionError::Validation(ValidationReport::from_issues([
            issue,
        ])));
    }
    let report = validation::validate_block(&replacement);
    if !report.is_valid() {
        return Err(SessionError::Validation(report));
    }
    if !report.warnings.is_empty() {
        warn!(block = %original.id, "Replacement block has warnings: {:?}", report.warnings);
    }
    Ok(replacement)
}

fn required_visual_prompt(block: &Block) -> SessionResult<String> {
    block
        .visual_prompt()
        .filter(|prompt| !prompt.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| SessionError::MissingVisualPrompt {
            id: block.id.clone(),
            kind: block.kind(),
        })
}

struct PendingBlockOp<'a> {
    block: Block,
    epoch: u64,
    token: CancellationToken,
    _lease: BlockLease<'a>,
}

/// Releases a block's in-flight marker when the operation ends, however it ends.
struct BlockLease<'a> {
    session: &'a EditingSession,
    id: BlockId,
    ticket: u64,
}

impl Drop for BlockLease<'_> {
    fn drop(&mut self) {
        let mut state = self.session.lock();
        if state
            .block_ops
            .get(&self.id)
            .is_some_and(|op| op.ticket == self.ticket)
        {
            state.block_ops.remove(&self.id);
        }
    }
}

/// Frees the generation slot when a generation ends, however it ends.
struct GenerationSlot<'a> {
    session: &'a EditingSession,
    ticket: u64,
}

impl Drop for GenerationSlot<'_> {
    fn drop(&mut self) {
        let mut state = self.session.lock();
        if state
            .generation
            .as_ref()
            .is_some_and(|g| g.ticket == self.ticket)
        {
            state.generation = None;
        }
    }
}

struct AuditSlot<'a> {
    session: &'a EditingSession,
    ticket: u64,
}

impl Drop for AuditSlot<'_> {
    fn drop(&mut self) {
        let mut state = self.session.lock();
        if state.audit.as_ref().is_some_and(|a| a.ticket == self.ticket) {
            state.audit = None;
        }
    }
}
