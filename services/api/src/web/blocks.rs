//! services/api/src/web/blocks.rs
//!
//! Axum handlers for block-level edits and per-block generation.

use crate::web::{
    protocol::{BlockView, CancelView, ChangedView, LanguageParams, MoveRequest},
    rest::session_error,
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use script_engine_core::{domain::BlockId, patch::BlockPatch};
use std::sync::Arc;

/// Update some fields of a block. `id` and `type` cannot change.
#[utoipa::path(
    patch,
    path = "/script/blocks/{id}",
    params(("id" = String, Path, description = "The block id.")),
    request_body(content_type = "application/json", description = "Any block fields in their exported shape; nullable fields may be cleared with null."),
    responses(
        (status = 200, description = "The updated block", body = BlockView),
        (status = 400, description = "Immutable or inapplicable field"),
        (status = 404, description = "No such block")
    )
)]
pub async fn update_block_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<BlockPatch>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let block = app_state
        .session
        .update_block_fields(&BlockId::from(id), patch)
        .map_err(session_error)?;
    Ok(Json(BlockView { block }))
}

/// Remove a block. Removing an absent block is not an error.
#[utoipa::path(
    delete,
    path = "/script/blocks/{id}",
    params(("id" = String, Path, description = "The block id.")),
    responses((status = 200, description = "Whether a block was removed", body = ChangedView))
)]
pub async fn delete_block_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<ChangedView> {
    Json(ChangedView {
        changed: app_state.session.remove_block(&BlockId::from(id)),
    })
}

/// Move a block one position up or down.
#[utoipa::path(
    post,
    path = "/script/blocks/{id}/move",
    params(("id" = String, Path, description = "The block id.")),
    request_body = MoveRequest,
    responses((status = 200, description = "Whether the order changed", body = ChangedView))
)]
pub async fn move_block_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> Json<ChangedView> {
    Json(ChangedView {
        changed: app_state
            .session
            .reorder_block(&BlockId::from(id), request.direction),
    })
}

/// Cancel whatever operation is running on a block.
#[utoipa::path(
    post,
    path = "/script/blocks/{id}/cancel",
    params(("id" = String, Path, description = "The block id.")),
    responses((status = 200, description = "Whether an operation was cancelled", body = CancelView))
)]
pub async fn cancel_block_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<CancelView> {
    Json(CancelView {
        cancelled: app_state
            .session
            .cancel_block_operation(&BlockId::from(id)),
    })
}

/// Regenerate a block with the same type and topic.
#[utoipa::path(
    post,
    path = "/script/blocks/{id}/regenerate",
    params(("id" = String, Path, description = "The block id."), LanguageParams),
    responses(
        (status = 200, description = "The regenerated block", body = BlockView),
        (status = 404, description = "No such block"),
        (status = 409, description = "The block is busy, or the script was replaced"),
        (status = 422, description = "The regenerated block failed validation"),
        (status = 502, description = "The generation service failed")
    )
)]
pub async fn regenerate_block_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<LanguageParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let block = app_state
        .session
        .regenerate_block(&BlockId::from(id), params.language())
        .await
        .map_err(session_error)?;
    Ok(Json(BlockView { block }))
}

/// Rewrite a block's content to be clearer and more engaging.
#[utoipa::path(
    post,
    path = "/script/blocks/{id}/rewrite",
    params(("id" = String, Path, description = "The block id."), LanguageParams),
    responses(
        (status = 200, description = "The block with rewritten content", body = BlockView),
        (status = 404, description = "No such block"),
        (status = 409, description = "The block is busy, or the script was replaced"),
        (status = 502, description = "The generation service failed")
    )
)]
pub async fn rewrite_block_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<LanguageParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let block = app_state
        .session
        .rewrite_block_content(&BlockId::from(id), params.language())
        .await
        .map_err(session_error)?;
    Ok(Json(BlockView { block }))
}

/// Improve a block using the stored audit report.
#[utoipa::path(
    post,
    path = "/script/blocks/{id}/apply-audit",
    params(("id" = String, Path, description = "The block id."), LanguageParams),
    responses(
        (status = 200, description = "The improved block", body = BlockView),
        (status = 400, description = "No audit report is available"),
        (status = 404, description = "No such block"),
        (status = 409, description = "The block is busy, or the script was replaced"),
        (status = 422, description = "The improved block failed validation"),
        (status = 502, description = "The generation service failed")
    )
)]
pub async fn apply_audit_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<LanguageParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let block = app_state
        .session
        .apply_audit_to_block(&BlockId::from(id), params.language())
        .await
        .map_err(session_error)?;
    Ok(Json(BlockView { block }))
}

/// Illustrate a block from its visual prompt.
#[utoipa::path(
    post,
    path = "/script/blocks/{id}/image",
    params(("id" = String, Path, description = "The block id.")),
    responses(
        (status = 200, description = "The block with its new image", body = BlockView),
        (status = 400, description = "The block has no visual prompt"),
        (status = 404, description = "No such block"),
        (status = 409, description = "The block is busy, or the script was replaced"),
        (status = 502, description = "The generation service failed")
    )
)]
pub async fn image_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let block = app_state
        .session
        .generate_block_image(&BlockId::from(id))
        .await
        .map_err(session_error)?;
    Ok(Json(BlockView { block }))
}

/// Narrate a block's content.
#[utoipa::path(
    post,
    path = "/script/blocks/{id}/audio",
    params(("id" = String, Path, description = "The block id."), LanguageParams),
    responses(
        (status = 200, description = "The block with its narration", body = BlockView),
        (status = 400, description = "The block has no content"),
        (status = 404, description = "No such block"),
        (status = 409, description = "The block is busy, or the script was replaced"),
        (status = 502, description = "The generation service failed")
    )
)]
pub async fn audio_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<LanguageParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let block = app_state
        .session
        .generate_block_audio(&BlockId::from(id), params.language())
        .await
        .map_err(session_error)?;
    Ok(Json(BlockView { block }))
}

/// Render a short video from a block's visual prompt. This can take minutes.
#[utoipa::path(
    post,
    path = "/script/blocks/{id}/video",
    params(("id" = String, Path, description = "The block id.")),
    responses(
        (status = 200, description = "The block with its video", body = BlockView),
        (status = 400, description = "The block has no visual prompt"),
        (status = 404, description = "No such block"),
        (status = 409, description = "The block is busy, was cancelled, or the script was replaced"),
        (status = 502, description = "The generation service failed")
    )
)]
pub async fn video_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let block = app_state
        .session
        .generate_block_video(&BlockId::from(id))
        .await
        .map_err(session_error)?;
    Ok(Json(BlockView { block }))
}
