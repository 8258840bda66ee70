//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the script-level REST endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    blocks,
    protocol::{
        AuditView, BlockView, CancelView, ChangedView, GenerateRequest, GeneratedView,
        LanguageParams, MoveRequest, OnboardingView, ScriptView, UsageView,
    },
    state::AppState,
};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use script_engine_core::{export, patch::DocumentMetaPatch, SessionError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_script_handler,
        generate_script_handler,
        cancel_generation_handler,
        update_meta_handler,
        validation_handler,
        audit_script_handler,
        get_audit_handler,
        usage_handler,
        export_json_handler,
        export_html_handler,
        get_onboarding_handler,
        dismiss_onboarding_handler,
        blocks::update_block_handler,
        blocks::delete_block_handler,
        blocks::move_block_handler,
        blocks::cancel_block_handler,
        blocks::regenerate_block_handler,
        blocks::rewrite_block_handler,
        blocks::apply_audit_handler,
        blocks::image_handler,
        blocks::audio_handler,
        blocks::video_handler,
    ),
    components(
        schemas(
            GenerateRequest, MoveRequest, ScriptView, GeneratedView, BlockView, CancelView,
            ChangedView, AuditView, UsageView, OnboardingView
        )
    ),
    tags(
        (name = "ELSE Script Engine API", description = "Generate, edit and export e-learning scripts.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a session failure onto an HTTP status and message.
pub(crate) fn session_error(e: SessionError) -> (StatusCode, String) {
    let status = match &e {
        SessionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::Service(_) => StatusCode::BAD_GATEWAY,
        SessionError::Cancelled | SessionError::Busy(_) | SessionError::DocumentReplaced => {
            StatusCode::CONFLICT
        }
        SessionError::EmptySource
        | SessionError::EmptyDocument
        | SessionError::EmptyContent(_)
        | SessionError::Patch(_)
        | SessionError::MissingVisualPrompt { .. }
        | SessionError::NoAuditReport => StatusCode::BAD_REQUEST,
    };
    if status == StatusCode::BAD_GATEWAY {
        error!("Generation service failed: {}", e);
    }
    (status, e.to_string())
}

pub(crate) fn script_view(state: &AppState) -> ScriptView {
    let block_operations: BTreeMap<String, String> = state
        .session
        .block_operations()
        .into_iter()
        .map(|(id, op)| (id.to_string(), op.to_string()))
        .collect();
    ScriptView {
        document: state.session.snapshot(),
        generating: state.session.is_generating(),
        block_operations,
    }
}

//=========================================================================================
// Script Handlers
//=========================================================================================

/// The current script.
#[utoipa::path(
    get,
    path = "/script",
    responses((status = 200, description = "The current script", body = ScriptView))
)]
pub async fn get_script_handler(State(app_state): State<Arc<AppState>>) -> Json<ScriptView> {
    Json(script_view(&app_state))
}

/// Generate a new script from source text, replacing the current one.
#[utoipa::path(
    post,
    path = "/script/generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Script generated", body = GeneratedView),
        (status = 400, description = "Source text is empty"),
        (status = 409, description = "A generation is already running or was cancelled"),
        (status = 422, description = "The generated script failed validation"),
        (status = 502, description = "The generation service failed")
    )
)]
pub async fn generate_script_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let generated = app_state
        .session
        .start_generation(
            &request.source_text,
            request.audience,
            request.tone,
            request.language,
        )
        .await
        .map_err(session_error)?;

    Ok(Json(GeneratedView {
        document: generated.document,
        report: generated.report,
    }))
}

/// Cancel the running generation, if any.
#[utoipa::path(
    post,
    path = "/script/cancel",
    responses((status = 200, description = "Whether a generation was cancelled", body = CancelView))
)]
pub async fn cancel_generation_handler(State(app_state): State<Arc<AppState>>) -> Json<CancelView> {
    Json(CancelView {
        cancelled: app_state.session.cancel_generation(),
    })
}

/// Update the script's title, description, audience or tone.
#[utoipa::path(
    patch,
    path = "/script/meta",
    request_body(content_type = "application/json", description = "Any of title, description (nullable), audience and tone."),
    responses((status = 200, description = "The updated script", body = ScriptView))
)]
pub async fn update_meta_handler(
    State(app_state): State<Arc<AppState>>,
    Json(patch): Json<DocumentMetaPatch>,
) -> Json<ScriptView> {
    app_state.session.update_document_meta(patch);
    Json(script_view(&app_state))
}

/// Structural errors and pedagogical warnings of the current script.
#[utoipa::path(
    get,
    path = "/script/validation",
    responses((status = 200, description = "Validation report with errors and warnings"))
)]
pub async fn validation_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.session.validation_report())
}

/// Run a pedagogical audit of the whole script.
#[utoipa::path(
    post,
    path = "/script/audit",
    params(LanguageParams),
    responses(
        (status = 200, description = "The audit report", body = AuditView),
        (status = 400, description = "The script has no blocks"),
        (status = 409, description = "An audit is already running or was cancelled"),
        (status = 502, description = "The generation service failed")
    )
)]
pub async fn audit_script_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<LanguageParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let report = app_state
        .session
        .audit_document(params.language())
        .await
        .map_err(session_error)?;
    Ok(Json(AuditView {
        report: Some(report),
    }))
}

/// The most recent audit report, if one exists for the current script.
#[utoipa::path(
    get,
    path = "/script/audit",
    responses((status = 200, description = "The stored audit report", body = AuditView))
)]
pub async fn get_audit_handler(State(app_state): State<Arc<AppState>>) -> Json<AuditView> {
    Json(AuditView {
        report: app_state.session.audit_report(),
    })
}

//=========================================================================================
// Usage and Export Handlers
//=========================================================================================

/// Usage counters and the estimated cost of the session.
#[utoipa::path(
    get,
    path = "/usage",
    responses((status = 200, description = "Usage and estimated cost", body = UsageView))
)]
pub async fn usage_handler(State(app_state): State<Arc<AppState>>) -> Json<UsageView> {
    let usage = app_state.session.usage();
    let cost = app_state.session.estimated_cost(&app_state.config.rates);
    Json(UsageView::new(usage, cost))
}

/// Download the script as JSON.
#[utoipa::path(
    get,
    path = "/export/json",
    responses(
        (status = 200, description = "The script with its usage counters", content_type = "application/json"),
        (status = 500, description = "Serialization failed")
    )
)]
pub async fn export_json_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let document = app_state.session.export_snapshot();
    let report = app_state.session.validation_report();
    if !report.is_clean() {
        warn!("Exporting script with findings: {}", report);
    }
    let body = export::to_json(&document).map_err(|e| {
        error!("Failed to serialize script: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to export script".to_string())
    })?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export::file_name(&document, "json")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

/// The script as a self-contained, printable HTML page.
#[utoipa::path(
    get,
    path = "/export/html",
    params(LanguageParams),
    responses((status = 200, description = "The rendered page", content_type = "text/html"))
)]
pub async fn export_html_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<LanguageParams>,
) -> impl IntoResponse {
    let document = app_state.session.snapshot();
    let disposition = format!(
        "inline; filename=\"{}\"",
        export::file_name(&document, "html")
    );
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export::to_html(&document, params.language()),
    )
}

//=========================================================================================
// Onboarding Handlers
//=========================================================================================

/// Whether the onboarding screen has been dismissed before.
#[utoipa::path(
    get,
    path = "/onboarding",
    responses(
        (status = 200, description = "The onboarding flag", body = OnboardingView),
        (status = 500, description = "The flag could not be read")
    )
)]
pub async fn get_onboarding_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let seen = app_state.onboarding.has_seen().await.map_err(|e| {
        error!("Failed to read onboarding flag: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read onboarding state".to_string())
    })?;
    Ok(Json(OnboardingView { seen }))
}

/// Remember that the onboarding screen was dismissed.
#[utoipa::path(
    post,
    path = "/onboarding/dismiss",
    responses(
        (status = 200, description = "The onboarding flag", body = OnboardingView),
        (status = 500, description = "The flag could not be written")
    )
)]
pub async fn dismiss_onboarding_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state.onboarding.mark_seen().await.map_err(|e| {
        error!("Failed to write onboarding flag: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save onboarding state".to_string())
    })?;
    Ok(Json(OnboardingView { seen: true }))
}
