pub mod blocks;
pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

use state::AppState;

/// Builds the REST router over the shared state.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/script", get(rest::get_script_handler))
        .route("/script/generate", post(rest::generate_script_handler))
        .route("/script/cancel", post(rest::cancel_generation_handler))
        .route("/script/meta", patch(rest::update_meta_handler))
        .route("/script/validation", get(rest::validation_handler))
        .route(
            "/script/audit",
            get(rest::get_audit_handler).post(rest::audit_script_handler),
        )
        .route(
            "/script/blocks/{id}",
            patch(blocks::update_block_handler).delete(blocks::delete_block_handler),
        )
        .route("/script/blocks/{id}/move", post(blocks::move_block_handler))
        .route("/script/blocks/{id}/cancel", post(blocks::cancel_block_handler))
        .route(
            "/script/blocks/{id}/regenerate",
            post(blocks::regenerate_block_handler),
        )
        .route("/script/blocks/{id}/rewrite", post(blocks::rewrite_block_handler))
        .route(
            "/script/blocks/{id}/apply-audit",
            post(blocks::apply_audit_handler),
        )
        .route("/script/blocks/{id}/image", post(blocks::image_handler))
        .route("/script/blocks/{id}/audio", post(blocks::audio_handler))
        .route("/script/blocks/{id}/video", post(blocks::video_handler))
        .route("/usage", get(rest::usage_handler))
        .route("/export/json", get(rest::export_json_handler))
        .route("/export/html", get(rest::export_html_handler))
        .route("/onboarding", get(rest::get_onboarding_handler))
        .route("/onboarding/dismiss", post(rest::dismiss_onboarding_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FileOnboardingStore;
    use crate::config::Config;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use script_engine_core::{
        domain::{Audience, Block, BlockBody, Document, Language, QuizOption, Tone},
        ports::{GeneratedDocument, GenerationGateway, PortResult},
        EditingSession,
    };
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    struct FakeGateway;

    fn generated() -> Document {
        let mut document = Document::placeholder(Audience::Beginner, Tone::Corporate);
        document.title = "Lab Waste".into();
        document.blocks = vec![
            Block::new(
                "b1",
                "Why it matters",
                "<p>Label every drum.</p>",
                BlockBody::Theory {
                    visual_prompt: Some("labelled drums".into()),
                },
            ),
            Block::new(
                "b2",
                "Check",
                "<p>Pick one</p>",
                BlockBody::Assessment {
                    options: vec![QuizOption {
                        text: "Seal it".into(),
                        is_correct: true,
                        feedback: "Right".into(),
                    }],
                },
            ),
        ];
        document
    }

    #[async_trait]
    impl GenerationGateway for FakeGateway {
        async fn generate_document(
            &self,
            _source_text: &str,
            _audience: Audience,
            _tone: Tone,
            _language: Language,
            _cancel: &CancellationToken,
        ) -> PortResult<GeneratedDocument> {
            Ok(GeneratedDocument {
                document: generated(),
                warnings: Vec::new(),
                input_tokens: 1_000,
                output_tokens: 500,
            })
        }

        async fn regenerate_block(
            &self,
            block: &Block,
            _language: Language,
            _cancel: &CancellationToken,
        ) -> PortResult<Block> {
            let mut block = block.clone();
            block.title = format!("{} (v2)", block.title);
            Ok(block)
        }

        async fn rewrite_text(
            &self,
            text: &str,
            _language: Language,
            _cancel: &CancellationToken,
        ) -> PortResult<String> {
            Ok(text.to_uppercase())
        }

        async fn audit_document(
            &self,
            _document: &Document,
            _language: Language,
            _cancel: &CancellationToken,
        ) -> PortResult<String> {
            Ok("🟢 Strengths".into())
        }

        async fn apply_audit_to_block(
            &self,
            block: &Block,
            _report: &str,
            _language: Language,
            _cancel: &CancellationToken,
        ) -> PortResult<Block> {
            Ok(block.clone())
        }

        async fn synthesize_image(
            &self,
            _prompt: &str,
            _cancel: &CancellationToken,
        ) -> PortResult<String> {
            Ok("data:image/png;base64,AAAA".into())
        }

        async fn synthesize_audio(
            &self,
            _text: &str,
            _language: Language,
            _cancel: &CancellationToken,
        ) -> PortResult<String> {
            Ok("data:audio/wav;base64,AAAA".into())
        }

        async fn synthesize_video(
            &self,
            _prompt: &str,
            _cancel: &CancellationToken,
        ) -> PortResult<String> {
            Ok("https://videos.example/v1".into())
        }
    }

    fn app(data_dir: &std::path::Path) -> Router {
        let config = Config::from_lookup(|_| None).unwrap();
        router(Arc::new(AppState {
            session: Arc::new(EditingSession::new(Arc::new(FakeGateway))),
            onboarding: Arc::new(FileOnboardingStore::new(data_dir)),
            config: Arc::new(config),
        }))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes, _) = call_raw(app, method, uri, body).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn call_raw(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, bytes, headers)
    }

    async fn generated_app(data_dir: &std::path::Path) -> Router {
        let app = app(data_dir);
        let (status, _) = call(
            &app,
            Method::POST,
            "/script/generate",
            Some(json!({ "sourceText": "Chemical waste handling", "tone": "Academic" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        app
    }

    #[tokio::test]
    async fn generation_replaces_the_script_and_counts_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let app = generated_app(dir.path()).await;

        let (status, body) = call(&app, Method::GET, "/script", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["document"]["title"], "Lab Waste");
        assert_eq!(body["document"]["blocks"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["generating"], false);

        let (_, usage) = call(&app, Method::GET, "/usage", None).await;
        assert_eq!(usage["inputTokens"], 1_000);
        assert_eq!(usage["totalTokens"], 1_500);
        assert_eq!(usage["estimatedCost"], 0.0002);
    }

    #[tokio::test]
    async fn empty_source_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let (status, _) = call(
            &app,
            Method::POST,
            "/script/generate",
            Some(json!({ "sourceText": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn block_edits_map_failures_to_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let app = generated_app(dir.path()).await;

        let (status, body) = call(
            &app,
            Method::PATCH,
            "/script/blocks/b1",
            Some(json!({ "title": "Renamed", "competency": "Safety" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["block"]["title"], "Renamed");
        assert_eq!(body["block"]["type"], "theory");

        let (status, _) = call(
            &app,
            Method::PATCH,
            "/script/blocks/b1",
            Some(json!({ "type": "steps" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            Method::PATCH,
            "/script/blocks/missing",
            Some(json!({ "title": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::POST, "/script/blocks/b2/image", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, Method::POST, "/script/blocks/b1/apply-audit", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn move_and_delete_are_idempotent_at_the_edges() {
        let dir = tempfile::tempdir().unwrap();
        let app = generated_app(dir.path()).await;

        let (_, body) = call(
            &app,
            Method::POST,
            "/script/blocks/b2/move",
            Some(json!({ "direction": "up" })),
        )
        .await;
        assert_eq!(body["changed"], true);
        let (_, body) = call(
            &app,
            Method::POST,
            "/script/blocks/b2/move",
            Some(json!({ "direction": "up" })),
        )
        .await;
        assert_eq!(body["changed"], false);

        let (_, body) = call(&app, Method::DELETE, "/script/blocks/b1", None).await;
        assert_eq!(body["changed"], true);
        let (status, body) = call(&app, Method::DELETE, "/script/blocks/b1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["changed"], false);

        let (_, script) = call(&app, Method::GET, "/script", None).await;
        assert_eq!(script["document"]["blocks"][0]["id"], "b2");
    }

    #[tokio::test]
    async fn media_generation_updates_blocks_and_usage() {
        let dir = tempfile::tempdir().unwrap();
        let app = generated_app(dir.path()).await;

        let (status, body) = call(&app, Method::POST, "/script/blocks/b1/image", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["block"]["generatedImageUrl"], "data:image/png;base64,AAAA");

        let (status, body) =
            call(&app, Method::POST, "/script/blocks/b1/audio?language=es", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["block"]["generatedAudioUrl"], "data:audio/wav;base64,AAAA");

        let (_, usage) = call(&app, Method::GET, "/usage", None).await;
        assert_eq!(usage["imagesGenerated"], 1);
        assert_eq!(usage["audioCharsGenerated"], "<p>Label every drum.</p>".len());
    }

    #[tokio::test]
    async fn audit_is_stored_and_applied() {
        let dir = tempfile::tempdir().unwrap();
        let app = generated_app(dir.path()).await;

        let (_, body) = call(&app, Method::GET, "/script/audit", None).await;
        assert_eq!(body["report"], Value::Null);

        let (status, _) = call(&app, Method::POST, "/script/audit", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, Method::GET, "/script/audit", None).await;
        assert_eq!(body["report"], "🟢 Strengths");

        let (status, _) = call(&app, Method::POST, "/script/blocks/b1/apply-audit", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn exports_carry_usage_and_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let app = generated_app(dir.path()).await;

        let (status, bytes, headers) = call_raw(&app, Method::GET, "/export/json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Lab-Waste.json\""
        );
        let exported: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(exported["tone"], "Academic");
        assert_eq!(exported["usage"]["outputTokens"], 500);

        let (status, bytes, headers) =
            call_raw(&app, Method::GET, "/export/html?language=es", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
        let html = String::from_utf8(bytes).unwrap();
        assert!(html.contains("Parte 1 &bull; theory"));
    }

    #[tokio::test]
    async fn onboarding_flag_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (_, body) = call(&app, Method::GET, "/onboarding", None).await;
        assert_eq!(body["seen"], false);
        let (status, _) = call(&app, Method::POST, "/onboarding/dismiss", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, Method::GET, "/onboarding", None).await;
        assert_eq!(body["seen"], true);
    }
}
