//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        tts::{speech_model, voice_from_name},
        video::DEFAULT_API_BASE,
        FileOnboardingStore, OpenAiGateway, OpenAiImageAdapter, OpenAiScriptAdapter,
        OpenAiTtsAdapter, OpenAiVideoAdapter,
    },
    config::Config,
    error::ApiError,
    web::{router, rest::ApiDoc, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    Router,
};
use script_engine_core::EditingSession;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let api_key = config.require_api_key()?.to_string();
    let api_base = config
        .openai_api_base
        .clone()
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key.clone())
        .with_api_base(api_base.clone());
    let openai_client = Client::with_config(openai_config);

    let voice = |name: &str| {
        voice_from_name(name).ok_or_else(|| {
            ApiError::Internal(format!("Invalid TTS voice specified in config: '{}'", name))
        })
    };
    let tts_adapter = OpenAiTtsAdapter::new(
        openai_client.clone(),
        speech_model(&config.tts_model),
        voice(&config.tts_voice_en)?,
        voice(&config.tts_voice_es)?,
    );
    let script_adapter = OpenAiScriptAdapter::new(
        openai_client.clone(),
        config.script_model.clone(),
        config.audit_model.clone(),
    );
    let image_adapter = OpenAiImageAdapter::new(openai_client.clone(), config.image_model.clone());
    let video_adapter = OpenAiVideoAdapter::new(
        reqwest::Client::new(),
        api_base,
        api_key,
        config.video_model.clone(),
        config.video_poll_interval,
    );
    let gateway = Arc::new(OpenAiGateway::new(
        script_adapter,
        image_adapter,
        tts_adapter,
        video_adapter,
    ));

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        session: Arc::new(EditingSession::new(gateway)),
        onboarding: Arc::new(FileOnboardingStore::new(&config.data_dir)),
        config: config.clone(),
    });

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE]);

    // --- 4. Create the Web Router ---
    let app = Router::new()
        .merge(router(app_state))
        .layer(cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
