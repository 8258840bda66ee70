pub mod gateway;
pub mod image;
pub mod onboarding;
pub mod script_llm;
pub mod tts;
pub mod video;

pub use gateway::OpenAiGateway;
pub use image::OpenAiImageAdapter;
pub use onboarding::FileOnboardingStore;
pub use script_llm::OpenAiScriptAdapter;
pub use tts::OpenAiTtsAdapter;
pub use video::OpenAiVideoAdapter;

use script_engine_core::ports::{PortError, PortResult};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Runs `call` until it finishes or `cancel` fires, whichever comes first.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = PortResult<T>>,
) -> PortResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PortError::Cancelled),
        result = call => result,
    }
}

/// Maps a provider error into the port's service failure.
pub(crate) fn service_error(e: impl std::fmt::Display) -> PortError {
    PortError::Service(e.to_string())
}
