//! services/api/src/adapters/image.rs
//!
//! This module contains the adapter for OpenAI's image generation service.
//! Images come back inline and are handed to the session as data URIs.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::images::{CreateImageRequestArgs, Image, ImageModel, ImageResponseFormat, ImageSize},
    Client,
};
use script_engine_core::ports::{PortError, PortResult};

use super::service_error;

/// Builds the illustration prompt for a block's visual description.
pub(crate) fn illustration_prompt(prompt: &str) -> String {
    format!("High quality clean e-learning style illustration: {}", prompt)
}

pub(crate) fn png_data_uri(b64: &str) -> String {
    format!("data:image/png;base64,{}", b64)
}

fn image_model(name: &str) -> ImageModel {
    match name {
        "dall-e-2" => ImageModel::DallE2,
        "dall-e-3" => ImageModel::DallE3,
        other => ImageModel::Other(other.to_string()),
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that renders block illustrations using the OpenAI Images API.
#[derive(Clone)]
pub struct OpenAiImageAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiImageAdapter {
    /// Creates a new `OpenAiImageAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Generates one landscape illustration and returns its locator.
    pub async fn generate(&self, prompt: &str) -> PortResult<String> {
        let request = CreateImageRequestArgs::default()
            .prompt(illustration_prompt(prompt))
            .model(image_model(&self.model))
            .n(1)
            .size(ImageSize::S1792x1024)
            .response_format(ImageResponseFormat::B64Json)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .images()
            .generate(request)
            .await
            .map_err(|e: OpenAIError| service_error(e))?;

        let image = response
            .data
            .first()
            .ok_or_else(|| PortError::Malformed("Image service returned no images.".to_string()))?;

        match image.as_ref() {
            Image::B64Json { b64_json, .. } => Ok(png_data_uri(b64_json)),
            Image::Url { url, .. } => Ok(url.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_and_locators_follow_the_house_style() {
        assert_eq!(
            illustration_prompt("a sealed drum"),
            "High quality clean e-learning style illustration: a sealed drum"
        );
        assert_eq!(png_data_uri("AAAA"), "data:image/png;base64,AAAA");
    }

    #[test]
    fn unknown_models_pass_through() {
        assert!(matches!(image_model("dall-e-3"), ImageModel::DallE3));
        assert!(matches!(image_model("gpt-image-1"), ImageModel::Other(name) if name == "gpt-image-1"));
    }
}
