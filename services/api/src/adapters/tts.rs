//! services/api/src/adapters/tts.rs
//!
//! This module contains the adapter for OpenAI's Text-to-Speech (TTS) service.
//! Narration is requested as raw PCM, wrapped into a WAV container and handed to
//! the session as a data URI.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::audio::{CreateSpeechRequestArgs, SpeechModel, SpeechResponseFormat, Voice},
    Client,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hound::{WavSpec, WavWriter};
use script_engine_core::{
    domain::Language,
    ports::{PortError, PortResult},
};

use super::service_error;

/// OpenAI streams PCM as 24 kHz, 16-bit, mono.
const PCM_SAMPLE_RATE: u32 = 24_000;

/// Resolves a configured voice name.
pub fn voice_from_name(name: &str) -> Option<Voice> {
    match name.trim().to_lowercase().as_str() {
        "alloy" => Some(Voice::Alloy),
        "echo" => Some(Voice::Echo),
        "fable" => Some(Voice::Fable),
        "onyx" => Some(Voice::Onyx),
        "nova" => Some(Voice::Nova),
        "shimmer" => Some(Voice::Shimmer),
        _ => None,
    }
}

pub fn speech_model(name: &str) -> SpeechModel {
    match name {
        "tts-1" => SpeechModel::Tts1,
        "tts-1-hd" => SpeechModel::Tts1Hd,
        other => SpeechModel::Other(other.to_string()),
    }
}

pub(crate) fn narration_prompt(text: &str) -> String {
    format!("Professional narrator: {}", plain_text(text))
}

/// Drops markup so the narrator reads only the prose.
fn plain_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Wraps little-endian 16-bit mono PCM into a WAV file.
pub(crate) fn pcm16_to_wav(pcm_data: &[u8], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = std::io::Cursor::new(Vec::new());

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for chunk in pcm_data.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that narrates block content using the OpenAI TTS API.
#[derive(Clone)]
pub struct OpenAiTtsAdapter {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    voice_en: Voice,
    voice_es: Voice,
}

impl OpenAiTtsAdapter {
    /// Creates a new `OpenAiTtsAdapter` with one voice per supported language.
    pub fn new(
        client: Client<OpenAIConfig>,
        model: SpeechModel,
        voice_en: Voice,
        voice_es: Voice,
    ) -> Self {
        Self {
            client,
            model,
            voice_en,
            voice_es,
        }
    }

    fn voice(&self, language: Language) -> Voice {
        match language {
            Language::En => self.voice_en.clone(),
            Language::Es => self.voice_es.clone(),
        }
    }

    /// Narrates `text` and returns a `data:audio/wav` locator.
    pub async fn narrate(&self, text: &str, language: Language) -> PortResult<String> {
        let request = CreateSpeechRequestArgs::default()
            .model(self.model.clone())
            .input(narration_prompt(text))
            .voice(self.voice(language))
            .response_format(SpeechResponseFormat::Pcm)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .audio()
            .speech()
            .create(request)
            .await
            .map_err(|e: OpenAIError| service_error(e))?;

        if response.bytes.is_empty() {
            return Err(PortError::Malformed("Speech service returned no audio.".to_string()));
        }

        let wav = pcm16_to_wav(&response.bytes, PCM_SAMPLE_RATE)
            .map_err(|e| PortError::Unexpected(format!("Failed to encode WAV: {}", e)))?;
        Ok(format!("data:audio/wav;base64,{}", STANDARD.encode(wav)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_describes_the_pcm_payload() {
        let pcm: Vec<u8> = [0i16, 1000, -1000, i16::MAX]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let wav = pcm16_to_wav(&pcm, PCM_SAMPLE_RATE).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(wav.len(), 44 + pcm.len());

        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 24_000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.into_samples().map(Result::unwrap).collect();
        assert_eq!(samples, [0, 1000, -1000, i16::MAX]);
    }

    #[test]
    fn narration_skips_markup() {
        assert_eq!(
            narration_prompt("<p>Label <b>every</b> drum.</p>"),
            "Professional narrator: Label every drum."
        );
    }

    #[test]
    fn voices_resolve_case_insensitively() {
        assert!(matches!(voice_from_name(" Nova "), Some(Voice::Nova)));
        assert!(voice_from_name("zephyr").is_none());
    }
}
