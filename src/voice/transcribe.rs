//! Speech-to-text over an OpenAI-compatible `/audio/transcriptions` endpoint

use std::io::Cursor;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::http::{self, HttpError};
use super::{PipelineError, RawAudio, Transcriber};

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Encode mono PCM as a 16-bit WAV file in memory
pub fn encode_wav(audio: &RawAudio) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in &audio.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

pub struct HttpTranscriber {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl HttpTranscriber {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: http::build_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }

    async fn request(&self, wav: Vec<u8>) -> Result<String, HttpError> {
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("speech.wav")
            .mime_str("audio/wav")
            .map_err(http::map_reqwest_error)?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", part);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(http::map_reqwest_error)?;
        let response = http::check_response_status(response).await?;
        let body: TranscriptionResponse =
            response.json().await.map_err(http::map_reqwest_error)?;
        Ok(body.text)
    }
}

impl Transcriber for HttpTranscriber {
    fn transcribe(&self, audio: RawAudio) -> BoxFuture<'_, Result<String, PipelineError>> {
        Box::pin(async move {
            let wav = encode_wav(&audio).map_err(|e| PipelineError::Mic(e.to_string()))?;
            debug!("Uploading {} bytes of audio to {}", wav.len(), self.endpoint());
            // The form is consumed per attempt, so every retry gets its own copy
            http::with_retry("Transcription", || self.request(wav.clone()))
                .await
                .map_err(|e| PipelineError::SpeechService(e.to_string()))
        })
    }
}
