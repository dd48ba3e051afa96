//! Transcription hand-off
//!
//! Speech-to-text is an external service behind [`Transcriber`]. The
//! service wrapper bounds every request with a timeout and a cancellation
//! token; whatever goes wrong comes back as
//! [`Error::TranscriptionFailed`]. Artifacts are only read, so a failed
//! transcription leaves them as they were.

use async_trait::async_trait;
use chrono::Local;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TranscriptionConfig;
use crate::error::{Error, Result};
use crate::sink::AudioArtifact;

/// Speech-to-text backend
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a WAV file
    async fn transcribe(&self, wav: Vec<u8>, sample_rate: u32) -> Result<String>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Transcriber with a deadline and a cancellation switch
pub struct TranscriptionService {
    transcriber: Arc<dyn Transcriber>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl TranscriptionService {
    pub fn new(transcriber: Arc<dyn Transcriber>, timeout: Duration) -> Self {
        Self {
            transcriber,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that cancels every pending and future request of this service
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Transcribe WAV bytes
    pub async fn transcribe_wav(&self, wav: Vec<u8>, sample_rate: u32) -> Result<String> {
        let name = self.transcriber.name().to_string();
        debug!("Sending {} bytes of audio to {}", wav.len(), name);

        let request = self.transcriber.transcribe(wav, sample_rate);
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(Error::transcription_failed(format!("{} request cancelled", name)))
            }
            result = tokio::time::timeout(self.timeout, request) => match result {
                Err(_) => Err(Error::transcription_failed(format!(
                    "{} did not answer within {:?}",
                    name, self.timeout
                ))),
                Ok(Err(Error::TranscriptionFailed(reason))) => Err(Error::TranscriptionFailed(reason)),
                Ok(Err(err)) => Err(Error::transcription_failed(err.to_string())),
                Ok(Ok(text)) => Ok(text),
            },
        };

        if let Err(err) = &outcome {
            warn!("{}", err);
        }
        outcome
    }

    /// Transcribe a finished artifact
    pub async fn transcribe_artifact(&self, artifact: &AudioArtifact) -> Result<String> {
        let wav = artifact.to_wav_bytes()?;
        let text = self.transcribe_wav(wav, artifact.sample_rate()).await?;
        info!("Transcribed {} ({:.2}s)", artifact.key(), artifact.duration_secs());
        Ok(text)
    }
}

/// Client for an OpenAI-compatible `/audio/transcriptions` endpoint
pub struct HttpTranscriber {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpTranscriber {
    pub fn new(endpoint: &str, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: format!("{}/audio/transcriptions", endpoint.trim_end_matches('/')),
            api_key,
            model: model.into(),
        }
    }

    /// Build from configuration; requires `endpoint`
    pub fn from_config(config: &TranscriptionConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::config("transcription.endpoint is not set"))?;
        Ok(Self::new(endpoint, config.api_key.clone(), config.model.clone()))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, wav: Vec<u8>, _sample_rate: u32) -> Result<String> {
        let part = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::transcription_failed(e.to_string()))?;
        let form = Form::new().part("file", part).text("model", self.model.clone());

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::transcription_failed(format!("request to {} failed: {}", self.url, e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transcription_failed(format!("{}: {}", status, body)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::transcription_failed(format!("invalid response: {}", e)))?;
        json["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::transcription_failed("response has no \"text\" field"))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Write a transcript to `dir/output-<YYYYmmdd_HHMMSS>.txt`
pub fn write_transcript(dir: &Path, text: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("output-{}.txt", Local::now().format("%Y%m%d_%H%M%S")));
    std::fs::write(&path, text)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Transcriber for Echo {
        async fn transcribe(&self, wav: Vec<u8>, sample_rate: u32) -> Result<String> {
            Ok(format!("{} bytes at {} Hz", wav.len(), sample_rate))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_passthrough() {
        let service = TranscriptionService::new(Arc::new(Echo), Duration::from_secs(1));
        let text = service.transcribe_wav(vec![0; 10], 8000).await.unwrap();
        assert_eq!(text, "10 bytes at 8000 Hz");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let service = TranscriptionService::new(Arc::new(Echo), Duration::from_secs(1));
        service.cancel();
        let result = service.transcribe_wav(vec![0; 10], 8000).await;
        assert!(matches!(result, Err(Error::TranscriptionFailed(_))));
    }

    #[test]
    fn test_http_url() {
        let transcriber = HttpTranscriber::new("http://localhost:8000/v1/", None, "whisper-1");
        assert_eq!(transcriber.url(), "http://localhost:8000/v1/audio/transcriptions");
        assert!(HttpTranscriber::from_config(&TranscriptionConfig::default()).is_err());
    }

    #[test]
    fn test_write_transcript() {
        let dir = temp_dir::TempDir::new().unwrap();
        let path = write_transcript(dir.path(), "hello").unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("output-") && name.ends_with(".txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }
}
