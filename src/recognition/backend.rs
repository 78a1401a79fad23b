//! # Speech Recognition Backend
//!
//! The recognition service is an opaque external collaborator: given a
//! decoded mono audio buffer and a language hint it either returns a
//! transcript, reports "could not understand", or fails. The trait keeps the
//! rest of the service independent of which backend is wired in, and lets
//! tests substitute a stub.

use crate::audio::AudioClip;
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::time::Duration;

/// Outcome of a recognition call that did not produce a transcript.
#[derive(Debug)]
pub enum RecognizeError {
    /// The backend could not make out any speech. This is a normal outcome
    /// for silence or noise, not a service failure.
    Unintelligible,

    /// Connectivity, quota, or service failure with a diagnostic detail.
    Unavailable(String),
}

impl fmt::Display for RecognizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognizeError::Unintelligible => write!(f, "speech could not be understood"),
            RecognizeError::Unavailable(detail) => {
                write!(f, "recognition service unavailable: {}", detail)
            }
        }
    }
}

/// A recognition backend that turns audio into text.
///
/// Implementations must be safe to call from multiple tasks; per-handle
/// mutable state lives in [`crate::recognition::RecognizerHandle`], not here.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Recognize speech in `clip` using the given language hint
    /// (BCP-47 tag such as `"vi-VN"` or `"en-US"`).
    async fn recognize(&self, clip: &AudioClip, language: &str)
        -> Result<String, RecognizeError>;
}

/// Client for the Google Web Speech API.
///
/// ## Protocol:
/// POSTs raw little-endian 16-bit PCM (`audio/l16`) to the recognize
/// endpoint and parses the line-delimited JSON reply. An empty hypothesis
/// set means the API heard nothing it could transcribe.
///
/// ## Cold vs warm:
/// Each instance owns its HTTP client and therefore its connection pool. The
/// first request after construction (or after the remote end dropped idle
/// connections) pays TCP/TLS setup; that is the cold-start cost the warm-up
/// scheduler exists to hide.
pub struct GoogleSpeechBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GoogleSpeechBackend {
    /// Build a client with the mandatory request timeout. A hung backend
    /// surfaces as `Unavailable`, never as an indefinitely stalled request.
    pub fn new(endpoint: String, api_key: String, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl SpeechBackend for GoogleSpeechBackend {
    async fn recognize(
        &self,
        clip: &AudioClip,
        language: &str,
    ) -> Result<String, RecognizeError> {
        let url = format!(
            "{}?client=chromium&lang={}&key={}",
            self.endpoint, language, self.api_key
        );

        tracing::debug!(
            duration_secs = clip.duration_secs(),
            sample_rate = clip.sample_rate,
            language = %language,
            "Sending audio to speech API"
        );

        let response = self
            .client
            .post(&url)
            .header(
                CONTENT_TYPE,
                format!("audio/l16; rate={}", clip.sample_rate),
            )
            .body(clip.to_linear16())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RecognizeError::Unavailable("speech API request timed out".to_string())
                } else {
                    RecognizeError::Unavailable(format!("speech API request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecognizeError::Unavailable(format!(
                "speech API returned status {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RecognizeError::Unavailable(format!("failed to read reply: {}", e)))?;

        parse_transcript(&body)
    }
}

/// Pull the best hypothesis out of the API's line-delimited JSON reply.
///
/// The API streams one JSON object per line; the first line is usually an
/// empty `{"result":[]}` placeholder, so every line is checked.
fn parse_transcript(body: &str) -> Result<String, RecognizeError> {
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        let transcript = value
            .get("result")
            .and_then(|r| r.get(0))
            .and_then(|r| r.get("alternative"))
            .and_then(|a| a.get(0))
            .and_then(|a| a.get("transcript"))
            .and_then(|t| t.as_str());

        if let Some(text) = transcript {
            return Ok(text.to_string());
        }
    }

    Err(RecognizeError::Unintelligible)
}
