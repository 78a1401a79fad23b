//! # Transcription Pipeline
//!
//! Orchestrates one transcription request end to end:
//!
//! 1. Validate the upload (no resources touched on failure)
//! 2. Write it to scratch storage under a scoped guard
//! 3. Check a recognizer handle out of the pool
//! 4. Decode the stored WAV into a mono clip
//! 5. Recognize with the configured language hint and a timeout
//! 6. Release the handle — always, whatever step 4/5 did
//! 7. Release the scratch file — always (guard drop)
//!
//! ## Outcome mapping:
//! "Could not understand the speech" is deliberately a *successful* outcome
//! with an empty transcript, not an error: silence and noise are normal
//! inputs. Connectivity and quota failures become `BackendUnavailable`; a
//! hung backend is cut off by the timeout and reported the same way.

use crate::audio::{decode_wav, validate_upload, UploadedAudio};
use crate::error::AppError;
use crate::recognition::backend::RecognizeError;
use crate::recognition::pool::{RecognizerHandle, RecognizerPool};
use crate::storage::ScratchStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// A recognition result the caller sees as success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptOutcome {
    /// The backend produced a transcript (possibly short, never empty).
    Recognized(String),

    /// The backend heard nothing it could transcribe. Surfaced to the caller
    /// as an empty transcript with no error.
    Unintelligible,
}

impl TranscriptOutcome {
    pub fn into_text(self) -> String {
        match self {
            TranscriptOutcome::Recognized(text) => text,
            TranscriptOutcome::Unintelligible => String::new(),
        }
    }
}

pub struct TranscriptionPipeline {
    pool: Arc<RecognizerPool>,
    store: ScratchStore,
    language: String,
    request_timeout: Duration,
}

impl TranscriptionPipeline {
    pub fn new(
        pool: Arc<RecognizerPool>,
        store: ScratchStore,
        language: String,
        request_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            store,
            language,
            request_timeout,
        }
    }

    /// Run one request through the pipeline.
    ///
    /// Resource discipline: once the handle is acquired, every path — decode
    /// failure, backend failure, timeout, success — goes through the single
    /// release below before this function returns. The scratch file guard is
    /// dropped on the same paths, including unwinds.
    pub async fn transcribe(
        &self,
        upload: Option<UploadedAudio>,
    ) -> Result<TranscriptOutcome, AppError> {
        let audio = validate_upload(upload.as_ref())?;

        let stored = self.store.store(&audio.bytes).await?;
        let mut handle = self.pool.acquire()?;

        let result = self.recognize_stored(stored.path(), &mut handle).await;

        self.pool.release(handle);

        match &result {
            Ok(TranscriptOutcome::Recognized(text)) => {
                tracing::info!(chars = text.len(), "Transcription completed");
            }
            Ok(TranscriptOutcome::Unintelligible) => {
                tracing::info!("No speech detected in audio");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Transcription failed");
            }
        }

        result
        // `stored` drops here: scratch file removed on every path
    }

    async fn recognize_stored(
        &self,
        path: &Path,
        handle: &mut RecognizerHandle,
    ) -> Result<TranscriptOutcome, AppError> {
        let clip = decode_wav(path)?;

        tracing::debug!(
            handle = %handle.id(),
            duration_secs = clip.duration_secs(),
            "Recognizing stored audio"
        );

        let outcome = tokio::time::timeout(
            self.request_timeout,
            handle.recognize(&clip, &self.language),
        )
        .await;

        match outcome {
            Ok(Ok(text)) => Ok(TranscriptOutcome::Recognized(text)),
            Ok(Err(RecognizeError::Unintelligible)) => Ok(TranscriptOutcome::Unintelligible),
            Ok(Err(RecognizeError::Unavailable(detail))) => {
                Err(AppError::BackendUnavailable(detail))
            }
            Err(_) => Err(AppError::BackendUnavailable(format!(
                "recognition timed out after {}s",
                self.request_timeout.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioClip;
    use crate::recognition::backend::SpeechBackend;
    use crate::recognition::pool::HandleFactory;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wav::{BitDepth, Header};

    /// What the stub backend should pretend the remote service did.
    #[derive(Clone)]
    enum Script {
        Say(String),
        Silence,
        Down(String),
        Hang,
    }

    struct ScriptedBackend {
        script: Script,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SpeechBackend for ScriptedBackend {
        async fn recognize(
            &self,
            _clip: &AudioClip,
            _language: &str,
        ) -> Result<String, RecognizeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Say(text) => Ok(text.clone()),
                Script::Silence => Err(RecognizeError::Unintelligible),
                Script::Down(detail) => Err(RecognizeError::Unavailable(detail.clone())),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("hung backend should be cut off by the timeout")
                }
            }
        }
    }

    struct Fixture {
        pipeline: TranscriptionPipeline,
        pool: Arc<RecognizerPool>,
        calls: Arc<AtomicUsize>,
        scratch: tempfile::TempDir,
    }

    fn fixture(script: Script) -> Fixture {
        let calls = Arc::new(AtomicUsize::new(0));
        let factory: Box<HandleFactory> = {
            let calls = calls.clone();
            Box::new(move || {
                Ok(RecognizerHandle::new(Arc::new(ScriptedBackend {
                    script: script.clone(),
                    calls: calls.clone(),
                })))
            })
        };

        let pool = Arc::new(RecognizerPool::new(2, 4, factory).unwrap());
        let scratch = tempfile::tempdir().unwrap();
        let store = ScratchStore::new(scratch.path()).unwrap();
        let pipeline = TranscriptionPipeline::new(
            Arc::clone(&pool),
            store,
            "en-US".to_string(),
            Duration::from_millis(200),
        );

        Fixture {
            pipeline,
            pool,
            calls,
            scratch,
        }
    }

    fn wav_bytes(samples: Vec<i16>) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        let header = Header::new(wav::WAV_FORMAT_PCM, 1, 16000, 16);
        wav::write(header, &BitDepth::Sixteen(samples), &mut cursor).unwrap();
        cursor.into_inner()
    }

    fn wav_upload(filename: &str) -> Option<UploadedAudio> {
        Some(UploadedAudio {
            filename: filename.to_string(),
            bytes: wav_bytes(vec![100; 16000]),
        })
    }

    fn scratch_is_empty(fx: &Fixture) -> bool {
        std::fs::read_dir(fx.scratch.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_successful_transcription() {
        let fx = fixture(Script::Say("hello".to_string()));

        let outcome = fx.pipeline.transcribe(wav_upload("clip.wav")).await.unwrap();

        assert_eq!(outcome, TranscriptOutcome::Recognized("hello".to_string()));
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.pool.idle_count(), 2, "handle returned to the pool");
        assert!(scratch_is_empty(&fx), "scratch file cleaned up");
    }

    #[tokio::test]
    async fn test_unintelligible_is_success_with_empty_transcript() {
        let fx = fixture(Script::Silence);

        let outcome = fx.pipeline.transcribe(wav_upload("clip.wav")).await.unwrap();

        assert_eq!(outcome, TranscriptOutcome::Unintelligible);
        assert_eq!(outcome.into_text(), "");
        assert_eq!(fx.pool.idle_count(), 2);
        assert!(scratch_is_empty(&fx));
    }

    #[tokio::test]
    async fn test_validation_failure_touches_no_resources() {
        let fx = fixture(Script::Say("never".to_string()));

        let err = fx.pipeline.transcribe(None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = fx
            .pipeline
            .transcribe(Some(UploadedAudio {
                filename: "clip.mp3".to_string(),
                bytes: b"mpeg".to_vec(),
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(fx.calls.load(Ordering::SeqCst), 0, "backend never called");
        assert_eq!(fx.pool.idle_count(), 2, "pool untouched");
        assert!(scratch_is_empty(&fx), "nothing stored");
    }

    #[tokio::test]
    async fn test_backend_failure_still_releases_everything() {
        let fx = fixture(Script::Down("quota exceeded".to_string()));

        let err = fx.pipeline.transcribe(wav_upload("clip.wav")).await.unwrap_err();

        assert!(matches!(err, AppError::BackendUnavailable(ref d) if d == "quota exceeded"));
        assert_eq!(fx.pool.idle_count(), 2);
        assert!(scratch_is_empty(&fx));
    }

    #[tokio::test]
    async fn test_hung_backend_times_out_as_unavailable() {
        let fx = fixture(Script::Hang);

        let err = fx.pipeline.transcribe(wav_upload("clip.wav")).await.unwrap_err();

        assert!(matches!(err, AppError::BackendUnavailable(_)));
        assert_eq!(fx.pool.idle_count(), 2);
        assert!(scratch_is_empty(&fx));
    }

    #[tokio::test]
    async fn test_undecodable_audio_is_storage_error_with_cleanup() {
        let fx = fixture(Script::Say("never".to_string()));

        let err = fx
            .pipeline
            .transcribe(Some(UploadedAudio {
                filename: "clip.wav".to_string(),
                bytes: b"not really a wav".to_vec(),
            }))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.pool.idle_count(), 2, "handle released despite decode failure");
        assert!(scratch_is_empty(&fx));
    }

    #[tokio::test]
    async fn test_pool_count_stable_across_sequential_requests() {
        let fx = fixture(Script::Say("hi".to_string()));
        let before = fx.pool.idle_count();

        for _ in 0..10 {
            fx.pipeline.transcribe(wav_upload("clip.wav")).await.unwrap();
        }

        assert_eq!(fx.pool.idle_count(), before);
    }
}
