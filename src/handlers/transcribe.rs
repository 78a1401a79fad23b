//! # Transcribe Endpoint
//!
//! `POST /transcribe` — accepts a multipart form with a single `audio_data`
//! file field and responds with the transcript:
//!
//! ```json
//! { "transcript": "hello", "error": null }
//! ```
//!
//! Silent or unintelligible audio is still a 200 with an empty transcript;
//! only malformed input (400) and storage/backend failures (5xx) populate
//! the `error` field. The handler only extracts the upload — validation and
//! resource handling live in the pipeline.

use crate::audio::UploadedAudio;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt;
use serde::Serialize;

/// Name of the multipart field carrying the audio file.
pub const AUDIO_FIELD: &str = "audio_data";

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub transcript: String,
    pub error: Option<String>,
}

pub async fn transcribe(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> AppResult<HttpResponse> {
    let upload = read_audio_field(&mut payload).await?;

    let outcome = state.pipeline.transcribe(upload).await?;

    Ok(HttpResponse::Ok().json(TranscribeResponse {
        transcript: outcome.into_text(),
        error: None,
    }))
}

/// Pull the `audio_data` field out of the multipart stream.
///
/// Returns `Ok(None)` when the field is absent so the pipeline's validator
/// produces the canonical "Missing audio file" error; a stream that cannot
/// be parsed at all is malformed client input.
async fn read_audio_field(payload: &mut Multipart) -> Result<Option<UploadedAudio>, AppError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart payload: {}", e)))?
    {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or("")
            .to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read audio field: {}", e)))?
        {
            bytes.extend_from_slice(&chunk);
        }

        return Ok(Some(UploadedAudio { filename, bytes }));
    }

    Ok(None)
}
