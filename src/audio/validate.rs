//! # Upload Validation
//!
//! Pure, stateless checks on the inbound audio field. Validation runs before
//! any scratch file is written and before a recognizer handle is taken from
//! the pool, so malformed input never consumes a scarce resource.

use crate::error::AppError;
use std::path::Path;

/// The single audio container format the service accepts.
pub const ACCEPTED_EXTENSION: &str = "wav";

/// Raw bytes of an uploaded audio file plus the filename the client declared.
///
/// Owned by the transcription pipeline for the duration of one request and
/// discarded after the scratch file is written.
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Validate the inbound audio field.
///
/// ## Checks (in order):
/// 1. The field is present at all
/// 2. The declared filename is non-empty
/// 3. The extension is `.wav` (case-insensitive)
/// 4. The payload is non-empty
///
/// Returns the accepted upload unchanged, or a `Validation` error with a
/// human-readable reason. No side effects.
pub fn validate_upload(upload: Option<&UploadedAudio>) -> Result<&UploadedAudio, AppError> {
    let upload = upload.ok_or_else(|| AppError::Validation("Missing audio file".to_string()))?;

    if upload.filename.is_empty() {
        return Err(AppError::Validation("Invalid file name".to_string()));
    }

    let extension = Path::new(&upload.filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    if !extension.eq_ignore_ascii_case(ACCEPTED_EXTENSION) {
        return Err(AppError::Validation(
            "Only WAV files (.wav) are accepted".to_string(),
        ));
    }

    if upload.bytes.is_empty() {
        return Err(AppError::Validation("Audio file is empty".to_string()));
    }

    Ok(upload)
}
