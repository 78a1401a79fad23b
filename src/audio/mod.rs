//! # Audio Module
//!
//! Everything the transcription pipeline needs to know about audio before it
//! reaches the recognition backend: upload validation, WAV decoding, and the
//! in-memory clip representation sent over the wire.
//!
//! ## Key Components:
//! - **Upload Validator**: Checks the multipart field before any resource is touched
//! - **WAV Decoder**: Reads a stored WAV file into a mono PCM buffer
//! - **Audio Clip**: Decoded mono samples plus sample rate, ready for recognition
//!
//! ## Audio Format Requirements:
//! - **Container**: WAV only (`.wav` extension, checked case-insensitively)
//! - **Channels**: Any channel count on input; multi-channel audio is
//!   downmixed to mono before recognition
//! - **Encoding**: 8/16/24-bit integer or 32-bit float PCM, normalized to
//!   16-bit signed samples for the backend

pub mod clip;      // Decoded audio buffer sent to the backend
pub mod decode;    // WAV file decoding
pub mod validate;  // Upload validation (runs before storage and pool)

pub use clip::AudioClip;
pub use decode::decode_wav;
pub use validate::{validate_upload, UploadedAudio, ACCEPTED_EXTENSION};
