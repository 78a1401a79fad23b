//! # Recognition Module
//!
//! The heart of the service: a bounded pool of reusable recognizer handles, a
//! warm-up scheduler that hides cold-start latency, and the pipeline that
//! orchestrates one transcription request end to end.
//!
//! ## Key Components:
//! - **Speech Backend**: Opaque remote recognition service behind a trait,
//!   so tests can stub it and deployments can swap implementations
//! - **Recognizer Pool**: Hands out one handle per in-flight request, never
//!   blocks on exhaustion, retains up to a configured number of idle handles
//! - **Warm-up Scheduler**: Periodically (and opportunistically, from health
//!   checks) exercises idle handles against a silent clip
//! - **Transcription Pipeline**: Validate → store → acquire → decode →
//!   recognize → release everything, on every exit path
//!
//! ## Why a pool:
//! A fresh handle pays cold-start cost on its first recognition (new HTTP
//! client, new connections). Reusing warm handles keeps steady-state latency
//! down; the warm-up scheduler keeps them warm across idle periods.

pub mod backend;   // SpeechBackend trait + remote implementation
pub mod pipeline;  // Request orchestration
pub mod pool;      // Bounded recognizer handle pool
pub mod warmup;    // Periodic and opportunistic warm-up

pub use backend::{GoogleSpeechBackend, RecognizeError, SpeechBackend};
pub use pipeline::{TranscriptOutcome, TranscriptionPipeline};
pub use pool::{HandleFactory, RecognizerHandle, RecognizerPool};
pub use warmup::WarmUpScheduler;
