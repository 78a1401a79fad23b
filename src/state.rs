//! # Application State Management
//!
//! This module wires the shared resources every HTTP request handler needs:
//! configuration, metrics, the recognizer pool, the warm-up scheduler, and
//! the transcription pipeline.
//!
//! ## Ownership model:
//! Everything process-wide is an explicitly constructed component held in
//! `AppState` and passed to handlers via `web::Data` — no module-level
//! singletons. That keeps lifetimes visible and lets tests build isolated
//! states with stub backends and temp scratch directories.
//!
//! ## Thread Safety Pattern:
//! - `Arc<RwLock<T>>` for data handlers read often and rarely write
//!   (configuration, metrics)
//! - The pool and scheduler manage their own internal locking; `AppState`
//!   just shares them via `Arc`

use crate::config::AppConfig;
use crate::error::AppError;
use crate::recognition::{
    GoogleSpeechBackend, HandleFactory, RecognizerHandle, RecognizerPool, TranscriptionPipeline,
    WarmUpScheduler,
};
use crate::storage::ScratchStore;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// The main application state shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Performance metrics (updated by middleware on every request)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// Bounded pool of recognizer handles
    pub pool: Arc<RecognizerPool>,

    /// Warm-up scheduler (periodic loop + health-check triggers)
    pub warmup: Arc<WarmUpScheduler>,

    /// Orchestrates one transcription request end to end
    pub pipeline: Arc<TranscriptionPipeline>,

    /// When the server started (Instant is Copy, no locking needed)
    pub start_time: Instant,
}

/// Performance metrics collected across all HTTP requests.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of errors encountered since server start
    pub error_count: u64,

    /// Detailed metrics for each API endpoint, keyed by "METHOD /path"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Build the state for production: recognizer handles talk to the real
    /// speech API described by the configuration.
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let recognizer = config.recognizer.clone();
        let timeout = Duration::from_secs(recognizer.request_timeout_secs);

        let factory: Box<HandleFactory> = Box::new(move || {
            let backend = GoogleSpeechBackend::new(
                recognizer.api_endpoint.clone(),
                recognizer.api_key.clone(),
                timeout,
            )?;
            Ok(RecognizerHandle::new(Arc::new(backend)))
        });

        Self::with_factory(config, factory)
    }

    /// Build the state around an arbitrary handle factory.
    ///
    /// This is the seam tests use to substitute a stub backend; production
    /// code goes through [`AppState::new`].
    pub fn with_factory(config: AppConfig, factory: Box<HandleFactory>) -> Result<Self, AppError> {
        let pool = Arc::new(RecognizerPool::new(
            config.recognizer.initial_handles,
            config.recognizer.max_retained_handles,
            factory,
        )?);

        let warmup = Arc::new(WarmUpScheduler::new(
            Arc::clone(&pool),
            Duration::from_secs(config.warmup.interval_secs),
            Duration::from_secs(config.warmup.handle_timeout_secs),
            config.recognizer.language.clone(),
        ));

        let store = ScratchStore::new(config.storage.scratch_dir.clone())?;
        let pipeline = Arc::new(TranscriptionPipeline::new(
            Arc::clone(&pool),
            store,
            config.recognizer.language.clone(),
            Duration::from_secs(config.recognizer.request_timeout_secs),
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            pool,
            warmup,
            pipeline,
            start_time: Instant::now(),
        })
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the read lock immediately so other requests are not
    /// blocked; `AppConfig` is cheap to clone.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Update the configuration after validating it.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    /// Increment the total error counter (called when any request fails).
    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        let endpoint_metric = metrics
            .endpoint_metrics
            .entry(endpoint.to_string())
            .or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// Clones so no lock is held while the HTTP response is serialized.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time for this endpoint in milliseconds.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate for this endpoint (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioClip;
    use crate::recognition::{RecognizeError, SpeechBackend};
    use async_trait::async_trait;

    struct NullBackend;

    #[async_trait]
    impl SpeechBackend for NullBackend {
        async fn recognize(
            &self,
            _clip: &AudioClip,
            _language: &str,
        ) -> Result<String, RecognizeError> {
            Ok(String::new())
        }
    }

    fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.scratch_dir = dir.path().to_string_lossy().into_owned();
        // Leak the tempdir so the scratch path outlives the state in tests
        std::mem::forget(dir);

        AppState::with_factory(
            config,
            Box::new(|| Ok(RecognizerHandle::new(Arc::new(NullBackend)))),
        )
        .unwrap()
    }

    #[test]
    fn test_state_seeds_pool() {
        let state = test_state();
        assert_eq!(state.pool.idle_count(), 2);
    }

    #[test]
    fn test_metrics_recording() {
        let state = test_state();

        state.increment_request_count();
        state.increment_request_count();
        state.increment_error_count();
        state.record_endpoint_request("POST /transcribe", 120, false);
        state.record_endpoint_request("POST /transcribe", 80, true);

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.request_count, 2);
        assert_eq!(snapshot.error_count, 1);

        let metric = &snapshot.endpoint_metrics["POST /transcribe"];
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.average_duration_ms(), 100.0);
        assert_eq!(metric.error_rate(), 0.5);
    }

    #[test]
    fn test_update_config_validates() {
        let state = test_state();

        let mut bad = state.get_config();
        bad.server.port = 0;
        assert!(state.update_config(bad).is_err());

        let mut good = state.get_config();
        good.recognizer.language = "en-US".to_string();
        assert!(state.update_config(good).is_ok());
        assert_eq!(state.get_config().recognizer.language, "en-US");
    }
}
