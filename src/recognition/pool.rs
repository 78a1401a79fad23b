//! # Recognizer Pool
//!
//! A bounded collection of idle recognizer handles. One handle is checked out
//! per in-flight request and returned afterwards; the pool never blocks a
//! request waiting for a handle — on exhaustion it constructs a fresh (cold)
//! one, trading a warm-up penalty for availability.
//!
//! ## Ownership discipline:
//! A handle is owned by exactly one of: an in-flight request (checked out),
//! the pool's idle list, or nobody (discarded on return when the pool is at
//! capacity). The mutex protects only the idle list itself and is never held
//! across I/O; handle use happens entirely outside the lock.

use crate::audio::AudioClip;
use crate::error::AppError;
use crate::recognition::backend::{RecognizeError, SpeechBackend};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A reusable unit of recognition state.
///
/// Owns its backend client (and therefore its connection pool); reuse across
/// requests is what keeps steady-state latency low.
pub struct RecognizerHandle {
    id: Uuid,
    backend: Arc<dyn SpeechBackend>,
    created_at: Instant,
    uses: u64,
}

impl RecognizerHandle {
    pub fn new(backend: Arc<dyn SpeechBackend>) -> Self {
        Self {
            id: Uuid::new_v4(),
            backend,
            created_at: Instant::now(),
            uses: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// How many recognition calls this handle has served (including warm-ups).
    pub fn uses(&self) -> u64 {
        self.uses
    }

    /// Run one recognition call through this handle.
    ///
    /// Takes `&mut self` deliberately: the type system enforces that a handle
    /// is never used by two callers at once.
    pub async fn recognize(
        &mut self,
        clip: &AudioClip,
        language: &str,
    ) -> Result<String, RecognizeError> {
        self.uses += 1;
        self.backend.recognize(clip, language).await
    }
}

/// Constructs a fresh handle when the pool is empty or being seeded.
pub type HandleFactory = dyn Fn() -> Result<RecognizerHandle, AppError> + Send + Sync;

/// Bounded pool of idle recognizer handles.
pub struct RecognizerPool {
    idle: Mutex<Vec<RecognizerHandle>>,
    max_retained: usize,
    factory: Box<HandleFactory>,
}

impl RecognizerPool {
    /// Create a pool seeded with `initial` handles, retaining at most
    /// `max_retained` idle handles on return.
    pub fn new(
        initial: usize,
        max_retained: usize,
        factory: Box<HandleFactory>,
    ) -> Result<Self, AppError> {
        let mut idle = Vec::with_capacity(max_retained);
        for _ in 0..initial {
            idle.push(factory()?);
        }

        tracing::info!(initial, max_retained, "Recognizer pool initialized");

        Ok(Self {
            idle: Mutex::new(idle),
            max_retained,
            factory,
        })
    }

    /// Check out a handle: pop an idle one if available, otherwise construct
    /// a fresh (unwarmed) one. Never waits on another request.
    pub fn acquire(&self) -> Result<RecognizerHandle, AppError> {
        // Lock covers only the pop; construction happens after it is released
        let recycled = self.idle.lock().unwrap().pop();

        match recycled {
            Some(handle) => {
                tracing::debug!(handle = %handle.id(), uses = handle.uses(), "Reusing pooled handle");
                Ok(handle)
            }
            None => {
                tracing::debug!("Pool empty, constructing fresh recognizer handle");
                (self.factory)()
            }
        }
    }

    /// Return a handle after use. If the pool already retains `max_retained`
    /// idle handles, the handle is discarded instead.
    ///
    /// Callers must invoke this on failure paths too — a handle is never
    /// leaked because recognition failed.
    pub fn release(&self, handle: RecognizerHandle) {
        let mut idle = self.idle.lock().unwrap();
        if idle.len() < self.max_retained {
            idle.push(handle);
        } else {
            tracing::debug!(
                handle = %handle.id(),
                age_secs = handle.age().as_secs(),
                uses = handle.uses(),
                "Pool at capacity, discarding handle"
            );
        }
    }

    /// Number of idle handles at rest. Observability only (health endpoint).
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap().len()
    }

    pub fn max_retained(&self) -> usize {
        self.max_retained
    }

    /// Take every idle handle out of the pool in one critical section.
    ///
    /// Used by the warm-up scheduler: the snapshot is processed outside the
    /// lock and the handles come back through [`RecognizerPool::release`].
    pub fn drain_idle(&self) -> Vec<RecognizerHandle> {
        let mut idle = self.idle.lock().unwrap();
        std::mem::take(&mut *idle)
    }
}
