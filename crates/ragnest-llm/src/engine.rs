//! Async bridge to the blocking generation backend
//!
//! The backend is not reentrant, so the engine guards it with a fair async mutex: callers
//! queue on the lock without tying up runtime threads, and the holder drives the model on a
//! blocking worker. Streaming hands fragments across a bounded channel whose item type
//! carries the terminal state explicitly.

use futures::{Stream, StreamExt};
use ragnest_core::error::{RagError, Result};
use ragnest_core::models::{EngineStatus, GenerationMode, GenerationRequest, GenerationStats};
use std::future::Future;
use std::ops::ControlFlow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex};

use crate::echo::EchoModel;
use crate::ports::NativeModel;

/// Fragments buffered between the worker and a slow consumer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// How long the worker waits for a consumer to accept a fragment before giving up
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(30);

type SharedModel = Arc<Mutex<Box<dyn NativeModel>>>;

/// Completed non-streaming generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub text: String,
    pub stats: GenerationStats,
}

/// Handle to the process-wide generation backend
///
/// Cheap to clone; every clone shares the same model and lock.
#[derive(Clone)]
pub struct GenerationEngine {
    model: Option<SharedModel>,
    status: EngineStatus,
    mode: GenerationMode,
    channel_capacity: usize,
    stall_timeout: Duration,
}

impl GenerationEngine {
    /// Engine backed by a successfully loaded model
    pub fn loaded(model: Box<dyn NativeModel>) -> Self {
        let status = EngineStatus::Loaded { model: model.model_name().to_string() };
        Self::with_model(model, status, GenerationMode::Native)
    }

    /// Engine running the echo placeholder
    pub fn degraded(reason: impl Into<String>) -> Self {
        let status = EngineStatus::Degraded { reason: reason.into() };
        Self::with_model(Box::new(EchoModel::new()), status, GenerationMode::Degraded)
    }

    /// Engine that rejects every call with `EngineUnavailable`
    pub fn not_loaded() -> Self {
        Self {
            model: None,
            status: EngineStatus::NotLoaded,
            mode: GenerationMode::Degraded,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }

    /// Run `loader`, falling back to degraded mode if it fails
    ///
    /// A missing model never aborts startup.
    pub async fn load<F>(loader: F) -> Self
    where
        F: Future<Output = Result<Box<dyn NativeModel>>>,
    {
        match loader.await {
            Ok(model) => {
                tracing::info!(model = model.model_name(), "Generation model loaded");
                Self::loaded(model)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Generation model unavailable, running in degraded mode");
                Self::degraded(e.to_string())
            }
        }
    }

    fn with_model(model: Box<dyn NativeModel>, status: EngineStatus, mode: GenerationMode) -> Self {
        Self {
            model: Some(Arc::new(Mutex::new(model))),
            status,
            mode,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn status(&self) -> &EngineStatus {
        &self.status
    }

    /// True while a generation holds the model
    pub fn is_busy(&self) -> bool {
        self.model.as_ref().map(|m| m.try_lock().is_err()).unwrap_or(false)
    }

    fn model(&self) -> Result<SharedModel> {
        self.model.clone().ok_or_else(|| RagError::EngineUnavailable {
            reason: "no generation model is loaded".to_string(),
        })
    }

    /// Generate the full response for `request`
    ///
    /// Dropping the returned future before it resolves asks the worker to stop at the
    /// next fragment.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput> {
        request.validate()?;
        let model = self.model()?;
        let mode = self.mode;

        let cancelled = Arc::new(AtomicBool::new(false));
        let _cancel_on_drop = CancelOnDrop(cancelled.clone());

        let queued_at = Instant::now();
        let mut guard = model.lock_owned().await;
        tracing::debug!(
            wait_ms = queued_at.elapsed().as_millis() as u64,
            max_tokens = request.max_tokens,
            "Generation worker acquired"
        );

        tokio::task::spawn_blocking(move || {
            let mut text = String::new();
            let stats = drive(guard.as_mut(), &request, mode, |fragment| {
                if cancelled.load(Ordering::Relaxed) {
                    return ControlFlow::Break(());
                }
                text.push_str(fragment);
                ControlFlow::Continue(())
            })?;
            Ok(GenerationOutput { text, stats })
        })
        .await
        .map_err(|e| RagError::generation(format!("generation worker failed: {}", e)))?
    }

    /// Start a streaming generation
    ///
    /// Resolves once the model lock is held; fragments then arrive through the returned
    /// stream. Dropping the stream stops the worker and releases the model.
    pub async fn generate_stream(&self, request: GenerationRequest) -> Result<TokenStream> {
        request.validate()?;
        let model = self.model()?;
        let mode = self.mode;
        let stall_timeout = self.stall_timeout;
        let runtime = Handle::current();
        let (tx, rx) = mpsc::channel(self.channel_capacity);

        let mut guard = model.lock_owned().await;
        tracing::debug!(max_tokens = request.max_tokens, "Streaming generation started");

        tokio::task::spawn_blocking(move || {
            let send = |event: StreamEvent| -> bool {
                match runtime.block_on(tokio::time::timeout(stall_timeout, tx.send(event))) {
                    Ok(Ok(())) => true,
                    Ok(Err(_)) => {
                        tracing::debug!("Token consumer went away, stopping generation");
                        false
                    }
                    Err(_) => {
                        tracing::warn!(
                            stall_ms = stall_timeout.as_millis() as u64,
                            "Token consumer stalled, stopping generation"
                        );
                        false
                    }
                }
            };

            let result = drive(guard.as_mut(), &request, mode, |fragment| {
                if send(StreamEvent::Fragment(fragment.to_string())) {
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(())
                }
            });

            let terminal = match result {
                Ok(stats) => StreamEvent::Done(stats),
                Err(e) => {
                    tracing::error!(error = %e, "Streaming generation failed");
                    StreamEvent::Failed(e)
                }
            };
            send(terminal);
        });

        Ok(TokenStream::new(rx))
    }
}

/// Drive one generation on the current (blocking) thread, enforcing the token ceiling
fn drive(
    model: &mut dyn NativeModel,
    request: &GenerationRequest,
    mode: GenerationMode,
    mut emit: impl FnMut(&str) -> ControlFlow<()>,
) -> Result<GenerationStats> {
    let started = Instant::now();
    let mut tokens = 0usize;
    let mut truncated = false;

    let outcome = {
        let mut on_token = |fragment: &str| {
            if tokens >= request.max_tokens {
                truncated = true;
                return ControlFlow::Break(());
            }
            tokens += 1;
            emit(fragment)
        };
        catch_unwind(AssertUnwindSafe(|| model.generate(request, &mut on_token)))
    };

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e @ RagError::Generation { .. })) => return Err(e),
        Ok(Err(other)) => return Err(RagError::generation(other.to_string())),
        Err(_) => return Err(RagError::generation("generation model panicked")),
    }

    Ok(GenerationStats {
        tokens,
        elapsed_ms: started.elapsed().as_millis() as u64,
        mode,
        truncated,
    })
}

struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Items carried from the generation worker to the consumer
#[derive(Debug)]
pub enum StreamEvent {
    Fragment(String),
    Done(GenerationStats),
    Failed(RagError),
}

/// Finite, non-restartable sequence of generated fragments
///
/// Yields `Ok(fragment)` items and ends with `None` after success, or yields one `Err`
/// and then `None` after a failure.
pub struct TokenStream {
    rx: mpsc::Receiver<StreamEvent>,
    finished: bool,
    stats: Option<GenerationStats>,
}

impl TokenStream {
    pub fn new(rx: mpsc::Receiver<StreamEvent>) -> Self {
        Self {
            rx,
            finished: false,
            stats: None,
        }
    }

    /// Stats of a successfully completed stream
    pub fn stats(&self) -> Option<&GenerationStats> {
        self.stats.as_ref()
    }

    /// Drain the stream into a single output
    pub async fn collect_text(mut self) -> Result<GenerationOutput> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        let stats = self
            .stats
            .take()
            .ok_or_else(|| RagError::generation("stream ended without completion stats"))?;
        Ok(GenerationOutput { text, stats })
    }
}

impl Stream for TokenStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(StreamEvent::Fragment(fragment))) => Poll::Ready(Some(Ok(fragment))),
            Poll::Ready(Some(StreamEvent::Done(stats))) => {
                this.finished = true;
                this.stats = Some(stats);
                Poll::Ready(None)
            }
            Poll::Ready(Some(StreamEvent::Failed(e))) => {
                this.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(Some(Err(RagError::generation(
                    "generation worker stopped without completing",
                ))))
            }
        }
    }
}
