//! Turns a streaming query into ordered protocol frames
//!
//! A single producer task owns the token stream and emits, in order: optional `progress`
//! frames, one `metadata` frame, buffered `chunk` frames, and finally exactly one
//! `complete` or `error` frame. `heartbeat` frames interleave anywhere before the
//! terminal frame, including while the query waits for retrieval or the engine.

use futures::{Stream, StreamExt};
use ragnest_core::config::RagConfig;
use ragnest_core::error::RagError;
use ragnest_core::models::{FrameKind, StreamFrame};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval};

use crate::models::{QueryPlan, StreamingQuery};
use crate::pipeline::RetrievalPipeline;

/// Frames buffered ahead of a slow consumer
const FRAME_CHANNEL_CAPACITY: usize = 16;

/// Buffering and keep-alive behaviour of a frame stream
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Flush once this many characters are buffered
    pub flush_chars: usize,
    /// Flush once this long has passed since the previous flush
    pub flush_interval: Duration,
    pub heartbeat: Option<Duration>,
    /// Emit `progress` frames for pipeline stages
    pub progress: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            flush_chars: 64,
            flush_interval: Duration::from_millis(50),
            heartbeat: Some(Duration::from_secs(15)),
            progress: false,
        }
    }
}

impl From<&RagConfig> for StreamSettings {
    fn from(config: &RagConfig) -> Self {
        Self {
            flush_chars: config.stream_flush_chars.value.max(1),
            flush_interval: config.stream_flush_interval(),
            heartbeat: config.heartbeat_interval(),
            progress: false,
        }
    }
}

impl StreamSettings {
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }
}

/// Frame producer
#[derive(Debug, Clone, Default)]
pub struct ResponseStreamer {
    settings: StreamSettings,
}

impl ResponseStreamer {
    pub fn new(settings: StreamSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Frame an already started streaming query
    pub fn frames(&self, query: StreamingQuery, correlation_id: Option<String>) -> FrameStream {
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let settings = self.settings.clone();
        tokio::spawn(async move {
            let mut out = Emitter::new(tx, correlation_id);
            let mut heartbeat = keep_alive(&settings);
            pump(&settings, query, &mut out, &mut heartbeat).await;
        });
        FrameStream { rx }
    }

    /// Run the whole query inside the producer
    ///
    /// Failures before generation starts (validation, no results, timeout) become the
    /// stream's single `error` frame.
    pub fn stream_query(
        &self,
        pipeline: Arc<RetrievalPipeline>,
        plan: QueryPlan,
        correlation_id: Option<String>,
    ) -> FrameStream {
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let settings = self.settings.clone();
        tokio::spawn(async move {
            let mut out = Emitter::new(tx, correlation_id);
            let mut heartbeat = keep_alive(&settings);
            if settings.progress && !out.send(StreamFrame::progress("retrieve", 0.0)).await {
                return;
            }

            let prepared = pipeline.query_stream(&plan);
            tokio::pin!(prepared);
            let query = loop {
                tokio::select! {
                    result = &mut prepared => break result,
                    _ = out.closed() => return,
                    _ = tick(&mut heartbeat) => {
                        if !out.send(StreamFrame::heartbeat()).await {
                            return;
                        }
                    }
                }
            };

            match query {
                Ok(query) => {
                    if settings.progress && !out.send(StreamFrame::progress("generate", 0.5)).await {
                        return;
                    }
                    pump(&settings, query, &mut out, &mut heartbeat).await;
                }
                Err(e) => {
                    out.fail(&e).await;
                }
            }
        });
        FrameStream { rx }
    }
}

/// Sends frames, stamping the correlation id
struct Emitter {
    tx: mpsc::Sender<StreamFrame>,
    id: Option<String>,
}

impl Emitter {
    fn new(tx: mpsc::Sender<StreamFrame>, id: Option<String>) -> Self {
        Self { tx, id }
    }

    /// False once the consumer is gone
    async fn send(&mut self, frame: StreamFrame) -> bool {
        let frame = match &self.id {
            Some(id) => frame.with_id(id.clone()),
            None => frame,
        };
        self.tx.send(frame).await.is_ok()
    }

    async fn fail(&mut self, error: &RagError) -> bool {
        tracing::warn!(kind = error.category().as_str(), error = %error, "Stream ended with error");
        self.send(StreamFrame::error(error.category().as_str(), error.to_string())).await
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Text waiting to become a `chunk` frame
struct ChunkBuffer {
    text: String,
    chars: usize,
    last_flush: Instant,
}

impl ChunkBuffer {
    fn new() -> Self {
        Self {
            text: String::new(),
            chars: 0,
            last_flush: Instant::now(),
        }
    }

    fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.chars += fragment.chars().count();
    }

    fn take(&mut self) -> Option<StreamFrame> {
        self.last_flush = Instant::now();
        if self.text.is_empty() {
            return None;
        }
        self.chars = 0;
        Some(StreamFrame::chunk(std::mem::take(&mut self.text)))
    }

    async fn flush(&mut self, out: &mut Emitter) -> bool {
        match self.take() {
            Some(frame) => out.send(frame).await,
            None => true,
        }
    }
}

/// Keep-alive timer; the first tick is one period out
fn keep_alive(settings: &StreamSettings) -> Option<Interval> {
    settings
        .heartbeat
        .filter(|period| !period.is_zero())
        .map(|period| tokio::time::interval_at(Instant::now() + period, period))
}

async fn pump(
    settings: &StreamSettings,
    mut query: StreamingQuery,
    out: &mut Emitter,
    heartbeat: &mut Option<Interval>,
) {
    if !out.send(StreamFrame::json(FrameKind::Metadata, query.metadata())).await {
        return;
    }

    let mut buffer = ChunkBuffer::new();

    loop {
        let flush_at = buffer.last_flush + settings.flush_interval;
        tokio::select! {
            biased;

            _ = out.closed() => {
                tracing::debug!("Frame consumer went away, abandoning generation");
                return;
            }
            _ = tokio::time::sleep_until(query.deadline) => {
                if buffer.flush(out).await {
                    out.fail(&RagError::Timeout {
                        stage: "generate".to_string(),
                        deadline: query.budget,
                    })
                    .await;
                }
                return;
            }
            item = query.tokens.next() => match item {
                Some(Ok(fragment)) => {
                    buffer.push(&fragment);
                    if buffer.chars >= settings.flush_chars && !buffer.flush(out).await {
                        return;
                    }
                }
                Some(Err(e)) => {
                    if buffer.flush(out).await {
                        out.fail(&e).await;
                    }
                    return;
                }
                None => {
                    if buffer.flush(out).await {
                        let completion = query.completion(query.tokens.stats());
                        out.send(StreamFrame::json(FrameKind::Complete, completion)).await;
                    }
                    return;
                }
            },
            _ = tokio::time::sleep_until(flush_at), if !buffer.text.is_empty() => {
                if !buffer.flush(out).await {
                    return;
                }
            }
            _ = tick(heartbeat) => {
                if !out.send(StreamFrame::heartbeat()).await {
                    return;
                }
            }
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Ordered frames of one streamed response; ends after the terminal frame
pub struct FrameStream {
    rx: mpsc::Receiver<StreamFrame>,
}

impl FrameStream {
    /// Collect every frame and encode the whole response
    pub async fn encode_all(self) -> String {
        self.map(|frame| frame.encode()).collect::<Vec<_>>().await.concat()
    }
}

impl Stream for FrameStream {
    type Item = StreamFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_take_resets() {
        let mut buffer = ChunkBuffer::new();
        assert!(buffer.take().is_none());

        buffer.push("héllo ");
        buffer.push("world");
        assert_eq!(buffer.chars, 11);

        let frame = buffer.take().unwrap();
        assert_eq!(frame.kind, FrameKind::Chunk);
        assert_eq!(frame.data, "héllo world");
        assert_eq!(buffer.chars, 0);
        assert!(buffer.take().is_none());
    }

    #[test]
    fn test_settings_from_config() {
        let config = RagConfig::with_defaults();
        let settings = StreamSettings::from(&config);
        assert_eq!(settings.flush_chars, 64);
        assert_eq!(settings.flush_interval, Duration::from_millis(50));
        assert_eq!(settings.heartbeat, Some(Duration::from_secs(15)));
    }
}
