//! Frames of the streaming response protocol
//!
//! Wire format per frame:
//!
//! ```text
//! id: <correlation id>      (optional)
//! event: <kind>
//! data: <line 1>
//! data: <line 2>
//!
//! ```
//!
//! Clients split frames on blank lines and re-join `data:` lines with `\n`.

use serde::{Deserialize, Serialize};

/// Frame type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    Metadata,
    Progress,
    Chunk,
    Complete,
    Error,
    Heartbeat,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Metadata => "metadata",
            FrameKind::Progress => "progress",
            FrameKind::Chunk => "chunk",
            FrameKind::Complete => "complete",
            FrameKind::Error => "error",
            FrameKind::Heartbeat => "heartbeat",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "metadata" => Some(FrameKind::Metadata),
            "progress" => Some(FrameKind::Progress),
            "chunk" => Some(FrameKind::Chunk),
            "complete" => Some(FrameKind::Complete),
            "error" => Some(FrameKind::Error),
            "heartbeat" => Some(FrameKind::Heartbeat),
            _ => None,
        }
    }

    /// `complete` and `error` end a stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, FrameKind::Complete | FrameKind::Error)
    }
}

/// One unit of the streaming protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFrame {
    pub kind: FrameKind,
    /// Raw text for `chunk` frames, JSON for every other kind
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl StreamFrame {
    pub fn new(kind: FrameKind, data: impl Into<String>) -> Self {
        Self {
            kind,
            data: data.into(),
            id: None,
        }
    }

    /// Frame whose payload is a JSON document
    pub fn json(kind: FrameKind, payload: serde_json::Value) -> Self {
        Self::new(kind, payload.to_string())
    }

    pub fn chunk(text: impl Into<String>) -> Self {
        Self::new(FrameKind::Chunk, text)
    }

    pub fn progress(stage: &str, fraction: f32) -> Self {
        Self::json(
            FrameKind::Progress,
            serde_json::json!({ "stage": stage, "progress": fraction.clamp(0.0, 1.0) }),
        )
    }

    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        Self::json(
            FrameKind::Error,
            serde_json::json!({ "kind": kind, "message": message.into() }),
        )
    }

    pub fn heartbeat() -> Self {
        Self::json(
            FrameKind::Heartbeat,
            serde_json::json!({ "ts": chrono::Utc::now().timestamp_millis() }),
        )
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// Parse the payload as JSON (not meaningful for `chunk` frames)
    pub fn payload(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.data).ok()
    }

    /// Encode as text, one `data:` line per payload line, terminated by a blank line
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.data.len() + 32);
        if let Some(id) = &self.id {
            out.push_str("id: ");
            out.push_str(id);
            out.push('\n');
        }
        out.push_str("event: ");
        out.push_str(self.kind.as_str());
        out.push('\n');
        for line in self.data.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

/// Decode a sequence of encoded frames
///
/// Blocks without a recognised `event:` line are skipped.
pub fn parse_frames(text: &str) -> Vec<StreamFrame> {
    text.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .filter_map(parse_block)
        .collect()
}

fn parse_block(block: &str) -> Option<StreamFrame> {
    let mut kind = None;
    let mut id = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.split('\n') {
        if let Some(rest) = line.strip_prefix("event:") {
            kind = FrameKind::parse(rest.trim());
        } else if let Some(rest) = line.strip_prefix("id:") {
            id = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    Some(StreamFrame {
        kind: kind?,
        data: data.join("\n"),
        id,
    })
}
