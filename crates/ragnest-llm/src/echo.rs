use ragnest_core::error::Result;
use ragnest_core::models::GenerationRequest;
use std::ops::ControlFlow;

use crate::ports::NativeModel;

/// Prefix marking every degraded-mode response
pub const DEGRADED_PREFIX: &str = "[degraded mode] ";

/// Placeholder model used when no real model could be loaded
///
/// Echoes the last non-empty line of the prompt one word per fragment so that
/// streaming, token ceilings, and timing stay observable end to end.
#[derive(Debug, Default)]
pub struct EchoModel;

impl EchoModel {
    pub fn new() -> Self {
        Self
    }

    /// Full text the model produces for `prompt`, ignoring any token ceiling
    pub fn expected_output(prompt: &str) -> String {
        let mut out = String::from(DEGRADED_PREFIX);
        for fragment in Self::fragments(prompt) {
            out.push_str(&fragment);
        }
        out
    }

    fn fragments(prompt: &str) -> Vec<String> {
        let line = prompt.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
        let words: Vec<&str> = line.split_whitespace().collect();
        words
            .iter()
            .enumerate()
            .map(|(i, w)| if i + 1 < words.len() { format!("{} ", w) } else { w.to_string() })
            .collect()
    }
}

impl NativeModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo"
    }

    fn generate(
        &mut self,
        request: &GenerationRequest,
        on_token: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<()> {
        if on_token(DEGRADED_PREFIX).is_break() {
            return Ok(());
        }
        for fragment in Self::fragments(&request.prompt) {
            if on_token(&fragment).is_break() {
                break;
            }
        }
        Ok(())
    }
}
