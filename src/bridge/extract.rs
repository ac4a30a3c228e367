//! Fenced JSON tool-call extraction for providers without native function calling

use crate::tools::{Parameters, ToolCallRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// One fenced block; the lazy body never crosses a closing fence
static JSON_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json(.*?)```").expect("valid json block pattern"));

#[derive(Deserialize)]
struct Envelope {
    tool_call: FencedCall,
}

#[derive(Deserialize)]
struct FencedCall {
    tool_id: String,
    #[serde(default)]
    parameters: Parameters,
}

/// First fenced block that decodes to `{"tool_call": {"tool_id": ..}}`.
///
/// Blocks that fail to decode or name no tool are skipped. Any `confirmed`
/// flag the model adds is ignored.
pub fn extract_tool_call(text: &str) -> Option<ToolCallRequest> {
    JSON_BLOCK.captures_iter(text).find_map(|caps| {
        let body = caps.get(1)?.as_str().trim();
        match serde_json::from_str::<Envelope>(body) {
            Ok(envelope) if !envelope.tool_call.tool_id.trim().is_empty() => Some(
                ToolCallRequest::new(envelope.tool_call.tool_id.trim(), envelope.tool_call.parameters),
            ),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Skipping fenced block that is not a tool call: {}", e);
                None
            }
        }
    })
}

/// Remove stray fenced JSON; falls back to the raw text if nothing remains
pub fn strip_fenced_json(text: &str) -> String {
    let cleaned = JSON_BLOCK.replace_all(text, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        text.to_string()
    } else {
        cleaned.to_string()
    }
}
