//! Wire-level models for the MiniMax chat completions API and the proxy's
//! own outbound event stream.

use serde::{Deserialize, Serialize};

// === Conversation Types ===

/// A chat message in the OpenAI-compatible wire shape.
///
/// `content` serializes even when absent (as `null`): an assistant message
/// that only carries tool calls must still show an explicit empty content
/// marker on the wire.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Assistant message capturing round-1 text and the assembled tool calls.
    #[must_use]
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Tool result message answering one tool call.
    #[must_use]
    pub fn tool(tool_call_id: String, content: String) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: Some(tool_call_id),
        }
    }
}

/// A fully assembled tool call as it appears on an assistant message.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

impl Default for ToolCall {
    fn default() -> Self {
        Self {
            id: String::new(),
            kind: "function".to_string(),
            function: FunctionCall::default(),
        }
    }
}

/// Function name plus its arguments as a JSON-encoded string.
///
/// `arguments` is assembled by concatenating fragments in arrival order and
/// is only valid JSON once the stream that produced it has ended.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Tool definition exposed to the model. Built once at process start.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

// === Streamed Delta Fragments ===

/// One partial completion fragment from a streamed upstream call.
///
/// Every field is optional; an unrecognized chunk deserializes to an empty
/// delta rather than failing the stream.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ChatDelta {
    #[serde(default)]
    pub reasoning_details: Option<Vec<ReasoningDetail>>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

impl ChatDelta {
    /// Non-empty reasoning texts carried by this fragment, in order.
    pub fn reasoning_texts(&self) -> impl Iterator<Item = &str> {
        self.reasoning_details
            .iter()
            .flatten()
            .filter_map(|detail| detail.text.as_deref())
            .filter(|text| !text.is_empty())
    }
}

/// A single reasoning detail entry inside a delta.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReasoningDetail {
    #[serde(default)]
    pub text: Option<String>,
}

/// A partial tool call carried by a delta, keyed by position index.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: Option<u64>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

/// Partial function fields inside a tool-call delta.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

// === Outbound Stream Frames ===

/// One renderable event relayed to the chat client.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum StreamEvent {
    Thinking(String),
    Content(String),
}

/// A frame on the outbound SSE connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnFrame {
    Event(StreamEvent),
    /// Terminal marker, serialized as the literal `[DONE]` data frame.
    Done,
    /// Plain-text error frame. Deliberately not JSON: the error path uses a
    /// different frame shape than the success path.
    Error(String),
}
