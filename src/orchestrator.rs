//! Two-round tool-calling turn state machine.
//!
//! One turn: open a streamed completion, drain it through a
//! [`DeltaAccumulator`] while relaying reasoning live, then branch. With no
//! tool calls the buffered answer is chunked out and the turn ends. With
//! tool calls, each is executed exactly once in list order, the results are
//! spliced into the conversation, and a second streamed completion is
//! relayed verbatim. Tool calls issued during the second round are
//! deliberately not executed; the protocol stops at two rounds.
//!
//! The turn runs as a producer task writing frames to a bounded channel.
//! A slow consumer backpressures the producer, and a dropped receiver
//! (client disconnect) aborts the turn and releases the in-flight upstream
//! connection.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::accumulator::DeltaAccumulator;
use crate::client::CompletionClient;
use crate::logging;
use crate::models::{ChatMessage, StreamEvent, ToolCall, TurnFrame};
use crate::tools::ToolRegistry;

/// Buffered round-1 answers are re-streamed in pieces of this many chars.
const ANSWER_CHUNK_CHARS: usize = 10;
const FRAME_CHANNEL_CAPACITY: usize = 32;

#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<CompletionClient>,
    registry: Arc<ToolRegistry>,
    pacing: Duration,
}

impl Orchestrator {
    #[must_use]
    pub fn new(client: Arc<CompletionClient>, registry: Arc<ToolRegistry>, pacing: Duration) -> Self {
        Self {
            client,
            registry,
            pacing,
        }
    }

    /// Spawn one turn over the given conversation; frames arrive on the
    /// returned receiver. The turn always terminates the stream with either
    /// a `Done` or an `Error` frame.
    #[must_use]
    pub fn spawn_turn(&self, messages: Vec<ChatMessage>) -> mpsc::Receiver<TurnFrame> {
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let orchestrator = self.clone();
        tokio::spawn(async move {
            match orchestrator.drive(messages, &tx).await {
                Ok(()) => {
                    let _ = tx.send(TurnFrame::Done).await;
                }
                Err(err) => {
                    logging::error(format!("Turn failed: {err:#}"));
                    let _ = tx.send(TurnFrame::Error(err.to_string())).await;
                }
            }
        });
        rx
    }

    async fn drive(&self, mut messages: Vec<ChatMessage>, tx: &mpsc::Sender<TurnFrame>) -> Result<()> {
        let tools = self.registry.definitions();

        // Round 1: relay reasoning live, buffer answer text until the
        // tool-call decision is known.
        let mut stream = self.client.stream_chat(&messages, &tools).await?;
        let mut accumulator = DeltaAccumulator::new();
        while let Some(delta) = stream.next().await {
            let delta = delta?;
            for text in delta.reasoning_texts() {
                self.emit(tx, StreamEvent::Thinking(text.to_string())).await?;
            }
            accumulator.absorb(&delta);
        }
        drop(stream);

        let (answer, tool_calls) = accumulator.into_parts();

        if tool_calls.is_empty() {
            for chunk in chunk_answer(&answer, ANSWER_CHUNK_CHARS) {
                self.emit(tx, StreamEvent::Content(chunk)).await?;
            }
            return Ok(());
        }

        // The assistant message with tool_calls must precede every tool
        // result in conversation order.
        let assistant_content = if answer.is_empty() { None } else { Some(answer) };
        messages.push(ChatMessage::assistant_with_tools(
            assistant_content,
            tool_calls.clone(),
        ));

        for call in &tool_calls {
            let result = self.execute_tool(tx, call).await?;
            messages.push(ChatMessage::tool(
                call.id.clone(),
                serde_json::to_string(&result)?,
            ));
        }

        // Round 2: relay everything live; no further tool execution.
        let mut stream = self.client.stream_chat(&messages, &tools).await?;
        while let Some(delta) = stream.next().await {
            let delta = delta?;
            for text in delta.reasoning_texts() {
                self.emit(tx, StreamEvent::Thinking(text.to_string())).await?;
            }
            if let Some(content) = &delta.content
                && !content.is_empty()
            {
                self.emit(tx, StreamEvent::Content(content.clone())).await?;
            }
        }

        Ok(())
    }

    /// Run one tool call, bracketed by human-readable progress frames.
    /// Never fails on the tool's behalf: argument-parse and execution
    /// problems become structured `{"error": …}` results.
    async fn execute_tool(&self, tx: &mpsc::Sender<TurnFrame>, call: &ToolCall) -> Result<Value> {
        let name = &call.function.name;
        self.emit(
            tx,
            StreamEvent::Content(format!(
                "🔧 Invoking tool: {name} {}\n",
                call.function.arguments
            )),
        )
        .await?;

        let result = match serde_json::from_str::<Value>(&call.function.arguments) {
            Ok(arguments) => self.registry.dispatch(name, arguments).await,
            Err(err) => {
                logging::warn(format!("Tool {name} sent invalid JSON arguments: {err}"));
                json!({"error": format!("invalid tool arguments: {err}")})
            }
        };

        self.emit(
            tx,
            StreamEvent::Content(format!("📊 Received result from {name}\n")),
        )
        .await?;

        Ok(result)
    }

    async fn emit(&self, tx: &mpsc::Sender<TurnFrame>, event: StreamEvent) -> Result<()> {
        tx.send(TurnFrame::Event(event))
            .await
            .map_err(|_| anyhow!("client disconnected"))?;
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
        Ok(())
    }
}

/// Split buffered answer text into fixed-size pieces on char boundaries.
fn chunk_answer(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
