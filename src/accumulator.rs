//! Incremental assembly of streamed completion deltas.
//!
//! One accumulator instance drains one streamed upstream call. It buffers
//! answer text (the round-1 emission decision depends on whether tool calls
//! show up) and grows an order-indexed tool-call list from sparse fragments.
//! It has no done signal of its own; it is finished when the fragment
//! stream ends.

use crate::logging;
use crate::models::{ChatDelta, ToolCall};

/// Upper bound on accepted tool-call indices; fragments beyond it are
/// dropped so one bad index cannot force a huge placeholder allocation.
const MAX_TOOL_CALLS: usize = 64;

#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    answer: String,
    tool_calls: Vec<ToolCall>,
}

impl DeltaAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delta fragment into the accumulated state.
    ///
    /// Tool-call fragments carry a position index; the list grows with
    /// default placeholder records to accommodate sparse or out-of-order
    /// indices. `id` and `name` are set-once (first non-empty value wins);
    /// `arguments` is append-only concatenation.
    pub fn absorb(&mut self, delta: &ChatDelta) {
        if let Some(content) = &delta.content {
            self.answer.push_str(content);
        }

        let Some(fragments) = &delta.tool_calls else {
            return;
        };
        for fragment in fragments {
            let index = fragment.index.unwrap_or(0) as usize;
            if index >= MAX_TOOL_CALLS {
                logging::warn(format!(
                    "Skipping tool-call fragment with out-of-range index {index}"
                ));
                continue;
            }
            if self.tool_calls.len() <= index {
                self.tool_calls.resize_with(index + 1, ToolCall::default);
            }
            let call = &mut self.tool_calls[index];

            if call.id.is_empty()
                && let Some(id) = &fragment.id
                && !id.is_empty()
            {
                call.id = id.clone();
            }
            if let Some(function) = &fragment.function {
                if call.function.name.is_empty()
                    && let Some(name) = &function.name
                    && !name.is_empty()
                {
                    call.function.name = name.clone();
                }
                if let Some(arguments) = &function.arguments {
                    call.function.arguments.push_str(arguments);
                }
            }
        }
    }

    /// Consume the accumulator once its stream has ended.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<ToolCall>) {
        (self.answer, self.tool_calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FunctionDelta, ToolCallDelta};
    use pretty_assertions::assert_eq;

    fn content_delta(text: &str) -> ChatDelta {
        ChatDelta {
            content: Some(text.to_string()),
            ..ChatDelta::default()
        }
    }

    fn tool_delta(index: u64, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> ChatDelta {
        ChatDelta {
            tool_calls: Some(vec![ToolCallDelta {
                index: Some(index),
                id: id.map(str::to_string),
                function: Some(FunctionDelta {
                    name: name.map(str::to_string),
                    arguments: args.map(str::to_string),
                }),
            }]),
            ..ChatDelta::default()
        }
    }

    #[test]
    fn buffers_answer_text_in_order() {
        let mut acc = DeltaAccumulator::new();
        acc.absorb(&content_delta("Hello"));
        acc.absorb(&content_delta(", "));
        acc.absorb(&content_delta("world"));
        let (answer, tool_calls) = acc.into_parts();
        assert_eq!(answer, "Hello, world");
        assert!(tool_calls.is_empty());
    }

    #[test]
    fn assembles_tool_call_arguments_across_fragments() {
        let mut acc = DeltaAccumulator::new();
        acc.absorb(&tool_delta(0, Some("call_1"), Some("get_weather"), None));
        acc.absorb(&tool_delta(0, None, None, Some("{\"loca")));
        acc.absorb(&tool_delta(0, None, None, Some("tion\":\"Paris\"}")));
        let (_, tool_calls) = acc.into_parts();
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].id, "call_1");
        assert_eq!(tool_calls[0].function.name, "get_weather");
        assert_eq!(tool_calls[0].function.arguments, "{\"location\":\"Paris\"}");
    }

    #[test]
    fn grows_list_for_sparse_out_of_order_indices() {
        let mut acc = DeltaAccumulator::new();
        acc.absorb(&tool_delta(2, Some("call_3"), Some("third"), Some("{}")));
        acc.absorb(&tool_delta(0, Some("call_1"), Some("first"), Some("{}")));
        acc.absorb(&tool_delta(1, Some("call_2"), Some("second"), Some("{}")));
        let (_, tool_calls) = acc.into_parts();
        assert_eq!(tool_calls.len(), 3);
        assert_eq!(tool_calls[0].function.name, "first");
        assert_eq!(tool_calls[1].function.name, "second");
        assert_eq!(tool_calls[2].function.name, "third");
        assert!(tool_calls.iter().all(|call| call.kind == "function"));
    }

    #[test]
    fn id_and_name_are_set_once() {
        let mut acc = DeltaAccumulator::new();
        acc.absorb(&tool_delta(0, Some("call_1"), Some("get_weather"), None));
        acc.absorb(&tool_delta(0, Some("call_other"), Some("other_tool"), Some("{}")));
        let (_, tool_calls) = acc.into_parts();
        assert_eq!(tool_calls[0].id, "call_1");
        assert_eq!(tool_calls[0].function.name, "get_weather");
    }

    #[test]
    fn out_of_range_index_is_dropped() {
        let mut acc = DeltaAccumulator::new();
        acc.absorb(&tool_delta(u64::MAX, Some("call_x"), Some("bogus"), Some("{}")));
        acc.absorb(&tool_delta(0, Some("call_1"), Some("get_weather"), Some("{}")));
        let (_, tool_calls) = acc.into_parts();
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].id, "call_1");
    }

    #[test]
    fn empty_delta_changes_nothing() {
        let mut acc = DeltaAccumulator::new();
        acc.absorb(&ChatDelta::default());
        let (answer, tool_calls) = acc.into_parts();
        assert!(answer.is_empty());
        assert!(tool_calls.is_empty());
    }
}
