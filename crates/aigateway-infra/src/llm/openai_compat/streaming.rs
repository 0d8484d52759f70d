//! OpenAI SSE stream to [`StreamEvent`] adapter.
//!
//! Maps `async-openai`'s [`ChatCompletionResponseStream`] to the
//! provider-agnostic [`StreamEvent`] enum. The gateway only ever asks a
//! provider for plain text completions -- there is no tool-calling or
//! stop-reason concept in [`StreamEvent`] -- so unlike a general-purpose
//! OpenAI client this mapping only tracks content deltas and the final
//! usage block.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};

use async_openai::types::chat::ChatCompletionResponseStream;

use aigateway_core::llm::provider::ProviderError;
use aigateway_types::llm::StreamEvent;

/// Map an async-openai [`ChatCompletionResponseStream`] to the gateway's
/// [`StreamEvent`] stream.
///
/// Emits [`StreamEvent::Connected`] first, a [`StreamEvent::TextDelta`] per
/// non-empty content fragment, a [`StreamEvent::Usage`] if a chunk carries
/// one, and [`StreamEvent::Done`] once the upstream ends. A transport error
/// mid-stream is surfaced as an `Err` item and ends the stream.
pub fn map_openai_stream(
    stream: ChatCompletionResponseStream,
    provider_name: String,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send + 'static>> {
    Box::pin(async_stream::stream! {
        yield Ok(StreamEvent::Connected);

        let mut stream = stream;

        while let Some(result) = stream.next().await {
            let chunk = match result {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield Err(ProviderError(format!("{provider_name}: stream error: {err}")));
                    return;
                }
            };

            if let Some(usage) = chunk.usage.as_ref() {
                yield Ok(StreamEvent::Usage {
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                });
            }

            for choice in &chunk.choices {
                if let Some(text) = choice.delta.content.clone() {
                    if !text.is_empty() {
                        yield Ok(StreamEvent::TextDelta { text });
                    }
                }
            }
        }

        yield Ok(StreamEvent::Done);
    })
}
