use chatpipe_core::{StreamEvent, ToolResponse};

/// Words per token chunk.
pub const CHUNK_WORDS: usize = 6;

/// Split a finished reply into fixed-size word chunks.
///
/// Whitespace-split words grouped six at a time (the last chunk may carry
/// 1-6), each chunk re-joined with single spaces. An empty (or
/// whitespace-only) reply yields exactly one empty chunk: chunking never
/// produces zero events.
pub fn chunk_reply(reply: &str) -> Vec<String> {
    let words: Vec<&str> = reply.split_whitespace().collect();
    if words.is_empty() {
        return vec![String::new()];
    }
    words.chunks(CHUNK_WORDS).map(|c| c.join(" ")).collect()
}

/// Replay a finished response as an ordered, finite event sequence: one
/// token event per chunk, then exactly one message event carrying the full
/// response. Single consumption; the dispatcher has already completed, so a
/// consumer dropping mid-sequence loses nothing but delivery.
pub fn stream_events(response: ToolResponse) -> impl Iterator<Item = StreamEvent> {
    let tokens: Vec<StreamEvent> = chunk_reply(&response.reply)
        .into_iter()
        .map(StreamEvent::Token)
        .collect();
    tokens
        .into_iter()
        .chain(std::iter::once(StreamEvent::Message(response)))
}
