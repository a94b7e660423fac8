use kindred_core::profile::Profile;
use kindred_core::ReplyMode;
use kindred_core::ReplyRequest;
use kindred_core::StreamEvent;
use tracing::debug;

use crate::contracts::CannedReply;
use crate::contracts::ReplyScript;

const SAMPLE_POOL: &str = include_str!("../data/sample_pool.json");
const DEFAULT_CHUNK_WORDS: usize = 3;

/// The built-in candidate pool used by the simulated assistant.
pub fn sample_pool() -> Result<Vec<Profile>, serde_json::Error> {
    serde_json::from_str(SAMPLE_POOL)
}

/// Produces an assistant reply as a sequence of stream events.
///
/// Implementations call `sink` in delivery order and finish with exactly
/// one `Complete` or `Error`.
pub trait AssistantStream {
    fn start_reply(&self, request: &ReplyRequest, sink: &mut dyn FnMut(StreamEvent));
}

#[derive(Debug, Clone)]
pub struct SimulatedAssistant {
    script: ReplyScript,
    pool: Vec<Profile>,
    chunk_words: usize,
}

impl SimulatedAssistant {
    pub fn new(script: ReplyScript, pool: Vec<Profile>) -> Self {
        Self {
            script,
            pool,
            chunk_words: DEFAULT_CHUNK_WORDS,
        }
    }

    pub fn with_chunk_words(mut self, chunk_words: usize) -> Self {
        self.chunk_words = chunk_words.max(1);
        self
    }

    pub fn pool(&self) -> &[Profile] {
        &self.pool
    }

    fn result_text(reply: &CannedReply, request: &ReplyRequest) -> String {
        match &request.context.quoted {
            Some(quoted) => format!("About {}: {}", quoted.name, reply.result),
            None => reply.result.clone(),
        }
    }
}

impl AssistantStream for SimulatedAssistant {
    fn start_reply(&self, request: &ReplyRequest, sink: &mut dyn FnMut(StreamEvent)) {
        let reply = self.script.pick(&request.user_text);
        debug!(
            message_id = request.message_id.0,
            mode = request.mode.label(),
            recommend = reply.recommend,
            "starting simulated reply"
        );

        if request.mode == ReplyMode::Thinking {
            for (delta, cumulative) in cumulative_chunks(&reply.thinking, self.chunk_words) {
                sink(StreamEvent::Thinking { delta, cumulative });
            }
        }

        if let Some(reason) = &reply.fail_with {
            sink(StreamEvent::Error(reason.clone()));
            return;
        }

        if reply.recommend && !self.pool.is_empty() {
            sink(StreamEvent::Recommendations(self.pool.clone()));
        }

        let result = Self::result_text(reply, request);
        for (delta, cumulative) in cumulative_chunks(&result, self.chunk_words) {
            sink(StreamEvent::Result { delta, cumulative });
        }
        sink(StreamEvent::Complete);
    }
}

/// Splits `text` into groups of `words` whitespace-terminated words and
/// pairs each group with the text so far.
pub fn cumulative_chunks(text: &str, words: usize) -> Vec<(String, String)> {
    let pieces: Vec<&str> = text.split_inclusive(char::is_whitespace).collect();
    let mut cumulative = String::with_capacity(text.len());
    pieces
        .chunks(words.max(1))
        .map(|group| {
            let delta = group.concat();
            cumulative.push_str(&delta);
            (delta, cumulative.clone())
        })
        .collect()
}
