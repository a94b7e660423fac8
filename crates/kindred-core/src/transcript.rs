use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::card_stack::CardStack;
use crate::profile::QuotedContact;

pub const STREAM_APOLOGY: &str = "Sorry, something went wrong while replying. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub thinking: Option<String>,
    pub is_streaming: bool,
    pub created_at: DateTime<Utc>,
    pub quoted: Option<QuotedContact>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    /// Unknown id, or the message already reached a terminal state.
    Stale,
}

impl PatchOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AnchorError {
    #[error("a card stack is already anchored at message index {0}")]
    AlreadyActive(usize),
    #[error("anchor index {index} does not follow an assistant message (transcript has {len})")]
    NotAfterAssistant { index: usize, len: usize },
}

/// Where the interactive card block sits inside the transcript.
#[derive(Debug, Clone)]
pub struct TimelineAnchor {
    pub message_index: usize,
    pub stack: CardStack,
    pub generation: u64,
}

/// Ordered chat transcript plus the single optional card-stack anchor.
///
/// Messages are only ever appended; patches address them by id and are
/// silently dropped once a message is complete or if the id is unknown.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
    anchor: Option<TimelineAnchor>,
    next_generation: u64,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_id: 1,
            anchor: None,
            next_generation: 1,
        }
    }

    /// Fresh, empty transcript that keeps counting ids and generations from
    /// where this one stopped, so late events for the old conversation can
    /// never address something in the new one.
    pub fn successor(&self) -> Self {
        Self {
            messages: Vec::new(),
            next_id: self.next_id,
            anchor: None,
            next_generation: self.next_generation,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|message| message.id == id)
    }

    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
    }

    fn push(
        &mut self,
        role: Role,
        content: String,
        is_streaming: bool,
        quoted: Option<QuotedContact>,
    ) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            role,
            content,
            thinking: None,
            is_streaming,
            created_at: Utc::now(),
            quoted,
        });
        id
    }

    pub fn push_user(&mut self, text: String, quoted: Option<QuotedContact>) -> MessageId {
        self.push(Role::User, text, false, quoted)
    }

    pub fn push_assistant_placeholder(&mut self) -> MessageId {
        self.push(Role::Assistant, String::new(), true, None)
    }

    pub fn push_assistant_text(&mut self, text: String) -> MessageId {
        self.push(Role::Assistant, text, false, None)
    }

    fn streaming_mut(&mut self, id: MessageId, op: &'static str) -> Option<&mut Message> {
        let found = self
            .messages
            .iter_mut()
            .find(|message| message.id == id && message.is_streaming);
        if found.is_none() {
            debug!(message_id = id.0, op, "dropping patch for stale message");
        }
        found
    }

    /// Replaces the thinking trace with the caller's cumulative text.
    pub fn append_thinking(&mut self, id: MessageId, cumulative: &str) -> PatchOutcome {
        match self.streaming_mut(id, "append_thinking") {
            Some(message) => {
                message.thinking = Some(cumulative.to_string());
                PatchOutcome::Applied
            }
            None => PatchOutcome::Stale,
        }
    }

    /// Replaces the content with the caller's cumulative text.
    pub fn append_result(&mut self, id: MessageId, cumulative: &str) -> PatchOutcome {
        match self.streaming_mut(id, "append_result") {
            Some(message) => {
                message.content = cumulative.to_string();
                PatchOutcome::Applied
            }
            None => PatchOutcome::Stale,
        }
    }

    pub fn complete(&mut self, id: MessageId) -> PatchOutcome {
        match self.streaming_mut(id, "complete") {
            Some(message) => {
                message.is_streaming = false;
                PatchOutcome::Applied
            }
            None => PatchOutcome::Stale,
        }
    }

    pub fn fail(&mut self, id: MessageId, error_text: &str) -> PatchOutcome {
        match self.streaming_mut(id, "fail") {
            Some(message) => {
                message.content = error_text.to_string();
                message.is_streaming = false;
                PatchOutcome::Applied
            }
            None => PatchOutcome::Stale,
        }
    }

    pub fn anchor(&self) -> Option<&TimelineAnchor> {
        self.anchor.as_ref()
    }

    pub fn anchor_mut(&mut self) -> Option<&mut TimelineAnchor> {
        self.anchor.as_mut()
    }

    /// Anchors a card stack right after an existing assistant message.
    pub fn set_anchor(&mut self, message_index: usize, stack: CardStack) -> Result<u64, AnchorError> {
        if let Some(anchor) = &self.anchor {
            return Err(AnchorError::AlreadyActive(anchor.message_index));
        }
        let follows_assistant = message_index
            .checked_sub(1)
            .and_then(|idx| self.messages.get(idx))
            .is_some_and(|message| message.role == Role::Assistant);
        if !follows_assistant {
            return Err(AnchorError::NotAfterAssistant {
                index: message_index,
                len: self.messages.len(),
            });
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        self.anchor = Some(TimelineAnchor {
            message_index,
            stack,
            generation,
        });
        Ok(generation)
    }

    pub fn clear_anchor(&mut self) -> Option<TimelineAnchor> {
        self.anchor.take()
    }

    /// Messages before and after the card block. Without an anchor
    /// everything is "before".
    pub fn split_at_anchor(&self) -> (&[Message], &[Message]) {
        match &self.anchor {
            Some(anchor) => self
                .messages
                .split_at(anchor.message_index.min(self.messages.len())),
            None => (&self.messages[..], &[]),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn ids_are_monotonic_in_creation_order() {
        let mut transcript = Transcript::new();
        let a = transcript.push_user("hi".to_string(), None);
        let b = transcript.push_assistant_placeholder();
        let c = transcript.push_user("again".to_string(), None);
        assert!(a < b && b < c);
        assert_eq!(transcript.position(c), Some(2));
    }

    #[test]
    fn cumulative_patches_replace_not_concatenate() {
        let mut transcript = Transcript::new();
        let id = transcript.push_assistant_placeholder();
        transcript.append_thinking(id, "Look");
        transcript.append_thinking(id, "Looking at");
        transcript.append_result(id, "Here");
        transcript.append_result(id, "Here are two");

        let message = transcript.get(id).expect("message");
        assert_eq!(message.thinking.as_deref(), Some("Looking at"));
        assert_eq!(message.content, "Here are two");
        assert!(message.is_streaming);
    }

    #[test]
    fn complete_without_any_tokens_is_allowed() {
        let mut transcript = Transcript::new();
        let id = transcript.push_assistant_placeholder();
        assert_eq!(transcript.complete(id), PatchOutcome::Applied);
        let message = transcript.get(id).expect("message");
        assert!(!message.is_streaming);
        assert_eq!(message.content, "");
    }

    #[test]
    fn patches_after_terminal_state_are_dropped() {
        let mut transcript = Transcript::new();
        let id = transcript.push_assistant_placeholder();
        transcript.append_result(id, "done");
        transcript.complete(id);

        assert_eq!(transcript.append_result(id, "done and more"), PatchOutcome::Stale);
        assert_eq!(transcript.append_thinking(id, "late"), PatchOutcome::Stale);
        assert_eq!(transcript.fail(id, "boom"), PatchOutcome::Stale);
        assert_eq!(transcript.complete(id), PatchOutcome::Stale);

        let message = transcript.get(id).expect("message");
        assert_eq!(message.content, "done");
        assert_eq!(message.thinking, None);
    }

    #[test]
    fn unknown_id_is_a_no_op() {
        let mut transcript = Transcript::new();
        transcript.push_user("hello".to_string(), None);
        let before = transcript.messages().to_vec();
        assert_eq!(transcript.append_result(MessageId(42), "x"), PatchOutcome::Stale);
        assert_eq!(transcript.messages(), before.as_slice());
    }

    #[test]
    fn fail_keeps_thinking_and_sets_error_text() {
        let mut transcript = Transcript::new();
        let id = transcript.push_assistant_placeholder();
        transcript.append_thinking(id, "step one");
        transcript.append_thinking(id, "step one, step two");
        transcript.fail(id, STREAM_APOLOGY);

        let message = transcript.get(id).expect("message");
        assert_eq!(message.content, STREAM_APOLOGY);
        assert_eq!(message.thinking.as_deref(), Some("step one, step two"));
        assert!(!message.is_streaming);
    }

    #[test]
    fn successor_continues_id_sequence() {
        let mut transcript = Transcript::new();
        let old = transcript.push_assistant_placeholder();
        transcript.push_assistant_text("here".to_string());
        transcript
            .set_anchor(2, CardStack::new(Vec::new()))
            .expect("anchor");

        let mut next = transcript.successor();
        assert!(next.is_empty());
        assert!(next.anchor().is_none());
        assert_eq!(next.append_result(old, "late"), PatchOutcome::Stale);

        let fresh = next.push_user("new topic".to_string(), None);
        assert!(fresh > old);
        next.push_assistant_text("sure".to_string());
        assert_eq!(next.set_anchor(2, CardStack::new(Vec::new())), Ok(2));
    }

    #[test]
    fn anchor_requires_preceding_assistant_and_single_slot() {
        let mut transcript = Transcript::new();
        transcript.push_user("find people".to_string(), None);
        assert_eq!(
            transcript.set_anchor(1, CardStack::new(Vec::new())).err(),
            Some(AnchorError::NotAfterAssistant { index: 1, len: 1 })
        );

        transcript.push_assistant_text("here you go".to_string());
        let generation = transcript
            .set_anchor(2, CardStack::new(Vec::new()))
            .expect("anchor");
        assert_eq!(generation, 1);
        assert_eq!(
            transcript.set_anchor(2, CardStack::new(Vec::new())).err(),
            Some(AnchorError::AlreadyActive(2))
        );

        transcript.push_user("thanks".to_string(), None);
        let (before, after) = transcript.split_at_anchor();
        assert_eq!(before.len(), 2);
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].content, "thanks");

        assert!(transcript.clear_anchor().is_some());
        let (before, after) = transcript.split_at_anchor();
        assert_eq!((before.len(), after.len()), (3, 0));
    }
}
