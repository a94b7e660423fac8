use std::collections::BTreeMap;

use kindred_core::reduce;
use kindred_core::OutcomeEvent;
use kindred_core::RuntimeAction;
use kindred_core::SessionAction;
use kindred_core::SessionEffect;
use kindred_core::SessionState;
use kindred_core::UserAction;
use tracing::debug;
use tracing::info;

use crate::assistant::AssistantStream;
use crate::pointer::PointerTrace;

const FRAME_MS: u64 = 16;
const DEFAULT_CHUNK_INTERVAL_MS: u64 = 40;

/// Host-side notices the session asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Toast(String),
    ComposerOpened { profile_id: String, name: String },
    ComposerClosed { profile_id: String },
    StackExhausted { generation: u64 },
}

/// Runs a session against a virtual clock.
///
/// Stream chunks and timers are queued at their due time and delivered in
/// order when the clock advances, so user input can interleave with them
/// exactly as it would on a live event loop.
pub struct SessionDriver<A> {
    state: SessionState,
    assistant: A,
    now_ms: u64,
    seq: u64,
    queue: BTreeMap<(u64, u64), RuntimeAction>,
    chunk_interval_ms: u64,
    frame_pending: bool,
    persisted: Vec<OutcomeEvent>,
    notices: Vec<Notice>,
}

impl<A: AssistantStream> SessionDriver<A> {
    pub fn new(state: SessionState, assistant: A) -> Self {
        Self {
            state,
            assistant,
            now_ms: 0,
            seq: 0,
            queue: BTreeMap::new(),
            chunk_interval_ms: DEFAULT_CHUNK_INTERVAL_MS,
            frame_pending: false,
            persisted: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn with_chunk_interval(mut self, interval_ms: u64) -> Self {
        self.chunk_interval_ms = interval_ms;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn dispatch(&mut self, action: UserAction) {
        let effects = reduce(&mut self.state, SessionAction::User(action));
        self.handle(effects);
    }

    pub fn inject(&mut self, action: RuntimeAction) {
        if matches!(action, RuntimeAction::Frame { .. }) {
            self.frame_pending = false;
        }
        let effects = reduce(&mut self.state, SessionAction::Runtime(action));
        self.handle(effects);
    }

    /// Plays a drag, advancing the clock one frame per sample.
    pub fn play(&mut self, trace: &PointerTrace) {
        let actions = trace.to_actions();
        let last = actions.len().saturating_sub(1);
        for (i, action) in actions.into_iter().enumerate() {
            self.dispatch(action);
            if i > 0 && i < last {
                self.advance(trace.frame_ms);
            }
        }
    }

    /// Delivers everything due within the next `ms` milliseconds.
    pub fn advance(&mut self, ms: u64) {
        let target = self.now_ms.saturating_add(ms);
        while let Some(entry) = self.queue.first_entry() {
            let (due, _) = *entry.key();
            if due > target {
                break;
            }
            let action = entry.remove();
            self.now_ms = due;
            self.inject(action);
        }
        self.now_ms = target;
    }

    /// Advances until nothing is queued or `limit_ms` has passed.
    pub fn run_until_idle(&mut self, limit_ms: u64) {
        let deadline = self.now_ms.saturating_add(limit_ms);
        while let Some((&(due, _), _)) = self.queue.first_key_value() {
            if due > deadline {
                break;
            }
            self.advance(due - self.now_ms);
        }
    }

    pub fn drain_persisted(&mut self) -> Vec<OutcomeEvent> {
        std::mem::take(&mut self.persisted)
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn into_state(self) -> SessionState {
        self.state
    }

    fn enqueue(&mut self, due_ms: u64, action: RuntimeAction) {
        self.seq += 1;
        self.queue.insert((due_ms, self.seq), action);
    }

    fn handle(&mut self, effects: Vec<SessionEffect>) {
        for effect in effects {
            match effect {
                SessionEffect::RequestFrame => {}
                SessionEffect::StartReply(request) => {
                    let mut events = Vec::new();
                    self.assistant
                        .start_reply(&request, &mut |event| events.push(event));
                    debug!(
                        message_id = request.message_id.0,
                        events = events.len(),
                        "queued reply stream"
                    );
                    let mut due = self.now_ms;
                    for event in events {
                        due += self.chunk_interval_ms;
                        self.enqueue(
                            due,
                            RuntimeAction::Stream {
                                message_id: request.message_id,
                                event,
                            },
                        );
                    }
                }
                SessionEffect::ScheduleTimer { id, delay_ms } => {
                    self.enqueue(self.now_ms + delay_ms, RuntimeAction::TimerFired(id));
                }
                SessionEffect::OpenWhisperComposer { profile_id, name } => {
                    self.notices.push(Notice::ComposerOpened {
                        profile_id: profile_id.0,
                        name,
                    });
                }
                SessionEffect::CloseWhisperComposer { profile_id } => {
                    self.notices.push(Notice::ComposerClosed {
                        profile_id: profile_id.0,
                    });
                }
                SessionEffect::PersistOutcome(event) => self.persisted.push(event),
                SessionEffect::Toast(text) => {
                    info!(toast = %text, "notice");
                    self.notices.push(Notice::Toast(text));
                }
                SessionEffect::StackExhausted { generation } => {
                    self.notices.push(Notice::StackExhausted { generation });
                }
            }
        }
        if self.state.interaction.drag.spring.is_some() && !self.frame_pending {
            self.frame_pending = true;
            self.enqueue(
                self.now_ms + FRAME_MS,
                RuntimeAction::Frame { dt_ms: FRAME_MS },
            );
        }
    }
}
