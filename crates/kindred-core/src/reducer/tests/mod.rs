pub(super) use super::reduce;
pub(super) use crate::actions::ReplyMode;
pub(super) use crate::actions::RuntimeAction;
pub(super) use crate::actions::SessionAction;
pub(super) use crate::actions::SessionEffect;
pub(super) use crate::actions::StreamEvent;
pub(super) use crate::actions::UserAction;
pub(super) use crate::attachments::AttachmentFile;
pub(super) use crate::card_stack::StackPhase;
pub(super) use crate::config::KindredConfig;
pub(super) use crate::outcome::ComposedWhisper;
pub(super) use crate::outcome::QuotaBook;
pub(super) use crate::outcome::QuotaKey;
pub(super) use crate::outcome::QuotaLedger;
pub(super) use crate::outcome::RequestPhase;
pub(super) use crate::persistence::ContactSource;
pub(super) use crate::persistence::OutcomeEvent;
pub(super) use crate::profile::fixtures::profile;
pub(super) use crate::profile::fixtures::requester;
pub(super) use crate::profile::ContactedUser;
pub(super) use crate::profile::FriendRequest;
pub(super) use crate::profile::Profile;
pub(super) use crate::profile::ProfileId;
pub(super) use crate::recommend::NO_MORE_MATCHES;
pub(super) use crate::state::SessionState;
pub(super) use crate::swipe::SwipeDirection;
pub(super) use crate::timers::TimerId;
pub(super) use crate::transcript::MessageId;
pub(super) use crate::transcript::STREAM_APOLOGY;

mod outcomes;
mod reports;
mod scenarios;

fn cofounder_pool() -> Vec<Profile> {
    vec![
        profile("p1", &["Python", "Go"], "Backend engineer looking for a co-founder"),
        profile("p2", &["Python", "Design"], "Designer open to being a cofounder"),
        profile("p3", &["Python"], "Serial founder, happy to be a co-founder again"),
    ]
}

fn state() -> SessionState {
    state_with_pool(cofounder_pool())
}

fn state_with_pool(pool: Vec<Profile>) -> SessionState {
    SessionState::new(KindredConfig::default(), requester(), pool)
}

fn user(state: &mut SessionState, action: UserAction) -> Vec<SessionEffect> {
    reduce(state, SessionAction::User(action))
}

fn runtime(state: &mut SessionState, action: RuntimeAction) -> Vec<SessionEffect> {
    reduce(state, SessionAction::Runtime(action))
}

fn send(state: &mut SessionState, text: &str) -> MessageId {
    let effects = user(
        state,
        UserAction::SendMessage {
            text: text.to_string(),
            mode: ReplyMode::Standard,
        },
    );
    effects
        .iter()
        .find_map(|effect| match effect {
            SessionEffect::StartReply(request) => Some(request.message_id),
            _ => None,
        })
        .expect("reply started")
}

fn stream(state: &mut SessionState, message_id: MessageId, event: StreamEvent) -> Vec<SessionEffect> {
    runtime(state, RuntimeAction::Stream { message_id, event })
}

fn thinking(cumulative: &str) -> StreamEvent {
    StreamEvent::Thinking {
        delta: String::new(),
        cumulative: cumulative.to_string(),
    }
}

fn result(cumulative: &str) -> StreamEvent {
    StreamEvent::Result {
        delta: String::new(),
        cumulative: cumulative.to_string(),
    }
}

/// Sends `text` and lets the assistant answer and complete.
fn ask(state: &mut SessionState, text: &str) -> MessageId {
    let id = send(state, text);
    stream(state, id, result("Here are some people you might like."));
    stream(state, id, StreamEvent::Complete);
    id
}

fn scheduled(effects: &[SessionEffect]) -> Vec<TimerId> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            SessionEffect::ScheduleTimer { id, .. } => Some(*id),
            _ => None,
        })
        .collect()
}

fn fire(state: &mut SessionState, id: TimerId) -> Vec<SessionEffect> {
    runtime(state, RuntimeAction::TimerFired(id))
}

/// Fires every timer scheduled by `effects` and returns what they emit.
fn fire_all(state: &mut SessionState, effects: &[SessionEffect]) -> Vec<SessionEffect> {
    scheduled(effects)
        .into_iter()
        .flat_map(|id| fire(state, id))
        .collect()
}

/// A horizontal press-drag-release on the top card.
fn drag(state: &mut SessionState, offset_x: f64, velocity_x: f64) -> Vec<SessionEffect> {
    user(state, UserAction::PointerDown { x: 100.0, y: 100.0 });
    user(
        state,
        UserAction::PointerMove {
            x: 100.0 + offset_x,
            y: 100.0,
            offset_x,
        },
    );
    user(
        state,
        UserAction::PointerUp {
            offset_x,
            velocity_x,
        },
    )
}

fn stack_ids(state: &SessionState) -> Vec<String> {
    state
        .active_stack()
        .map(|stack| {
            stack
                .profiles()
                .iter()
                .map(|profile| profile.id.0.clone())
                .collect()
        })
        .unwrap_or_default()
}

fn toasts(effects: &[SessionEffect]) -> Vec<&str> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            SessionEffect::Toast(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

fn exhausted_count(effects: &[SessionEffect]) -> usize {
    effects
        .iter()
        .filter(|effect| matches!(effect, SessionEffect::StackExhausted { .. }))
        .count()
}

fn friend_request(id: &str) -> FriendRequest {
    FriendRequest {
        profile: profile(id, &["Go"], "Infra engineer"),
        requested_at: chrono::Utc::now(),
        message: Some("Saw your post about tutoring".to_string()),
        wechat_id: Some("wx-".to_string() + id),
    }
}

/// Swipes right on the top card and sends a whisper from the composer.
fn whisper_top_card(state: &mut SessionState, message: &str) -> Vec<SessionEffect> {
    let mut effects = user(state, UserAction::SwipeButton(SwipeDirection::Right));
    effects.extend(user(
        state,
        UserAction::SendWhisper(ComposedWhisper {
            message: Some(message.to_string()),
            wechat_id: None,
        }),
    ));
    effects
}
