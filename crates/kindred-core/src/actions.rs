use serde::Deserialize;
use serde::Serialize;

use super::attachments::AttachmentFile;
use super::outcome::ComposedWhisper;
use super::persistence::OutcomeEvent;
use super::profile::FriendRequest;
use super::profile::Profile;
use super::profile::ProfileId;
use super::profile::QuotedContact;
use super::profile::UserProfile;
use super::swipe::SwipeDirection;
use super::timers::TimerId;
use super::transcript::MessageId;

#[derive(Debug, Clone)]
pub enum SessionAction {
    User(UserAction),
    Runtime(RuntimeAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMode {
    #[default]
    Standard,
    /// Streams a reasoning trace before the answer.
    Thinking,
}

impl ReplyMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Thinking => "thinking",
        }
    }
}

#[derive(Debug, Clone)]
pub enum UserAction {
    SendMessage {
        text: String,
        mode: ReplyMode,
    },
    QuoteContact(QuotedContact),
    ClearQuote,
    PointerDown {
        x: f64,
        y: f64,
    },
    PointerMove {
        x: f64,
        y: f64,
        offset_x: f64,
    },
    PointerUp {
        offset_x: f64,
        velocity_x: f64,
    },
    /// Accept/skip buttons under the card.
    SwipeButton(SwipeDirection),
    ToggleCardDetail,
    CloseStack,
    SwitchConversation,
    SendWhisper(ComposedWhisper),
    DismissComposer,
    WhisperBack {
        request_id: ProfileId,
        whisper: ComposedWhisper,
    },
    Gift {
        profile_id: ProfileId,
        amount: u32,
    },
    OpenReport {
        profile_id: ProfileId,
    },
    AddReportFiles(Vec<AttachmentFile>),
    RemoveReportFile(u64),
    SubmitReport {
        reason: String,
    },
    DiscardReport,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Thinking { delta: String, cumulative: String },
    Result { delta: String, cumulative: String },
    Recommendations(Vec<Profile>),
    Complete,
    Error(String),
}

#[derive(Debug, Clone)]
pub enum RuntimeAction {
    Stream {
        message_id: MessageId,
        event: StreamEvent,
    },
    TimerFired(TimerId),
    /// Advances the rest spring of a cancelled drag.
    Frame {
        dt_ms: u64,
    },
    ReceiveFriendRequest(FriendRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyContext {
    pub requester: UserProfile,
    pub quoted: Option<QuotedContact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRequest {
    pub message_id: MessageId,
    pub user_text: String,
    pub mode: ReplyMode,
    pub context: ReplyContext,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    RequestFrame,
    StartReply(ReplyRequest),
    ScheduleTimer { id: TimerId, delay_ms: u64 },
    OpenWhisperComposer { profile_id: ProfileId, name: String },
    /// The composer was closed without sending; nothing was spent.
    CloseWhisperComposer { profile_id: ProfileId },
    PersistOutcome(OutcomeEvent),
    Toast(String),
    StackExhausted { generation: u64 },
}
