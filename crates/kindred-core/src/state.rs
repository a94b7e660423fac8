use std::collections::BTreeMap;
use std::collections::BTreeSet;

use super::actions::ReplyMode;
use super::attachments::ObjectUrlRegistry;
use super::attachments::ReportDraft;
use super::card_stack::CardStack;
use super::config::KindredConfig;
use super::config::OutcomeConfig;
use super::gesture::GestureTracker;
use super::outcome::ContactHistory;
use super::outcome::NotificationInbox;
use super::outcome::OutcomeRouter;
use super::outcome::QuotaBook;
use super::persistence::replay_history;
use super::persistence::replay_inbox;
use super::persistence::OutcomeRecord;
use super::profile::Profile;
use super::profile::ProfileId;
use super::profile::QuotedContact;
use super::profile::UserProfile;
use super::recommend::ConversationState;
use super::recommend::IntentRuleTable;
use super::recommend::RecommendationCoordinator;
use super::swipe::card_rotation;
use super::swipe::RestSpring;
use super::swipe::SwipePolicy;
use super::timers::TimerQueue;
use super::transcript::MessageId;
use super::transcript::Transcript;

/// The assistant reply currently streaming into the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveReply {
    pub message_id: MessageId,
    pub query: String,
    pub mode: ReplyMode,
}

#[derive(Debug, Clone, Default)]
pub struct DragState {
    pub tracker: GestureTracker,
    pub offset_x: f64,
    /// Set after a cancelled release until the card is back at rest.
    pub spring: Option<RestSpring>,
}

impl DragState {
    pub fn new(tracker: GestureTracker) -> Self {
        Self {
            tracker,
            offset_x: 0.0,
            spring: None,
        }
    }

    pub fn visual_offset(&self) -> f64 {
        match &self.spring {
            Some(spring) => spring.offset(),
            None => self.offset_x,
        }
    }

    pub fn rotation(&self) -> f64 {
        card_rotation(self.visual_offset())
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
        self.offset_x = 0.0;
        self.spring = None;
    }
}

#[derive(Debug, Clone)]
pub struct ReportSession {
    pub profile_id: ProfileId,
    pub draft: ReportDraft,
}

#[derive(Debug, Clone, Default)]
pub struct SessionInteraction {
    pub drag: DragState,
    /// Candidate accepted by the last swipe right, waiting on the composer.
    pub composer: Option<Profile>,
    pub quoted: Option<QuotedContact>,
    pub report: Option<ReportSession>,
}

/// Everything the outcome router writes to.
#[derive(Debug, Clone, Default)]
pub struct OutcomeStores {
    pub ledger: QuotaBook,
    pub history: ContactHistory,
    pub inbox: NotificationInbox,
}

impl OutcomeStores {
    pub fn router(&mut self, config: OutcomeConfig) -> OutcomeRouter<'_> {
        OutcomeRouter {
            ledger: &mut self.ledger,
            history: &mut self.history,
            inbox: &mut self.inbox,
            config,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub config: KindredConfig,
    pub requester: UserProfile,
    pub transcript: Transcript,
    pub conversation: ConversationState,
    /// Fallback pool when a reply does not stream its own candidates.
    pub candidate_pool: Vec<Profile>,
    pub pending_pools: BTreeMap<MessageId, Vec<Profile>>,
    pub active_reply: Option<ActiveReply>,
    pub interaction: SessionInteraction,
    pub outcomes: OutcomeStores,
    pub urls: ObjectUrlRegistry,
    pub timers: TimerQueue,
    pub coordinator: RecommendationCoordinator,
}

impl SessionState {
    pub fn new(config: KindredConfig, requester: UserProfile, candidate_pool: Vec<Profile>) -> Self {
        let ledger = QuotaBook::with_allowances(
            config.session.initial_whispers,
            config.session.initial_credits,
        );
        Self {
            interaction: SessionInteraction {
                drag: DragState::new(GestureTracker::new(config.gesture)),
                ..SessionInteraction::default()
            },
            config,
            requester,
            transcript: Transcript::new(),
            conversation: ConversationState::default(),
            candidate_pool,
            pending_pools: BTreeMap::new(),
            active_reply: None,
            outcomes: OutcomeStores {
                ledger,
                ..OutcomeStores::default()
            },
            urls: ObjectUrlRegistry::default(),
            timers: TimerQueue::default(),
            coordinator: RecommendationCoordinator::default(),
        }
    }

    pub fn with_rules(mut self, rules: IntentRuleTable) -> Self {
        self.coordinator = RecommendationCoordinator::new(rules);
        self
    }

    pub fn with_ledger(mut self, ledger: QuotaBook) -> Self {
        self.outcomes.ledger = ledger;
        self
    }

    /// Rebuilds contact history and pending friend requests from a
    /// previously persisted event log.
    pub fn hydrate(&mut self, records: &[OutcomeRecord]) {
        self.outcomes.history = replay_history(records);
        self.outcomes.inbox = replay_inbox(records);
    }

    pub fn swipe_policy(&self) -> SwipePolicy {
        SwipePolicy::new(self.config.swipe)
    }

    pub fn active_stack(&self) -> Option<&CardStack> {
        self.transcript.anchor().map(|anchor| &anchor.stack)
    }

    pub fn contacted_ids(&self) -> BTreeSet<ProfileId> {
        self.outcomes.history.contacted_ids()
    }

    pub fn is_replying(&self) -> bool {
        self.active_reply.is_some()
    }
}
