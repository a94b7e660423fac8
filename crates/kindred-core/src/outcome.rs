use std::collections::BTreeMap;
use std::collections::BTreeSet;

use tracing::info;

use crate::attachments::ObjectUrlRegistry;
use crate::attachments::ReportDraft;
use crate::config::OutcomeConfig;
use crate::profile::ContactedUser;
use crate::profile::FriendRequest;
use crate::profile::Profile;
use crate::profile::ProfileId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QuotaKey {
    /// How many more whispers a candidate can receive.
    Receives(ProfileId),
    /// The user's own allowance for whispering back.
    Whispers,
    /// The user's credits, spent on gifts.
    Credits,
}

impl QuotaKey {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Receives(_) => "receives",
            Self::Whispers => "whispers",
            Self::Credits => "credits",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("{kind} exhausted: need {needed}, have {available}")]
    Exhausted {
        kind: &'static str,
        needed: u32,
        available: u32,
    },
}

/// Authoritative balances for every quota the router spends.
pub trait QuotaLedger {
    fn balance(&self, key: &QuotaKey) -> u32;

    /// Debits `amount` or fails without touching the balance.
    fn try_spend(&mut self, key: &QuotaKey, amount: u32) -> Result<u32, QuotaError>;

    fn credit(&mut self, key: &QuotaKey, amount: u32) -> u32;
}

#[derive(Debug, Clone, Default)]
pub struct QuotaBook {
    balances: BTreeMap<QuotaKey, u32>,
}

impl QuotaBook {
    pub fn with_allowances(whispers: u32, credits: u32) -> Self {
        let mut book = Self::default();
        book.set(QuotaKey::Whispers, whispers);
        book.set(QuotaKey::Credits, credits);
        book
    }

    pub fn set(&mut self, key: QuotaKey, amount: u32) {
        self.balances.insert(key, amount);
    }

    /// Seeds a candidate's receive balance the first time it is surfaced.
    pub fn seed_receives(&mut self, profile: &Profile) {
        self.balances
            .entry(QuotaKey::Receives(profile.id.clone()))
            .or_insert(profile.receives_left);
    }

    pub fn entries(&self) -> impl Iterator<Item = (&QuotaKey, u32)> + '_ {
        self.balances.iter().map(|(key, balance)| (key, *balance))
    }
}

impl QuotaLedger for QuotaBook {
    fn balance(&self, key: &QuotaKey) -> u32 {
        self.balances.get(key).copied().unwrap_or(0)
    }

    fn try_spend(&mut self, key: &QuotaKey, amount: u32) -> Result<u32, QuotaError> {
        let available = self.balance(key);
        if available < amount {
            return Err(QuotaError::Exhausted {
                kind: key.label(),
                needed: amount,
                available,
            });
        }
        let remaining = available - amount;
        self.balances.insert(key.clone(), remaining);
        Ok(remaining)
    }

    fn credit(&mut self, key: &QuotaKey, amount: u32) -> u32 {
        let next = self.balance(key).saturating_add(amount);
        self.balances.insert(key.clone(), next);
        next
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouterError {
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error("no friend request from {0}")]
    UnknownRequest(ProfileId),
    #[error("friend request from {0} is already confirmed")]
    AlreadyConfirmed(ProfileId),
    #[error("{0} is not in your contact history")]
    NotContacted(ProfileId),
    #[error("a report needs a reason")]
    EmptyReportReason,
    #[error("gift amount must be between 1 and {max}, got {amount}")]
    InvalidGiftAmount { amount: u32, max: u32 },
}

impl RouterError {
    /// Short text for a toast.
    pub fn user_message(&self) -> String {
        match self {
            Self::Quota(QuotaError::Exhausted { kind: "receives", .. }) => {
                "They can't receive any more whispers right now.".to_string()
            }
            Self::Quota(QuotaError::Exhausted { kind, .. }) => {
                format!("You're out of {kind}.")
            }
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedWhisper {
    pub message: Option<String>,
    pub wechat_id: Option<String>,
}

impl ComposedWhisper {
    fn normalized(self) -> Self {
        let clean = |value: Option<String>| {
            value
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
        };
        Self {
            message: clean(self.message),
            wechat_id: clean(self.wechat_id),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContactHistory {
    records: Vec<ContactedUser>,
}

impl ContactHistory {
    pub fn records(&self) -> &[ContactedUser] {
        &self.records
    }

    pub fn contacted_ids(&self) -> BTreeSet<ProfileId> {
        self.records.iter().map(|record| record.id().clone()).collect()
    }

    pub fn get(&self, id: &ProfileId) -> Option<&ContactedUser> {
        self.records.iter().find(|record| record.id() == id)
    }

    fn get_mut(&mut self, id: &ProfileId) -> Option<&mut ContactedUser> {
        self.records.iter_mut().find(|record| record.id() == id)
    }

    /// Appends a record, or refreshes the existing one for the same person.
    pub fn upsert(&mut self, record: ContactedUser) {
        match self.get_mut(record.id()) {
            Some(existing) => {
                existing.contacted_at = record.contacted_at;
                existing.message = record.message.or(existing.message.take());
                existing.wechat_id = record.wechat_id.or(existing.wechat_id.take());
            }
            None => self.records.push(record),
        }
    }

    pub fn mark_reported(&mut self, id: &ProfileId, reason: &str) {
        if let Some(record) = self.get_mut(id) {
            record.reported = true;
            record.report_reason = Some(reason.to_string());
        }
    }

    pub fn record_gift(&mut self, id: &ProfileId, amount: u32, receives_left: u32) {
        if let Some(record) = self.get_mut(id) {
            record.gifted_receives = record.gifted_receives.saturating_add(amount);
            record.profile.receives_left = receives_left;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Pending,
    /// Shown with a "whispered back" overlay until its removal timer fires.
    Confirmed,
}

#[derive(Debug, Clone)]
pub struct InboxRow {
    pub request: FriendRequest,
    pub phase: RequestPhase,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationInbox {
    rows: Vec<InboxRow>,
}

impl NotificationInbox {
    pub fn rows(&self) -> &[InboxRow] {
        &self.rows
    }

    pub fn receive(&mut self, request: FriendRequest) -> bool {
        if self.rows.iter().any(|row| row.request.id() == request.id()) {
            return false;
        }
        self.rows.push(InboxRow {
            request,
            phase: RequestPhase::Pending,
        });
        true
    }

    pub fn get(&self, id: &ProfileId) -> Option<&InboxRow> {
        self.rows.iter().find(|row| row.request.id() == id)
    }

    pub fn remove(&mut self, id: &ProfileId) -> Option<FriendRequest> {
        let pos = self.rows.iter().position(|row| row.request.id() == id)?;
        Some(self.rows.remove(pos).request)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhisperReceipt {
    pub contact: ContactedUser,
    pub remaining: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GiftReceipt {
    pub profile_id: ProfileId,
    pub amount: u32,
    pub receives_left: u32,
    pub credits_left: u32,
}

/// Fans a committed decision out to the ledger, history and inbox.
///
/// Every operation checks before it mutates, so a rejected call leaves all
/// three untouched.
pub struct OutcomeRouter<'a> {
    pub ledger: &'a mut dyn QuotaLedger,
    pub history: &'a mut ContactHistory,
    pub inbox: &'a mut NotificationInbox,
    pub config: OutcomeConfig,
}

impl<'a> OutcomeRouter<'a> {
    pub fn check_accept(&self, profile: &Profile) -> Result<(), RouterError> {
        let key = QuotaKey::Receives(profile.id.clone());
        let available = self.ledger.balance(&key);
        if available == 0 {
            info!(profile_id = %profile.id, "whisper rejected: receives exhausted");
            return Err(QuotaError::Exhausted {
                kind: key.label(),
                needed: 1,
                available,
            }
            .into());
        }
        Ok(())
    }

    /// Swipe right: spends one of the candidate's receives and records the
    /// contact.
    pub fn accept(
        &mut self,
        profile: &Profile,
        whisper: ComposedWhisper,
    ) -> Result<WhisperReceipt, RouterError> {
        self.check_accept(profile)?;
        let remaining = self
            .ledger
            .try_spend(&QuotaKey::Receives(profile.id.clone()), 1)?;
        let whisper = whisper.normalized();
        let mut snapshot = profile.clone();
        snapshot.receives_left = remaining;
        let contact = ContactedUser::new(snapshot, whisper.message, whisper.wechat_id);
        self.history.upsert(contact.clone());
        info!(profile_id = %profile.id, remaining, "whisper sent");
        Ok(WhisperReceipt { contact, remaining })
    }

    /// Whisper back to an incoming friend request. The row stays visible as
    /// confirmed; the caller removes it after `config.confirm_delay_ms`.
    pub fn whisper_back(
        &mut self,
        request_id: &ProfileId,
        whisper: ComposedWhisper,
    ) -> Result<WhisperReceipt, RouterError> {
        let row = self
            .inbox
            .get(request_id)
            .ok_or_else(|| RouterError::UnknownRequest(request_id.clone()))?;
        if row.phase == RequestPhase::Confirmed {
            return Err(RouterError::AlreadyConfirmed(request_id.clone()));
        }
        let request = row.request.clone();

        let remaining = self.ledger.try_spend(&QuotaKey::Whispers, 1).map_err(|err| {
            info!(request_id = %request_id, "whisper back rejected: {err}");
            RouterError::from(err)
        })?;

        let whisper = whisper.normalized();
        let contact = ContactedUser::new(
            request.profile,
            whisper.message.or(request.message),
            whisper.wechat_id.or(request.wechat_id),
        );
        self.history.upsert(contact.clone());
        if let Some(row) = self
            .inbox
            .rows
            .iter_mut()
            .find(|row| row.request.id() == request_id)
        {
            row.phase = RequestPhase::Confirmed;
        }
        Ok(WhisperReceipt { contact, remaining })
    }

    /// Drops a confirmed row once its overlay delay has passed.
    pub fn remove_confirmed(&mut self, request_id: &ProfileId) -> Option<FriendRequest> {
        match self.inbox.get(request_id) {
            Some(row) if row.phase == RequestPhase::Confirmed => self.inbox.remove(request_id),
            _ => None,
        }
    }

    pub fn gift(&mut self, profile_id: &ProfileId, amount: u32) -> Result<GiftReceipt, RouterError> {
        if self.history.get(profile_id).is_none() {
            return Err(RouterError::NotContacted(profile_id.clone()));
        }
        let receives_key = QuotaKey::Receives(profile_id.clone());
        let max = self
            .config
            .gift_cap
            .saturating_sub(self.ledger.balance(&receives_key));
        if amount == 0 || amount > max {
            return Err(RouterError::InvalidGiftAmount { amount, max });
        }

        let credits_left = self.ledger.try_spend(&QuotaKey::Credits, amount)?;
        let receives_left = self.ledger.credit(&receives_key, amount);
        self.history.record_gift(profile_id, amount, receives_left);
        info!(profile_id = %profile_id, amount, receives_left, "gifted receives");
        Ok(GiftReceipt {
            profile_id: profile_id.clone(),
            amount,
            receives_left,
            credits_left,
        })
    }

    /// Files a report. On success the draft is emptied and its attachment
    /// handles released; on failure the draft is left as it was.
    pub fn report(
        &mut self,
        profile_id: &ProfileId,
        reason: &str,
        draft: &mut ReportDraft,
        urls: &mut ObjectUrlRegistry,
    ) -> Result<usize, RouterError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(RouterError::EmptyReportReason);
        }
        if self.history.get(profile_id).is_none() {
            return Err(RouterError::NotContacted(profile_id.clone()));
        }
        let attachments = std::mem::take(draft).release(urls);
        self.history.mark_reported(profile_id, reason);
        info!(profile_id = %profile_id, attachments = attachments.len(), "report filed");
        Ok(attachments.len())
    }
}
