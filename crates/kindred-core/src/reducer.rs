use tracing::debug;
use tracing::info;
use tracing::warn;

use super::actions::ReplyContext;
use super::actions::ReplyRequest;
use super::actions::RuntimeAction;
use super::actions::SessionAction;
use super::actions::SessionEffect;
use super::actions::StreamEvent;
use super::actions::UserAction;
use super::card_stack::CardStack;
use super::card_stack::StackPhase;
use super::gesture::PointerSample;
use super::outcome::ComposedWhisper;
use super::outcome::QuotaKey;
use super::outcome::QuotaLedger;
use super::outcome::RouterError;
use super::persistence::ContactSource;
use super::persistence::OutcomeEvent;
use super::profile::ProfileId;
use super::recommend::MatchCategory;
use super::recommend::RecommendationPlan;
use super::state::ActiveReply;
use super::state::ReportSession;
use super::state::SessionState;
use super::swipe::Release;
use super::swipe::RestSpring;
use super::swipe::SwipeDecision;
use super::swipe::SwipeDirection;
use super::timers::TimerKind;
use super::transcript::MessageId;
use super::transcript::STREAM_APOLOGY;

pub fn reduce(state: &mut SessionState, action: SessionAction) -> Vec<SessionEffect> {
    match action {
        SessionAction::User(user) => reduce_user(state, user),
        SessionAction::Runtime(runtime) => reduce_runtime(state, runtime),
    }
}

fn reduce_user(state: &mut SessionState, action: UserAction) -> Vec<SessionEffect> {
    match action {
        UserAction::SendMessage { text, mode } => {
            let text = text.trim().to_string();
            if text.is_empty() {
                return Vec::new();
            }
            if let Some(active) = &state.active_reply {
                debug!(message_id = active.message_id.0, "send ignored while a reply streams");
                return Vec::new();
            }
            let quoted = state.interaction.quoted.take();
            state.transcript.push_user(text.clone(), quoted.clone());
            let message_id = state.transcript.push_assistant_placeholder();
            state.active_reply = Some(ActiveReply {
                message_id,
                query: text.clone(),
                mode,
            });
            vec![
                SessionEffect::RequestFrame,
                SessionEffect::StartReply(ReplyRequest {
                    message_id,
                    user_text: text,
                    mode,
                    context: ReplyContext {
                        requester: state.requester.clone(),
                        quoted,
                    },
                }),
            ]
        }
        UserAction::QuoteContact(contact) => {
            state.interaction.quoted = Some(contact);
            vec![SessionEffect::RequestFrame]
        }
        UserAction::ClearQuote => {
            if state.interaction.quoted.take().is_some() {
                return vec![SessionEffect::RequestFrame];
            }
            Vec::new()
        }
        UserAction::PointerDown { x, y } => {
            if !top_card_is_idle(state) || state.interaction.composer.is_some() {
                return Vec::new();
            }
            let drag = &mut state.interaction.drag;
            drag.spring = None;
            drag.offset_x = 0.0;
            drag.tracker.press(PointerSample::new(x, y));
            Vec::new()
        }
        UserAction::PointerMove { x, y, offset_x } => {
            let drag = &mut state.interaction.drag;
            if !drag.tracker.is_pressed() {
                return Vec::new();
            }
            drag.offset_x = offset_x;
            let feedback = drag.tracker.track(PointerSample::new(x, y), offset_x);
            if feedback.changed {
                vec![SessionEffect::RequestFrame]
            } else {
                Vec::new()
            }
        }
        UserAction::PointerUp {
            offset_x,
            velocity_x,
        } => {
            if !state.interaction.drag.tracker.is_pressed() {
                return Vec::new();
            }
            let axis = state.interaction.drag.tracker.release();
            let release = Release {
                offset_x,
                velocity_x,
            };
            match state.swipe_policy().decide(release, axis) {
                SwipeDecision::Commit(direction) => commit_swipe(state, direction, release),
                SwipeDecision::Cancel => spring_back(state, release),
            }
        }
        UserAction::SwipeButton(direction) => commit_swipe(
            state,
            direction,
            Release {
                offset_x: 0.0,
                velocity_x: 0.0,
            },
        ),
        UserAction::ToggleCardDetail => match state.transcript.anchor_mut() {
            Some(anchor) => {
                anchor.stack.toggle_expanded();
                vec![SessionEffect::RequestFrame]
            }
            None => Vec::new(),
        },
        UserAction::CloseStack => {
            if teardown_stack(state).is_some() {
                return vec![SessionEffect::RequestFrame];
            }
            Vec::new()
        }
        UserAction::SwitchConversation => {
            let mut effects = Vec::new();
            if let Some(profile) = state.interaction.composer.take() {
                debug!(profile_id = %profile.id, "composer closed with its conversation");
                effects.push(SessionEffect::CloseWhisperComposer {
                    profile_id: profile.id,
                });
            }
            teardown_stack(state);
            state.transcript = state.transcript.successor();
            state.conversation = Default::default();
            state.pending_pools.clear();
            state.interaction.quoted = None;
            if let Some(active) = state.active_reply.take() {
                debug!(message_id = active.message_id.0, "abandoning in-flight reply");
            }
            effects.push(SessionEffect::RequestFrame);
            effects
        }
        UserAction::SendWhisper(whisper) => resolve_composer(state, whisper),
        UserAction::DismissComposer => resolve_composer(state, ComposedWhisper::default()),
        UserAction::WhisperBack {
            request_id,
            whisper,
        } => {
            let config = state.config.outcome;
            match state.outcomes.router(config).whisper_back(&request_id, whisper) {
                Ok(receipt) => {
                    let timer = state.timers.schedule(
                        TimerKind::RequestRemoval {
                            request_id: request_id.clone(),
                        },
                        config.confirm_delay_ms,
                    );
                    info!(request_id = %request_id, remaining = receipt.remaining, "whispered back");
                    vec![
                        SessionEffect::PersistOutcome(OutcomeEvent::Contacted {
                            source: ContactSource::WhisperBack,
                            contact: receipt.contact,
                        }),
                        SessionEffect::ScheduleTimer {
                            id: timer,
                            delay_ms: config.confirm_delay_ms,
                        },
                        SessionEffect::RequestFrame,
                    ]
                }
                Err(err) => reject(err),
            }
        }
        UserAction::Gift { profile_id, amount } => {
            let config = state.config.outcome;
            match state.outcomes.router(config).gift(&profile_id, amount) {
                Ok(receipt) => {
                    sync_receives(state, &profile_id);
                    vec![
                        SessionEffect::PersistOutcome(OutcomeEvent::Gifted {
                            profile_id: receipt.profile_id,
                            amount: receipt.amount,
                            receives_left: receipt.receives_left,
                        }),
                        SessionEffect::RequestFrame,
                    ]
                }
                Err(err) => reject(err),
            }
        }
        UserAction::OpenReport { profile_id } => {
            if state.outcomes.history.get(&profile_id).is_none() {
                return reject(RouterError::NotContacted(profile_id));
            }
            if let Some(previous) = state.interaction.report.take() {
                previous.draft.release(&mut state.urls);
            }
            state.interaction.report = Some(ReportSession {
                profile_id,
                draft: Default::default(),
            });
            vec![SessionEffect::RequestFrame]
        }
        UserAction::AddReportFiles(files) => {
            let limit = state.config.outcome.max_attachment_bytes;
            let Some(report) = state.interaction.report.as_mut() else {
                return Vec::new();
            };
            let mut effects: Vec<SessionEffect> = report
                .draft
                .add_files(files, limit, &mut state.urls)
                .into_iter()
                .filter_map(|result| result.err())
                .map(|err| SessionEffect::Toast(err.to_string()))
                .collect();
            effects.push(SessionEffect::RequestFrame);
            effects
        }
        UserAction::RemoveReportFile(id) => {
            let Some(report) = state.interaction.report.as_mut() else {
                return Vec::new();
            };
            if report.draft.remove(id, &mut state.urls) {
                return vec![SessionEffect::RequestFrame];
            }
            Vec::new()
        }
        UserAction::SubmitReport { reason } => {
            let config = state.config.outcome;
            let Some(report) = state.interaction.report.as_mut() else {
                return Vec::new();
            };
            let profile_id = report.profile_id.clone();
            let result = state.outcomes.router(config).report(
                &profile_id,
                &reason,
                &mut report.draft,
                &mut state.urls,
            );
            match result {
                Ok(attachment_count) => {
                    state.interaction.report = None;
                    vec![
                        SessionEffect::PersistOutcome(OutcomeEvent::Reported {
                            profile_id,
                            reason: reason.trim().to_string(),
                            attachment_count,
                        }),
                        SessionEffect::Toast("Report submitted.".to_string()),
                        SessionEffect::RequestFrame,
                    ]
                }
                Err(err) => reject(err),
            }
        }
        UserAction::DiscardReport => match state.interaction.report.take() {
            Some(report) => {
                report.draft.release(&mut state.urls);
                vec![SessionEffect::RequestFrame]
            }
            None => Vec::new(),
        },
    }
}

fn reduce_runtime(state: &mut SessionState, action: RuntimeAction) -> Vec<SessionEffect> {
    match action {
        RuntimeAction::Stream { message_id, event } => reduce_stream(state, message_id, event),
        RuntimeAction::TimerFired(id) => {
            let Some(kind) = state.timers.take(id) else {
                debug!(timer_id = id.0, "ignoring timer that is no longer pending");
                return Vec::new();
            };
            match kind {
                TimerKind::StackExit { stack_generation } => {
                    finish_stack_exit(state, stack_generation)
                }
                TimerKind::RequestRemoval { request_id } => {
                    let config = state.config.outcome;
                    match state.outcomes.router(config).remove_confirmed(&request_id) {
                        Some(_) => vec![
                            SessionEffect::PersistOutcome(OutcomeEvent::FriendRequestResolved {
                                request_id,
                            }),
                            SessionEffect::RequestFrame,
                        ],
                        None => Vec::new(),
                    }
                }
            }
        }
        RuntimeAction::Frame { dt_ms } => {
            let drag = &mut state.interaction.drag;
            let Some(spring) = drag.spring.as_mut() else {
                return Vec::new();
            };
            spring.step(dt_ms as f64 / 1000.0);
            if spring.is_settled() {
                drag.spring = None;
                drag.offset_x = 0.0;
            }
            vec![SessionEffect::RequestFrame]
        }
        RuntimeAction::ReceiveFriendRequest(request) => {
            if !state.outcomes.inbox.receive(request.clone()) {
                debug!(request_id = %request.id(), "duplicate friend request");
                return Vec::new();
            }
            vec![
                SessionEffect::PersistOutcome(OutcomeEvent::FriendRequestReceived { request }),
                SessionEffect::RequestFrame,
            ]
        }
    }
}

fn reduce_stream(
    state: &mut SessionState,
    message_id: MessageId,
    event: StreamEvent,
) -> Vec<SessionEffect> {
    match event {
        StreamEvent::Thinking { cumulative, .. } => {
            frame_if(state.transcript.append_thinking(message_id, &cumulative).is_applied())
        }
        StreamEvent::Result { cumulative, .. } => {
            frame_if(state.transcript.append_result(message_id, &cumulative).is_applied())
        }
        StreamEvent::Recommendations(profiles) => {
            let streaming = state
                .transcript
                .get(message_id)
                .is_some_and(|message| message.is_streaming);
            if streaming {
                state.pending_pools.insert(message_id, profiles);
            } else {
                debug!(message_id = message_id.0, "dropping recommendations for stale message");
            }
            Vec::new()
        }
        StreamEvent::Complete => {
            if !state.transcript.complete(message_id).is_applied() {
                return Vec::new();
            }
            let query = finish_reply(state, message_id);
            let mut effects = surface_recommendations(state, message_id, query);
            effects.push(SessionEffect::RequestFrame);
            effects
        }
        StreamEvent::Error(reason) => {
            if !state.transcript.fail(message_id, STREAM_APOLOGY).is_applied() {
                return Vec::new();
            }
            warn!(message_id = message_id.0, reason = %reason, "assistant stream failed");
            finish_reply(state, message_id);
            state.pending_pools.remove(&message_id);
            vec![SessionEffect::RequestFrame]
        }
    }
}

fn frame_if(applied: bool) -> Vec<SessionEffect> {
    if applied {
        vec![SessionEffect::RequestFrame]
    } else {
        Vec::new()
    }
}

/// Clears the active reply if it is `message_id` and returns the query
/// that started it.
fn finish_reply(state: &mut SessionState, message_id: MessageId) -> Option<String> {
    match state.active_reply.take() {
        Some(active) if active.message_id == message_id => Some(active.query),
        other => {
            state.active_reply = other;
            None
        }
    }
}

fn surface_recommendations(
    state: &mut SessionState,
    message_id: MessageId,
    query: Option<String>,
) -> Vec<SessionEffect> {
    let streamed = state.pending_pools.remove(&message_id);
    let Some(query) = query.or_else(|| state.transcript.last_user_text().map(str::to_string))
    else {
        return Vec::new();
    };
    let category = state.coordinator.rules().classify(&query);
    if streamed.is_none() && category == MatchCategory::Generic {
        return Vec::new();
    }
    let pool = streamed.unwrap_or_else(|| state.candidate_pool.clone());
    let plan = state.coordinator.plan(
        &query,
        &pool,
        &state.contacted_ids(),
        &state.conversation,
        &state.requester,
    );
    state.conversation.record(&query, &plan);

    match plan {
        RecommendationPlan::Surface {
            category,
            mut profiles,
        } => {
            for profile in &mut profiles {
                state.outcomes.ledger.seed_receives(profile);
                profile.receives_left = state
                    .outcomes
                    .ledger
                    .balance(&QuotaKey::Receives(profile.id.clone()));
            }
            let Some(position) = state.transcript.position(message_id) else {
                return Vec::new();
            };
            teardown_stack(state);
            let surfaced = profiles.len();
            match state.transcript.set_anchor(position + 1, CardStack::new(profiles)) {
                Ok(generation) => {
                    info!(
                        category = category.label(),
                        surfaced,
                        generation,
                        "card stack anchored"
                    );
                    poll_exhausted(state)
                }
                Err(err) => {
                    warn!("could not anchor card stack: {err}");
                    Vec::new()
                }
            }
        }
        RecommendationPlan::NoMoreMatches { category, reply } => {
            info!(category = category.label(), "no new matches");
            state.transcript.push_assistant_text(reply);
            Vec::new()
        }
    }
}

fn top_card_is_idle(state: &SessionState) -> bool {
    state
        .active_stack()
        .is_some_and(|stack| matches!(stack.phase(), StackPhase::Idle(_)) && stack.current().is_some())
}

fn commit_swipe(
    state: &mut SessionState,
    direction: SwipeDirection,
    release: Release,
) -> Vec<SessionEffect> {
    if !top_card_is_idle(state) || state.interaction.composer.is_some() {
        return spring_back(state, release);
    }
    let Some(profile) = state.active_stack().and_then(|stack| stack.current()).cloned() else {
        return Vec::new();
    };

    if direction == SwipeDirection::Right {
        let config = state.config.outcome;
        if let Err(err) = state.outcomes.router(config).check_accept(&profile) {
            let mut effects = reject(err);
            effects.extend(spring_back(state, release));
            return effects;
        }
    }

    let exit_ms = state.config.stack.exit_duration_ms;
    let Some(anchor) = state.transcript.anchor_mut() else {
        return Vec::new();
    };
    let outcome = match anchor.stack.commit(direction) {
        Ok(outcome) => outcome,
        Err(err) => {
            debug!("swipe ignored: {err}");
            return Vec::new();
        }
    };
    let generation = anchor.generation;
    state.interaction.drag.reset();
    let timer = state.timers.schedule(
        TimerKind::StackExit {
            stack_generation: generation,
        },
        exit_ms,
    );
    debug!(
        index = outcome.index,
        direction = direction.label(),
        profile_id = %outcome.profile.id,
        "card committed"
    );

    let mut effects = Vec::new();
    if direction == SwipeDirection::Right {
        effects.push(SessionEffect::OpenWhisperComposer {
            profile_id: outcome.profile.id.clone(),
            name: outcome.profile.name.clone(),
        });
        state.interaction.composer = Some(outcome.profile);
    }
    effects.push(SessionEffect::ScheduleTimer {
        id: timer,
        delay_ms: exit_ms,
    });
    effects.push(SessionEffect::RequestFrame);
    effects
}

fn spring_back(state: &mut SessionState, release: Release) -> Vec<SessionEffect> {
    let drag = &mut state.interaction.drag;
    drag.tracker.reset();
    if release.offset_x == 0.0 && drag.spring.is_none() {
        drag.offset_x = 0.0;
        return Vec::new();
    }
    drag.offset_x = release.offset_x;
    drag.spring = Some(RestSpring::new(release.offset_x, release.velocity_x));
    vec![SessionEffect::RequestFrame]
}

/// Spends the accepted candidate's receive and records the contact. A
/// dismissed composer still counts as a whisper, just without a message.
fn resolve_composer(state: &mut SessionState, whisper: ComposedWhisper) -> Vec<SessionEffect> {
    let Some(profile) = state.interaction.composer.take() else {
        return Vec::new();
    };
    let config = state.config.outcome;
    match state.outcomes.router(config).accept(&profile, whisper) {
        Ok(receipt) => {
            sync_receives(state, &profile.id);
            vec![
                SessionEffect::PersistOutcome(OutcomeEvent::Contacted {
                    source: ContactSource::Swipe,
                    contact: receipt.contact,
                }),
                SessionEffect::Toast(format!("Whisper sent to {}.", profile.name)),
                SessionEffect::RequestFrame,
            ]
        }
        Err(err) => reject(err),
    }
}

fn sync_receives(state: &mut SessionState, profile_id: &ProfileId) {
    let balance = state
        .outcomes
        .ledger
        .balance(&QuotaKey::Receives(profile_id.clone()));
    if let Some(anchor) = state.transcript.anchor_mut() {
        anchor.stack.set_receives_left(profile_id, balance);
    }
}

fn reject(err: RouterError) -> Vec<SessionEffect> {
    info!("action rejected: {err}");
    vec![SessionEffect::Toast(err.user_message())]
}

fn finish_stack_exit(state: &mut SessionState, stack_generation: u64) -> Vec<SessionEffect> {
    let Some(anchor) = state.transcript.anchor_mut() else {
        return Vec::new();
    };
    if anchor.generation != stack_generation {
        debug!(stack_generation, "exit timer for a replaced stack");
        return Vec::new();
    }
    if !anchor.stack.finish_exit() {
        return Vec::new();
    }
    let mut effects = poll_exhausted(state);
    effects.push(SessionEffect::RequestFrame);
    effects
}

fn poll_exhausted(state: &mut SessionState) -> Vec<SessionEffect> {
    let exhausted = state
        .transcript
        .anchor_mut()
        .is_some_and(|anchor| anchor.stack.poll_exhausted());
    if !exhausted {
        return Vec::new();
    }
    match teardown_stack(state) {
        Some(generation) => {
            info!(generation, "card stack exhausted");
            vec![SessionEffect::StackExhausted { generation }]
        }
        None => Vec::new(),
    }
}

/// Removes the anchored stack and cancels its pending exit timers.
fn teardown_stack(state: &mut SessionState) -> Option<u64> {
    let anchor = state.transcript.clear_anchor()?;
    let generation = anchor.generation;
    let cancelled = state.timers.cancel_where(|kind| {
        matches!(kind, TimerKind::StackExit { stack_generation } if *stack_generation == generation)
    });
    state.interaction.drag.reset();
    debug!(generation, cancelled, "card stack torn down");
    Some(generation)
}

#[cfg(test)]
mod tests;
