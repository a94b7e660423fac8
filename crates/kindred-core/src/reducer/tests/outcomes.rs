use super::*;
use pretty_assertions::assert_eq;

fn receives(state: &SessionState, id: &str) -> u32 {
    state
        .outcomes
        .ledger
        .balance(&QuotaKey::Receives(ProfileId::new(id)))
}

#[test]
fn whisper_from_composer_spends_receive_and_persists() {
    let mut state = state();
    ask(&mut state, "Find me a Python co-founder");
    assert_eq!(receives(&state, "p1"), 3);

    let effects = whisper_top_card(&mut state, "  Want to build something?  ");

    let contact = effects
        .iter()
        .find_map(|effect| match effect {
            SessionEffect::PersistOutcome(OutcomeEvent::Contacted { source, contact }) => {
                assert_eq!(*source, ContactSource::Swipe);
                Some(contact.clone())
            }
            _ => None,
        })
        .expect("contacted");
    assert_eq!(contact.message.as_deref(), Some("Want to build something?"));
    assert_eq!(contact.profile.receives_left, 2);
    assert_eq!(receives(&state, "p1"), 2);
    assert_eq!(
        state.active_stack().map(|stack| stack.profiles()[0].receives_left),
        Some(2)
    );
    assert_eq!(toasts(&effects), vec!["Whisper sent to Person p1."]);
    assert!(state.interaction.composer.is_none());
}

#[test]
fn dismissing_composer_still_records_contact() {
    let mut state = state();
    ask(&mut state, "Find me a Python co-founder");
    user(&mut state, UserAction::SwipeButton(SwipeDirection::Right));

    let effects = user(&mut state, UserAction::DismissComposer);

    assert!(effects
        .iter()
        .any(|effect| matches!(effect, SessionEffect::PersistOutcome(_))));
    let record = state
        .outcomes
        .history
        .get(&ProfileId::new("p1"))
        .expect("record");
    assert_eq!(record.message, None);
    assert!(user(&mut state, UserAction::DismissComposer).is_empty());
}

#[test]
fn open_composer_blocks_further_swipes() {
    let mut state = state();
    ask(&mut state, "Find me a Python co-founder");
    let effects = user(&mut state, UserAction::SwipeButton(SwipeDirection::Right));
    fire_all(&mut state, &effects);

    assert!(user(&mut state, UserAction::SwipeButton(SwipeDirection::Left)).is_empty());
    assert_eq!(
        state.active_stack().map(|stack| stack.phase()),
        Some(StackPhase::Idle(1))
    );
}

#[test]
fn contacted_profiles_are_filtered_from_later_rounds() {
    let mut state = state();
    ask(&mut state, "Find me a Python co-founder");
    whisper_top_card(&mut state, "hi");

    user(&mut state, UserAction::SwitchConversation);
    ask(&mut state, "Find me a Python co-founder");

    assert_eq!(stack_ids(&state), vec!["p2".to_string(), "p3".to_string()]);
}

#[test]
fn hydrated_history_filters_candidates() {
    let mut state = state();
    let records = vec![crate::persistence::OutcomeRecord {
        seq: 1,
        ts_ms: 0,
        event: OutcomeEvent::Contacted {
            source: ContactSource::Swipe,
            contact: ContactedUser::new(cofounder_pool()[2].clone(), None, None),
        },
    }];
    state.hydrate(&records);

    ask(&mut state, "Find me a Python co-founder");

    assert_eq!(stack_ids(&state), vec!["p1".to_string(), "p2".to_string()]);
}

#[test]
fn whisper_back_confirms_then_removes_after_delay() {
    let mut state = state();
    let effects = runtime(
        &mut state,
        RuntimeAction::ReceiveFriendRequest(friend_request("r1")),
    );
    assert!(matches!(
        effects.first(),
        Some(SessionEffect::PersistOutcome(OutcomeEvent::FriendRequestReceived { .. }))
    ));
    assert!(runtime(
        &mut state,
        RuntimeAction::ReceiveFriendRequest(friend_request("r1"))
    )
    .is_empty());

    let effects = user(
        &mut state,
        UserAction::WhisperBack {
            request_id: ProfileId::new("r1"),
            whisper: ComposedWhisper::default(),
        },
    );
    assert!(effects.contains(&SessionEffect::ScheduleTimer {
        id: scheduled(&effects)[0],
        delay_ms: 2_500,
    }));
    assert_eq!(
        state
            .outcomes
            .inbox
            .get(&ProfileId::new("r1"))
            .map(|row| row.phase),
        Some(RequestPhase::Confirmed)
    );
    assert_eq!(state.outcomes.ledger.balance(&QuotaKey::Whispers), 4);
    let contact = state
        .outcomes
        .history
        .get(&ProfileId::new("r1"))
        .expect("contact");
    assert_eq!(contact.wechat_id.as_deref(), Some("wx-r1"));

    let fired = fire_all(&mut state, &effects);
    assert_eq!(
        fired,
        vec![
            SessionEffect::PersistOutcome(OutcomeEvent::FriendRequestResolved {
                request_id: ProfileId::new("r1"),
            }),
            SessionEffect::RequestFrame,
        ]
    );
    assert!(state.outcomes.inbox.rows().is_empty());
    assert!(fire_all(&mut state, &effects).is_empty());
}

#[test]
fn whisper_back_without_allowance_is_rejected() {
    let mut state = state().with_ledger(QuotaBook::with_allowances(0, 20));
    runtime(
        &mut state,
        RuntimeAction::ReceiveFriendRequest(friend_request("r1")),
    );

    let effects = user(
        &mut state,
        UserAction::WhisperBack {
            request_id: ProfileId::new("r1"),
            whisper: ComposedWhisper::default(),
        },
    );

    assert_eq!(effects, vec![SessionEffect::Toast("You're out of whispers.".to_string())]);
    assert_eq!(
        state
            .outcomes
            .inbox
            .get(&ProfileId::new("r1"))
            .map(|row| row.phase),
        Some(RequestPhase::Pending)
    );
    assert!(state.timers.is_empty());
}

#[test]
fn gift_tops_up_receives_within_cap() {
    let mut state = state();
    ask(&mut state, "Find me a Python co-founder");
    whisper_top_card(&mut state, "hi");

    let effects = user(
        &mut state,
        UserAction::Gift {
            profile_id: ProfileId::new("p1"),
            amount: 0,
        },
    );
    assert_eq!(toasts(&effects).len(), 1);
    assert_eq!(state.outcomes.ledger.balance(&QuotaKey::Credits), 20);

    let effects = user(
        &mut state,
        UserAction::Gift {
            profile_id: ProfileId::new("p1"),
            amount: 5,
        },
    );
    assert_eq!(
        effects[0],
        SessionEffect::PersistOutcome(OutcomeEvent::Gifted {
            profile_id: ProfileId::new("p1"),
            amount: 5,
            receives_left: 7,
        })
    );
    assert_eq!(state.outcomes.ledger.balance(&QuotaKey::Credits), 15);
    assert_eq!(
        state.active_stack().map(|stack| stack.profiles()[0].receives_left),
        Some(7)
    );
    assert_eq!(
        state
            .outcomes
            .history
            .get(&ProfileId::new("p1"))
            .map(|record| record.gifted_receives),
        Some(5)
    );
}

#[test]
fn gift_to_stranger_is_rejected() {
    let mut state = state();
    let effects = user(
        &mut state,
        UserAction::Gift {
            profile_id: ProfileId::new("p9"),
            amount: 1,
        },
    );
    assert_eq!(toasts(&effects), vec!["p9 is not in your contact history"]);
}

#[test]
fn switching_conversation_closes_composer_without_spending() {
    let mut state = state();
    ask(&mut state, "Find me a Python co-founder");
    user(&mut state, UserAction::SwipeButton(SwipeDirection::Right));
    assert!(state.interaction.composer.is_some());

    let effects = user(&mut state, UserAction::SwitchConversation);

    assert_eq!(
        effects,
        vec![
            SessionEffect::CloseWhisperComposer {
                profile_id: ProfileId::new("p1"),
            },
            SessionEffect::RequestFrame,
        ]
    );
    assert!(state.interaction.composer.is_none());
    assert_eq!(receives(&state, "p1"), 3);
    assert!(state.outcomes.history.get(&ProfileId::new("p1")).is_none());
    // A late send has nothing left to resolve.
    assert!(user(&mut state, UserAction::SendWhisper(ComposedWhisper::default())).is_empty());

    ask(&mut state, "Find me a Python co-founder");
    assert_eq!(
        stack_ids(&state),
        vec!["p1".to_string(), "p2".to_string(), "p3".to_string()]
    );
}
