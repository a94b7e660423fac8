use super::*;
use pretty_assertions::assert_eq;

#[test]
fn cofounder_query_surfaces_uncontacted_profiles() {
    let mut state = state();
    state
        .outcomes
        .history
        .upsert(ContactedUser::new(cofounder_pool()[1].clone(), None, None));

    let id = ask(&mut state, "Find me a Python co-founder");

    assert_eq!(stack_ids(&state), vec!["p1".to_string(), "p3".to_string()]);
    let stack = state.active_stack().expect("stack");
    for profile in stack.profiles() {
        assert!(
            profile.why_match.starts_with("Co-founder fit:"),
            "{}",
            profile.why_match
        );
    }
    let anchor = state.transcript.anchor().expect("anchor");
    assert_eq!(Some(anchor.message_index), state.transcript.position(id).map(|i| i + 1));
    assert_eq!(stack.phase(), StackPhase::Idle(0));
}

#[test]
fn swipe_right_on_exhausted_receives_is_rejected_in_place() {
    let mut pool = cofounder_pool();
    pool[0].receives_left = 0;
    let mut state = state_with_pool(pool);
    ask(&mut state, "Find me a Python co-founder");

    let effects = drag(&mut state, 120.0, 0.0);

    assert_eq!(
        toasts(&effects),
        vec!["They can't receive any more whispers right now."]
    );
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, SessionEffect::OpenWhisperComposer { .. })));
    let stack = state.active_stack().expect("stack");
    assert_eq!(stack.phase(), StackPhase::Idle(0));
    assert_eq!(stack.current().map(|p| p.id.as_str()), Some("p1"));
    assert!(state.outcomes.history.records().is_empty());
    assert!(state.timers.is_empty());
    assert!(state.interaction.composer.is_none());
}

#[test]
fn release_thresholds_commit_or_spring_back() {
    let mut state = state();
    ask(&mut state, "Find me a Python co-founder");

    let effects = drag(&mut state, 90.0, 50.0);
    assert!(effects.contains(&SessionEffect::OpenWhisperComposer {
        profile_id: ProfileId::new("p1"),
        name: "Person p1".to_string(),
    }));
    user(&mut state, UserAction::DismissComposer);
    fire_all(&mut state, &effects);
    assert_eq!(
        state.active_stack().map(|stack| stack.phase()),
        Some(StackPhase::Idle(1))
    );

    let effects = drag(&mut state, 40.0, 50.0);
    assert_eq!(effects, vec![SessionEffect::RequestFrame]);
    assert_eq!(
        state.active_stack().map(|stack| stack.phase()),
        Some(StackPhase::Idle(1))
    );
    assert!(state.interaction.drag.spring.is_some());

    let mut frames = 0;
    while state.interaction.drag.spring.is_some() && frames < 600 {
        runtime(&mut state, RuntimeAction::Frame { dt_ms: 16 });
        frames += 1;
    }
    assert!(state.interaction.drag.spring.is_none());
    assert_eq!(state.interaction.drag.visual_offset(), 0.0);
    assert_eq!(state.interaction.drag.rotation(), 0.0);
}

#[test]
fn stream_error_after_thinking_keeps_trace() {
    let mut state = state();
    let id = send(&mut state, "Find me a Python co-founder");
    stream(&mut state, id, thinking("Looking at"));
    stream(&mut state, id, thinking("Looking at co-founders"));

    let effects = stream(&mut state, id, StreamEvent::Error("network".to_string()));

    assert_eq!(effects, vec![SessionEffect::RequestFrame]);
    let message = state.transcript.get(id).expect("message");
    assert!(!message.is_streaming);
    assert_eq!(message.content, STREAM_APOLOGY);
    assert_eq!(message.thinking.as_deref(), Some("Looking at co-founders"));
    assert!(state.active_reply.is_none());
    assert!(state.transcript.anchor().is_none());
}
