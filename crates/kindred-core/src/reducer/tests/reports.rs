use super::*;
use pretty_assertions::assert_eq;

fn file(name: &str, mime_type: &str, size_bytes: u64) -> AttachmentFile {
    AttachmentFile {
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        size_bytes,
    }
}

fn contacted_state() -> SessionState {
    let mut state = state();
    ask(&mut state, "Find me a Python co-founder");
    whisper_top_card(&mut state, "hi");
    state
}

#[test]
fn report_rejects_bad_files_individually_and_keeps_draft_on_failure() {
    let mut state = contacted_state();
    user(
        &mut state,
        UserAction::OpenReport {
            profile_id: ProfileId::new("p1"),
        },
    );

    let effects = user(
        &mut state,
        UserAction::AddReportFiles(vec![
            file("chat.png", "image/png", 4_096),
            file("setup.exe", "application/x-msdownload", 1_024),
            file("huge.pdf", "application/pdf", 11 * 1024 * 1024),
        ]),
    );
    assert_eq!(toasts(&effects).len(), 2);
    assert_eq!(state.urls.live_count(), 1);

    let effects = user(
        &mut state,
        UserAction::SubmitReport {
            reason: "   ".to_string(),
        },
    );
    assert_eq!(toasts(&effects), vec!["a report needs a reason"]);
    let draft = &state.interaction.report.as_ref().expect("report open").draft;
    assert_eq!(draft.attachments().len(), 1);
    assert_eq!(state.urls.live_count(), 1);

    let effects = user(
        &mut state,
        UserAction::SubmitReport {
            reason: " harassment ".to_string(),
        },
    );
    assert_eq!(
        effects[0],
        SessionEffect::PersistOutcome(OutcomeEvent::Reported {
            profile_id: ProfileId::new("p1"),
            reason: "harassment".to_string(),
            attachment_count: 1,
        })
    );
    assert!(state.interaction.report.is_none());
    assert_eq!(state.urls.live_count(), 0);
    assert_eq!(state.urls.revoked_count(), 1);
    let record = state
        .outcomes
        .history
        .get(&ProfileId::new("p1"))
        .expect("record");
    assert!(record.reported);
    assert_eq!(record.report_reason.as_deref(), Some("harassment"));
}

#[test]
fn removing_and_discarding_release_each_url_once() {
    let mut state = contacted_state();
    user(
        &mut state,
        UserAction::OpenReport {
            profile_id: ProfileId::new("p1"),
        },
    );
    user(
        &mut state,
        UserAction::AddReportFiles(vec![
            file("a.png", "image/png", 10),
            file("b.txt", "text/plain", 10),
            file("c.webp", "image/webp", 10),
        ]),
    );
    let first = state
        .interaction
        .report
        .as_ref()
        .map(|report| report.draft.attachments()[0].id)
        .expect("attachment");

    assert_eq!(
        user(&mut state, UserAction::RemoveReportFile(first)),
        vec![SessionEffect::RequestFrame]
    );
    assert!(user(&mut state, UserAction::RemoveReportFile(first)).is_empty());
    user(&mut state, UserAction::DiscardReport);

    assert_eq!(state.urls.live_count(), 0);
    assert_eq!(state.urls.revoked_count(), 3);
    assert!(user(&mut state, UserAction::DiscardReport).is_empty());
    assert!(!state
        .outcomes
        .history
        .get(&ProfileId::new("p1"))
        .is_some_and(|record| record.reported));
}

#[test]
fn reopening_a_report_releases_the_previous_draft() {
    let mut state = contacted_state();
    let open = UserAction::OpenReport {
        profile_id: ProfileId::new("p1"),
    };
    user(&mut state, open.clone());
    user(
        &mut state,
        UserAction::AddReportFiles(vec![file("a.png", "image/png", 10)]),
    );

    user(&mut state, open);

    assert_eq!(state.urls.live_count(), 0);
    assert!(state
        .interaction
        .report
        .as_ref()
        .is_some_and(|report| report.draft.attachments().is_empty()));
}

#[test]
fn reporting_a_stranger_is_refused() {
    let mut state = state();
    let effects = user(
        &mut state,
        UserAction::OpenReport {
            profile_id: ProfileId::new("p2"),
        },
    );
    assert_eq!(toasts(&effects), vec!["p2 is not in your contact history"]);
    assert!(state.interaction.report.is_none());
    assert!(user(
        &mut state,
        UserAction::SubmitReport {
            reason: "spam".to_string(),
        },
    )
    .is_empty());
}
