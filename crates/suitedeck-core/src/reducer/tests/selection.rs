use super::*;
use pretty_assertions::assert_eq;

#[test]
fn runnable_suite_defaults_to_first_available_tag() {
    let mut state = state();
    select_with_tags(&mut state, SUITE, &["APIMAGAZORD", "regression", "smoke"]);

    assert_eq!(
        state.selection.phase,
        SelectionPhase::FileSelectedRunnableWithTag
    );
    assert_eq!(tags_of(&state), vec!["apimagazord", "smoke"]);
    assert_eq!(state.selection.selected_tag.as_deref(), Some("apimagazord"));
    assert!(state.run_action_enabled());
}

#[test]
fn unlisted_file_is_view_only_without_tag_lookup() {
    let mut state = state();
    let effects = user(&mut state, UserAction::FileSelected(UNLISTED.to_string()));

    assert_eq!(
        effects,
        vec![PanelEffect::FetchFileContent {
            file: FileIdentity::new(UNLISTED)
        }]
    );
    assert_eq!(state.selection.phase, SelectionPhase::FileSelectedViewOnly);
    assert!(state.selection.available_tags.is_empty());
    assert!(!state.run_action_enabled());
    assert_eq!(
        state.notice.as_ref().map(|notice| notice.level),
        Some(NoticeLevel::Info)
    );
}

#[test]
fn selection_path_is_normalized_before_gating() {
    let mut state = state();
    let raw = "\\parte1-api\\questao1.1\\tests\\1.1test.robot";
    let effects = user(&mut state, UserAction::FileSelected(raw.to_string()));

    assert_eq!(
        effects,
        vec![
            PanelEffect::FetchFileContent {
                file: FileIdentity::new(SUITE)
            },
            PanelEffect::FetchDeclaredTags {
                file: FileIdentity::new(SUITE)
            },
        ]
    );
    assert_eq!(
        state.selection.selected_file,
        Some(FileIdentity::new(SUITE))
    );
}

#[test]
fn allow_listed_file_with_foreign_extension_is_view_only() {
    let mut state = PanelState::new(Gate::new(
        crate::gate::AllowList::new(["docs/readme.md"]),
        ".robot",
    ));
    let effects = user(
        &mut state,
        UserAction::FileSelected("docs/readme.md".to_string()),
    );

    assert_eq!(
        effects,
        vec![PanelEffect::FetchFileContent {
            file: FileIdentity::new("docs/readme.md")
        }]
    );
    assert_eq!(state.selection.phase, SelectionPhase::FileSelectedViewOnly);
    assert!(state.notice.is_none());
}

#[test]
fn zero_available_tags_leaves_run_disabled_with_hint() {
    let mut state = state();
    select_with_tags(&mut state, SUITE, &["regression", "unknown"]);

    assert_eq!(
        state.selection.phase,
        SelectionPhase::FileSelectedRunnableNoTag
    );
    assert_eq!(state.selection.selected_tag, None);
    assert!(!state.run_action_enabled());
    assert_eq!(
        state.notice.as_ref().map(|notice| notice.level),
        Some(NoticeLevel::Hint)
    );

    let effects = user(&mut state, UserAction::RunRequested);
    assert!(effects.is_empty());
    assert_eq!(state.run, RunStatus::Idle);
}

#[test]
fn declared_tags_failure_is_treated_as_no_tags() {
    let mut state = state();
    user(&mut state, UserAction::FileSelected(SUITE.to_string()));
    run_runtime(
        &mut state,
        RuntimeAction::DeclaredTagsFailed {
            file: FileIdentity::new(SUITE),
            message: "read error".to_string(),
        },
    );

    assert_eq!(
        state.selection.phase,
        SelectionPhase::FileSelectedRunnableNoTag
    );
    assert!(!state.selection.tags_pending);
}

#[test]
fn stale_declared_tags_for_previous_file_are_ignored() {
    let mut state = state();
    let other = "parte1-api/questao1.1/tests/1.2test.robot";
    user(&mut state, UserAction::FileSelected(SUITE.to_string()));
    user(&mut state, UserAction::FileSelected(other.to_string()));

    run_runtime(
        &mut state,
        RuntimeAction::DeclaredTagsLoaded {
            file: FileIdentity::new(SUITE),
            tags: vec!["APIMAGAZORD".to_string()],
        },
    );

    assert_eq!(state.selection.selected_file, Some(FileIdentity::new(other)));
    assert!(state.selection.tags_pending);
    assert_eq!(
        state.selection.phase,
        SelectionPhase::FileSelectedRunnableNoTag
    );
}

#[test]
fn tag_change_is_normalized_and_restricted_to_available_tags() {
    let mut state = state();
    select_with_tags(&mut state, SUITE, &["APIMAGAZORD", "Smoke"]);

    let effects = user(&mut state, UserAction::TagChanged("  SMOKE ".to_string()));
    assert!(effects.is_empty());
    assert_eq!(state.selection.selected_tag.as_deref(), Some("smoke"));

    user(&mut state, UserAction::TagChanged("regression".to_string()));
    assert_eq!(state.selection.selected_tag.as_deref(), Some("smoke"));
    let err = state.notice.as_ref().and_then(|notice| notice.error.clone());
    assert_eq!(
        err,
        Some(ConsoleError::Validation(ValidationError::TagNotAvailable {
            file: FileIdentity::new(SUITE),
            tag: "regression".to_string(),
        }))
    );
}

#[test]
fn tag_change_outside_with_tag_phase_is_rejected() {
    let mut state = state();
    user(&mut state, UserAction::TagChanged("apimagazord".to_string()));

    assert_eq!(state.selection.selected_tag, None);
    assert_eq!(state.selection.phase, SelectionPhase::NoFileSelected);
}

#[test]
fn selecting_a_new_file_clears_previous_tags() {
    let mut state = state();
    select_with_tags(&mut state, SUITE, &["APIMAGAZORD"]);
    user(&mut state, UserAction::FileSelected(UNLISTED.to_string()));

    assert_eq!(state.selection.selected_tag, None);
    assert!(state.selection.available_tags.is_empty());
    assert_eq!(state.selection.available_tags, FileTagSet::default());
}

#[test]
fn vocabulary_is_loaded_once() {
    let mut state = state();
    run_runtime(
        &mut state,
        RuntimeAction::VocabularyLoaded(vec!["other".to_string()]),
    );

    assert!(state.gate.vocabulary.contains("apimagazord"));
    assert!(!state.gate.vocabulary.contains("other"));
}

#[test]
fn missing_vocabulary_is_not_fatal() {
    let mut state = PanelState::new(Gate::default());
    run_runtime(
        &mut state,
        RuntimeAction::VocabularyFailed("connection refused".to_string()),
    );
    user(&mut state, UserAction::RootChanged(ROOT.to_string()));
    select_with_tags(&mut state, SUITE, &["APIMAGAZORD"]);

    assert!(state.vocabulary_loaded);
    assert!(state.gate.vocabulary.is_empty());
    assert_eq!(
        state.selection.phase,
        SelectionPhase::FileSelectedRunnableNoTag
    );
}

#[test]
fn padded_declared_tag_is_selected_trimmed_and_dispatched_as_is() {
    let mut state = state();
    select_with_tags(&mut state, SUITE, &[" APIMAGAZORD"]);

    assert_eq!(tags_of(&state), vec!["apimagazord"]);
    assert_eq!(state.selection.selected_tag.as_deref(), Some("apimagazord"));

    user(&mut state, UserAction::TagChanged("apimagazord".to_string()));
    assert!(state.notice.is_none());

    let effects = user(&mut state, UserAction::RunRequested);
    assert!(matches!(
        effects.as_slice(),
        [PanelEffect::DispatchRun { tag, available_tags, .. }]
            if tag == "apimagazord" && available_tags.contains("apimagazord")
    ));
}

#[test]
fn tags_resolved_before_the_vocabulary_are_recomputed_when_it_arrives() {
    let mut state = PanelState::new(Gate::default());
    user(&mut state, UserAction::RootChanged(ROOT.to_string()));
    select_with_tags(&mut state, SUITE, &["APIMAGAZORD", "Smoke"]);
    assert_eq!(
        state.selection.phase,
        SelectionPhase::FileSelectedRunnableNoTag
    );
    assert!(!state.run_action_enabled());

    run_runtime(
        &mut state,
        RuntimeAction::VocabularyLoaded(vec!["apimagazord".to_string(), "smoke".to_string()]),
    );

    assert_eq!(
        state.selection.phase,
        SelectionPhase::FileSelectedRunnableWithTag
    );
    assert_eq!(tags_of(&state), vec!["apimagazord", "smoke"]);
    assert_eq!(state.selection.selected_tag.as_deref(), Some("apimagazord"));
    assert!(state.run_action_enabled());
}

#[test]
fn vocabulary_arriving_while_tags_are_pending_waits_for_them() {
    let mut state = PanelState::new(Gate::default());
    user(&mut state, UserAction::RootChanged(ROOT.to_string()));
    user(&mut state, UserAction::FileSelected(SUITE.to_string()));

    run_runtime(
        &mut state,
        RuntimeAction::VocabularyLoaded(vec!["apimagazord".to_string()]),
    );
    assert!(state.selection.tags_pending);

    run_runtime(
        &mut state,
        RuntimeAction::DeclaredTagsLoaded {
            file: FileIdentity::new(SUITE),
            tags: vec!["APIMAGAZORD".to_string()],
        },
    );
    assert_eq!(state.selection.selected_tag.as_deref(), Some("apimagazord"));
}
