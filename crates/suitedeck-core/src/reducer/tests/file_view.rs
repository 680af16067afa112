use super::*;
use pretty_assertions::assert_eq;

fn source_view(state: &PanelState) -> Option<&SourceView> {
    state.source.as_ref().map(|source| &source.view)
}

#[test]
fn selected_file_text_replaces_the_loading_view() {
    let mut state = state();
    user(&mut state, UserAction::FileSelected(UNLISTED.to_string()));
    assert_eq!(source_view(&state), Some(&SourceView::Loading));

    run_runtime(
        &mut state,
        RuntimeAction::FileContentLoaded {
            file: FileIdentity::new(UNLISTED),
            content: "*** Test Cases ***".to_string(),
        },
    );

    assert_eq!(
        source_view(&state),
        Some(&SourceView::Loaded("*** Test Cases ***".to_string()))
    );
}

#[test]
fn text_for_a_previous_selection_is_ignored() {
    let mut state = state();
    user(&mut state, UserAction::FileSelected(UNLISTED.to_string()));
    select_with_tags(&mut state, SUITE, &["APIMAGAZORD"]);

    run_runtime(
        &mut state,
        RuntimeAction::FileContentLoaded {
            file: FileIdentity::new(UNLISTED),
            content: "stale".to_string(),
        },
    );

    let source = state.source.as_ref().map(|source| &source.file);
    assert_eq!(source, Some(&FileIdentity::new(SUITE)));
    assert_eq!(source_view(&state), Some(&SourceView::Loading));
}

#[test]
fn unreadable_file_keeps_selection_and_shows_the_reason() {
    let mut state = state();
    select_with_tags(&mut state, SUITE, &["APIMAGAZORD"]);

    run_runtime(
        &mut state,
        RuntimeAction::FileContentFailed {
            file: FileIdentity::new(SUITE),
            message: "file not found".to_string(),
        },
    );

    assert_eq!(
        source_view(&state),
        Some(&SourceView::Failed("file not found".to_string()))
    );
    assert!(state.run_action_enabled());
}

#[test]
fn root_change_drops_the_source_view() {
    let mut state = state();
    user(&mut state, UserAction::FileSelected(UNLISTED.to_string()));
    user(&mut state, UserAction::RootChanged(ROOT.to_string()));

    assert!(state.source.is_none());
}

#[test]
fn environment_check_is_not_repeated_while_pending() {
    let mut state = state();

    let first = user(&mut state, UserAction::CheckEnvironmentRequested);
    let second = user(&mut state, UserAction::CheckEnvironmentRequested);

    assert_eq!(first, vec![PanelEffect::CheckEnvironment]);
    assert!(second.is_empty());
    assert_eq!(state.environment, Some(EnvironmentCheck::Pending));
}

#[test]
fn environment_report_is_kept_and_announced() {
    let mut state = state();
    user(&mut state, UserAction::CheckEnvironmentRequested);
    let report = EnvironmentReport {
        ok: false,
        packages_missing: vec!["requests".to_string()],
        ..EnvironmentReport::default()
    };

    run_runtime(&mut state, RuntimeAction::EnvironmentChecked(report.clone()));

    let notice = state.notice.clone().expect("notice");
    assert_eq!(notice.level, NoticeLevel::Warn);
    assert_eq!(notice.message, "Environment incomplete, fixes needed.");
    assert_eq!(state.environment, Some(EnvironmentCheck::Ready(report)));

    let again = user(&mut state, UserAction::CheckEnvironmentRequested);
    assert_eq!(again, vec![PanelEffect::CheckEnvironment]);
}

#[test]
fn failed_environment_check_surfaces_an_error() {
    let mut state = state();
    user(&mut state, UserAction::CheckEnvironmentRequested);

    run_runtime(
        &mut state,
        RuntimeAction::EnvironmentCheckFailed("connection refused".to_string()),
    );

    let notice = state.notice.clone().expect("notice");
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(
        notice.message,
        "Environment check failed: connection refused"
    );
    assert_eq!(
        state.environment,
        Some(EnvironmentCheck::Failed("connection refused".to_string()))
    );
}
