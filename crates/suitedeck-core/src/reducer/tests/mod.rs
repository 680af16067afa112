use pretty_assertions::assert_eq;

pub(super) use super::boot_effects;
pub(super) use super::reduce;
pub(super) use crate::actions::PanelAction;
pub(super) use crate::actions::RuntimeAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::environment::EnvironmentReport;
pub(super) use crate::error::ConsoleError;
pub(super) use crate::error::ValidationError;
pub(super) use crate::gate::FileTagSet;
pub(super) use crate::gate::Gate;
pub(super) use crate::normalize::FileIdentity;
pub(super) use crate::reducer::PanelEffect;
pub(super) use crate::state::DirectoryListing;
pub(super) use crate::state::EnvironmentCheck;
pub(super) use crate::state::EntryKind;
pub(super) use crate::state::NoticeLevel;
pub(super) use crate::state::PanelState;
pub(super) use crate::state::RootEntry;
pub(super) use crate::state::RunRecord;
pub(super) use crate::state::RunStatus;
pub(super) use crate::state::SelectionPhase;
pub(super) use crate::state::SourceView;
pub(super) use crate::state::StreamKind;
pub(super) use crate::state::StreamPhase;
pub(super) use crate::state::TreeEntry;

mod file_view;
mod selection;

const ROOT: &str = "parte1-api";
const SUITE: &str = "parte1-api/questao1.1/tests/1.1test.robot";
const UNLISTED: &str = "parte1-api/questao1.1/tests/unlisted.robot";

/// Panel booted with a vocabulary and rooted at `parte1-api`.
fn state() -> PanelState {
    let mut state = PanelState::new(Gate::default());
    run_runtime(
        &mut state,
        RuntimeAction::VocabularyLoaded(vec![
            "APIMAGAZORD".to_string(),
            "Smoke".to_string(),
            "regression".to_string(),
        ]),
    );
    let effects = user(&mut state, UserAction::RootChanged(ROOT.to_string()));
    assert_eq!(
        effects,
        vec![PanelEffect::FetchListing {
            path: FileIdentity::new(ROOT)
        }]
    );
    state
}

fn user(state: &mut PanelState, action: UserAction) -> Vec<PanelEffect> {
    reduce(state, PanelAction::User(action))
}

fn runtime(state: &mut PanelState, action: RuntimeAction) -> Vec<PanelEffect> {
    reduce(state, PanelAction::Runtime(action))
}

fn run_runtime(state: &mut PanelState, action: RuntimeAction) {
    let effects = runtime(state, action);
    assert!(effects.is_empty());
}

/// Selects `file` and answers its declared-tags request with `declared`.
fn select_with_tags(state: &mut PanelState, file: &str, declared: &[&str]) {
    let effects = user(state, UserAction::FileSelected(file.to_string()));
    assert_eq!(
        effects,
        vec![
            PanelEffect::FetchFileContent {
                file: FileIdentity::new(file)
            },
            PanelEffect::FetchDeclaredTags {
                file: FileIdentity::new(file)
            },
        ]
    );
    run_runtime(
        state,
        RuntimeAction::DeclaredTagsLoaded {
            file: FileIdentity::new(file),
            tags: declared.iter().map(|tag| tag.to_string()).collect(),
        },
    );
}

fn record(log_url: Option<&str>, returncode: i32) -> RunRecord {
    RunRecord {
        run_id: Some("20240101-000000-abcd".to_string()),
        returncode: Some(returncode),
        log_url: log_url.map(str::to_string),
        target: Some(FileIdentity::new(SUITE)),
        tag: Some("apimagazord".to_string()),
        ..RunRecord::default()
    }
}

fn tags_of(state: &PanelState) -> Vec<&str> {
    state.selection.available_tags.iter().collect()
}
