use chrono::Utc;

use super::actions::PanelAction;
use super::actions::RuntimeAction;
use super::actions::UserAction;
use super::error::ConsoleError;
use super::error::ValidationError;
use super::gate::FileTagSet;
use super::gate::TagVocabulary;
use super::normalize::is_within;
use super::normalize::normalize_path;
use super::normalize::normalize_tag;
use super::normalize::parent_within;
use super::normalize::FileIdentity;
use super::state::ConsoleSession;
use super::state::DirectoryListing;
use super::state::EnvironmentCheck;
use super::state::FileSource;
use super::state::Notice;
use super::state::NoticeLevel;
use super::state::PanelState;
use super::state::RunStatus;
use super::state::SelectionPhase;
use super::state::SelectionState;
use super::state::SourceView;
use super::state::StreamKind;
use super::state::StreamPhase;

/// Side effects the host must perform after a reduction. Results come back as
/// [`RuntimeAction`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEffect {
    FetchVocabulary,
    FetchRoots,
    FetchListing {
        path: FileIdentity,
    },
    FetchDeclaredTags {
        file: FileIdentity,
    },
    DispatchRun {
        file: FileIdentity,
        tag: String,
        available_tags: FileTagSet,
    },
    FetchRegressionCount,
    OpenStream {
        kind: StreamKind,
    },
    FetchRunHistory,
    OpenLog {
        locator: String,
    },
    CopyToClipboard(String),
    FetchFileContent {
        file: FileIdentity,
    },
    CheckEnvironment,
}

/// Effects a freshly created panel needs before the operator can do anything.
pub fn boot_effects() -> Vec<PanelEffect> {
    vec![PanelEffect::FetchVocabulary, PanelEffect::FetchRoots]
}

pub fn reduce(state: &mut PanelState, action: PanelAction) -> Vec<PanelEffect> {
    match action {
        PanelAction::User(user) => reduce_user(state, user),
        PanelAction::Runtime(runtime) => reduce_runtime(state, runtime),
    }
}

fn reject(state: &mut PanelState, err: ValidationError) -> Vec<PanelEffect> {
    state.raise(Notice::from_error(ConsoleError::Validation(err)));
    Vec::new()
}

/// Replaces the selection wholesale; nothing from the previous root survives.
fn change_root(state: &mut PanelState, root: FileIdentity) -> Vec<PanelEffect> {
    state.selection = SelectionState::new(root.clone());
    state.listing = DirectoryListing::empty(root.clone());
    state.source = None;
    state.run.detach();
    state.last_run = None;
    vec![PanelEffect::FetchListing { path: root }]
}

fn enter_directory(state: &mut PanelState, dir: FileIdentity) -> Vec<PanelEffect> {
    if !is_within(&dir, &state.selection.root) {
        let root = state.selection.root.clone();
        return reject(state, ValidationError::OutsideRoot { dir, root });
    }
    state.selection.current_directory = dir.clone();
    state.listing = DirectoryListing::empty(dir.clone());
    vec![PanelEffect::FetchListing { path: dir }]
}

/// Every selection shows the file's text; only runnable suites ask for tags.
fn select_file(state: &mut PanelState, file: FileIdentity) -> Vec<PanelEffect> {
    state.selection.clear_file();
    state.selection.selected_file = Some(file.clone());
    state.source = Some(FileSource {
        file: file.clone(),
        view: SourceView::Loading,
    });
    let mut effects = vec![PanelEffect::FetchFileContent { file: file.clone() }];

    if !state.gate.is_runnable(&file) {
        state.selection.phase = SelectionPhase::FileSelectedViewOnly;
        state.raise(Notice::new(
            NoticeLevel::Info,
            "View-only file (execution disabled).",
        ));
        return effects;
    }
    if !state.gate.is_suite_format(&file) {
        state.selection.phase = SelectionPhase::FileSelectedViewOnly;
        return effects;
    }

    state.selection.phase = SelectionPhase::FileSelectedRunnableNoTag;
    state.selection.tags_pending = true;
    effects.push(PanelEffect::FetchDeclaredTags { file });
    effects
}

/// Keeps the current tag when it survives the new tag set.
fn apply_declared_tags(state: &mut PanelState, tags: &[String]) {
    let available = state.gate.available_tags(tags);
    state.selection.tags_pending = false;
    state.selection.declared_tags = tags.to_vec();
    state.selection.selected_tag = state
        .selection
        .selected_tag
        .take()
        .filter(|tag| available.contains(tag))
        .or_else(|| available.first().map(str::to_string));
    if available.is_empty() {
        state.selection.phase = SelectionPhase::FileSelectedRunnableNoTag;
        state.raise(Notice::new(
            NoticeLevel::Hint,
            "No valid tags detected in this suite. Declare them with [Tags], e.g. [Tags]    regression    APIMAGAZORD.",
        ));
    } else {
        state.selection.phase = SelectionPhase::FileSelectedRunnableWithTag;
    }
    state.selection.available_tags = available;
}

fn start_stream(state: &mut PanelState, kind: StreamKind) -> Vec<PanelEffect> {
    if state.console_busy() {
        return reject(state, ValidationError::ConsoleBusy);
    }
    if state.run.is_in_flight() {
        return reject(state, ValidationError::RunInFlight);
    }
    state.console = Some(ConsoleSession::new(kind));
    match kind {
        StreamKind::Regression => vec![
            PanelEffect::FetchRegressionCount,
            PanelEffect::OpenStream { kind },
        ],
        StreamKind::InstallRequirements => vec![PanelEffect::OpenStream { kind }],
    }
}

fn reduce_user(state: &mut PanelState, action: UserAction) -> Vec<PanelEffect> {
    match action {
        UserAction::RootChanged(raw) => change_root(state, normalize_path(&raw)),
        UserAction::DirectorySelected(raw) => enter_directory(state, normalize_path(&raw)),
        UserAction::NavigateUp => {
            let parent = parent_within(
                &state.selection.current_directory,
                &state.selection.root,
            );
            enter_directory(state, parent)
        }
        UserAction::FileSelected(raw) => select_file(state, normalize_path(&raw)),
        UserAction::TagChanged(raw) => {
            if state.selection.phase != SelectionPhase::FileSelectedRunnableWithTag {
                return reject(state, ValidationError::NoTagSelected);
            }
            let tag = normalize_tag(&raw);
            if !state.selection.available_tags.contains(&tag) {
                let file = state.selection.selected_file.clone().unwrap_or_default();
                return reject(state, ValidationError::TagNotAvailable { file, tag });
            }
            state.selection.selected_tag = Some(tag);
            Vec::new()
        }
        UserAction::RunRequested => match state.validate_run() {
            Ok((file, tag)) => {
                state.run = RunStatus::InFlight {
                    file: file.clone(),
                    tag: tag.clone(),
                    started_at: Utc::now(),
                };
                state.raise(Notice::new(
                    NoticeLevel::Info,
                    format!("Running: robot -i {tag} {file}"),
                ));
                vec![PanelEffect::DispatchRun {
                    file,
                    tag,
                    available_tags: state.selection.available_tags.clone(),
                }]
            }
            Err(err) => reject(state, err),
        },
        UserAction::RegressionRequested => start_stream(state, StreamKind::Regression),
        UserAction::InstallRequested => start_stream(state, StreamKind::InstallRequirements),
        UserAction::OpenLastLog => match state.last_run.as_ref().and_then(|run| run.locator()) {
            Some(locator) => vec![PanelEffect::OpenLog {
                locator: locator.to_string(),
            }],
            None => vec![PanelEffect::FetchRunHistory],
        },
        UserAction::CopyLastLog => {
            let locator = state
                .last_run
                .as_ref()
                .and_then(|run| run.locator())
                .or_else(|| state.console.as_ref().and_then(ConsoleSession::locator))
                .map(str::to_string);
            match locator {
                Some(locator) => vec![PanelEffect::CopyToClipboard(locator)],
                None => {
                    state.raise(Notice::new(
                        NoticeLevel::Info,
                        "No log yet. Run a suite to produce one.",
                    ));
                    Vec::new()
                }
            }
        }
        UserAction::CheckEnvironmentRequested => {
            if state.environment == Some(EnvironmentCheck::Pending) {
                return Vec::new();
            }
            state.environment = Some(EnvironmentCheck::Pending);
            vec![PanelEffect::CheckEnvironment]
        }
        UserAction::DismissNotice => {
            state.notice = None;
            Vec::new()
        }
    }
}

fn reduce_runtime(state: &mut PanelState, action: RuntimeAction) -> Vec<PanelEffect> {
    match action {
        RuntimeAction::VocabularyLoaded(tags) => {
            if state.vocabulary_loaded {
                return Vec::new();
            }
            state.gate.vocabulary = TagVocabulary::new(tags);
            state.vocabulary_loaded = true;
            let selection = &state.selection;
            let resolved = matches!(
                selection.phase,
                SelectionPhase::FileSelectedRunnableNoTag
                    | SelectionPhase::FileSelectedRunnableWithTag
            ) && !selection.tags_pending;
            if resolved {
                let declared = selection.declared_tags.clone();
                apply_declared_tags(state, &declared);
            }
            Vec::new()
        }
        RuntimeAction::VocabularyFailed(message) => {
            state.vocabulary_loaded = true;
            state.raise(Notice::new(
                NoticeLevel::Warn,
                format!("Tag vocabulary unavailable: {message}"),
            ));
            Vec::new()
        }
        RuntimeAction::RootsLoaded(roots) => {
            let initial = if state.selection.root.is_empty() {
                roots
                    .iter()
                    .find(|root| !root.is_extra)
                    .map(|root| root.rel.clone())
            } else {
                None
            };
            state.roots = roots;
            match initial {
                Some(root) => change_root(state, root),
                None if state.listing.entries.is_empty() => vec![PanelEffect::FetchListing {
                    path: state.selection.current_directory.clone(),
                }],
                None => Vec::new(),
            }
        }
        RuntimeAction::ListingLoaded(listing) => {
            if listing.path == state.selection.current_directory {
                state.listing = listing;
            }
            Vec::new()
        }
        RuntimeAction::ListingFailed { path, message } => {
            if path == state.selection.current_directory {
                state.listing = DirectoryListing::empty(path);
                state.raise(Notice::from_error(ConsoleError::Navigation(message)));
            }
            Vec::new()
        }
        RuntimeAction::DeclaredTagsLoaded { file, tags } => {
            if state.selection.selected_file.as_ref() == Some(&file) && state.selection.tags_pending
            {
                apply_declared_tags(state, &tags);
            }
            Vec::new()
        }
        RuntimeAction::DeclaredTagsFailed { file, message } => {
            if state.selection.selected_file.as_ref() == Some(&file) && state.selection.tags_pending
            {
                tracing::debug!(%file, %message, "declared tags unavailable");
                apply_declared_tags(state, &[]);
            }
            Vec::new()
        }
        RuntimeAction::RunSucceeded(record) => {
            if !matches!(state.run, RunStatus::InFlight { .. }) {
                release_detached_run(state);
                return Vec::new();
            }
            state.run = RunStatus::Idle;
            let message = match record.returncode {
                Some(0) => "Run finished (OK).".to_string(),
                Some(rc) => format!("Run finished (rc={rc})."),
                None => "Run finished.".to_string(),
            };
            let level = if record.succeeded() {
                NoticeLevel::Info
            } else {
                NoticeLevel::Warn
            };
            state.raise(Notice::new(level, message));
            state.last_run = Some(record);
            Vec::new()
        }
        RuntimeAction::RunFailed(err) => {
            if !matches!(state.run, RunStatus::InFlight { .. }) {
                release_detached_run(state);
                return Vec::new();
            }
            state.run = RunStatus::Idle;
            state.raise(Notice::from_error(err));
            Vec::new()
        }
        RuntimeAction::RegressionCountLoaded(count) => {
            if let Some(session) = state.console.as_mut() {
                session.advisory_count = count.filter(|n| *n > 0);
            }
            Vec::new()
        }
        RuntimeAction::StreamOpened => {
            if let Some(session) = state.console.as_mut() {
                session.open();
            }
            Vec::new()
        }
        RuntimeAction::StreamOpenFailed(message) => {
            if let Some(session) = state.console.as_mut() {
                session.fail(message.clone());
            }
            state.raise(Notice::from_error(ConsoleError::StreamTransport(message)));
            Vec::new()
        }
        RuntimeAction::StreamChunkReceived(chunk) => {
            if let Some(session) = state.console.as_mut() {
                session.ingest_chunk(&chunk);
            }
            Vec::new()
        }
        RuntimeAction::StreamEnded => {
            let Some(session) = state.console.as_mut() else {
                return Vec::new();
            };
            if session.phase != StreamPhase::Streaming {
                return Vec::new();
            }
            session.finish();
            let kind = session.kind;
            let locator = session.locator().map(str::to_string);
            let reported_ok = session.reported_ok();
            match kind {
                StreamKind::Regression => match locator {
                    Some(locator) => {
                        state.raise(Notice::new(
                            NoticeLevel::Info,
                            "Regression finished. Log opened in the viewer.",
                        ));
                        vec![PanelEffect::OpenLog { locator }]
                    }
                    None => {
                        state.raise(Notice::new(NoticeLevel::Info, "Regression finished."));
                        Vec::new()
                    }
                },
                StreamKind::InstallRequirements => {
                    if reported_ok == Some(true) {
                        state.raise(Notice::new(NoticeLevel::Info, "Installation finished."));
                    } else {
                        state.raise(Notice::new(
                            NoticeLevel::Warn,
                            "Installation ended with warnings or errors. Check the output above.",
                        ));
                    }
                    Vec::new()
                }
            }
        }
        RuntimeAction::StreamFailed(message) => {
            if let Some(session) = state.console.as_mut() {
                session.fail(message.clone());
            }
            state.raise(Notice::from_error(ConsoleError::StreamTransport(message)));
            Vec::new()
        }
        RuntimeAction::RunHistoryLoaded(runs) => {
            match runs.into_iter().find(|run| run.locator().is_some()) {
                Some(run) => {
                    let locator = run.locator().map(str::to_string).unwrap_or_default();
                    state.last_run = Some(run);
                    vec![PanelEffect::OpenLog { locator }]
                }
                None => {
                    state.raise(Notice::new(
                        NoticeLevel::Info,
                        "No log yet. Run a suite to produce one.",
                    ));
                    Vec::new()
                }
            }
        }
        RuntimeAction::FileContentLoaded { file, content } => {
            if let Some(source) = state.source.as_mut().filter(|source| source.file == file) {
                source.view = SourceView::Loaded(content);
            }
            Vec::new()
        }
        RuntimeAction::FileContentFailed { file, message } => {
            if let Some(source) = state.source.as_mut().filter(|source| source.file == file) {
                source.view = SourceView::Failed(message);
            }
            Vec::new()
        }
        RuntimeAction::EnvironmentChecked(report) => {
            let level = if report.ok {
                NoticeLevel::Info
            } else {
                NoticeLevel::Warn
            };
            state.raise(Notice::new(level, report.headline()));
            state.environment = Some(EnvironmentCheck::Ready(report));
            Vec::new()
        }
        RuntimeAction::EnvironmentCheckFailed(message) => {
            state.raise(Notice::new(
                NoticeLevel::Error,
                format!("Environment check failed: {message}"),
            ));
            state.environment = Some(EnvironmentCheck::Failed(message));
            Vec::new()
        }
        RuntimeAction::RunHistoryFailed(message) => {
            tracing::debug!(%message, "run history unavailable");
            state.raise(Notice::new(
                NoticeLevel::Info,
                "No log yet. Run a suite to produce one.",
            ));
            Vec::new()
        }
    }
}

/// The backend finished a run started under a previous root. Its result is
/// dropped, but the backend is free again.
fn release_detached_run(state: &mut PanelState) {
    if let RunStatus::Detached { file, tag, .. } = &state.run {
        tracing::debug!(%file, %tag, "discarding result of detached run");
        state.run = RunStatus::Idle;
    }
}

#[cfg(test)]
mod tests;
