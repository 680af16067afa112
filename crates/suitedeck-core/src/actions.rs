use super::environment::EnvironmentReport;
use super::error::ConsoleError;
use super::normalize::FileIdentity;
use super::state::DirectoryListing;
use super::state::EntryKind;
use super::state::RootEntry;
use super::state::RunRecord;
use super::state::TreeEntry;

#[derive(Debug, Clone)]
pub enum PanelAction {
    User(UserAction),
    Runtime(RuntimeAction),
}

/// Operator events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    RootChanged(String),
    DirectorySelected(String),
    NavigateUp,
    FileSelected(String),
    TagChanged(String),
    RunRequested,
    RegressionRequested,
    InstallRequested,
    OpenLastLog,
    CopyLastLog,
    CheckEnvironmentRequested,
    DismissNotice,
}

impl UserAction {
    pub fn for_entry(entry: &TreeEntry) -> Self {
        match entry.kind {
            EntryKind::Directory => Self::DirectorySelected(entry.rel.to_string()),
            EntryKind::File => Self::FileSelected(entry.rel.to_string()),
        }
    }
}

/// Backend responses and stream progress fed back into the controller.
#[derive(Debug, Clone)]
pub enum RuntimeAction {
    VocabularyLoaded(Vec<String>),
    VocabularyFailed(String),
    RootsLoaded(Vec<RootEntry>),
    ListingLoaded(DirectoryListing),
    ListingFailed {
        path: FileIdentity,
        message: String,
    },
    DeclaredTagsLoaded {
        file: FileIdentity,
        tags: Vec<String>,
    },
    DeclaredTagsFailed {
        file: FileIdentity,
        message: String,
    },
    RunSucceeded(RunRecord),
    RunFailed(ConsoleError),
    RegressionCountLoaded(Option<u64>),
    StreamOpened,
    StreamOpenFailed(String),
    StreamChunkReceived(Vec<u8>),
    StreamEnded,
    StreamFailed(String),
    RunHistoryLoaded(Vec<RunRecord>),
    RunHistoryFailed(String),
    FileContentLoaded {
        file: FileIdentity,
        content: String,
    },
    FileContentFailed {
        file: FileIdentity,
        message: String,
    },
    EnvironmentChecked(EnvironmentReport),
    EnvironmentCheckFailed(String),
}
