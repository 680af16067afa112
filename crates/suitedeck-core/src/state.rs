use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::environment::EnvironmentReport;
use super::error::ConsoleError;
use super::error::ValidationError;
use super::frame::classify_frame;
use super::frame::EndMarker;
use super::frame::LineAssembler;
use super::frame::StreamFrame;
use super::frame::StreamMeta;
use super::gate::FileTagSet;
use super::gate::Gate;
use super::normalize::FileIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    NoFileSelected,
    FileSelectedViewOnly,
    FileSelectedRunnableNoTag,
    FileSelectedRunnableWithTag,
}

impl SelectionPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::NoFileSelected => "no file selected",
            Self::FileSelectedViewOnly => "view only",
            Self::FileSelectedRunnableNoTag => "runnable, no tag",
            Self::FileSelectedRunnableWithTag => "runnable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    pub root: FileIdentity,
    pub current_directory: FileIdentity,
    pub selected_file: Option<FileIdentity>,
    pub selected_tag: Option<String>,
    pub available_tags: FileTagSet,
    /// Raw tags the backend found in the selected suite, kept so the
    /// available set can be recomputed once the vocabulary arrives.
    pub declared_tags: Vec<String>,
    pub phase: SelectionPhase,
    /// Declared tags were requested and have not arrived yet.
    pub tags_pending: bool,
}

impl SelectionState {
    pub fn new(root: FileIdentity) -> Self {
        Self {
            current_directory: root.clone(),
            root,
            selected_file: None,
            selected_tag: None,
            available_tags: FileTagSet::default(),
            declared_tags: Vec::new(),
            phase: SelectionPhase::NoFileSelected,
            tags_pending: false,
        }
    }

    pub(crate) fn clear_file(&mut self) {
        self.selected_file = None;
        self.selected_tag = None;
        self.available_tags = FileTagSet::default();
        self.declared_tags.clear();
        self.phase = SelectionPhase::NoFileSelected;
        self.tags_pending = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    #[serde(alias = "dir")]
    Directory,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub rel: FileIdentity,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    pub path: FileIdentity,
    pub entries: Vec<TreeEntry>,
}

impl DirectoryListing {
    pub fn empty(path: FileIdentity) -> Self {
        Self {
            path,
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootEntry {
    pub name: String,
    pub rel: FileIdentity,
    /// Top-level files offered next to the suite folders (readme etc.).
    pub is_extra: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRecord {
    pub run_id: Option<String>,
    pub returncode: Option<i32>,
    pub log_url: Option<String>,
    pub report_url: Option<String>,
    pub stdout_tail: Option<String>,
    pub stderr_tail: Option<String>,
    pub target: Option<FileIdentity>,
    pub tag: Option<String>,
}

impl RunRecord {
    pub fn locator(&self) -> Option<&str> {
        self.log_url.as_deref().filter(|url| !url.trim().is_empty())
    }

    pub fn succeeded(&self) -> bool {
        self.returncode == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    InFlight {
        file: FileIdentity,
        tag: String,
        started_at: DateTime<Utc>,
    },
    /// Started under a root the operator has since left. The backend is still
    /// busy with it; its result will be discarded.
    Detached {
        file: FileIdentity,
        tag: String,
        started_at: DateTime<Utc>,
    },
}

impl RunStatus {
    /// The backend is executing a single run, attached or not.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight { .. } | Self::Detached { .. })
    }

    pub(crate) fn detach(&mut self) {
        *self = match std::mem::replace(self, Self::Idle) {
            Self::InFlight {
                file,
                tag,
                started_at,
            } => Self::Detached {
                file,
                tag,
                started_at,
            },
            other => other,
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Regression,
    InstallRequirements,
}

impl StreamKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Regression => "regression (all suites)",
            Self::InstallRequirements => "install requirements",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Streaming,
    Finalizing,
    Closed { locator: Option<String> },
    Failed { message: String },
}

impl StreamPhase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "starting",
            Self::Streaming => "streaming",
            Self::Finalizing => "finalizing",
            Self::Closed { locator: Some(_) } => "finished (log available)",
            Self::Closed { locator: None } => "finished",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub seq: u64,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ConsoleBuffer {
    next_seq: u64,
    lines: Vec<ConsoleLine>,
}

impl Default for ConsoleBuffer {
    fn default() -> Self {
        Self {
            next_seq: 1,
            lines: Vec::new(),
        }
    }
}

impl ConsoleBuffer {
    pub fn push(&mut self, text: String) {
        self.lines.push(ConsoleLine {
            seq: self.next_seq,
            text,
        });
        self.next_seq += 1;
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.next_seq = 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConsoleLine> {
        self.lines.iter()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|line| line.text.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// One live stream bound to the console.
#[derive(Debug, Clone)]
pub struct ConsoleSession {
    pub kind: StreamKind,
    pub phase: StreamPhase,
    pub buffer: ConsoleBuffer,
    pub meta: Option<StreamMeta>,
    pub end: Option<EndMarker>,
    pub advisory_count: Option<u64>,
    pub opened_at: DateTime<Utc>,
    assembler: LineAssembler,
}

impl ConsoleSession {
    pub fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            phase: StreamPhase::Idle,
            buffer: ConsoleBuffer::default(),
            meta: None,
            end: None,
            advisory_count: None,
            opened_at: Utc::now(),
            assembler: LineAssembler::new(),
        }
    }

    /// Still owns the console: not yet closed or failed.
    pub fn is_active(&self) -> bool {
        matches!(
            self.phase,
            StreamPhase::Idle | StreamPhase::Streaming | StreamPhase::Finalizing
        )
    }

    pub fn open(&mut self) {
        if self.phase == StreamPhase::Idle {
            self.phase = StreamPhase::Streaming;
        }
    }

    /// Feeds one transport chunk; returns how many content lines it rendered.
    pub fn ingest_chunk(&mut self, chunk: &[u8]) -> usize {
        if self.phase != StreamPhase::Streaming {
            return 0;
        }
        let before = self.buffer.len();
        for line in self.assembler.push(chunk) {
            self.ingest_line(&line);
        }
        self.buffer.len() - before
    }

    fn ingest_line(&mut self, line: &str) {
        match classify_frame(line) {
            StreamFrame::Content(text) => self.buffer.push(text),
            StreamFrame::Meta(payload) => match StreamMeta::parse(&payload) {
                Ok(meta) => self.meta = Some(meta),
                Err(err) => {
                    let err = ConsoleError::StreamMalformedFrame(err.to_string());
                    tracing::debug!(%err, "ignoring meta frame");
                }
            },
            StreamFrame::End(tail) => self.end = Some(EndMarker::parse(&tail)),
        }
    }

    pub fn finish(&mut self) {
        if self.phase != StreamPhase::Streaming {
            return;
        }
        self.phase = StreamPhase::Finalizing;
        if let Some(rest) = self.assembler.finish() {
            self.ingest_line(&rest);
        }
        let locator = self
            .meta
            .as_ref()
            .and_then(StreamMeta::locator)
            .map(str::to_string);
        self.phase = StreamPhase::Closed { locator };
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if !self.is_active() {
            return;
        }
        self.assembler = LineAssembler::new();
        self.phase = StreamPhase::Failed {
            message: message.into(),
        };
    }

    pub fn locator(&self) -> Option<&str> {
        match &self.phase {
            StreamPhase::Closed { locator } => locator.as_deref(),
            _ => None,
        }
    }

    /// `ok:` flag of the end marker. Only the install stream reports through it.
    pub fn reported_ok(&self) -> Option<bool> {
        self.end.as_ref().and_then(|end| end.ok)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceView {
    Loading,
    Loaded(String),
    Failed(String),
}

/// Text of the selected file, shown whether or not it is runnable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    pub file: FileIdentity,
    pub view: SourceView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentCheck {
    Pending,
    Ready(EnvironmentReport),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Hint,
    Warn,
    Error,
}

impl NoticeLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Hint => "hint",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub error: Option<ConsoleError>,
    pub raised_at: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            error: None,
            raised_at: Utc::now(),
        }
    }

    pub fn from_error(error: ConsoleError) -> Self {
        let level = match error {
            ConsoleError::Validation(_) | ConsoleError::InvalidTag { .. } => NoticeLevel::Warn,
            _ => NoticeLevel::Error,
        };
        Self {
            level,
            message: error.to_string(),
            error: Some(error),
            raised_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PanelState {
    pub gate: Gate,
    pub vocabulary_loaded: bool,
    pub roots: Vec<RootEntry>,
    pub selection: SelectionState,
    pub listing: DirectoryListing,
    pub run: RunStatus,
    pub last_run: Option<RunRecord>,
    pub console: Option<ConsoleSession>,
    pub source: Option<FileSource>,
    pub environment: Option<EnvironmentCheck>,
    pub notice: Option<Notice>,
}

impl PanelState {
    pub fn new(gate: Gate) -> Self {
        Self {
            gate,
            vocabulary_loaded: false,
            roots: Vec::new(),
            selection: SelectionState::new(FileIdentity::default()),
            listing: DirectoryListing::default(),
            run: RunStatus::Idle,
            last_run: None,
            console: None,
            source: None,
            environment: None,
            notice: None,
        }
    }

    pub fn console_busy(&self) -> bool {
        self.console
            .as_ref()
            .is_some_and(ConsoleSession::is_active)
    }

    /// Re-derives run eligibility from the allow-list and the current tag set.
    pub fn validate_run(&self) -> Result<(FileIdentity, String), ValidationError> {
        if self.run.is_in_flight() {
            return Err(ValidationError::RunInFlight);
        }
        if self.console_busy() {
            return Err(ValidationError::ConsoleBusy);
        }
        let Some(file) = self.selection.selected_file.clone() else {
            return Err(ValidationError::NoFileSelected);
        };
        if !self.gate.is_runnable(&file) {
            return Err(ValidationError::NotRunnable(file));
        }
        let Some(tag) = self.selection.selected_tag.clone() else {
            return Err(ValidationError::NoTagSelected);
        };
        if self.selection.phase != SelectionPhase::FileSelectedRunnableWithTag {
            return Err(ValidationError::NoTagSelected);
        }
        if !self.selection.available_tags.contains(&tag) {
            return Err(ValidationError::TagNotAvailable { file, tag });
        }
        Ok((file, tag))
    }

    pub fn run_action_enabled(&self) -> bool {
        self.validate_run().is_ok()
    }

    pub fn raise(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }
}
