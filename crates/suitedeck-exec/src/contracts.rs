//! JSON bodies exchanged with the suite backend.

use serde::Deserialize;
use serde::Serialize;
use suitedeck_core::normalize_path;
use suitedeck_core::DirectoryListing;
use suitedeck_core::EntryKind;
use suitedeck_core::EnvironmentReport;
use suitedeck_core::FileIdentity;
use suitedeck_core::RootEntry;
use suitedeck_core::RunRecord;
use suitedeck_core::TreeEntry;

/// Error code the backend uses when the requested tag is not declared in the suite.
pub const TAG_NOT_FOUND_IN_SUITE: &str = "tag_not_found_in_suite";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedPath {
    pub name: String,
    pub rel: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RootsResponse {
    pub roots: Vec<NamedPath>,
    pub extras: Vec<NamedPath>,
}

impl RootsResponse {
    pub fn into_entries(self) -> Vec<RootEntry> {
        let roots = self.roots.into_iter().map(|root| RootEntry {
            name: root.name,
            rel: normalize_path(&root.rel),
            is_extra: false,
        });
        let extras = self.extras.into_iter().map(|extra| RootEntry {
            name: extra.name,
            rel: normalize_path(&extra.rel),
            is_extra: true,
        });
        roots.chain(extras).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeItem {
    pub name: String,
    pub rel: String,
    #[serde(default)]
    pub is_dir: bool,
    /// Newer backends name the kind instead of sending `is_dir`.
    #[serde(default)]
    pub kind: Option<EntryKind>,
}

impl TreeItem {
    pub fn entry_kind(&self) -> EntryKind {
        match self.kind {
            Some(kind) => kind,
            None if self.is_dir => EntryKind::Directory,
            None => EntryKind::File,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TreeResponse {
    pub path: String,
    pub items: Vec<TreeItem>,
}

impl TreeResponse {
    /// Keeps the backend's ordering. `requested` names the listing, since the
    /// backend echoes an empty path for the project root.
    pub fn into_listing(self, requested: &FileIdentity) -> DirectoryListing {
        DirectoryListing {
            path: requested.clone(),
            entries: self
                .items
                .into_iter()
                .map(|item| TreeEntry {
                    kind: item.entry_kind(),
                    rel: normalize_path(&item.rel),
                    name: item.name,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RobotTagsResponse {
    pub ok: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRequest<'a> {
    pub path: &'a str,
    pub tag: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunResponse {
    pub run_id: Option<String>,
    pub returncode: Option<i32>,
    pub cmd: Vec<String>,
    pub stdout_tail: Option<String>,
    pub stderr_tail: Option<String>,
    pub log_url: Option<String>,
    pub report_url: Option<String>,
    pub output_xml_url: Option<String>,
}

impl RunResponse {
    pub fn into_record(self, target: &FileIdentity, tag: &str) -> RunRecord {
        RunRecord {
            run_id: self.run_id,
            returncode: self.returncode,
            log_url: self.log_url,
            report_url: self.report_url,
            stdout_tail: self.stdout_tail,
            stderr_tail: self.stderr_tail,
            target: Some(target.clone()),
            tag: Some(tag.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunSummary {
    pub run_id: Option<String>,
    pub created_at: Option<String>,
    pub returncode: Option<i32>,
    pub log_url: Option<String>,
    pub report_url: Option<String>,
    pub tag: Option<String>,
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunsResponse {
    pub runs: Vec<RunSummary>,
}

impl RunsResponse {
    /// Newest first, as the backend lists them.
    pub fn into_records(self) -> Vec<RunRecord> {
        self.runs
            .into_iter()
            .map(|run| RunRecord {
                run_id: run.run_id,
                returncode: run.returncode,
                log_url: run.log_url,
                report_url: run.report_url,
                stdout_tail: None,
                stderr_tail: None,
                target: run.target.as_deref().map(normalize_path),
                tag: run.tag,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegressionCountResponse {
    pub count: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClearRunsResponse {
    pub ok: bool,
    pub removed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileContentResponse {
    pub path: Option<String>,
    pub content: Option<String>,
}

/// Every field is optional; older backends omit the import-failure list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CheckResponse {
    pub ok: bool,
    pub platform: Option<String>,
    pub python: Option<String>,
    pub python_exe: Option<String>,
    pub robot_module: Option<String>,
    pub robot_cmd: Option<String>,
    pub node_cmd: Option<String>,
    pub npm_cmd: Option<String>,
    pub adb_cmd: Option<String>,
    pub packages_ok: Vec<String>,
    pub packages_missing: Vec<String>,
    pub packages_installed_but_import_failed: Vec<String>,
    pub problems: Vec<String>,
}

impl CheckResponse {
    pub fn into_report(self) -> EnvironmentReport {
        EnvironmentReport {
            ok: self.ok,
            platform: self.platform,
            python: self.python,
            python_exe: self.python_exe,
            robot_module: self.robot_module,
            robot_cmd: self.robot_cmd,
            node_cmd: self.node_cmd,
            npm_cmd: self.npm_cmd,
            adb_cmd: self.adb_cmd,
            packages_ok: self.packages_ok,
            packages_missing: self.packages_missing,
            packages_import_failed: self.packages_installed_but_import_failed,
            problems: self.problems,
        }
    }
}

/// Structured failure body. The backend uses `error` for a code or message and
/// sometimes adds a human `message`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
    pub available_tags: Vec<String>,
}

impl ErrorBody {
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str::<Self>(body)
            .ok()
            .filter(|parsed| parsed.error.is_some() || parsed.message.is_some())
    }

    pub fn is_tag_not_found(&self) -> bool {
        self.error.as_deref() == Some(TAG_NOT_FOUND_IN_SUITE)
    }

    /// Operator-facing text: the message when present, else the error field.
    pub fn describe(&self) -> String {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or_default()
            .to_string()
    }
}
