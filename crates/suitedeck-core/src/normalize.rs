use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Normalized project-relative path: `/`-separated, never a leading slash.
///
/// Two identities are the same file iff their strings are equal. The only way
/// to build one is through [`normalize_path`], so an identity is always
/// already canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FileIdentity(String);

impl FileIdentity {
    pub fn new(raw: impl AsRef<str>) -> Self {
        normalize_path(raw.as_ref())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }

    /// Final path segment, or the empty string for the project root.
    pub fn file_name(&self) -> &str {
        self.segments().last().unwrap_or("")
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FileIdentity {
    fn from(raw: String) -> Self {
        normalize_path(&raw)
    }
}

impl From<&str> for FileIdentity {
    fn from(raw: &str) -> Self {
        normalize_path(raw)
    }
}

impl From<FileIdentity> for String {
    fn from(id: FileIdentity) -> Self {
        id.0
    }
}

pub fn normalize_path(raw: &str) -> FileIdentity {
    let forward = raw.replace('\\', "/");
    FileIdentity(forward.trim_start_matches('/').to_string())
}

pub fn normalize_tag(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Segment-wise prefix test: `dir` equals `root` or lives below it.
///
/// An empty root is the whole project, so every directory is within it.
pub fn is_within(dir: &FileIdentity, root: &FileIdentity) -> bool {
    let mut dir_segments = dir.segments();
    for root_segment in root.segments() {
        if dir_segments.next() != Some(root_segment) {
            return false;
        }
    }
    true
}

/// One level up from `dir`, clamped to `root`.
pub fn parent_within(dir: &FileIdentity, root: &FileIdentity) -> FileIdentity {
    if !is_within(dir, root) {
        return root.clone();
    }
    let segments: Vec<&str> = dir.segments().collect();
    if segments.len() <= 1 || dir == root {
        return root.clone();
    }
    let parent = FileIdentity(segments[..segments.len() - 1].join("/"));
    if is_within(&parent, root) {
        parent
    } else {
        root.clone()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn normalize_path_rewrites_separators_and_strips_leading_slashes() {
        let cases = [
            ("parte1-api\\questao1.1\\tests\\1.1test.robot", "parte1-api/questao1.1/tests/1.1test.robot"),
            ("///parte2-e2e/questao2.1", "parte2-e2e/questao2.1"),
            ("\\\\server\\share", "server/share"),
            ("/\\/mixed", "mixed"),
            ("", ""),
            ("already/clean", "already/clean"),
        ];
        for (raw, expected) in cases {
            let id = normalize_path(raw);
            assert_eq!(id.as_str(), expected, "raw input {raw:?}");
            assert!(!id.as_str().contains('\\'));
            assert!(!id.as_str().starts_with('/'));
        }
    }

    #[test]
    fn normalize_path_is_idempotent() {
        for raw in ["\\a\\b", "//x//y", "/", "\\", "plain", "/a\\b/c\\"] {
            let once = normalize_path(raw);
            let twice = normalize_path(once.as_str());
            assert_eq!(once, twice, "raw input {raw:?}");
        }
    }

    #[test]
    fn deserialized_identity_is_normalized() {
        let id: FileIdentity = serde_json::from_str("\"\\\\parte7-mocks\\\\x.robot\"").expect("json");
        assert_eq!(id.as_str(), "parte7-mocks/x.robot");
    }

    #[test]
    fn normalize_tag_trims_and_lowercases() {
        assert_eq!(normalize_tag("  APIMAGAZORD \t"), "apimagazord");
        assert_eq!(normalize_tag(""), "");
        assert_eq!(normalize_tag("Regression"), "regression");
    }

    #[test]
    fn is_within_compares_whole_segments() {
        let root = FileIdentity::new("parte1-api");
        assert!(is_within(&FileIdentity::new("parte1-api"), &root));
        assert!(is_within(&FileIdentity::new("parte1-api/questao1.1"), &root));
        assert!(!is_within(&FileIdentity::new("parte1-api-old/questao1.1"), &root));
        assert!(!is_within(&FileIdentity::new("parte2-e2e"), &root));
        assert!(is_within(&FileIdentity::new("anything"), &FileIdentity::default()));
    }

    #[test]
    fn parent_within_never_climbs_above_root() {
        let root = FileIdentity::new("parte1-api");
        assert_eq!(
            parent_within(&FileIdentity::new("parte1-api/questao1.1/tests"), &root).as_str(),
            "parte1-api/questao1.1"
        );
        assert_eq!(
            parent_within(&FileIdentity::new("parte1-api/questao1.1"), &root).as_str(),
            "parte1-api"
        );
        assert_eq!(parent_within(&root, &root), root);
        assert_eq!(parent_within(&FileIdentity::new("elsewhere/deep"), &root), root);
    }
}
