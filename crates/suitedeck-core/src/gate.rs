use std::collections::BTreeSet;
use std::collections::HashSet;

use super::normalize::normalize_tag;
use super::normalize::FileIdentity;

/// Reserved tag that only the bulk regression action may run.
pub const REGRESSION_TAG: &str = "regression";

pub const DEFAULT_SUITE_EXTENSION: &str = ".robot";

pub const DEFAULT_ALLOWED_RUN_FILES: &[&str] = &[
    "parte1-api/questao1.1/tests/1.1test.robot",
    "parte1-api/questao1.1/tests/1.2test.robot",
    "parte2-e2e/questao2.1/2.1test.robot",
    "parte2-e2e/questao2.2/2.2test.robot",
    "parte3-frontend/questao3.1/tests/3.1test.robot",
    "parte4-arquivos/questao4.1/tests/4.1test.robot",
    "parte5-mobile/questao5.1/testes/5.1test.robot.robot",
    "parte6-piramide/questao6.1/tests/6.1test.robot",
    "parte6-piramide/questao6.1/tests/6.2test.robot",
    "parte7-mocks/questao7.1/tests/7.1test.robot",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    files: BTreeSet<FileIdentity>,
}

impl AllowList {
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            files: files.into_iter().map(FileIdentity::new).collect(),
        }
    }

    pub fn contains(&self, id: &FileIdentity) -> bool {
        self.files.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileIdentity> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_RUN_FILES.iter().copied())
    }
}

/// Global recognized tags, lower-cased and deduplicated in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagVocabulary {
    tags: Vec<String>,
}

impl TagVocabulary {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let tags = tags
            .into_iter()
            .map(|tag| normalize_tag(tag.as_ref()))
            .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
            .collect();
        Self { tags }
    }

    pub fn contains(&self, tag: &str) -> bool {
        let tag = normalize_tag(tag);
        self.tags.iter().any(|known| *known == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Tags a selected suite may be run with, in first-seen declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTagSet {
    tags: Vec<String>,
}

impl FileTagSet {
    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|known| known == tag)
    }

    pub fn first(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tag after `current`, wrapping; the first tag when `current` is absent.
    pub fn next_after(&self, current: Option<&str>) -> Option<&str> {
        let idx = current
            .and_then(|tag| self.tags.iter().position(|known| known == tag))
            .map(|pos| (pos + 1) % self.tags.len())
            .unwrap_or(0);
        self.tags.get(idx).map(String::as_str)
    }
}

pub fn compute_available_tags<I, S>(declared: I, vocabulary: &TagVocabulary) -> FileTagSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: Vec<String> = Vec::new();
    for raw in declared {
        let tag = normalize_tag(raw.as_ref());
        if tag.is_empty() || tag == REGRESSION_TAG || !vocabulary.contains(&tag) || tags.contains(&tag) {
            continue;
        }
        tags.push(tag);
    }
    FileTagSet { tags }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
    pub allow_list: AllowList,
    pub vocabulary: TagVocabulary,
    pub suite_extension: String,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            allow_list: AllowList::default(),
            vocabulary: TagVocabulary::default(),
            suite_extension: DEFAULT_SUITE_EXTENSION.to_string(),
        }
    }
}

impl Gate {
    pub fn new(allow_list: AllowList, suite_extension: impl Into<String>) -> Self {
        Self {
            allow_list,
            vocabulary: TagVocabulary::default(),
            suite_extension: suite_extension.into(),
        }
    }

    pub fn is_runnable(&self, id: &FileIdentity) -> bool {
        self.allow_list.contains(id)
    }

    pub fn is_suite_format(&self, id: &FileIdentity) -> bool {
        id.as_str()
            .to_lowercase()
            .ends_with(&self.suite_extension.to_lowercase())
    }

    pub fn available_tags<I, S>(&self, declared: I) -> FileTagSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        compute_available_tags(declared, &self.vocabulary)
    }
}
