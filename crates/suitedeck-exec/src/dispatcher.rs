use suitedeck_core::normalize_tag;
use suitedeck_core::ConsoleError;
use suitedeck_core::FileIdentity;
use suitedeck_core::FileTagSet;
use suitedeck_core::Gate;
use suitedeck_core::RunRecord;
use suitedeck_core::ValidationError;

use crate::backend::BackendError;
use crate::backend::ConsoleBackend;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Caught locally; nothing was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error("invalid tag (not present in the suite): {message}")]
    InvalidTag {
        message: String,
        available_tags: Vec<String>,
    },

    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<DispatchError> for ConsoleError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidRequest(err) => Self::Validation(err),
            DispatchError::InvalidTag { message, .. } => Self::InvalidTag { message },
            DispatchError::ExecutionFailed(message) => Self::ExecutionFailed(message),
        }
    }
}

/// Issues single suite runs. One request per call; a failed run is never retried.
pub struct Dispatcher<'a, B: ?Sized> {
    backend: &'a B,
    gate: &'a Gate,
}

impl<'a, B: ConsoleBackend + ?Sized> Dispatcher<'a, B> {
    pub fn new(backend: &'a B, gate: &'a Gate) -> Self {
        Self { backend, gate }
    }

    pub fn run_one(
        &self,
        file: &FileIdentity,
        tag: &str,
        available_tags: &FileTagSet,
    ) -> Result<RunRecord, DispatchError> {
        let tag = normalize_tag(tag);
        if !self.gate.is_runnable(file) {
            return Err(ValidationError::NotRunnable(file.clone()).into());
        }
        if tag.is_empty() {
            return Err(ValidationError::NoTagSelected.into());
        }
        if !available_tags.contains(&tag) {
            return Err(ValidationError::TagNotAvailable {
                file: file.clone(),
                tag,
            }
            .into());
        }

        match self.backend.run_suite(file, &tag) {
            Ok(record) => {
                tracing::info!(
                    %file,
                    %tag,
                    returncode = ?record.returncode,
                    "suite run finished"
                );
                Ok(record)
            }
            Err(err) => Err(classify_failure(err)),
        }
    }
}

fn classify_failure(err: BackendError) -> DispatchError {
    if let Some(body) = err.error_body().filter(|body| body.is_tag_not_found()) {
        tracing::warn!(message = %body.describe(), "backend rejected tag");
        return DispatchError::InvalidTag {
            message: body.describe(),
            available_tags: body.available_tags,
        };
    }
    tracing::warn!(%err, "suite run failed");
    DispatchError::ExecutionFailed(err.operator_message())
}
