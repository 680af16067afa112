use super::normalize::FileIdentity;

/// Client-side precondition failures. None of these ever reach the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no file selected")]
    NoFileSelected,

    #[error("no tag selected")]
    NoTagSelected,

    #[error("{0} is view-only (not in the execution allow-list)")]
    NotRunnable(FileIdentity),

    #[error("tag '{tag}' is not declared in {file}")]
    TagNotAvailable { file: FileIdentity, tag: String },

    #[error("a run is already in progress")]
    RunInFlight,

    #[error("the console is busy with another stream")]
    ConsoleBusy,

    #[error("{dir} is outside the selected root {root}")]
    OutsideRoot { dir: FileIdentity, root: FileIdentity },
}

/// Operator-facing failure taxonomy of the console.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    #[error("could not list directory: {0}")]
    Navigation(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid tag (not present in the suite): {message}")]
    InvalidTag { message: String },

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("malformed stream frame: {0}")]
    StreamMalformedFrame(String),

    #[error("stream interrupted: {0}")]
    StreamTransport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
