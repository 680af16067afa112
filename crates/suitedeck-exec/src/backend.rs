use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::blocking::Response;
use reqwest::Url;
use serde::de::DeserializeOwned;
use suitedeck_core::BackendConfig;
use suitedeck_core::DirectoryListing;
use suitedeck_core::EnvironmentReport;
use suitedeck_core::FileIdentity;
use suitedeck_core::RootEntry;
use suitedeck_core::RunRecord;
use suitedeck_core::StreamKind;

use crate::contracts::CheckResponse;
use crate::contracts::ClearRunsResponse;
use crate::contracts::ErrorBody;
use crate::contracts::FileContentResponse;
use crate::contracts::RegressionCountResponse;
use crate::contracts::RobotTagsResponse;
use crate::contracts::RootsResponse;
use crate::contracts::RunRequest;
use crate::contracts::RunResponse;
use crate::contracts::RunsResponse;
use crate::contracts::TagsResponse;
use crate::contracts::TreeResponse;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx reply. `body` keeps the raw text for structured error parsing.
    #[error("HTTP {status}: {}", summarize(.body))]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn error_body(&self) -> Option<ErrorBody> {
        match self {
            Self::Status { body, .. } => ErrorBody::parse(body),
            _ => None,
        }
    }

    /// Structured backend message when one exists, the display text otherwise.
    pub fn operator_message(&self) -> String {
        self.error_body()
            .map(|body| body.describe())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| self.to_string())
    }
}

fn summarize(body: &str) -> String {
    match ErrorBody::parse(body) {
        Some(parsed) => parsed.describe(),
        None => body.trim().chars().take(200).collect(),
    }
}

/// Live response body of a streamed action.
pub type ByteStream = Box<dyn Read + Send>;

/// Collaborators the console consumes. Blocking; callers pick the thread.
pub trait ConsoleBackend {
    fn vocabulary(&self) -> Result<Vec<String>, BackendError>;
    fn roots(&self) -> Result<Vec<RootEntry>, BackendError>;
    fn list_directory(&self, dir: &FileIdentity) -> Result<DirectoryListing, BackendError>;
    fn declared_tags(&self, file: &FileIdentity) -> Result<Vec<String>, BackendError>;
    fn file_content(&self, file: &FileIdentity) -> Result<String, BackendError>;
    fn check_environment(&self) -> Result<EnvironmentReport, BackendError>;
    fn run_suite(&self, file: &FileIdentity, tag: &str) -> Result<RunRecord, BackendError>;
    fn run_history(&self) -> Result<Vec<RunRecord>, BackendError>;
    fn regression_count(&self) -> Result<Option<u64>, BackendError>;
    fn open_stream(&self, kind: StreamKind) -> Result<ByteStream, BackendError>;
    fn clear_runs(&self) -> Result<u64, BackendError>;
    fn resolve_locator(&self, locator: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpBackend {
    /// No client-wide timeout: runs and streams last as long as the backend
    /// process does. Short calls get `request_timeout_ms` each.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| BackendError::Transport(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn endpoint_with_path(&self, path: &str, target: &FileIdentity) -> Result<Url, BackendError> {
        Url::parse_with_params(&self.endpoint(path), &[("path", target.as_str())])
            .map_err(|err| BackendError::Transport(format!("invalid backend url: {err}")))
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request
            .send()
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        tracing::debug!(status = status.as_u16(), %body, "backend returned an error");
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }

    fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        self.send(request)?
            .json::<T>()
            .map_err(|err| BackendError::Decode(err.to_string()))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        self.json(
            self.client
                .get(self.endpoint(path))
                .timeout(self.request_timeout),
        )
    }
}

impl ConsoleBackend for HttpBackend {
    fn vocabulary(&self) -> Result<Vec<String>, BackendError> {
        let body: TagsResponse = self.get_json("/api/tags")?;
        tracing::debug!(count = body.tags.len(), "tag vocabulary loaded");
        Ok(body.tags)
    }

    fn roots(&self) -> Result<Vec<RootEntry>, BackendError> {
        let body: RootsResponse = self.get_json("/api/roots")?;
        Ok(body.into_entries())
    }

    fn list_directory(&self, dir: &FileIdentity) -> Result<DirectoryListing, BackendError> {
        let url = self.endpoint_with_path("/api/tree", dir)?;
        let body: TreeResponse = self.json(self.client.get(url).timeout(self.request_timeout))?;
        Ok(body.into_listing(dir))
    }

    fn declared_tags(&self, file: &FileIdentity) -> Result<Vec<String>, BackendError> {
        let url = self.endpoint_with_path("/api/robot_tags", file)?;
        let body: RobotTagsResponse = self.json(self.client.get(url).timeout(self.request_timeout))?;
        Ok(body.tags)
    }

    fn file_content(&self, file: &FileIdentity) -> Result<String, BackendError> {
        let url = self.endpoint_with_path("/api/md", file)?;
        let body: FileContentResponse =
            self.json(self.client.get(url).timeout(self.request_timeout))?;
        body.content
            .ok_or_else(|| BackendError::Decode(format!("no content returned for {file}")))
    }

    /// Imports every listed requirement on the backend, so it gets no short timeout.
    fn check_environment(&self) -> Result<EnvironmentReport, BackendError> {
        let body: CheckResponse = self.json(self.client.get(self.endpoint("/api/check")))?;
        let report = body.into_report();
        tracing::info!(
            ok = report.ok,
            missing = report.packages_missing.len(),
            "environment checked"
        );
        Ok(report)
    }

    fn run_suite(&self, file: &FileIdentity, tag: &str) -> Result<RunRecord, BackendError> {
        let request = RunRequest {
            path: file.as_str(),
            tag,
        };
        tracing::info!(%file, tag, "dispatching suite run");
        let body: RunResponse = self.json(self.client.post(self.endpoint("/api/run")).json(&request))?;
        Ok(body.into_record(file, tag))
    }

    fn run_history(&self) -> Result<Vec<RunRecord>, BackendError> {
        let body: RunsResponse = self.get_json("/api/runs")?;
        Ok(body.into_records())
    }

    fn regression_count(&self) -> Result<Option<u64>, BackendError> {
        let body: RegressionCountResponse = self.get_json("/api/regression_count")?;
        if let Some(error) = body.error.as_deref() {
            tracing::debug!(error, "regression count unavailable");
        }
        Ok(body.count)
    }

    fn open_stream(&self, kind: StreamKind) -> Result<ByteStream, BackendError> {
        let path = match kind {
            StreamKind::Regression => "/api/run_regression_all_stream",
            StreamKind::InstallRequirements => "/api/install_requirements_stream",
        };
        tracing::info!(kind = kind.label(), "opening console stream");
        let response = self.send(self.client.post(self.endpoint(path)))?;
        Ok(Box::new(response))
    }

    fn clear_runs(&self) -> Result<u64, BackendError> {
        let body: ClearRunsResponse = self.json(
            self.client
                .post(self.endpoint("/api/clear_runs"))
                .timeout(self.request_timeout),
        )?;
        Ok(body.removed)
    }

    /// Locators are site-relative (`/static/runs/...`); absolute ones pass through.
    fn resolve_locator(&self, locator: &str) -> String {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return locator.to_string();
        }
        format!("{}/{}", self.base_url, locator.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn backend() -> HttpBackend {
        HttpBackend::new(&BackendConfig {
            base_url: "http://127.0.0.1:5000/".to_string(),
            ..BackendConfig::default()
        })
        .expect("client")
    }

    #[test]
    fn locators_resolve_against_base_url() {
        let backend = backend();
        assert_eq!(backend.base_url(), "http://127.0.0.1:5000");
        assert_eq!(
            backend.resolve_locator("/static/runs/r1/log.html"),
            "http://127.0.0.1:5000/static/runs/r1/log.html"
        );
        assert_eq!(
            backend.resolve_locator("https://ci.example/log.html"),
            "https://ci.example/log.html"
        );
    }

    #[test]
    fn path_query_is_percent_encoded() {
        let url = backend()
            .endpoint_with_path("/api/tree", &FileIdentity::new("parte 1/questao1.1"))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:5000/api/tree?path=parte+1%2Fquestao1.1"
        );
    }

    #[test]
    fn status_error_prefers_structured_message() {
        let err = BackendError::Status {
            status: 400,
            body: r#"{"error":"Path not allowed"}"#.to_string(),
        };
        assert_eq!(err.operator_message(), "Path not allowed");
        assert_eq!(err.to_string(), "HTTP 400: Path not allowed");

        let err = BackendError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.operator_message(), "HTTP 502: bad gateway");
    }
}
