use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::core::config::Settings;
use crate::schemas::exam::{ExamContent, SubmitAck, SubmitRequest};

#[derive(Debug, Error)]
pub(crate) enum FetchError {
    /// Business rejection: the exam was already taken, is not yet open, or is
    /// otherwise closed to this student.
    #[error("exam cannot be started: {0}")]
    NotStartable(String),
    #[error("exam service request failed: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub(crate) enum SubmitError {
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error("exam service request failed: {0}")]
    Transport(String),
}

/// The upstream exam service as seen by the session controller. Starting an
/// exam returns its content exactly once; submitting closes the attempt.
#[async_trait]
pub(crate) trait ExamService: Send + Sync + 'static {
    async fn fetch_exam(&self, exam_id: i64) -> Result<ExamContent, FetchError>;
    async fn submit_exam(&self, request: &SubmitRequest) -> Result<SubmitAck, SubmitError>;
}

#[derive(Debug, Clone)]
pub(crate) struct HttpExamService {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpExamService {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.api().connect_timeout_seconds))
            .timeout(Duration::from_secs(settings.api().timeout_seconds))
            .build()
            .context("Failed to build exam service HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.api().base_url.trim_end_matches('/').to_string(),
            bearer_token: settings.api().bearer_token.clone(),
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }
}

#[async_trait]
impl ExamService for HttpExamService {
    async fn fetch_exam(&self, exam_id: i64) -> Result<ExamContent, FetchError> {
        let response = self
            .post(&format!("/exams/{exam_id}/start"))
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let status = response.status();
        let raw_body =
            response.text().await.map_err(|err| FetchError::Transport(err.to_string()))?;

        if status.is_client_error() {
            return Err(FetchError::NotStartable(error_detail(&raw_body, status)));
        }
        if !status.is_success() {
            return Err(FetchError::Transport(error_detail(&raw_body, status)));
        }

        serde_json::from_str(&raw_body)
            .map_err(|err| FetchError::Transport(format!("invalid exam payload: {err}")))
    }

    async fn submit_exam(&self, request: &SubmitRequest) -> Result<SubmitAck, SubmitError> {
        let response = self
            .post(&format!("/exams/{}/submit", request.exam_id))
            .json(request)
            .send()
            .await
            .map_err(|err| SubmitError::Transport(err.to_string()))?;

        let status = response.status();
        let raw_body =
            response.text().await.map_err(|err| SubmitError::Transport(err.to_string()))?;

        if status.is_client_error() {
            return Err(SubmitError::Rejected(error_detail(&raw_body, status)));
        }
        if !status.is_success() {
            return Err(SubmitError::Transport(error_detail(&raw_body, status)));
        }

        // The acknowledgment body is advisory; an empty or unexpected body is
        // still a successful submission.
        Ok(serde_json::from_str(&raw_body).unwrap_or_default())
    }
}

/// Pull a human-readable message out of an error body. The upstream API uses
/// `detail`; older endpoints use `message` or `error`.
fn error_detail(raw_body: &str, status: StatusCode) -> String {
    serde_json::from_str::<Value>(raw_body)
        .ok()
        .as_ref()
        .and_then(|value| {
            value
                .get("detail")
                .and_then(Value::as_str)
                .or_else(|| value.get("message").and_then(Value::as_str))
                .or_else(|| value.get("error").and_then(Value::as_str))
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| format!("status {status}"))
}
