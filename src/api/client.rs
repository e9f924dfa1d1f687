//! Analysis backend client.
//!
//! [`AnalysisBackend`] is the seam between the editor and the network; the
//! production implementation is [`HttpBackend`] (blocking `reqwest`, always
//! called from a worker thread). Multipart endpoints take the JSON body in a
//! `json_data` text field.

use log::{debug, trace};
use reqwest::blocking::{Client, Response, multipart};
use serde_json::Value;
use std::time::Duration;

use super::error::ApiError;
use super::requests::{LandmarkUpdate, PlotUpdate, TaskAnalysis};
use crate::entities::AnalysisPayload;

pub trait AnalysisBackend: Send + Sync {
    /// Submit edited landmarks; the response replaces the task payload.
    fn update_landmarks(&self, request: &LandmarkUpdate) -> Result<AnalysisPayload, ApiError>;

    /// Run the analyzer registered for the task name.
    fn analyze_task(&self, request: &TaskAnalysis, video: Vec<u8>) -> Result<AnalysisPayload, ApiError>;

    /// Recompute cycle features; the response becomes `radarTable`.
    fn update_plot(&self, request: &PlotUpdate) -> Result<Value, ApiError>;

    /// Persist one store slice as `{file_name}` for the video.
    fn save_video_data(&self, video_id: &str, file_name: &str, body: String) -> Result<(), ApiError>;
}

/// HTTP client for the analysis service.
pub struct HttpBackend {
    client: Client,
    api_url: String,
}

impl HttpBackend {
    /// * `api_url` - Base URL, e.g. `http://localhost:8000/api`
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    pub fn with_client(client: Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    fn json_form(body: &Value) -> multipart::Form {
        multipart::Form::new().text("json_data", body.to_string())
    }

    fn check_status(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(ApiError::Status {
            code: status.as_u16(),
            body,
        })
    }

    fn parse_payload(response: Response) -> Result<AnalysisPayload, ApiError> {
        let value: Value = Self::check_status(response)?.json()?;
        AnalysisPayload::from_value(value).ok_or_else(|| ApiError::Decode("expected a JSON object".into()))
    }
}

impl AnalysisBackend for HttpBackend {
    fn update_landmarks(&self, request: &LandmarkUpdate) -> Result<AnalysisPayload, ApiError> {
        debug!("POST update_landmarks for task {} '{}'", request.task_id, request.task_name);
        let response = self
            .client
            .post(self.url("update_landmarks/"))
            .multipart(Self::json_form(&request.json_data()))
            .send()?;
        Self::parse_payload(response)
    }

    fn analyze_task(&self, request: &TaskAnalysis, video: Vec<u8>) -> Result<AnalysisPayload, ApiError> {
        if request.endpoint.is_empty() {
            return Err(ApiError::NoAnalyzer(request.task_name.clone()));
        }
        debug!(
            "POST {}/ for task {} ({} video bytes)",
            request.endpoint,
            request.task_id,
            video.len()
        );
        let video_part = multipart::Part::bytes(video)
            .file_name("video.mp4")
            .mime_str("video/mp4")?;
        let form = Self::json_form(&request.json_data()).part("video", video_part);
        let response = self
            .client
            .post(self.url(&format!("{}/", request.endpoint)))
            .query(&[("id", request.video_id.as_str())])
            .multipart(form)
            .send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NoAnalyzer(request.task_name.clone()));
        }
        Self::parse_payload(response)
    }

    fn update_plot(&self, request: &PlotUpdate) -> Result<Value, ApiError> {
        debug!("POST update_plot for task {}", request.task_id);
        let response = self
            .client
            .post(self.url("update_plot/"))
            .multipart(Self::json_form(&request.json_data()))
            .send()?;
        Ok(Self::check_status(response)?.json()?)
    }

    fn save_video_data(&self, video_id: &str, file_name: &str, body: String) -> Result<(), ApiError> {
        trace!("POST update_video_data {} ({} bytes)", file_name, body.len());
        let response = self
            .client
            .post(self.url("update_video_data/"))
            .query(&[("id", video_id), ("file_name", file_name)])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;
        Self::check_status(response).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let backend = HttpBackend::with_client(Client::new(), "http://localhost:8000/api/");
        assert_eq!(backend.api_url(), "http://localhost:8000/api");
        assert_eq!(backend.url("update_plot/"), "http://localhost:8000/api/update_plot/");
        assert_eq!(backend.url("/gait/"), "http://localhost:8000/api/gait/");
    }

    #[test]
    fn test_empty_endpoint_is_no_analyzer() {
        let backend = HttpBackend::with_client(Client::new(), "http://127.0.0.1:9");
        let task = crate::entities::Task::new(1, "??", 0.0, 1.0);
        let req = TaskAnalysis::new("v", &task, crate::entities::BoxRect::default(), 30.0);
        let err = backend.analyze_task(&req, Vec::new()).unwrap_err();
        assert!(err.is_no_analyzer());
    }
}
