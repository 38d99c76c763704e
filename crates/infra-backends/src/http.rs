// HTTP backend adapter: submit + poll against a generation service

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use vidra_core::domain::{BackendDescriptor, JobConfig};
use vidra_core::port::backend_adapter::{
    BackendAdapter, BackendError, BackendJob, BackendJobStatus,
};

use crate::config::BackendEndpointConfig;

#[derive(Serialize)]
struct SubmitRequest<'a> {
    prompt: &'a str,
    aspect_ratio: String,
    quality: String,
    duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    camera_movement: Option<&'a str>,
    motion_strength: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct JobResponse {
    id: String,
    state: String,
    #[serde(default)]
    progress: Option<f32>,
    #[serde(default)]
    result_url: Option<String>,
}

fn convert_state(state: &str) -> BackendJobStatus {
    match state.to_ascii_lowercase().as_str() {
        "pending" => BackendJobStatus::Pending,
        "queued" => BackendJobStatus::Queued,
        "processing" | "running" | "dreaming" => BackendJobStatus::Processing,
        "completed" | "succeeded" => BackendJobStatus::Completed,
        "failed" | "error" => BackendJobStatus::Failed,
        "cancelled" | "canceled" => BackendJobStatus::Cancelled,
        _ => BackendJobStatus::Pending,
    }
}

impl JobResponse {
    fn into_job(self) -> BackendJob {
        let status = convert_state(&self.state);
        let progress = self.progress.unwrap_or(match status {
            BackendJobStatus::Queued => 0.1,
            BackendJobStatus::Processing => 0.5,
            BackendJobStatus::Completed => 1.0,
            _ => 0.0,
        });
        BackendJob {
            job_id: self.id,
            status,
            result_ref: self.result_url,
            progress,
        }
    }
}

/// Backend adapter speaking a plain submit/poll JSON protocol
/// (`POST {base}/generations`, `GET {base}/generations/{id}`).
pub struct HttpBackend {
    config: BackendEndpointConfig,
    client: Client,
}

impl HttpBackend {
    pub fn new(config: BackendEndpointConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    async fn handle_response(
        &self,
        response: reqwest::Response,
    ) -> Result<JobResponse, BackendError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return Err(BackendError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Auth(message));
        }

        if status == reqwest::StatusCode::BAD_REQUEST {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::InvalidRequest(message));
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<JobResponse>()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))
    }

    async fn submit(&self, config: &JobConfig) -> Result<JobResponse, BackendError> {
        let body = SubmitRequest {
            prompt: &config.prompt,
            aspect_ratio: config.aspect_ratio.to_string(),
            quality: config.quality.to_string(),
            duration_secs: config.duration_secs,
            reference_image: config.reference_image.as_deref(),
            style: config.style.as_deref(),
            camera_movement: config.camera_movement.as_deref(),
            motion_strength: config.motion_strength,
            seed: config.seed,
            extra: config.extra_params.clone(),
        };

        let response = self
            .client
            .post(self.url("/generations"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        self.handle_response(response).await
    }

    async fn poll(&self, job_id: &str) -> Result<JobResponse, BackendError> {
        let response = self
            .client
            .get(self.url(&format!("/generations/{}", job_id)))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        self.handle_response(response).await
    }
}

#[async_trait]
impl BackendAdapter for HttpBackend {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            id: self.config.name.clone(),
            capabilities: self.config.capabilities.clone(),
            qualities: self.config.qualities.clone(),
            aspect_ratios: self.config.aspect_ratios.clone(),
            max_duration_secs: self.config.max_duration_secs,
            priority_weight: self.config.priority_weight,
            enabled: self.config.enabled,
        }
    }

    async fn generate(&self, config: &JobConfig) -> Result<BackendJob, BackendError> {
        let submitted = self.submit(config).await?;
        let job_id = submitted.id.clone();
        debug!(backend = %self.config.name, job_id = %job_id, state = %submitted.state, "Generation submitted");

        let mut job = submitted.into_job();
        let poll_interval = Duration::from_secs(self.config.poll_interval_secs);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(self.config.max_wait_secs);

        while !job.status.is_terminal() {
            if tokio::time::Instant::now() >= deadline {
                warn!(backend = %self.config.name, job_id = %job_id, "Generation exceeded max wait");
                return Err(BackendError::Timeout(
                    (self.config.max_wait_secs * 1000) as i64,
                ));
            }
            tokio::time::sleep(poll_interval).await;
            job = self.poll(&job_id).await?.into_job();
            debug!(backend = %self.config.name, job_id = %job_id, status = ?job.status, progress = job.progress, "Polled job");
        }

        Ok(job)
    }

    async fn get_status(&self, job_id: &str) -> Result<BackendJob, BackendError> {
        Ok(self.poll(job_id).await?.into_job())
    }
}
