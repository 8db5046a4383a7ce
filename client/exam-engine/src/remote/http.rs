use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::metrics::RANK_LOOKUPS_TOTAL;
use crate::models::results::RankEstimate;
use crate::models::Question;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

use super::{QuestionSource, RankEstimator, SessionAuthority, SessionStatusReport, SessionToken};

#[derive(Debug, Serialize)]
struct StartTestRequest<'a> {
    duration: u32,
    subject: &'a str,
}

#[derive(Debug, Deserialize)]
struct StartTestResponse {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct RankRequest {
    score: i32,
    total_marks: u32,
}

/// HTTP client for the exam backend. Implements all three collaborator
/// contracts against its request/response API.
pub struct HttpExamApi {
    http_client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpExamApi {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let response = self
            .http_client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("Failed to call {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("{} returned error {}: {}", url, status, error_text));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }
}

#[async_trait]
impl QuestionSource for HttpExamApi {
    async fn fetch(&self, subject: &str, duration_seconds: u32) -> Result<Vec<Question>> {
        let url = self.url("/api/questions");

        tracing::debug!(
            "Fetching question paper: {} subject={} duration={}",
            url,
            subject,
            duration_seconds
        );

        let duration = duration_seconds.to_string();
        let questions: Vec<Question> =
            retry_async_with_config(RetryConfig::default(), || async {
                let response = self
                    .http_client
                    .get(&url)
                    .query(&[("subject", subject), ("duration", duration.as_str())])
                    .timeout(self.timeout)
                    .send()
                    .await
                    .context("Failed to call question source")?;

                if !response.status().is_success() {
                    return Err(anyhow!(
                        "Question source returned error {}",
                        response.status()
                    ));
                }

                response
                    .json::<Vec<Question>>()
                    .await
                    .context("Failed to parse question paper")
            })
            .await?;

        if questions.is_empty() {
            return Err(anyhow!("Question source returned an empty paper"));
        }

        tracing::info!(
            "Fetched {} questions for subject {}",
            questions.len(),
            subject
        );
        Ok(questions)
    }

    async fn list_subjects(&self) -> Result<Vec<String>> {
        let url = self.url("/api/subjects");
        self.get_json(&url).await
    }
}

#[async_trait]
impl SessionAuthority for HttpExamApi {
    async fn open(&self, subject: &str, duration_seconds: u32) -> Result<SessionToken> {
        let url = self.url("/api/start-test");
        let payload = StartTestRequest {
            duration: duration_seconds,
            subject,
        };

        let response: StartTestResponse =
            retry_async_with_config(RetryConfig::default(), || async {
                let response = self
                    .http_client
                    .post(&url)
                    .json(&payload)
                    .timeout(self.timeout)
                    .send()
                    .await
                    .context("Failed to call session authority")?;

                if !response.status().is_success() {
                    return Err(anyhow!(
                        "Session authority returned error {}",
                        response.status()
                    ));
                }

                response
                    .json::<StartTestResponse>()
                    .await
                    .context("Failed to parse start-test response")
            })
            .await?;

        tracing::info!("Session opened: {}", response.session_id);
        Ok(SessionToken(response.session_id))
    }

    async fn status(&self, token: &SessionToken) -> Result<SessionStatusReport> {
        // Single-shot: the next periodic reconciliation is the retry.
        let url = self.url(&format!("/api/test-status/{}", token.as_str()));
        self.get_json(&url).await
    }

    async fn advance_index(&self, token: &SessionToken, new_index: usize) -> Result<()> {
        let url = self.url("/api/update-question-index");
        let index = new_index.to_string();

        let response = self
            .http_client
            .post(&url)
            .query(&[
                ("session_id", token.as_str()),
                ("new_index", index.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to persist question index")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Index persistence returned error {}",
                response.status()
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl RankEstimator for HttpExamApi {
    async fn estimate(&self, score: i32, total_marks: u32) -> Result<RankEstimate> {
        let url = self.url("/api/rank-estimate");
        let payload = RankRequest { score, total_marks };

        let result = retry_async_with_config(RetryConfig::default(), || async {
            let response = self
                .http_client
                .post(&url)
                .json(&payload)
                .timeout(self.timeout)
                .send()
                .await
                .context("Failed to call rank estimator")?;

            if !response.status().is_success() {
                return Err(anyhow!("Rank estimator returned error {}", response.status()));
            }

            response
                .json::<RankEstimate>()
                .await
                .context("Failed to parse rank estimate")
        })
        .await;

        match &result {
            Ok(estimate) => {
                RANK_LOOKUPS_TOTAL.with_label_values(&["success"]).inc();
                tracing::info!(
                    "Rank estimate: {} ({})",
                    estimate.rank_range,
                    estimate.performance_band
                );
            }
            Err(e) => {
                RANK_LOOKUPS_TOTAL.with_label_values(&["error"]).inc();
                tracing::warn!("Rank estimation failed: {:#}", e);
            }
        }

        result
    }
}
