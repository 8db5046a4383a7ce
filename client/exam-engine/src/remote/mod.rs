use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::results::RankEstimate;
use crate::models::Question;

pub mod http;

/// Opaque handle issued by the session authority when a test is
/// opened. Dropped (and never used again) once the session finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Authoritative clock reading for a running session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatusReport {
    pub remaining_exam_seconds: f64,
    pub remaining_question_seconds: f64,
    pub current_question_index: usize,
    pub is_active: bool,
}

/// Serves the ordered question paper for a subject/duration choice.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn fetch(&self, subject: &str, duration_seconds: u32) -> Result<Vec<Question>>;

    /// Subjects available for the setup screen picker.
    async fn list_subjects(&self) -> Result<Vec<String>>;
}

/// Owns the authoritative exam clock and the advisory question index.
#[async_trait]
pub trait SessionAuthority: Send + Sync {
    async fn open(&self, subject: &str, duration_seconds: u32) -> Result<SessionToken>;

    async fn status(&self, token: &SessionToken) -> Result<SessionStatusReport>;

    /// Best-effort persistence of the current question index. Failure
    /// is non-fatal; the authoritative index is only advisory.
    async fn advance_index(&self, token: &SessionToken, new_index: usize) -> Result<()>;
}

/// Turns a final score/total pair into a rank band.
#[async_trait]
pub trait RankEstimator: Send + Sync {
    async fn estimate(&self, score: i32, total_marks: u32) -> Result<RankEstimate>;
}
