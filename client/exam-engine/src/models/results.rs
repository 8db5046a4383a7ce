use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived, immutable snapshot computed once from the final question
/// list and answer ledger when the session finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResults {
    pub correct: u32,
    pub wrong: u32,
    pub unattempted: u32,
    pub total_score: i32,
    pub possible_marks: u32,
    pub total_valid_questions: u32,
    pub subjective_count: u32,
    pub completed_at: DateTime<Utc>,
}

impl TestResults {
    pub fn percentage(&self) -> f64 {
        if self.possible_marks == 0 {
            return 0.0;
        }
        (self.total_score as f64 / self.possible_marks as f64) * 100.0
    }
}

/// Rank band returned by the external rank estimator for a
/// score/total pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEstimate {
    pub rank_range: String,
    pub performance_band: String,
    pub normalized_score: f64,
}
