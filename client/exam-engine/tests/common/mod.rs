#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use exam_engine::models::results::RankEstimate;
use exam_engine::models::{OptionLabel, Question, Section};
use exam_engine::remote::{
    QuestionSource, RankEstimator, SessionAuthority, SessionStatusReport, SessionToken,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn objective(id: u32, subject: &str, section: Section, subsection: Option<&str>) -> Question {
    Question {
        id,
        subject: subject.to_string(),
        subsection: subsection.map(str::to_string),
        section,
        question_text: format!("Question {}", id),
        option_a: Some("first".to_string()),
        option_b: Some("second".to_string()),
        option_c: Some("third".to_string()),
        option_d: Some("fourth".to_string()),
        correct_option: Some(OptionLabel::A),
        image_path: None,
    }
}

pub fn subjective(id: u32, subject: &str) -> Question {
    Question {
        id,
        subject: subject.to_string(),
        subsection: None,
        section: Section::A,
        question_text: format!("Explain concept {}", id),
        option_a: None,
        option_b: None,
        option_c: None,
        option_d: None,
        correct_option: None,
        image_path: None,
    }
}

/// Simple section-A paper with ids 1..=count.
pub fn section_a_paper(count: u32, subject: &str) -> Vec<Question> {
    (1..=count)
        .map(|id| objective(id, subject, Section::A, None))
        .collect()
}

/// Question source backed by a fixed in-memory paper.
pub struct StaticQuestionSource {
    paper: Vec<Question>,
    fail: bool,
}

impl StaticQuestionSource {
    pub fn new(paper: Vec<Question>) -> Self {
        Self { paper, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            paper: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl QuestionSource for StaticQuestionSource {
    async fn fetch(&self, _subject: &str, _duration_seconds: u32) -> Result<Vec<Question>> {
        if self.fail {
            return Err(anyhow!("question source unavailable"));
        }
        Ok(self.paper.clone())
    }

    async fn list_subjects(&self) -> Result<Vec<String>> {
        let mut subjects: Vec<String> = self.paper.iter().map(|q| q.subject.clone()).collect();
        subjects.dedup();
        Ok(subjects)
    }
}

/// Session authority with a scriptable queue of status reports. When
/// the queue is empty it keeps answering with the default report.
pub struct ScriptedAuthority {
    default_report: SessionStatusReport,
    reports: Mutex<VecDeque<SessionStatusReport>>,
    advanced: Mutex<Vec<usize>>,
    status_calls: AtomicUsize,
    fail_open: bool,
    fail_status: bool,
    fail_advance: bool,
}

impl ScriptedAuthority {
    pub fn new(exam_seconds: f64, question_seconds: f64) -> Self {
        Self {
            default_report: SessionStatusReport {
                remaining_exam_seconds: exam_seconds,
                remaining_question_seconds: question_seconds,
                current_question_index: 0,
                is_active: true,
            },
            reports: Mutex::new(VecDeque::new()),
            advanced: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
            fail_open: false,
            fail_status: false,
            fail_advance: false,
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_status(mut self) -> Self {
        self.fail_status = true;
        self
    }

    pub fn failing_advance(mut self) -> Self {
        self.fail_advance = true;
        self
    }

    pub fn push_report(&self, report: SessionStatusReport) {
        self.reports.lock().unwrap().push_back(report);
    }

    pub fn push_inactive(&self) {
        self.push_report(SessionStatusReport {
            remaining_exam_seconds: 0.0,
            remaining_question_seconds: 0.0,
            current_question_index: 0,
            is_active: false,
        });
    }

    pub fn persisted_indexes(&self) -> Vec<usize> {
        self.advanced.lock().unwrap().clone()
    }

    pub fn status_call_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionAuthority for ScriptedAuthority {
    async fn open(&self, _subject: &str, _duration_seconds: u32) -> Result<SessionToken> {
        if self.fail_open {
            return Err(anyhow!("session authority unavailable"));
        }
        Ok(SessionToken("test-session".to_string()))
    }

    async fn status(&self, _token: &SessionToken) -> Result<SessionStatusReport> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_status {
            return Err(anyhow!("status endpoint unreachable"));
        }
        let queued = self.reports.lock().unwrap().pop_front();
        Ok(queued.unwrap_or_else(|| self.default_report.clone()))
    }

    async fn advance_index(&self, _token: &SessionToken, new_index: usize) -> Result<()> {
        if self.fail_advance {
            return Err(anyhow!("index endpoint unreachable"));
        }
        self.advanced.lock().unwrap().push(new_index);
        Ok(())
    }
}

/// Rank estimator mirroring the backend's banded mapping on the
/// 720-mark scale.
pub struct BandedRankEstimator {
    fail: bool,
}

impl BandedRankEstimator {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl RankEstimator for BandedRankEstimator {
    async fn estimate(&self, score: i32, total_marks: u32) -> Result<RankEstimate> {
        if self.fail {
            return Err(anyhow!("rank service unavailable"));
        }
        let normalized = if total_marks == 0 {
            0.0
        } else {
            (score as f64 / total_marks as f64) * 720.0
        };
        let (rank_range, performance_band) = if normalized >= 700.0 {
            ("1 - 50", "Top 0.01%")
        } else if normalized >= 650.0 {
            ("50 - 1,000", "Top 1%")
        } else if normalized >= 600.0 {
            ("1,000 - 10,000", "Top 5%")
        } else if normalized >= 500.0 {
            ("10,000 - 50,000", "Top 10%")
        } else if normalized >= 400.0 {
            ("50,000 - 1,50,000", "Average")
        } else if normalized >= 300.0 {
            ("1,50,000 - 3,00,000", "Below Average")
        } else {
            ("> 3,00,000", "Needs Hard Work")
        };
        Ok(RankEstimate {
            rank_range: rank_range.to_string(),
            performance_band: performance_band.to_string(),
            normalized_score: (normalized * 100.0).round() / 100.0,
        })
    }
}
