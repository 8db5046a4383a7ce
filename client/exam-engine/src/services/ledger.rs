use std::collections::HashMap;

use crate::models::{AnswerValue, Question, Section};

/// Fixed cap on counted section-B answers per subsection per session.
pub const SECTION_B_ATTEMPT_CAP: usize = 10;

/// Result of a record attempt. Rejection is not an error: the ledger
/// is unchanged and the caller shows the message to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    Rejected { subsection: String, cap: usize },
}

impl RecordOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, RecordOutcome::Recorded)
    }

    pub fn rejection_message(&self) -> Option<String> {
        match self {
            RecordOutcome::Recorded => None,
            RecordOutcome::Rejected { subsection, cap } => Some(format!(
                "You can only attempt {} questions in {} Section B. \
                 Clear an existing answer to attempt this one.",
                cap, subsection
            )),
        }
    }
}

/// Per-session answer store: question id -> recorded response.
/// Insert/overwrite only, plus explicit clear to free a cap slot.
#[derive(Debug, Default, Clone)]
pub struct AnswerLedger {
    entries: HashMap<u32, AnswerValue>,
}

impl AnswerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or overwrite an answer. For section-B questions the
    /// write is rejected when the target is currently unanswered and
    /// its subsection already holds the cap of answered entries.
    /// Overwriting an answered question never counts as a new attempt.
    pub fn record(
        &mut self,
        questions: &[Question],
        question: &Question,
        value: AnswerValue,
    ) -> RecordOutcome {
        if question.section == Section::B && !self.entries.contains_key(&question.id) {
            let key = question.subsection_key();
            let answered = questions
                .iter()
                .filter(|q| {
                    q.section == Section::B
                        && q.subsection_key() == key
                        && self.entries.contains_key(&q.id)
                })
                .count();

            if answered >= SECTION_B_ATTEMPT_CAP {
                return RecordOutcome::Rejected {
                    subsection: key.to_string(),
                    cap: SECTION_B_ATTEMPT_CAP,
                };
            }
        }

        self.entries.insert(question.id, value);
        RecordOutcome::Recorded
    }

    /// Remove an entry, freeing one slot under the cap for its
    /// subsection.
    pub fn clear(&mut self, question_id: u32) -> Option<AnswerValue> {
        self.entries.remove(&question_id)
    }

    pub fn answer(&self, question_id: u32) -> Option<&AnswerValue> {
        self.entries.get(&question_id)
    }

    pub fn is_answered(&self, question_id: u32) -> bool {
        self.entries.contains_key(&question_id)
    }

    pub fn answered_count(&self) -> usize {
        self.entries.len()
    }
}
