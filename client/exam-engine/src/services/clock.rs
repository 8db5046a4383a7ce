use crate::remote::SessionStatusReport;

/// Exhaustion conditions surfaced to the session state machine. Each
/// signal fires once per exhaustion event; the engine consumes it by
/// advancing or finishing exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSignal {
    QuestionTimeExhausted,
    ExamExhausted,
}

/// Dual countdown state: a smoothly decrementing local view of the
/// exam-wide and per-question timers, periodically overwritten by the
/// authoritative clock.
#[derive(Debug, Clone)]
pub struct DualClock {
    exam_remaining: u32,
    question_remaining: u32,
    question_allowance: u32,
    exam_exhausted_signaled: bool,
}

impl DualClock {
    pub fn new(exam_seconds: u32, question_allowance: u32) -> Self {
        Self {
            exam_remaining: exam_seconds,
            question_remaining: question_allowance,
            question_allowance,
            exam_exhausted_signaled: false,
        }
    }

    pub fn exam_remaining(&self) -> u32 {
        self.exam_remaining
    }

    pub fn question_remaining(&self) -> u32 {
        self.question_remaining
    }

    /// Reset the per-question counter to the fixed allowance. Called
    /// on navigation; a placeholder until the next reconciliation.
    pub fn reset_question(&mut self) {
        self.question_remaining = self.question_allowance;
    }

    /// Local 1-second tick. Decrements both counters floored at zero.
    /// Exam exhaustion is never decided locally: a drifted local zero
    /// just displays 0:00 until the authoritative clock confirms it
    /// through `apply_status`.
    pub fn tick(&mut self) -> Vec<ClockSignal> {
        let mut signals = Vec::new();

        self.exam_remaining = self.exam_remaining.saturating_sub(1);

        if self.question_remaining <= 1 {
            // Time up for this question. Reset the visual immediately;
            // the next reconciliation delivers the exact value.
            self.question_remaining = self.question_allowance;
            signals.push(ClockSignal::QuestionTimeExhausted);
        } else {
            self.question_remaining -= 1;
        }

        signals
    }

    /// Drift correction: overwrite both counters with the
    /// authoritative whole-second values and report exhaustion the
    /// authority asserts.
    pub fn apply_status(&mut self, report: &SessionStatusReport) -> Vec<ClockSignal> {
        let mut signals = Vec::new();

        self.exam_remaining = report.remaining_exam_seconds.max(0.0).floor() as u32;
        self.question_remaining = report.remaining_question_seconds.max(0.0).floor() as u32;

        if !report.is_active || report.remaining_exam_seconds <= 0.0 {
            if !self.exam_exhausted_signaled {
                self.exam_exhausted_signaled = true;
                signals.push(ClockSignal::ExamExhausted);
            }
            return signals;
        }
        self.exam_exhausted_signaled = false;

        if report.remaining_question_seconds <= 0.0 {
            self.question_remaining = self.question_allowance;
            signals.push(ClockSignal::QuestionTimeExhausted);
        }

        signals
    }
}
