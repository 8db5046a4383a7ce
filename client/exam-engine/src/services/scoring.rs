use std::collections::HashMap;

use chrono::Utc;

use crate::models::results::TestResults;
use crate::models::{AnswerValue, Question, Section};
use crate::services::ledger::{AnswerLedger, SECTION_B_ATTEMPT_CAP};

/// Marks awarded for a correct answer.
const MARKS_CORRECT: i32 = 4;
/// Marks deducted for a wrong answer.
const MARKS_WRONG: i32 = -1;

/// The recognized full-length paper: 200 questions of which 180 are
/// scorable.
const FULL_PAPER_QUESTIONS: usize = 200;
const FULL_PAPER_SCORABLE: u32 = 180;

/// Single-pass deterministic scoring over the final question sequence
/// and answer ledger.
///
/// Countedness follows sequence order: section-A questions always
/// count; section-B questions count only while their subsection has
/// seen fewer than the cap of answered entries. An answered 11th+
/// question stays in the ledger but is excluded from every tally.
pub fn score(questions: &[Question], ledger: &AnswerLedger) -> TestResults {
    let mut correct = 0u32;
    let mut wrong = 0u32;
    let mut unattempted = 0u32;
    let mut total_score = 0i32;
    let mut subjective_count = 0u32;
    let mut non_subjective_count = 0u32;
    let mut total_valid_questions = 0u32;
    let mut section_b_attempts: HashMap<&str, usize> = HashMap::new();

    for question in questions {
        if question.is_subjective() {
            subjective_count += 1;
            continue;
        }

        non_subjective_count += 1;

        let user_answer = ledger.answer(question.id);
        let mut is_counted = true;

        if question.section == Section::B && user_answer.is_some() {
            let attempts = section_b_attempts
                .entry(question.subsection_key())
                .or_insert(0);
            *attempts += 1;
            if *attempts > SECTION_B_ATTEMPT_CAP {
                is_counted = false;
            }
        }

        if !is_counted {
            // Present in the ledger, excluded from every tally.
            continue;
        }

        total_valid_questions += 1;

        match user_answer {
            None => unattempted += 1,
            Some(answer) => {
                let matches = match (answer, question.correct_option) {
                    (AnswerValue::Choice(selected), Some(expected)) => *selected == expected,
                    // Free text against an objective question never matches.
                    _ => false,
                };

                if matches {
                    correct += 1;
                    total_score += MARKS_CORRECT;
                } else {
                    wrong += 1;
                    total_score += MARKS_WRONG;
                }
            }
        }
    }

    let possible_marks = if questions.len() == FULL_PAPER_QUESTIONS {
        FULL_PAPER_SCORABLE * MARKS_CORRECT as u32
    } else {
        non_subjective_count * MARKS_CORRECT as u32
    };

    TestResults {
        correct,
        wrong,
        unattempted,
        total_score,
        possible_marks,
        total_valid_questions,
        subjective_count,
        completed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OptionLabel;

    fn objective(id: u32, subject: &str, section: Section, subsection: Option<&str>) -> Question {
        Question {
            id,
            subject: subject.to_string(),
            subsection: subsection.map(str::to_string),
            section,
            question_text: format!("Question {}", id),
            option_a: Some("one".to_string()),
            option_b: Some("two".to_string()),
            option_c: Some("three".to_string()),
            option_d: Some("four".to_string()),
            correct_option: Some(OptionLabel::A),
            image_path: None,
        }
    }

    fn subjective(id: u32, subject: &str) -> Question {
        Question {
            id,
            subject: subject.to_string(),
            subsection: None,
            section: Section::A,
            question_text: format!("Describe {}", id),
            option_a: None,
            option_b: None,
            option_c: None,
            option_d: None,
            correct_option: None,
            image_path: None,
        }
    }

    fn answer_all_correct(questions: &[Question], ledger: &mut AnswerLedger) {
        for q in questions {
            if !q.is_subjective() {
                ledger.record(questions, q, AnswerValue::Choice(OptionLabel::A));
            }
        }
    }

    #[test]
    fn empty_paper_scores_zero() {
        let results = score(&[], &AnswerLedger::new());
        assert_eq!(results.total_score, 0);
        assert_eq!(results.possible_marks, 0);
        assert_eq!(results.total_valid_questions, 0);
    }

    #[test]
    fn correct_wrong_unattempted_tally() {
        let paper: Vec<Question> = (1..=4)
            .map(|id| objective(id, "Physics", Section::A, None))
            .collect();
        let mut ledger = AnswerLedger::new();
        ledger.record(&paper, &paper[0], AnswerValue::Choice(OptionLabel::A)); // correct
        ledger.record(&paper, &paper[1], AnswerValue::Choice(OptionLabel::C)); // wrong
        // paper[2], paper[3] unattempted

        let results = score(&paper, &ledger);
        assert_eq!(results.correct, 1);
        assert_eq!(results.wrong, 1);
        assert_eq!(results.unattempted, 2);
        assert_eq!(results.total_score, 3); // +4 - 1
        assert_eq!(results.possible_marks, 16);
        assert_eq!(
            results.correct + results.wrong + results.unattempted,
            results.total_valid_questions
        );
    }

    #[test]
    fn subjective_questions_are_excluded_even_when_answered() {
        let paper = vec![
            objective(1, "Physics", Section::A, None),
            subjective(2, "Physics"),
        ];
        let mut ledger = AnswerLedger::new();
        ledger.record(&paper, &paper[0], AnswerValue::Choice(OptionLabel::A));
        ledger.record(
            &paper,
            &paper[1],
            AnswerValue::Text("p = mv".to_string()),
        );

        let results = score(&paper, &ledger);
        assert_eq!(results.subjective_count, 1);
        assert_eq!(results.total_valid_questions, 1);
        assert_eq!(results.correct, 1);
        assert_eq!(results.total_score, 4);
        assert_eq!(results.possible_marks, 4);
    }

    #[test]
    fn free_text_on_objective_question_scores_as_wrong() {
        let paper = vec![objective(1, "Physics", Section::A, None)];
        let mut ledger = AnswerLedger::new();
        ledger.record(&paper, &paper[0], AnswerValue::Text("A".to_string()));

        let results = score(&paper, &ledger);
        assert_eq!(results.wrong, 1);
        assert_eq!(results.total_score, -1);
    }

    #[test]
    fn full_mock_scenario_all_valid_correct() {
        // 200 questions, 20 subjective -> 180 valid, possible 720.
        let mut paper = Vec::new();
        for id in 1..=180 {
            paper.push(objective(id, "Physics", Section::A, None));
        }
        for id in 181..=200 {
            paper.push(subjective(id, "Physics"));
        }

        let mut ledger = AnswerLedger::new();
        answer_all_correct(&paper, &mut ledger);

        let results = score(&paper, &ledger);
        assert_eq!(results.possible_marks, 720);
        assert_eq!(results.total_score, 720);
        assert_eq!(results.correct, 180);
        assert_eq!(results.wrong, 0);
        assert_eq!(results.unattempted, 0);
        assert_eq!(results.subjective_count, 20);
        assert_eq!(results.total_valid_questions, 180);
    }

    #[test]
    fn section_b_counts_first_ten_answered_in_sequence_order() {
        // 13 section-B questions, all answered correctly: only the
        // first 10 in sequence order are counted.
        let paper: Vec<Question> = (1..=13)
            .map(|id| objective(id, "Biology", Section::B, Some("Botany")))
            .collect();
        let mut ledger = AnswerLedger::new();
        for q in &paper {
            // Bypass record-time cap to model a ledger that already
            // holds more answers than the cap.
            ledger_force(&mut ledger, q.id, AnswerValue::Choice(OptionLabel::A));
        }

        let results = score(&paper, &ledger);
        assert_eq!(results.correct, 10);
        assert_eq!(results.total_score, 40);
        assert_eq!(results.wrong, 0);
        assert_eq!(results.unattempted, 0);
        assert_eq!(results.total_valid_questions, 10);
    }

    #[test]
    fn unanswered_section_b_questions_do_not_consume_cap() {
        // 12 B questions, answers on the last 10 only: all 10 counted,
        // the two unanswered ones tally as unattempted.
        let paper: Vec<Question> = (1..=12)
            .map(|id| objective(id, "Biology", Section::B, Some("Zoology")))
            .collect();
        let mut ledger = AnswerLedger::new();
        for q in paper.iter().skip(2) {
            ledger.record(&paper, q, AnswerValue::Choice(OptionLabel::A));
        }

        let results = score(&paper, &ledger);
        assert_eq!(results.correct, 10);
        assert_eq!(results.unattempted, 2);
        assert_eq!(results.total_valid_questions, 12);
    }

    #[test]
    fn scoring_is_path_independent() {
        let paper: Vec<Question> = (1..=30)
            .map(|id| objective(id, "Chemistry", Section::B, Some("Organic")))
            .collect();

        // Record in forward order.
        let mut forward = AnswerLedger::new();
        for q in &paper {
            forward.record(&paper, q, AnswerValue::Choice(OptionLabel::A));
        }

        // Record in reverse order.
        let mut reverse = AnswerLedger::new();
        for q in paper.iter().rev() {
            reverse.record(&paper, q, AnswerValue::Choice(OptionLabel::A));
        }

        let a = score(&paper, &forward);
        let b = score(&paper, &reverse);
        assert_eq!(a.correct, b.correct);
        assert_eq!(a.total_score, b.total_score);
        assert_eq!(a.total_valid_questions, b.total_valid_questions);
    }

    // Test-only escape hatch: seed a ledger past the record-time cap.
    fn ledger_force(ledger: &mut AnswerLedger, id: u32, value: AnswerValue) {
        let lone = Question {
            id,
            subject: "any".to_string(),
            subsection: None,
            section: Section::A,
            question_text: String::new(),
            option_a: Some("x".to_string()),
            option_b: None,
            option_c: None,
            option_d: None,
            correct_option: None,
            image_path: None,
        };
        ledger.record(&[], &lone, value);
    }
}
