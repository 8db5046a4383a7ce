use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

pub mod results;

/// Section tag for a question. Section `A` is scored unconditionally;
/// section `B` is subject to the per-subsection attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Section {
    #[default]
    A,
    B,
}

/// One of the four objective option labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OptionLabel::A => "A",
            OptionLabel::B => "B",
            OptionLabel::C => "C",
            OptionLabel::D => "D",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for OptionLabel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(OptionLabel::A),
            "B" => Ok(OptionLabel::B),
            "C" => Ok(OptionLabel::C),
            "D" => Ok(OptionLabel::D),
            _ => Err(()),
        }
    }
}

/// A question as served by the question source. Immutable once fetched
/// for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub subject: String,
    #[serde(default)]
    pub subsection: Option<String>,
    #[serde(default)]
    pub section: Section,
    pub question_text: String,
    #[serde(default)]
    pub option_a: Option<String>,
    #[serde(default)]
    pub option_b: Option<String>,
    #[serde(default)]
    pub option_c: Option<String>,
    #[serde(default)]
    pub option_d: Option<String>,
    #[serde(default, deserialize_with = "lenient_option_label")]
    pub correct_option: Option<OptionLabel>,
    #[serde(default)]
    pub image_path: Option<String>,
}

impl Question {
    /// A question with no option texts at all is subjective and is
    /// excluded from objective scoring. The question source may send
    /// empty strings instead of omitting a field, so both count as
    /// absent.
    pub fn is_subjective(&self) -> bool {
        self.options().iter().all(|opt| match opt {
            Some(text) => text.trim().is_empty(),
            None => true,
        })
    }

    pub fn options(&self) -> [&Option<String>; 4] {
        [
            &self.option_a,
            &self.option_b,
            &self.option_c,
            &self.option_d,
        ]
    }

    pub fn option_text(&self, label: OptionLabel) -> Option<&str> {
        let opt = match label {
            OptionLabel::A => &self.option_a,
            OptionLabel::B => &self.option_b,
            OptionLabel::C => &self.option_c,
            OptionLabel::D => &self.option_d,
        };
        opt.as_deref().filter(|text| !text.trim().is_empty())
    }

    /// Grouping key for the section-B attempt cap: subsection when
    /// present, otherwise the subject itself.
    pub fn subsection_key(&self) -> &str {
        self.subsection.as_deref().unwrap_or(&self.subject)
    }
}

/// The question source sends an empty string instead of omitting the
/// correct option on subjective questions; treat anything that is not
/// A-D as absent.
fn lenient_option_label<'de, D>(deserializer: D) -> Result<Option<OptionLabel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// A recorded response: an option label for objective questions, free
/// text for subjective ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerValue {
    Choice(OptionLabel),
    Text(String),
}

impl AnswerValue {
    pub fn as_choice(&self) -> Option<OptionLabel> {
        match self {
            AnswerValue::Choice(label) => Some(*label),
            AnswerValue::Text(_) => None,
        }
    }
}

/// Setup-screen submission: which paper to generate and how long the
/// exam runs.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TestConfig {
    #[validate(length(min = 1, message = "subject must not be empty"))]
    pub subject: String,
    #[validate(range(min = 1, message = "duration must be at least one second"))]
    pub duration_seconds: u32,
}

/// Keyboard facade input. Option letters are no-ops on subjective
/// questions, which have no option labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Option(OptionLabel),
    Prev,
    Next,
}

/// Phase tag exposed to presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    Setup,
    Active,
    Finished,
}

/// Read model handed to presentation: enough to render the header,
/// the current question card and the recorded answer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: PhaseName,
    pub current_index: usize,
    pub question_count: usize,
    pub current_question: Option<Question>,
    pub current_answer: Option<AnswerValue>,
    pub remaining_exam_seconds: u32,
    pub remaining_question_seconds: u32,
}

impl SessionSnapshot {
    pub fn empty(phase: PhaseName) -> Self {
        Self {
            phase,
            current_index: 0,
            question_count: 0,
            current_question: None,
            current_answer: None,
            remaining_exam_seconds: 0,
            remaining_question_seconds: 0,
        }
    }
}
