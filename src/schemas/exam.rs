use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of answer tokens the upstream API understands. Questions
/// with fewer than four options simply never offer the trailing keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum OptionKey {
    OptionA,
    OptionB,
    OptionC,
    OptionD,
}

impl OptionKey {
    pub(crate) const ALL: [OptionKey; 4] =
        [Self::OptionA, Self::OptionB, Self::OptionC, Self::OptionD];

    pub(crate) fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'A' => Some(Self::OptionA),
            'B' => Some(Self::OptionB),
            'C' => Some(Self::OptionC),
            'D' => Some(Self::OptionD),
            _ => None,
        }
    }

    pub(crate) fn letter(self) -> char {
        match self {
            Self::OptionA => 'A',
            Self::OptionB => 'B',
            Self::OptionC => 'C',
            Self::OptionD => 'D',
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Question {
    pub(crate) id: i64,
    pub(crate) question_text: String,
    #[serde(default)]
    pub(crate) option_a: Option<String>,
    #[serde(default)]
    pub(crate) option_b: Option<String>,
    #[serde(default)]
    pub(crate) option_c: Option<String>,
    #[serde(default)]
    pub(crate) option_d: Option<String>,
}

impl Question {
    pub(crate) fn option_text(&self, key: OptionKey) -> Option<&str> {
        match key {
            OptionKey::OptionA => self.option_a.as_deref(),
            OptionKey::OptionB => self.option_b.as_deref(),
            OptionKey::OptionC => self.option_c.as_deref(),
            OptionKey::OptionD => self.option_d.as_deref(),
        }
    }

    pub(crate) fn offers(&self, key: OptionKey) -> bool {
        self.option_text(key).is_some()
    }
}

/// Exam content as returned by the start endpoint. Correct answers are never
/// part of this payload; scoring is entirely server-side.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamContent {
    pub(crate) title: String,
    pub(crate) duration_minutes: u32,
    #[serde(default)]
    pub(crate) questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerEntry {
    pub(crate) question_id: i64,
    pub(crate) selected_option: OptionKey,
}

/// Submission payload. Unanswered questions are absent from `answers`; an
/// empty list is a valid submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitRequest {
    pub(crate) exam_id: i64,
    pub(crate) answers: Vec<AnswerEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitAck {
    #[serde(default)]
    pub(crate) message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_request_wire_shape() {
        let request = SubmitRequest {
            exam_id: 4,
            answers: vec![
                AnswerEntry { question_id: 301, selected_option: OptionKey::OptionB },
                AnswerEntry { question_id: 302, selected_option: OptionKey::OptionA },
            ],
        };

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "examId": 4,
                "answers": [
                    { "questionId": 301, "selectedOption": "optionB" },
                    { "questionId": 302, "selectedOption": "optionA" },
                ],
            })
        );
    }

    #[test]
    fn exam_content_tolerates_missing_options() {
        let content: ExamContent = serde_json::from_value(serde_json::json!({
            "title": "Geometry quiz",
            "durationMinutes": 15,
            "questions": [
                { "id": 7, "questionText": "True or false?", "optionA": "True", "optionB": "False" },
            ],
        }))
        .expect("deserialize");

        assert_eq!(content.duration_minutes, 15);
        let question = &content.questions[0];
        assert!(question.offers(OptionKey::OptionA));
        assert!(question.offers(OptionKey::OptionB));
        assert!(!question.offers(OptionKey::OptionC));
        assert!(!question.offers(OptionKey::OptionD));
    }

    #[test]
    fn option_key_letters_round() {
        for key in OptionKey::ALL {
            assert_eq!(OptionKey::from_letter(key.letter()), Some(key));
            assert_eq!(OptionKey::from_letter(key.letter().to_ascii_lowercase()), Some(key));
        }
        assert_eq!(OptionKey::from_letter('E'), None);
    }
}
