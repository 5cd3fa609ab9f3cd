use serde::{Deserialize, Serialize};

use super::ids::{DiscussionQuestionId, IdGen, ResponseOptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    #[default]
    DecisionMaking,
    Communication,
    Technical,
    Coordination,
    Policy,
    LessonsLearned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    #[default]
    Text,
    MultipleChoice,
    Rating,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseOption {
    pub id: ResponseOptionId,
    pub label: String,
    pub value: String,
}

/// A prompt for facilitated discussion at the end of a module.
///
/// `response_options` is present and non-empty exactly when the response
/// type is multiple choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionQuestion {
    pub id: DiscussionQuestionId,
    pub question: String,
    pub category: QuestionCategory,
    pub response_type: ResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_options: Option<Vec<ResponseOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Facilitator-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_themes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_questions: Option<Vec<String>>,
    /// Minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_discussion_time: Option<u32>,
    pub order: u32,
}

impl DiscussionQuestion {
    pub fn empty(order: u32, ids: &mut IdGen) -> Self {
        Self {
            id: ids.next(),
            question: String::new(),
            category: QuestionCategory::default(),
            response_type: ResponseType::default(),
            response_options: None,
            context: None,
            guidance_notes: None,
            expected_themes: None,
            follow_up_questions: None,
            suggested_discussion_time: None,
            order,
        }
    }

    /// True when the options list agrees with the response type.
    pub fn options_consistent(&self) -> bool {
        let has_options = self
            .response_options
            .as_ref()
            .is_some_and(|opts| !opts.is_empty());
        match self.response_type {
            ResponseType::MultipleChoice => has_options,
            ResponseType::Text | ResponseType::Rating => self.response_options.is_none(),
        }
    }

    /// Bring `response_options` back in line with `response_type`.
    pub(crate) fn normalize_options(&mut self, ids: &mut IdGen) {
        match self.response_type {
            ResponseType::MultipleChoice => {
                let missing = self
                    .response_options
                    .as_ref()
                    .map_or(true, |opts| opts.is_empty());
                if missing {
                    self.response_options = Some(
                        (1..=2)
                            .map(|n| ResponseOption {
                                id: ids.next(),
                                label: format!("Option {n}"),
                                value: format!("option_{n}"),
                            })
                            .collect(),
                    );
                }
            }
            ResponseType::Text | ResponseType::Rating => self.response_options = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_question_is_consistent() {
        let mut ids = IdGen::seeded(4);
        let q = DiscussionQuestion::empty(2, &mut ids);
        assert_eq!(q.order, 2);
        assert_eq!(q.response_type, ResponseType::Text);
        assert!(q.options_consistent());
    }

    #[test]
    fn multiple_choice_gets_seeded_options() {
        let mut ids = IdGen::seeded(4);
        let mut q = DiscussionQuestion::empty(0, &mut ids);
        q.response_type = ResponseType::MultipleChoice;
        assert!(!q.options_consistent());
        q.normalize_options(&mut ids);
        assert!(q.options_consistent());
        assert_eq!(q.response_options.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn switching_to_rating_drops_options() {
        let mut ids = IdGen::seeded(4);
        let mut q = DiscussionQuestion::empty(0, &mut ids);
        q.response_type = ResponseType::MultipleChoice;
        q.normalize_options(&mut ids);
        q.response_type = ResponseType::Rating;
        q.normalize_options(&mut ids);
        assert!(q.response_options.is_none());
    }

    #[test]
    fn existing_options_are_kept() {
        let mut ids = IdGen::seeded(4);
        let mut q = DiscussionQuestion::empty(0, &mut ids);
        q.response_type = ResponseType::MultipleChoice;
        q.response_options = Some(vec![ResponseOption {
            id: ResponseOptionId::new("yes"),
            label: "Yes".to_string(),
            value: "yes".to_string(),
        }]);
        q.normalize_options(&mut ids);
        assert_eq!(q.response_options.unwrap()[0].id.as_str(), "yes");
    }
}
