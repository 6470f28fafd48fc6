// SPDX-License-Identifier: MIT OR Apache-2.0
//! Survey questions and answer validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tournament::RankingOption;

/// XP for a multiple-choice answer.
pub const MULTIPLE_CHOICE_XP: u64 = 50;
/// XP for a yes/no answer.
pub const YES_NO_XP: u64 = 50;
/// XP for a free-text answer.
pub const OPEN_ENDED_XP: u64 = 75;
/// XP for finishing a ranking game.
pub const RANKING_XP: u64 = 100;

/// Shape of a question and the inputs it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionKind {
    /// Pick one of a fixed set of options.
    MultipleChoice {
        /// Allowed options.
        options: Vec<String>,
    },
    /// Swipe yes or no.
    YesNo,
    /// Free text.
    OpenEnded,
    /// Pairwise ranking tournament.
    Ranking {
        /// Options entered into the tournament.
        options: Vec<RankingOption>,
    },
}

impl QuestionKind {
    /// Default XP reward for this kind of question.
    #[must_use]
    pub fn default_xp(&self) -> u64 {
        match self {
            Self::MultipleChoice { .. } => MULTIPLE_CHOICE_XP,
            Self::YesNo => YES_NO_XP,
            Self::OpenEnded => OPEN_ENDED_XP,
            Self::Ranking { .. } => RANKING_XP,
        }
    }
}

/// A survey question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Question id.
    pub id: String,
    /// Prompt shown to the user.
    pub prompt: String,
    /// Category badge.
    pub category: String,
    /// XP granted on a valid answer.
    pub xp_reward: u64,
    /// Question shape.
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    /// Create a question with the default reward for its kind.
    pub fn new(
        id: impl Into<String>,
        prompt: impl Into<String>,
        category: impl Into<String>,
        kind: QuestionKind,
    ) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            category: category.into(),
            xp_reward: kind.default_xp(),
            kind,
        }
    }

    /// Override the XP reward.
    #[must_use]
    pub fn with_xp_reward(mut self, xp: u64) -> Self {
        self.xp_reward = xp;
        self
    }

    /// Check that an answer fits this question.
    ///
    /// # Errors
    ///
    /// Returns [`AnswerError`] when the answer kind does not match, a choice
    /// is not one of the options, free text is blank, or a ranking is empty.
    pub fn validate(&self, answer: &Answer) -> Result<(), AnswerError> {
        match (&self.kind, answer) {
            (QuestionKind::MultipleChoice { options }, Answer::Choice(choice)) => {
                if options.iter().any(|o| o == choice) {
                    Ok(())
                } else {
                    Err(AnswerError::UnknownOption(choice.clone()))
                }
            },
            (QuestionKind::YesNo, Answer::YesNo(_)) => Ok(()),
            (QuestionKind::OpenEnded, Answer::Text(text)) => {
                if text.trim().is_empty() {
                    Err(AnswerError::EmptyResponse)
                } else {
                    Ok(())
                }
            },
            (QuestionKind::Ranking { options }, Answer::Ranking(ranking)) => {
                if ranking.is_empty() {
                    return Err(AnswerError::EmptyRanking);
                }
                match ranking
                    .iter()
                    .find(|id| !options.iter().any(|o| &o.id == *id))
                {
                    Some(unknown) => Err(AnswerError::UnknownOption(unknown.clone())),
                    None => Ok(()),
                }
            },
            _ => Err(AnswerError::KindMismatch),
        }
    }
}

/// A user's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum Answer {
    /// Selected option.
    Choice(String),
    /// Swipe result.
    YesNo(bool),
    /// Free text.
    Text(String),
    /// Option ids ordered best first.
    Ranking(Vec<String>),
}

impl Answer {
    /// Stored text form of the answer, as written to `user_responses`.
    #[must_use]
    pub fn response_text(&self) -> Option<String> {
        match self {
            Self::Choice(c) => Some(c.clone()),
            Self::YesNo(true) => Some("Yes".to_string()),
            Self::YesNo(false) => Some("No".to_string()),
            Self::Text(t) => Some(t.trim().to_string()),
            Self::Ranking(_) => None,
        }
    }
}

/// Answer validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    /// Free-text answer was blank.
    #[error("response cannot be empty")]
    EmptyResponse,
    /// Option not offered by the question.
    #[error("unknown option: {0}")]
    UnknownOption(String),
    /// Ranking answer had no entries.
    #[error("ranking has no entries")]
    EmptyRanking,
    /// Answer shape does not match the question.
    #[error("answer does not match question type")]
    KindMismatch,
    /// The question was already answered.
    #[error("question already answered: {0}")]
    AlreadyAnswered(String),
}

/// Built-in question set shown on the homepage.
#[must_use]
pub fn default_questions() -> Vec<Question> {
    let ranking_options = [
        ("croissants", "Croissants", "🥐"),
        ("muffins", "Muffins", "🧁"),
        ("cookies", "Cookies", "🍪"),
        ("macarons", "Macarons", "🍬"),
        ("donuts", "Donuts", "🍩"),
    ]
    .into_iter()
    .map(|(id, name, emoji)| RankingOption::new(id, name, emoji))
    .collect();

    vec![
        Question::new(
            "work-life-balance",
            "How would you rate your work-life balance this week?",
            "Wellness",
            QuestionKind::MultipleChoice {
                options: ["Excellent", "Good", "Fair", "Needs Improvement"]
                    .map(String::from)
                    .to_vec(),
            },
        ),
        Question::new(
            "contributions-valued",
            "Do you feel your contributions are valued by the team?",
            "Team Culture",
            QuestionKind::YesNo,
        ),
        Question::new(
            "improve-experience",
            "What's one thing we could improve to make your work experience better?",
            "Feedback",
            QuestionKind::OpenEnded,
        ),
        Question::new(
            "project-goals",
            "How clear are your current project goals?",
            "Projects",
            QuestionKind::MultipleChoice {
                options: ["Very Clear", "Mostly Clear", "Somewhat Clear", "Not Clear"]
                    .map(String::from)
                    .to_vec(),
            },
        ),
        Question::new(
            "recommend-company",
            "Would you recommend our company as a great place to work?",
            "Culture",
            QuestionKind::YesNo,
        ),
        Question::new(
            "canteen-favorite",
            "What's your favorite food in the canteen?",
            "Canteen",
            QuestionKind::Ranking {
                options: ranking_options,
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str) -> Question {
        default_questions()
            .into_iter()
            .find(|q| q.id == id)
            .unwrap()
    }

    #[test]
    fn test_default_rewards() {
        let questions = default_questions();
        assert_eq!(questions.len(), 6);
        assert_eq!(question("work-life-balance").xp_reward, 50);
        assert_eq!(question("improve-experience").xp_reward, 75);
        assert_eq!(question("canteen-favorite").xp_reward, 100);
    }

    #[test]
    fn test_validate_choice() {
        let q = question("project-goals");
        assert!(q.validate(&Answer::Choice("Very Clear".into())).is_ok());
        assert_eq!(
            q.validate(&Answer::Choice("Crystal".into())),
            Err(AnswerError::UnknownOption("Crystal".into()))
        );
    }

    #[test]
    fn test_validate_blank_text() {
        let q = question("improve-experience");
        assert_eq!(
            q.validate(&Answer::Text("   \n".into())),
            Err(AnswerError::EmptyResponse)
        );
        assert!(q.validate(&Answer::Text("More snacks".into())).is_ok());
    }

    #[test]
    fn test_validate_kind_mismatch() {
        let q = question("contributions-valued");
        assert_eq!(
            q.validate(&Answer::Text("yes".into())),
            Err(AnswerError::KindMismatch)
        );
        assert!(q.validate(&Answer::YesNo(false)).is_ok());
    }

    #[test]
    fn test_validate_ranking() {
        let q = question("canteen-favorite");
        assert_eq!(
            q.validate(&Answer::Ranking(vec![])),
            Err(AnswerError::EmptyRanking)
        );
        assert!(q
            .validate(&Answer::Ranking(vec!["donuts".into(), "cookies".into()]))
            .is_ok());
        assert!(q.validate(&Answer::Ranking(vec!["pizza".into()])).is_err());
    }

    #[test]
    fn test_response_text() {
        assert_eq!(Answer::YesNo(true).response_text().as_deref(), Some("Yes"));
        assert_eq!(
            Answer::Text("  remote work \n".into()).response_text().as_deref(),
            Some("remote work")
        );
        assert_eq!(Answer::Ranking(vec!["a".into()]).response_text(), None);
    }

    #[test]
    fn test_question_serialization() {
        let q = question("contributions-valued");
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["type"], "yes-no");
        assert_eq!(json["xpReward"], 50);
    }
}
