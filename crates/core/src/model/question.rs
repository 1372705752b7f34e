use rand::Rng;
use rand::seq::index;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The four answer slots of a multiple-choice question.
///
/// Grading is an exact match on the letter; `FromStr` is case-sensitive so
/// a lowercase letter from an untrusted source is rejected rather than
/// silently normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnswerKey {
    A,
    B,
    C,
    D,
}

impl AnswerKey {
    /// All keys in option order.
    pub const ALL: [AnswerKey; 4] = [AnswerKey::A, AnswerKey::B, AnswerKey::C, AnswerKey::D];

    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            AnswerKey::A => 'A',
            AnswerKey::B => 'B',
            AnswerKey::C => 'C',
            AnswerKey::D => 'D',
        }
    }

    /// Index of this key into a question's option list.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            AnswerKey::A => 0,
            AnswerKey::B => 1,
            AnswerKey::C => 2,
            AnswerKey::D => 3,
        }
    }
}

impl fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("expected a single letter A-D, got {got:?}")]
pub struct ParseAnswerKeyError {
    pub got: String,
}

impl FromStr for AnswerKey {
    type Err = ParseAnswerKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(AnswerKey::A),
            "B" => Ok(AnswerKey::B),
            "C" => Ok(AnswerKey::C),
            "D" => Ok(AnswerKey::D),
            other => Err(ParseAnswerKeyError {
                got: other.to_string(),
            }),
        }
    }
}

/// Difficulty tag carried by each bank question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown difficulty tag {got:?}")]
pub struct ParseDifficultyError {
    pub got: String,
}

impl FromStr for Difficulty {
    type Err = ParseDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Easy" => Ok(Difficulty::Easy),
            "Medium" => Ok(Difficulty::Medium),
            "Hard" => Ok(Difficulty::Hard),
            other => Err(ParseDifficultyError {
                got: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text must not be empty")]
    EmptyText,

    #[error("option {key} must not be empty")]
    EmptyOption { key: AnswerKey },
}

/// One multiple-choice question with exactly four options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    text: String,
    options: [String; 4],
    answer: AnswerKey,
    difficulty: Difficulty,
    category: String,
}

impl Question {
    /// Build a question, validating that the text and every option are
    /// non-empty.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` on blank text or options.
    pub fn new(
        text: impl Into<String>,
        options: [String; 4],
        answer: AnswerKey,
        difficulty: Difficulty,
        category: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        for (key, option) in AnswerKey::ALL.iter().zip(options.iter()) {
            if option.trim().is_empty() {
                return Err(QuestionError::EmptyOption { key: *key });
            }
        }
        Ok(Self {
            text,
            options,
            answer,
            difficulty,
            category: category.into(),
        })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String; 4] {
        &self.options
    }

    #[must_use]
    pub fn option(&self, key: AnswerKey) -> &str {
        &self.options[key.index()]
    }

    /// Returns true when `selected` matches the correct key exactly.
    #[must_use]
    pub fn is_correct(&self, selected: AnswerKey) -> bool {
        self.answer == selected
    }

    #[must_use]
    pub fn answer(&self) -> AnswerKey {
        self.answer
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BankError {
    #[error("question bank holds {have} questions but {need} were requested")]
    TooSmall { have: usize, need: usize },
}

/// Fixed per-module list of questions, loaded once at catalog init.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    #[must_use]
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Draw `n` distinct questions uniformly at random.
    ///
    /// The returned order is the draw order; callers present it as-is.
    /// A bank smaller than `n` is a hard precondition failure, never a
    /// silent fallback to sampling with replacement.
    ///
    /// # Errors
    ///
    /// Returns `BankError::TooSmall` when the bank holds fewer than `n`
    /// questions.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Question>, BankError> {
        if self.questions.len() < n {
            return Err(BankError::TooSmall {
                have: self.questions.len(),
                need: n,
            });
        }
        Ok(index::sample(rng, self.questions.len(), n)
            .into_iter()
            .map(|i| self.questions[i].clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn build_question(n: usize) -> Question {
        Question::new(
            format!("Question {n}?"),
            [
                format!("A. option one of {n}"),
                format!("B. option two of {n}"),
                format!("C. option three of {n}"),
                format!("D. option four of {n}"),
            ],
            AnswerKey::D,
            Difficulty::Medium,
            "General",
        )
        .unwrap()
    }

    #[test]
    fn answer_key_parse_is_case_sensitive() {
        assert_eq!("C".parse::<AnswerKey>().unwrap(), AnswerKey::C);
        assert!("c".parse::<AnswerKey>().is_err());
        assert!("AB".parse::<AnswerKey>().is_err());
    }

    #[test]
    fn difficulty_parse_roundtrip() {
        for d in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            assert_eq!(d.as_str().parse::<Difficulty>().unwrap(), d);
        }
        assert!("easy".parse::<Difficulty>().is_err());
    }

    #[test]
    fn question_rejects_empty_option() {
        let err = Question::new(
            "Q?",
            [
                "A. yes".to_string(),
                String::new(),
                "C. no".to_string(),
                "D. maybe".to_string(),
            ],
            AnswerKey::A,
            Difficulty::Easy,
            "General",
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::EmptyOption { key: AnswerKey::B });
    }

    #[test]
    fn grading_is_exact_match() {
        let q = build_question(1);
        assert!(q.is_correct(AnswerKey::D));
        assert!(!q.is_correct(AnswerKey::A));
    }

    #[test]
    fn sample_draws_distinct_questions() {
        let bank = QuestionBank::new((0..12).map(build_question).collect());
        let mut rng = StdRng::seed_from_u64(7);

        let drawn = bank.sample(10, &mut rng).unwrap();
        assert_eq!(drawn.len(), 10);

        let mut texts: Vec<&str> = drawn.iter().map(Question::text).collect();
        texts.sort_unstable();
        texts.dedup();
        assert_eq!(texts.len(), 10, "draws must be without replacement");
    }

    #[test]
    fn sample_rejects_undersized_bank() {
        let bank = QuestionBank::new((0..4).map(build_question).collect());
        let mut rng = StdRng::seed_from_u64(7);
        let err = bank.sample(10, &mut rng).unwrap_err();
        assert_eq!(err, BankError::TooSmall { have: 4, need: 10 });
    }
}
