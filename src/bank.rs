//! Question bank: the ordered pool of questions for a session.
//!
//! The bank owns question identity, shuffle order, and per-option answer
//! tallies. Each question shuffles its own option order once at
//! construction; the bank order itself is randomized by [`QuestionBank::reshuffle`].
//! Questions are never destroyed during the process lifetime: a session
//! reset zeroes tallies and reshuffles, but identity and content survive.

use std::sync::RwLock;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Static definition a question is built from (inline config or JSON pack).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDef {
    /// The question text shown to players.
    pub statement: String,
    /// The correct option, matched by string equality.
    pub answer: String,
    /// All answer options, including the correct one.
    pub options: Vec<String>,
}

/// A question as shown while its answer window is open.
///
/// Carries no correctness information, so it is safe to send to players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionPrompt {
    /// Stable question identifier.
    pub id: String,
    /// The question text.
    pub statement: String,
    /// Options in this question's shuffled display order.
    pub options: Vec<String>,
}

/// One option line in a [`QuestionReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionCount {
    /// Option label as displayed.
    pub label: String,
    /// How many answers chose this option.
    pub count: u64,
    /// Whether this option is the correct answer.
    pub correct: bool,
}

/// A question with its accumulated tallies, broadcast after answers land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionReport {
    /// Stable question identifier.
    pub id: String,
    /// The question text.
    pub statement: String,
    /// Options with tallies, in display order.
    pub options: Vec<OptionCount>,
}

/// Outcome of recording one answer against the active question.
#[derive(Debug, Clone)]
pub struct AnswerRecord {
    /// Whether the chosen option was the correct one.
    pub correct: bool,
    /// Snapshot of the question after the tally was applied.
    pub report: QuestionReport,
}

#[derive(Debug)]
struct Question {
    id: String,
    statement: String,
    answer: String,
    // options and tallies are parallel vectors in display order
    options: Vec<String>,
    tallies: Vec<u64>,
}

impl Question {
    fn build(def: &QuestionDef) -> Self {
        let mut options = def.options.clone();
        options.shuffle(&mut rand::rng());
        let tallies = vec![0; options.len()];
        Self {
            id: Uuid::new_v4().simple().to_string(),
            statement: def.statement.clone(),
            answer: def.answer.clone(),
            options,
            tallies,
        }
    }

    fn prompt(&self) -> QuestionPrompt {
        QuestionPrompt {
            id: self.id.clone(),
            statement: self.statement.clone(),
            options: self.options.clone(),
        }
    }

    fn report(&self) -> QuestionReport {
        QuestionReport {
            id: self.id.clone(),
            statement: self.statement.clone(),
            options: self
                .options
                .iter()
                .zip(&self.tallies)
                .map(|(label, &count)| OptionCount {
                    label: label.clone(),
                    count,
                    correct: *label == self.answer,
                })
                .collect(),
        }
    }

    fn reset_tallies(&mut self) {
        for tally in &mut self.tallies {
            *tally = 0;
        }
    }
}

/// The ordered collection of questions available to the session.
///
/// All access goes through one `RwLock`; answer tallies need a write
/// lock, so [`QuestionBank::record_answer`] re-verifies the question id
/// under that lock and a concurrent reshuffle can never misattribute an
/// answer.
#[derive(Debug, Default)]
pub struct QuestionBank {
    questions: RwLock<Vec<Question>>,
}

impl QuestionBank {
    /// Creates an empty bank.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bank from static definitions.
    #[must_use]
    pub fn from_defs(defs: &[QuestionDef]) -> Self {
        let bank = Self::new();
        bank.load(defs);
        bank
    }

    /// Appends questions built from static definitions.
    ///
    /// Each question shuffles its own option order at construction.
    pub fn load(&self, defs: &[QuestionDef]) {
        let mut questions = self.lock_write();
        questions.extend(defs.iter().map(Question::build));
    }

    /// Current question count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_read().len()
    }

    /// True when the bank holds no questions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_read().is_empty()
    }

    /// Bounds-checked prompt lookup; `None` past the end of the bank.
    #[must_use]
    pub fn prompt(&self, index: usize) -> Option<QuestionPrompt> {
        self.lock_read().get(index).map(Question::prompt)
    }

    /// Bounds-checked report lookup; `None` past the end of the bank.
    #[must_use]
    pub fn report(&self, index: usize) -> Option<QuestionReport> {
        self.lock_read().get(index).map(Question::report)
    }

    /// True when the question at `index` exists and carries `question_id`.
    #[must_use]
    pub fn matches(&self, index: usize, question_id: &str) -> bool {
        self.lock_read()
            .get(index)
            .is_some_and(|q| q.id == question_id)
    }

    /// Records one answer against the question at `index`.
    ///
    /// Returns `None` when the index is out of range or `question_id` no
    /// longer names the question at that position (stale submission). A
    /// chosen option that is not on the question tallies nothing but
    /// still yields a record, marked incorrect.
    #[must_use]
    pub fn record_answer(
        &self,
        index: usize,
        question_id: &str,
        option: &str,
    ) -> Option<AnswerRecord> {
        let mut questions = self.lock_write();
        let question = questions.get_mut(index)?;
        if question.id != question_id {
            return None;
        }

        let correct = question.answer == option;
        if let Some(slot) = question.options.iter().position(|o| o == option) {
            question.tallies[slot] += 1;
        }

        Some(AnswerRecord {
            correct,
            report: question.report(),
        })
    }

    /// Randomizes question order. Identity and tallies ride along.
    pub fn reshuffle(&self) {
        self.lock_write().shuffle(&mut rand::rng());
    }

    /// Zeroes every option tally for the first `up_to` questions in the
    /// current order, then reshuffles the bank.
    pub fn reset_tallies(&self, up_to: usize) {
        let mut questions = self.lock_write();
        let bound = up_to.min(questions.len());
        for question in &mut questions[..bound] {
            question.reset_tallies();
        }
        questions.shuffle(&mut rand::rng());
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Question>> {
        self.questions.read().expect("question bank lock poisoned")
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Question>> {
        self.questions.write().expect("question bank lock poisoned")
    }
}
