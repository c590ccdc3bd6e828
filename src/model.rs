//! Canonical in-memory model for a fetched test plan.
//!
//! The model is built once per populate pass and read-only afterwards; the
//! synthesizer, graph builder, and validator never mutate it.

use std::collections::BTreeMap;

/// Leading keywords accepted by the step grammar.
pub const STEP_KEYWORDS: [&str; 5] = ["Given", "When", "Then", "And", "But"];

/// Recognized leading keyword of a step line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKeyword {
    Given,
    When,
    Then,
    And,
    But,
}

impl StepKeyword {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKeyword::Given => "Given",
            StepKeyword::When => "When",
            StepKeyword::Then => "Then",
            StepKeyword::And => "And",
            StepKeyword::But => "But",
        }
    }

    fn from_word(word: &str) -> Option<Self> {
        match word {
            "Given" => Some(StepKeyword::Given),
            "When" => Some(StepKeyword::When),
            "Then" => Some(StepKeyword::Then),
            "And" => Some(StepKeyword::And),
            "But" => Some(StepKeyword::But),
            _ => None,
        }
    }
}

/// A single action line: keyword plus the remaining step text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub keyword: StepKeyword,
    pub text: String,
}

impl Step {
    /// Parse a raw step line against the leading-keyword grammar.
    ///
    /// Returns `None` when the line does not start with a recognized keyword
    /// followed by non-empty text; the caller turns that into a grammar error
    /// carrying the owning entity.
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        let (word, rest) = trimmed.split_once(char::is_whitespace)?;
        let keyword = StepKeyword::from_word(word)?;
        let text = rest.trim();
        if text.is_empty() {
            return None;
        }
        Some(Step {
            keyword,
            text: text.to_string(),
        })
    }

    /// Full Gherkin line, keyword included.
    pub fn line(&self) -> String {
        format!("{} {}", self.keyword.as_str(), self.text)
    }
}

/// One ordered element of a scenario body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioEntry {
    /// Inline action step.
    Step(Step),
    /// Reference to a shared step in the plan repository, by identifier.
    SharedStep(u32),
}

/// Parameter data attached to a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParameterSet {
    /// No parameters declared.
    #[default]
    None,
    /// Inline table with named columns and positional value rows.
    Local(LocalTable),
    /// Named references into shared parameter sets.
    Shared(Vec<SharedBinding>),
}

/// Inline parameter table; `rows[i]` is aligned positionally with `names`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTable {
    pub names: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One local parameter bound to a column of a shared parameter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedBinding {
    pub local_name: String,
    pub set_name: String,
    pub set_id: u32,
}

/// A test case, fully resolved against the plan repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub id: u32,
    pub title: String,
    pub entries: Vec<ScenarioEntry>,
    pub parameters: ParameterSet,
}

/// Steps shared by every scenario of a suite, extracted from the test case
/// titled `Background`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Background {
    pub entries: Vec<ScenarioEntry>,
}

/// A suite owned by its plan: one Gherkin document per suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suite {
    pub id: u32,
    pub title: String,
    pub background: Option<Background>,
    pub scenarios: Vec<Scenario>,
}

/// A named, reusable sequence of steps stored in the plan repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedStep {
    pub id: u32,
    pub title: String,
    pub steps: Vec<Step>,
}

/// A named, reusable parameter table stored in the plan repository.
///
/// Rows are key→value maps because shared-set columns are ragged: a column
/// may stop short of the longest column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedParameterSet {
    pub id: u32,
    pub name: String,
    pub names: Vec<String>,
    pub rows: Vec<BTreeMap<String, String>>,
}

/// The canonical model: suites plus the plan-scoped repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPlan {
    pub id: u32,
    pub title: String,
    pub suites: Vec<Suite>,
    pub shared_steps: BTreeMap<u32, SharedStep>,
    pub shared_parameters: BTreeMap<u32, SharedParameterSet>,
}
