//! Scenario Synthesizer: canonical model to Gherkin feature documents.
//!
//! One document per suite. Shared-step references expand to the literal
//! steps of the referenced entity, interleaved with inline steps in their
//! original ordinal order. Parameterized scenarios become outlines with one
//! example row per data row; `@name` tokens from the source system are
//! rewritten to Gherkin `<name>` placeholders.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use regex::Regex;

use crate::error::{BridgeError, Result};
use crate::model::{
    ParameterSet, Scenario, ScenarioEntry, SharedBinding, Step, StepKeyword, Suite, TestPlan,
};
use crate::persist::sanitize_component;

/// A synthesized Gherkin document for one suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDocument {
    pub suite_title: String,
    pub file_name: String,
    pub text: String,
}

const SECTION_INDENT: &str = "    ";
const STEP_INDENT: &str = "        ";

/// Render every suite of the plan into a feature document.
pub fn synthesize(plan: &TestPlan) -> Result<Vec<FeatureDocument>> {
    let token = token_regex()?;
    plan.suites
        .iter()
        .map(|suite| synthesize_suite(plan, suite, &token))
        .collect()
}

fn token_regex() -> Result<Regex> {
    Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)").map_err(|err| BridgeError::Decode {
        entity: "parameter token pattern".to_string(),
        detail: err.to_string(),
    })
}

fn synthesize_suite(plan: &TestPlan, suite: &Suite, token: &Regex) -> Result<FeatureDocument> {
    let mut text = String::new();
    let _ = writeln!(text, "Feature: {}", suite.title);

    if let Some(background) = &suite.background {
        text.push('\n');
        let _ = writeln!(text, "{SECTION_INDENT}Background:");
        for step in expand_entries(plan, &background.entries)? {
            let _ = writeln!(text, "{STEP_INDENT}{}", step.line());
        }
    }

    for scenario in &suite.scenarios {
        text.push('\n');
        render_scenario(plan, scenario, token, &mut text)?;
    }

    Ok(FeatureDocument {
        suite_title: suite.title.clone(),
        file_name: format!("{}.feature", sanitize_component(&suite.title)),
        text,
    })
}

/// Expand inline steps and shared-step references in ordinal order.
fn expand_entries(plan: &TestPlan, entries: &[ScenarioEntry]) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    for entry in entries {
        match entry {
            ScenarioEntry::Step(step) => steps.push(step.clone()),
            ScenarioEntry::SharedStep(id) => {
                let shared = plan.shared_steps.get(id).ok_or_else(|| BridgeError::Decode {
                    entity: "scenario body".to_string(),
                    detail: format!("reference to unknown shared step {id}"),
                })?;
                steps.extend(shared.steps.iter().cloned());
            }
        }
    }
    Ok(steps)
}

fn render_scenario(
    plan: &TestPlan,
    scenario: &Scenario,
    token: &Regex,
    text: &mut String,
) -> Result<()> {
    let steps = expand_entries(plan, &scenario.entries)?;
    match &scenario.parameters {
        ParameterSet::None => {
            render_plain(&scenario.title, &steps, text);
        }
        ParameterSet::Local(table) if table.rows.len() == 1 => {
            // Single-row tables inline their values instead of an outline.
            let values: BTreeMap<&str, &str> = table
                .names
                .iter()
                .map(String::as_str)
                .zip(table.rows[0].iter().map(String::as_str))
                .collect();
            let substituted: Vec<Step> = steps
                .iter()
                .map(|step| Step {
                    keyword: step.keyword,
                    text: token
                        .replace_all(&step.text, |captures: &regex::Captures<'_>| {
                            match values.get(&captures[1]) {
                                Some(value) => (*value).to_string(),
                                None => captures[0].to_string(),
                            }
                        })
                        .into_owned(),
                })
                .collect();
            render_plain(&scenario.title, &substituted, text);
        }
        ParameterSet::Local(table) => {
            let rows: Vec<Vec<&str>> = table
                .rows
                .iter()
                .map(|row| row.iter().map(String::as_str).collect())
                .collect();
            render_outline(&scenario.title, &steps, &table.names, &rows, token, text);
        }
        ParameterSet::Shared(bindings) => {
            let names: Vec<String> = bindings
                .iter()
                .map(|binding| binding.local_name.clone())
                .collect();
            let rows = project_shared_rows(plan, bindings);
            let rows_ref: Vec<Vec<&str>> = rows
                .iter()
                .map(|row| row.iter().map(String::as_str).collect())
                .collect();
            render_outline(&scenario.title, &steps, &names, &rows_ref, token, text);
        }
    }
    Ok(())
}

/// Project shared-set rows onto the referenced columns, by row index.
///
/// Rows with no value for any referenced column are dropped; a partial row
/// renders its missing cells as empty strings.
fn project_shared_rows(plan: &TestPlan, bindings: &[SharedBinding]) -> Vec<Vec<String>> {
    let row_count = bindings
        .iter()
        .filter_map(|binding| plan.shared_parameters.get(&binding.set_id))
        .map(|set| set.rows.len())
        .max()
        .unwrap_or(0);

    let mut rows = Vec::new();
    for index in 0..row_count {
        let mut row = Vec::with_capacity(bindings.len());
        let mut any_value = false;
        for binding in bindings {
            let value = plan
                .shared_parameters
                .get(&binding.set_id)
                .and_then(|set| set.rows.get(index))
                .and_then(|cells| cells.get(&binding.local_name));
            if let Some(value) = value {
                any_value = true;
                row.push(value.clone());
            } else {
                row.push(String::new());
            }
        }
        if any_value {
            rows.push(row);
        }
    }
    rows
}

fn render_plain(title: &str, steps: &[Step], text: &mut String) {
    let _ = writeln!(text, "{SECTION_INDENT}Scenario: {title}");
    for step in steps {
        let _ = writeln!(text, "{STEP_INDENT}{}", step.line());
    }
}

fn render_outline(
    title: &str,
    steps: &[Step],
    names: &[String],
    rows: &[Vec<&str>],
    token: &Regex,
    text: &mut String,
) {
    let _ = writeln!(text, "{SECTION_INDENT}Scenario Outline: {title}");
    for step in steps {
        let rewritten = token.replace_all(&step.text, |captures: &regex::Captures<'_>| {
            let name = &captures[1];
            if names.iter().any(|declared| declared == name) {
                format!("<{name}>")
            } else {
                captures[0].to_string()
            }
        });
        let _ = writeln!(text, "{STEP_INDENT}{} {rewritten}", step.keyword.as_str());
    }
    text.push('\n');
    let _ = writeln!(text, "{STEP_INDENT}Examples:");
    let _ = writeln!(text, "{STEP_INDENT}| {} |", names.join(" | "));
    for row in rows {
        let _ = writeln!(text, "{STEP_INDENT}| {} |", row.join(" | "));
    }
}

/// One step of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStep {
    pub keyword: StepKeyword,
    pub text: String,
}

/// One scenario block of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScenario {
    pub title: String,
    pub outline: bool,
    pub steps: Vec<ParsedStep>,
}

/// A feature document read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub feature: String,
    pub background: Vec<ParsedStep>,
    pub scenarios: Vec<ParsedScenario>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Background,
    Scenario,
    Examples,
}

/// Parse a synthesized document back into its tree.
///
/// Downstream phases read the persisted artifact rather than the in-memory
/// model, so they exercise exactly what a human would run.
pub fn parse_document(name: &str, text: &str) -> Result<ParsedDocument> {
    let malformed = |detail: String| BridgeError::Decode {
        entity: format!("feature document {name}"),
        detail,
    };

    let mut feature = None;
    let mut background = Vec::new();
    let mut scenarios: Vec<ParsedScenario> = Vec::new();
    let mut section = Section::Preamble;

    for (number, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(title) = line.strip_prefix("Feature:") {
            feature = Some(title.trim().to_string());
        } else if line == "Background:" {
            section = Section::Background;
        } else if let Some(title) = line.strip_prefix("Scenario Outline:") {
            scenarios.push(ParsedScenario {
                title: title.trim().to_string(),
                outline: true,
                steps: Vec::new(),
            });
            section = Section::Scenario;
        } else if let Some(title) = line.strip_prefix("Scenario:") {
            scenarios.push(ParsedScenario {
                title: title.trim().to_string(),
                outline: false,
                steps: Vec::new(),
            });
            section = Section::Scenario;
        } else if line == "Examples:" {
            section = Section::Examples;
        } else if line.starts_with('|') {
            if section != Section::Examples {
                return Err(malformed(format!("table row outside Examples (line {})", number + 1)));
            }
        } else {
            let step = Step::parse(line)
                .ok_or_else(|| malformed(format!("unparseable line {}: {line:?}", number + 1)))?;
            let parsed = ParsedStep {
                keyword: step.keyword,
                text: step.text,
            };
            match section {
                Section::Background => background.push(parsed),
                Section::Scenario => match scenarios.last_mut() {
                    Some(scenario) => scenario.steps.push(parsed),
                    None => {
                        return Err(malformed(format!("step before any scenario (line {})", number + 1)))
                    }
                },
                Section::Preamble | Section::Examples => {
                    return Err(malformed(format!("step outside a scenario (line {})", number + 1)))
                }
            }
        }
    }

    Ok(ParsedDocument {
        feature: feature.ok_or_else(|| malformed("missing Feature: header".to_string()))?,
        background,
        scenarios,
    })
}
