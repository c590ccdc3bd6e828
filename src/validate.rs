//! Fixture Validator: cross-references persisted runner stubs against the
//! fixture registry.
//!
//! Reads only; safe to call any number of times. Every step a runner drives
//! must resolve to exactly one fixture, otherwise it is reported.

use std::collections::BTreeSet;
use std::path::Path;

use regex::Regex;

use crate::error::{BridgeError, Result};
use crate::fixtures::FixtureRegistry;
use crate::persist;

/// A runner step that resolved to zero or multiple fixtures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingIssue {
    /// Runner file the step came from.
    pub runner: String,
    /// Step text after stripping the leading keyword.
    pub step_text: String,
    /// Number of fixtures that matched (0 or ≥2).
    pub matches: usize,
}

impl std::fmt::Display for BindingIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.matches {
            0 => write!(f, "{}: no fixture matches {:?}", self.runner, self.step_text),
            n => write!(
                f,
                "{}: {n} fixtures match {:?}",
                self.runner, self.step_text
            ),
        }
    }
}

/// Check every step of every persisted runner against the registry.
pub fn collect_issues(out_dir: &Path, registry: &FixtureRegistry) -> Result<Vec<BindingIssue>> {
    let runners = persist::read_runners(out_dir)?;
    let step_call =
        Regex::new(r#"harness\.step\("(?:Given|When|Then|And|But)", "((?:[^"\\]|\\.)*)"\);"#)
            .map_err(|err| BridgeError::Configuration(format!("runner step pattern: {err}")))?;

    let mut issues = Vec::new();
    for (runner, text) in &runners {
        let mut seen = BTreeSet::new();
        for captures in step_call.captures_iter(text) {
            let step_text = unescape(&captures[1]);
            if !seen.insert(step_text.clone()) {
                continue;
            }
            let matched = registry.matches(&step_text).len();
            if matched != 1 {
                issues.push(BindingIssue {
                    runner: runner.clone(),
                    step_text,
                    matches: matched,
                });
            }
        }
    }
    tracing::info!(
        runners = runners.len(),
        issues = issues.len(),
        "validated runners against fixture registry"
    );
    Ok(issues)
}

/// Reverse the `{:?}` escaping the generator applied to step text.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RunnerStub;

    fn write_runner(dir: &Path, text: &str) {
        persist::write_runners(
            dir,
            &[RunnerStub {
                file_name: "suite.rs".to_string(),
                module: "suite".to_string(),
                text: text.to_string(),
            }],
        )
        .expect("write runner");
    }

    #[test]
    fn reports_unbound_and_ambiguous_steps_once_each() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_runner(
            dir.path(),
            r#"
#[test]
fn scenario() {
    let mut harness = StepHarness::open("suite.feature", "Scenario");
    harness.step("Given", "a bound step");
    harness.step("When", "a non shared step");
    harness.step("When", "a non shared step");
    harness.step("Then", "an ambiguous step");
    harness.verify();
}
"#,
        );

        let mut registry = FixtureRegistry::new();
        registry.insert("a bound step", "bound");
        registry.insert("an ambiguous step", "first");
        registry.insert("an ambiguous step", "second");

        let issues = collect_issues(dir.path(), &registry).expect("collect");
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].step_text, "a non shared step");
        assert_eq!(issues[0].matches, 0);
        assert_eq!(issues[1].step_text, "an ambiguous step");
        assert_eq!(issues[1].matches, 2);
    }

    #[test]
    fn validation_is_repeatable() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_runner(dir.path(), r#"    harness.step("Given", "a bound step");"#);
        let mut registry = FixtureRegistry::new();
        registry.insert("a bound step", "bound");
        assert!(collect_issues(dir.path(), &registry)
            .expect("first")
            .is_empty());
        assert!(collect_issues(dir.path(), &registry)
            .expect("second")
            .is_empty());
    }

    #[test]
    fn missing_runners_are_an_artifact_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = FixtureRegistry::new();
        assert!(matches!(
            collect_issues(dir.path(), &registry),
            Err(BridgeError::ArtifactNotFound(_))
        ));
    }
}
