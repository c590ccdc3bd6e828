//! Runner Generator: persisted documents to executable runner stubs.
//!
//! The generator reads the documents back from disk rather than consuming
//! the in-memory model, so a runner is always bound to the exact artifact a
//! human would run. One runner per document, one entry point per scenario;
//! the suite background is prepended to every entry point.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::error::Result;
use crate::feature::{self, ParsedDocument, ParsedStep};
use crate::persist::{self, sanitize_component};

/// A generated runner stub mirroring one feature document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerStub {
    pub file_name: String,
    pub module: String,
    pub text: String,
}

/// Generate one runner per persisted document under `out_dir`.
pub fn generate(out_dir: &Path) -> Result<Vec<RunnerStub>> {
    let documents = persist::read_documents(out_dir)?;
    let mut runners = Vec::with_capacity(documents.len());
    for (file_name, text) in &documents {
        let parsed = feature::parse_document(file_name, text)?;
        runners.push(render_runner(file_name, &parsed));
    }
    tracing::info!(runners = runners.len(), "generated runner stubs");
    Ok(runners)
}

fn render_runner(document_file: &str, parsed: &ParsedDocument) -> RunnerStub {
    let module = document_file
        .strip_suffix(".feature")
        .unwrap_or(document_file)
        .to_string();

    let mut text = String::new();
    let _ = writeln!(text, "//! Generated runner for feature {:?}.", parsed.feature);
    let _ = writeln!(
        text,
        "//! Source document: {document_file}. Regenerate instead of editing."
    );
    text.push('\n');
    text.push_str("use crate::support::StepHarness;\n");

    let mut used_names: BTreeMap<String, usize> = BTreeMap::new();
    for scenario in &parsed.scenarios {
        let entry_point = entry_point_name(&scenario.title, &mut used_names);
        text.push('\n');
        text.push_str("#[test]\n");
        let _ = writeln!(text, "fn {entry_point}() {{");
        let _ = writeln!(
            text,
            "    let mut harness = StepHarness::open({:?}, {:?});",
            document_file, scenario.title
        );
        for step in parsed.background.iter().chain(&scenario.steps) {
            let _ = writeln!(
                text,
                "    harness.step({:?}, {:?});",
                step_keyword(step),
                step.text
            );
        }
        text.push_str("    harness.verify();\n");
        text.push_str("}\n");
    }

    RunnerStub {
        file_name: format!("{module}.rs"),
        module,
        text,
    }
}

fn step_keyword(step: &ParsedStep) -> &'static str {
    step.keyword.as_str()
}

fn entry_point_name(title: &str, used: &mut BTreeMap<String, usize>) -> String {
    let mut base = sanitize_component(title);
    if base.starts_with(|ch: char| ch.is_ascii_digit()) {
        base.insert_str(0, "scenario_");
    }
    let count = used.entry(base.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        base
    } else {
        format!("{base}_{count}")
    }
}
