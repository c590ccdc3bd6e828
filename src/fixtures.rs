//! Fixture registry: step-text patterns mapped to implementation bindings.
//!
//! The registry is supplied by the caller's environment. The directory
//! loader scans fixture source files for `#[given("…")]` / `#[when("…")]` /
//! `#[then("…")]` attribute bindings; tests and embedders can also build a
//! registry in memory.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::{BridgeError, Result};

/// One registered fixture implementation.
#[derive(Debug, Clone)]
pub struct FixtureBinding {
    pub pattern: String,
    pub function: String,
    pub file: String,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    /// Byte-equal match.
    Literal,
    /// Pattern with `{name}` placeholders, compiled to an anchored regex.
    Placeholder(Regex),
    /// Explicit `regex = "…"` binding, anchored as written.
    Explicit(Regex),
}

/// Enumerable mapping from step-text pattern to implementation binding.
#[derive(Debug, Default)]
pub struct FixtureRegistry {
    bindings: Vec<FixtureBinding>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a fixtures directory for attribute bindings.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(BridgeError::ArtifactNotFound(format!(
                "fixtures directory {} does not exist",
                dir.display()
            )));
        }
        let attribute = Regex::new(
            r#"#\[\s*(given|when|then)\s*\(\s*(regex\s*=\s*)?(r#*)?"((?:[^"\\]|\\.)*)"\s*#*\)\s*\]"#,
        )
        .map_err(|err| BridgeError::Configuration(format!("fixture attribute pattern: {err}")))?;
        let function = Regex::new(r"fn\s+([A-Za-z_][A-Za-z0-9_]*)")
            .map_err(|err| BridgeError::Configuration(format!("fixture fn pattern: {err}")))?;

        let entries = fs::read_dir(dir).map_err(|err| BridgeError::io(dir, err))?;
        let mut paths: Vec<_> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "rs"))
            .collect();
        paths.sort();

        let mut registry = Self::new();
        for path in paths {
            let content = fs::read_to_string(&path).map_err(|err| BridgeError::io(&path, err))?;
            let file = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            for captures in attribute.captures_iter(&content) {
                let is_regex = captures.get(2).is_some();
                let raw_literal = captures.get(3).is_some();
                let pattern = if raw_literal {
                    captures[4].to_string()
                } else {
                    unescape(&captures[4])
                };
                let after = &content[captures.get(0).map_or(0, |m| m.end())..];
                let name = function
                    .captures(after)
                    .map(|fn_captures| fn_captures[1].to_string())
                    .unwrap_or_else(|| "<unnamed>".to_string());
                registry.push(&pattern, &name, &file, is_regex);
            }
        }
        tracing::debug!(
            dir = %dir.display(),
            bindings = registry.bindings.len(),
            "loaded fixture registry"
        );
        Ok(registry)
    }

    /// Register a binding without a backing file.
    pub fn insert(&mut self, pattern: &str, function: &str) {
        self.push(pattern, function, "<memory>", false);
    }

    fn push(&mut self, pattern: &str, function: &str, file: &str, is_regex: bool) {
        self.bindings.push(FixtureBinding {
            pattern: pattern.to_string(),
            function: function.to_string(),
            file: file.to_string(),
            matcher: compile_matcher(pattern, is_regex),
        });
    }

    /// All bindings whose pattern matches the stripped step text.
    pub fn matches(&self, step_text: &str) -> Vec<&FixtureBinding> {
        self.bindings
            .iter()
            .filter(|binding| match &binding.matcher {
                Matcher::Literal => binding.pattern == step_text,
                Matcher::Placeholder(regex) | Matcher::Explicit(regex) => {
                    regex.is_match(step_text)
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Compile a pattern: placeholders like `{word}` consume one non-empty run;
/// `regex =` bindings anchor the pattern as written.
fn compile_matcher(pattern: &str, is_regex: bool) -> Matcher {
    if is_regex {
        let anchored = format!("^(?:{pattern})$");
        return match Regex::new(&anchored) {
            Ok(regex) => Matcher::Explicit(regex),
            Err(_) => Matcher::Literal,
        };
    }
    if !pattern.contains('{') {
        return Matcher::Literal;
    }
    let mut regex_source = String::from("^");
    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        let Some(close_offset) = rest[open..].find('}') else {
            break;
        };
        regex_source.push_str(&regex::escape(&rest[..open]));
        regex_source.push_str("(.+?)");
        rest = &rest[open + close_offset + 1..];
    }
    regex_source.push_str(&regex::escape(rest));
    regex_source.push('$');
    match Regex::new(&regex_source) {
        Ok(regex) => Matcher::Placeholder(regex),
        // An unbalanced placeholder falls back to a literal pattern.
        Err(_) => Matcher::Literal,
    }
}

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

    #[test]
    fn literal_patterns_match_exactly_once() {
        let mut registry = FixtureRegistry::new();
        registry.insert("a shared step", "a_shared_step");
        registry.insert("another step", "another");
        assert_eq!(registry.matches("a shared step").len(), 1);
        assert!(registry.matches("a missing step").is_empty());
    }

    #[test]
    fn placeholder_patterns_consume_tokens() {
        let mut registry = FixtureRegistry::new();
        registry.insert("exactly {count} items", "count_items");
        assert_eq!(registry.matches("exactly 3 items").len(), 1);
        assert!(registry.matches("exactly items").is_empty());

        let mut catch_all = FixtureRegistry::new();
        catch_all.insert("{value}", "any_value");
        assert_eq!(catch_all.matches("<MultiValueParameter>").len(), 1);
    }

    #[test]
    fn duplicate_patterns_are_both_reported() {
        let mut registry = FixtureRegistry::new();
        registry.insert("a step", "first");
        registry.insert("a step", "second");
        assert_eq!(registry.matches("a step").len(), 2);
    }

    #[test]
    fn scans_attribute_bindings_from_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("steps.rs"),
            r##"
use crate::support::World;

#[given("a shared step")]
fn a_shared_step(world: &mut World) {
    world.note("shared");
}

#[then(regex = r"exactly (\d+) items")]
fn exactly_items(world: &mut World) {}
"##,
        )
        .expect("write fixture file");

        let registry = FixtureRegistry::from_dir(dir.path()).expect("scan");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.matches("a shared step").len(), 1);
        let binding = registry.matches("a shared step")[0];
        assert_eq!(binding.function, "a_shared_step");
        assert_eq!(binding.file, "steps.rs");
        assert_eq!(registry.matches("exactly 12 items").len(), 1);
        assert!(registry.matches("exactly twelve items").is_empty());
    }

    #[test]
    fn missing_directory_is_an_artifact_error() {
        let missing = std::env::temp_dir().join("testplan-bdd-no-fixtures");
        assert!(matches!(
            FixtureRegistry::from_dir(&missing),
            Err(BridgeError::ArtifactNotFound(_))
        ));
    }
}
