//! Caller-visible error taxonomy for the conversion pipeline.
//!
//! Every failure aborts its phase atomically; no partial plan, document set,
//! or runner set is left behind for downstream phases to observe.

use thiserror::Error;

use crate::validate::BindingIssue;

/// Errors surfaced by the populate/synthesize/generate/validate phases.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Required configuration is missing before a phase could run.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The fetched plan has no suites.
    #[error("test plan {plan_id} has no suites")]
    EmptyPlan { plan_id: u32 },

    /// A step's text does not start with a recognized Gherkin keyword.
    #[error("invalid step in {entity}: {text:?} does not start with a step keyword")]
    Grammar { entity: String, text: String },

    /// A declared parameter has no value rows, or a scenario declares local
    /// and shared parameters at the same time.
    #[error("parameter declaration error in {entity}: {detail}")]
    ParameterDeclaration { entity: String, detail: String },

    /// An upstream artifact (persisted documents, populated model) does not
    /// exist yet.
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    /// One or more runner steps resolved to zero or multiple fixtures.
    #[error("{} runner step(s) without exactly one fixture binding", .issues.len())]
    Validation { issues: Vec<BindingIssue> },

    /// The fetch collaborator failed underneath us.
    #[error("transport error: {0}")]
    Transport(String),

    /// An embedded markup payload is malformed under the closed schema, or a
    /// shared reference does not resolve against the plan repositories.
    #[error("malformed payload in {entity}: {detail}")]
    Decode { entity: String, detail: String },

    /// Reading or writing a produced artifact failed.
    #[error("io error on {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl BridgeError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
