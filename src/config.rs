//! Process configuration passed explicitly into each phase.
//!
//! Phases validate what they need at their own start; nothing here is
//! ambient or mutable once the pipeline is running.

use std::path::{Path, PathBuf};

use crate::error::{BridgeError, Result};

/// Connection and layout settings for one conversion run.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Base URL of the test-management organization.
    pub organization_url: String,
    /// Access token; sent as a Basic credential with an empty username.
    pub token: String,
    /// Project that scopes plans and the shared repositories.
    pub project: Option<String>,
    /// Plan to convert.
    pub plan_id: Option<u32>,
    /// Directory receiving feature documents and runner stubs.
    pub out_dir: PathBuf,
    /// Directory holding fixture binding files, when validation is wanted.
    pub fixtures_dir: Option<PathBuf>,
}

impl BridgeConfig {
    pub fn new(organization_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            organization_url: organization_url.into(),
            token: token.into(),
            project: None,
            plan_id: None,
            out_dir: PathBuf::from("features"),
            fixtures_dir: None,
        }
    }

    /// Plan identifier and project, required before populate can fetch.
    pub fn require_plan(&self) -> Result<(u32, &str)> {
        if self.organization_url.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "organization URL is not set".to_string(),
            ));
        }
        let project = self
            .project
            .as_deref()
            .filter(|project| !project.trim().is_empty())
            .ok_or_else(|| BridgeError::Configuration("project is not set".to_string()))?;
        let plan_id = self
            .plan_id
            .ok_or_else(|| BridgeError::Configuration("plan id is not set".to_string()))?;
        Ok((plan_id, project))
    }

    /// Fixtures directory, required before runner validation.
    pub fn require_fixtures(&self) -> Result<&Path> {
        self.fixtures_dir
            .as_deref()
            .ok_or_else(|| BridgeError::Configuration("fixtures directory is not set".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_plan_is_a_configuration_error() {
        let config = BridgeConfig::new("https://example.test/org", "token");
        assert!(matches!(
            config.require_plan(),
            Err(BridgeError::Configuration(_))
        ));
    }

    #[test]
    fn project_without_plan_id_still_fails() {
        let mut config = BridgeConfig::new("https://example.test/org", "token");
        config.project = Some("proj".to_string());
        assert!(matches!(
            config.require_plan(),
            Err(BridgeError::Configuration(_))
        ));
    }

    #[test]
    fn fully_configured_plan_passes() {
        let mut config = BridgeConfig::new("https://example.test/org", "token");
        config.project = Some("proj".to_string());
        config.plan_id = Some(7);
        let (plan_id, project) = config.require_plan().expect("configured");
        assert_eq!(plan_id, 7);
        assert_eq!(project, "proj");
    }
}
