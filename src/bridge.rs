//! Pipeline orchestrator: populate → synthesize → generate → validate.
//!
//! One `PlanBridge` owns one configuration and at most one populated model.
//! Phases run sequentially; each validates its own preconditions and fails
//! atomically, so a later phase never observes a half-built artifact.

use std::path::PathBuf;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::feature;
use crate::fixtures::FixtureRegistry;
use crate::graph::{self, UsageGraph};
use crate::model::TestPlan;
use crate::persist;
use crate::populate;
use crate::runner;
use crate::source::PlanSource;
use crate::validate;

/// Converts one test plan into feature documents, runners, and reports.
pub struct PlanBridge<S> {
    config: BridgeConfig,
    source: S,
    plan: Option<TestPlan>,
}

impl<S: PlanSource> PlanBridge<S> {
    pub fn new(config: BridgeConfig, source: S) -> Self {
        Self {
            config,
            source,
            plan: None,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The canonical model, when populate has succeeded.
    pub fn plan(&self) -> Option<&TestPlan> {
        self.plan.as_ref()
    }

    /// Fetch the configured plan and build the canonical model.
    ///
    /// Replaces any previously populated model; there is no incremental
    /// update.
    pub fn populate(&mut self) -> Result<&TestPlan> {
        let plan = populate::populate(&self.config, &self.source)?;
        Ok(self.plan.insert(plan))
    }

    /// Synthesize one feature document per suite and persist them.
    pub fn write_feature_files(&self) -> Result<Vec<PathBuf>> {
        let plan = self.require_plan()?;
        let documents = feature::synthesize(plan)?;
        let written = persist::write_documents(&self.config.out_dir, &documents)?;
        tracing::info!(documents = written.len(), "wrote feature documents");
        Ok(written)
    }

    /// Generate one runner stub per persisted document and persist them.
    ///
    /// Reads the documents back from the output directory; fails when they
    /// have not been written yet.
    pub fn write_runners(&self) -> Result<Vec<PathBuf>> {
        let runners = runner::generate(&self.config.out_dir)?;
        persist::write_runners(&self.config.out_dir, &runners)
    }

    /// Validate persisted runners against the configured fixtures directory.
    pub fn validate_runners(&self) -> Result<()> {
        let fixtures_dir = self.config.require_fixtures()?;
        let registry = FixtureRegistry::from_dir(fixtures_dir)?;
        self.validate_runners_against(&registry)
    }

    /// Validate persisted runners against an explicit registry.
    pub fn validate_runners_against(&self, registry: &FixtureRegistry) -> Result<()> {
        let issues = validate::collect_issues(&self.config.out_dir, registry)?;
        if issues.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::Validation { issues })
        }
    }

    /// Build the reuse graph for the populated model.
    pub fn usage_graph(&self) -> Result<UsageGraph> {
        Ok(graph::build(self.require_plan()?))
    }

    fn require_plan(&self) -> Result<&TestPlan> {
        self.plan
            .as_ref()
            .ok_or_else(|| BridgeError::Configuration("populate has not run".to_string()))
    }
}
