//! Domain Model Builder: raw records plus decoded markup in, canonical
//! `TestPlan` out.
//!
//! Repositories are built first, scenario references resolved second, so a
//! dangling name fails deterministically. Grammar, empty-plan, and parameter
//! checks run during ingest; any violation aborts the whole pass and no
//! partial model escapes.

use std::collections::BTreeMap;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::markup::{self, DecodedSource, MarkupError, StepItem};
use crate::model::{
    Background, LocalTable, ParameterSet, Scenario, ScenarioEntry, SharedParameterSet, SharedStep,
    Step, Suite, TestPlan,
};
use crate::source::{PlanSource, RawCase};

/// Title marking a test case as its suite's background.
const BACKGROUND_TITLE: &str = "Background";

/// Fetch and build the canonical model for the configured plan.
pub fn populate(config: &BridgeConfig, source: &dyn PlanSource) -> Result<TestPlan> {
    let (plan_id, project) = config.require_plan()?;

    // Repositories first: scenarios resolve against them.
    let shared_steps = build_shared_steps(source, project)?;
    let shared_parameters = build_shared_parameters(source, project)?;

    let title = source.plan_title(project, plan_id)?;
    let raw_suites = source.suites(project, plan_id)?;
    if raw_suites.is_empty() {
        return Err(BridgeError::EmptyPlan { plan_id });
    }

    let mut suites = Vec::with_capacity(raw_suites.len());
    for raw_suite in raw_suites {
        let mut background = None;
        let mut scenarios = Vec::new();
        for case in source.cases(project, plan_id, raw_suite.id)? {
            let entity = format!("test case {} {:?}", case.id, case.title);
            let entries = build_entries(&case, &entity, &shared_steps)?;
            if case.title == BACKGROUND_TITLE {
                background = Some(Background { entries });
                continue;
            }
            let parameters = build_parameters(&case, &entity, &shared_parameters)?;
            scenarios.push(Scenario {
                id: case.id,
                title: case.title,
                entries,
                parameters,
            });
        }
        suites.push(Suite {
            id: raw_suite.id,
            title: raw_suite.title,
            background,
            scenarios,
        });
    }

    tracing::info!(
        plan_id,
        suites = suites.len(),
        shared_steps = shared_steps.len(),
        shared_parameter_sets = shared_parameters.len(),
        "populated test plan"
    );

    Ok(TestPlan {
        id: plan_id,
        title,
        suites,
        shared_steps,
        shared_parameters,
    })
}

fn decode_error(entity: &str, err: MarkupError) -> BridgeError {
    BridgeError::Decode {
        entity: entity.to_string(),
        detail: err.to_string(),
    }
}

fn parse_step(entity: &str, line: &str) -> Result<Step> {
    Step::parse(line).ok_or_else(|| BridgeError::Grammar {
        entity: entity.to_string(),
        text: line.to_string(),
    })
}

fn build_shared_steps(
    source: &dyn PlanSource,
    project: &str,
) -> Result<BTreeMap<u32, SharedStep>> {
    let mut repository = BTreeMap::new();
    for raw in source.shared_steps(project)? {
        let entity = format!("shared step {} {:?}", raw.id, raw.title);
        let lines = match raw.steps_xml.as_deref().filter(|xml| !xml.trim().is_empty()) {
            Some(payload) => {
                let items =
                    markup::decode_steps(payload).map_err(|err| decode_error(&entity, err))?;
                items
                    .into_iter()
                    .map(|item| match item {
                        StepItem::Action(text) => Ok(text),
                        StepItem::SharedRef(id) => Err(BridgeError::Decode {
                            entity: entity.clone(),
                            detail: format!("nested shared-step reference to {id}"),
                        }),
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            // Without a steps payload the title itself is the step line.
            None => vec![raw.title.clone()],
        };
        let steps = lines
            .iter()
            .map(|line| parse_step(&entity, line))
            .collect::<Result<Vec<_>>>()?;
        repository.insert(
            raw.id,
            SharedStep {
                id: raw.id,
                title: raw.title,
                steps,
            },
        );
    }
    Ok(repository)
}

fn build_shared_parameters(
    source: &dyn PlanSource,
    project: &str,
) -> Result<BTreeMap<u32, SharedParameterSet>> {
    let mut repository = BTreeMap::new();
    for raw in source.shared_parameter_sets(project)? {
        let entity = format!("shared parameter set {} {:?}", raw.id, raw.title);
        let payload = raw
            .payload
            .as_deref()
            .filter(|payload| !payload.trim().is_empty())
            .ok_or_else(|| BridgeError::Decode {
                entity: entity.clone(),
                detail: "missing parameterSet payload".to_string(),
            })?;
        let (names, rows) =
            markup::decode_parameter_set(payload).map_err(|err| decode_error(&entity, err))?;
        repository.insert(
            raw.id,
            SharedParameterSet {
                id: raw.id,
                name: raw.title,
                names,
                rows,
            },
        );
    }
    Ok(repository)
}

fn build_entries(
    case: &RawCase,
    entity: &str,
    shared_steps: &BTreeMap<u32, SharedStep>,
) -> Result<Vec<ScenarioEntry>> {
    let items = match case.steps_xml.as_deref().filter(|xml| !xml.trim().is_empty()) {
        Some(payload) => markup::decode_steps(payload).map_err(|err| decode_error(entity, err))?,
        None => Vec::new(),
    };
    items
        .into_iter()
        .map(|item| match item {
            StepItem::Action(text) => Ok(ScenarioEntry::Step(parse_step(entity, &text)?)),
            StepItem::SharedRef(id) => {
                if !shared_steps.contains_key(&id) {
                    return Err(BridgeError::Decode {
                        entity: entity.to_string(),
                        detail: format!("reference to unknown shared step {id}"),
                    });
                }
                Ok(ScenarioEntry::SharedStep(id))
            }
        })
        .collect()
}

fn build_parameters(
    case: &RawCase,
    entity: &str,
    shared_parameters: &BTreeMap<u32, SharedParameterSet>,
) -> Result<ParameterSet> {
    let decoded = markup::decode_parameters(
        case.parameters_xml.as_deref(),
        case.local_data_source.as_deref(),
    )
    .map_err(|err| decode_error(entity, err))?;

    if decoded.names.is_empty() {
        return Ok(ParameterSet::None);
    }

    match decoded.source {
        DecodedSource::SharedMap(bindings) => {
            // Declared names not covered by the map are local declarations
            // riding along with a shared reference.
            let unbound: Vec<&String> = decoded
                .names
                .iter()
                .filter(|name| {
                    !bindings
                        .iter()
                        .any(|binding| binding.local_name == **name)
                })
                .collect();
            if !unbound.is_empty() {
                return Err(BridgeError::ParameterDeclaration {
                    entity: entity.to_string(),
                    detail: format!(
                        "declares local parameter(s) {unbound:?} alongside a shared parameter set"
                    ),
                });
            }
            for binding in &bindings {
                let set = shared_parameters.get(&binding.set_id).ok_or_else(|| {
                    BridgeError::Decode {
                        entity: entity.to_string(),
                        detail: format!(
                            "reference to unknown shared parameter set {}",
                            binding.set_id
                        ),
                    }
                })?;
                // Columns share the local parameter's name; the set name only
                // scopes the lookup.
                let has_values = set
                    .rows
                    .iter()
                    .any(|row| row.contains_key(&binding.local_name));
                if !has_values {
                    return Err(BridgeError::ParameterDeclaration {
                        entity: entity.to_string(),
                        detail: format!(
                            "shared parameter {:?} has no value rows in set {}",
                            binding.local_name, set.name
                        ),
                    });
                }
            }
            Ok(ParameterSet::Shared(bindings))
        }
        DecodedSource::Table(rows) => {
            if rows.is_empty() {
                return Err(BridgeError::ParameterDeclaration {
                    entity: entity.to_string(),
                    detail: format!("parameter {:?} has no value rows", decoded.names[0]),
                });
            }
            Ok(ParameterSet::Local(LocalTable {
                names: decoded.names,
                rows,
            }))
        }
        DecodedSource::Empty => Err(BridgeError::ParameterDeclaration {
            entity: entity.to_string(),
            detail: format!("parameter {:?} has no value rows", decoded.names[0]),
        }),
    }
}
