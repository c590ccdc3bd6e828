//! Shared test infrastructure: an in-memory plan source seeded with the
//! reference plans, plus fixture-directory helpers.

use std::collections::BTreeMap;
use std::path::Path;

use testplan_bdd::config::BridgeConfig;
use testplan_bdd::error::{BridgeError, Result};
use testplan_bdd::markup::{self, StepItem};
use testplan_bdd::model::{LocalTable, ParameterSet, SharedBinding};
use testplan_bdd::source::{
    PlanSource, RawCase, RawSharedParameterSet, RawSharedStep, RawSuite,
};
use testplan_bdd::PlanBridge;

pub const PROJECT: &str = "reference";

pub const EMPTY_PLAN: u32 = 100;
pub const NON_EMPTY_PLAN: u32 = 101;
pub const SHARED_PLAN: u32 = 102;
pub const NON_SHARED_PARAMS_PLAN: u32 = 103;
pub const INVALID_GHERKIN_PLAN: u32 = 104;
pub const EMPTY_PARAMETERS_PLAN: u32 = 105;

pub const SHARED_STEP: u32 = 201;
pub const SINGLE_SHARED_STEP: u32 = 202;
pub const LONGER_SHARED_STEP: u32 = 203;
pub const SHARED_PARAMETERS_1: u32 = 301;

pub struct SeedPlan {
    pub title: String,
    pub suites: Vec<(RawSuite, Vec<RawCase>)>,
}

/// In-memory stand-in for the fetch collaborator.
#[derive(Default)]
pub struct InMemorySource {
    pub plans: BTreeMap<u32, SeedPlan>,
    pub shared_steps: Vec<RawSharedStep>,
    pub shared_parameter_sets: Vec<RawSharedParameterSet>,
}

impl PlanSource for InMemorySource {
    fn plan_title(&self, _project: &str, plan_id: u32) -> Result<String> {
        self.plans
            .get(&plan_id)
            .map(|plan| plan.title.clone())
            .ok_or_else(|| BridgeError::Configuration(format!("plan {plan_id} not found")))
    }

    fn suites(&self, _project: &str, plan_id: u32) -> Result<Vec<RawSuite>> {
        let plan = self
            .plans
            .get(&plan_id)
            .ok_or_else(|| BridgeError::Configuration(format!("plan {plan_id} not found")))?;
        Ok(plan.suites.iter().map(|(suite, _)| suite.clone()).collect())
    }

    fn cases(&self, _project: &str, plan_id: u32, suite_id: u32) -> Result<Vec<RawCase>> {
        let plan = self
            .plans
            .get(&plan_id)
            .ok_or_else(|| BridgeError::Configuration(format!("plan {plan_id} not found")))?;
        plan.suites
            .iter()
            .find(|(suite, _)| suite.id == suite_id)
            .map(|(_, cases)| cases.clone())
            .ok_or_else(|| BridgeError::Configuration(format!("suite {suite_id} not found")))
    }

    fn shared_steps(&self, _project: &str) -> Result<Vec<RawSharedStep>> {
        Ok(self.shared_steps.clone())
    }

    fn shared_parameter_sets(&self, _project: &str) -> Result<Vec<RawSharedParameterSet>> {
        Ok(self.shared_parameter_sets.clone())
    }
}

fn steps_payload(steps: &[&str], shared_refs: &[u32]) -> Option<String> {
    if steps.is_empty() && shared_refs.is_empty() {
        return None;
    }
    let mut items: Vec<StepItem> = steps
        .iter()
        .map(|step| StepItem::Action((*step).to_string()))
        .collect();
    items.extend(shared_refs.iter().map(|id| StepItem::SharedRef(*id)));
    Some(markup::encode_steps(&items))
}

pub fn case(id: u32, title: &str, steps: &[&str], shared_refs: &[u32]) -> RawCase {
    RawCase {
        id,
        title: title.to_string(),
        steps_xml: steps_payload(steps, shared_refs),
        parameters_xml: None,
        local_data_source: None,
    }
}

pub fn case_with_local_params(
    id: u32,
    title: &str,
    steps: &[&str],
    params: &[(&str, &[&str])],
) -> RawCase {
    let names: Vec<String> = params.iter().map(|(name, _)| (*name).to_string()).collect();
    let row_count = params
        .iter()
        .map(|(_, values)| values.len())
        .max()
        .unwrap_or(0);
    let rows: Vec<Vec<String>> = (0..row_count)
        .map(|row| {
            params
                .iter()
                .map(|(_, values)| values.get(row).map_or_else(String::new, |v| (*v).to_string()))
                .collect()
        })
        .collect();
    let payload = markup::encode_parameters(&ParameterSet::Local(LocalTable { names, rows }))
        .expect("local parameter payload");
    let mut raw = case(id, title, steps, &[]);
    raw.parameters_xml = Some(payload.names_xml);
    raw.local_data_source = Some(payload.data);
    raw
}

pub fn case_with_shared_params(
    id: u32,
    title: &str,
    steps: &[&str],
    shared_refs: &[u32],
    bindings: &[(&str, &str, u32)],
) -> RawCase {
    let bindings: Vec<SharedBinding> = bindings
        .iter()
        .map(|(local, set_name, set_id)| SharedBinding {
            local_name: (*local).to_string(),
            set_name: (*set_name).to_string(),
            set_id: *set_id,
        })
        .collect();
    let payload =
        markup::encode_parameters(&ParameterSet::Shared(bindings)).expect("shared payload");
    let mut raw = case(id, title, steps, shared_refs);
    raw.parameters_xml = Some(payload.names_xml);
    raw.local_data_source = Some(payload.data);
    raw
}

fn shared_step(id: u32, title: &str, lines: Option<&[&str]>) -> RawSharedStep {
    RawSharedStep {
        id,
        title: title.to_string(),
        steps_xml: lines.and_then(|lines| steps_payload(lines, &[])),
    }
}

fn shared_parameter_set(id: u32, title: &str, columns: &[(&str, &[&str])]) -> RawSharedParameterSet {
    let names: Vec<String> = columns.iter().map(|(name, _)| (*name).to_string()).collect();
    let row_count = columns
        .iter()
        .map(|(_, values)| values.len())
        .max()
        .unwrap_or(0);
    let rows: Vec<BTreeMap<String, String>> = (0..row_count)
        .map(|row| {
            columns
                .iter()
                .filter_map(|(name, values)| {
                    values
                        .get(row)
                        .map(|value| ((*name).to_string(), (*value).to_string()))
                })
                .collect()
        })
        .collect();
    RawSharedParameterSet {
        id,
        title: title.to_string(),
        payload: Some(markup::encode_parameter_set(&names, &rows)),
    }
}

/// The reference plans the original service was seeded with.
pub fn seeded_source() -> InMemorySource {
    let mut plans = BTreeMap::new();

    plans.insert(
        EMPTY_PLAN,
        SeedPlan {
            title: "empty".to_string(),
            suites: Vec::new(),
        },
    );

    plans.insert(
        NON_EMPTY_PLAN,
        SeedPlan {
            title: "non-empty".to_string(),
            suites: vec![
                (
                    RawSuite {
                        id: 10,
                        title: "Background with Shared Steps".to_string(),
                    },
                    vec![
                        case(1001, "Background", &[], &[SHARED_STEP]),
                        case(
                            1002,
                            "Scenario for Background with a Shared Step",
                            &["Given the background has a shared step"],
                            &[],
                        ),
                    ],
                ),
                (
                    RawSuite {
                        id: 11,
                        title: "Background Suite".to_string(),
                    },
                    vec![
                        case(1003, "Background", &["Given the background"], &[]),
                        case(
                            1004,
                            "Scenario with a Background",
                            &["Given a background has already occurred"],
                            &[],
                        ),
                    ],
                ),
                (
                    RawSuite {
                        id: 12,
                        title: "Normal Suite".to_string(),
                    },
                    vec![case(
                        1005,
                        "Scenario A",
                        &["Given Hello", "When World", "Then !"],
                        &[],
                    )],
                ),
            ],
        },
    );

    plans.insert(
        SHARED_PLAN,
        SeedPlan {
            title: "shared-steps-and-shared-parameters".to_string(),
            suites: vec![(
                RawSuite {
                    id: 20,
                    title: "Shared Steps and Shared Params Suite".to_string(),
                },
                vec![
                    case_with_shared_params(
                        2001,
                        "Shared Param and Shared Step Scenario",
                        &["When a non shared step", "Then @Parameter1"],
                        &[SHARED_STEP],
                        &[("Parameter1", "Shared Parameters 1", SHARED_PARAMETERS_1)],
                    ),
                    case(2002, "Longer Shared Step Scenario", &[], &[LONGER_SHARED_STEP]),
                    case_with_shared_params(
                        2003,
                        "Multi-Value Shared Param Scenario",
                        &["Given @MultiValueParameter"],
                        &[],
                        &[(
                            "MultiValueParameter",
                            "Shared Parameters 1",
                            SHARED_PARAMETERS_1,
                        )],
                    ),
                    case_with_shared_params(
                        2004,
                        "Multiple Multi-Value Shared Param Scenario",
                        &["Given @MultiValueParameter and @AnotherMultiValueParameter"],
                        &[],
                        &[
                            (
                                "MultiValueParameter",
                                "Shared Parameters 1",
                                SHARED_PARAMETERS_1,
                            ),
                            (
                                "AnotherMultiValueParameter",
                                "Shared Parameters 1",
                                SHARED_PARAMETERS_1,
                            ),
                        ],
                    ),
                    case(
                        2005,
                        "Scenario with a Single Shared Step",
                        &[],
                        &[SINGLE_SHARED_STEP],
                    ),
                ],
            )],
        },
    );

    plans.insert(
        NON_SHARED_PARAMS_PLAN,
        SeedPlan {
            title: "non-shared-parameters".to_string(),
            suites: vec![(
                RawSuite {
                    id: 30,
                    title: "Non-Shared Param Suite".to_string(),
                },
                vec![
                    case_with_local_params(
                        3001,
                        "Non-shared Param Scenario",
                        &["Given @NonSharedParameter1"],
                        &[("NonSharedParameter1", &["this is a non-shared parameter"])],
                    ),
                    case_with_local_params(
                        3002,
                        "Multi-Value Non-Shared Param Scenario",
                        &["Given @MultiValueNonSharedParameter"],
                        &[("MultiValueNonSharedParameter", &["one", "two", "three", "4"])],
                    ),
                    case_with_local_params(
                        3003,
                        "Multiple Multi-Value Non-Shared Parameter Scenario",
                        &["Given @MultiValueNonSharedParameterOne and @MultiValueNonSharedParameterTwo"],
                        &[
                            ("MultiValueNonSharedParameterOne", &["1", "2", "3", "4"]),
                            ("MultiValueNonSharedParameterTwo", &["5", "6", "7", "8"]),
                        ],
                    ),
                ],
            )],
        },
    );

    plans.insert(
        INVALID_GHERKIN_PLAN,
        SeedPlan {
            title: "invalid-gherkin".to_string(),
            suites: vec![(
                RawSuite {
                    id: 40,
                    title: "invalid steps".to_string(),
                },
                vec![case(
                    4001,
                    "Scenario where steps don't follow Given-When-Then Syntax Rules",
                    &["This is not a valid gherkin step"],
                    &[],
                )],
            )],
        },
    );

    plans.insert(
        EMPTY_PARAMETERS_PLAN,
        SeedPlan {
            title: "empty-parameters".to_string(),
            suites: vec![(
                RawSuite {
                    id: 50,
                    title: "empty non-shared parameter suite".to_string(),
                },
                vec![case_with_local_params(
                    5001,
                    "Scenario with valid param name but param is empty",
                    &["Given a valid but empty @Parameter1"],
                    &[("Parameter1", &[])],
                )],
            )],
        },
    );

    InMemorySource {
        plans,
        shared_steps: vec![
            shared_step(SHARED_STEP, "Given a shared step", None),
            shared_step(
                SINGLE_SHARED_STEP,
                "Given a single step shared step",
                Some(&["Given the single step shared step is different than the title"]),
            ),
            shared_step(
                LONGER_SHARED_STEP,
                "Given a longer shared step",
                Some(&[
                    "Given Longer Shared Step 1",
                    "Given Longer Shared Step 2",
                    "Given Longer Shared Step 3",
                ]),
            ),
        ],
        shared_parameter_sets: vec![shared_parameter_set(
            SHARED_PARAMETERS_1,
            "Shared Parameters 1",
            &[
                ("Parameter1", &["1"]),
                ("MultiValueParameter", &["5", "6", "7", "8"]),
                (
                    "AnotherMultiValueParameter",
                    &["one", "two", "three", "four"],
                ),
            ],
        )],
    }
}

/// A bridge over the seeded source, configured for one plan and out dir.
pub fn bridge_for(plan_id: u32, out_dir: &Path) -> PlanBridge<InMemorySource> {
    let mut config = BridgeConfig::new("https://example.test/org", "token");
    config.project = Some(PROJECT.to_string());
    config.plan_id = Some(plan_id);
    config.out_dir = out_dir.to_path_buf();
    PlanBridge::new(config, seeded_source())
}

/// Write one fixture file binding each pattern literally.
pub fn write_fixture_dir(dir: &Path, patterns: &[&str]) {
    let mut content = String::from("use crate::support::World;\n");
    for (index, pattern) in patterns.iter().enumerate() {
        content.push_str(&format!(
            "\n#[given({pattern:?})]\nfn fixture_{index}(_world: &mut World) {{}}\n"
        ));
    }
    std::fs::create_dir_all(dir).expect("create fixtures dir");
    std::fs::write(dir.join("steps.rs"), content).expect("write fixtures file");
}

/// Every step text the shared-plan runners drive.
pub const SHARED_PLAN_FIXTURES: &[&str] = &[
    "a shared step",
    "a non shared step",
    "<Parameter1>",
    "Longer Shared Step 1",
    "Longer Shared Step 2",
    "Longer Shared Step 3",
    "<MultiValueParameter>",
    "<MultiValueParameter> and <AnotherMultiValueParameter>",
    "the single step shared step is different than the title",
];
