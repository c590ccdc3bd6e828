//! Fetch collaborator: raw plan records from the test-management service.
//!
//! The builder only sees this trait; the REST implementation below talks to
//! the service's work-item API with blocking request/response calls and no
//! internal retry. Not-found and auth failures surface as configuration
//! errors, everything else as transport errors.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};

/// Suite record as returned by the service.
#[derive(Debug, Clone)]
pub struct RawSuite {
    pub id: u32,
    pub title: String,
}

/// Test-case record with its embedded markup payload fields.
#[derive(Debug, Clone, Default)]
pub struct RawCase {
    pub id: u32,
    pub title: String,
    pub steps_xml: Option<String>,
    pub parameters_xml: Option<String>,
    pub local_data_source: Option<String>,
}

/// Shared-step work item; a missing steps payload means the title itself is
/// the single step line.
#[derive(Debug, Clone)]
pub struct RawSharedStep {
    pub id: u32,
    pub title: String,
    pub steps_xml: Option<String>,
}

/// Shared-parameter-set work item with its definition payload.
#[derive(Debug, Clone)]
pub struct RawSharedParameterSet {
    pub id: u32,
    pub title: String,
    pub payload: Option<String>,
}

/// The external fetch collaborator consumed by the Domain Model Builder.
pub trait PlanSource {
    fn plan_title(&self, project: &str, plan_id: u32) -> Result<String>;
    fn suites(&self, project: &str, plan_id: u32) -> Result<Vec<RawSuite>>;
    fn cases(&self, project: &str, plan_id: u32, suite_id: u32) -> Result<Vec<RawCase>>;
    fn shared_steps(&self, project: &str) -> Result<Vec<RawSharedStep>>;
    fn shared_parameter_sets(&self, project: &str) -> Result<Vec<RawSharedParameterSet>>;
}

/// Work-item field carrying the ordered step payload.
pub const FIELD_STEPS: &str = "Microsoft.VSTS.TCM.Steps";
/// Work-item field carrying the declared parameter names.
pub const FIELD_PARAMETERS: &str = "Microsoft.VSTS.TCM.Parameters";
/// Work-item field carrying the parameter data payload.
pub const FIELD_LOCAL_DATA: &str = "Microsoft.VSTS.TCM.LocalDataSource";

const API_VERSION: &str = "7.0";

/// REST-backed plan source over the service's work-item API.
pub struct RestPlanSource {
    agent: ureq::Agent,
    base_url: String,
    auth_header: String,
}

impl RestPlanSource {
    pub fn new(config: &BridgeConfig) -> Self {
        let credential = BASE64.encode(format!(":{}", config.token));
        Self {
            agent: ureq::Agent::new_with_defaults(),
            base_url: config.organization_url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {credential}"),
        }
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .agent
            .get(url)
            .header("Authorization", &self.auth_header)
            .call();
        Self::read_body(url, response)
    }

    fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .agent
            .post(url)
            .header("Authorization", &self.auth_header)
            .send_json(body);
        Self::read_body(url, response)
    }

    fn read_body(
        url: &str,
        response: std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error>,
    ) -> Result<Value> {
        match response {
            Ok(mut response) => response
                .body_mut()
                .read_json()
                .map_err(|err| BridgeError::Transport(format!("decode body from {url}: {err}"))),
            Err(ureq::Error::StatusCode(404)) => Err(BridgeError::Configuration(format!(
                "resource not found: {url}"
            ))),
            Err(ureq::Error::StatusCode(401 | 403)) => Err(BridgeError::Configuration(format!(
                "authentication rejected by {url}"
            ))),
            Err(err) => Err(BridgeError::Transport(format!("{url}: {err}"))),
        }
    }

    fn wiql_ids(&self, project: &str, work_item_type: &str) -> Result<Vec<u32>> {
        let url = format!(
            "{}/{project}/_apis/wit/wiql?api-version={API_VERSION}",
            self.base_url
        );
        let query = format!(
            "Select [System.Id] From WorkItems Where [System.WorkItemType] = '{work_item_type}'"
        );
        let body = serde_json::json!({ "query": query });
        let response = self.post_json(&url, &body)?;
        let ids = response["workItems"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["id"].as_u64())
                    .map(|id| id as u32)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    fn work_items(&self, ids: &[u32], fields: &[&str]) -> Result<Vec<Value>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let id_list = ids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/_apis/wit/workitems?ids={id_list}&fields={}&api-version={API_VERSION}",
            self.base_url,
            fields.join(",")
        );
        let response = self.get_json(&url)?;
        Ok(response["value"].as_array().cloned().unwrap_or_default())
    }
}

fn field_string(fields: &Value, key: &str) -> Option<String> {
    fields[key].as_str().map(str::to_string)
}

impl PlanSource for RestPlanSource {
    fn plan_title(&self, project: &str, plan_id: u32) -> Result<String> {
        let url = format!(
            "{}/{project}/_apis/testplan/plans/{plan_id}?api-version={API_VERSION}",
            self.base_url
        );
        let response = self.get_json(&url)?;
        response["name"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BridgeError::Transport(format!("plan {plan_id} has no name field")))
    }

    fn suites(&self, project: &str, plan_id: u32) -> Result<Vec<RawSuite>> {
        let url = format!(
            "{}/{project}/_apis/testplan/Plans/{plan_id}/suites?api-version={API_VERSION}",
            self.base_url
        );
        let response = self.get_json(&url)?;
        let suites = response["value"]
            .as_array()
            .map(|suites| {
                suites
                    .iter()
                    // The service lists the synthetic root suite alongside
                    // the authored ones; only children hold test cases.
                    .filter(|suite| suite["parentSuite"].is_object())
                    .filter_map(|suite| {
                        Some(RawSuite {
                            id: suite["id"].as_u64()? as u32,
                            title: suite["name"].as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(suites)
    }

    fn cases(&self, project: &str, plan_id: u32, suite_id: u32) -> Result<Vec<RawCase>> {
        let url = format!(
            "{}/{project}/_apis/testplan/Plans/{plan_id}/Suites/{suite_id}/TestCase?api-version={API_VERSION}",
            self.base_url
        );
        let response = self.get_json(&url)?;
        let entries = response["value"].as_array().cloned().unwrap_or_default();
        let ids: Vec<u32> = entries
            .iter()
            .filter_map(|entry| entry["workItem"]["id"].as_u64())
            .map(|id| id as u32)
            .collect();
        let items = self.work_items(
            &ids,
            &["System.Title", FIELD_STEPS, FIELD_PARAMETERS, FIELD_LOCAL_DATA],
        )?;
        let cases = items
            .iter()
            .filter_map(|item| {
                let fields = &item["fields"];
                Some(RawCase {
                    id: item["id"].as_u64()? as u32,
                    title: fields["System.Title"].as_str()?.to_string(),
                    steps_xml: field_string(fields, FIELD_STEPS),
                    parameters_xml: field_string(fields, FIELD_PARAMETERS),
                    local_data_source: field_string(fields, FIELD_LOCAL_DATA),
                })
            })
            .collect();
        Ok(cases)
    }

    fn shared_steps(&self, project: &str) -> Result<Vec<RawSharedStep>> {
        let ids = self.wiql_ids(project, "Shared Steps")?;
        let items = self.work_items(&ids, &["System.Title", FIELD_STEPS])?;
        Ok(items
            .iter()
            .filter_map(|item| {
                let fields = &item["fields"];
                Some(RawSharedStep {
                    id: item["id"].as_u64()? as u32,
                    title: fields["System.Title"].as_str()?.to_string(),
                    steps_xml: field_string(fields, FIELD_STEPS),
                })
            })
            .collect())
    }

    fn shared_parameter_sets(&self, project: &str) -> Result<Vec<RawSharedParameterSet>> {
        let ids = self.wiql_ids(project, "Shared Parameter")?;
        let items = self.work_items(&ids, &["System.Title", FIELD_PARAMETERS])?;
        Ok(items
            .iter()
            .filter_map(|item| {
                let fields = &item["fields"];
                Some(RawSharedParameterSet {
                    id: item["id"].as_u64()? as u32,
                    title: fields["System.Title"].as_str()?.to_string(),
                    payload: field_string(fields, FIELD_PARAMETERS),
                })
            })
            .collect())
    }
}
