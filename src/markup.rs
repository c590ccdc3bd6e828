//! Codec for the embedded markup payloads carried by test-case records.
//!
//! Two closed, externally dictated formats: an ordered step sequence
//! (`<steps>` holding inline `<step>` actions and `<compref>` shared-step
//! references) and tabular parameter data (a `<parameters>` name list paired
//! with either a `<NewDataSet>` row dataset or a JSON parameter-map document
//! for shared sets). Shared-parameter-set definitions use a third shape,
//! `<parameterSet>`. Encoding and decoding are pure and bidirectional:
//! `decode(encode(x))` is semantically equal to `x`.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ParameterSet, SharedBinding};

/// Codec-level failure; the builder wraps it with the owning entity.
#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("xml parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Schema(String),
}

fn schema(detail: impl Into<String>) -> MarkupError {
    MarkupError::Schema(detail.into())
}

/// One decoded element of a step payload, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepItem {
    /// Inline action text, HTML wrapper stripped.
    Action(String),
    /// Reference to a shared step by its repository identifier.
    SharedRef(u32),
}

/// Rich-text wrapper the service puts around every action line.
const ACTION_WRAPPER_OPEN: &str = "<DIV><DIV><P>";
const ACTION_WRAPPER_CLOSE: &str = "</P></DIV></DIV>";
const EMPTY_EXPECTATION: &str = "<DIV><DIV><P><BR/></P></DIV></DIV>";

/// Decode an ordered step payload into actions and shared references.
pub fn decode_steps(payload: &str) -> Result<Vec<StepItem>, MarkupError> {
    let doc = roxmltree::Document::parse(payload)?;
    let root = doc.root_element();
    if root.tag_name().name() != "steps" {
        return Err(schema(format!(
            "expected <steps> root, found <{}>",
            root.tag_name().name()
        )));
    }

    let mut items = Vec::new();
    for node in root.children().filter(|node| node.is_element()) {
        match node.tag_name().name() {
            "step" => {
                let action = node
                    .children()
                    .find(|child| child.tag_name().name() == "parameterizedString")
                    .and_then(|child| child.text())
                    .unwrap_or_default();
                items.push(StepItem::Action(strip_rich_text(action)?));
            }
            "compref" => {
                let reference = node
                    .attribute("ref")
                    .ok_or_else(|| schema("<compref> without ref attribute"))?;
                let id = reference
                    .parse::<u32>()
                    .map_err(|_| schema(format!("non-numeric compref ref {reference:?}")))?;
                items.push(StepItem::SharedRef(id));
            }
            other => return Err(schema(format!("unexpected <{other}> inside <steps>"))),
        }
    }
    Ok(items)
}

/// Encode actions and shared references into a step payload.
///
/// Ordinals start at 1 and the running last ordinal is recorded on the root.
pub fn encode_steps(items: &[StepItem]) -> String {
    let mut xml = String::new();
    let last = items.len();
    let _ = write!(xml, r#"<steps id="0" last="{last}">"#);
    for (index, item) in items.iter().enumerate() {
        let ordinal = index + 1;
        match item {
            StepItem::Action(text) => {
                let wrapped = format!("{ACTION_WRAPPER_OPEN}{text}{ACTION_WRAPPER_CLOSE}");
                let _ = write!(
                    xml,
                    r#"<step id="{ordinal}" type="ActionStep"><parameterizedString isFormatted="true">{}</parameterizedString><parameterizedString isFormatted="true">{}</parameterizedString></step>"#,
                    escape_text(&wrapped),
                    escape_text(EMPTY_EXPECTATION),
                );
            }
            StepItem::SharedRef(id) => {
                let _ = write!(xml, r#"<compref id="{ordinal}" ref="{id}" />"#);
            }
        }
    }
    xml.push_str("</steps>");
    xml
}

/// Strip the `<DIV><DIV><P>…</P></DIV></DIV>` wrapper from an action line.
fn strip_rich_text(raw: &str) -> Result<String, MarkupError> {
    let tags = Regex::new(r"(?i)</?(?:div|p|br)\s*/?>")
        .map_err(|err| schema(format!("wrapper regex: {err}")))?;
    Ok(tags.replace_all(raw, "").trim().to_string())
}

/// Decoded parameter declarations before the builder classifies them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedParameters {
    /// Declared parameter names, in declaration order.
    pub names: Vec<String>,
    pub source: DecodedSource,
}

/// What the data payload turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedSource {
    /// No data payload at all.
    Empty,
    /// Row-major inline table aligned with the declared names.
    Table(Vec<Vec<String>>),
    /// Parameter-map document binding local names to shared-set columns.
    SharedMap(Vec<SharedBinding>),
}

/// Encoded parameter payload pair: the name list and the data document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterPayload {
    pub names_xml: String,
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharedDataSource {
    parameter_map: Vec<ParameterMapEntry>,
    row_mapping_type: u32,
    shared_parameter_data_set_ids: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParameterMapEntry {
    local_param_name: String,
    shared_parameter_name: String,
    shared_parameter_data_set_id: u32,
}

/// Decode the `<parameters>` name list plus its data payload.
///
/// The data payload is JSON for shared references and XML for inline tables;
/// inline rows are reconstructed by parameter name, so XML node ordering
/// inside a row does not matter.
pub fn decode_parameters(
    names_xml: Option<&str>,
    data: Option<&str>,
) -> Result<DecodedParameters, MarkupError> {
    let names = match names_xml {
        Some(payload) if !payload.trim().is_empty() => decode_parameter_names(payload)?,
        _ => Vec::new(),
    };

    let data = data.map(str::trim).filter(|payload| !payload.is_empty());
    let source = match data {
        None => DecodedSource::Empty,
        Some(payload) if payload.starts_with('{') => {
            let document: SharedDataSource = serde_json::from_str(payload)?;
            let bindings = document
                .parameter_map
                .into_iter()
                .map(|entry| SharedBinding {
                    local_name: entry.local_param_name,
                    set_name: entry.shared_parameter_name,
                    set_id: entry.shared_parameter_data_set_id,
                })
                .collect();
            DecodedSource::SharedMap(bindings)
        }
        Some(payload) => DecodedSource::Table(decode_local_rows(payload, &names)?),
    };

    Ok(DecodedParameters { names, source })
}

fn decode_parameter_names(payload: &str) -> Result<Vec<String>, MarkupError> {
    let doc = roxmltree::Document::parse(payload)?;
    let root = doc.root_element();
    if root.tag_name().name() != "parameters" {
        return Err(schema(format!(
            "expected <parameters> root, found <{}>",
            root.tag_name().name()
        )));
    }
    let mut names = Vec::new();
    for node in root.children().filter(|node| node.is_element()) {
        if node.tag_name().name() != "param" {
            return Err(schema(format!(
                "unexpected <{}> inside <parameters>",
                node.tag_name().name()
            )));
        }
        let name = node
            .attribute("name")
            .ok_or_else(|| schema("<param> without name attribute"))?;
        names.push(name.to_string());
    }
    Ok(names)
}

fn decode_local_rows(payload: &str, names: &[String]) -> Result<Vec<Vec<String>>, MarkupError> {
    let doc = roxmltree::Document::parse(payload)?;
    let root = doc.root_element();
    if root.tag_name().name() != "NewDataSet" {
        return Err(schema(format!(
            "expected <NewDataSet> root, found <{}>",
            root.tag_name().name()
        )));
    }
    let mut rows = Vec::new();
    for table in root.children().filter(|node| node.is_element()) {
        let mut cells: BTreeMap<&str, String> = BTreeMap::new();
        for cell in table.children().filter(|node| node.is_element()) {
            cells.insert(
                cell.tag_name().name(),
                cell.text().unwrap_or_default().to_string(),
            );
        }
        let row = names
            .iter()
            .map(|name| cells.remove(name.as_str()).unwrap_or_default())
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Encode a parameter set into its name list plus data payload.
///
/// Returns `None` when there is nothing to declare.
pub fn encode_parameters(set: &ParameterSet) -> Option<ParameterPayload> {
    match set {
        ParameterSet::None => None,
        ParameterSet::Local(table) => {
            let mut data = String::from("<NewDataSet>");
            for row in &table.rows {
                data.push_str("<Table1>");
                for (name, value) in table.names.iter().zip(row) {
                    let _ = write!(data, "<{name}>{}</{name}>", escape_text(value));
                }
                data.push_str("</Table1>");
            }
            data.push_str("</NewDataSet>");
            Some(ParameterPayload {
                names_xml: encode_parameter_names(&table.names),
                data,
            })
        }
        ParameterSet::Shared(bindings) => {
            let names: Vec<String> = bindings
                .iter()
                .map(|binding| binding.local_name.clone())
                .collect();
            let document = SharedDataSource {
                parameter_map: bindings
                    .iter()
                    .map(|binding| ParameterMapEntry {
                        local_param_name: binding.local_name.clone(),
                        shared_parameter_name: binding.set_name.clone(),
                        shared_parameter_data_set_id: binding.set_id,
                    })
                    .collect(),
                row_mapping_type: 0,
                shared_parameter_data_set_ids: bindings
                    .iter()
                    .map(|binding| binding.set_id)
                    .collect(),
            };
            let data = serde_json::to_string(&document).expect("serialize parameter map");
            Some(ParameterPayload {
                names_xml: encode_parameter_names(&names),
                data,
            })
        }
    }
}

fn encode_parameter_names(names: &[String]) -> String {
    let mut xml = String::from("<parameters>");
    for name in names {
        let _ = write!(xml, r#"<param name="{}" bind="default" />"#, escape_attr(name));
    }
    xml.push_str("</parameters>");
    xml
}

/// Decode a shared-parameter-set definition payload.
pub fn decode_parameter_set(
    payload: &str,
) -> Result<(Vec<String>, Vec<BTreeMap<String, String>>), MarkupError> {
    let doc = roxmltree::Document::parse(payload)?;
    let root = doc.root_element();
    if root.tag_name().name() != "parameterSet" {
        return Err(schema(format!(
            "expected <parameterSet> root, found <{}>",
            root.tag_name().name()
        )));
    }

    let mut names = Vec::new();
    if let Some(param_names) = root
        .children()
        .find(|node| node.tag_name().name() == "paramNames")
    {
        for node in param_names.children().filter(|node| node.is_element()) {
            names.push(node.text().unwrap_or_default().to_string());
        }
    }

    let mut rows = Vec::new();
    if let Some(param_data) = root
        .children()
        .find(|node| node.tag_name().name() == "paramData")
    {
        for data_row in param_data.children().filter(|node| node.is_element()) {
            let mut row = BTreeMap::new();
            for kvp in data_row.children().filter(|node| node.is_element()) {
                let key = kvp
                    .attribute("key")
                    .ok_or_else(|| schema("<kvp> without key attribute"))?;
                row.insert(
                    key.to_string(),
                    kvp.attribute("value").unwrap_or_default().to_string(),
                );
            }
            rows.push(row);
        }
    }

    Ok((names, rows))
}

/// Encode a shared-parameter-set definition payload.
pub fn encode_parameter_set(names: &[String], rows: &[BTreeMap<String, String>]) -> String {
    let mut xml = String::from("<parameterSet><paramNames>");
    for name in names {
        let _ = write!(xml, "<param>{}</param>", escape_text(name));
    }
    xml.push_str("</paramNames>");
    let _ = write!(xml, r#"<paramData lastId="{}">"#, rows.len());
    for (index, row) in rows.iter().enumerate() {
        let _ = write!(xml, r#"<dataRow id="{}">"#, index + 1);
        for (key, value) in row {
            let _ = write!(
                xml,
                r#"<kvp key="{}" value="{}" />"#,
                escape_attr(key),
                escape_attr(value)
            );
        }
        xml.push_str("</dataRow>");
    }
    xml.push_str("</paramData></parameterSet>");
    xml
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}
