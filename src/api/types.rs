//! Request bodies and listing records exchanged with the remote API

use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Dates are sent as midnight timestamps without an offset
pub fn remote_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%dT00:00:00").to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthorizeRequest<'a> {
    pub api_key: &'a str,
    pub api_secret_key: &'a str,
}

/// Body shared by the upload-location and upload-confirmation calls
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FilePathRequest<'a> {
    pub file_path: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DownloadFileRequest<'a> {
    pub file_path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

/// Parameters for a scenario table created from an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioTableParams {
    pub model_id: i64,
    pub name: String,
    /// Rendered with [`remote_date`]
    pub start_date: String,
    pub yield_curve_rate_type: String,
    /// Remote path the file is uploaded to
    pub file_path: String,
    pub delimiter: String,
}

/// Parameters for a data table created or updated from an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTableParams {
    pub table_structure_id: i64,
    pub name: String,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excel_sheet_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
}

/// Parameters for a decrement (mortality, lapse, ...) table created from an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecrementTableParams {
    pub model_id: i64,
    pub name: String,
    pub file_path: String,
    /// Table kind as the service names it, e.g. `Mortality`
    pub decrement_table_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excel_sheet_name: Option<String>,
    /// Year improvement is applied from, typically the table's own year
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvement_base_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select_period_frequency: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateProjectionRequest<'a> {
    pub template_id: i64,
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateProjectionRequest {
    pub start_date: String,
    pub scenario_table_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProjectionDataTable<'a> {
    pub table_structure_name: &'a str,
    pub data_table_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateProjectionTablesRequest<'a> {
    pub data_tables: Vec<ProjectionDataTable<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ModelPointFileRef {
    pub file_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProjectionProduct<'a> {
    pub product_name: &'a str,
    pub model_point_file: ModelPointFileRef,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProjectionPortfolio<'a> {
    pub portfolio_name: &'a str,
    pub products: Vec<ProjectionProduct<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateProjectionPortfoliosRequest<'a> {
    pub portfolios: Vec<ProjectionPortfolio<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RunProjectionRequest {
    pub projection_id: i64,
}

/// Report file formats the reporting service can render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportFormat {
    Excel,
    Csv,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Excel => write!(f, "Excel"),
            ReportFormat::Csv => write!(f, "Csv"),
        }
    }
}

/// Workbook element to render, with its report parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub workbook_id: String,
    pub element_id: String,
    pub format: ReportFormat,
    pub parameters: BTreeMap<String, String>,
}

impl ReportRequest {
    /// Report filtered to a single projection run
    pub fn for_projection(workbook_id: &str, element_id: &str, format: ReportFormat, projection_id: i64) -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert("Projection-ID".to_string(), projection_id.to_string());
        Self {
            workbook_id: workbook_id.to_string(),
            element_id: element_id.to_string(),
            format,
            parameters,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportBody<'a> {
    pub element_id: &'a str,
    pub report_format: ReportFormat,
    pub parameters: &'a BTreeMap<String, String>,
}

impl<'a> From<&'a ReportRequest> for ReportBody<'a> {
    fn from(request: &'a ReportRequest) -> Self {
        Self {
            element_id: &request.element_id,
            report_format: request.format,
            parameters: &request.parameters,
        }
    }
}

/// Listing ids arrive as JSON numbers or as numeric strings
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| de::Error::custom(format!("id {} is not an integer", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("id {:?} is not numeric", s))),
        other => Err(de::Error::custom(format!("unexpected id {}", other))),
    }
}

/// Entry of a model's table structure listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableStructure {
    #[serde(deserialize_with = "lenient_id")]
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Entry of a model's data table listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataTableSummary {
    #[serde(deserialize_with = "lenient_id")]
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Entry of a model's decrement table listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DecrementTableSummary {
    #[serde(deserialize_with = "lenient_id")]
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}
