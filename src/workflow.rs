//! End-to-end valuation run
//!
//! Authorize, push the month's inputs, configure and run a projection from a template, wait for
//! it to finish and save its reports. Steps run one at a time and each one is gated on the one
//! before it; the listings are informational and never stop the run. Once the projection has
//! completed, the Excel and CSV reports are fetched and written independently of each other.

use crate::api::types::remote_date;
use crate::api::{ApiClient, DataTableParams, ReportFormat, ReportRequest, ScenarioTableParams};
use crate::config::RunConfig;
use crate::poll::{PollConfig, PollError};
use crate::transport::{Envelope, Processed, Transport};
use log::{error, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// API key pair exchanged for an access token
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Gated steps of a run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Authorize,
    CreateScenarioTable,
    CreateDataTable,
    UploadModelPoints,
    CreateProjection,
    UpdateProjection,
    UpdateTableMapping,
    UpdateModelPoints,
    RunProjection,
    WaitForProjection,
    ProjectionStatus,
    SaveReports,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Authorize => "authorize",
            Step::CreateScenarioTable => "create scenario table",
            Step::CreateDataTable => "create data table",
            Step::UploadModelPoints => "upload model points",
            Step::CreateProjection => "create projection",
            Step::UpdateProjection => "update projection",
            Step::UpdateTableMapping => "update projection table mapping",
            Step::UpdateModelPoints => "update projection model points",
            Step::RunProjection => "run projection",
            Step::WaitForProjection => "wait for projection",
            Step::ProjectionStatus => "fetch projection status",
            Step::SaveReports => "save reports",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum WorkflowError {
    #[error("{step} failed: {message}")]
    StepFailed { step: Step, message: String },

    #[error("projection {projection_id} still running after {elapsed:?}")]
    ProjectionTimedOut { projection_id: i64, elapsed: Duration },

    #[error("run cancelled during {step}")]
    Cancelled { step: Step },
}

/// Result of fetching and writing one report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    pub format: ReportFormat,
    pub path: PathBuf,
    /// Bytes written, or why nothing was
    pub result: Result<u64, String>,
}

/// What a completed run produced
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowReport {
    pub scenario_table_id: i64,
    pub data_table_id: i64,
    pub model_point_file_id: i64,
    pub projection_id: i64,
    pub table_structures: usize,
    pub data_tables: usize,
    pub final_status: String,
    /// Empty unless the final status reported completion
    pub reports: Vec<ReportOutcome>,
}

impl WorkflowReport {
    pub fn completed(&self) -> bool {
        self.final_status.contains("Completed")
    }
}

pub struct Workflow<T: Transport> {
    client: ApiClient<T>,
    config: RunConfig,
    cancel: CancellationToken,
}

impl<T: Transport> Workflow<T> {
    pub fn new(transport: T, config: RunConfig) -> Self {
        Self {
            client: ApiClient::new(transport),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the run at the next step boundary or poll wait
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(mut self, credentials: &Credentials) -> Result<WorkflowReport, WorkflowError> {
        self.checkpoint(Step::Authorize)?;
        let authorized = self
            .client
            .authorize(&credentials.api_key, &credentials.api_secret)
            .await;
        required(Step::Authorize, authorized)?;

        let config = &self.config;
        let label = config.valuation_label();
        info!("Starting valuation run for {}", label);

        self.checkpoint(Step::CreateScenarioTable)?;
        let scenario_params = ScenarioTableParams {
            model_id: config.model_id,
            name: config.scenario_table_name(),
            start_date: remote_date(config.valuation_date),
            yield_curve_rate_type: config.scenario_table.yield_curve_rate_type.clone(),
            file_path: config.scenario_table_remote_path(),
            delimiter: config.scenario_table.delimiter.clone(),
        };
        let scenario_table_id = required(
            Step::CreateScenarioTable,
            self.client
                .create_scenario_table(&config.scenario_table.local_path, &scenario_params)
                .await,
        )?;

        let table_structures = self.client.list_table_structures(config.model_id).await;
        for structure in &table_structures {
            info!("Table structure {}: {}", structure.id, structure.name.as_deref().unwrap_or("<unnamed>"));
        }

        self.checkpoint(Step::CreateDataTable)?;
        let data_params = DataTableParams {
            table_structure_id: config.data_table.table_structure_id,
            name: config.data_table_name(),
            file_path: config.data_table_remote_path(),
            excel_sheet_name: config.data_table.excel_sheet_name.clone(),
            delimiter: config.data_table.delimiter.clone(),
        };
        let data_table_id = required(
            Step::CreateDataTable,
            self.client
                .create_data_table(&config.data_table.local_path, &data_params)
                .await,
        )?;

        let data_tables = self.client.list_data_tables(config.model_id).await;
        for table in &data_tables {
            info!("Data table {}: {}", table.id, table.name.as_deref().unwrap_or("<unnamed>"));
        }

        self.checkpoint(Step::UploadModelPoints)?;
        let model_points = required(
            Step::UploadModelPoints,
            self.client
                .upload_file(&config.model_points.local_path, &config.model_point_remote_path())
                .await,
        )?;

        self.checkpoint(Step::CreateProjection)?;
        let projection_id = required(
            Step::CreateProjection,
            self.client
                .create_projection_from_template(config.template_id, &config.projection_name())
                .await,
        )?;

        self.checkpoint(Step::UpdateProjection)?;
        required(
            Step::UpdateProjection,
            self.client
                .update_projection(projection_id, config.valuation_date, scenario_table_id)
                .await,
        )?;

        self.checkpoint(Step::UpdateTableMapping)?;
        required(
            Step::UpdateTableMapping,
            self.client
                .update_projection_table(projection_id, &config.data_table.table_structure_name, data_table_id)
                .await,
        )?;

        self.checkpoint(Step::UpdateModelPoints)?;
        required(
            Step::UpdateModelPoints,
            self.client
                .update_projection_model_point_file(
                    projection_id,
                    &config.model_points.portfolio_name,
                    &config.model_points.product_name,
                    model_points.file_id,
                )
                .await,
        )?;

        self.checkpoint(Step::RunProjection)?;
        required(Step::RunProjection, self.client.run_projection(projection_id).await)?;

        let running = PollConfig::new(
            config.polling.projection_interval(),
            config.polling.projection_timeout(),
        );
        self.client
            .wait_for_projection(projection_id, &running, &self.cancel)
            .await
            .map_err(|e| match e {
                PollError::Check(envelope) => WorkflowError::StepFailed {
                    step: Step::WaitForProjection,
                    message: envelope.describe(),
                },
                PollError::TimedOut { elapsed, .. } => WorkflowError::ProjectionTimedOut { projection_id, elapsed },
                PollError::Cancelled { .. } => WorkflowError::Cancelled {
                    step: Step::WaitForProjection,
                },
            })?;

        self.checkpoint(Step::ProjectionStatus)?;
        let final_status = required(
            Step::ProjectionStatus,
            self.client.get_projection_status(projection_id).await,
        )?;
        info!("Projection {} finished with status {}", projection_id, final_status);

        let mut report = WorkflowReport {
            scenario_table_id,
            data_table_id,
            model_point_file_id: model_points.file_id,
            projection_id,
            table_structures: table_structures.len(),
            data_tables: data_tables.len(),
            final_status,
            reports: Vec::new(),
        };

        if !report.completed() {
            warn!("Projection {} did not complete; skipping reports", projection_id);
            return Ok(report);
        }

        let outputs = &config.reports;
        for (format, path) in [
            (ReportFormat::Excel, &outputs.excel_path),
            (ReportFormat::Csv, &outputs.csv_path),
        ] {
            self.checkpoint(Step::SaveReports)?;
            report.reports.push(self.save_report(projection_id, format, path).await);
        }

        Ok(report)
    }

    async fn save_report(&self, projection_id: i64, format: ReportFormat, path: &Path) -> ReportOutcome {
        let outputs = &self.config.reports;
        let request = ReportRequest::for_projection(&outputs.workbook_id, &outputs.element_id, format, projection_id);
        let generation = PollConfig::new(
            self.config.polling.report_interval(),
            Some(self.config.polling.report_timeout()),
        );

        let result = match self
            .client
            .fetch_report(&request, outputs.delivery, &generation, &self.cancel)
            .await
        {
            Ok(bytes) => match tokio::fs::write(path, &bytes).await {
                Ok(()) => {
                    info!("Saved {} report to {}", format, path.display());
                    Ok(bytes.len() as u64)
                }
                Err(e) => Err(format!("could not write {}: {}", path.display(), e)),
            },
            Err(e) => Err(e.to_string()),
        };

        if let Err(message) = &result {
            error!("{} report not saved: {}", format, message);
        }

        ReportOutcome {
            format,
            path: path.to_path_buf(),
            result,
        }
    }

    fn checkpoint(&self, step: Step) -> Result<(), WorkflowError> {
        if self.cancel.is_cancelled() {
            warn!("Run cancelled before {}", step);
            return Err(WorkflowError::Cancelled { step });
        }
        Ok(())
    }
}

fn required<R>(step: Step, processed: Processed<R, Envelope>) -> Result<R, WorkflowError> {
    match processed {
        Processed::Success { value, .. } => Ok(value),
        Processed::Failure { envelope } => {
            error!("Stopping run: {} failed", step);
            Err(WorkflowError::StepFailed {
                step,
                message: envelope.describe(),
            })
        }
    }
}
